//! Relative humidity.
use super::{deltas, log_summary, table_deltas, HourlyFallback, MorphContext, Morpher, Variable};
use crate::config::{HumidityMode, MorphConfig};
use crate::error::MorphError;
use crate::series::{HourlySeries, SignalSet};
use crate::sources::{Aggregation, ClimateFileSet, SourceLayout};
use crate::units::{partial_pressure, rh_from_partial_pressure, saturation_pressure};
use log::debug;
use metfor::Celsius;

const RHUM_KEY: &str = "RHUM";

/// Morphs relative humidity in percent, always clamped to `[0, 100]`.
#[derive(Debug, Clone, Copy)]
pub struct RelativeHumidityMorpher {
    mode: HumidityMode,
}

impl RelativeHumidityMorpher {
    pub fn new(mode: HumidityMode) -> Self {
        RelativeHumidityMorpher { mode }
    }

    pub fn for_layout(layout: SourceLayout, config: &MorphConfig) -> Self {
        let mode = config.humidity_mode.unwrap_or(match layout {
            SourceLayout::DifferenceTables => HumidityMode::Shift,
            SourceLayout::Rasters => HumidityMode::Physical,
        });

        Self::new(mode)
    }

    pub fn mode(&self) -> HumidityMode {
        self.mode
    }
}

impl Morpher for RelativeHumidityMorpher {
    fn variable(&self) -> Variable {
        Variable::RelativeHumidity
    }

    fn requires(&self) -> Vec<String> {
        match self.mode {
            HumidityMode::Shift => vec![RHUM_KEY.to_owned()],
            HumidityMode::Physical => vec![],
        }
    }

    fn depends_on(&self) -> &[Variable] {
        match self.mode {
            HumidityMode::Shift => &[],
            HumidityMode::Physical => &[Variable::DryBulb],
        }
    }

    fn load_signals(
        &self,
        files: &ClimateFileSet,
        _ctx: &MorphContext,
    ) -> Result<SignalSet, MorphError> {
        match self.mode {
            HumidityMode::Shift => Ok(SignalSet::new().with(
                RHUM_KEY,
                table_deltas(files, RHUM_KEY, Aggregation::First)?,
            )),
            HumidityMode::Physical => Ok(SignalSet::new()),
        }
    }

    fn morph(
        &self,
        baseline: &HourlySeries,
        signals: &SignalSet,
        ctx: &MorphContext,
    ) -> Result<HourlySeries, MorphError> {
        let morphed = match self.mode {
            HumidityMode::Shift => {
                let d_rh = deltas(signals, RHUM_KEY)?;
                for (month, d) in d_rh.iter().enumerate() {
                    debug!("month {}: {:+.3} percentage points", month + 1, d);
                }
                baseline.map_hours(|_, month, rh| clamp_rh(rh + d_rh[month]))
            }
            HumidityMode::Physical => {
                let temp_now = ctx.baseline(Variable::DryBulb)?;
                let temp_future = ctx.prior(Variable::RelativeHumidity, Variable::DryBulb)?;
                hold_vapour_pressure(baseline, &temp_now, temp_future)
            }
        };

        log_summary(Variable::RelativeHumidity, baseline, &morphed);
        Ok(morphed)
    }
}

fn clamp_rh(rh: f64) -> f64 {
    rh.max(0.0).min(100.0)
}

/// Keep each hour's vapour pressure and express it against the future dry bulb.
fn hold_vapour_pressure(
    rh_now: &HourlySeries,
    temp_now: &HourlySeries,
    temp_future: &HourlySeries,
) -> HourlySeries {
    let mut fallback = HourlyFallback::new(Variable::RelativeHumidity);

    let morphed = rh_now.map_hours(|hour, _, rh| {
        let pw = partial_pressure(rh, saturation_pressure(Celsius(temp_now[hour])));
        let value = rh_from_partial_pressure(pw, Celsius(temp_future[hour]));
        clamp_rh(fallback.resolve(hour, rh, value))
    });

    fallback.finish();
    morphed
}

#[cfg(test)]
mod tests {
    use super::super::tests::record_with;
    use super::*;
    use crate::pipeline::ResultStore;
    use crate::series::MonthlySignal;
    use approx::assert_abs_diff_eq;

    fn baseline() -> HourlySeries {
        HourlySeries::from_fn(|h| (h % 101) as f64)
    }

    fn shift(d: f64) -> HourlySeries {
        let record = record_with(|_, _| 0.0);
        let config = MorphConfig::default();
        let results = ResultStore::new();
        let ctx = MorphContext {
            record: &record,
            city: None,
            config: &config,
            results: &results,
        };
        let signals = SignalSet::new().with(RHUM_KEY, MonthlySignal::Delta([d; 12]));
        RelativeHumidityMorpher::new(HumidityMode::Shift)
            .morph(&baseline(), &signals, &ctx)
            .unwrap()
    }

    #[test]
    fn zero_change_is_identity() {
        let base = baseline();
        let morphed = shift(0.0);
        for (a, b) in base.iter().zip(morphed.iter()) {
            assert_abs_diff_eq!(*a, *b);
        }
    }

    #[test]
    fn shifted_values_stay_in_range() {
        for &d in &[-45.0, -3.5, 7.25, 60.0] {
            let morphed = shift(d);
            assert_eq!(morphed.len(), 8760);
            assert!(morphed.iter().all(|&rh| (0.0..=100.0).contains(&rh)));
        }
        assert_abs_diff_eq!(shift(5.0)[50], 55.0);
        assert_abs_diff_eq!(shift(5.0)[100], 100.0);
    }

    #[test]
    fn physical_mode_follows_warming() {
        // dry bulb column 20 C, humidity column 60 %
        let record = record_with(|_, col| match col {
            6 => 20.0,
            8 => 60.0,
            _ => 0.0,
        });
        let config = MorphConfig::default();
        let mut results = ResultStore::new();
        results.insert(Variable::DryBulb, HourlySeries::from_fn(|_| 22.0));

        let ctx = MorphContext {
            record: &record,
            city: None,
            config: &config,
            results: &results,
        };

        let morpher = RelativeHumidityMorpher::new(HumidityMode::Physical);
        assert!(morpher.requires().is_empty());
        assert_eq!(morpher.depends_on(), &[Variable::DryBulb]);

        let base = ctx.baseline(Variable::RelativeHumidity).unwrap();
        let morphed = morpher.morph(&base, &SignalSet::new(), &ctx).unwrap();

        let expected = 60.0 * saturation_pressure(Celsius(20.0)) / saturation_pressure(Celsius(22.0));
        assert_abs_diff_eq!(morphed[0], expected, epsilon = 1e-9);
        assert!(morphed[0] < 60.0);
    }

    #[test]
    fn physical_mode_needs_temperature() {
        let record = record_with(|_, _| 10.0);
        let config = MorphConfig::default();
        let results = ResultStore::new();
        let ctx = MorphContext {
            record: &record,
            city: None,
            config: &config,
            results: &results,
        };

        let base = ctx.baseline(Variable::RelativeHumidity).unwrap();
        let result = RelativeHumidityMorpher::new(HumidityMode::Physical).morph(
            &base,
            &SignalSet::new(),
            &ctx,
        );
        assert!(matches!(result, Err(MorphError::DependencyUnmet { .. })));
    }
}
