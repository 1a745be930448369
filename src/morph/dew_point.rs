//! Dew point temperature, derived from the morphed dry bulb and relative humidity.
use super::{log_summary, HourlyFallback, MorphContext, Morpher, Variable};
use crate::error::{CalcError, MorphError};
use crate::series::{HourlySeries, SignalSet};
use crate::sources::ClimateFileSet;
use crate::units::{dew_point_from_partial_pressure, partial_pressure, saturation_pressure};
use log::warn;
use metfor::{Celsius, Quantity};

const DEPENDENCIES: [Variable; 2] = [Variable::DryBulb, Variable::RelativeHumidity];

/// Recomputes dew point from future dry bulb and humidity. Needs no climate files.
#[derive(Debug, Clone, Copy, Default)]
pub struct DewPointMorpher;

impl DewPointMorpher {
    pub fn new() -> Self {
        DewPointMorpher
    }
}

impl Morpher for DewPointMorpher {
    fn variable(&self) -> Variable {
        Variable::DewPoint
    }

    fn requires(&self) -> Vec<String> {
        vec![]
    }

    fn depends_on(&self) -> &[Variable] {
        &DEPENDENCIES
    }

    fn load_signals(
        &self,
        _files: &ClimateFileSet,
        _ctx: &MorphContext,
    ) -> Result<SignalSet, MorphError> {
        Ok(SignalSet::new())
    }

    fn morph(
        &self,
        baseline: &HourlySeries,
        _signals: &SignalSet,
        ctx: &MorphContext,
    ) -> Result<HourlySeries, MorphError> {
        let temp = ctx.prior(Variable::DewPoint, Variable::DryBulb)?;
        let rh = ctx.prior(Variable::DewPoint, Variable::RelativeHumidity)?;

        let morphed = dew_point_series(baseline, temp, rh);
        log_summary(Variable::DewPoint, baseline, &morphed);
        Ok(morphed)
    }
}

fn dew_point(temp: f64, rh: f64) -> Result<f64, CalcError> {
    let pw = partial_pressure(rh, saturation_pressure(Celsius(temp)));
    dew_point_from_partial_pressure(pw).map(|dp| dp.unpack())
}

/// Dew point for every hour, never above that hour's dry bulb.
fn dew_point_series(baseline: &HourlySeries, temp: &HourlySeries, rh: &HourlySeries) -> HourlySeries {
    let mut fallback = HourlyFallback::new(Variable::DewPoint);
    let mut clamped = 0;

    let morphed = baseline.map_hours(|hour, _, base| {
        let t = temp[hour];
        let dp = fallback.resolve(hour, base, dew_point(t, rh[hour]));
        if dp > t {
            clamped += 1;
            t
        } else {
            dp
        }
    });

    fallback.finish();
    if clamped > 0 {
        warn!(
            "{} dew point values exceeded the dry bulb temperature and were clamped",
            clamped
        );
    }

    morphed
}

#[cfg(test)]
mod tests {
    use super::super::tests::record_with;
    use super::*;
    use crate::config::MorphConfig;
    use crate::pipeline::ResultStore;
    use approx::assert_abs_diff_eq;

    fn results(temp: HourlySeries, rh: HourlySeries) -> ResultStore {
        let mut store = ResultStore::new();
        store.insert(Variable::DryBulb, temp);
        store.insert(Variable::RelativeHumidity, rh);
        store
    }

    #[test]
    fn never_above_dry_bulb() {
        let record = record_with(|_, _| 0.0);
        let config = MorphConfig::default();
        let temp = HourlySeries::from_fn(|h| -15.0 + (h % 50) as f64);
        let rh = HourlySeries::from_fn(|h| (h % 101) as f64);
        let store = results(temp.clone(), rh);
        let ctx = MorphContext {
            record: &record,
            city: None,
            config: &config,
            results: &store,
        };

        let base = HourlySeries::from_fn(|_| 0.0);
        let morphed = DewPointMorpher::new()
            .morph(&base, &SignalSet::new(), &ctx)
            .unwrap();

        assert_eq!(morphed.len(), 8760);
        for (dp, t) in morphed.iter().zip(temp.iter()) {
            assert!(dp <= t);
            assert!(dp.is_finite());
        }
    }

    #[test]
    fn dry_air_keeps_baseline() {
        // zero humidity means zero vapour pressure: the logarithm fails every hour
        let dp = dew_point_series(
            &HourlySeries::from_fn(|_| -30.0),
            &HourlySeries::from_fn(|_| 20.0),
            &HourlySeries::from_fn(|_| 0.0),
        );
        assert!(dp.iter().all(|&v| v == -30.0));
    }

    #[test]
    fn typical_conditions() {
        // 20 C at 50 % has a dew point close to 9.3 C
        assert_abs_diff_eq!(dew_point(20.0, 50.0).unwrap(), 9.3, epsilon = 0.3);
    }

    #[test]
    fn needs_both_dependencies() {
        let record = record_with(|_, _| 0.0);
        let config = MorphConfig::default();
        let mut store = ResultStore::new();
        store.insert(Variable::DryBulb, HourlySeries::from_fn(|_| 10.0));
        let ctx = MorphContext {
            record: &record,
            city: None,
            config: &config,
            results: &store,
        };

        let base = HourlySeries::from_fn(|_| 0.0);
        let err = DewPointMorpher::new()
            .morph(&base, &SignalSet::new(), &ctx)
            .unwrap_err();
        assert!(matches!(
            err,
            MorphError::DependencyUnmet {
                missing: Variable::RelativeHumidity,
                ..
            }
        ));
        assert_eq!(DewPointMorpher::new().depends_on().len(), 2);
    }
}
