//! Dry bulb temperature.
use super::transfer::{morph_bounded, Bounds};
use super::{
    absolute, deltas, log_summary, raster_absolute, table_deltas, MorphContext, Morpher, Variable,
};
use crate::config::{MorphConfig, TemperatureMode};
use crate::error::MorphError;
use crate::series::{mean, HourlySeries, MonthStats, SignalSet};
use crate::sources::{Aggregation, ClimateFileSet, SourceLayout};
use log::{debug, warn};

const MEAN_KEY: &str = "TEMP";
const MAX_KEY: &str = "TMAX";
const MIN_KEY: &str = "TMIN";

/// Morphs dry bulb temperature by shift-and-scale or by the bounded transfer function.
#[derive(Debug, Clone, Copy)]
pub struct TemperatureMorpher {
    mode: TemperatureMode,
}

impl TemperatureMorpher {
    pub fn new(mode: TemperatureMode) -> Self {
        TemperatureMorpher { mode }
    }

    /// The configured mode, or the natural one for the source layout.
    pub fn for_layout(layout: SourceLayout, config: &MorphConfig) -> Self {
        let mode = config.temperature_mode.unwrap_or(match layout {
            SourceLayout::DifferenceTables => TemperatureMode::ShiftAndScale,
            SourceLayout::Rasters => TemperatureMode::TransferFunction,
        });

        Self::new(mode)
    }

    pub fn mode(&self) -> TemperatureMode {
        self.mode
    }
}

impl Morpher for TemperatureMorpher {
    fn variable(&self) -> Variable {
        Variable::DryBulb
    }

    fn requires(&self) -> Vec<String> {
        match self.mode {
            TemperatureMode::ShiftAndScale => vec![MEAN_KEY, MAX_KEY, MIN_KEY]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            TemperatureMode::TransferFunction => vec![
                "TMAX_historic",
                "TMIN_historic",
                "TMAX_future",
                "TMIN_future",
            ]
            .into_iter()
            .map(str::to_owned)
            .collect(),
        }
    }

    fn load_signals(
        &self,
        files: &ClimateFileSet,
        ctx: &MorphContext,
    ) -> Result<SignalSet, MorphError> {
        match self.mode {
            TemperatureMode::ShiftAndScale => {
                let mut signals = SignalSet::new();
                for &key in &[MEAN_KEY, MAX_KEY, MIN_KEY] {
                    signals.insert(key, table_deltas(files, key, Aggregation::First)?);
                }
                Ok(signals)
            }
            TemperatureMode::TransferFunction => Ok(SignalSet::new()
                .with(MAX_KEY, raster_absolute(files, MAX_KEY, ctx)?)
                .with(MIN_KEY, raster_absolute(files, MIN_KEY, ctx)?)),
        }
    }

    fn morph(
        &self,
        baseline: &HourlySeries,
        signals: &SignalSet,
        _ctx: &MorphContext,
    ) -> Result<HourlySeries, MorphError> {
        let morphed = match self.mode {
            TemperatureMode::ShiftAndScale => shift_and_scale(
                baseline,
                deltas(signals, MEAN_KEY)?,
                deltas(signals, MAX_KEY)?,
                deltas(signals, MIN_KEY)?,
            ),
            TemperatureMode::TransferFunction => {
                let (hist_max, fut_max) = absolute(signals, MAX_KEY)?;
                let (hist_min, fut_min) = absolute(signals, MIN_KEY)?;
                let delta_max = fut_max - mean(hist_max);
                let delta_min = fut_min - mean(hist_min);
                debug!(
                    "temperature change: minimum {:+.2}, maximum {:+.2}",
                    delta_min, delta_max
                );
                transfer_function(baseline, delta_min, delta_max)
            }
        };

        log_summary(Variable::DryBulb, baseline, &morphed);
        Ok(morphed)
    }
}

/// `base + dT_m + alpha_m (base - mean_m)` with `alpha_m = (dTmax_m - dTmin_m) / range_m`.
fn shift_and_scale(
    baseline: &HourlySeries,
    d_mean: &[f64; 12],
    d_max: &[f64; 12],
    d_min: &[f64; 12],
) -> HourlySeries {
    let stats = baseline.monthly_stats();

    let mut alphas = [1.0; 12];
    for (month, (alpha, stat)) in alphas.iter_mut().zip(stats.iter()).enumerate() {
        let range = stat.range();
        if range.abs() <= f64::EPSILON {
            warn!(
                "month {} has no temperature range, using a scaling factor of 1",
                month + 1
            );
            continue;
        }
        *alpha = (d_max[month] - d_min[month]) / range;
        debug!("month {}: alpha {:.3}", month + 1, alpha);
    }

    baseline.map_hours(|_, month, value| {
        value + d_mean[month] + alphas[month] * (value - stats[month].mean)
    })
}

/// Future bounds and scaling parameter for one month.
#[derive(Debug, Clone, Copy)]
struct MonthTransfer {
    window: Bounds,
    target: Bounds,
    shift: f64,
    /// Additive change used where the transfer mapping is unusable.
    fallback: f64,
}

impl MonthTransfer {
    fn new(stat: &MonthStats, delta_min: f64, delta_max: f64) -> Self {
        let window = Bounds::new(stat.min, stat.max);
        let target = Bounds::new(stat.min + delta_min, stat.max + delta_max);
        let fallback = (delta_min + delta_max) / 2.0;
        let future_mean = stat.mean + fallback;

        let shift = target.normalize(future_mean) - window.normalize(stat.mean);

        MonthTransfer {
            window,
            target,
            shift,
            fallback,
        }
    }
}

fn transfer_function(baseline: &HourlySeries, delta_min: f64, delta_max: f64) -> HourlySeries {
    let months: Vec<MonthTransfer> = baseline
        .monthly_stats()
        .iter()
        .map(|stat| MonthTransfer::new(stat, delta_min, delta_max))
        .collect();

    for (month, mt) in months.iter().enumerate() {
        debug!(
            "month {}: future {:.1} to {:.1}, S {:+.4}",
            month + 1,
            mt.target.lo,
            mt.target.hi,
            mt.shift
        );
    }

    let shaped = morph_bounded(
        baseline,
        |m| months[m].window,
        |m| months[m].shift,
        |m| months[m].target,
    );

    let mut fallbacks = 0;
    let morphed = shaped.map_hours(|hour, month, value| {
        let mt = &months[month];
        let tol = 1e-9 * mt.target.width().abs().max(1.0);
        let inside = value >= mt.target.lo - tol && value <= mt.target.hi + tol;
        if mt.target.is_open() && inside && value.is_finite() {
            value
        } else {
            fallbacks += 1;
            baseline[hour] + mt.fallback
        }
    });

    if fallbacks > 0 {
        warn!(
            "{} temperature hours fell outside the future bounds and were shifted instead",
            fallbacks
        );
    }

    morphed
}
