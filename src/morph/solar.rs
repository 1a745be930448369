//! Global horizontal radiation.
use super::transfer::{morph_bounded, Bounds};
use super::{log_summary, raster_monthly, MorphContext, Morpher, Variable};
use crate::config::SeasonalScaling;
use crate::error::MorphError;
use crate::series::{mean, HourlySeries, MonthlySignal, SignalSet};
use crate::sources::ClimateFileSet;
use log::{debug, info};

const HISTORIC_KEY: &str = "SRAD_historic";

/// Transfer-function morph of radiation driven by the seasonal change table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolarRadiationMorpher;

impl SolarRadiationMorpher {
    pub fn new() -> Self {
        SolarRadiationMorpher
    }
}

/// The relative change of each month; zero where the historic climatology is zero.
fn monthly_changes(historic: &[f64; 12], table: &SeasonalScaling) -> [f64; 12] {
    let mut changes = [0.0; 12];
    for (month, (change, &hist)) in changes.iter_mut().zip(historic.iter()).enumerate() {
        if hist != 0.0 {
            let future = hist * (1.0 + table.for_month(month));
            *change = (future - hist) / hist;
        }
    }
    changes
}

/// The overall scaling parameter: the mean monthly change within `+/- limit`.
fn scaling_parameter(changes: &[f64; 12], limit: f64) -> f64 {
    let limit = limit.abs();
    mean(changes).max(-limit).min(limit)
}

impl Morpher for SolarRadiationMorpher {
    fn variable(&self) -> Variable {
        Variable::SolarRadiation
    }

    fn requires(&self) -> Vec<String> {
        vec![HISTORIC_KEY.to_owned()]
    }

    fn load_signals(
        &self,
        files: &ClimateFileSet,
        ctx: &MorphContext,
    ) -> Result<SignalSet, MorphError> {
        let historic = raster_monthly(files, HISTORIC_KEY, ctx)?;
        let changes = monthly_changes(&historic, &ctx.config.solar);
        Ok(SignalSet::new().with(HISTORIC_KEY, MonthlySignal::Delta(changes)))
    }

    fn morph(
        &self,
        baseline: &HourlySeries,
        signals: &SignalSet,
        ctx: &MorphContext,
    ) -> Result<HourlySeries, MorphError> {
        let changes = super::deltas(signals, HISTORIC_KEY)?;
        for (month, change) in changes.iter().enumerate() {
            debug!("month {}: {:+.1}%", month + 1, change * 100.0);
        }

        let s = scaling_parameter(changes, ctx.config.solar.limit);
        info!("solar radiation scaling parameter S = {:.4}", s);

        let bounds = Bounds::new(baseline.min(), baseline.max());
        let morphed = morph_bounded(baseline, |_| bounds, |_| s, |_| bounds);

        log_summary(Variable::SolarRadiation, baseline, &morphed);
        Ok(morphed)
    }
}
