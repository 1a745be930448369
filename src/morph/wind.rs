//! Wind speed. Baseline values are knots, morphed values m/s.
use super::{
    absolute, deltas, log_summary, ratio_factors, raster_absolute, table_deltas, MorphContext,
    Morpher, Variable,
};
use crate::error::MorphError;
use crate::series::{HourlySeries, SignalSet};
use crate::sources::{Aggregation, ClimateFileSet, SourceLayout};
use crate::units::knots_to_ms;
use log::debug;

const KEY: &str = "WIND";

/// Stretches wind speed by a monthly factor and converts it to m/s.
#[derive(Debug, Clone, Copy)]
pub struct WindSpeedMorpher {
    layout: SourceLayout,
}

impl WindSpeedMorpher {
    pub fn new(layout: SourceLayout) -> Self {
        WindSpeedMorpher { layout }
    }
}

impl Morpher for WindSpeedMorpher {
    fn variable(&self) -> Variable {
        Variable::WindSpeed
    }

    fn requires(&self) -> Vec<String> {
        match self.layout {
            SourceLayout::DifferenceTables => vec![KEY.to_owned()],
            SourceLayout::Rasters => vec![format!("{}_historic", KEY), format!("{}_future", KEY)],
        }
    }

    fn load_signals(
        &self,
        files: &ClimateFileSet,
        ctx: &MorphContext,
    ) -> Result<SignalSet, MorphError> {
        let signal = match self.layout {
            SourceLayout::DifferenceTables => table_deltas(files, KEY, Aggregation::First)?,
            SourceLayout::Rasters => raster_absolute(files, KEY, ctx)?,
        };

        Ok(SignalSet::new().with(KEY, signal))
    }

    fn morph(
        &self,
        baseline: &HourlySeries,
        signals: &SignalSet,
        _ctx: &MorphContext,
    ) -> Result<HourlySeries, MorphError> {
        let factors = match self.layout {
            SourceLayout::DifferenceTables => delta_factors(deltas(signals, KEY)?, baseline.mean()),
            SourceLayout::Rasters => {
                let (historic, future) = absolute(signals, KEY)?;
                ratio_factors(historic, future)
            }
        };

        for (month, alpha) in factors.iter().enumerate() {
            debug!("month {}: scaling factor {:.3}", month + 1, alpha);
        }

        let morphed = baseline.map_hours(|_, month, speed| knots_to_ms(factors[month] * speed));
        log_summary(Variable::WindSpeed, baseline, &morphed);
        Ok(morphed)
    }
}

/// `1 + delta_m / mean` with the deltas in m/s and the baseline mean converted from knots.
fn delta_factors(deltas: &[f64; 12], mean_knots: f64) -> [f64; 12] {
    let mean_ms = knots_to_ms(mean_knots);

    let mut factors = [1.0; 12];
    if mean_ms == 0.0 {
        return factors;
    }

    for (factor, delta) in factors.iter_mut().zip(deltas.iter()) {
        *factor = 1.0 + delta / mean_ms;
    }
    factors
}
