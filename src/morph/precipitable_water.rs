//! Precipitable water.
//!
//! Two weather record conventions store this column with a factor of ten between them. The
//! convention is detected from the record's file name, falling back to the size of the mean,
//! and IWEC values are converted before scaling.
use super::{
    absolute, deltas, log_summary, ratio_factors, raster_absolute, table_deltas, MorphContext,
    Morpher, Variable,
};
use crate::error::MorphError;
use crate::series::{HourlySeries, SignalSet};
use crate::sources::{Aggregation, ClimateFileSet, SourceLayout};
use log::{debug, info};
use std::path::Path;

const KEY: &str = "PREC";

/// Means below this are taken to be in IWEC units.
const IWEC_MEAN_THRESHOLD: f64 = 0.1;
const IWEC_TO_TMYX: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrecipitableWaterFormat {
    Iwec,
    Tmyx,
}

impl PrecipitableWaterFormat {
    /// Detect the convention from a file name hint, then from the data.
    pub fn detect(path: Option<&Path>, baseline: &HourlySeries) -> Self {
        let name = path
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("");

        if name.contains("IWEC") {
            PrecipitableWaterFormat::Iwec
        } else if name.contains("TMYx") {
            PrecipitableWaterFormat::Tmyx
        } else if baseline.mean() < IWEC_MEAN_THRESHOLD {
            PrecipitableWaterFormat::Iwec
        } else {
            PrecipitableWaterFormat::Tmyx
        }
    }

    /// Convert a baseline series into TMYx units.
    pub fn normalize(self, baseline: &HourlySeries) -> HourlySeries {
        match self {
            PrecipitableWaterFormat::Iwec => baseline.map_hours(|_, _, v| v * IWEC_TO_TMYX),
            PrecipitableWaterFormat::Tmyx => baseline.clone(),
        }
    }
}

/// Scales precipitable water by a monthly factor.
#[derive(Debug, Clone, Copy)]
pub struct PrecipitableWaterMorpher {
    layout: SourceLayout,
}

impl PrecipitableWaterMorpher {
    pub fn new(layout: SourceLayout) -> Self {
        PrecipitableWaterMorpher { layout }
    }
}

impl Morpher for PrecipitableWaterMorpher {
    fn variable(&self) -> Variable {
        Variable::PrecipitableWater
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
            // zero is a real change for precipitation, so every valid cell counts
            SourceLayout::DifferenceTables => table_deltas(files, KEY, Aggregation::Mean)?,
            SourceLayout::Rasters => raster_absolute(files, KEY, ctx)?,
        };

        Ok(SignalSet::new().with(KEY, signal))
    }

    fn morph(
        &self,
        baseline: &HourlySeries,
        signals: &SignalSet,
        ctx: &MorphContext,
    ) -> Result<HourlySeries, MorphError> {
        let format = PrecipitableWaterFormat::detect(ctx.record.path(), baseline);
        info!("precipitable water format: {:?}", format);
        let processed = format.normalize(baseline);

        let factors = match self.layout {
            SourceLayout::DifferenceTables => {
                let base_mean = processed.mean();
                let mut factors = [1.0; 12];
                if base_mean > 0.0 {
                    for (factor, delta) in factors.iter_mut().zip(deltas(signals, KEY)?.iter()) {
                        *factor = 1.0 + delta / base_mean;
                    }
                }
                factors
            }
            SourceLayout::Rasters => {
                let (historic, future) = absolute(signals, KEY)?;
                ratio_factors(historic, future)
            }
        };

        for (month, alpha) in factors.iter().enumerate() {
            debug!(
                "month {}: scaling factor {:.6} ({:+.2}%)",
                month + 1,
                alpha,
                (alpha - 1.0) * 100.0
            );
        }

        let morphed = processed.map_hours(|_, month, v| factors[month] * v);
        log_summary(Variable::PrecipitableWater, &processed, &morphed);
        Ok(morphed)
    }
}
