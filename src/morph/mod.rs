//! Per-variable morphing algorithms.
//!
//! Every variable implements [`Morpher`]: it names the climate files it needs and the variables
//! that must already be morphed, loads its monthly signals, then turns a baseline series into a
//! morphed one. The pipeline drives these in dependency order.
use crate::config::MorphConfig;
use crate::error::{CalcError, MorphError};
use crate::pipeline::ResultStore;
use crate::record::{GeoLocation, WeatherRecord};
use crate::series::{HourlySeries, MonthlySignal, SignalSet};
use crate::sources::{Aggregation, ClimateFileSet, DifferenceTableParser, RasterSampler};
use log::{info, warn};
use std::fmt;
use strum::AsStaticRef;
use strum_macros::{AsStaticStr, EnumIter, EnumString};

pub mod dew_point;
pub mod humidity;
pub mod precipitable_water;
pub mod solar;
pub mod temperature;
pub mod transfer;
pub mod wind;

pub use self::dew_point::DewPointMorpher;
pub use self::humidity::RelativeHumidityMorpher;
pub use self::precipitable_water::{PrecipitableWaterMorpher, PrecipitableWaterFormat};
pub use self::solar::SolarRadiationMorpher;
pub use self::temperature::TemperatureMorpher;
pub use self::wind::WindSpeedMorpher;

/// The weather record variables that can be morphed.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, EnumString, AsStaticStr, EnumIter, Hash,
)]
pub enum Variable {
    #[strum(serialize = "TEMP")]
    DryBulb,
    #[strum(serialize = "DPT")]
    DewPoint,
    #[strum(serialize = "RH")]
    RelativeHumidity,
    #[strum(serialize = "SOLRAD")]
    SolarRadiation,
    #[strum(serialize = "WIND")]
    WindSpeed,
    #[strum(serialize = "PREC")]
    PrecipitableWater,
}

impl Variable {
    /// Short key used in results, configuration and on the command line.
    pub fn key(self) -> &'static str {
        self.as_static()
    }

    /// Column index of the variable in a weather record row.
    pub fn column(self) -> usize {
        use Variable::*;

        match self {
            DryBulb => 6,
            DewPoint => 7,
            RelativeHumidity => 8,
            SolarRadiation => 13,
            WindSpeed => 21,
            PrecipitableWater => 28,
        }
    }

    pub fn description(self) -> &'static str {
        use Variable::*;

        match self {
            DryBulb => "dry bulb temperature",
            DewPoint => "dew point temperature",
            RelativeHumidity => "relative humidity",
            SolarRadiation => "global horizontal radiation",
            WindSpeed => "wind speed",
            PrecipitableWater => "precipitable water",
        }
    }

    /// Unit of the morphed output.
    pub fn units(self) -> &'static str {
        use Variable::*;

        match self {
            DryBulb | DewPoint => "\u{00b0}C",
            RelativeHumidity => "%",
            SolarRadiation => "W/m\u{00b2}",
            WindSpeed => "m/s",
            PrecipitableWater => "mm",
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Everything a morpher may consult besides its own baseline and signals.
#[derive(Clone, Copy)]
pub struct MorphContext<'a> {
    pub record: &'a WeatherRecord,
    pub city: Option<&'a str>,
    pub config: &'a MorphConfig,
    /// Series already produced earlier in this run.
    pub results: &'a ResultStore,
}

impl<'a> MorphContext<'a> {
    pub fn location(&self) -> &'a GeoLocation {
        self.record.location()
    }

    /// A morphed series produced earlier in the run, required by `requester`.
    pub fn prior(&self, requester: Variable, needed: Variable) -> Result<&'a HourlySeries, MorphError> {
        self.results
            .get(needed)
            .ok_or(MorphError::DependencyUnmet {
                variable: requester,
                missing: needed,
            })
    }

    /// The unmorphed series for a variable, read from the record.
    pub fn baseline(&self, variable: Variable) -> Result<HourlySeries, MorphError> {
        Ok(self.record.column(variable.column())?)
    }

    fn sampler(&self) -> RasterSampler {
        RasterSampler::new(self.location())
    }
}

/// A morphing algorithm for one variable.
pub trait Morpher {
    fn variable(&self) -> Variable;

    fn column(&self) -> usize {
        self.variable().column()
    }

    /// Climate file keys that must be present before this morpher can run.
    fn requires(&self) -> Vec<String>;

    /// Variables whose morphed series this morpher consumes.
    fn depends_on(&self) -> &[Variable] {
        &[]
    }

    fn load_signals(
        &self,
        files: &ClimateFileSet,
        ctx: &MorphContext,
    ) -> Result<SignalSet, MorphError>;

    fn morph(
        &self,
        baseline: &HourlySeries,
        signals: &SignalSet,
        ctx: &MorphContext,
    ) -> Result<HourlySeries, MorphError>;
}

/*--------------------------------------------------------------------------------------------------
                                   Loading signals from sources
--------------------------------------------------------------------------------------------------*/
fn files_for<'f>(files: &'f ClimateFileSet, key: &str) -> Result<&'f [std::path::PathBuf], MorphError> {
    files
        .get(key)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| MorphError::MissingInputFile(vec![key.to_owned()]))
}

/// Monthly deltas from the first difference table under `key`.
pub(crate) fn table_deltas(
    files: &ClimateFileSet,
    key: &str,
    aggregation: Aggregation,
) -> Result<MonthlySignal, MorphError> {
    let path = &files_for(files, key)?[0];
    let deltas = DifferenceTableParser::new(aggregation).parse(path)?;
    Ok(MonthlySignal::Delta(deltas))
}

/// Twelve monthly raster samples under `key` as a historic climatology.
pub(crate) fn raster_monthly(
    files: &ClimateFileSet,
    key: &str,
    ctx: &MorphContext,
) -> Result<[f64; 12], MorphError> {
    let paths = files_for(files, key)?;
    ctx.sampler()
        .sample_monthly(paths, ctx.config.scale_for(key))
        .map_err(|source| MorphError::SampleMissing {
            key: key.to_owned(),
            source,
        })
}

/// A single future raster sample under `key`.
pub(crate) fn raster_single(
    files: &ClimateFileSet,
    key: &str,
    ctx: &MorphContext,
) -> Result<f64, MorphError> {
    let path = &files_for(files, key)?[0];
    ctx.sampler()
        .sample(path, ctx.config.scale_for(key))
        .map_err(|source| MorphError::SampleMissing {
            key: key.to_owned(),
            source,
        })
}

/// Historic monthly values and the future value for one raster quantity, e.g. `WIND`.
pub(crate) fn raster_absolute(
    files: &ClimateFileSet,
    quantity: &str,
    ctx: &MorphContext,
) -> Result<MonthlySignal, MorphError> {
    let historic = raster_monthly(files, &format!("{}_historic", quantity), ctx)?;
    let future = raster_single(files, &format!("{}_future", quantity), ctx)?;
    Ok(MonthlySignal::Absolute {
        historic: Some(historic),
        future,
    })
}

pub(crate) fn signal<'s>(signals: &'s SignalSet, key: &str) -> Result<&'s MonthlySignal, MorphError> {
    signals
        .get(key)
        .ok_or_else(|| MorphError::MissingSignal(key.to_owned()))
}

pub(crate) fn deltas<'s>(signals: &'s SignalSet, key: &str) -> Result<&'s [f64; 12], MorphError> {
    signal(signals, key)?
        .deltas()
        .ok_or_else(|| MorphError::MissingSignal(key.to_owned()))
}

/// Historic monthly climatology and future value of an absolute signal.
pub(crate) fn absolute<'s>(
    signals: &'s SignalSet,
    key: &str,
) -> Result<(&'s [f64; 12], f64), MorphError> {
    let sig = signal(signals, key)?;
    match (sig.historic(), sig.future()) {
        (Some(historic), Some(future)) => Ok((historic, future)),
        _ => Err(MorphError::MissingSignal(key.to_owned())),
    }
}

/// Monthly multiplicative factors `1 + (future - historic_m) / historic_m`. Months with a zero
/// historic value are not scaled.
pub(crate) fn ratio_factors(historic: &[f64; 12], future: f64) -> [f64; 12] {
    let mut factors = [1.0; 12];
    for (factor, &hist) in factors.iter_mut().zip(historic.iter()) {
        if hist != 0.0 {
            *factor = 1.0 + (future - hist) / hist;
        }
    }
    factors
}

/*--------------------------------------------------------------------------------------------------
                                    Per-hour failure handling
--------------------------------------------------------------------------------------------------*/
/// Number of per-hour fallbacks logged individually before only counting.
const FALLBACK_LOG_LIMIT: usize = 5;

/// Replaces failed per-hour calculations with the baseline value and keeps the log readable.
#[derive(Debug)]
pub(crate) struct HourlyFallback {
    variable: Variable,
    count: usize,
}

impl HourlyFallback {
    pub(crate) fn new(variable: Variable) -> Self {
        HourlyFallback { variable, count: 0 }
    }

    /// The calculated value, or `baseline` if the calculation failed or is not finite.
    pub(crate) fn resolve(&mut self, hour: usize, baseline: f64, value: Result<f64, CalcError>) -> f64 {
        let err = match value {
            Ok(v) if v.is_finite() => return v,
            Ok(_) => CalcError::NonFinite,
            Err(err) => err,
        };

        self.count += 1;
        if self.count <= FALLBACK_LOG_LIMIT {
            warn!(
                "{} hour {}: {}, keeping baseline value {}",
                self.variable, hour, err, baseline
            );
        }

        baseline
    }

    #[cfg(test)]
    pub(crate) fn count(&self) -> usize {
        self.count
    }

    /// Log the total if some failures went unreported.
    pub(crate) fn finish(self) -> usize {
        if self.count > FALLBACK_LOG_LIMIT {
            warn!(
                "{}: {} hours in total kept their baseline value",
                self.variable, self.count
            );
        }
        self.count
    }
}

/// Log the range and mean of the baseline and morphed series.
pub(crate) fn log_summary(variable: Variable, baseline: &HourlySeries, morphed: &HourlySeries) {
    let units = variable.units();
    info!(
        "{}: baseline {:.1} to {:.1} {} (mean {:.2}), morphed {:.1} to {:.1} {} (mean {:.2})",
        variable.description(),
        baseline.min(),
        baseline.max(),
        units,
        baseline.mean(),
        morphed.min(),
        morphed.max(),
        units,
        morphed.mean(),
    );
}
