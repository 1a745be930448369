//! Morph hourly weather records toward a future climate using monthly climate change signals.

//
// Public API
//
pub use config::{
    HumidityMode, MorphConfig, SeasonalScaling, TemperatureMode, ValidationRange, ValidationTable,
};
pub use error::{
    CalcError, ConfigError, LocateError, MorphError, ParseError, PipelineError, RasterError,
    RecordError, SampleError, SeriesLengthError,
};
pub use morph::{MorphContext, Morpher, Variable};
pub use output::{verify, ColumnCheck, OutputPlan};
pub use pipeline::{Manifest, MorphingPipeline, PipelineOutcome, ResultStore, VariableStatus};
pub use record::{GeoLocation, MorphedColumnSet, WeatherRecord};
pub use report::{manifest_table, monthly_table, ReportTable};
pub use series::{HourlySeries, MonthStats, MonthlySignal, SignalSet};
pub use sources::{ClimateFileLocator, ClimateFileSet, SourceLayout};
pub use util::bail;

pub mod calendar;
pub mod config;
pub mod error;
pub mod morph;
pub mod record;
pub mod series;
pub mod sources;
pub mod units;

//
// Internal only
//
mod output;
mod pipeline;
mod report;
mod util;
