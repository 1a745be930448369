//! Error types for every stage of a morphing run.
use crate::morph::Variable;
use std::path::PathBuf;
use thiserror::Error;

/// Problems reading or validating a weather record.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("I/O error reading weather record: {0}")]
    Io(#[from] std::io::Error),

    #[error("weather record has {found} header lines, expected {expected}")]
    ShortHeader { found: usize, expected: usize },

    #[error("invalid location field {field} in record header: {value:?}")]
    BadLocation { field: &'static str, value: String },

    #[error("latitude {lat} / longitude {lon} outside the valid range")]
    LocationOutOfRange { lat: f64, lon: f64 },

    #[error("row {row} has {found} fields, expected {expected}")]
    FieldCount {
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("could not parse column {column} at row {row}: {value:?}")]
    BadValue {
        row: usize,
        column: usize,
        value: String,
    },

    #[error("record has {found} data rows, expected {expected}")]
    RowCount { found: usize, expected: usize },

    #[error(transparent)]
    Length(#[from] SeriesLengthError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// An hourly series did not cover exactly one non-leap year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("hourly series has {found} values, expected {expected}")]
pub struct SeriesLengthError {
    pub found: usize,
    pub expected: usize,
}

/// Problems parsing a difference table.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("only found {found} monthly values in {path}")]
    TooFewMonths { path: PathBuf, found: usize },

    #[error("month block {month} in {path} has no valid values")]
    EmptyMonth { path: PathBuf, month: String },
}

/// Problems loading a raster grid.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF error: {0}")]
    Tiff(String),

    #[error("missing geotransform: {0}")]
    MissingGeotransform(String),

    #[error("grid of {width}x{height} does not match {len} values")]
    Shape {
        width: usize,
        height: usize,
        len: usize,
    },
}

impl From<tiff::TiffError> for RasterError {
    fn from(e: tiff::TiffError) -> Self {
        RasterError::Tiff(e.to_string())
    }
}

/// Failure to obtain a value from a raster at a point.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("{path}: {source}")]
    Raster { path: PathBuf, source: RasterError },

    #[error("point ({lat}, {lon}) lies outside the raster")]
    OutOfBounds { lat: f64, lon: f64 },

    #[error("no usable neighbourhood around ({lat}, {lon})")]
    Missing { lat: f64, lon: f64 },

    #[error("expected {expected} monthly rasters, found {found}")]
    FileCount { expected: usize, found: usize },
}

/// Problems indexing the climate source directory.
#[derive(Debug, Error)]
pub enum LocateError {
    #[error("climate data root {0} does not exist")]
    MissingRoot(PathBuf),

    #[error("I/O error listing {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Problems loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A numeric failure for a single hour; callers fall back to the baseline value.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CalcError {
    #[error("logarithm of non-positive value {0}")]
    NonPositiveLog(f64),

    #[error("non-finite result")]
    NonFinite,
}

/// Failure of a single variable. The pipeline records these and keeps going.
#[derive(Debug, Error)]
pub enum MorphError {
    #[error("missing required climate files: {}", .0.join(", "))]
    MissingInputFile(Vec<String>),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{variable} needs morphed {missing} first")]
    DependencyUnmet {
        variable: Variable,
        missing: Variable,
    },

    #[error("raster sampling failed for {key}: {source}")]
    SampleMissing { key: String, source: SampleError },

    #[error("signal {0} not loaded")]
    MissingSignal(String),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Length(#[from] SeriesLengthError),
}

/// Invalid pipeline construction.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("variable {0} registered more than once")]
    Duplicate(Variable),

    #[error("dependency cycle among: {}", .0.iter().map(|v| v.key()).collect::<Vec<_>>().join(", "))]
    Cycle(Vec<Variable>),
}
