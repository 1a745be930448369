//! Where monthly change signals come from: difference tables and raster grids.
pub mod dif;
pub mod locator;
pub mod raster;

pub use self::dif::{Aggregation, DifferenceTableParser};
pub use self::locator::{ClimateFileLocator, ClimateFileSet, SourceLayout};
pub use self::raster::{bilinear, Neighborhood, Raster, RasterSampler};
