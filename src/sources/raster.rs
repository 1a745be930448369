//! GeoTIFF climate grids and point sampling.
//!
//! Grids are read with the pure Rust `tiff` crate. The geotransform comes from the
//! ModelPixelScale and ModelTiepoint tags and the no-data value from the GDAL tag when present.
//! Only the strips or tiles covering the cells around the sample point are decoded.
use crate::error::{RasterError, SampleError};
use crate::record::GeoLocation;
use log::{debug, warn};
use std::fmt::Write as _;
use std::fs::File;
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

/// Minimum number of valid cells a 2x2 window needs for a partial interpolation.
const MIN_VALID_CELLS: usize = 2;

/// The loaded part of a grid, in grid row/column indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    row0: usize,
    col0: usize,
    rows: usize,
    cols: usize,
}

impl Window {
    fn index(&self, row: usize, col: usize) -> Option<usize> {
        if row < self.row0 || col < self.col0 {
            return None;
        }
        let (r, c) = (row - self.row0, col - self.col0);
        if r >= self.rows || c >= self.cols {
            return None;
        }
        Some(r * self.cols + c)
    }
}

/// A single band raster on a regular latitude/longitude grid, possibly only partly loaded.
#[derive(Debug, Clone)]
pub struct Raster {
    width: usize,
    height: usize,
    window: Window,
    /// Row major over the window, row 0 is towards the northern edge.
    data: Vec<f32>,
    /// Longitude of the western edge of column 0.
    west: f64,
    /// Latitude of the northern edge of row 0.
    north: f64,
    /// Degrees per pixel in x and y.
    pixel_width: f64,
    pixel_height: f64,
    nodata: Option<f32>,
}

impl Raster {
    /// Build a raster from a row major grid. Row 0 is the northern edge.
    pub fn from_grid(
        width: usize,
        height: usize,
        data: Vec<f32>,
        west: f64,
        north: f64,
        pixel_size: f64,
        nodata: Option<f32>,
    ) -> Result<Self, RasterError> {
        if data.len() != width * height || width == 0 || height == 0 {
            return Err(RasterError::Shape {
                width,
                height,
                len: data.len(),
            });
        }

        Ok(Raster {
            width,
            height,
            window: Window {
                row0: 0,
                col0: 0,
                rows: height,
                cols: width,
            },
            data,
            west,
            north,
            pixel_width: pixel_size,
            pixel_height: pixel_size,
            nodata,
        })
    }

    /// Open a GeoTIFF, decoding only the cells within one pixel of the point `(lat, lon)`.
    ///
    /// A point outside the grid gives a raster with nothing loaded; sampling it reports
    /// [`SampleError::OutOfBounds`].
    pub fn open_around<P: AsRef<Path>>(path: P, lat: f64, lon: f64) -> Result<Self, RasterError> {
        let file = File::open(path.as_ref())?;
        let mut decoder = Decoder::new(file)?;

        let (width, height) = decoder.dimensions()?;
        let (width, height) = (width as usize, height as usize);

        let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok();
        let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok();

        let (west, north, pixel_width, pixel_height) = match (scale, tiepoint) {
            // ModelTiepoint is [I, J, K, X, Y, Z], ModelPixelScale is [ScaleX, ScaleY, ScaleZ].
            (Some(scale), Some(tie)) if scale.len() >= 2 && tie.len() >= 6 => (
                tie[3] - tie[0] * scale[0],
                tie[4] + tie[1] * scale[1],
                scale[0],
                scale[1],
            ),
            _ => {
                return Err(RasterError::MissingGeotransform(
                    "no ModelPixelScale/ModelTiepoint tags".to_owned(),
                ))
            }
        };

        let nodata = decoder
            .get_tag_ascii_string(Tag::GdalNodata)
            .ok()
            .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f32>().ok());

        let mut raster = Raster {
            width,
            height,
            window: Window {
                row0: 0,
                col0: 0,
                rows: 0,
                cols: 0,
            },
            data: vec![],
            west,
            north,
            pixel_width,
            pixel_height,
            nodata,
        };

        let (row, col) = match raster.nearest_pixel(lat, lon) {
            Some(rc) => rc,
            None => return Ok(raster),
        };

        let row0 = row.saturating_sub(1);
        let col0 = col.saturating_sub(1);
        let window = Window {
            row0,
            col0,
            rows: (row + 2).min(height) - row0,
            cols: (col + 2).min(width) - col0,
        };
        raster.data = read_window(&mut decoder, width, window)?;
        raster.window = window;

        Ok(raster)
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// The cell value at `(row, col)`, `None` outside the loaded cells or for no-data.
    pub fn cell(&self, row: isize, col: isize) -> Option<f64> {
        if row < 0 || col < 0 {
            return None;
        }

        let idx = self.window.index(row as usize, col as usize)?;
        let v = self.data[idx];
        if self.is_valid(v) {
            Some(f64::from(v))
        } else {
            None
        }
    }

    fn is_valid(&self, v: f32) -> bool {
        if !v.is_finite() || v <= -3.0e38 {
            return false;
        }

        match self.nodata {
            Some(nd) => (v - nd).abs() > f32::EPSILON * nd.abs().max(1.0),
            None => true,
        }
    }

    /// Fractional pixel coordinates of a point, measured between pixel centres.
    fn pixel_coords(&self, lat: f64, lon: f64) -> (f64, f64) {
        let col = (lon - self.west) / self.pixel_width - 0.5;
        let row = (self.north - lat) / self.pixel_height - 0.5;
        (row, col)
    }

    /// The pixel nearest to a point, `None` outside the grid.
    fn nearest_pixel(&self, lat: f64, lon: f64) -> Option<(usize, usize)> {
        let (row_f, col_f) = self.pixel_coords(lat, lon);
        let row = row_f.round();
        let col = col_f.round();
        if !(row >= 0.0 && col >= 0.0 && row < self.height as f64 && col < self.width as f64) {
            return None;
        }
        Some((row as usize, col as usize))
    }

    /// Interpolated value at a point, or the reason none could be produced.
    pub fn sample(&self, lat: f64, lon: f64) -> Result<f64, SampleError> {
        let (row, col) = self
            .nearest_pixel(lat, lon)
            .ok_or(SampleError::OutOfBounds { lat, lon })?;
        let (row_f, col_f) = self.pixel_coords(lat, lon);
        let (row, col) = (row as isize, col as isize);

        let mut hood = Neighborhood::default();
        for (i, r) in (row - 1..=row + 1).enumerate() {
            for (j, c) in (col - 1..=col + 1).enumerate() {
                hood.cells[i][j] = self.cell(r, c);
            }
        }

        // Position of the point inside the 3x3 block, each axis in [0, 2].
        let y = (row_f - (row - 1) as f64).max(0.0).min(2.0);
        let x = (col_f - (col - 1) as f64).max(0.0).min(2.0);

        hood.interpolate(y, x).ok_or_else(|| {
            warn!(
                "no usable neighbourhood at ({:.4}, {:.4}):\n{}",
                lat, lon, hood
            );
            SampleError::Missing { lat, lon }
        })
    }
}

/// Decode the cells of `window` from the strips or tiles that cover it. Only the first band is kept.
fn read_window(
    decoder: &mut Decoder<File>,
    width: usize,
    window: Window,
) -> Result<Vec<f32>, RasterError> {
    let (chunk_w, chunk_h) = decoder.chunk_dimensions();
    let (chunk_w, chunk_h) = (chunk_w as usize, chunk_h as usize);
    if chunk_w == 0 || chunk_h == 0 {
        return Err(RasterError::Tiff("zero sized strips or tiles".to_owned()));
    }
    let chunks_across = (width + chunk_w - 1) / chunk_w;

    let mut data = vec![f32::NAN; window.rows * window.cols];
    let last_row = window.row0 + window.rows - 1;
    let last_col = window.col0 + window.cols - 1;

    for chunk_row in window.row0 / chunk_h..=last_row / chunk_h {
        for chunk_col in window.col0 / chunk_w..=last_col / chunk_w {
            let index = (chunk_row * chunks_across + chunk_col) as u32;
            let (data_w, data_h) = decoder.chunk_data_dimensions(index);
            let (data_w, data_h) = (data_w as usize, data_h as usize);
            let values = to_f32(decoder.read_chunk(index)?);

            let samples = values.len() / (data_w * data_h).max(1);
            if samples == 0 {
                return Err(RasterError::Tiff(format!("chunk {} is empty", index)));
            }

            let top = chunk_row * chunk_h;
            let left = chunk_col * chunk_w;
            for r in 0..data_h {
                for c in 0..data_w {
                    if let Some(idx) = window.index(top + r, left + c) {
                        data[idx] = values[(r * data_w + c) * samples];
                    }
                }
            }
        }
    }

    debug!(
        "decoded rows {}..={} cols {}..={} from {}x{} chunks",
        window.row0, last_row, window.col0, last_col, chunk_w, chunk_h
    );

    Ok(data)
}

fn to_f32(result: DecodingResult) -> Vec<f32> {
    match result {
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f32).collect(),
    }
}

/// The 3x3 block of cells around the nearest pixel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Neighborhood {
    pub cells: [[Option<f64>; 3]; 3],
}

impl Neighborhood {
    /// Interpolate at `(y, x)` within the block, both in [0, 2].
    ///
    /// The 2x2 window containing the point is tried with full bilinear weights. When any of
    /// its cells is missing, the four quadrants are tried in order (NW, NE, SW, SE) and the
    /// first with at least two valid cells wins.
    pub fn interpolate(&self, y: f64, x: f64) -> Option<f64> {
        let qy = if y >= 1.0 { 1 } else { 0 };
        let qx = if x >= 1.0 { 1 } else { 0 };

        let primary = self.quadrant(qy, qx);
        if primary.iter().flatten().all(Option::is_some) {
            return bilinear(primary, y - qy as f64, x - qx as f64);
        }

        [(0, 0), (0, 1), (1, 0), (1, 1)]
            .iter()
            .find_map(|&(qy, qx)| {
                let fy = (y - qy as f64).max(0.0).min(1.0);
                let fx = (x - qx as f64).max(0.0).min(1.0);
                bilinear(self.quadrant(qy, qx), fy, fx)
            })
    }

    fn quadrant(&self, qy: usize, qx: usize) -> [[Option<f64>; 2]; 2] {
        [
            [self.cells[qy][qx], self.cells[qy][qx + 1]],
            [self.cells[qy + 1][qx], self.cells[qy + 1][qx + 1]],
        ]
    }
}

impl std::fmt::Display for Neighborhood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = String::new();
        for row in &self.cells {
            for cell in row {
                match cell {
                    Some(v) => write!(out, "{:>10.3}", v)?,
                    None => write!(out, "{:>10}", "--")?,
                }
            }
            out.push('\n');
        }
        f.write_str(out.trim_end())
    }
}

/// Bilinear interpolation over a 2x2 window with weights renormalised over the valid cells.
///
/// `y_frac` and `x_frac` are the offsets from the top-left cell. Returns `None` when fewer than
/// two cells are valid or the valid cells carry no weight.
pub fn bilinear(cells: [[Option<f64>; 2]; 2], y_frac: f64, x_frac: f64) -> Option<f64> {
    let weights = [
        [(1.0 - y_frac) * (1.0 - x_frac), (1.0 - y_frac) * x_frac],
        [y_frac * (1.0 - x_frac), y_frac * x_frac],
    ];

    let mut count = 0;
    let mut total_weight = 0.0;
    let mut sum = 0.0;
    for (row, wrow) in cells.iter().zip(weights.iter()) {
        for (cell, &w) in row.iter().zip(wrow.iter()) {
            if let Some(v) = cell {
                count += 1;
                total_weight += w;
                sum += w * v;
            }
        }
    }

    if count < MIN_VALID_CELLS || total_weight <= f64::EPSILON {
        return None;
    }

    Some(sum / total_weight)
}

/// Samples climate rasters at the run's location, opening each file only for the read.
#[derive(Debug, Clone)]
pub struct RasterSampler {
    lat: f64,
    lon: f64,
}

impl RasterSampler {
    pub fn new(location: &GeoLocation) -> Self {
        RasterSampler {
            lat: location.latitude,
            lon: location.longitude,
        }
    }

    /// Sample one raster file, multiplying the result by `scale`.
    pub fn sample(&self, path: &Path, scale: f64) -> Result<f64, SampleError> {
        let raster = Raster::open_around(path, self.lat, self.lon).map_err(|source| {
            SampleError::Raster {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let value = raster.sample(self.lat, self.lon)? * scale;
        debug!("{}: {:.4}", path.display(), value);
        Ok(value)
    }

    /// Sample twelve monthly rasters in file name order. Any failure fails the whole set.
    pub fn sample_monthly(&self, files: &[PathBuf], scale: f64) -> Result<[f64; 12], SampleError> {
        if files.len() != 12 {
            return Err(SampleError::FileCount {
                expected: 12,
                found: files.len(),
            });
        }

        let mut sorted: Vec<&PathBuf> = files.iter().collect();
        sorted.sort_by_key(|p| p.file_name().map(|n| n.to_owned()));

        let mut out = [0.0; 12];
        for (month, path) in sorted.into_iter().enumerate() {
            out[month] = self.sample(path, scale).map_err(|err| {
                warn!("month {} of {}: {}", month + 1, path.display(), err);
                err
            })?;
        }

        Ok(out)
    }
}
