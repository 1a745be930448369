//! Reading and rewriting fixed-column hourly weather records.
//!
//! A record is 8 header lines followed by one comma separated row per hour. Rows are kept as
//! text so untouched columns are written back byte for byte.
use crate::calendar::{count_calendar_mismatches, HOURS_PER_YEAR};
use crate::error::RecordError;
use crate::series::HourlySeries;
use log::{info, warn};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const HEADER_LINES: usize = 8;
pub const FIELDS_PER_ROW: usize = 35;

/// Column names of the 35 fields of a data row, in order.
pub const COLUMN_NAMES: [&str; FIELDS_PER_ROW] = [
    "Year",
    "Month",
    "Day",
    "Hour",
    "Minute",
    "Data Source and Uncertainty Flags",
    "Dry Bulb Temperature",
    "Dew Point Temperature",
    "Relative Humidity",
    "Atmospheric Station Pressure",
    "Extraterrestrial Horizontal Radiation",
    "Extraterrestrial Direct Normal Radiation",
    "Horizontal Infrared Radiation Intensity",
    "Global Horizontal Radiation",
    "Direct Normal Radiation",
    "Diffuse Horizontal Radiation",
    "Global Horizontal Illuminance",
    "Direct Normal Illuminance",
    "Diffuse Horizontal Illuminance",
    "Zenith Luminance",
    "Wind Direction",
    "Wind Speed",
    "Total Sky Cover",
    "Opaque Sky Cover",
    "Visibility",
    "Ceiling Height",
    "Present Weather Observation",
    "Present Weather Codes",
    "Precipitable Water",
    "Aerosol Optical Depth",
    "Snow Depth",
    "Days Since Last Snowfall",
    "Albedo",
    "Liquid Precipitation Depth",
    "Liquid Precipitation Quantity",
];

/// Site metadata from the first header line.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoLocation {
    pub city: String,
    pub state: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub time_zone: f64,
    pub elevation: f64,
}

impl GeoLocation {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, RecordError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(RecordError::LocationOutOfRange {
                lat: latitude,
                lon: longitude,
            });
        }

        Ok(GeoLocation {
            city: String::new(),
            state: String::new(),
            country: String::new(),
            latitude,
            longitude,
            time_zone: 0.0,
            elevation: 0.0,
        })
    }

    /// Parse a `LOCATION,city,state,country,source,wmo,lat,lon,tz,elev` header line.
    pub fn parse_header(line: &str) -> Result<Self, RecordError> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();

        let number = |idx: usize, field: &'static str| -> Result<f64, RecordError> {
            fields
                .get(idx)
                .and_then(|v| v.parse::<f64>().ok())
                .ok_or_else(|| RecordError::BadLocation {
                    field,
                    value: fields.get(idx).map(|s| s.to_string()).unwrap_or_default(),
                })
        };

        let text = |idx: usize| fields.get(idx).map(|s| s.to_string()).unwrap_or_default();

        let mut loc = GeoLocation::new(number(6, "latitude")?, number(7, "longitude")?)?;
        loc.city = text(1);
        loc.state = text(2);
        loc.country = text(3);
        loc.time_zone = number(8, "time zone").unwrap_or(0.0);
        loc.elevation = number(9, "elevation").unwrap_or(0.0);

        Ok(loc)
    }
}

/// An hourly weather record held as header text plus raw data rows.
#[derive(Debug, Clone)]
pub struct WeatherRecord {
    path: Option<PathBuf>,
    header: Vec<String>,
    /// Every line after the header, blank ones included so they can be written back.
    body: Vec<String>,
    num_rows: usize,
    location: GeoLocation,
    line_ending: &'static str,
}

impl WeatherRecord {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RecordError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let mut record = Self::parse(&text)?;
        record.path = Some(path.to_path_buf());
        Ok(record)
    }

    pub fn parse(text: &str) -> Result<Self, RecordError> {
        let line_ending = if text.contains("\r\n") { "\r\n" } else { "\n" };

        let mut lines = text.lines();
        let header: Vec<String> = lines
            .by_ref()
            .take(HEADER_LINES)
            .map(str::to_owned)
            .collect();

        if header.len() < HEADER_LINES {
            return Err(RecordError::ShortHeader {
                found: header.len(),
                expected: HEADER_LINES,
            });
        }

        let body: Vec<String> = lines.map(str::to_owned).collect();

        let mut num_rows = 0;
        for (i, row) in body.iter().filter(|l| !is_blank(l)).enumerate() {
            num_rows += 1;
            let found = row.split(',').count();
            if found != FIELDS_PER_ROW {
                return Err(RecordError::FieldCount {
                    row: i,
                    found,
                    expected: FIELDS_PER_ROW,
                });
            }
        }

        let location = GeoLocation::parse_header(&header[0])?;

        let record = WeatherRecord {
            path: None,
            header,
            body,
            num_rows,
            location,
            line_ending,
        };

        let mismatches = count_calendar_mismatches(record.stamps());
        if mismatches > 0 {
            warn!(
                "{} rows do not follow the standard non-leap calendar",
                mismatches
            );
        }

        Ok(record)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn location(&self) -> &GeoLocation {
        &self.location
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    fn rows(&self) -> impl Iterator<Item = &String> + '_ {
        self.body.iter().filter(|l| !is_blank(l))
    }

    /// Parse one column of every row into an hourly series.
    pub fn column(&self, column: usize) -> Result<HourlySeries, RecordError> {
        let values = self
            .rows()
            .enumerate()
            .map(|(row, line)| {
                let raw = line.split(',').nth(column).unwrap_or("").trim();
                raw.parse::<f64>().map_err(|_| RecordError::BadValue {
                    row,
                    column,
                    value: raw.to_owned(),
                })
            })
            .collect::<Result<Vec<f64>, RecordError>>()?;

        Ok(HourlySeries::new(values)?)
    }

    fn stamps(&self) -> impl Iterator<Item = (u32, u32, u32)> + '_ {
        self.rows().take(HOURS_PER_YEAR).map(|line| {
            let mut fields = line.split(',').skip(1).map(|f| f.trim().parse::<u32>().unwrap_or(0));
            let month = fields.next().unwrap_or(0);
            let day = fields.next().unwrap_or(0);
            let hour = fields.next().unwrap_or(0);
            (month, day, hour)
        })
    }

    /// The lines after the header with morphed columns substituted, formatted to one decimal
    /// place. Blank lines pass through unchanged.
    pub fn morphed_rows<'a>(
        &'a self,
        columns: &'a MorphedColumnSet,
    ) -> impl Iterator<Item = String> + 'a {
        let mut next_hour = 0;
        self.body.iter().map(move |line| {
            if is_blank(line) {
                return line.clone();
            }
            let hour = next_hour;
            next_hour += 1;

            if columns.is_empty() {
                return line.clone();
            }

            line.split(',')
                .enumerate()
                .map(|(col, field)| match columns.get(col) {
                    Some(series) if hour < series.len() => format!("{:.1}", series[hour]),
                    _ => field.to_owned(),
                })
                .collect::<Vec<_>>()
                .join(",")
        })
    }

    /// Write this record with `columns` substituted, keeping the header verbatim.
    pub fn write_morphed<W: Write>(
        &self,
        wtr: W,
        columns: &MorphedColumnSet,
    ) -> Result<(), RecordError> {
        let mut wtr = BufWriter::new(wtr);

        for line in &self.header {
            write!(wtr, "{}{}", line, self.line_ending)?;
        }
        for line in self.morphed_rows(columns) {
            write!(wtr, "{}{}", line, self.line_ending)?;
        }
        wtr.flush()?;

        Ok(())
    }

    pub fn write_morphed_to<P: AsRef<Path>>(
        &self,
        path: P,
        columns: &MorphedColumnSet,
    ) -> Result<(), RecordError> {
        let file = File::create(path.as_ref())?;
        self.write_morphed(file, columns)?;
        info!("wrote morphed record {}", path.as_ref().display());
        Ok(())
    }

    /// Write the data rows as CSV with named columns.
    pub fn export_csv<W: Write>(&self, wtr: W) -> Result<(), RecordError> {
        let mut wtr = csv::Writer::from_writer(wtr);
        wtr.write_record(COLUMN_NAMES.iter())?;

        for line in self.rows() {
            wtr.write_record(line.split(','))?;
        }
        wtr.flush()?;

        Ok(())
    }
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Morphed values keyed by record column index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MorphedColumnSet(BTreeMap<usize, HourlySeries>);

impl MorphedColumnSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: usize, series: HourlySeries) {
        self.0.insert(column, series);
    }

    pub fn get(&self, column: usize) -> Option<&HourlySeries> {
        self.0.get(&column)
    }

    pub fn columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.keys().cloned()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
