//! Run configuration, loaded from YAML.
//!
//! Every field has a default so a missing or empty file is a valid configuration. Physical
//! plausibility ranges are only ever supplied here; none are compiled in.
use crate::error::ConfigError;
use crate::morph::Variable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

/// Options controlling how each variable is morphed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MorphConfig {
    /// Overrides the temperature algorithm chosen from the source layout.
    pub temperature_mode: Option<TemperatureMode>,

    /// Overrides the humidity algorithm chosen from the source layout.
    pub humidity_mode: Option<HumidityMode>,

    /// Multipliers applied to raster samples, keyed by climate file key.
    pub scale_factors: BTreeMap<String, f64>,

    /// Seasonal change table used by the solar radiation morph.
    pub solar: SeasonalScaling,

    /// Warning-only plausibility bounds.
    pub validation: ValidationTable,
}

impl Default for MorphConfig {
    fn default() -> Self {
        let mut scale_factors = BTreeMap::new();
        scale_factors.insert("TMAX_future".to_owned(), 0.1);
        scale_factors.insert("TMIN_future".to_owned(), 0.1);

        MorphConfig {
            temperature_mode: None,
            humidity_mode: None,
            scale_factors,
            solar: SeasonalScaling::default(),
            validation: ValidationTable::default(),
        }
    }
}

impl MorphConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: std::io::Read>(mut rdr: R) -> Result<Self, ConfigError> {
        let mut text = String::new();
        rdr.read_to_string(&mut text)?;

        if text.trim().is_empty() {
            return Ok(Self::default());
        }

        Ok(serde_yaml::from_str(&text)?)
    }

    /// Scale for raster samples of `key`, 1.0 when not configured.
    pub fn scale_for(&self, key: &str) -> f64 {
        self.scale_factors.get(key).cloned().unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureMode {
    /// Shift by the monthly mean change and stretch by the diurnal range change.
    ShiftAndScale,
    /// Bounded transfer-function morph between historic and future min/mean/max.
    TransferFunction,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HumidityMode {
    /// Add the monthly change in percentage points.
    Shift,
    /// Hold vapour pressure and recompute against the morphed dry bulb.
    Physical,
}

/// Fractional change in solar radiation by season, plus the overall clip.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SeasonalScaling {
    pub winter: f64,
    pub summer: f64,
    pub shoulder: f64,
    pub limit: f64,
}

impl Default for SeasonalScaling {
    fn default() -> Self {
        SeasonalScaling {
            winter: -0.05,
            summer: -0.08,
            shoulder: -0.06,
            limit: 0.10,
        }
    }
}

impl SeasonalScaling {
    /// Change factor for a 0 based month. Winter is Dec-Feb, summer Jun-Aug.
    pub fn for_month(&self, month: usize) -> f64 {
        match month {
            11 | 0 | 1 => self.winter,
            5 | 6 | 7 => self.summer,
            _ => self.shoulder,
        }
    }
}

/// Inclusive plausibility bounds for a variable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ValidationRange {
    pub min: f64,
    pub max: f64,
}

impl ValidationRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Plausibility bounds keyed by variable, with optional per-city overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationTable {
    pub defaults: BTreeMap<String, ValidationRange>,
    pub cities: BTreeMap<String, BTreeMap<String, ValidationRange>>,
}

impl ValidationTable {
    /// City specific bounds if configured, otherwise the default for the variable.
    pub fn range_for(&self, variable: Variable, city: Option<&str>) -> Option<ValidationRange> {
        let key = variable.key();

        city.and_then(|city| {
            self.cities
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(city))
                .and_then(|(_, ranges)| ranges.get(key))
        })
        .or_else(|| self.defaults.get(key))
        .cloned()
    }

    pub fn with_default(mut self, variable: Variable, range: ValidationRange) -> Self {
        self.defaults.insert(variable.key().to_owned(), range);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
temperature_mode: transfer_function
scale_factors:
  TMAX_future: 0.1
  SRAD_historic: 0.001
solar:
  summer: -0.1
validation:
  defaults:
    TEMP: { min: -30.0, max: 45.0 }
    RH: { min: 0.0, max: 100.0 }
  cities:
    Oslo:
      TEMP: { min: -35.0, max: 35.0 }
"#;

    #[test]
    fn empty_config_is_default() {
        let config = MorphConfig::from_reader("".as_bytes()).unwrap();
        assert_eq!(config, MorphConfig::default());
        assert_eq!(config.scale_for("TMIN_future"), 0.1);
        assert_eq!(config.scale_for("WIND_historic"), 1.0);
    }

    #[test]
    fn parse_sample() {
        let config = MorphConfig::from_reader(SAMPLE.as_bytes()).unwrap();

        assert_eq!(
            config.temperature_mode,
            Some(TemperatureMode::TransferFunction)
        );
        assert_eq!(config.humidity_mode, None);
        assert_eq!(config.scale_for("SRAD_historic"), 0.001);
        // scale_factors given explicitly replaces the default map
        assert_eq!(config.scale_for("TMIN_future"), 1.0);
        assert_eq!(config.solar.summer, -0.1);
        assert_eq!(config.solar.winter, -0.05);
    }

    #[test]
    fn city_ranges_override_defaults() {
        let config = MorphConfig::from_reader(SAMPLE.as_bytes()).unwrap();
        let table = &config.validation;

        let oslo = table.range_for(Variable::DryBulb, Some("oslo")).unwrap();
        assert_eq!(oslo.max, 35.0);

        let elsewhere = table.range_for(Variable::DryBulb, Some("Vienna")).unwrap();
        assert_eq!(elsewhere.max, 45.0);

        let rh = table.range_for(Variable::RelativeHumidity, Some("Oslo")).unwrap();
        assert!(rh.contains(100.0));
        assert!(!rh.contains(100.1));

        assert!(table.range_for(Variable::WindSpeed, None).is_none());
    }

    #[test]
    fn seasons() {
        let s = SeasonalScaling::default();
        assert_eq!(s.for_month(0), -0.05);
        assert_eq!(s.for_month(11), -0.05);
        assert_eq!(s.for_month(6), -0.08);
        assert_eq!(s.for_month(3), -0.06);
    }
}
