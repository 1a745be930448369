//! Hourly series and the monthly change signals applied to them.
use crate::calendar::{month_of_hour, month_range, HOURS_PER_YEAR};
use crate::error::SeriesLengthError;
use itertools::{Itertools, MinMaxResult};
use std::collections::BTreeMap;
use std::ops::Index;

/// One value per hour of a standard year, in the variable's native unit.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlySeries(Vec<f64>);

impl HourlySeries {
    /// Wrap a vector, enforcing the 8,760 hour length.
    pub fn new(values: Vec<f64>) -> Result<Self, SeriesLengthError> {
        if values.len() != HOURS_PER_YEAR {
            return Err(SeriesLengthError {
                found: values.len(),
                expected: HOURS_PER_YEAR,
            });
        }

        Ok(HourlySeries(values))
    }

    /// Build a series by evaluating `f` for every hour index.
    pub fn from_fn<F: FnMut(usize) -> f64>(f: F) -> Self {
        HourlySeries((0..HOURS_PER_YEAR).map(f).collect())
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.0.iter()
    }

    /// Iterate `(month, value)` pairs, month 0 based.
    pub fn iter_with_month(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.0
            .iter()
            .enumerate()
            .map(|(hour, &v)| (month_of_hour(hour), v))
    }

    /// The values falling in `month` (0 based).
    pub fn month(&self, month: usize) -> &[f64] {
        &self.0[month_range(month)]
    }

    /// The 24 values of the day containing `hour`.
    pub fn day_of(&self, hour: usize) -> &[f64] {
        let start = (hour / 24) * 24;
        &self.0[start..(start + 24).min(self.0.len())]
    }

    pub fn mean(&self) -> f64 {
        mean(&self.0)
    }

    pub fn min(&self) -> f64 {
        self.0.iter().cloned().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.0.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Per-month mean, minimum and maximum.
    pub fn monthly_stats(&self) -> [MonthStats; 12] {
        let mut stats = [MonthStats::default(); 12];
        for (month, stat) in stats.iter_mut().enumerate() {
            *stat = MonthStats::of(self.month(month));
        }
        stats
    }

    /// Apply `f(hour, month, value)` to every hour.
    pub fn map_hours<F>(&self, mut f: F) -> HourlySeries
    where
        F: FnMut(usize, usize, f64) -> f64,
    {
        HourlySeries(
            self.0
                .iter()
                .enumerate()
                .map(|(hour, &v)| f(hour, month_of_hour(hour), v))
                .collect(),
        )
    }
}

impl Index<usize> for HourlySeries {
    type Output = f64;

    fn index(&self, hour: usize) -> &f64 {
        &self.0[hour]
    }
}

impl<'a> IntoIterator for &'a HourlySeries {
    type Item = &'a f64;
    type IntoIter = std::slice::Iter<'a, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Summary statistics for one calendar month of a series.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MonthStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl MonthStats {
    pub fn of(values: &[f64]) -> Self {
        let (min, max) = match values.iter().cloned().minmax_by(|a, b| a.total_cmp(b)) {
            MinMaxResult::NoElements => (0.0, 0.0),
            MinMaxResult::OneElement(v) => (v, v),
            MinMaxResult::MinMax(lo, hi) => (lo, hi),
        };

        MonthStats {
            mean: mean(values),
            min,
            max,
        }
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// A monthly-resolution change signal for one climate quantity.
#[derive(Debug, Clone, PartialEq)]
pub enum MonthlySignal {
    /// Future minus historic change for each month.
    Delta([f64; 12]),
    /// Absolute values: an optional historic monthly climatology and a future-period value.
    Absolute {
        historic: Option<[f64; 12]>,
        future: f64,
    },
}

impl MonthlySignal {
    pub fn deltas(&self) -> Option<&[f64; 12]> {
        match self {
            MonthlySignal::Delta(d) => Some(d),
            MonthlySignal::Absolute { .. } => None,
        }
    }

    pub fn historic(&self) -> Option<&[f64; 12]> {
        match self {
            MonthlySignal::Absolute { historic, .. } => historic.as_ref(),
            MonthlySignal::Delta(_) => None,
        }
    }

    pub fn future(&self) -> Option<f64> {
        match self {
            MonthlySignal::Absolute { future, .. } => Some(*future),
            MonthlySignal::Delta(_) => None,
        }
    }
}

/// Signals loaded for one variable, keyed by climate file key (e.g. `TMAX`, `SRAD_historic`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalSet(BTreeMap<String, MonthlySignal>);

impl SignalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<K: Into<String>>(mut self, key: K, signal: MonthlySignal) -> Self {
        self.insert(key, signal);
        self
    }

    pub fn insert<K: Into<String>>(&mut self, key: K, signal: MonthlySignal) {
        self.0.insert(key.into(), signal);
    }

    pub fn get(&self, key: &str) -> Option<&MonthlySignal> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
