//! Bounded transfer-function morphing.
//!
//! Values are normalised into `[0, 1]` within a `[lo, hi]` window, perturbed by
//! `S * g(x) / mean_day(g)` with the bell shaped `g(x) = x (1 - x)`, clamped back into `[0, 1]`
//! and mapped into a (possibly shifted) output window. Extremes barely move while mid-range
//! values carry the change, so the window bounds are preserved.
use crate::calendar::{month_of_hour, HOURS_PER_YEAR};
use crate::series::HourlySeries;

/// The transfer function `g(x) = x (1 - x)`.
pub fn transfer(x: f64) -> f64 {
    x * (1.0 - x)
}

/// A closed value window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lo: f64,
    pub hi: f64,
}

impl Bounds {
    pub fn new(lo: f64, hi: f64) -> Self {
        Bounds { lo, hi }
    }

    pub fn width(&self) -> f64 {
        self.hi - self.lo
    }

    /// Position of `value` in the window, 0.5 for a degenerate window.
    pub fn normalize(&self, value: f64) -> f64 {
        if self.width().abs() <= f64::EPSILON {
            0.5
        } else {
            (value - self.lo) / self.width()
        }
    }

    pub fn denormalize(&self, x: f64) -> f64 {
        self.lo + x * self.width()
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lo && value <= self.hi
    }

    /// A window whose upper bound is above its lower bound.
    pub fn is_open(&self) -> bool {
        self.hi > self.lo && self.lo.is_finite() && self.hi.is_finite()
    }
}

/// Perturb a normalised value by `s` weighted with the transfer function.
///
/// `g_mean` is the mean of `g` over the value's day; when it is zero the value is unchanged.
pub fn stretch(x: f64, s: f64, g_mean: f64) -> f64 {
    if g_mean == 0.0 || !g_mean.is_finite() {
        return x;
    }

    let shifted = x + s * transfer(x) / g_mean;
    shifted.max(0.0).min(1.0)
}

/// Mean of `g` for every day of the year, normalising each hour with its month's window.
pub fn daily_transfer_means<B>(series: &HourlySeries, window: B) -> Vec<f64>
where
    B: Fn(usize) -> Bounds,
{
    series
        .values()
        .chunks(24)
        .enumerate()
        .map(|(day, hours)| {
            // Month lengths are whole days so every hour of a day shares its window.
            let bounds = window(month_of_hour((day * 24).min(HOURS_PER_YEAR - 1)));
            hours
                .iter()
                .map(|&v| transfer(bounds.normalize(v)))
                .sum::<f64>()
                / hours.len() as f64
        })
        .collect()
}

/// Apply the transfer-function morph to a whole series.
///
/// `window(month)` gives the input bounds for normalisation, `shift(month)` the scaling parameter
/// `S` and `target(month)` the output bounds.
pub fn morph_bounded<B, S, T>(series: &HourlySeries, window: B, shift: S, target: T) -> HourlySeries
where
    B: Fn(usize) -> Bounds,
    S: Fn(usize) -> f64,
    T: Fn(usize) -> Bounds,
{
    let g_means = daily_transfer_means(series, &window);

    series.map_hours(|hour, month, value| {
        let x = window(month).normalize(value);
        let x_prime = stretch(x, shift(month), g_means[hour / 24]);
        target(month).denormalize(x_prime)
    })
}
