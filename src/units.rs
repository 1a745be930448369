//! Unit conversions and psychrometric relations.
//!
//! Pressures are in kPa throughout, which is what the ASHRAE dew point polynomials expect.
use crate::error::CalcError;
use metfor::{Celsius, Knots, MetersPSec, Quantity};

/// Metres per second in one knot. Both directions use this one constant.
pub const MPS_PER_KNOT: f64 = 0.514_444;

pub fn knots_to_mps(speed: Knots) -> MetersPSec {
    MetersPSec(speed.unpack() * MPS_PER_KNOT)
}

pub fn mps_to_knots(speed: MetersPSec) -> Knots {
    Knots(speed.unpack() / MPS_PER_KNOT)
}

/// Plain `f64` form of [`knots_to_mps`].
pub fn knots_to_ms(knots: f64) -> f64 {
    knots_to_mps(Knots(knots)).unpack()
}

/// Plain `f64` form of [`mps_to_knots`].
pub fn ms_to_knots(mps: f64) -> f64 {
    mps_to_knots(MetersPSec(mps)).unpack()
}

// Magnus coefficients (ASHRAE Handbook, Fundamentals ch. 6).
const MAGNUS_A: f64 = 17.27;
const MAGNUS_B: f64 = 237.7;
const MAGNUS_P0: f64 = 0.611;

/// Saturation pressure of water vapour over liquid water, kPa.
pub fn saturation_pressure(t: Celsius) -> f64 {
    let t = t.unpack();
    MAGNUS_P0 * ((MAGNUS_A * t) / (MAGNUS_B + t)).exp()
}

/// Partial pressure of water vapour for a relative humidity in percent, kPa.
pub fn partial_pressure(rh_percent: f64, saturation: f64) -> f64 {
    (rh_percent / 100.0) * saturation
}

// ASHRAE dew point coefficients, valid 0 to 93 C.
const C14: f64 = 6.54;
const C15: f64 = 14.526;
const C16: f64 = 0.7389;
const C17: f64 = 0.094_86;
const C18: f64 = 0.4569;

/// Dew point from vapour partial pressure in kPa.
///
/// Uses the 0 to 93 C polynomial first and switches to the sub-zero fit when that gives a
/// negative temperature.
pub fn dew_point_from_partial_pressure(pw: f64) -> Result<Celsius, CalcError> {
    if pw <= 0.0 || !pw.is_finite() {
        return Err(CalcError::NonPositiveLog(pw));
    }

    let alpha = pw.ln();
    let mut dpt = C14
        + C15 * alpha
        + C16 * alpha.powi(2)
        + C17 * alpha.powi(3)
        + C18 * pw.powf(0.1984);

    if dpt < 0.0 {
        dpt = 6.09 + 12.608 * alpha + 0.4959 * alpha.powi(2);
    }

    if dpt.is_finite() {
        Ok(Celsius(dpt))
    } else {
        Err(CalcError::NonFinite)
    }
}

/// Relative humidity in percent for a vapour pressure held at `pw` and a dry bulb of `t`.
pub fn rh_from_partial_pressure(pw: f64, t: Celsius) -> Result<f64, CalcError> {
    let rh = 100.0 * pw / saturation_pressure(t);
    if rh.is_finite() {
        Ok(rh)
    } else {
        Err(CalcError::NonFinite)
    }
}
