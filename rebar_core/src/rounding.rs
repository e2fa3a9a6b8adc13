//! # Rounding Helpers
//!
//! Directed rounding to a unit (0.05 m, 0.01 m, 0.001 m, ...). Lengths are
//! scaled by the reciprocal of the unit before `ceil`/`floor` so that units
//! like 0.05 round the same way a site engineer reads them off a tape.
//!
//! ## Example
//!
//! ```rust
//! use rebar_core::rounding::{round_up, round_down};
//!
//! assert_eq!(round_up(1.01, 0.05), 1.05);
//! assert_eq!(round_down(1.04, 0.05), 1.0);
//! ```

/// Round `length` up to the next multiple of `unit`.
pub fn round_up(length: f64, unit: f64) -> f64 {
    let coeff = 1.0 / unit;
    (length * coeff).ceil() / coeff
}

/// Round `length` down to the previous multiple of `unit`.
pub fn round_down(length: f64, unit: f64) -> f64 {
    let coeff = 1.0 / unit;
    (length * coeff).floor() / coeff
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
