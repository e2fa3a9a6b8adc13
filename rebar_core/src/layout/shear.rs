//! # Shear Zones and Types
//!
//! A [`ShearZone`] is a stretch of a strip that needs stirrups at a given
//! steel density (m² per m). A [`ShearType`] is one stirrup arrangement:
//! bar size, spacing and leg count. Zones are labelled with the id of the
//! type that covers them.

use serde::{Deserialize, Serialize};

use crate::geometry::Period;
use crate::materials::RebarType;

/// Stirrup arrangement shared by one or more zones.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ShearType {
    pub id: usize,
    pub rebar_type: RebarType,
    /// Spacing along the strip in meters
    pub interval: f64,
    /// Legs per stirrup row
    pub number: u32,
}

impl ShearType {
    pub fn new(rebar_type: RebarType, interval: f64, number: u32, id: usize) -> Self {
        ShearType { id, rebar_type, interval, number }
    }

    /// Steel area per meter of strip.
    pub fn density(&self) -> f64 {
        self.number as f64 * self.rebar_type.area() / self.interval
    }

    /// Whether this arrangement provides at least `steel_density`, up to
    /// floating point noise from the spacing division.
    pub fn covers(&self, steel_density: f64) -> bool {
        self.density() >= steel_density * (1.0 - 1e-9)
    }

    /// Same bar, spacing and legs, ignoring the id.
    pub fn same_arrangement(&self, other: &ShearType) -> bool {
        self.rebar_type == other.rebar_type && self.interval == other.interval && self.number == other.number
    }
}

impl std::fmt::Display for ShearType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S{}: {} legs {} @ {} m", self.id, self.number, self.rebar_type, self.interval)
    }
}

/// Stretch of a strip with a required stirrup density.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShearZone {
    pub period: Period,
    pub steel_density: f64,
    /// Section thickness of the strip
    pub thickness: f64,
    pub shear_type: Option<usize>,
}

impl ShearZone {
    pub fn new(period: Period, steel_density: f64, thickness: f64) -> Self {
        ShearZone { period, steel_density, thickness, shear_type: None }
    }
}
