//! # Periods and Bends
//!
//! A [`Period`] is an interval of stations along a strip centerline, in
//! meters. Comparisons are tolerant to 1 mm: equality rounds both ends to
//! three decimals and the subset/intersection tests use directed rounding, so
//! periods computed along different arithmetic paths still line up.
//!
//! ## Example
//!
//! ```rust
//! use rebar_core::geometry::Period;
//!
//! let outer = Period::new(1.0, 3.0);
//! let inner = Period::new(1.5, 2.5);
//! assert!(inner.is_subset_of(&outer));
//! assert_eq!(outer.length(), 2.0);
//! ```

use serde::{Deserialize, Serialize};

use crate::rounding::{round_down, round_to, round_up};

/// Tolerance unit for period comparisons (1 mm)
const PERIOD_TOLERANCE: f64 = 0.001;

/// One end of a period, piece or bend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Start,
    End,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Start, Side::End];

    pub fn opposite(self) -> Side {
        match self {
            Side::Start => Side::End,
            Side::End => Side::Start,
        }
    }
}

/// Interval `[start, end]` of stations.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Period {
    pub start: f64,
    pub end: f64,
}

impl Period {
    pub fn new(start: f64, end: f64) -> Self {
        Period { start, end }
    }

    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    /// Station at the given end.
    pub fn side(&self, side: Side) -> f64 {
        match side {
            Side::Start => self.start,
            Side::End => self.end,
        }
    }

    pub fn set_side(&mut self, side: Side, station: f64) {
        match side {
            Side::Start => self.start = station,
            Side::End => self.end = station,
        }
    }

    /// Non-strict subset test with a 1 mm tolerance on both ends.
    pub fn is_subset_of(&self, other: &Period) -> bool {
        round_up(self.start, PERIOD_TOLERANCE) >= round_down(other.start, PERIOD_TOLERANCE)
            && round_down(self.end, PERIOD_TOLERANCE) <= round_up(other.end, PERIOD_TOLERANCE)
    }

    /// Whether this period reaches into `other`.
    ///
    /// Callers pass periods in start order. An out-of-order pair is logged
    /// and still answered with the same end-versus-start comparison.
    pub fn has_intersection_with(&self, other: &Period) -> bool {
        if self.start > other.start {
            tracing::warn!(
                first = %self,
                second = %other,
                "intersection test called with periods out of start order"
            );
        }
        round_down(self.end, PERIOD_TOLERANCE) >= round_up(other.start, PERIOD_TOLERANCE)
    }

    /// Whether `station` lies inside the closed period.
    pub fn contains(&self, station: f64) -> bool {
        self.start <= station && station <= self.end
    }
}

impl PartialEq for Period {
    fn eq(&self, other: &Self) -> bool {
        round_to(self.start, 3) == round_to(other.start, 3) && round_to(self.end, 3) == round_to(other.end, 3)
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", round_to(self.start, 3), round_to(self.end, 3))
    }
}

/// Bend lengths at both ends of a piece, zero when the end runs straight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bend {
    pub start: f64,
    pub end: f64,
}

impl Bend {
    pub fn new(start: f64, end: f64) -> Self {
        Bend { start, end }
    }

    pub fn side(&self, side: Side) -> f64 {
        match side {
            Side::Start => self.start,
            Side::End => self.end,
        }
    }

    pub fn set_side(&mut self, side: Side, length: f64) {
        match side {
            Side::Start => self.start = length,
            Side::End => self.end = length,
        }
    }

    pub fn is_bent(&self, side: Side) -> bool {
        self.side(side) > 0.0
    }

    pub fn total(&self) -> f64 {
        self.start + self.end
    }
}
