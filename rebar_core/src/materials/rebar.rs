//! # Reinforcing Bars
//!
//! Deformed bar catalog (T8 through T32) and the lengths that depend on the
//! concrete: development length (Ld), lap splice (overlap) length and hook
//! (bend) lengths.
//!
//! ## Formulas
//!
//! With fc and fy in kg/cm² and d in mm:
//!
//! ```text
//! Ld      = d/1000 * (fy*9.81/1000) / (sqrt(fc*9.81/1000) * k)   k = 2.1 (d < 20), 1.7 otherwise
//!           x 1.3 for top bars, rounded up to 0.01 m
//! overlap = 1.3 * Ld, rounded up to 0.05 m
//! bend    = d/1000 * 13.7 (90°) or 11 (135°), rounded up to 0.05 m
//! ```
//!
//! A [`SpecialLengths`] table overrides all three per diameter. It is passed
//! explicitly when a bar is built, so two runs with different tables can share
//! a process.
//!
//! ## Example
//!
//! ```rust
//! use rebar_core::materials::{Concrete, Level, Rebar, RebarType};
//!
//! let concrete = Concrete { fc: 250.0, fy: 4000.0 };
//! let bar = Rebar::new(RebarType::T20, concrete, Level::Bottom, None).unwrap();
//! assert!(bar.ld() > 0.0);
//! assert!(bar.overlap() >= 1.3 * bar.ld());
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{LayoutError, LayoutResult};
use crate::rounding::round_up;

/// Hook length per unit diameter for a 90° bend
pub const REBAR_90_BEND_COEFFICIENT: f64 = 13.7;
/// Hook length per unit diameter for a 135° bend
pub const REBAR_135_BEND_COEFFICIENT: f64 = 11.0;
pub const REBAR_BEND_ROUND_UNIT: f64 = 0.05;
pub const REBAR_LD_ROUND_UNIT: f64 = 0.01;
pub const REBAR_OVERLAP_ROUND_UNIT: f64 = 0.05;

// ============================================================================
// Catalog
// ============================================================================

/// Catalog bar, named by nominal diameter in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum RebarType {
    T8,
    T10,
    T12,
    T14,
    T16,
    T18,
    T20,
    T22,
    T25,
    T28,
    T32,
}

impl RebarType {
    pub const ALL: [RebarType; 11] = [
        RebarType::T8,
        RebarType::T10,
        RebarType::T12,
        RebarType::T14,
        RebarType::T16,
        RebarType::T18,
        RebarType::T20,
        RebarType::T22,
        RebarType::T25,
        RebarType::T28,
        RebarType::T32,
    ];

    pub fn diameter_mm(self) -> u32 {
        match self {
            RebarType::T8 => 8,
            RebarType::T10 => 10,
            RebarType::T12 => 12,
            RebarType::T14 => 14,
            RebarType::T16 => 16,
            RebarType::T18 => 18,
            RebarType::T20 => 20,
            RebarType::T22 => 22,
            RebarType::T25 => 25,
            RebarType::T28 => 28,
            RebarType::T32 => 32,
        }
    }

    /// Diameter in meters.
    pub fn diameter(self) -> f64 {
        f64::from(self.diameter_mm()) / 1000.0
    }

    /// Cross-section area in m².
    pub fn area(self) -> f64 {
        let d = f64::from(self.diameter_mm());
        std::f64::consts::PI * (d * d) / 4e6
    }

    /// Hook length for the given bend, from the table when one is given.
    pub fn bend_length(self, degree: BendDegree, table: Option<&SpecialLengths>) -> LayoutResult<f64> {
        if let Some(table) = table {
            let i = table.index_of(self)?;
            let column = match degree {
                BendDegree::Deg90 => &table.bend.b90,
                BendDegree::Deg135 => &table.bend.b135,
            };
            return table.lookup(column, i, "bend");
        }
        let coefficient = match degree {
            BendDegree::Deg90 => REBAR_90_BEND_COEFFICIENT,
            BendDegree::Deg135 => REBAR_135_BEND_COEFFICIENT,
        };
        Ok(round_up(self.diameter() * coefficient, REBAR_BEND_ROUND_UNIT))
    }
}

impl TryFrom<u32> for RebarType {
    type Error = LayoutError;

    fn try_from(diameter: u32) -> Result<Self, Self::Error> {
        RebarType::ALL
            .into_iter()
            .find(|t| t.diameter_mm() == diameter)
            .ok_or_else(|| {
                LayoutError::invalid_input(
                    "diameter",
                    diameter.to_string(),
                    "not a catalog bar (8, 10, 12, 14, 16, 18, 20, 22, 25, 28, 32)",
                )
            })
    }
}

impl From<RebarType> for u32 {
    fn from(t: RebarType) -> u32 {
        t.diameter_mm()
    }
}

impl std::fmt::Display for RebarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T{}", self.diameter_mm())
    }
}

/// Hook angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum BendDegree {
    Deg90,
    Deg135,
}

impl TryFrom<u32> for BendDegree {
    type Error = LayoutError;

    fn try_from(degree: u32) -> Result<Self, Self::Error> {
        match degree {
            90 => Ok(BendDegree::Deg90),
            135 => Ok(BendDegree::Deg135),
            other => Err(LayoutError::contract(
                "bend_length",
                format!("degree should be 90 or 135, got {}", other),
            )),
        }
    }
}

impl From<BendDegree> for u32 {
    fn from(d: BendDegree) -> u32 {
        match d {
            BendDegree::Deg90 => 90,
            BendDegree::Deg135 => 135,
        }
    }
}

/// Face of the strip a bar sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Top,
    Bottom,
}

impl Level {
    pub const BOTH: [Level; 2] = [Level::Top, Level::Bottom];
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Top => write!(f, "top"),
            Level::Bottom => write!(f, "bottom"),
        }
    }
}

/// Concrete and steel strengths in kg/cm².
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Concrete {
    pub fc: f64,
    pub fy: f64,
}

// ============================================================================
// Override table
// ============================================================================

/// Per-level values, one entry per diameter of the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelColumn {
    pub top: Vec<f64>,
    pub bottom: Vec<f64>,
}

impl LevelColumn {
    fn get(&self, level: Level) -> &[f64] {
        match level {
            Level::Top => &self.top,
            Level::Bottom => &self.bottom,
        }
    }
}

/// Hook lengths, one entry per diameter of the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BendColumn {
    #[serde(rename = "B90")]
    pub b90: Vec<f64>,
    #[serde(rename = "B135")]
    pub b135: Vec<f64>,
}

/// Explicit Ld / overlap / bend lengths that replace the formulas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialLengths {
    pub diameters: Vec<u32>,
    pub ld: LevelColumn,
    pub overlap: LevelColumn,
    pub bend: BendColumn,
}

impl SpecialLengths {
    fn index_of(&self, rebar_type: RebarType) -> LayoutResult<usize> {
        self.diameters
            .iter()
            .position(|&d| d == rebar_type.diameter_mm())
            .ok_or_else(|| {
                LayoutError::invalid_input(
                    "special_lengths.diameters",
                    rebar_type.to_string(),
                    "diameter missing from the special lengths table",
                )
            })
    }

    fn lookup(&self, column: &[f64], i: usize, name: &str) -> LayoutResult<f64> {
        column.get(i).copied().ok_or_else(|| {
            LayoutError::invalid_input(
                format!("special_lengths.{}", name),
                format!("{} values", column.len()),
                format!("expected {} values, one per diameter", self.diameters.len()),
            )
        })
    }

    /// Check that every column has one value per diameter.
    pub fn validate(&self) -> LayoutResult<()> {
        let n = self.diameters.len();
        let columns: [(&str, &[f64]); 6] = [
            ("ld.top", &self.ld.top),
            ("ld.bottom", &self.ld.bottom),
            ("overlap.top", &self.overlap.top),
            ("overlap.bottom", &self.overlap.bottom),
            ("bend.B90", &self.bend.b90),
            ("bend.B135", &self.bend.b135),
        ];
        for (name, column) in columns {
            if column.len() != n {
                return Err(LayoutError::invalid_input(
                    format!("special_lengths.{}", name),
                    format!("{} values", column.len()),
                    format!("expected {} values, one per diameter", n),
                ));
            }
        }
        for &d in &self.diameters {
            RebarType::try_from(d)?;
        }
        Ok(())
    }
}

// ============================================================================
// Anchored bar
// ============================================================================

/// A bar type placed in a given face of a given concrete, with its
/// development, splice and hook lengths resolved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rebar {
    pub rebar_type: RebarType,
    pub level: Level,
    ld: f64,
    overlap: f64,
    bend_90: f64,
}

impl Rebar {
    pub fn new(rebar_type: RebarType, concrete: Concrete, level: Level, table: Option<&SpecialLengths>) -> LayoutResult<Self> {
        let (ld, overlap) = match table {
            Some(table) => {
                let i = table.index_of(rebar_type)?;
                (
                    table.lookup(table.ld.get(level), i, "ld")?,
                    table.lookup(table.overlap.get(level), i, "overlap")?,
                )
            }
            None => {
                let ld = development_length(rebar_type, concrete, level);
                (ld, round_up(1.3 * ld, REBAR_OVERLAP_ROUND_UNIT))
            }
        };
        Ok(Rebar {
            rebar_type,
            level,
            ld,
            overlap,
            bend_90: rebar_type.bend_length(BendDegree::Deg90, table)?,
        })
    }

    /// Bar with explicit lengths, bypassing the formulas.
    pub fn with_lengths(rebar_type: RebarType, level: Level, ld: f64, overlap: f64, bend_90: f64) -> Self {
        Rebar {
            rebar_type,
            level,
            ld,
            overlap,
            bend_90,
        }
    }

    pub fn ld(&self) -> f64 {
        self.ld
    }

    pub fn overlap(&self) -> f64 {
        self.overlap
    }

    /// 90° hook length used at bent piece ends.
    pub fn bend_length(&self) -> f64 {
        self.bend_90
    }

    pub fn area(&self) -> f64 {
        self.rebar_type.area()
    }

    pub fn diameter(&self) -> f64 {
        self.rebar_type.diameter()
    }

    pub fn diameter_mm(&self) -> u32 {
        self.rebar_type.diameter_mm()
    }
}

/// Development length from the formula, rounded up to 0.01 m.
pub fn development_length(rebar_type: RebarType, concrete: Concrete, level: Level) -> f64 {
    let k = if rebar_type.diameter_mm() < 20 { 2.1 } else { 1.7 };
    let mut ld = rebar_type.diameter() * ((concrete.fy * 9.81 / 1000.0) / ((concrete.fc * 9.81 / 1000.0).sqrt() * k));
    if level == Level::Top {
        ld *= 1.3;
    }
    round_up(ld, REBAR_LD_ROUND_UNIT)
}
