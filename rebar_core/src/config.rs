//! # Run Configuration
//!
//! Everything a layout run needs besides the strip geometry: bar sizes,
//! how many length types are allowed, elimination thresholds, how typical
//! steel is arranged and the design constants.
//!
//! ## Structure
//!
//! ```text
//! LayoutConfig
//! ├── diameter: Diameters (typical, additional, shear, thermal)
//! ├── type_number: TypeNumbers (total, stack, shear)
//! ├── elimination: Elimination (additional, shear)
//! ├── typical_arrangement: TypicalArrangement (+ per strip/face exceptions)
//! ├── side_cover
//! ├── special_lengths: Option<SpecialLengths>
//! └── constants: DesignConstants
//! ```
//!
//! ## Example
//!
//! ```rust
//! use rebar_core::config::{ArrangementMethod, LayoutConfig};
//!
//! let mut config = LayoutConfig::default();
//! config.typical_arrangement.method = ArrangementMethod::Interval(0.2);
//! assert!(config.validate().is_ok());
//!
//! let json = serde_json::to_string(&config).unwrap();
//! assert!(json.contains("\"interval\""));
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{LayoutError, LayoutResult};
use crate::materials::{Level, RebarType, SpecialLengths};

/// Default side cover in meters
pub const DEFAULT_SIDE_COVER: f64 = 0.05;

// ============================================================================
// Design constants
// ============================================================================

/// Code-driven constants of the layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignConstants {
    /// Manufacturing length step (m)
    pub round_unit: f64,

    /// Minimum flexural steel ratio of a face with demand
    pub min_ratio: f64,

    /// Shrinkage and temperature steel ratio of a face without demand
    pub thermal_min_ratio: f64,

    /// Smallest clear gap between parallel bars (m)
    pub min_rebar_gap: f64,

    /// Largest clear gap between parallel bars (m)
    pub max_rebar_gap: f64,

    /// Smallest stirrup spacing (m)
    pub min_shear_interval: f64,

    /// Steel density (t/m³)
    pub steel_density: f64,
}

impl Default for DesignConstants {
    fn default() -> Self {
        DesignConstants {
            round_unit: 0.05,
            min_ratio: 0.0018,
            thermal_min_ratio: 0.0009,
            min_rebar_gap: 0.025,
            max_rebar_gap: 0.3,
            min_shear_interval: 0.1,
            steel_density: 7.85,
        }
    }
}

impl DesignConstants {
    pub fn validate(&self) -> LayoutResult<()> {
        let values = [
            ("round_unit", self.round_unit),
            ("min_ratio", self.min_ratio),
            ("thermal_min_ratio", self.thermal_min_ratio),
            ("min_rebar_gap", self.min_rebar_gap),
            ("max_rebar_gap", self.max_rebar_gap),
            ("min_shear_interval", self.min_shear_interval),
            ("steel_density", self.steel_density),
        ];
        for (name, value) in values {
            if !(value > 0.0) {
                return Err(LayoutError::invalid_input(
                    format!("constants.{}", name),
                    value.to_string(),
                    "must be positive",
                ));
            }
        }
        if self.min_rebar_gap >= self.max_rebar_gap {
            return Err(LayoutError::invalid_input(
                "constants.min_rebar_gap",
                self.min_rebar_gap.to_string(),
                "must be below max_rebar_gap",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Typical arrangement
// ============================================================================

/// How many typical bars a face with demand gets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "value", rename_all = "snake_case")]
pub enum ArrangementMethod {
    /// Just enough for the minimum steel ratio
    MinRatio,
    /// A fixed bar count
    Count(u32),
    /// A fixed spacing across the width (m)
    Interval(f64),
    /// Minimum ratio, then one more bar at a time until the remaining demand
    /// is broken up by zero stretches
    Smart,
}

impl ArrangementMethod {
    fn validate(&self, field: &str) -> LayoutResult<()> {
        match *self {
            ArrangementMethod::Count(0) => Err(LayoutError::invalid_input(field, "0", "count must be at least 1")),
            ArrangementMethod::Interval(s) if !(s > 0.0) => {
                Err(LayoutError::invalid_input(field, s.to_string(), "interval must be positive"))
            }
            _ => Ok(()),
        }
    }
}

/// Arrangement override for one face of one strip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrangementException {
    pub strip_name: String,
    pub level: Level,
    #[serde(flatten)]
    pub method: ArrangementMethod,
    pub diameter: RebarType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypicalArrangement {
    #[serde(flatten)]
    pub method: ArrangementMethod,
    #[serde(default)]
    pub exceptions: Vec<ArrangementException>,
}

impl Default for TypicalArrangement {
    fn default() -> Self {
        TypicalArrangement { method: ArrangementMethod::MinRatio, exceptions: Vec::new() }
    }
}

impl TypicalArrangement {
    /// Method and typical bar for one face. The last matching exception wins.
    pub fn for_face(&self, strip_name: &str, level: Level, typical: RebarType) -> (ArrangementMethod, RebarType) {
        self.exceptions
            .iter()
            .rev()
            .find(|e| e.strip_name == strip_name && e.level == level)
            .map_or((self.method, typical), |e| (e.method, e.diameter))
    }
}

// ============================================================================
// Layout config
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Diameters {
    pub typical: RebarType,
    pub additional: RebarType,
    pub shear: RebarType,
    pub thermal: RebarType,
}

/// Allowed number of length types.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TypeNumbers {
    /// Across every additional bar of the foundation
    pub total: usize,
    /// Within one stack
    pub stack: usize,
    /// Stirrup arrangements
    pub shear: usize,
}

/// Demand stretches at or below these lengths (m) get no steel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Elimination {
    pub additional: f64,
    pub shear: f64,
}

/// Full configuration of one layout run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub diameter: Diameters,
    pub type_number: TypeNumbers,
    pub elimination: Elimination,
    #[serde(default)]
    pub typical_arrangement: TypicalArrangement,
    #[serde(default = "default_side_cover")]
    pub side_cover: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_lengths: Option<SpecialLengths>,
    #[serde(default)]
    pub constants: DesignConstants,
}

fn default_side_cover() -> f64 {
    DEFAULT_SIDE_COVER
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            diameter: Diameters {
                typical: RebarType::T16,
                additional: RebarType::T20,
                shear: RebarType::T10,
                thermal: RebarType::T12,
            },
            type_number: TypeNumbers { total: 8, stack: 3, shear: 3 },
            elimination: Elimination { additional: 0.1, shear: 0.1 },
            typical_arrangement: TypicalArrangement::default(),
            side_cover: DEFAULT_SIDE_COVER,
            special_lengths: None,
            constants: DesignConstants::default(),
        }
    }
}

impl LayoutConfig {
    /// Reject values the layout cannot run with.
    pub fn validate(&self) -> LayoutResult<()> {
        let counts = [
            ("type_number.total", self.type_number.total),
            ("type_number.stack", self.type_number.stack),
            ("type_number.shear", self.type_number.shear),
        ];
        for (name, count) in counts {
            if count == 0 {
                return Err(LayoutError::invalid_input(name, "0", "at least one type is needed"));
            }
        }
        let lengths = [
            ("elimination.additional", self.elimination.additional),
            ("elimination.shear", self.elimination.shear),
            ("side_cover", self.side_cover),
        ];
        for (name, value) in lengths {
            if !(value >= 0.0) {
                return Err(LayoutError::invalid_input(name, value.to_string(), "must not be negative"));
            }
        }
        self.typical_arrangement.method.validate("typical_arrangement")?;
        for exception in &self.typical_arrangement.exceptions {
            exception
                .method
                .validate(&format!("typical_arrangement.exceptions.{}", exception.strip_name))?;
        }
        if let Some(table) = &self.special_lengths {
            table.validate()?;
        }
        self.constants.validate()
    }
}
