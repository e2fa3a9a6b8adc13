//! # Project Data Structures
//!
//! The `Project` struct is the root container of a layout run: who it is
//! for, how to run it, and the strips to lay out. Projects serialize to
//! `.rbp` files as human-readable JSON.
//!
//! ## Structure
//!
//! ```text
//! Project
//! ├── meta: ProjectMetadata (version, id, engineer, job info, timestamps)
//! ├── config: LayoutConfig (diameters, type counts, constants)
//! └── strips: Vec<StripInput> (stations, demand curves, section, sides)
//! ```
//!
//! Strip inputs are already extracted from the structural model: stations
//! along the strip centerline with the required steel areas, ultimate
//! moments and shear steel at each station.
//!
//! ## Example
//!
//! ```rust
//! use rebar_core::project::Project;
//!
//! let project = Project::new("Jane Engineer", "25-042", "ACME Corp");
//! assert!(project.strips.is_empty());
//!
//! let json = serde_json::to_string_pretty(&project).unwrap();
//! assert!(json.contains("25-042"));
//! ```

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::LayoutConfig;
use crate::errors::{LayoutError, LayoutResult};
use crate::materials::{Concrete, Level};

/// Current schema version for .rbp files
pub const SCHEMA_VERSION: &str = "0.1.0";

/// Root project container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub meta: ProjectMetadata,
    pub config: LayoutConfig,
    pub strips: Vec<StripInput>,
}

impl Project {
    /// Create a new project with the default configuration and no strips.
    pub fn new(engineer: impl Into<String>, job_id: impl Into<String>, client: impl Into<String>) -> Self {
        let now = Utc::now();
        Project {
            meta: ProjectMetadata {
                version: SCHEMA_VERSION.to_string(),
                id: Uuid::new_v4(),
                engineer: engineer.into(),
                job_id: job_id.into(),
                client: client.into(),
                created: now,
                modified: now,
            },
            config: LayoutConfig::default(),
            strips: Vec::new(),
        }
    }

    /// Add a strip. Names must stay unique, see [`Project::validate`].
    pub fn add_strip(&mut self, strip: StripInput) {
        self.strips.push(strip);
        self.touch();
    }

    pub fn strip(&self, name: &str) -> Option<&StripInput> {
        self.strips.iter().find(|s| s.name == name)
    }

    /// Update the modified timestamp.
    pub fn touch(&mut self) {
        self.meta.modified = Utc::now();
    }

    /// Check the configuration and every strip before a run.
    pub fn validate(&self) -> LayoutResult<()> {
        self.config.validate()?;
        if self.strips.is_empty() {
            return Err(LayoutError::invalid_input("strips", "[]", "a project needs at least one strip"));
        }
        let mut names = HashSet::new();
        for strip in &self.strips {
            if !names.insert(strip.name.as_str()) {
                return Err(LayoutError::invalid_input("strips.name", strip.name.clone(), "strip names must be unique"));
            }
            strip.validate()?;
        }
        Ok(())
    }

    /// Smallest strip thickness, `None` without strips.
    pub fn min_thickness(&self) -> Option<f64> {
        self.strips.iter().map(|s| s.thickness).min_by(f64::total_cmp)
    }

    /// A two-strip project to start from.
    pub fn sample() -> Self {
        let mut project = Project::new("Engineer", "00-000", "Client");
        let stations: Vec<f64> = (0..=12).map(|i| i as f64).collect();
        let bottom = vec![0.0008, 0.0025, 0.0042, 0.0051, 0.0038, 0.0016, 0.0009, 0.0018, 0.0040, 0.0056, 0.0044, 0.0021, 0.0007];
        let top = vec![0.0012, 0.0004, 0.0, 0.0, 0.0006, 0.0019, 0.0027, 0.0017, 0.0004, 0.0, 0.0, 0.0005, 0.0013];
        let moment = |areas: &[f64]| areas.iter().map(|a| (a * 2.8e6).round()).collect::<Vec<f64>>();
        let shear = vec![0.0, 0.0, 0.0012, 0.0020, 0.0011, 0.0, 0.0, 0.0, 0.0009, 0.0018, 0.0010, 0.0, 0.0];

        for (name, width) in [("S1", 1.2), ("S2", 1.5)] {
            project.add_strip(StripInput {
                name: name.to_string(),
                stations: stations.clone(),
                flexural: LevelValues { top: top.clone(), bottom: bottom.clone() },
                moment: LevelValues { top: moment(&top), bottom: moment(&bottom) },
                shear: shear.clone(),
                widths: vec![width; stations.len()],
                thickness: 0.9,
                covers: Covers { top: 0.075, bottom: 0.1 },
                concrete: Concrete { fc: 250.0, fy: 4000.0 },
                column_sides: vec![[2.8, 3.2], [8.8, 9.2]],
                strip_sides: vec![[5.5, 6.5]],
            });
        }
        project
    }
}

impl Default for Project {
    fn default() -> Self {
        Project::new("", "", "")
    }
}

/// Project metadata stored in the file header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMetadata {
    /// Schema version (for migration compatibility)
    pub version: String,

    pub id: Uuid,

    /// Name of the responsible engineer
    pub engineer: String,

    /// Job/project number
    pub job_id: String,

    pub client: String,

    pub created: DateTime<Utc>,

    pub modified: DateTime<Utc>,
}

// ============================================================================
// Strip input
// ============================================================================

/// One value per station for each face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelValues {
    pub top: Vec<f64>,
    pub bottom: Vec<f64>,
}

impl LevelValues {
    pub fn get(&self, level: Level) -> &[f64] {
        match level {
            Level::Top => &self.top,
            Level::Bottom => &self.bottom,
        }
    }
}

/// Concrete cover to the bars of each face (m).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Covers {
    pub top: f64,
    pub bottom: f64,
}

impl Covers {
    pub fn get(&self, level: Level) -> f64 {
        match level {
            Level::Top => self.top,
            Level::Bottom => self.bottom,
        }
    }
}

/// Extracted geometry and demand of one foundation strip.
///
/// Every per-station vector has one entry per station. Station pairs are
/// `[start, end]` along the strip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StripInput {
    pub name: String,
    pub stations: Vec<f64>,
    /// Required flexural steel area (m²)
    pub flexural: LevelValues,
    /// Ultimate moment
    pub moment: LevelValues,
    /// Required shear steel density (m²/m)
    pub shear: Vec<f64>,
    pub widths: Vec<f64>,
    pub thickness: f64,
    pub covers: Covers,
    pub concrete: Concrete,
    /// Column faces crossing the strip
    #[serde(default)]
    pub column_sides: Vec<[f64; 2]>,
    /// Crossing strips, where no stirrups are placed
    #[serde(default)]
    pub strip_sides: Vec<[f64; 2]>,
}

impl StripInput {
    pub fn validate(&self) -> LayoutResult<()> {
        let field = |name: &str| format!("strips.{}.{}", self.name, name);
        let n = self.stations.len();
        if n < 2 {
            return Err(LayoutError::invalid_input(field("stations"), n.to_string(), "at least two stations are needed"));
        }
        let columns = [
            ("flexural.top", self.flexural.top.len()),
            ("flexural.bottom", self.flexural.bottom.len()),
            ("moment.top", self.moment.top.len()),
            ("moment.bottom", self.moment.bottom.len()),
            ("shear", self.shear.len()),
            ("widths", self.widths.len()),
        ];
        for (name, len) in columns {
            if len != n {
                return Err(LayoutError::invalid_input(
                    field(name),
                    format!("{} values", len),
                    format!("expected one value per station ({})", n),
                ));
            }
        }
        if !(self.thickness > self.covers.top + self.covers.bottom) {
            return Err(LayoutError::invalid_input(
                field("thickness"),
                self.thickness.to_string(),
                "must exceed the sum of both covers",
            ));
        }
        if self.widths.iter().any(|w| !(*w > 0.0)) {
            return Err(LayoutError::invalid_input(field("widths"), format!("{:?}", self.widths), "widths must be positive"));
        }
        if !(self.concrete.fc > 0.0 && self.concrete.fy > 0.0) {
            return Err(LayoutError::invalid_input(
                field("concrete"),
                format!("fc {} fy {}", self.concrete.fc, self.concrete.fy),
                "strengths must be positive",
            ));
        }
        for (name, pairs) in [("column_sides", &self.column_sides), ("strip_sides", &self.strip_sides)] {
            if let Some(pair) = pairs.iter().find(|p| p[0] > p[1]) {
                return Err(LayoutError::invalid_input(field(name), format!("{:?}", pair), "start must not pass end"));
            }
        }
        Ok(())
    }

    /// Median width, the width every section of the strip is designed with.
    pub fn median_width(&self) -> f64 {
        let mut widths = self.widths.clone();
        widths.sort_by(f64::total_cmp);
        let n = widths.len();
        if n == 0 {
            0.0
        } else if n % 2 == 1 {
            widths[n / 2]
        } else {
            (widths[n / 2 - 1] + widths[n / 2]) / 2.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_creation() {
        let project = Project::new("John Doe", "25-001", "Acme Corp");
        assert_eq!(project.meta.engineer, "John Doe");
        assert_eq!(project.meta.job_id, "25-001");
        assert_eq!(project.meta.client, "Acme Corp");
        assert_eq!(project.meta.version, SCHEMA_VERSION);
    }

    #[test]
    fn test_project_serialization() {
        let project = Project::sample();
        let json = serde_json::to_string_pretty(&project).unwrap();
        assert!(json.contains("\"S2\""));
        assert!(json.contains("column_sides"));

        let roundtrip: Project = serde_json::from_str(&json).unwrap();
        assert_eq!(roundtrip.strips, project.strips);
        assert_eq!(roundtrip.meta.id, project.meta.id);
    }

    #[test]
    fn test_sample_is_valid() {
        assert!(Project::sample().validate().is_ok());
        assert_eq!(Project::sample().min_thickness(), Some(0.9));
    }

    #[test]
    fn test_empty_project_rejected() {
        assert!(Project::default().validate().is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut project = Project::sample();
        project.strips[1].name = "S1".to_string();
        let err = project.validate().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
    }

    #[test]
    fn test_strip_length_mismatch() {
        let mut project = Project::sample();
        project.strips[0].shear.pop();
        assert!(project.validate().is_err());
    }

    #[test]
    fn test_strip_thin_section() {
        let mut strip = Project::sample().strips.remove(0);
        strip.thickness = 0.15;
        assert!(strip.validate().is_err());
    }

    #[test]
    fn test_median_width() {
        let mut strip = Project::sample().strips.remove(0);
        strip.widths = vec![1.0, 3.0, 2.0, 10.0];
        assert_eq!(strip.median_width(), 2.5);
        strip.widths = vec![1.0, 3.0, 2.0];
        assert_eq!(strip.median_width(), 2.0);
    }

    #[test]
    fn test_touch_updates_modified() {
        let mut project = Project::new("A", "B", "C");
        let before = project.meta.modified;
        project.touch();
        assert!(project.meta.modified >= before);
    }
}
