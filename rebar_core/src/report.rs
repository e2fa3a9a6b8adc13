//! # Layout Report
//!
//! Serializable result of a run: bars per strip face, stirrup zones and
//! types, moment curves, a bar schedule and steel quantities, plus the
//! warnings and errors the run produced.
//!
//! ## Structure
//!
//! ```text
//! LayoutReport
//! ├── errors: Option<RunErrors>      (geometry is omitted when present)
//! ├── warnings: Warnings             (min_gap, max_gap, min_ratio, excess_stack)
//! ├── length_catalog, shear_types
//! ├── strips: Vec<StripReport>
//! │   ├── top / bottom: FaceReport   (typical bars, rows, drawing bunches, moments)
//! │   └── shear_zones
//! ├── schedule: Vec<ScheduleEntry>   (bar type × cut length → count)
//! └── quantities: QuantitySummary    (steel mass in tonnes)
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::LayoutResult;
use crate::geometry::Diagram;
use crate::layout::foundation::{Foundation, ShearPiece};
use crate::layout::mesh::{MaxGapWarning, Mesh, MinGapWarning, MinRatioWarning, TypicalKind};
use crate::layout::piece::Piece;
use crate::layout::shear::{ShearType, ShearZone};
use crate::layout::strip::Strip;
use crate::materials::{Level, RebarType};
use crate::optimization::length_key;
use crate::project::ProjectMetadata;
use crate::rounding::round_to;

// ============================================================================
// Warnings and errors
// ============================================================================

/// A warning raised by one face of one strip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceWarning<T> {
    pub strip_name: String,
    pub level: Level,
    pub detail: T,
}

/// Stacks of a face that needed more length types than allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcessStack {
    pub strip_name: String,
    pub level: Level,
    /// Type count each offending stack ended up with
    pub excess_list: Vec<usize>,
}

/// Advisory findings. None of them stop a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Warnings {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub min_gap: Vec<FaceWarning<MinGapWarning>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub max_gap: Vec<FaceWarning<MaxGapWarning>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub min_ratio: Vec<FaceWarning<MinRatioWarning>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub excess_stack: Vec<ExcessStack>,
}

impl Warnings {
    pub fn count(&self) -> usize {
        self.min_gap.len() + self.max_gap.len() + self.min_ratio.len() + self.excess_stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalTypeNum {
    pub num: usize,
    pub min_feasible_num: usize,
}

/// Findings that leave the layout unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunErrors {
    pub total_type_num: TotalTypeNum,
}

// ============================================================================
// Geometry
// ============================================================================

/// Stations and values of a diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub stations: Vec<f64>,
    pub values: Vec<f64>,
}

impl From<&Diagram> for Curve {
    fn from(diagram: &Diagram) -> Self {
        Curve { stations: diagram.stations(), values: diagram.values() }
    }
}

/// One manufactured bar as placed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub rebar_type: RebarType,
    pub start: f64,
    pub end: f64,
    pub bend_start: f64,
    pub bend_end: f64,
}

impl Bar {
    pub fn length(&self) -> f64 {
        round_to(self.end - self.start, 3)
    }
}

impl From<&Piece> for Bar {
    fn from(piece: &Piece) -> Self {
        Bar {
            rebar_type: piece.rebar.rebar_type,
            start: round_to(piece.executive.start, 3),
            end: round_to(piece.executive.end, 3),
            bend_start: piece.bend.start,
            bend_end: piece.bend.end,
        }
    }
}

fn bars(piece: &Piece) -> Vec<Bar> {
    piece.subpieces().iter().map(Bar::from).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypicalReport {
    pub rebar_type: RebarType,
    pub count: u32,
    pub kind: TypicalKind,
    /// Stock bars of one typical run
    pub bars: Vec<Bar>,
}

/// Identical additional pieces drawn once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingBunch {
    pub count: usize,
    pub bar: Bar,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceReport {
    pub typical: Option<TypicalReport>,
    /// Stock bars of each additional row, top row first
    pub rows: Vec<Vec<Bar>>,
    pub drawing: Vec<Vec<DrawingBunch>>,
    pub resistance_moment: Curve,
    pub ultimate_moment: Curve,
}

impl FaceReport {
    fn new(strip: &Strip, level: Level) -> LayoutResult<Self> {
        let mesh = strip.mesh(level);
        let typical = match mesh.typical() {
            Some(typical) => Some(TypicalReport {
                rebar_type: typical.rebar.rebar_type,
                count: typical.count,
                kind: typical.kind,
                bars: bars(&mesh.typical_piece()?),
            }),
            None => None,
        };
        let rows = mesh
            .piece_rows()
            .into_iter()
            .map(|row| row.into_iter().flat_map(bars).collect())
            .collect();
        let container = mesh.container();
        let drawing = mesh
            .drawing_data()
            .iter()
            .map(|row| {
                row.iter()
                    .filter_map(|bunch| {
                        let &first = bunch.pieces().first()?;
                        Some(DrawingBunch { count: bunch.count(), bar: Bar::from(container.piece(first)) })
                    })
                    .collect()
            })
            .collect();
        Ok(FaceReport {
            typical,
            rows,
            drawing,
            resistance_moment: Curve::from(&strip.resistance_moment(level)?),
            ultimate_moment: Curve::from(strip.ultimate_moment(level)),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripReport {
    pub name: String,
    pub top: FaceReport,
    pub bottom: FaceReport,
    pub shear_zones: Vec<ShearZone>,
}

// ============================================================================
// Quantities
// ============================================================================

/// Bars of one type and cut length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub rebar_type: RebarType,
    pub length: f64,
    pub count: u32,
}

/// Steel mass in tonnes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QuantitySummary {
    pub typical: f64,
    pub additional: f64,
    pub shear: f64,
    pub total: f64,
}

#[derive(Default)]
struct Tally {
    schedule: BTreeMap<(u32, i64), ScheduleEntry>,
    summary: QuantitySummary,
}

#[derive(Clone, Copy)]
enum Category {
    Typical,
    Additional,
    Shear,
}

impl Tally {
    fn add(&mut self, category: Category, rebar_type: RebarType, length: f64, count: u32, density: f64) {
        let length = round_to(length, 3);
        let entry = self
            .schedule
            .entry((rebar_type.diameter_mm(), length_key(length)))
            .or_insert(ScheduleEntry { rebar_type, length, count: 0 });
        entry.count += count;

        let mass = rebar_type.area() * length * count as f64 * density;
        match category {
            Category::Typical => self.summary.typical += mass,
            Category::Additional => self.summary.additional += mass,
            Category::Shear => self.summary.shear += mass,
        }
        self.summary.total += mass;
    }

    fn add_mesh(&mut self, mesh: &Mesh, density: f64) -> LayoutResult<()> {
        if let Some(typical) = mesh.typical() {
            for bar in bars(&mesh.typical_piece()?) {
                self.add(Category::Typical, bar.rebar_type, bar.length(), typical.count, density);
            }
        }
        for piece in mesh.container().pieces() {
            for bar in bars(piece) {
                self.add(Category::Additional, bar.rebar_type, bar.length(), 1, density);
            }
        }
        Ok(())
    }

    fn add_shear(&mut self, pieces: &[ShearPiece], density: f64) {
        for piece in pieces {
            self.add(Category::Shear, piece.rebar_type, piece.length, piece.number, density);
        }
    }
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutReport {
    pub version: String,
    pub run_id: Uuid,
    pub project_id: Uuid,
    pub job_id: String,
    pub generated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<RunErrors>,
    #[serde(default)]
    pub warnings: Warnings,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub length_catalog: Vec<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shear_types: Vec<ShearType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strips: Vec<StripReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schedule: Vec<ScheduleEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantities: Option<QuantitySummary>,
}

impl LayoutReport {
    /// Report of a finished run. A run with errors only reports them and the
    /// warnings.
    pub fn new(meta: &ProjectMetadata, foundation: &Foundation) -> LayoutResult<Self> {
        let mut report = LayoutReport {
            version: meta.version.clone(),
            run_id: Uuid::new_v4(),
            project_id: meta.id,
            job_id: meta.job_id.clone(),
            generated: Utc::now(),
            errors: foundation.errors().copied(),
            warnings: foundation.warnings().clone(),
            length_catalog: Vec::new(),
            shear_types: Vec::new(),
            strips: Vec::new(),
            schedule: Vec::new(),
            quantities: None,
        };
        if report.errors.is_some() {
            return Ok(report);
        }

        let density = foundation.config().constants.steel_density;
        let mut tally = Tally::default();
        for strip in foundation.strips() {
            report.strips.push(StripReport {
                name: strip.name().to_string(),
                top: FaceReport::new(strip, Level::Top)?,
                bottom: FaceReport::new(strip, Level::Bottom)?,
                shear_zones: strip.shear_zones().to_vec(),
            });
            for level in Level::BOTH {
                tally.add_mesh(strip.mesh(level), density)?;
            }
        }
        tally.add_shear(&foundation.shear_pieces()?, density);

        report.length_catalog = foundation.length_catalog().to_vec();
        report.shear_types = foundation.shear_types().to_vec();
        report.schedule = tally.schedule.into_values().collect();
        report.quantities = Some(tally.summary);
        Ok(report)
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_none()
    }
}
