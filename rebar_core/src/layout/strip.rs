//! # Strip
//!
//! One foundation strip: a top and a bottom [`Mesh`], the shear demand and
//! the ultimate moments it was designed for.
//!
//! Column faces are flattened out of the flexural and moment curves, since
//! the peak inside a column is carried by the column itself. No stirrups go
//! inside a column or a crossing strip, and within one thickness of either
//! the shear demand is capped at its value at the face.

use serde::{Deserialize, Serialize};

use crate::config::{DesignConstants, LayoutConfig};
use crate::errors::LayoutResult;
use crate::geometry::{Diagram, Period, Side};
use crate::layout::mesh::{Mesh, Section};
use crate::layout::shear::ShearZone;
use crate::materials::{Concrete, Level, Rebar, RebarType, SpecialLengths};
use crate::project::StripInput;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strip {
    name: String,
    top: Mesh,
    bottom: Mesh,
    shear_diagram: Diagram,
    top_ultimate_moment: Diagram,
    bottom_ultimate_moment: Diagram,
    concrete: Concrete,
    /// Section thickness, the stirrup height before hooks
    thickness: f64,
    stations: Vec<f64>,
    widths: Vec<f64>,
    shear_zones: Vec<ShearZone>,
}

impl Strip {
    pub fn new(input: &StripInput, side_cover: f64, constants: DesignConstants) -> LayoutResult<Self> {
        input.validate()?;
        let thickness = input.thickness;
        let width = input.median_width();

        let face = |level: Level| -> LayoutResult<Mesh> {
            let mut diagram = Diagram::new(input.stations.clone(), input.flexural.get(level).to_vec())?;
            linearize_columns(&mut diagram, &input.column_sides);
            let section = Section::new(width, thickness, thickness - input.covers.get(level));
            Ok(Mesh::new(diagram, section, side_cover, constants))
        };
        let moment = |level: Level| -> LayoutResult<Diagram> {
            let mut diagram = Diagram::new(input.stations.clone(), input.moment.get(level).to_vec())?;
            linearize_columns(&mut diagram, &input.column_sides);
            Ok(diagram)
        };

        let mut shear_diagram = Diagram::new(input.stations.clone(), input.shear.clone())?;
        trim_sides(&mut shear_diagram, &input.strip_sides, thickness)?;
        trim_sides(&mut shear_diagram, &input.column_sides, thickness)?;

        Ok(Strip {
            name: input.name.clone(),
            top: face(Level::Top)?,
            bottom: face(Level::Bottom)?,
            shear_diagram,
            top_ultimate_moment: moment(Level::Top)?,
            bottom_ultimate_moment: moment(Level::Bottom)?,
            concrete: input.concrete,
            thickness,
            stations: input.stations.clone(),
            widths: input.widths.clone(),
            shear_zones: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn concrete(&self) -> Concrete {
        self.concrete
    }

    pub fn mesh(&self, level: Level) -> &Mesh {
        match level {
            Level::Top => &self.top,
            Level::Bottom => &self.bottom,
        }
    }

    pub fn mesh_mut(&mut self, level: Level) -> &mut Mesh {
        match level {
            Level::Top => &mut self.top,
            Level::Bottom => &mut self.bottom,
        }
    }

    pub fn shear_diagram(&self) -> &Diagram {
        &self.shear_diagram
    }

    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    pub fn shear_zones(&self) -> &[ShearZone] {
        &self.shear_zones
    }

    pub fn shear_zones_mut(&mut self) -> &mut Vec<ShearZone> {
        &mut self.shear_zones
    }

    fn rebar(&self, rebar_type: RebarType, level: Level, table: Option<&SpecialLengths>) -> LayoutResult<Rebar> {
        Rebar::new(rebar_type, self.concrete, level, table)
    }

    /// Typical or thermal steel of both faces, honouring per-face exceptions.
    pub fn set_typical_rebar(&mut self, config: &LayoutConfig) -> LayoutResult<()> {
        let table = config.special_lengths.as_ref();
        for level in Level::BOTH {
            let (method, typical_type) =
                config
                    .typical_arrangement
                    .for_face(&self.name, level, config.diameter.typical);
            let typical = self.rebar(typical_type, level, table)?;
            let thermal = self.rebar(config.diameter.thermal, level, table)?;
            self.mesh_mut(level).set_typical_rebar(typical, thermal, method)?;
        }
        Ok(())
    }

    pub fn set_additional_rebar(&mut self, rebar_type: RebarType, elimination: f64, table: Option<&SpecialLengths>) -> LayoutResult<()> {
        for level in Level::BOTH {
            let rebar = self.rebar(rebar_type, level, table)?;
            self.mesh_mut(level).set_additional_rebar(rebar, elimination)?;
        }
        tracing::debug!(
            strip = %self.name,
            top = self.top.container().len(),
            bottom = self.bottom.container().len(),
            "additional pieces placed"
        );
        Ok(())
    }

    /// Zones of positive shear demand longer than `elimination`.
    pub fn set_shear(&mut self, elimination: f64) {
        self.shear_zones = self
            .shear_diagram
            .periods()
            .into_iter()
            .filter(|period| period.length() > elimination)
            .filter_map(|period| {
                let peak = self.shear_diagram.max_point(&period)?;
                Some(ShearZone::new(period, peak.area, self.thickness))
            })
            .collect();
    }

    pub fn refresh(&mut self) -> LayoutResult<()> {
        self.top.refresh()?;
        self.bottom.refresh()
    }

    /// Re-derive both faces from catalog lengths. Returns whether either
    /// face changed its rows.
    pub fn adjust_reduced_type_lengths(&mut self) -> LayoutResult<bool> {
        let top = self.top.adjust_reduced_type_lengths()?;
        let bottom = self.bottom.adjust_reduced_type_lengths()?;
        Ok(top || bottom)
    }

    pub fn resistance_moment(&self, level: Level) -> LayoutResult<Diagram> {
        self.mesh(level)
            .resistance_moment_diagram(&self.widths, &self.stations, self.concrete.fy, self.concrete.fc)
    }

    pub fn ultimate_moment(&self, level: Level) -> &Diagram {
        match level {
            Level::Top => &self.top_ultimate_moment,
            Level::Bottom => &self.bottom_ultimate_moment,
        }
    }
}

fn linearize_columns(diagram: &mut Diagram, column_sides: &[[f64; 2]]) {
    for pair in column_sides {
        diagram.linearize_period(&Period::new(pair[0], pair[1]));
    }
}

/// Zero the demand between each pair and cap it within `offset` outside.
fn trim_sides(diagram: &mut Diagram, pairs: &[[f64; 2]], offset: f64) -> LayoutResult<()> {
    for pair in pairs {
        let bounds = diagram.bounds();
        let start = pair[0].max(bounds.start);
        let end = pair[1].min(bounds.end);
        if start >= end {
            tracing::warn!(start = pair[0], end = pair[1], "side pair outside the strip, skipped");
            continue;
        }
        diagram.trim_period(&Period::new(start, end))?;
        let before = Period::new((pair[0] - offset).max(bounds.start), start);
        let after = Period::new(end, (pair[1] + offset).min(bounds.end));
        diagram.minimize_period(&before, Side::Start);
        diagram.minimize_period(&after, Side::End);
    }
    Ok(())
}
