//! # Mesh
//!
//! One face (top or bottom) of a strip. A mesh owns the face's demand
//! diagram and turns it into bars:
//!
//! 1. **Typical steel**: a flat layer over the whole strip, sized by the
//!    arrangement method, or thermal steel when the face has no demand.
//! 2. **Additional rows**: each pass over the remaining demand yields a row
//!    of theoretical pieces.
//! 3. **Pipeline**: practical extension, row unification, bending at the
//!    strip ends, upper bounds, rounding and executive periods, repeated
//!    until no unification changes the rows.
//!
//! ```text
//! theoretical ─▶ practical ─▶ unify? ──yes──▶ refresh ─┐
//!      ▲                        │no                     │
//!      │                        ▼                       │
//!      │        bend ─▶ upper bound ─▶ round ─▶ executive
//!      │                                          │
//!      └──────────── refresh ◀──yes── unify? ◀────┘
//! ```
//!
//! After the length types are reduced, [`Mesh::adjust_reduced_type_lengths`]
//! re-derives the executive periods from the catalog lengths.
//!
//! ## Example
//!
//! ```rust
//! use rebar_core::config::{ArrangementMethod, DesignConstants};
//! use rebar_core::geometry::Diagram;
//! use rebar_core::layout::mesh::{Mesh, Section};
//! use rebar_core::materials::{Level, Rebar, RebarType};
//!
//! let diagram = Diagram::new(vec![0.0, 4.0, 8.0], vec![0.001, 0.004, 0.001]).unwrap();
//! let section = Section::new(1.0, 0.9, 0.8);
//! let mut mesh = Mesh::new(diagram, section, 0.05, DesignConstants::default());
//!
//! let rebar = Rebar::with_lengths(RebarType::T20, Level::Bottom, 1.0, 1.3, 0.3);
//! mesh.set_typical_rebar(rebar, rebar, ArrangementMethod::MinRatio).unwrap();
//! mesh.set_additional_rebar(rebar, 0.1).unwrap();
//!
//! assert_eq!(mesh.typical().unwrap().count, 6);
//! assert!(!mesh.container().is_empty());
//! ```

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::{ArrangementMethod, DesignConstants};
use crate::errors::{LayoutError, LayoutResult};
use crate::geometry::{interp, Bend, Diagram, Period, Side};
use crate::layout::collections::{Bunch, Container, Stack};
use crate::layout::piece::{net_length, DominationType, PeriodKind, Piece, PieceId, Stage, STANDARD_LENGTH};
use crate::materials::Rebar;
use crate::optimization::practical::set_container_practical;
use crate::rounding::{round_down, round_to, round_up};

/// Longest run of touching pieces searched as one unit during unification
pub const MAX_UNIFY_RUN: usize = 10;

/// Upper limit on unify-and-refresh rounds of one pipeline run
pub const MAX_PIPELINE_PASSES: usize = 50;

/// Cross-section of a strip face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub width: f64,
    pub thickness: f64,
    /// Depth from the compression face to this face's steel
    pub effective_thickness: f64,
}

impl Section {
    pub fn new(width: f64, thickness: f64, effective_thickness: f64) -> Self {
        Section { width, thickness, effective_thickness }
    }
}

/// Whether the flat layer answers demand or only shrinkage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypicalKind {
    Typical,
    Thermal,
}

/// The flat layer of bars running the full strip length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TypicalSteel {
    pub rebar: Rebar,
    pub count: u32,
    pub kind: TypicalKind,
}

// ============================================================================
// Warnings
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GapKind {
    /// Below the code minimum clear spacing
    MinGap,
    /// Below the bar diameter
    RebarDiameter,
}

/// Bars are packed too tightly at the peak of the demand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinGapWarning {
    pub gap: f64,
    pub kind: GapKind,
    pub min_gap: f64,
}

/// Bars are spread too far apart at the trough of the demand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaxGapWarning {
    pub gap: f64,
    pub max_gap: f64,
}

/// Typical bar count below the minimum steel ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinRatioWarning {
    pub num: u32,
    pub min_num: u32,
}

// ============================================================================
// Mesh
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mesh {
    diagram: Diagram,
    container: Container,
    section: Section,
    side_cover: f64,
    constants: DesignConstants,
    typical: Option<TypicalSteel>,
    additional_rebar: Option<Rebar>,
}

impl Mesh {
    pub fn new(diagram: Diagram, section: Section, side_cover: f64, constants: DesignConstants) -> Self {
        Mesh {
            diagram,
            container: Container::new(),
            section,
            side_cover,
            constants,
            typical: None,
            additional_rebar: None,
        }
    }

    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn container_mut(&mut self) -> &mut Container {
        &mut self.container
    }

    pub fn section(&self) -> &Section {
        &self.section
    }

    pub fn typical(&self) -> Option<&TypicalSteel> {
        self.typical.as_ref()
    }

    pub fn additional_rebar(&self) -> Option<&Rebar> {
        self.additional_rebar.as_ref()
    }

    /// Usable length of the strip: diagram bounds inside the side cover.
    pub fn bounds(&self) -> Period {
        let bounds = self.diagram.bounds();
        Period::new(bounds.start + self.side_cover, bounds.end - self.side_cover)
    }

    // ========================================================================
    // Typical steel
    // ========================================================================

    /// Place the flat layer and take it off the demand.
    ///
    /// A face with demand gets `typical` bars counted by `method`; a face
    /// without demand gets enough `thermal` bars for the shrinkage ratio and
    /// the maximum clear gap.
    pub fn set_typical_rebar(&mut self, typical: Rebar, thermal: Rebar, method: ArrangementMethod) -> LayoutResult<()> {
        let width = self.section.width;
        let thickness = self.section.thickness;

        if self.diagram.is_positive() {
            let min_ratio_num = self.min_ratio_count(&typical);
            let mut count = match method {
                ArrangementMethod::MinRatio | ArrangementMethod::Smart => min_ratio_num,
                ArrangementMethod::Count(n) => n,
                ArrangementMethod::Interval(s) => {
                    if !(s > 0.0) {
                        return Err(LayoutError::invalid_input("typical_arrangement", s.to_string(), "interval must be positive"));
                    }
                    (round_to(width, 2) / s).ceil() as u32
                }
            };
            self.diagram.insert_typical(count as f64 * typical.area());
            if method == ArrangementMethod::Smart {
                let d = thickness;
                while self.diagram.side_distance() < d && self.diagram.middle_distance() < 2.0 * d && self.diagram.is_positive() {
                    count += 1;
                    self.diagram.insert_typical(typical.area());
                }
            }
            tracing::debug!(count, method = ?method, "typical steel placed");
            self.typical = Some(TypicalSteel { rebar: typical, count, kind: TypicalKind::Typical });
        } else {
            let ratio_area = width * thickness * self.constants.thermal_min_ratio;
            let mut count = (ratio_area / thermal.area()).ceil() as u32;
            loop {
                let clear = width - 2.0 * self.side_cover - count as f64 * thermal.diameter();
                let gap = clear / (count as f64 - 1.0);
                if gap < self.constants.max_rebar_gap {
                    break;
                }
                count += 1;
            }
            self.diagram.insert_typical(count as f64 * thermal.area());
            tracing::debug!(count, "thermal steel placed");
            self.typical = Some(TypicalSteel { rebar: thermal, count, kind: TypicalKind::Thermal });
        }
        Ok(())
    }

    fn min_ratio_count(&self, rebar: &Rebar) -> u32 {
        let area = self.section.width * self.section.thickness * self.constants.min_ratio;
        (area / rebar.area()).ceil() as u32
    }

    /// One typical bar, bent at both ends, with its executive period set.
    pub fn typical_piece(&self) -> LayoutResult<Piece> {
        let typical = self
            .typical
            .ok_or_else(|| LayoutError::contract("typical_piece", "typical steel has not been placed"))?;
        let bounds = self.bounds();
        let bend = typical.rebar.bend_length();
        let period = Period::new(bounds.start - bend, bounds.end + bend);
        let mut piece = Piece::new(typical.rebar, period);
        piece.bend = Bend::new(bend, bend);
        piece.practical = period;
        set_piece_upper_bound(&mut piece, &bounds);
        round_piece(&mut piece, self.constants.round_unit);
        set_piece_executive(&mut piece, None, &bounds)?;
        Ok(piece)
    }

    // ========================================================================
    // Additional steel
    // ========================================================================

    /// Cover the remaining demand with rows of `rebar` and run the pipeline.
    ///
    /// Stretches of demand no longer than `elimination` get no bar.
    pub fn set_additional_rebar(&mut self, rebar: Rebar, elimination: f64) -> LayoutResult<()> {
        self.additional_rebar = Some(rebar);
        self.insert_additional(&rebar, elimination);
        self.theoretical_to_executive()
    }

    fn insert_additional(&mut self, rebar: &Rebar, elimination: f64) {
        while self.diagram.is_positive() {
            let row: Vec<Piece> = self
                .diagram
                .insert_additional(rebar.area())
                .into_iter()
                .filter(|period| period.length() > elimination)
                .map(|period| Piece::new(*rebar, period))
                .collect();
            if !row.is_empty() {
                self.container.add_row(row);
            }
        }
        tracing::debug!(rows = self.container.row_count(), pieces = self.container.len(), "additional rows inserted");
    }

    /// Reset every piece and run the pipeline again.
    pub fn refresh(&mut self) -> LayoutResult<()> {
        self.refresh_pieces();
        self.theoretical_to_executive()
    }

    /// Re-derive executive periods after the catalog lengths were written to
    /// the pieces. Returns whether a unification changed the rows, in which
    /// case the mesh has to be refreshed.
    pub fn adjust_reduced_type_lengths(&mut self) -> LayoutResult<bool> {
        self.set_executive(PeriodKind::Executive)?;
        Ok(self.unify(PeriodKind::Executive))
    }

    fn refresh_pieces(&mut self) {
        for id in self.container.piece_ids() {
            self.container.piece_mut(id).refresh();
        }
    }

    fn theoretical_to_executive(&mut self) -> LayoutResult<()> {
        if self.additional_rebar.is_none() {
            return Ok(());
        }
        for pass in 1..=MAX_PIPELINE_PASSES {
            if !self.pipeline_pass()? {
                tracing::debug!(passes = pass, pieces = self.container.len(), "mesh pipeline stable");
                return Ok(());
            }
            self.refresh_pieces();
        }
        tracing::warn!(passes = MAX_PIPELINE_PASSES, "mesh pipeline did not settle, keeping the last unification");
        self.practical_to_executive()
    }

    /// One practical → executive pass followed by executive unification.
    /// Returns whether the unification changed the rows.
    fn pipeline_pass(&mut self) -> LayoutResult<bool> {
        self.practical_to_executive()?;
        Ok(self.unify(PeriodKind::Executive))
    }

    fn practical_to_executive(&mut self) -> LayoutResult<()> {
        self.settle_practical();
        self.bend_stack_base();
        self.set_upper_bound();
        self.round();
        self.set_executive(PeriodKind::Practical)
    }

    /// Practical periods with no touching neighbours left to unify.
    fn settle_practical(&mut self) {
        for _ in 0..MAX_PIPELINE_PASSES {
            self.set_practical();
            if !self.unify(PeriodKind::Practical) {
                return;
            }
            self.refresh_pieces();
        }
        self.set_practical();
    }

    fn set_practical(&mut self) {
        let Some(rebar) = self.additional_rebar else { return };
        set_container_practical(&mut self.container, &self.diagram, self.section.effective_thickness, rebar.ld());
    }

    /// Bend or clamp pieces that run past the usable length.
    ///
    /// A theoretical period past a bound always bends. A practical period past
    /// a bound bends when its end was governed by Ld or when the next shorter
    /// piece of its stack is bent there, and is clamped flush otherwise.
    fn bend_stack_base(&mut self) {
        let bounds = self.bounds();
        for stack in self.container.get_stacks(PeriodKind::Theoretical, &self.diagram) {
            let mut previous: Option<Bend> = None;
            for &id in stack.pieces() {
                let piece = self.container.piece_mut(id);
                let bend_length = piece.rebar.bend_length();

                if piece.theoretical.start < bounds.start {
                    piece.bend.start = bend_length;
                    piece.theoretical.start = bounds.start - bend_length;
                    piece.practical.start = piece.theoretical.start;
                }
                if piece.theoretical.end > bounds.end {
                    piece.bend.end = bend_length;
                    piece.theoretical.end = bounds.end + bend_length;
                    piece.practical.end = piece.theoretical.end;
                }

                for side in Side::BOTH {
                    let past = match side {
                        Side::Start => piece.practical.start < bounds.start,
                        Side::End => piece.practical.end > bounds.end,
                    };
                    if !past || piece.bend.is_bent(side) {
                        continue;
                    }
                    let ld_governed = piece.domination.is_some_and(|d| match side {
                        Side::Start => d.start == DominationType::Ld,
                        Side::End => d.end == DominationType::Ld,
                    });
                    let neighbour_bent = previous.is_some_and(|b| b.is_bent(side));
                    if ld_governed || neighbour_bent {
                        piece.bend.set_side(side, bend_length);
                        let station = match side {
                            Side::Start => bounds.start - bend_length,
                            Side::End => bounds.end + bend_length,
                        };
                        piece.practical.set_side(side, station);
                    } else {
                        piece.practical.set_side(side, bounds.side(side));
                    }
                }
                previous = Some(piece.bend);
            }
        }
    }

    fn set_upper_bound(&mut self) {
        let bounds = self.bounds();
        for id in self.container.piece_ids() {
            set_piece_upper_bound(self.container.piece_mut(id), &bounds);
        }
    }

    fn round(&mut self) {
        let unit = self.constants.round_unit;
        for id in self.container.piece_ids() {
            round_piece(self.container.piece_mut(id), unit);
        }
    }

    /// Executive periods of every stack by `by`, outermost piece first so
    /// each piece can lean on the one around it.
    fn set_executive(&mut self, by: PeriodKind) -> LayoutResult<()> {
        let bounds = self.bounds();
        for stack in self.container.get_stacks(by, &self.diagram) {
            let mut base: Option<Piece> = None;
            for &id in stack.pieces().iter().rev() {
                let piece = self.container.piece_mut(id);
                set_piece_executive(piece, base.as_ref(), &bounds)?;
                base = Some(piece.clone());
            }
        }
        Ok(())
    }

    // ========================================================================
    // Unification
    // ========================================================================

    /// Merge touching pieces of each row where that saves steel.
    ///
    /// Returns whether any row changed.
    fn unify(&mut self, by: PeriodKind) -> bool {
        let Some(rebar) = self.additional_rebar else { return false };
        let stacks = self.container.get_stacks(by, &self.diagram);
        let stack_of: HashMap<PieceId, usize> = stacks
            .iter()
            .enumerate()
            .flat_map(|(i, stack)| stack.pieces().iter().map(move |&id| (id, i)))
            .collect();
        let mut banned: HashSet<(usize, usize)> = HashSet::new();

        let mut unified = false;
        for row in 0..self.container.row_count() {
            if self.unify_row(row, by, &rebar, &stack_of, &mut banned) {
                unified = true;
            }
        }
        if unified {
            tracing::debug!(by = ?by, pieces = self.container.len(), "pieces unified");
        }
        unified
    }

    fn unify_row(
        &mut self,
        row: usize,
        by: PeriodKind,
        rebar: &Rebar,
        stack_of: &HashMap<PieceId, usize>,
        banned: &mut HashSet<(usize, usize)>,
    ) -> bool {
        let is_banned = |a: PieceId, b: PieceId, banned: &HashSet<(usize, usize)>| match (stack_of.get(&a), stack_of.get(&b)) {
            (Some(&sa), Some(&sb)) => banned.contains(&(sa, sb)),
            _ => false,
        };

        let mut unified = false;
        let mut run_start = 0;
        let mut i = 0;
        while i < self.container.rows()[row].len() {
            let ids = &self.container.rows()[row];
            let run_len = i - run_start + 1;
            if i + 1 < ids.len() && run_len < MAX_UNIFY_RUN {
                let (a, b) = (ids[i], ids[i + 1]);
                let touching = self
                    .container
                    .piece(a)
                    .period(by)
                    .has_intersection_with(&self.container.piece(b).period(by));
                if touching && !is_banned(a, b, banned) {
                    i += 1;
                    continue;
                }
            }
            if run_len == 1 {
                i += 1;
                run_start = i;
                continue;
            }

            let run: Vec<PieceId> = ids[run_start..=i].to_vec();
            let periods: Vec<Period> = run.iter().map(|&id| self.container.piece(id).period(by)).collect();
            let parts = best_partition(&periods, rebar.overlap());

            for pair in parts.windows(2) {
                for &a in &pair[0] {
                    for &b in &pair[1] {
                        if let (Some(&sa), Some(&sb)) = (stack_of.get(&run[a]), stack_of.get(&run[b])) {
                            banned.insert((sa, sb));
                        }
                    }
                }
            }

            if parts.iter().any(|part| part.len() > 1) {
                let merged: Vec<PieceId> = parts
                    .iter()
                    .map(|part| {
                        let first = self.container.piece(run[part[0]]).theoretical.start;
                        let last = self.container.piece(run[part[part.len() - 1]]).theoretical.end;
                        self.container.insert(Piece::new(*rebar, Period::new(first, last)))
                    })
                    .collect();
                let count = merged.len();
                self.container.replace_in_row(row, run_start..i + 1, merged);
                unified = true;
                i = run_start + count;
            } else {
                i += 1;
            }
            run_start = i;
        }
        unified
    }

    // ========================================================================
    // Output
    // ========================================================================

    /// Stacks of the final layout.
    pub fn stacks(&self) -> Vec<Stack> {
        self.container.get_stacks(PeriodKind::Executive, &self.diagram)
    }

    /// Rows of additional pieces, top row first.
    pub fn piece_rows(&self) -> Vec<Vec<&Piece>> {
        self.container
            .rows()
            .iter()
            .rev()
            .map(|row| row.iter().map(|&id| self.container.piece(id)).collect())
            .collect()
    }

    pub fn drawing_data(&self) -> Vec<Vec<Bunch>> {
        self.container.get_drawing_data(&self.diagram)
    }

    /// Steel area actually provided along the strip.
    ///
    /// Every additional bar ramps up over Ld from each straight end; a bent
    /// end is anchored and carries the full area up to the end. The typical
    /// layer is flat.
    pub fn effective_area_diagram(&self) -> LayoutResult<Diagram> {
        let bounds = self.diagram.bounds();
        let mut diagram = Diagram::new(vec![bounds.start, bounds.end], vec![0.0, 0.0])?;
        for piece in self.container.pieces() {
            let ld = piece.rebar.ld();
            let e = piece.executive;
            let bent_start = piece.bend.is_bent(Side::Start);
            let bent_end = piece.bend.is_bent(Side::End);
            let stations = match (bent_start, bent_end) {
                (true, true) => vec![],
                (true, false) => vec![e.end - ld, e.end],
                (false, true) => vec![e.start, e.start + ld],
                (false, false) => vec![e.start, e.start + ld, e.end - ld, e.end],
            };
            diagram.increase_area(bent_start, bent_end, &stations, piece.rebar.area())?;
        }
        if let Some(typical) = &self.typical {
            diagram.increase_area(true, true, &[], typical.rebar.area() * typical.count as f64)?;
        }
        Ok(diagram)
    }

    /// Design flexural strength along the strip.
    ///
    /// Evaluated on the union of the strip stations and the effective area
    /// break points, with widths interpolated between `stations`. Rectangular
    /// stress block, φ from the steel strain.
    pub fn resistance_moment_diagram(&self, widths: &[f64], stations: &[f64], fy: f64, fc: f64) -> LayoutResult<Diagram> {
        if widths.len() != stations.len() {
            return Err(LayoutError::invalid_input(
                "widths",
                format!("{} values", widths.len()),
                format!("expected one width per station ({} stations)", stations.len()),
            ));
        }
        let area_diagram = self.effective_area_diagram()?;
        let area_stations = area_diagram.stations();
        let area_values = area_diagram.values();

        let mut all: Vec<f64> = stations.iter().copied().chain(area_stations.iter().copied()).collect();
        all.sort_by(f64::total_cmp);
        all.dedup();

        let d = self.section.effective_thickness;
        let moments: Vec<f64> = all
            .iter()
            .map(|&s| {
                let area = interp(s, &area_stations, &area_values);
                let width = interp(s, stations, widths);
                design_moment(area, width, d, fy, fc)
            })
            .collect();
        Diagram::new(all, moments)
    }

    // ========================================================================
    // Warnings
    // ========================================================================

    fn typical_and_additional_diameters(&self) -> Option<(u32, f64, f64)> {
        let typical = self.typical?;
        let typical_d = typical.rebar.diameter_mm() as f64 / 1000.0;
        let additional_d = self.additional_rebar.map_or(typical_d, |r| r.diameter_mm() as f64 / 1000.0);
        Some((typical.count, typical_d, additional_d))
    }

    /// Additional bars covering `station`.
    fn additional_count_at(&self, station: f64) -> usize {
        self.container
            .pieces()
            .filter(|p| p.executive.start <= station && station <= p.executive.end)
            .count()
    }

    /// Clear gap between bars at `station`, `None` with a single bar.
    fn gap_at(&self, station: f64, floor_at_zero: bool) -> Option<f64> {
        let (typical_count, typical_d, additional_d) = self.typical_and_additional_diameters()?;
        let additional = self.additional_count_at(station);
        let width = self.section.width - 2.0 * self.side_cover;
        let mut clear = width - additional as f64 * additional_d - typical_count as f64 * typical_d;
        if floor_at_zero {
            clear = clear.max(0.0);
        }
        let gaps = typical_count as usize + additional;
        if gaps > 1 {
            Some(clear / (gaps - 1) as f64)
        } else {
            None
        }
    }

    /// Gap check where the demand peaks.
    pub fn min_gap_warning(&self) -> Option<MinGapWarning> {
        let (_, typical_d, additional_d) = self.typical_and_additional_diameters()?;
        let station = self.diagram.max_point(&self.bounds())?.station;
        let gap = round_to(self.gap_at(station, true)?, 3);
        let diameter = typical_d.min(additional_d);
        if gap < self.constants.min_rebar_gap {
            Some(MinGapWarning { gap, kind: GapKind::MinGap, min_gap: self.constants.min_rebar_gap })
        } else if gap < diameter {
            Some(MinGapWarning { gap, kind: GapKind::RebarDiameter, min_gap: diameter })
        } else {
            None
        }
    }

    /// Gap check where the demand is lowest.
    pub fn max_gap_warning(&self) -> Option<MaxGapWarning> {
        let station = self.diagram.min_point(&self.bounds())?.station;
        let gap = round_to(self.gap_at(station, false)?, 3);
        (gap > self.constants.max_rebar_gap).then_some(MaxGapWarning { gap, max_gap: self.constants.max_rebar_gap })
    }

    pub fn min_ratio_warning(&self) -> Option<MinRatioWarning> {
        let typical = self.typical?;
        if typical.kind != TypicalKind::Typical {
            return None;
        }
        let min_num = self.min_ratio_count(&typical.rebar);
        (typical.count < min_num).then_some(MinRatioWarning { num: typical.count, min_num })
    }
}

// ============================================================================
// Piece steps
// ============================================================================

/// Stock length when the practical run is already spliced, otherwise the
/// usable length plus both hooks.
fn set_piece_upper_bound(piece: &mut Piece, bounds: &Period) {
    let bound = if piece.num_of_pieces(PeriodKind::Practical) > 1 {
        STANDARD_LENGTH
    } else {
        (bounds.length() + piece.bend.total()).min(STANDARD_LENGTH)
    };
    piece.length_upper_bound = Some(bound);
}

/// Round the shortest bar up to `unit`, or down when up would pass the
/// upper bound.
fn round_piece(piece: &mut Piece, unit: f64) {
    let length = piece.shortest_length(PeriodKind::Practical);
    let upper_bound = piece.length_upper_bound.unwrap_or(STANDARD_LENGTH);
    let up = round_up(length, unit);
    piece.shortest_piece_length = Some(if up <= upper_bound { up } else { round_down(length, unit) });
    piece.stage = Stage::Rounded;
}

/// Move the practical ends so the shortest bar gets its rounded length.
///
/// `base` is the next longer piece of the stack, already final. Growth is
/// capped by the base piece and the usable length; reaching a bent end of
/// the base bends this piece too.
fn set_piece_executive(piece: &mut Piece, base: Option<&Piece>, bounds: &Period) -> LayoutResult<()> {
    let target = piece
        .shortest_piece_length
        .ok_or_else(|| LayoutError::contract("set_piece_executive", format!("piece {} has not been rounded", piece.theoretical)))?;
    let change = target - piece.shortest_length(PeriodKind::Practical);

    let (start, end) = match (piece.bend.is_bent(Side::Start), piece.bend.is_bent(Side::End)) {
        (false, false) => executive_straight(piece, base, bounds, change),
        (true, false) => executive_start_bent(piece, base, bounds, change),
        (false, true) => executive_end_bent(piece, base, bounds, change),
        (true, true) => {
            if change <= 0.0 {
                piece.practical.end += change;
            }
            (piece.practical.start, piece.practical.end)
        }
    };
    piece.executive = Period::new(start, end);
    piece.stage = Stage::Executive;
    Ok(())
}

fn executive_straight(piece: &mut Piece, base: Option<&Piece>, bounds: &Period, change: f64) -> (f64, f64) {
    let p = piece.practical;
    let len = p.length();
    let symmetric = (p.start - change / 2.0, p.end + change / 2.0);

    if change < 0.0 {
        let (start, end) = symmetric;
        piece.practical = Period::new(start, end);
        if piece.theoretical.start < start {
            piece.theoretical.start = start;
        }
        if piece.theoretical.end > end {
            piece.theoretical.end = end;
        }
        return (start, end);
    }

    let Some(base) = base else {
        return grow_within(&p, change, bounds);
    };
    let b = base.executive;
    let bend_length = piece.rebar.bend_length();

    match (base.bend.is_bent(Side::Start), base.bend.is_bent(Side::End)) {
        (false, false) => grow_within(&p, change, &b),
        (true, false) => {
            let reaches_base_end = p.end + change >= b.end;
            let aligned_start = b.end - len - change;
            if reaches_base_end && aligned_start >= bounds.start {
                (aligned_start, b.end)
            } else if p.start - change <= bounds.start - bend_length {
                piece.bend.start = bend_length;
                let start = bounds.start - bend_length;
                piece.practical.start = start;
                (start, (start + len + change).min(b.end))
            } else if reaches_base_end {
                piece.shortest_piece_length = base.shortest_piece_length;
                piece.bend.start = bend_length;
                piece.practical.start = b.start;
                (b.start, b.end)
            } else if p.start - change / 2.0 >= bounds.start {
                symmetric
            } else {
                (bounds.start, bounds.start + len + change)
            }
        }
        (false, true) => {
            let aligned_end = b.start + len + change;
            if p.start - change <= b.start && aligned_end <= bounds.end {
                (b.start, aligned_end)
            } else if p.end + change >= bounds.end + bend_length {
                piece.bend.end = bend_length;
                let end = bounds.end + bend_length;
                piece.practical.end = end;
                ((end - len - change).max(b.start), end)
            } else if p.start - change < b.start && aligned_end > bounds.end {
                piece.shortest_piece_length = base.shortest_piece_length;
                piece.bend.end = bend_length;
                piece.practical.end = b.end;
                (b.start, b.end)
            } else if p.start - change > b.start {
                if p.end + change / 2.0 <= bounds.end {
                    symmetric
                } else {
                    (bounds.end - len - change, bounds.end)
                }
            } else {
                (p.start, p.end)
            }
        }
        (true, true) => {
            if p.start - change <= bounds.start {
                (bounds.start, bounds.start + len + change)
            } else if p.end + change >= bounds.end {
                (bounds.end - len - change, bounds.end)
            } else {
                symmetric
            }
        }
    }
}

/// Grow by `change` inside `limits`: flush against the first limit reached,
/// evenly on both sides otherwise.
fn grow_within(p: &Period, change: f64, limits: &Period) -> (f64, f64) {
    let len = p.length();
    if p.start - change <= limits.start {
        (limits.start, (limits.start + len + change).min(limits.end))
    } else if p.end + change >= limits.end {
        ((limits.end - len - change).max(limits.start), limits.end)
    } else {
        (p.start - change / 2.0, p.end + change / 2.0)
    }
}

fn executive_start_bent(piece: &mut Piece, base: Option<&Piece>, bounds: &Period, change: f64) -> (f64, f64) {
    if change < 0.0 {
        piece.practical.end += change;
        return (piece.practical.start, piece.practical.end);
    }
    let p = piece.practical;
    match base {
        None => (p.start, (p.end + change).min(bounds.end)),
        Some(base) if base.bend.is_bent(Side::End) => {
            if p.end + change >= base.executive.end {
                piece.bend.end = piece.rebar.bend_length();
                piece.practical.end = base.executive.end;
                (p.start, base.executive.end)
            } else {
                (p.start, (p.end + change).min(bounds.end))
            }
        }
        Some(base) => (p.start, (p.end + change).min(base.executive.end).min(bounds.end)),
    }
}

fn executive_end_bent(piece: &mut Piece, base: Option<&Piece>, bounds: &Period, change: f64) -> (f64, f64) {
    if change < 0.0 {
        piece.practical.start -= change;
        return (piece.practical.start, piece.practical.end);
    }
    let p = piece.practical;
    match base {
        None => ((p.start - change).max(bounds.start), p.end),
        Some(base) if base.bend.is_bent(Side::Start) => {
            if p.start - change <= base.executive.start {
                piece.bend.start = piece.rebar.bend_length();
                piece.practical.start = base.executive.start;
                (base.executive.start, p.end)
            } else {
                ((p.start - change).max(bounds.start), p.end)
            }
        }
        Some(base) => ((p.start - change).max(base.executive.start).max(bounds.start), p.end),
    }
}

/// Cheapest split of a run of touching periods into merged groups.
///
/// Returns the groups as index lists. Ties keep the first split in
/// enumeration order.
fn best_partition(periods: &[Period], overlap: f64) -> Vec<Vec<usize>> {
    let mut best: Option<(f64, Vec<Vec<usize>>)> = None;
    for parts in contiguous_partitions(0, periods.len()) {
        let total: f64 = parts
            .iter()
            .map(|part| {
                let first = periods[part[0]].start;
                let last = periods[part[part.len() - 1]].end;
                net_length(last - first, overlap)
            })
            .sum();
        if best.as_ref().map_or(true, |(value, _)| total < *value) {
            best = Some((total, parts));
        }
    }
    best.map_or_else(Vec::new, |(_, parts)| parts)
}

/// Splits of `first..n` into consecutive groups.
///
/// Each split of the tail yields two: `first` joined to the tail's first
/// group, then `first` on its own.
fn contiguous_partitions(first: usize, n: usize) -> Vec<Vec<Vec<usize>>> {
    if first + 1 >= n {
        return if first < n { vec![vec![vec![first]]] } else { Vec::new() };
    }
    let mut partitions = Vec::new();
    for smaller in contiguous_partitions(first + 1, n) {
        let mut joined = smaller.clone();
        joined[0].insert(0, first);
        partitions.push(joined);

        let mut alone = Vec::with_capacity(smaller.len() + 1);
        alone.push(vec![first]);
        alone.extend(smaller);
        partitions.push(alone);
    }
    partitions
}

/// Design moment φMn of a rectangular section with tension steel only.
fn design_moment(area: f64, width: f64, d: f64, fy: f64, fc: f64) -> f64 {
    let b = if width <= 0.0 { 1e-2 } else { width };
    let beta1 = if fc <= 2800.0 { 0.85 } else { 0.85 - (5e-4 / 7.0) * (fc - 2800.0) };
    let balanced = 0.85 * beta1 * (fc / fy) * (6e4 / (6e4 + fy));
    let ratio = area / (b * d);

    let (a, nominal) = if ratio < balanced {
        let a = (area * fy) / (0.85 * fc * b);
        (a, area * fy * (d - (area * fy) / (1.7 * fc * b)))
    } else {
        let alpha = (6e4 * ratio * d) / (0.85 * fc);
        let a = 0.5 * ((alpha * alpha + 4.0 * beta1 * d).sqrt() - alpha);
        (a, 0.85 * fc * a * b * (d - a / 2.0))
    };

    let c = a / beta1;
    let strain = 0.003 * (d - c) / c;
    let phi = if strain < 0.002 {
        0.65
    } else if strain < 0.005 {
        0.483 + 83.3 * strain
    } else {
        0.9
    };
    nominal * phi
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::piece::Domination;
    use crate::materials::{Level, RebarType};

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn rebar() -> Rebar {
        Rebar::with_lengths(RebarType::T20, Level::Bottom, 1.0, 1.3, 0.3)
    }

    fn areas() -> Vec<f64> {
        vec![0.008, 0.006, 0.005, 0.008, 0.009, 0.007, 0.005, 0.002, 0.008, 0.005]
    }

    fn mesh_with(areas: Vec<f64>) -> Mesh {
        let diagram = Diagram::new((0..areas.len()).map(|i| i as f64).collect(), areas).unwrap();
        Mesh::new(diagram, Section::new(1.0, 0.9, 0.8), 0.05, DesignConstants::default())
    }

    fn mesh() -> Mesh {
        mesh_with(areas())
    }

    fn filled_mesh() -> Mesh {
        let mut mesh = mesh();
        mesh.set_typical_rebar(rebar(), rebar(), ArrangementMethod::MinRatio).unwrap();
        mesh.set_additional_rebar(rebar(), 0.1).unwrap();
        mesh
    }

    /// Piece whose theoretical and practical periods are `[start, end]`,
    /// rounded to `shortest`.
    fn rounded_piece(start: f64, end: f64, shortest: f64) -> Piece {
        let mut piece = Piece::new(rebar(), Period::new(start, end));
        piece.shortest_piece_length = Some(shortest);
        piece
    }

    fn bounds() -> Period {
        mesh().bounds()
    }

    // ------------------------------------------------------------------------
    // Typical steel
    // ------------------------------------------------------------------------

    #[test]
    fn test_typical_counts() {
        let cases = [
            (ArrangementMethod::MinRatio, 6),
            (ArrangementMethod::Count(10), 10),
            (ArrangementMethod::Interval(0.4), 3),
            (ArrangementMethod::Interval(0.1), 10),
            (ArrangementMethod::Smart, 18),
        ];
        for (method, expected) in cases {
            let mut mesh = mesh();
            mesh.set_typical_rebar(rebar(), rebar(), method).unwrap();
            let typical = mesh.typical().unwrap();
            assert_eq!(typical.count, expected, "{:?}", method);
            assert_eq!(typical.kind, TypicalKind::Typical);
        }
    }

    #[test]
    fn test_smart_stops_at_side_gap() {
        let mut mesh = mesh_with(vec![0.008, 0.006, 0.005, 0.008, 0.009, 0.007, 0.006, 0.0045, 0.0045, 0.001]);
        mesh.set_typical_rebar(rebar(), rebar(), ArrangementMethod::Smart).unwrap();
        assert_eq!(mesh.typical().unwrap().count, 14);
    }

    #[test]
    fn test_thermal_when_no_demand() {
        let mut mesh = mesh_with(vec![0.0; 10]);
        let thermal = Rebar::with_lengths(RebarType::T12, Level::Top, 0.6, 0.8, 0.2);
        mesh.set_typical_rebar(rebar(), thermal, ArrangementMethod::MinRatio).unwrap();
        let typical = mesh.typical().unwrap();
        assert_eq!(typical.kind, TypicalKind::Thermal);
        assert_eq!(typical.rebar.rebar_type, RebarType::T12);
        // 0.9 * 0.0009 / 1.131e-4 = 7.2 -> 8 bars, gap 0.115
        assert_eq!(typical.count, 8);
        assert!(mesh.min_ratio_warning().is_none());
    }

    #[test]
    fn test_typical_piece() {
        let mut mesh = mesh_with(vec![0.008; 20]);
        mesh.set_typical_rebar(rebar(), rebar(), ArrangementMethod::MinRatio).unwrap();
        let piece = mesh.typical_piece().unwrap();
        assert_eq!(piece.executive, Period::new(-0.25, 19.25));
        assert_eq!(piece.bend, Bend::new(0.3, 0.3));

        let subpieces = piece.subpieces();
        assert_eq!(subpieces.len(), 2);
        assert_eq!(subpieces[0].executive, Period::new(-0.25, 11.75));
        assert_eq!(subpieces[0].bend, Bend::new(0.3, 0.0));
        assert_eq!(subpieces[1].executive, Period::new(10.45, 19.25));
        assert_eq!(subpieces[1].bend, Bend::new(0.0, 0.3));
    }

    #[test]
    fn test_typical_piece_needs_typical_steel() {
        assert!(mesh().typical_piece().is_err());
    }

    #[test]
    fn test_bounds() {
        assert_eq!(bounds(), Period::new(0.05, 8.95));
    }

    // ------------------------------------------------------------------------
    // Piece steps
    // ------------------------------------------------------------------------

    #[test]
    fn test_upper_bound() {
        let mut piece = Piece::new(rebar(), Period::new(1.0, 8.0));
        piece.practical = Period::new(0.25, 8.0);
        piece.bend.start = 0.3;
        set_piece_upper_bound(&mut piece, &bounds());
        assert!(approx_eq(piece.length_upper_bound.unwrap(), 9.2));

        piece.practical = Period::new(-0.25, 9.25);
        piece.bend.end = 0.3;
        set_piece_upper_bound(&mut piece, &bounds());
        assert!(approx_eq(piece.length_upper_bound.unwrap(), 9.5));

        let mut long = Piece::new(rebar(), Period::new(0.0, 15.0));
        set_piece_upper_bound(&mut long, &Period::new(0.0, 20.0));
        assert_eq!(long.length_upper_bound, Some(STANDARD_LENGTH));
    }

    #[test]
    fn test_round() {
        let mut piece = Piece::new(rebar(), Period::new(1.0, 8.0));
        piece.practical = Period::new(0.0, 8.96);
        piece.length_upper_bound = Some(9.0);
        round_piece(&mut piece, 0.05);
        assert!(approx_eq(piece.shortest_piece_length.unwrap(), 9.0));
        assert_eq!(piece.stage, Stage::Rounded);

        piece.length_upper_bound = Some(8.99);
        round_piece(&mut piece, 0.05);
        assert!(approx_eq(piece.shortest_piece_length.unwrap(), 8.95));
    }

    #[test]
    fn test_executive_straight_shrinks_evenly() {
        let mut piece = rounded_piece(0.0, 5.0, 4.0);
        set_piece_executive(&mut piece, None, &bounds()).unwrap();
        assert_eq!(piece.executive, Period::new(0.5, 4.5));
        assert_eq!(piece.theoretical, Period::new(0.5, 4.5));
        assert_eq!(piece.stage, Stage::Executive);
    }

    #[test]
    fn test_executive_straight_without_base() {
        let cases = [
            ((1.0, 5.0, 5.0), (0.05, 5.05)),
            ((4.0, 8.0, 5.0), (3.95, 8.95)),
            ((3.0, 7.0, 5.0), (2.5, 7.5)),
        ];
        for ((start, end, shortest), (e_start, e_end)) in cases {
            let mut piece = rounded_piece(start, end, shortest);
            set_piece_executive(&mut piece, None, &bounds()).unwrap();
            assert_eq!(piece.executive, Period::new(e_start, e_end));
        }
    }

    #[test]
    fn test_executive_straight_base() {
        let mut base = rounded_piece(1.0, 5.0, 5.0);
        base.executive = Period::new(0.6, 5.5);
        let mut piece = rounded_piece(1.0, 5.0, 5.0);
        set_piece_executive(&mut piece, Some(&base), &bounds()).unwrap();
        assert_eq!(piece.executive, Period::new(0.6, 5.5));
    }

    #[test]
    fn test_executive_start_bent_base() {
        let mut base = rounded_piece(1.0, 5.0, 5.0);
        base.executive = Period::new(-0.25, 8.0);
        base.bend.start = 0.3;

        // reaches the base end
        let mut piece = rounded_piece(1.0, 5.0, 7.0);
        set_piece_executive(&mut piece, Some(&base), &bounds()).unwrap();
        assert_eq!(piece.executive, Period::new(1.0, 8.0));

        // reaches neither end
        let mut piece = rounded_piece(2.0, 6.0, 5.0);
        set_piece_executive(&mut piece, Some(&base), &bounds()).unwrap();
        assert_eq!(piece.executive, Period::new(1.5, 6.5));

        // flush against the start bound
        let mut piece = rounded_piece(0.1, 6.1, 6.3);
        set_piece_executive(&mut piece, Some(&base), &bounds()).unwrap();
        assert_eq!(piece.executive, Period::new(0.05, 6.35));
    }

    #[test]
    fn test_executive_takes_base_length() {
        let mut base = rounded_piece(1.0, 5.0, 6.4);
        base.executive = Period::new(-0.25, 6.15);
        base.bend.start = 0.3;
        let mut piece = rounded_piece(2.0, 6.0, 6.15);
        set_piece_executive(&mut piece, Some(&base), &bounds()).unwrap();
        assert_eq!(piece.executive, Period::new(-0.25, 6.15));
        assert_eq!(piece.shortest_piece_length, base.shortest_piece_length);
        assert!(piece.bend.is_bent(Side::Start));
    }

    #[test]
    fn test_executive_end_bent_base() {
        let mut base = rounded_piece(1.0, 5.0, 5.0);
        base.executive = Period::new(4.5, 9.25);
        base.bend.end = 0.3;

        // reaches the base start
        let mut piece = rounded_piece(5.0, 8.0, 4.0);
        set_piece_executive(&mut piece, Some(&base), &bounds()).unwrap();
        assert_eq!(piece.executive, Period::new(4.5, 8.5));

        // long enough to bend
        let mut piece = rounded_piece(7.0, 8.0, 3.0);
        set_piece_executive(&mut piece, Some(&base), &bounds()).unwrap();
        assert_eq!(piece.executive, Period::new(6.25, 9.25));
        assert!(approx_eq(piece.bend.end, 0.3));

        // reaches the base start but passes the end bound
        let mut base = rounded_piece(3.0, 9.0, 6.4);
        base.executive = Period::new(2.85, 9.25);
        base.bend.end = 0.3;
        let mut piece = rounded_piece(3.0, 7.0, 6.15);
        set_piece_executive(&mut piece, Some(&base), &bounds()).unwrap();
        assert_eq!(piece.executive, Period::new(2.85, 9.25));
        assert!(approx_eq(piece.bend.end, 0.3));

        // flush against the end bound
        let mut base = rounded_piece(1.0, 5.0, 8.25);
        base.executive = Period::new(1.0, 9.25);
        base.bend.end = 0.3;
        let mut piece = rounded_piece(2.9, 8.9, 6.3);
        set_piece_executive(&mut piece, Some(&base), &bounds()).unwrap();
        assert_eq!(piece.executive, Period::new(2.65, 8.95));
    }

    #[test]
    fn test_executive_bent_pieces() {
        let mut piece = rounded_piece(-0.25, 5.0, 4.25);
        piece.bend.start = 0.3;
        set_piece_executive(&mut piece, None, &bounds()).unwrap();
        assert_eq!(piece.executive, Period::new(-0.25, 4.0));

        let mut piece = rounded_piece(-0.25, 5.0, 8.25);
        piece.bend.start = 0.3;
        set_piece_executive(&mut piece, None, &bounds()).unwrap();
        assert_eq!(piece.executive, Period::new(-0.25, 8.0));

        let mut piece = rounded_piece(4.0, 9.25, 4.25);
        piece.bend.end = 0.3;
        set_piece_executive(&mut piece, None, &bounds()).unwrap();
        assert_eq!(piece.executive, Period::new(5.0, 9.25));

        let mut piece = rounded_piece(5.0, 9.25, 5.25);
        piece.bend.end = 0.3;
        set_piece_executive(&mut piece, None, &bounds()).unwrap();
        assert_eq!(piece.executive, Period::new(4.0, 9.25));

        let mut piece = rounded_piece(-0.25, 9.25, 9.25);
        piece.bend = Bend::new(0.3, 0.3);
        set_piece_executive(&mut piece, None, &bounds()).unwrap();
        assert_eq!(piece.executive, Period::new(-0.25, 9.0));

        let mut piece = rounded_piece(-0.25, 9.25, 10.0);
        piece.bend = Bend::new(0.3, 0.3);
        set_piece_executive(&mut piece, None, &bounds()).unwrap();
        assert_eq!(piece.executive, Period::new(-0.25, 9.25));
    }

    #[test]
    fn test_executive_needs_rounding() {
        let mut piece = Piece::new(rebar(), Period::new(1.0, 2.0));
        let err = set_piece_executive(&mut piece, None, &bounds()).unwrap_err();
        assert_eq!(err.error_code(), "CONTRACT_VIOLATION");
    }

    // ------------------------------------------------------------------------
    // Bending
    // ------------------------------------------------------------------------

    fn single_piece_mesh(theoretical: Period, practical: Period, domination: DominationType) -> Mesh {
        let mut mesh = mesh();
        let mut piece = Piece::new(rebar(), theoretical);
        piece.practical = practical;
        piece.domination = Some(Domination { start: domination, end: domination });
        mesh.container.add_row(vec![piece]);
        mesh.bend_stack_base();
        mesh
    }

    #[test]
    fn test_bend_theoretical() {
        let mesh = single_piece_mesh(Period::new(-1.0, 10.0), Period::new(-1.0, 10.0), DominationType::D);
        let piece = mesh.container.piece(PieceId(0));
        assert_eq!(piece.bend, Bend::new(0.3, 0.3));
        assert_eq!(piece.theoretical, Period::new(-0.25, 9.25));
    }

    #[test]
    fn test_bend_practical() {
        let mesh = single_piece_mesh(Period::new(1.0, 8.0), Period::new(-1.0, 8.0), DominationType::D);
        let piece = mesh.container.piece(PieceId(0));
        assert_eq!(piece.bend, Bend::default());
        assert_eq!(piece.practical, Period::new(0.05, 8.0));

        let mesh = single_piece_mesh(Period::new(1.0, 8.0), Period::new(-1.0, 8.0), DominationType::Ld);
        assert_eq!(mesh.container.piece(PieceId(0)).bend, Bend::new(0.3, 0.0));

        let mesh = single_piece_mesh(Period::new(1.0, 8.0), Period::new(1.0, 9.0), DominationType::Ld);
        let piece = mesh.container.piece(PieceId(0));
        assert_eq!(piece.bend, Bend::new(0.0, 0.3));
        assert_eq!(piece.practical, Period::new(1.0, 9.25));
    }

    #[test]
    fn test_bend_follows_neighbour() {
        let mut mesh = mesh();
        let mut outer = Piece::new(rebar(), Period::new(1.0, 8.0));
        outer.practical = Period::new(-1.0, 8.0);
        outer.domination = Some(Domination { start: DominationType::D, end: DominationType::D });
        let mut inner = Piece::new(rebar(), Period::new(2.0, 7.0));
        inner.practical = Period::new(-0.5, 7.0);
        inner.domination = Some(Domination { start: DominationType::Ld, end: DominationType::D });
        mesh.container.add_row(vec![outer]);
        mesh.container.add_row(vec![inner]);
        mesh.bend_stack_base();
        assert_eq!(mesh.container.piece(PieceId(1)).bend, Bend::new(0.3, 0.0));
        assert_eq!(mesh.container.piece(PieceId(0)).bend, Bend::new(0.3, 0.0));
    }

    // ------------------------------------------------------------------------
    // Unification
    // ------------------------------------------------------------------------

    fn unify_row_of(periods: &[(f64, f64)]) -> (Mesh, bool) {
        let mut mesh = mesh();
        mesh.additional_rebar = Some(rebar());
        let row = periods.iter().map(|&(s, e)| Piece::new(rebar(), Period::new(s, e))).collect();
        mesh.container.add_row(row);
        let unified = mesh.unify(PeriodKind::Theoretical);
        (mesh, unified)
    }

    fn row_periods(mesh: &Mesh) -> Vec<Period> {
        mesh.container.rows()[0].iter().map(|&id| mesh.container.piece(id).theoretical).collect()
    }

    #[test]
    fn test_unify_two_pieces() {
        let (mesh, unified) = unify_row_of(&[(1.0, 4.0), (4.0, 8.0)]);
        assert!(unified);
        assert_eq!(row_periods(&mesh), vec![Period::new(1.0, 8.0)]);
    }

    #[test]
    fn test_unify_four_pieces() {
        let (mesh, _) = unify_row_of(&[(1.0, 4.0), (4.0, 6.0), (5.0, 7.0), (6.5, 8.0)]);
        assert_eq!(row_periods(&mesh), vec![Period::new(1.0, 8.0)]);
    }

    #[test]
    fn test_unify_splits_past_stock_length() {
        let (mesh, unified) = unify_row_of(&[(0.0, 4.0), (4.0, 6.0), (6.0, 7.0), (6.5, 13.0)]);
        assert!(unified);
        assert_eq!(row_periods(&mesh), vec![Period::new(0.0, 4.0), Period::new(4.0, 13.0)]);
    }

    #[test]
    fn test_unify_keeps_apart_pieces() {
        let (mesh, unified) = unify_row_of(&[(0.0, 2.0), (3.0, 5.0)]);
        assert!(!unified);
        assert_eq!(mesh.container.rows()[0], vec![PieceId(0), PieceId(1)]);
    }

    #[test]
    fn test_partition_order() {
        let parts = contiguous_partitions(0, 3);
        assert_eq!(
            parts,
            vec![
                vec![vec![0, 1, 2]],
                vec![vec![0], vec![1, 2]],
                vec![vec![0, 1], vec![2]],
                vec![vec![0], vec![1], vec![2]],
            ]
        );
        assert_eq!(contiguous_partitions(0, MAX_UNIFY_RUN).len(), 1 << (MAX_UNIFY_RUN - 1));
    }

    // ------------------------------------------------------------------------
    // Pipeline
    // ------------------------------------------------------------------------

    #[test]
    fn test_pipeline_reaches_executive() {
        let mesh = filled_mesh();
        let bounds = mesh.bounds();
        assert!(mesh.container().len() > 0);
        for piece in mesh.container().pieces() {
            assert_eq!(piece.stage, Stage::Executive);
            assert!(piece.executive.start >= bounds.start - 0.3 - 1e-9);
            assert!(piece.executive.end <= bounds.end + 0.3 + 1e-9);
            let shortest = piece.shortest_piece_length.unwrap();
            assert!(approx_eq(round_to(shortest / 0.05, 6).fract(), 0.0));
        }
    }

    #[test]
    fn test_pipeline_full_rows() {
        let mesh = filled_mesh();
        let rows = mesh.container().rows();
        // the first rows cover the whole strip and are bent at both ends
        for row in &rows[..11] {
            assert_eq!(row.len(), 1);
            let piece = mesh.container().piece(row[0]);
            assert_eq!(piece.executive, Period::new(-0.25, 9.25));
            assert_eq!(piece.bend, Bend::new(0.3, 0.3));
        }
        assert_eq!(mesh.piece_rows().len(), rows.len());
    }

    #[test]
    fn test_pipeline_piece_count_never_grows() {
        let mut mesh = mesh();
        mesh.set_typical_rebar(rebar(), rebar(), ArrangementMethod::MinRatio).unwrap();
        mesh.additional_rebar = Some(rebar());
        mesh.insert_additional(&rebar(), 0.1);

        let mut counts = vec![mesh.container.len()];
        let mut settled = false;
        for _ in 0..MAX_PIPELINE_PASSES {
            let unified = mesh.pipeline_pass().unwrap();
            counts.push(mesh.container.len());
            if !unified {
                settled = true;
                break;
            }
            mesh.refresh_pieces();
        }
        assert!(settled, "{:?}", counts);
        assert!(counts.windows(2).all(|w| w[1] <= w[0]), "{:?}", counts);
        // rows split around the dip at station 7 join once extended
        assert!(counts[counts.len() - 1] < counts[0], "{:?}", counts);

        // touching neighbours that are left are banned or cheaper apart, so
        // another unification leaves the rows alone
        let rows = mesh.container.rows().to_vec();
        assert!(!mesh.unify(PeriodKind::Executive));
        assert_eq!(mesh.container.rows(), &rows[..]);
        assert!(mesh.container.pieces().all(|p| p.stage == Stage::Executive));
    }

    #[test]
    fn test_refresh_reaches_executive_again() {
        let mut mesh = filled_mesh();
        mesh.refresh().unwrap();
        assert!(!mesh.container().is_empty());
        assert!(mesh.container().pieces().all(|p| p.stage == Stage::Executive && p.shortest_piece_length.is_some()));
    }

    #[test]
    fn test_stacks_cover_every_piece() {
        let mesh = filled_mesh();
        let total: usize = mesh.stacks().iter().map(Stack::len).sum();
        assert_eq!(total, mesh.container().len());
    }

    // ------------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------------

    #[test]
    fn test_min_gap_warning() {
        let mesh = filled_mesh();
        let warning = mesh.min_gap_warning().unwrap();
        assert_eq!(warning.kind, GapKind::MinGap);
        assert!(warning.gap < 0.025);
        assert!(mesh.max_gap_warning().is_none());
        assert!(mesh.min_ratio_warning().is_none());
    }

    #[test]
    fn test_min_ratio_warning() {
        let mut mesh = mesh();
        mesh.set_typical_rebar(rebar(), rebar(), ArrangementMethod::Count(2)).unwrap();
        assert_eq!(mesh.min_ratio_warning(), Some(MinRatioWarning { num: 2, min_num: 6 }));
    }

    #[test]
    fn test_max_gap_warning() {
        let mut mesh = mesh_with(vec![0.0001; 10]);
        let small = Rebar::with_lengths(RebarType::T8, Level::Bottom, 0.4, 0.5, 0.15);
        mesh.set_typical_rebar(small, small, ArrangementMethod::Count(2)).unwrap();
        let warning = mesh.max_gap_warning().unwrap();
        assert!(approx_eq(warning.gap, 0.884));
        assert!(approx_eq(warning.max_gap, 0.3));
    }

    #[test]
    fn test_effective_area() {
        let mut mesh = mesh();
        mesh.set_typical_rebar(rebar(), rebar(), ArrangementMethod::MinRatio).unwrap();
        let mut piece = Piece::new(rebar(), Period::new(2.0, 6.0));
        piece.executive = Period::new(2.0, 6.0);
        mesh.container.add_row(vec![piece]);

        let diagram = mesh.effective_area_diagram().unwrap();
        let typical = 6.0 * rebar().area();
        assert!(approx_eq(diagram.value_at(0.0).unwrap(), typical));
        assert!(approx_eq(diagram.value_at(2.0).unwrap(), typical));
        assert!(approx_eq(diagram.value_at(2.5).unwrap(), typical + 0.5 * rebar().area()));
        assert!(approx_eq(diagram.value_at(4.0).unwrap(), typical + rebar().area()));
        assert!(approx_eq(diagram.value_at(5.5).unwrap(), typical + 0.5 * rebar().area()));
    }

    #[test]
    fn test_resistance_moment() {
        let mesh = filled_mesh();
        let stations = [0.0, 5.0, 6.0, 8.0, 9.0];
        let widths = [1.0, 1.0, 1.2, 3.0, 4.0];
        let diagram = mesh.resistance_moment_diagram(&widths, &stations, 40000.0, 3000.0).unwrap();
        for s in stations {
            assert!(diagram.stations().contains(&s));
        }
        assert!(diagram.values().iter().all(|m| m.is_finite() && *m > 0.0));
        assert!(mesh.resistance_moment_diagram(&widths[..2], &stations, 40000.0, 3000.0).is_err());
    }

    #[test]
    fn test_design_moment_grows_with_steel() {
        let low = design_moment(0.001, 1.0, 0.8, 4000.0, 250.0);
        let high = design_moment(0.002, 1.0, 0.8, 4000.0, 250.0);
        assert!(high > low);
        assert!(approx_eq(design_moment(0.0, 1.0, 0.8, 4000.0, 250.0), 0.0));
    }
}
