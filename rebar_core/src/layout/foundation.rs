//! # Foundation
//!
//! Every strip of a project, laid out together. A run goes:
//!
//! 1. typical or thermal steel on every face
//! 2. additional rows and the mesh pipeline
//! 3. shear zones and stirrup types across all strips
//! 4. length-type reduction: a foundation-wide catalog, then a subset per
//!    stack, repeated while re-deriving the executive periods keeps merging
//!    pieces
//! 5. warnings
//!
//! Too few total length types is not a failure of the run. It is recorded in
//! [`Foundation::errors`] with the smallest count that would work.
//!
//! ## Example
//!
//! ```rust
//! use rebar_core::layout::Foundation;
//! use rebar_core::project::Project;
//!
//! let project = Project::sample();
//! let mut foundation = Foundation::new(&project.strips, &project.config).unwrap();
//! foundation.run().unwrap();
//! assert!(foundation.errors().is_none());
//! ```

use serde::{Deserialize, Serialize};

use crate::config::LayoutConfig;
use crate::errors::{LayoutError, LayoutResult};
use crate::layout::piece::{Piece, STANDARD_LENGTH};
use crate::layout::shear::ShearType;
use crate::layout::strip::Strip;
use crate::materials::{BendDegree, Level, RebarType};
use crate::optimization::{assign_shear_types, LengthItem, ShearOptimization, StackAlgorithm, TotalAlgorithm};
use crate::project::StripInput;
use crate::report::{ExcessStack, FaceWarning, RunErrors, TotalTypeNum, Warnings};
use crate::rounding::round_up;

/// Passes of the length-type loop before it gives up on a fixed point
pub const MAX_LENGTH_PASSES: usize = 50;

/// Stirrups of one shear zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShearPiece {
    pub rebar_type: RebarType,
    pub number: u32,
    /// Cut length: stirrup height plus a 135° and a 90° hook
    pub length: f64,
}

#[derive(Debug, Clone)]
pub struct Foundation {
    strips: Vec<Strip>,
    config: LayoutConfig,
    shear_types: Vec<ShearType>,
    /// Catalog of additional bar lengths, longest first
    length_catalog: Vec<f64>,
    warnings: Warnings,
    errors: Option<RunErrors>,
}

impl Foundation {
    pub fn new(inputs: &[StripInput], config: &LayoutConfig) -> LayoutResult<Self> {
        config.validate()?;
        let strips = inputs
            .iter()
            .map(|input| Strip::new(input, config.side_cover, config.constants))
            .collect::<LayoutResult<Vec<_>>>()?;
        Ok(Foundation {
            strips,
            config: config.clone(),
            shear_types: Vec::new(),
            length_catalog: Vec::new(),
            warnings: Warnings::default(),
            errors: None,
        })
    }

    pub fn strips(&self) -> &[Strip] {
        &self.strips
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn shear_types(&self) -> &[ShearType] {
        &self.shear_types
    }

    pub fn length_catalog(&self) -> &[f64] {
        &self.length_catalog
    }

    pub fn warnings(&self) -> &Warnings {
        &self.warnings
    }

    pub fn errors(&self) -> Option<&RunErrors> {
        self.errors.as_ref()
    }

    /// Lay out every strip.
    pub fn run(&mut self) -> LayoutResult<()> {
        tracing::info!(strips = self.strips.len(), "layout run started");
        let config = self.config.clone();
        let table = config.special_lengths.as_ref();

        for strip in &mut self.strips {
            strip.set_typical_rebar(&config)?;
        }
        for strip in &mut self.strips {
            strip.set_additional_rebar(config.diameter.additional, config.elimination.additional, table)?;
        }
        self.set_shear_rebar()?;
        self.set_length_type_num()?;
        self.set_warnings();

        tracing::info!(
            pieces = self.additional_pieces().count(),
            length_types = self.length_catalog.len(),
            shear_types = self.shear_types.len(),
            warnings = self.warnings.count(),
            "layout run finished"
        );
        Ok(())
    }

    /// Live additional pieces of every face.
    pub fn additional_pieces(&self) -> impl Iterator<Item = &Piece> + '_ {
        self.strips
            .iter()
            .flat_map(|strip| Level::BOTH.into_iter().flat_map(move |level| strip.mesh(level).container().pieces()))
    }

    fn min_thickness(&self) -> Option<f64> {
        self.strips
            .iter()
            .map(|s| s.mesh(Level::Bottom).section().thickness)
            .min_by(f64::total_cmp)
    }

    // ========================================================================
    // Shear
    // ========================================================================

    fn set_shear_rebar(&mut self) -> LayoutResult<()> {
        let Some(min_thickness) = self.min_thickness() else { return Ok(()) };
        let elimination = self.config.elimination.shear;
        for strip in &mut self.strips {
            strip.set_shear(elimination);
        }

        let mut zones: Vec<_> = self.strips.iter().flat_map(|s| s.shear_zones().iter().cloned()).collect();
        let mut optimization = ShearOptimization::new(
            self.config.diameter.shear,
            min_thickness / 2.0,
            self.config.constants.min_shear_interval,
            self.config.type_number.shear,
        );
        let types = optimization.run(&mut zones)?;
        for strip in &mut self.strips {
            assign_shear_types(strip.shear_zones_mut(), &types)?;
        }
        tracing::info!(zones = zones.len(), types = types.len(), "shear types selected");
        self.shear_types = types;
        Ok(())
    }

    /// Stirrup cut list, one entry per shear zone in strip order.
    pub fn shear_pieces(&self) -> LayoutResult<Vec<ShearPiece>> {
        let table = self.config.special_lengths.as_ref();
        let mut pieces = Vec::new();
        for zone in self.strips.iter().flat_map(|s| s.shear_zones()) {
            let shear_type = zone
                .shear_type
                .and_then(|id| self.shear_types.iter().find(|t| t.id == id))
                .ok_or_else(|| LayoutError::contract("shear_pieces", format!("zone {} has no shear type", zone.period)))?;
            let hooks = shear_type.rebar_type.bend_length(BendDegree::Deg135, table)?
                + shear_type.rebar_type.bend_length(BendDegree::Deg90, table)?;
            let rows = (zone.period.length() / shear_type.interval).ceil() as u32;
            pieces.push(ShearPiece {
                rebar_type: shear_type.rebar_type,
                number: shear_type.number * rows,
                length: round_up(zone.thickness + hooks, 0.01),
            });
        }
        Ok(pieces)
    }

    // ========================================================================
    // Length types
    // ========================================================================

    fn set_length_type_num(&mut self) -> LayoutResult<()> {
        let total_types = self.config.type_number.total;
        let stack_types = self.config.type_number.stack;

        for pass in 1..=MAX_LENGTH_PASSES {
            let items = self.additional_pieces().map(length_item).collect::<LayoutResult<Vec<_>>>()?;
            let selected = match TotalAlgorithm::new(&items).selected_lengths(total_types) {
                Ok(selected) => selected,
                Err(err) => match err.min_feasible() {
                    Some(min_feasible_num) => {
                        tracing::warn!(requested = total_types, min_feasible_num, "not enough total length types");
                        self.errors = Some(RunErrors {
                            total_type_num: TotalTypeNum { num: total_types, min_feasible_num },
                        });
                        return Ok(());
                    }
                    None => return Err(err),
                },
            };
            tracing::info!(pass, lengths = ?selected, "length catalog selected");

            self.warnings.excess_stack = self.set_stack_lengths(&selected, stack_types)?;
            self.length_catalog = selected;

            let mut unified = false;
            for strip in &mut self.strips {
                if strip.adjust_reduced_type_lengths()? {
                    unified = true;
                }
            }
            if !unified {
                return Ok(());
            }
            for strip in &mut self.strips {
                strip.refresh()?;
            }
        }
        tracing::warn!(passes = MAX_LENGTH_PASSES, "length types did not settle");
        Ok(())
    }

    /// Write per-stack catalog lengths to every piece. Returns the faces
    /// whose stacks needed more types than allowed.
    fn set_stack_lengths(&mut self, catalog: &[f64], stack_types: usize) -> LayoutResult<Vec<ExcessStack>> {
        let mut excess = Vec::new();
        for strip in &mut self.strips {
            let strip_name = strip.name().to_string();
            for level in Level::BOTH {
                let mesh = strip.mesh_mut(level);
                let mut excess_list = Vec::new();
                for stack in mesh.stacks() {
                    let items = stack
                        .pieces()
                        .iter()
                        .map(|&id| length_item(mesh.container().piece(id)))
                        .collect::<LayoutResult<Vec<_>>>()?;
                    let algorithm = StackAlgorithm::new(items, catalog);
                    let lengths = match algorithm.set_lengths(stack_types) {
                        Ok(lengths) => lengths,
                        Err(err) => match err.min_feasible() {
                            Some(min) => {
                                excess_list.push(min);
                                algorithm.set_lengths(min)?
                            }
                            None => return Err(err),
                        },
                    };
                    for (&id, length) in stack.pieces().iter().zip(lengths) {
                        mesh.container_mut().piece_mut(id).shortest_piece_length = Some(length);
                    }
                }
                if !excess_list.is_empty() {
                    tracing::warn!(strip = %strip_name, %level, ?excess_list, "stacks exceed the length type count");
                    excess.push(ExcessStack { strip_name: strip_name.clone(), level, excess_list });
                }
            }
        }
        Ok(excess)
    }

    // ========================================================================
    // Warnings
    // ========================================================================

    fn set_warnings(&mut self) {
        let mut warnings = Warnings {
            excess_stack: std::mem::take(&mut self.warnings.excess_stack),
            ..Warnings::default()
        };
        for strip in &self.strips {
            for level in Level::BOTH {
                let mesh = strip.mesh(level);
                if let Some(detail) = mesh.max_gap_warning() {
                    warnings.max_gap.push(FaceWarning { strip_name: strip.name().to_string(), level, detail });
                }
                if let Some(detail) = mesh.min_gap_warning() {
                    warnings.min_gap.push(FaceWarning { strip_name: strip.name().to_string(), level, detail });
                }
                if let Some(detail) = mesh.min_ratio_warning() {
                    warnings.min_ratio.push(FaceWarning { strip_name: strip.name().to_string(), level, detail });
                }
            }
        }
        self.warnings = warnings;
    }
}

fn length_item(piece: &Piece) -> LayoutResult<LengthItem> {
    let length = piece
        .shortest_piece_length
        .ok_or_else(|| LayoutError::contract("length_item", format!("piece {} has no rounded length", piece.executive)))?;
    Ok(LengthItem::new(
        length,
        piece.length_upper_bound.unwrap_or(STANDARD_LENGTH),
        piece.required_num_of_pieces(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Project;

    fn run(strips: &[StripInput], config: &LayoutConfig) -> Foundation {
        let mut foundation = Foundation::new(strips, config).unwrap();
        foundation.run().unwrap();
        foundation
    }

    fn foundation(config: &LayoutConfig) -> Foundation {
        run(&Project::sample().strips, config)
    }

    /// Sample strips cut down to their first `n` stations.
    fn short_strips(n: usize) -> Vec<StripInput> {
        let mut strips = Project::sample().strips;
        for strip in &mut strips {
            strip.stations.truncate(n);
            strip.flexural.top.truncate(n);
            strip.flexural.bottom.truncate(n);
            strip.moment.top.truncate(n);
            strip.moment.bottom.truncate(n);
            strip.shear.truncate(n);
            strip.widths.truncate(n);
            let end = strip.stations[n - 1];
            strip.column_sides.retain(|pair| pair[1] < end);
            strip.strip_sides.retain(|pair| pair[1] < end);
        }
        strips
    }

    #[test]
    fn test_run() {
        let config = LayoutConfig::default();
        let foundation = foundation(&config);
        assert!(foundation.errors().is_none());
        assert!(foundation.additional_pieces().count() > 0);
        assert!(!foundation.length_catalog().is_empty());
        assert!(foundation.length_catalog().len() <= config.type_number.total);
    }

    #[test]
    fn test_pieces_use_catalog_lengths() {
        let foundation = foundation(&LayoutConfig::default());
        let catalog = foundation.length_catalog();
        for piece in foundation.additional_pieces() {
            let length = piece.shortest_piece_length.unwrap();
            assert!(catalog.iter().any(|c| (c - length).abs() < 1e-6), "{} not in {:?}", length, catalog);
        }
    }

    #[test]
    fn test_shear_types_cover_zones() {
        let foundation = foundation(&LayoutConfig::default());
        let types = foundation.shear_types();
        assert!(!types.is_empty());
        assert!(types.len() <= 3);
        for strip in foundation.strips() {
            for zone in strip.shear_zones() {
                let id = zone.shear_type.unwrap();
                let shear_type = types.iter().find(|t| t.id == id).unwrap();
                assert!(shear_type.covers(zone.steel_density));
                assert!(shear_type.interval <= 0.45);
            }
        }
    }

    #[test]
    fn test_shear_pieces() {
        let foundation = foundation(&LayoutConfig::default());
        let pieces = foundation.shear_pieces().unwrap();
        let zones: usize = foundation.strips().iter().map(|s| s.shear_zones().len()).sum();
        assert_eq!(pieces.len(), zones);
        let hooks = RebarType::T10.bend_length(BendDegree::Deg135, None).unwrap()
            + RebarType::T10.bend_length(BendDegree::Deg90, None).unwrap();
        for piece in pieces {
            assert!((piece.length - round_up(0.9 + hooks, 0.01)).abs() < 1e-9);
            assert!(piece.number > 0);
        }
    }

    #[test]
    fn test_too_few_total_types() {
        let mut config = LayoutConfig::default();
        config.type_number.total = 1;
        // bars shorter than stock length cannot all be cut to 12 m
        let foundation = run(&short_strips(9), &config);
        let errors = foundation.errors().unwrap();
        assert_eq!(errors.total_type_num.num, 1);
        assert!(errors.total_type_num.min_feasible_num > 1);
    }

    #[test]
    fn test_single_stack_type_warns() {
        let mut config = LayoutConfig::default();
        config.type_number.stack = 1;
        config.diameter.additional = RebarType::T12;
        let foundation = foundation(&config);
        for excess in &foundation.warnings().excess_stack {
            assert!(excess.excess_list.iter().all(|&n| n > 1));
        }
    }

    #[test]
    fn test_invalid_config() {
        let mut config = LayoutConfig::default();
        config.type_number.total = 0;
        assert!(Foundation::new(&Project::sample().strips, &config).is_err());
    }
}
