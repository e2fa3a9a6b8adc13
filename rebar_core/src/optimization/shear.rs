//! # Shear Type Optimization
//!
//! Zones are clustered into at most `n` density bands. A band is costed at its
//! highest density over the length of every zone it holds, so a zone can only
//! be rounded up. Same DP shape as the length-type reduction, over sorted
//! distinct densities:
//!
//! ```text
//! c[0][j] = Σ over zones with density <= D[j] of D[j] * length
//! c[i][j] = min over k in [i-1, j) of c[i-1][k] + Σ over D[k] < density <= D[j]
//! ```
//!
//! Each selected density becomes a stirrup arrangement: the fewest legs `j`
//! that allow a spacing of at least the minimum interval, with the spacing
//! rounded down to the centimeter and capped at the maximum interval.

use crate::errors::{LayoutError, LayoutResult};
use crate::layout::shear::{ShearType, ShearZone};
use crate::materials::RebarType;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Pair {
    value: f64,
    reference: Option<usize>,
}

/// Shear band DP plus type generation and zone assignment.
#[derive(Debug, Clone)]
pub struct ShearOptimization {
    rebar_type: RebarType,
    max_interval: f64,
    min_interval: f64,
    number_of_types: usize,
    densities: Vec<f64>,
    container: Vec<Vec<Option<Pair>>>,
}

impl ShearOptimization {
    pub fn new(rebar_type: RebarType, max_interval: f64, min_interval: f64, number_of_types: usize) -> Self {
        ShearOptimization {
            rebar_type,
            max_interval,
            min_interval,
            number_of_types,
            densities: Vec::new(),
            container: Vec::new(),
        }
    }

    /// Pick shear types and label every zone with one.
    ///
    /// Zones are reordered by density. Returns the generated types, ids
    /// starting at 1.
    pub fn run(&mut self, zones: &mut [ShearZone]) -> LayoutResult<Vec<ShearType>> {
        if zones.is_empty() {
            return Ok(Vec::new());
        }
        if self.number_of_types == 0 {
            return Err(LayoutError::invalid_input("shear_type_number", "0", "at least one shear type is needed"));
        }
        zones.sort_by(|a, b| a.steel_density.total_cmp(&b.steel_density));
        let mut densities: Vec<f64> = zones.iter().map(|z| z.steel_density).collect();
        densities.dedup();
        self.densities = densities;

        self.fill(zones);
        let selected = self.selected_densities();
        let types = self.shear_types(&selected);
        assign_shear_types(zones, &types)?;
        tracing::debug!(zones = zones.len(), types = types.len(), "shear types assigned");
        Ok(types)
    }

    fn fill(&mut self, zones: &[ShearZone]) {
        let densities = &self.densities;
        let n = densities.len();
        let rows = self.number_of_types.min(n);
        let mut container: Vec<Vec<Option<Pair>>> = vec![vec![None; n]; rows];
        for i in 0..rows {
            for j in i..n {
                let pair = if i == 0 {
                    let value = zones
                        .iter()
                        .take_while(|z| z.steel_density <= densities[j])
                        .map(|z| densities[j] * z.period.length())
                        .sum();
                    Pair { value, reference: None }
                } else {
                    let mut best = Pair { value: f64::INFINITY, reference: None };
                    for k in (i - 1)..j {
                        let Some(prev) = container[i - 1][k] else { continue };
                        let band: f64 = zones
                            .iter()
                            .filter(|z| densities[k] < z.steel_density && z.steel_density <= densities[j])
                            .map(|z| densities[j] * z.period.length())
                            .sum();
                        let value = prev.value + band;
                        if value < best.value {
                            best = Pair { value, reference: Some(k) };
                        }
                    }
                    best
                };
                container[i][j] = Some(pair);
            }
        }
        self.container = container;
    }

    /// Band densities in ascending order.
    fn selected_densities(&self) -> Vec<f64> {
        let n = self.densities.len();
        let mut selected = Vec::new();
        let mut col = Some(n - 1);
        for row in (0..self.container.len()).rev() {
            let Some(c) = col else { break };
            selected.push(self.densities[c]);
            col = self.container[row][c].and_then(|p| p.reference);
        }
        selected.sort_by(f64::total_cmp);
        selected
    }

    fn shear_types(&self, densities: &[f64]) -> Vec<ShearType> {
        let area = self.rebar_type.area();
        let mut types: Vec<ShearType> = Vec::new();
        for &density in densities {
            let mut legs: u32 = 1;
            while (legs as f64) * area / density < self.min_interval {
                legs += 1;
            }
            let interval = ((100.0 * legs as f64 * area / density).floor() / 100.0).min(self.max_interval);
            let candidate = ShearType::new(self.rebar_type, interval, legs, types.len() + 1);
            if !types.iter().any(|t| t.same_arrangement(&candidate)) {
                types.push(candidate);
            }
        }
        types
    }
}

/// Label every zone with the first type dense enough for it.
pub fn assign_shear_types(zones: &mut [ShearZone], types: &[ShearType]) -> LayoutResult<()> {
    for zone in zones.iter_mut() {
        let Some(shear_type) = types.iter().find(|t| t.covers(zone.steel_density)) else {
            return Err(LayoutError::contract(
                "assign_shear_types",
                format!("no shear type covers density {}", zone.steel_density),
            ));
        };
        zone.shear_type = Some(shear_type.id);
    }
    Ok(())
}
