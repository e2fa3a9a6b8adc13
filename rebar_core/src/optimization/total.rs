//! # Total Length-Type Reduction
//!
//! Every additional piece of the foundation has a rounded shortest bar length
//! and an upper bound it may grow to. [`TotalAlgorithm`] picks `n` catalog
//! lengths so that lengthening every piece to the next catalog length wastes
//! as little steel as possible. The stock length is always a candidate.
//!
//! Pieces with equal length form one weighted group. With groups sorted by
//! length:
//!
//! ```text
//! waste(k → j) = count[k] * (len[j] - len[k])   if len[j] <= bound[k]
//!              = inf                            otherwise
//! c[0][j] = Σ_{k<j} waste(k → j)
//! c[i][j] = min over m in [i-1, j) of c[i-1][m] + Σ_{m<k<j} waste(k → j)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use rebar_core::optimization::{LengthItem, total::TotalAlgorithm};
//!
//! let items = [LengthItem::new(4.0, 12.0, 1), LengthItem::new(6.0, 12.0, 1)];
//! let total = TotalAlgorithm::new(&items);
//! assert_eq!(total.selected_lengths(2).unwrap(), vec![12.0, 6.0]);
//! ```

use std::collections::BTreeMap;

use crate::errors::{LayoutError, LayoutResult, TypeScope};
use crate::layout::piece::STANDARD_LENGTH;
use crate::optimization::{length_key, LengthItem};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Pair {
    value: f64,
    reference: Option<usize>,
}

/// Length group: all pieces with the same rounded shortest length.
#[derive(Debug, Clone, PartialEq)]
pub struct LengthGroup {
    pub length: f64,
    pub count: usize,
    pub upper_bound: f64,
}

/// Interval DP over foundation-wide length groups.
#[derive(Debug, Clone)]
pub struct TotalAlgorithm {
    groups: Vec<LengthGroup>,
    container: Vec<Vec<Option<Pair>>>,
}

impl TotalAlgorithm {
    pub fn new(items: &[LengthItem]) -> Self {
        let groups = Self::group(items);
        let mut algorithm = TotalAlgorithm { groups, container: Vec::new() };
        algorithm.run();
        algorithm
    }

    /// Build directly from groups. With no groups the stock length is the
    /// only candidate.
    pub fn from_groups(mut groups: Vec<LengthGroup>) -> Self {
        groups.sort_by(|a, b| a.length.total_cmp(&b.length));
        if groups.is_empty() {
            groups.push(LengthGroup { length: STANDARD_LENGTH, count: 0, upper_bound: STANDARD_LENGTH });
        }
        let mut algorithm = TotalAlgorithm { groups, container: Vec::new() };
        algorithm.run();
        algorithm
    }

    fn group(items: &[LengthItem]) -> Vec<LengthGroup> {
        let mut by_length: BTreeMap<i64, LengthGroup> = BTreeMap::new();
        for item in items {
            by_length
                .entry(length_key(item.length))
                .and_modify(|g| {
                    g.count += 1;
                    g.upper_bound = g.upper_bound.min(item.upper_bound);
                })
                .or_insert(LengthGroup { length: item.length, count: 1, upper_bound: item.upper_bound });
        }
        let mut groups: Vec<LengthGroup> = by_length.into_values().collect();
        if !groups.iter().any(|g| length_key(g.length) == length_key(STANDARD_LENGTH)) {
            groups.push(LengthGroup { length: STANDARD_LENGTH, count: 0, upper_bound: STANDARD_LENGTH });
        }
        groups
    }

    pub fn groups(&self) -> &[LengthGroup] {
        &self.groups
    }

    fn waste(&self, k: usize, j: usize) -> f64 {
        let (from, to) = (&self.groups[k], &self.groups[j]);
        if to.length > from.upper_bound {
            f64::INFINITY
        } else {
            from.count as f64 * (to.length - from.length)
        }
    }

    fn run(&mut self) {
        let n = self.groups.len();
        let mut container: Vec<Vec<Option<Pair>>> = vec![vec![None; n]; n];
        for i in 0..n {
            for j in i..n {
                let pair = if i == 0 {
                    Pair { value: (0..j).map(|k| self.waste(k, j)).sum(), reference: None }
                } else {
                    let mut best = Pair { value: f64::INFINITY, reference: None };
                    for m in (i - 1)..j {
                        let Some(prev) = container[i - 1][m] else { continue };
                        let value = prev.value + ((m + 1)..j).map(|k| self.waste(k, j)).sum::<f64>();
                        if value < best.value {
                            best = Pair { value, reference: Some(m) };
                        }
                    }
                    best
                };
                container[i][j] = Some(pair);
            }
        }
        self.container = container;
    }

    fn last_column_value(&self, row: usize) -> f64 {
        let last = self.groups.len() - 1;
        self.container[row][last].map_or(f64::INFINITY, |p| p.value)
    }

    /// Smallest type count with a finite waste.
    pub fn min_feasible(&self) -> Option<usize> {
        (0..self.groups.len()).find(|&row| self.last_column_value(row).is_finite()).map(|row| row + 1)
    }

    /// The `n` catalog lengths of the cheapest selection, longest first.
    ///
    /// Asking for more types than there are distinct lengths returns all of
    /// them.
    pub fn selected_lengths(&self, number_of_types: usize) -> LayoutResult<Vec<f64>> {
        if number_of_types == 0 {
            return Err(LayoutError::invalid_input("total_type_number", "0", "at least one length type is needed"));
        }
        let n = self.groups.len();
        let mut row = (number_of_types - 1).min(n - 1);
        if !self.last_column_value(row).is_finite() {
            let min_feasible = self.min_feasible().unwrap_or(n);
            return Err(LayoutError::not_enough_types(TypeScope::Total, number_of_types, min_feasible));
        }

        let mut selected = Vec::with_capacity(row + 1);
        let mut col = Some(n - 1);
        loop {
            let Some(c) = col else { break };
            selected.push(self.groups[c].length);
            col = self.container[row][c].and_then(|p| p.reference);
            if row == 0 {
                break;
            }
            row -= 1;
        }
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9 || (a.is_infinite() && b.is_infinite())
    }

    fn items(bounds: [f64; 8]) -> Vec<LengthItem> {
        let lengths = [1.0, 1.0, 2.0, 2.0, 2.0, 4.0, 4.0, 6.0];
        lengths.iter().zip(bounds).map(|(&l, b)| LengthItem::new(l, b, 1)).collect()
    }

    fn bounded() -> Vec<LengthItem> {
        items([2.0, 3.0, 3.0, 3.0, 5.0, 4.0, 4.0, 7.0])
    }

    fn unbounded() -> Vec<LengthItem> {
        items([12.0; 8])
    }

    fn assert_row(algorithm: &TotalAlgorithm, row: usize, expected: &[(f64, Option<usize>)]) {
        let cells: Vec<Pair> = algorithm.container[row].iter().flatten().copied().collect();
        assert_eq!(cells.len(), expected.len(), "row {}", row);
        for (cell, (value, reference)) in cells.iter().zip(expected) {
            assert!(approx_eq(cell.value, *value), "row {}: {} vs {}", row, cell.value, value);
            if value.is_finite() {
                assert_eq!(cell.reference, *reference, "row {}", row);
            }
        }
    }

    #[test]
    fn test_groups() {
        let algorithm = TotalAlgorithm::new(&bounded());
        let lengths: Vec<f64> = algorithm.groups().iter().map(|g| g.length).collect();
        let counts: Vec<usize> = algorithm.groups().iter().map(|g| g.count).collect();
        let bounds: Vec<f64> = algorithm.groups().iter().map(|g| g.upper_bound).collect();
        assert_eq!(lengths, vec![1.0, 2.0, 4.0, 6.0, 12.0]);
        assert_eq!(counts, vec![2, 3, 2, 1, 0]);
        assert_eq!(bounds, vec![2.0, 3.0, 4.0, 7.0, 12.0]);
    }

    #[test]
    fn test_run_no_bound() {
        let algorithm = TotalAlgorithm::new(&unbounded());
        assert_row(&algorithm, 0, &[(0.0, None), (2.0, None), (12.0, None), (26.0, None), (74.0, None)]);
        assert_row(&algorithm, 1, &[(0.0, Some(0)), (2.0, Some(1)), (6.0, Some(1)), (18.0, Some(2))]);
        assert_row(&algorithm, 2, &[(0.0, Some(1)), (2.0, Some(2)), (6.0, Some(3))]);
        assert_row(&algorithm, 3, &[(0.0, Some(2)), (2.0, Some(3))]);
        assert_row(&algorithm, 4, &[(0.0, Some(3))]);
    }

    #[test]
    fn test_run_bounded() {
        let inf = f64::INFINITY;
        let algorithm = TotalAlgorithm::new(&bounded());
        assert_row(&algorithm, 0, &[(0.0, None), (2.0, None), (inf, None), (inf, None), (inf, None)]);
        assert_row(&algorithm, 1, &[(0.0, Some(0)), (2.0, Some(1)), (inf, None), (inf, None)]);
        assert_row(&algorithm, 2, &[(0.0, Some(1)), (2.0, Some(2)), (inf, None)]);
        assert_row(&algorithm, 3, &[(0.0, Some(2)), (2.0, Some(3))]);
        assert_row(&algorithm, 4, &[(0.0, Some(3))]);
    }

    #[test]
    fn test_run_weighted_groups() {
        let groups = [(2.0, 1), (3.0, 5), (7.0, 3), (11.0, 10), (15.0, 4)]
            .iter()
            .map(|&(length, count)| LengthGroup { length, count, upper_bound: 15.0 })
            .collect();
        let algorithm = TotalAlgorithm::from_groups(groups);
        assert_row(&algorithm, 0, &[(0.0, None), (1.0, None), (25.0, None), (61.0, None), (137.0, None)]);
        assert_row(&algorithm, 1, &[(0.0, Some(0)), (1.0, Some(1)), (13.0, Some(1)), (61.0, Some(3))]);
        assert_row(&algorithm, 2, &[(0.0, Some(1)), (1.0, Some(2)), (13.0, Some(3))]);
        assert_row(&algorithm, 3, &[(0.0, Some(2)), (1.0, Some(3))]);
        assert_row(&algorithm, 4, &[(0.0, Some(3))]);
    }

    #[test]
    fn test_selected_lengths_not_enough() {
        let algorithm = TotalAlgorithm::new(&bounded());
        let err = algorithm.selected_lengths(3).unwrap_err();
        assert_eq!(err.min_feasible(), Some(4));
        assert_eq!(err.error_code(), "NOT_ENOUGH_TYPES");
    }

    #[test]
    fn test_selected_lengths_feasible() {
        let algorithm = TotalAlgorithm::new(&bounded());
        assert_eq!(algorithm.selected_lengths(4).unwrap(), vec![12.0, 6.0, 4.0, 2.0]);
        assert_eq!(algorithm.selected_lengths(9).unwrap(), vec![12.0, 6.0, 4.0, 2.0, 1.0]);
    }

    #[test]
    fn test_selected_lengths_no_bound() {
        let algorithm = TotalAlgorithm::new(&unbounded());
        assert_eq!(algorithm.selected_lengths(1).unwrap(), vec![12.0]);
        // 1 → 2 and 4 → 6 waste 2 + 4, any other 3-type catalog wastes more
        assert_eq!(algorithm.selected_lengths(3).unwrap(), vec![12.0, 6.0, 2.0]);
        assert_eq!(algorithm.selected_lengths(4).unwrap(), vec![12.0, 6.0, 4.0, 2.0]);
    }

    #[test]
    fn test_empty_input_only_stock_length() {
        let algorithm = TotalAlgorithm::new(&[]);
        assert_eq!(algorithm.selected_lengths(2).unwrap(), vec![12.0]);
    }

    #[test]
    fn test_no_groups_falls_back_to_stock_length() {
        let algorithm = TotalAlgorithm::from_groups(Vec::new());
        assert_eq!(algorithm.groups().len(), 1);
        assert_eq!(algorithm.selected_lengths(2).unwrap(), vec![12.0]);
        assert_eq!(algorithm.min_feasible(), Some(1));
    }
}
