//! # Per-Stack Length-Type Reduction
//!
//! After the foundation-wide catalog is chosen, each stack picks a subset of
//! it. A stack's type count is not the number of catalog lengths it uses:
//! a spliced piece of two bars and a single bar of the same short length are
//! different bar marks. [`TypeCounter`] tracks lengths per bar count so the
//! DP can report every reachable type count with its cheapest selection.
//!
//! ```text
//! c[0][j] = Σ over pieces with len <= L[j] of (L[j] - len)
//! c[i][j] = min over k in [i-1, j) of c[i-1][k] + Σ over L[k] < len <= L[j]
//! ```
//!
//! A cell is infeasible when any piece it lengthens has an upper bound below
//! the candidate.

use std::collections::{BTreeMap, BTreeSet};

use crate::errors::{LayoutError, LayoutResult, TypeScope};
use crate::optimization::{length_key, LengthItem};

/// Lengths used per bar count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeCounter {
    counter: BTreeMap<usize, BTreeSet<i64>>,
}

impl TypeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_piece(&mut self, segments: usize, length: f64) {
        self.counter.entry(segments).or_default().insert(length_key(length));
    }

    /// Merge another counter into this one.
    pub fn add(&mut self, other: &TypeCounter) {
        for (segments, lengths) in &other.counter {
            self.counter.entry(*segments).or_default().extend(lengths.iter().copied());
        }
    }

    pub fn num_of_types(&self) -> usize {
        self.counter.values().map(BTreeSet::len).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Cell {
    value: f64,
    reference: Option<usize>,
    type_counter: TypeCounter,
}

/// Interval DP over one stack and a fixed set of catalog lengths.
#[derive(Debug, Clone)]
pub struct StackAlgorithm {
    items: Vec<LengthItem>,
    candidates: Vec<f64>,
    container: Vec<Vec<Option<Cell>>>,
    /// type count → selected lengths, longest first
    type_map: BTreeMap<usize, Vec<f64>>,
}

impl StackAlgorithm {
    pub fn new(items: Vec<LengthItem>, candidates: &[f64]) -> Self {
        let mut candidates = candidates.to_vec();
        candidates.sort_by(f64::total_cmp);
        candidates.dedup_by_key(|c| length_key(*c));
        let mut algorithm = StackAlgorithm {
            items,
            candidates,
            container: Vec::new(),
            type_map: BTreeMap::new(),
        };
        algorithm.run();
        algorithm.type_map = algorithm.collect_type_map();
        algorithm
    }

    fn sorted_items(&self) -> Vec<&LengthItem> {
        let mut items: Vec<&LengthItem> = self.items.iter().collect();
        items.sort_by(|a, b| a.length.total_cmp(&b.length));
        items
    }

    /// Cost of raising the pieces in `(low, target]` to `target`.
    fn extend(items: &[&LengthItem], low: Option<f64>, target: f64, counter: &mut TypeCounter) -> Option<f64> {
        let mut sum = 0.0;
        for item in items {
            let above_low = low.map_or(true, |l| item.length > l);
            if item.length <= target && above_low {
                if item.upper_bound < target {
                    return None;
                }
                sum += target - item.length;
                counter.add_piece(item.segments, target);
            }
        }
        Some(sum)
    }

    fn run(&mut self) {
        let items = self.sorted_items();
        let lengths = &self.candidates;
        let n = lengths.len();
        let mut container: Vec<Vec<Option<Cell>>> = vec![vec![None; n]; n];
        for i in 0..n {
            for j in i..n {
                if i == 0 {
                    let mut type_counter = TypeCounter::new();
                    if let Some(value) = Self::extend(&items, None, lengths[j], &mut type_counter) {
                        container[i][j] = Some(Cell { value, reference: None, type_counter });
                    }
                    continue;
                }
                let mut best: Option<Cell> = None;
                for k in (i - 1)..j {
                    let Some(prev) = &container[i - 1][k] else { continue };
                    let mut type_counter = prev.type_counter.clone();
                    let Some(extra) = Self::extend(&items, Some(lengths[k]), lengths[j], &mut type_counter) else {
                        continue;
                    };
                    let value = prev.value + extra;
                    if best.as_ref().map_or(true, |b| value < b.value) {
                        best = Some(Cell { value, reference: Some(k), type_counter });
                    }
                }
                container[i][j] = best;
            }
        }
        self.container = container;
    }

    fn collect_type_map(&self) -> BTreeMap<usize, Vec<f64>> {
        let Some(max_length) = self.items.iter().map(|i| i.length).reduce(f64::max) else {
            return BTreeMap::new();
        };
        let n = self.candidates.len();
        // type count → (value, row, col)
        let mut cheapest: BTreeMap<usize, (f64, usize, usize)> = BTreeMap::new();
        for i in 0..n {
            for j in i..n {
                let Some(cell) = &self.container[i][j] else { continue };
                if self.candidates[j] < max_length {
                    continue;
                }
                let types = cell.type_counter.num_of_types();
                match cheapest.get(&types) {
                    Some(&(value, _, _)) if cell.value >= value => {}
                    _ => {
                        cheapest.insert(types, (cell.value, i, j));
                    }
                }
            }
        }
        cheapest
            .into_iter()
            .map(|(types, (_, row, col))| (types, self.backtrack(row, col)))
            .collect()
    }

    fn backtrack(&self, row: usize, col: usize) -> Vec<f64> {
        let mut selected = Vec::new();
        let mut col = Some(col);
        for r in (0..=row).rev() {
            let Some(c) = col else { break };
            selected.push(self.candidates[c]);
            col = self.container[r][c].as_ref().and_then(|cell| cell.reference);
        }
        selected
    }

    /// Reachable type counts with their cheapest catalog selection.
    pub fn type_map(&self) -> &BTreeMap<usize, Vec<f64>> {
        &self.type_map
    }

    /// New shortest length per piece, in input order, using `n` types.
    ///
    /// Without an exact match the largest reachable count below `n` is used,
    /// or the largest count overall when `n` exceeds all of them.
    pub fn set_lengths(&self, number_of_types: usize) -> LayoutResult<Vec<f64>> {
        if self.items.is_empty() {
            return Ok(Vec::new());
        }
        let (Some(&min), Some(&max)) = (self.type_map.keys().next(), self.type_map.keys().next_back()) else {
            return Err(LayoutError::contract("stack_set_lengths", "no catalog length covers the longest piece"));
        };
        let chosen = if self.type_map.contains_key(&number_of_types) {
            number_of_types
        } else if number_of_types > max {
            max
        } else if number_of_types < min {
            return Err(LayoutError::not_enough_types(TypeScope::Stack, number_of_types, min));
        } else {
            match self.type_map.range(..number_of_types).next_back() {
                Some((&count, _)) => count,
                None => min,
            }
        };
        match self.type_map.get(&chosen) {
            Some(lengths) => self.adjust_lengths(lengths),
            None => Err(LayoutError::contract("stack_set_lengths", format!("type count {} vanished", chosen))),
        }
    }

    /// Give each piece the shortest selected length that fits it.
    fn adjust_lengths(&self, selected: &[f64]) -> LayoutResult<Vec<f64>> {
        let mut order: Vec<usize> = (0..self.items.len()).collect();
        order.sort_by(|&a, &b| self.items[a].length.total_cmp(&self.items[b].length));
        let mut lengths = selected.to_vec();
        lengths.sort_by(f64::total_cmp);

        let mut result = vec![0.0; self.items.len()];
        let (mut i, mut j) = (0, 0);
        while i < order.len() && j < lengths.len() {
            let item = &self.items[order[i]];
            if item.length <= lengths[j] {
                if item.upper_bound < lengths[j] {
                    return Err(LayoutError::contract(
                        "stack_adjust_lengths",
                        format!("length {} exceeds upper bound {}", lengths[j], item.upper_bound),
                    ));
                }
                result[order[i]] = lengths[j];
                i += 1;
            } else {
                j += 1;
            }
        }
        if i < order.len() {
            return Err(LayoutError::contract("stack_adjust_lengths", "the longest selected length is too short"));
        }
        Ok(result)
    }
}
