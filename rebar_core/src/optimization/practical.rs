//! # Practical Length Optimization
//!
//! Pieces in a stack end at different distances from the stack peak. Each
//! end has to run past the next shorter bar by at least the effective depth
//! `d`, and a group of ends that share one cut-off station needs the
//! development length `Ld` past the previous group.
//!
//! [`StackMinimization`] groups the ends of one side of a stack so the total
//! added length is minimal:
//!
//! ```text
//! c[0][j] = (j + 1) * max(Ld, len[j] + d)
//! c[i][j] = min over k in [i-1, j) of
//!           c[i-1][k] + (j - k) * max(len[k] + Ld, len[j] + d)
//! ```
//!
//! The cheapest row in the last column gives the grouping. Each group tags its
//! pieces with the rule that won the `max` (`Ld` on ties).
//!
//! ## Example
//!
//! ```rust
//! use rebar_core::optimization::practical::StackMinimization;
//!
//! let dp = StackMinimization::new(vec![1.0, 1.5, 2.0], 0.3, 1.4);
//! let additions: Vec<f64> = dp.results().iter().map(|r| r.addition).collect();
//! assert!((additions[0] - 0.4).abs() < 1e-9);
//! assert!((additions[1] - 0.9).abs() < 1e-9);
//! ```

use crate::geometry::{Diagram, Side};
use crate::layout::collections::{Container, Stack};
use crate::layout::piece::{Domination, DominationType, PeriodKind, Stage};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Cell {
    value: f64,
    reference: Option<usize>,
    domination: DominationType,
}

/// Extension of one piece end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncreasedLength {
    pub addition: f64,
    pub domination: DominationType,
}

/// Grouping DP over the ends of one stack side.
#[derive(Debug, Clone)]
pub struct StackMinimization {
    lengths: Vec<f64>,
    d_length: f64,
    ld_length: f64,
    container: Vec<Vec<Option<Cell>>>,
    /// (column, domination) per group, last group first
    selected: Vec<(usize, DominationType)>,
}

impl StackMinimization {
    /// `lengths` are distances from the stack peak, innermost piece first.
    pub fn new(lengths: Vec<f64>, d_length: f64, ld_length: f64) -> Self {
        let mut dp = StackMinimization {
            lengths,
            d_length,
            ld_length,
            container: Vec::new(),
            selected: Vec::new(),
        };
        dp.run();
        dp.retrieve_selected();
        dp
    }

    fn dominated_by(&self, ld_reach: f64, d_reach: f64) -> DominationType {
        if ld_reach >= d_reach {
            DominationType::Ld
        } else {
            DominationType::D
        }
    }

    fn run(&mut self) {
        let n = self.lengths.len();
        let mut container: Vec<Vec<Option<Cell>>> = vec![vec![None; n]; n];
        for i in 0..n {
            for j in i..n {
                let cell = if i == 0 {
                    let d_reach = self.lengths[j] + self.d_length;
                    Cell {
                        value: self.ld_length.max(d_reach) * (j + 1) as f64,
                        reference: None,
                        domination: self.dominated_by(self.ld_length, d_reach),
                    }
                } else {
                    let mut best: Option<Cell> = None;
                    for k in (i - 1)..j {
                        let Some(prev) = container[i - 1][k] else { continue };
                        let ld_reach = self.lengths[k] + self.ld_length;
                        let d_reach = self.lengths[j] + self.d_length;
                        let value = prev.value + (j - k) as f64 * ld_reach.max(d_reach);
                        if best.map_or(true, |b| value < b.value) {
                            best = Some(Cell {
                                value,
                                reference: Some(k),
                                domination: self.dominated_by(ld_reach, d_reach),
                            });
                        }
                    }
                    match best {
                        Some(cell) => cell,
                        None => continue,
                    }
                };
                container[i][j] = Some(cell);
            }
        }
        self.container = container;
    }

    fn retrieve_selected(&mut self) {
        let n = self.lengths.len();
        if n == 0 {
            return;
        }
        let last = n - 1;
        let mut best_row = 0;
        let mut best_value = f64::INFINITY;
        for (i, row) in self.container.iter().enumerate() {
            if let Some(cell) = row[last] {
                if cell.value < best_value {
                    best_value = cell.value;
                    best_row = i;
                }
            }
        }

        let mut selected = Vec::new();
        let mut col = Some(last);
        for row in (0..=best_row).rev() {
            let Some(c) = col else { break };
            let Some(cell) = self.container[row][c] else { break };
            selected.push((c, cell.domination));
            col = cell.reference;
        }
        self.selected = selected;
    }

    /// Added length and governing rule per input length, in input order.
    pub fn results(&self) -> Vec<IncreasedLength> {
        let groups: Vec<(usize, DominationType)> = self.selected.iter().rev().copied().collect();
        let mut results = Vec::with_capacity(self.lengths.len());
        let mut first = 0;
        for (g, &(last, domination)) in groups.iter().enumerate() {
            let base = match domination {
                DominationType::Ld if g == 0 => self.ld_length,
                DominationType::Ld => self.ld_length + self.lengths[groups[g - 1].0],
                DominationType::D => self.d_length + self.lengths[last],
            };
            for k in first..=last {
                results.push(IncreasedLength { addition: base - self.lengths[k], domination });
            }
            first = last + 1;
        }
        results
    }

    /// Minimal total added length, `None` for an empty input.
    pub fn total(&self) -> Option<f64> {
        let last = self.lengths.len().checked_sub(1)?;
        self.container.iter().filter_map(|row| row[last]).map(|c| c.value).reduce(f64::min)
    }
}

/// Set the practical period of every piece of a theoretical stack.
///
/// Both sides of the stack are optimized independently. Ends only ever move
/// outward from the theoretical period.
pub fn set_stack_practical(container: &mut Container, stack: &Stack, d_length: f64, ld_length: f64) {
    for side in Side::BOTH {
        let lengths: Vec<f64> = stack
            .pieces()
            .iter()
            .map(|&id| (stack.peak_station - container.piece(id).theoretical.side(side)).abs())
            .collect();
        let increased = StackMinimization::new(lengths, d_length, ld_length).results();

        for (&id, inc) in stack.pieces().iter().zip(increased) {
            let piece = container.piece_mut(id);
            let station = match side {
                Side::Start => (piece.theoretical.start - inc.addition).min(piece.practical.start),
                Side::End => (piece.theoretical.end + inc.addition).max(piece.practical.end),
            };
            piece.practical.set_side(side, station);
            let domination = piece.domination.get_or_insert(Domination {
                start: inc.domination,
                end: inc.domination,
            });
            match side {
                Side::Start => domination.start = inc.domination,
                Side::End => domination.end = inc.domination,
            }
            piece.stage = Stage::Practical;
        }
    }
}

/// Practical pass over every theoretical stack of a container.
pub fn set_container_practical(container: &mut Container, diagram: &Diagram, d_length: f64, ld_length: f64) {
    let stacks = container.get_stacks(PeriodKind::Theoretical, diagram);
    tracing::debug!(stacks = stacks.len(), "practical pass");
    for stack in &stacks {
        set_stack_practical(container, stack, d_length, ld_length);
    }
}
