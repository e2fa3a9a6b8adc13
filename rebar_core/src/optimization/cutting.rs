//! # Cutting Stock
//!
//! Cut the bar list of a run out of 12 m stock bars with as few stock bars as
//! possible. Classic column generation:
//!
//! 1. Start with one pattern per length: as many of that length as fit.
//! 2. Solve the covering LP relaxation (minimise Σ x_p, Σ x_p·a_pl ≥ n_l)
//!    and read the dual price of every length.
//! 3. Price a new pattern with an unbounded knapsack over the duals. If its
//!    value beats 1 by more than the tolerance, add it and go to 2.
//! 4. Solve the same program over integers.
//! 5. Overproduced pieces are removed by splitting off reduced patterns.
//!
//! The LP itself sits behind [`MasterProblem`]. With the `milp` feature,
//! [`HighsMaster`] solves it with HiGHS through `good_lp`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use rebar_core::optimization::cutting::{CuttingStock, HighsMaster};
//!
//! let mut cutting = CuttingStock::new(vec![2.5, 3.4, 8.0], vec![20, 40, 34])?;
//! let plan = cutting.solve(&mut HighsMaster)?;
//! println!("{} stock bars", plan.stock_bars());
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{LayoutError, LayoutResult};
use crate::layout::piece::STANDARD_LENGTH;

/// Pieces of each length cut from one stock bar.
pub type Pattern = Vec<u32>;

/// Improvement a priced pattern needs before it is added.
const PRICING_TOLERANCE: f64 = 1e-2;

/// Upper limit on pricing rounds.
const MAX_PRICING_ROUNDS: usize = 500;

/// LP relaxation result.
#[derive(Debug, Clone, PartialEq)]
pub struct RelaxedSolution {
    pub values: Vec<f64>,
    /// Dual price per length constraint
    pub duals: Vec<f64>,
}

/// Covering program over a fixed pattern set.
pub trait MasterProblem {
    /// Solve the continuous relaxation.
    fn solve_relaxed(&mut self, patterns: &[Pattern], demands: &[u32]) -> LayoutResult<RelaxedSolution>;

    /// Solve over non-negative integers, returning a count per pattern.
    fn solve_integer(&mut self, patterns: &[Pattern], demands: &[u32]) -> LayoutResult<Vec<u32>>;
}

/// Used patterns and how many stock bars follow each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuttingPlan {
    pub lengths: Vec<f64>,
    pub patterns: Vec<Pattern>,
    pub counts: Vec<u32>,
}

impl CuttingPlan {
    pub fn stock_bars(&self) -> u32 {
        self.counts.iter().sum()
    }

    /// Pieces produced per length.
    pub fn produced(&self) -> Vec<u32> {
        let mut produced = vec![0; self.lengths.len()];
        for (pattern, &count) in self.patterns.iter().zip(&self.counts) {
            for (p, &n) in produced.iter_mut().zip(pattern) {
                *p += n * count;
            }
        }
        produced
    }

    /// Offcut length summed over all stock bars.
    pub fn waste(&self) -> f64 {
        self.patterns
            .iter()
            .zip(&self.counts)
            .map(|(pattern, &count)| count as f64 * pattern_waste(&self.lengths, pattern))
            .sum()
    }
}

fn pattern_waste(lengths: &[f64], pattern: &[u32]) -> f64 {
    STANDARD_LENGTH - lengths.iter().zip(pattern).map(|(l, &n)| l * n as f64).sum::<f64>()
}

/// Column generation state for one bar list.
#[derive(Debug, Clone)]
pub struct CuttingStock {
    lengths: Vec<f64>,
    demands: Vec<u32>,
    patterns: Vec<Pattern>,
    counts: Vec<u32>,
}

impl CuttingStock {
    pub fn new(lengths: Vec<f64>, demands: Vec<u32>) -> LayoutResult<Self> {
        if lengths.len() != demands.len() {
            return Err(LayoutError::invalid_input(
                "counts",
                format!("{} values", demands.len()),
                format!("expected one count per length ({} lengths)", lengths.len()),
            ));
        }
        if let Some(bad) = lengths.iter().find(|&&l| !(l > 0.0 && l <= STANDARD_LENGTH)) {
            return Err(LayoutError::invalid_input(
                "lengths",
                bad.to_string(),
                format!("every length must be in (0, {}]", STANDARD_LENGTH),
            ));
        }
        let patterns = lengths
            .iter()
            .enumerate()
            .map(|(i, &l)| {
                let mut pattern = vec![0; lengths.len()];
                pattern[i] = (STANDARD_LENGTH / l).floor() as u32;
                pattern
            })
            .collect();
        Ok(CuttingStock { lengths, demands, patterns, counts: Vec::new() })
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// Run column generation, the integer solve and excess removal.
    pub fn solve<M: MasterProblem>(&mut self, master: &mut M) -> LayoutResult<CuttingPlan> {
        for round in 0..MAX_PRICING_ROUNDS {
            let relaxed = master.solve_relaxed(&self.patterns, &self.demands)?;
            if relaxed.duals.len() != self.lengths.len() {
                return Err(LayoutError::solver(format!(
                    "expected {} duals, got {}",
                    self.lengths.len(),
                    relaxed.duals.len()
                )));
            }
            let (value, pattern) = knapsack(&self.lengths, &relaxed.duals);
            if 1.0 - value < -PRICING_TOLERANCE {
                tracing::debug!(round, value, ?pattern, "pattern added");
                self.patterns.push(pattern);
            } else {
                break;
            }
        }

        let counts = master.solve_integer(&self.patterns, &self.demands)?;
        if counts.len() != self.patterns.len() {
            return Err(LayoutError::solver(format!(
                "expected {} pattern counts, got {}",
                self.patterns.len(),
                counts.len()
            )));
        }
        self.counts = counts;
        self.remove_excess();
        Ok(self.plan())
    }

    /// Trade overproduced pieces for reduced patterns.
    ///
    /// Each step picks the used pattern that would leave the most offcut once
    /// its excess pieces are dropped, and moves as many of its bars as the
    /// excess allows to the reduced pattern.
    pub fn remove_excess(&mut self) {
        let n = self.lengths.len();
        let mut excess: Vec<i64> = vec![0; n];
        for (pattern, &count) in self.patterns.iter().zip(&self.counts) {
            for (e, &p) in excess.iter_mut().zip(pattern) {
                *e += i64::from(p) * i64::from(count);
            }
        }
        for (e, &d) in excess.iter_mut().zip(&self.demands) {
            *e -= i64::from(d);
        }

        while excess.iter().any(|&e| e > 0) {
            let mut best: Option<(usize, Vec<u32>, f64)> = None;
            for (i, pattern) in self.patterns.iter().enumerate() {
                if self.counts[i] == 0 {
                    continue;
                }
                let reductions: Vec<u32> = pattern
                    .iter()
                    .zip(&excess)
                    .map(|(&p, &e)| (e.max(0) as u32).min(p))
                    .collect();
                if reductions.iter().all(|&r| r == 0) {
                    continue;
                }
                let waste = pattern_waste(&self.lengths, pattern)
                    + self.lengths.iter().zip(&reductions).map(|(l, &r)| l * r as f64).sum::<f64>();
                if best.as_ref().map_or(true, |(_, _, w)| waste > *w) {
                    best = Some((i, reductions, waste));
                }
            }
            let Some((index, reductions, _)) = best else {
                tracing::warn!(?excess, "excess pieces left without a reducible pattern");
                break;
            };

            let moved = reductions
                .iter()
                .zip(&excess)
                .filter(|(r, _)| **r > 0)
                .map(|(&r, &e)| (e / i64::from(r)) as u32)
                .fold(self.counts[index], u32::min);
            if moved == 0 {
                tracing::warn!(?excess, "excess removal stalled");
                break;
            }
            self.counts[index] -= moved;
            for (e, &r) in excess.iter_mut().zip(&reductions) {
                *e -= i64::from(moved) * i64::from(r);
            }
            let reduced: Pattern = self.patterns[index].iter().zip(&reductions).map(|(&p, &r)| p - r).collect();
            self.patterns.push(reduced);
            self.counts.push(moved);
        }
    }

    /// Patterns that are actually cut.
    pub fn plan(&self) -> CuttingPlan {
        let (patterns, counts) = self
            .patterns
            .iter()
            .zip(&self.counts)
            .filter(|&(pattern, &count)| count > 0 && pattern.iter().any(|&p| p > 0))
            .map(|(pattern, &count)| (pattern.clone(), count))
            .unzip();
        CuttingPlan { lengths: self.lengths.clone(), patterns, counts }
    }
}

/// Unbounded knapsack over millimetres: most dual value in one stock bar.
pub fn knapsack(lengths: &[f64], values: &[f64]) -> (f64, Pattern) {
    let capacity = (STANDARD_LENGTH * 1000.0).round() as usize;
    let weights: Vec<usize> = lengths.iter().map(|l| (l * 1000.0).round().max(1.0) as usize).collect();
    let mut best = vec![0.0_f64; capacity + 1];
    let mut choice: Vec<Option<usize>> = vec![None; capacity + 1];
    for c in 1..=capacity {
        best[c] = best[c - 1];
        choice[c] = None;
        for (i, (&w, &v)) in weights.iter().zip(values).enumerate() {
            if v > 0.0 && w <= c && best[c - w] + v > best[c] {
                best[c] = best[c - w] + v;
                choice[c] = Some(i);
            }
        }
    }

    let mut pattern = vec![0; lengths.len()];
    let mut c = capacity;
    while c > 0 {
        match choice[c] {
            Some(i) => {
                pattern[i] += 1;
                c -= weights[i];
            }
            None => c -= 1,
        }
    }
    (best[capacity], pattern)
}

// ============================================================================
// HiGHS backend
// ============================================================================

#[cfg(feature = "milp")]
pub use highs_backend::HighsMaster;

#[cfg(feature = "milp")]
mod highs_backend {
    use good_lp::solvers::{DualValues, SolutionWithDual};
    use good_lp::{variable, Expression, IntoAffineExpression, ProblemVariables, Solution, SolverModel, Variable};

    use super::{MasterProblem, Pattern, RelaxedSolution};
    use crate::errors::{LayoutError, LayoutResult};

    /// Covering program solved by HiGHS.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct HighsMaster;

    fn covering(patterns: &[Pattern], x: &[Variable], row: usize) -> Expression {
        patterns
            .iter()
            .zip(x)
            .fold(Expression::from(0.0), |acc, (pattern, &v)| acc + f64::from(pattern[row]) * v)
    }

    impl MasterProblem for HighsMaster {
        fn solve_relaxed(&mut self, patterns: &[Pattern], demands: &[u32]) -> LayoutResult<RelaxedSolution> {
            let mut vars = ProblemVariables::new();
            let x: Vec<Variable> = patterns.iter().map(|_| vars.add(variable().min(0.0))).collect();
            let objective = x.iter().fold(Expression::from(0.0), |acc, &v| acc + v);
            let mut model = vars.minimise(objective).using(good_lp::solvers::highs::highs);
            let rows: Vec<_> = demands
                .iter()
                .enumerate()
                .map(|(row, &demand)| model.add_constraint(covering(patterns, &x, row).geq(f64::from(demand))))
                .collect();
            let mut solution = model.solve().map_err(|e| LayoutError::solver(e.to_string()))?;
            let values = x.iter().map(|&v| solution.value(v)).collect();
            let dual = solution.compute_dual();
            let duals = rows.iter().map(|&r| dual.dual(r)).collect();
            Ok(RelaxedSolution { values, duals })
        }

        fn solve_integer(&mut self, patterns: &[Pattern], demands: &[u32]) -> LayoutResult<Vec<u32>> {
            let mut vars = ProblemVariables::new();
            let x: Vec<Variable> = patterns.iter().map(|_| vars.add(variable().integer().min(0))).collect();
            let objective = x.iter().fold(Expression::from(0.0), |acc, &v| acc + v);
            let mut model = vars.minimise(objective).using(good_lp::solvers::highs::highs);
            for (row, &demand) in demands.iter().enumerate() {
                model.add_constraint(covering(patterns, &x, row).geq(f64::from(demand)));
            }
            let solution = model.solve().map_err(|e| LayoutError::solver(e.to_string()))?;
            Ok(x.iter().map(|&v| solution.value(v).round().max(0.0) as u32).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays canned solver answers.
    struct ScriptedMaster {
        relaxed: VecDeque<Vec<f64>>,
        integer: Vec<u32>,
        relaxed_calls: usize,
    }

    impl MasterProblem for ScriptedMaster {
        fn solve_relaxed(&mut self, patterns: &[Pattern], _demands: &[u32]) -> LayoutResult<RelaxedSolution> {
            self.relaxed_calls += 1;
            let duals = self.relaxed.pop_front().ok_or_else(|| LayoutError::solver("script exhausted"))?;
            Ok(RelaxedSolution { values: vec![0.0; patterns.len()], duals })
        }

        fn solve_integer(&mut self, _patterns: &[Pattern], _demands: &[u32]) -> LayoutResult<Vec<u32>> {
            Ok(self.integer.clone())
        }
    }

    #[test]
    fn test_validation() {
        assert!(CuttingStock::new(vec![2.0, 3.0], vec![1]).is_err());
        assert!(CuttingStock::new(vec![12.5], vec![1]).is_err());
        assert!(CuttingStock::new(vec![0.0], vec![1]).is_err());
        assert!(CuttingStock::new(vec![12.0], vec![0]).is_ok());
    }

    #[test]
    fn test_initial_patterns() {
        let cutting = CuttingStock::new(vec![5.0, 4.0, 2.5], vec![1, 1, 1]).unwrap();
        assert_eq!(cutting.patterns(), &[vec![2, 0, 0], vec![0, 3, 0], vec![0, 0, 4]]);
    }

    #[test]
    fn test_knapsack() {
        let (value, pattern) = knapsack(&[5.0, 7.0], &[0.5, 1.0]);
        assert!((value - 1.5).abs() < 1e-9);
        assert_eq!(pattern, vec![1, 1]);

        let (value, pattern) = knapsack(&[5.0, 4.0], &[0.0, 0.25]);
        assert!((value - 0.75).abs() < 1e-9);
        assert_eq!(pattern, vec![0, 3]);
    }

    #[test]
    fn test_no_new_column() {
        let mut cutting = CuttingStock::new(vec![5.0, 4.0], vec![2, 3]).unwrap();
        let mut master = ScriptedMaster {
            relaxed: VecDeque::from(vec![vec![0.5, 1.0 / 3.0]]),
            integer: vec![1, 1],
            relaxed_calls: 0,
        };
        let plan = cutting.solve(&mut master).unwrap();
        assert_eq!(master.relaxed_calls, 1);
        assert_eq!(plan.stock_bars(), 2);
        assert_eq!(plan.produced(), vec![2, 3]);
    }

    #[test]
    fn test_column_generation_adds_pattern() {
        let mut cutting = CuttingStock::new(vec![5.0, 7.0], vec![2, 2]).unwrap();
        let mut master = ScriptedMaster {
            relaxed: VecDeque::from(vec![vec![0.5, 1.0], vec![0.5, 0.5]]),
            integer: vec![0, 0, 2],
            relaxed_calls: 0,
        };
        let plan = cutting.solve(&mut master).unwrap();
        assert_eq!(master.relaxed_calls, 2);
        assert_eq!(plan.patterns, vec![vec![1, 1]]);
        assert_eq!(plan.counts, vec![2]);
        assert!((plan.waste() - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_remove_excess() {
        let mut cutting = CuttingStock::new(vec![5.0, 4.0], vec![1, 3]).unwrap();
        cutting.counts = vec![1, 1];
        cutting.remove_excess();
        let plan = cutting.plan();
        assert_eq!(plan.patterns, vec![vec![0, 3], vec![1, 0]]);
        assert_eq!(plan.counts, vec![1, 1]);
        assert_eq!(plan.produced(), vec![1, 3]);
    }

    #[test]
    fn test_remove_excess_splits_counts() {
        // 4 bars of [2, 0] make 8 pieces, 5 needed
        let mut cutting = CuttingStock::new(vec![5.0], vec![5]).unwrap();
        cutting.counts = vec![4];
        cutting.remove_excess();
        let plan = cutting.plan();
        assert_eq!(plan.produced(), vec![5]);
        // one bar is no longer needed at all
        assert_eq!(plan.stock_bars(), 3);
    }
}
