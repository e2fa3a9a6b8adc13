//! # Optimization
//!
//! Dynamic programs and the cutting-stock loop used by the layout pipeline.
//!
//! - [`practical`]: grouping of stack ends by the D / Ld rules
//! - [`total`]: foundation-wide catalog of bar lengths
//! - [`stack`]: per-stack subset of that catalog
//! - [`shear`]: stirrup density bands and arrangements
//! - [`cutting`]: stock bar cutting patterns

pub mod cutting;
pub mod practical;
pub mod shear;
pub mod stack;
pub mod total;

pub use cutting::{CuttingPlan, CuttingStock, MasterProblem};
pub use practical::StackMinimization;
pub use shear::{assign_shear_types, ShearOptimization};
pub use stack::StackAlgorithm;
pub use total::TotalAlgorithm;

use serde::{Deserialize, Serialize};

use crate::rounding::round_to;

/// One piece as seen by the length-type reductions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LengthItem {
    /// Rounded shortest bar length
    pub length: f64,
    pub upper_bound: f64,
    /// Stock bars the piece is cut into
    pub segments: usize,
}

impl LengthItem {
    pub fn new(length: f64, upper_bound: f64, segments: usize) -> Self {
        LengthItem { length, upper_bound, segments }
    }
}

/// Exact key for a length rounded to the millimeter.
pub fn length_key(length: f64) -> i64 {
    (round_to(length, 3) * 1000.0).round() as i64
}
