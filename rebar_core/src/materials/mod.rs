//! # Materials
//!
//! Reinforcing bar catalog and concrete-dependent bar lengths.
//!
//! ## Example
//!
//! ```rust
//! use rebar_core::materials::RebarType;
//!
//! assert_eq!(RebarType::T25.diameter_mm(), 25);
//! ```

pub mod rebar;

pub use rebar::{
    development_length, BendColumn, BendDegree, Concrete, Level, LevelColumn, Rebar, RebarType,
    SpecialLengths,
};
