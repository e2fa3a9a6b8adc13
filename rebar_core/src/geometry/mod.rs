//! # Geometry
//!
//! Station intervals and the piecewise-linear steel area diagrams that the
//! layout is cut from.

pub mod diagram;
pub mod period;

pub use diagram::{interp, Diagram, Point};
pub use period::{Bend, Period, Side};
