//! # rebar_core - Rebar Layout Engine
//!
//! `rebar_core` lays out longitudinal and shear reinforcement for concrete
//! foundation strips. Given flexural steel-area diagrams, shear demand and
//! section data per strip, it produces constructible bars: typical mesh
//! steel, additional bars cut from 12 m stock with few distinct lengths, and
//! stirrup zones with a small set of stirrup types. All inputs and outputs
//! are JSON-serializable.
//!
//! ## Pipeline
//!
//! ```text
//! StripInput ──► Strip (top + bottom Mesh)
//!                  │ typical / thermal steel
//!                  │ additional rows: theoretical → practical → upper bound
//!                  │                  → rounded → executive → unified
//!                  │ shear zones
//!                  ▼
//! Foundation ──► shear types, length catalog, per-stack lengths, warnings
//!                  ▼
//!             LayoutReport (bars, drawing data, schedule, quantities)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use rebar_core::{Foundation, LayoutReport, Project};
//!
//! let project = Project::sample();
//! let mut foundation = Foundation::new(&project.strips, &project.config).unwrap();
//! foundation.run().unwrap();
//!
//! let report = LayoutReport::new(&project.meta, &foundation).unwrap();
//! let json = serde_json::to_string_pretty(&report).unwrap();
//! assert!(json.contains("\"length_catalog\""));
//! ```
//!
//! ## Modules
//!
//! - [`project`] - Project container, metadata and strip inputs
//! - [`config`] - Run configuration and design constants
//! - [`geometry`] - Periods and piecewise-linear diagrams
//! - [`materials`] - Bar types, development and bend lengths
//! - [`layout`] - Pieces, meshes, strips and the foundation run
//! - [`optimization`] - Practical, length-type, shear and cutting-stock solvers
//! - [`report`] - Serializable run output
//! - [`errors`] - Structured error types
//! - [`file_io`] - File operations with atomic saves and locking

pub mod config;
pub mod errors;
#[cfg(not(target_arch = "wasm32"))]
pub mod file_io;
pub mod geometry;
pub mod layout;
pub mod materials;
pub mod optimization;
pub mod project;
pub mod report;
pub mod rounding;

// Re-export commonly used types at crate root for convenience
pub use config::{DesignConstants, LayoutConfig};
pub use errors::{LayoutError, LayoutResult};
#[cfg(not(target_arch = "wasm32"))]
pub use file_io::{load_project, save_project, save_report, FileLock};
pub use layout::Foundation;
pub use project::{Project, ProjectMetadata, StripInput};
pub use report::LayoutReport;
