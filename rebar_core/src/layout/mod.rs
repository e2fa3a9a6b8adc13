//! # Layout
//!
//! Bars, the containers that hold them, and the strip and foundation levels
//! that drive a run.
//!
//! - [`piece`]: one run of steel and its stock bar decomposition
//! - [`collections`]: piece arena, stacks and drawing bunches
//! - [`mesh`]: one face of a strip and its theoretical → executive pipeline
//! - [`shear`]: stirrup zones and arrangements
//! - [`strip`]: top and bottom meshes of a strip
//! - [`foundation`]: every strip of a run plus length-type reduction

pub mod collections;
pub mod foundation;
pub mod mesh;
pub mod piece;
pub mod shear;
pub mod strip;

pub use collections::{Bunch, BunchId, Container, Stack};
pub use foundation::{Foundation, ShearPiece};
pub use mesh::{Mesh, Section, TypicalKind, TypicalSteel};
pub use piece::{Piece, PieceId, PeriodKind, Stage, STANDARD_LENGTH};
pub use shear::{ShearType, ShearZone};
pub use strip::Strip;
