//! # Error Types
//!
//! Structured error types for rebar_core. Infeasible requests (too few length
//! types) carry the smallest feasible count so callers can report it, and
//! contract violations name the operation that was misused.
//!
//! ## Example
//!
//! ```rust
//! use rebar_core::errors::{LayoutError, LayoutResult};
//!
//! fn validate_width(width: f64) -> LayoutResult<()> {
//!     if width <= 0.0 {
//!         return Err(LayoutError::InvalidInput {
//!             field: "width".to_string(),
//!             value: width.to_string(),
//!             reason: "Width must be positive".to_string(),
//!         });
//!     }
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for rebar_core operations
pub type LayoutResult<T> = Result<T, LayoutError>;

/// Which length-type reduction ran out of types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeScope {
    /// Reduction over every additional piece of the foundation
    Total,
    /// Reduction inside a single executive stack
    Stack,
}

impl std::fmt::Display for TypeScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeScope::Total => write!(f, "total"),
            TypeScope::Stack => write!(f, "stack"),
        }
    }
}

/// Structured error type for layout operations.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum LayoutError {
    /// An input value is invalid (out of range, unknown diameter, etc.)
    #[error("Invalid input for '{field}': {value} - {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    /// The requested number of length types cannot cover every piece
    #[error("Not enough {scope} length types: requested {requested}, at least {min_feasible} needed")]
    NotEnoughTypes {
        scope: TypeScope,
        requested: usize,
        min_feasible: usize,
    },

    /// An operation was called with arguments outside its contract
    #[error("Contract violation in {operation}: {reason}")]
    Contract { operation: String, reason: String },

    /// The LP/MIP backend failed
    #[error("Solver failed: {reason}")]
    Solver { reason: String },

    /// File I/O error
    #[error("File error: {operation} on '{path}' - {reason}")]
    FileError {
        operation: String,
        path: String,
        reason: String,
    },

    /// File is locked by another user/process
    #[error("File locked: '{path}' is locked by {locked_by} since {locked_at}")]
    FileLocked {
        path: String,
        locked_by: String,
        locked_at: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },

    /// Schema version mismatch
    #[error("Version mismatch: file version {file_version}, expected {expected_version}")]
    VersionMismatch {
        file_version: String,
        expected_version: String,
    },
}

impl LayoutError {
    /// Create an InvalidInput error
    pub fn invalid_input(field: impl Into<String>, value: impl Into<String>, reason: impl Into<String>) -> Self {
        LayoutError::InvalidInput {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a NotEnoughTypes error
    pub fn not_enough_types(scope: TypeScope, requested: usize, min_feasible: usize) -> Self {
        LayoutError::NotEnoughTypes {
            scope,
            requested,
            min_feasible,
        }
    }

    /// Create a Contract error
    pub fn contract(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        LayoutError::Contract {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a Solver error
    pub fn solver(reason: impl Into<String>) -> Self {
        LayoutError::Solver { reason: reason.into() }
    }

    /// Create a FileError
    pub fn file_error(operation: impl Into<String>, path: impl Into<String>, reason: impl Into<String>) -> Self {
        LayoutError::FileError {
            operation: operation.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a FileLocked error
    pub fn file_locked(path: impl Into<String>, locked_by: impl Into<String>, locked_at: impl Into<String>) -> Self {
        LayoutError::FileLocked {
            path: path.into(),
            locked_by: locked_by.into(),
            locked_at: locked_at.into(),
        }
    }

    /// Smallest feasible type count when this is a NotEnoughTypes error
    pub fn min_feasible(&self) -> Option<usize> {
        match self {
            LayoutError::NotEnoughTypes { min_feasible, .. } => Some(*min_feasible),
            _ => None,
        }
    }

    /// Check if this is a recoverable error (e.g., can retry)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LayoutError::FileLocked { .. })
    }

    /// Get a short error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            LayoutError::InvalidInput { .. } => "INVALID_INPUT",
            LayoutError::NotEnoughTypes { .. } => "NOT_ENOUGH_TYPES",
            LayoutError::Contract { .. } => "CONTRACT_VIOLATION",
            LayoutError::Solver { .. } => "SOLVER_FAILED",
            LayoutError::FileError { .. } => "FILE_ERROR",
            LayoutError::FileLocked { .. } => "FILE_LOCKED",
            LayoutError::SerializationError { .. } => "SERIALIZATION_ERROR",
            LayoutError::VersionMismatch { .. } => "VERSION_MISMATCH",
        }
    }
}

impl From<serde_json::Error> for LayoutError {
    fn from(e: serde_json::Error) -> Self {
        LayoutError::SerializationError { reason: e.to_string() }
    }
}
