//! Layout engine error handling
//!
//! A single error type covers declaration, finalization and access. Every
//! error is reported at the call that triggers it; nothing is retried.

use crate::axis::Axis;
use crate::dtype::DataType;

/// Result type used throughout the crate
pub type LayoutResult<T> = Result<T, LayoutError>;

/// Layout engine errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("Invalid shape: {reason}")]
    InvalidShape { reason: String },

    #[error(
        "Structural mismatch on axis {axis}: field `{field}` spans {found}, tree expects {expected}"
    )]
    StructuralMismatch {
        axis: Axis,
        field: String,
        expected: usize,
        found: usize,
    },

    #[error("Index {index} out of bounds for axis {axis} of extent {extent}")]
    OutOfBounds {
        axis: Axis,
        index: usize,
        extent: usize,
    },

    #[error("Field `{field}` has {expected} dimensions, got {found} coordinates")]
    DimensionMismatch {
        field: String,
        expected: usize,
        found: usize,
    },

    #[error("Builder already finalized")]
    UseAfterFinalize,

    #[error("Layout tree {tree} has been destroyed")]
    UseAfterDestroy { tree: u64 },

    #[error("Field `{field}` placed more than once")]
    DoublePlacement { field: String },

    #[error("Field `{field}` is not bound to a finalized tree")]
    Unbound { field: String },

    #[error("Field `{field}` stores {stored}, requested {requested}")]
    TypeMismatch {
        field: String,
        stored: DataType,
        requested: DataType,
    },

    #[error("Node handle belongs to builder {handle_builder}, not builder {builder}")]
    ForeignNode { builder: u64, handle_builder: u64 },

    #[error("Field `{field}` is not placed in layout tree {tree}")]
    ForeignField { field: String, tree: u64 },

    #[error("Buffer size mismatch: expected {expected} bytes, got {found}")]
    BufferSizeMismatch { expected: usize, found: usize },

    #[error("Memory allocation failed: {size} bytes ({reason})")]
    AllocationFailed { size: usize, reason: String },

    #[error("Configuration error: {reason}")]
    Config { reason: String },
}

/// Create an invalid shape error
pub fn invalid_shape(reason: impl Into<String>) -> LayoutError {
    LayoutError::InvalidShape {
        reason: reason.into(),
    }
}

/// Create an allocation error
pub fn allocation_error(size: usize, reason: impl std::fmt::Display) -> LayoutError {
    LayoutError::AllocationFailed {
        size,
        reason: reason.to_string(),
    }
}

/// Create a configuration error
pub fn config_error(reason: impl std::fmt::Display) -> LayoutError {
    LayoutError::Config {
        reason: reason.to_string(),
    }
}

/// Size arithmetic that reports overflow as an invalid shape
pub(crate) trait CheckedSize: Sized {
    fn mul_size(self, rhs: usize, context: &str) -> LayoutResult<usize>;
    fn add_size(self, rhs: usize, context: &str) -> LayoutResult<usize>;
}

impl CheckedSize for usize {
    fn mul_size(self, rhs: usize, context: &str) -> LayoutResult<usize> {
        self.checked_mul(rhs)
            .ok_or_else(|| {
                invalid_shape(format!("{} overflows usize ({} * {})", context, self, rhs))
            })
    }

    fn add_size(self, rhs: usize, context: &str) -> LayoutResult<usize> {
        self.checked_add(rhs)
            .ok_or_else(|| {
                invalid_shape(format!("{} overflows usize ({} + {})", context, self, rhs))
            })
    }
}
