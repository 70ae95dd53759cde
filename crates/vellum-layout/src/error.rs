//! Layout error taxonomy.
//!
//! Every error here aborts layout of the whole document. Recoverable
//! degradations (a percentage with no basis, a missing image) are never
//! errors; they are recorded on the value they affect and reported through
//! diagnostics instead.

use thiserror::Error;

use crate::validate::StructuralViolation;

/// Convenience alias used throughout the crate.
pub type LayoutResult<T> = Result<T, LayoutError>;

/// Errors raised by the layout core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    /// Malformed construction input: a pass count outside {1, 2}, a
    /// negative or non-finite available width without the unbounded flag,
    /// a reference to a box that is not a block.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A computed or supplied rectangle or metric is non-finite or negative.
    ///
    /// This is an internal invariant failure and points at an upstream
    /// construction bug; it is never clamped away.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// The box tree contains a combination the engine cannot lay out.
    #[error("unsupported structure at `{}`: {}", .0.path, .0.reason)]
    StructuralViolation(StructuralViolation),
}

impl LayoutError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub(crate) fn invalid_geometry(message: impl Into<String>) -> Self {
        Self::InvalidGeometry(message.into())
    }
}

/// Fail with [`LayoutError::InvalidGeometry`] unless `value` is finite and
/// non-negative.
pub(crate) fn ensure_metric(name: &str, value: f32) -> LayoutResult<f32> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(LayoutError::invalid_geometry(format!(
            "{name} must be finite and non-negative, got {value}"
        )))
    }
}

/// Fail with [`LayoutError::InvalidGeometry`] unless `value` is finite.
pub(crate) fn ensure_finite(name: &str, value: f32) -> LayoutResult<f32> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(LayoutError::invalid_geometry(format!(
            "{name} must be finite, got {value}"
        )))
    }
}
