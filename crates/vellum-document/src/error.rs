//! Typed conversion errors.
//!
//! [`crate::convert`] returns `anyhow::Result` with context attached at each
//! stage; the underlying cause is always a [`ConversionError`], so callers
//! that need to branch can `downcast_ref` to it.

use thiserror::Error;
use vellum_layout::{LayoutError, StructuralViolation};

/// Why a document could not be converted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// The layout core rejected the document.
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// Page margins leave no room for content.
    #[error("page content area is empty ({width}x{height}pt after margins)")]
    EmptyContentArea {
        /// Content width after margins.
        width: f32,
        /// Content height after margins.
        height: f32,
    },
}

impl ConversionError {
    /// The structural problem, if that is what stopped conversion.
    #[must_use]
    pub const fn structural_violation(&self) -> Option<&StructuralViolation> {
        match self {
            Self::Layout(LayoutError::StructuralViolation(violation)) => Some(violation),
            _ => None,
        }
    }
}
