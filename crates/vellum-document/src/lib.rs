//! Document conversion for the Vellum layout engine.
//!
//! # Scope
//!
//! This crate provides:
//! - **Conversion** - runs the layout core over a styled document and
//!   groups the resulting fragments into pages
//! - **Image Loading** - an [`vellum_layout::ImageProvider`] for `data:`
//!   URLs and local files
//! - **Page Output** - [`Layout`], [`Page`] and a conversion summary
//!
//! # Not Yet Implemented
//!
//! - Network image fetching
//! - Font files (fonts are resolved by family name only)

pub mod convert;
pub mod error;
pub mod images;
pub mod page;

pub use vellum_layout as layout;

pub use convert::{Collaborators, DocumentConverter, convert};
pub use error::ConversionError;
pub use images::FileImageProvider;
pub use page::{ConversionSummary, Layout, Page, RootSummary, canvas_background};
