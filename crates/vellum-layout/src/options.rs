//! Explicit layout tunables.
//!
//! There is no process-wide configuration: every knob lives here and is
//! passed to the box tree builder and the document converter by value.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::style::DEFAULT_FONT_SIZE_PT;

/// Default cap on image size accepted from an image provider (16 MiB).
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 16 * 1024 * 1024;

/// Options for one layout run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    /// Family used when no `font-family` is set.
    pub default_font_family: String,
    /// Size in points used when no `font-size` is set.
    pub default_font_size: f32,
    /// [§ 12.5 Lists](https://www.w3.org/TR/CSS2/generate.html#lists)
    ///
    /// Horizontal space reserved for list markers, in points.
    pub marker_indent: f32,
    /// Thickness of an `<hr>` with no border set, in points.
    pub rule_thickness: f32,
    /// Images larger than this are reported oversize.
    pub max_image_bytes: u64,
    /// Directory relative image sources are resolved against.
    pub base_directory: Option<PathBuf>,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            default_font_family: "Helvetica".to_string(),
            default_font_size: DEFAULT_FONT_SIZE_PT,
            marker_indent: 18.0,
            rule_thickness: 1.0,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            base_directory: None,
        }
    }
}
