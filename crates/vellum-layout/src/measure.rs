//! Measurement collaborators: text, fonts and images.
//!
//! [§ 10.8 Line height calculations](https://www.w3.org/TR/CSS2/visudet.html#line-height)
//!
//! "CSS assumes that every font has font metrics that specify a
//! characteristic height above the baseline and a depth below it."
//!
//! Layout never reads font files or image bytes itself. Hosts plug in
//! implementations of [`TextMeasurer`], [`FontResolver`] and
//! [`ImageProvider`]; the approximate implementations here are used in
//! tests and when nothing better is available.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::options::LayoutOptions;
use crate::style::{ComputedStyle, FontStyle};

/// CSS pixels to points: 1px = 0.75pt.
///
/// [§ 6.2 Absolute lengths](https://www.w3.org/TR/css-values-4/#absolute-lengths)
pub const PX_TO_PT: f32 = 0.75;

/// Font selection key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FontKey {
    /// Family name as authored.
    pub family: String,
    /// Numeric weight, 100-900.
    pub weight: u16,
    /// Upright or slanted.
    pub style: FontStyle,
}

/// Vertical metrics of a font at a given size, in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FontMetrics {
    /// Height above the baseline.
    pub ascent: f32,
    /// Depth below the baseline (positive).
    pub descent: f32,
}

impl FontMetrics {
    /// `ascent + descent`.
    #[must_use]
    pub fn height(&self) -> f32 {
        self.ascent + self.descent
    }
}

/// Measures text for layout.
pub trait TextMeasurer {
    /// Advance width of `text` set in `font` at `size` points.
    fn measure_width(&self, font: &FontKey, size: f32, text: &str) -> f32;

    /// Vertical metrics of `font` at `size` points.
    fn metrics(&self, font: &FontKey, size: f32) -> FontMetrics;
}

/// Where a resolved font came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSource {
    /// One of the base fonts every page-description consumer knows.
    Builtin,
    /// A font file on disk.
    File,
    /// The requested family was unknown and a fallback was used.
    Fallback,
}

/// A font choice handed to the painter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFont {
    /// Family actually used.
    pub family: String,
    /// Weight actually used.
    pub weight: u16,
    /// Style actually used.
    pub style: FontStyle,
    /// Provenance.
    pub source: FontSource,
    /// Path of the font file, for [`FontSource::File`].
    pub path: Option<PathBuf>,
}

/// Maps a [`FontKey`] to a concrete font.
pub trait FontResolver {
    /// Resolve `key`. Always returns something usable.
    fn resolve(&self, key: &FontKey) -> ResolvedFont;
}

/// Result of an image lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    /// Found and within limits.
    Ok,
    /// Not found or unreadable.
    Missing,
    /// Found but larger than the byte cap.
    Oversize,
}

/// Outcome of [`ImageProvider::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageLoadResult {
    /// Lookup status.
    pub status: ImageStatus,
    /// Intrinsic size in pixels, when known.
    pub intrinsic_size: Option<(u32, u32)>,
}

impl ImageLoadResult {
    /// A missing image.
    pub const MISSING: Self = Self {
        status: ImageStatus::Missing,
        intrinsic_size: None,
    };
}

/// Looks up images by source.
pub trait ImageProvider {
    /// Look up `src`, relative to `base_directory` when given.
    fn load(&self, src: &str, base_directory: Option<&Path>, max_bytes: u64) -> ImageLoadResult;
}

/// Computes line-box height from font metrics.
///
/// The single-run inline layout uses this as its extension point; a
/// wrapping implementation can supply its own line heights.
pub trait LineHeightStrategy {
    /// Line height for a run with `metrics`.
    fn line_height(&self, metrics: &FontMetrics) -> f32;
}

/// Line height = ascent + descent.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsLineHeight;

impl LineHeightStrategy for MetricsLineHeight {
    fn line_height(&self, metrics: &FontMetrics) -> f32 {
        metrics.height()
    }
}

/// Approximate metrics using fixed ratios.
///
/// Without font data, the average advance of Latin glyphs in a
/// proportional face is about 0.6 em. Ascent and descent split the em box
/// 0.8 / 0.2.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApproximateTextMeasurer;

impl TextMeasurer for ApproximateTextMeasurer {
    fn measure_width(&self, _font: &FontKey, size: f32, text: &str) -> f32 {
        const CHAR_WIDTH_RATIO: f32 = 0.6;
        text.chars().filter(|ch| !ch.is_control()).count() as f32 * size * CHAR_WIDTH_RATIO
    }

    fn metrics(&self, _font: &FontKey, size: f32) -> FontMetrics {
        FontMetrics {
            ascent: size * 0.8,
            descent: size * 0.2,
        }
    }
}

/// Resolves families against a list of known builtin names.
#[derive(Debug, Clone)]
pub struct FamilyFontResolver {
    known: Vec<String>,
    fallback: String,
}

impl Default for FamilyFontResolver {
    fn default() -> Self {
        Self::new(
            ["Helvetica", "Times", "Courier"].map(String::from).to_vec(),
            "Helvetica",
        )
    }
}

impl FamilyFontResolver {
    /// A resolver over `known` families, falling back to `fallback`.
    #[must_use]
    pub fn new(known: Vec<String>, fallback: &str) -> Self {
        Self {
            known,
            fallback: fallback.to_string(),
        }
    }
}

impl FontResolver for FamilyFontResolver {
    fn resolve(&self, key: &FontKey) -> ResolvedFont {
        let matched = self
            .known
            .iter()
            .find(|family| family.eq_ignore_ascii_case(key.family.trim()));
        let (family, source) = match matched {
            Some(family) => (family.clone(), FontSource::Builtin),
            None => (self.fallback.clone(), FontSource::Fallback),
        };
        ResolvedFont {
            family,
            weight: key.weight,
            style: key.style,
            source,
            path: None,
        }
    }
}

/// A fixed table of images keyed by source, with byte sizes.
#[derive(Debug, Default, Clone)]
pub struct FixedImageProvider {
    images: HashMap<String, (u32, u32, u64)>,
}

impl FixedImageProvider {
    /// An empty table: every lookup is missing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image `width`x`height` pixels of `bytes` bytes.
    #[must_use]
    pub fn with_image(mut self, src: &str, width: u32, height: u32, bytes: u64) -> Self {
        let _previous = self.images.insert(src.to_string(), (width, height, bytes));
        self
    }
}

impl ImageProvider for FixedImageProvider {
    fn load(&self, src: &str, base_directory: Option<&Path>, max_bytes: u64) -> ImageLoadResult {
        let joined = base_directory.map(|dir| dir.join(src).to_string_lossy().into_owned());
        let entry = joined
            .as_deref()
            .and_then(|key| self.images.get(key))
            .or_else(|| self.images.get(src));
        match entry {
            None => ImageLoadResult::MISSING,
            Some(&(width, height, bytes)) => ImageLoadResult {
                status: if bytes > max_bytes {
                    ImageStatus::Oversize
                } else {
                    ImageStatus::Ok
                },
                intrinsic_size: Some((width, height)),
            },
        }
    }
}

/// Bundle of measurement collaborators for one layout run.
#[derive(Clone, Copy)]
pub struct MeasurementContext<'a> {
    /// Text measurement.
    pub text: &'a dyn TextMeasurer,
    /// Font resolution.
    pub fonts: &'a dyn FontResolver,
    /// Image lookup.
    pub images: &'a dyn ImageProvider,
    /// Line-height policy.
    pub line_height: &'a dyn LineHeightStrategy,
    /// Base directory for relative image sources.
    pub base_directory: Option<&'a Path>,
    /// Image byte cap.
    pub max_bytes: u64,
    default_font_family: &'a str,
    default_font_size: f32,
}

impl std::fmt::Debug for MeasurementContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeasurementContext")
            .field("base_directory", &self.base_directory)
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}

impl<'a> MeasurementContext<'a> {
    /// Bundle collaborators with the limits from `options`, using
    /// [`MetricsLineHeight`].
    #[must_use]
    pub fn new(
        text: &'a dyn TextMeasurer,
        fonts: &'a dyn FontResolver,
        images: &'a dyn ImageProvider,
        options: &'a LayoutOptions,
    ) -> Self {
        Self {
            text,
            fonts,
            images,
            line_height: &MetricsLineHeight,
            base_directory: options.base_directory.as_deref(),
            max_bytes: options.max_image_bytes,
            default_font_family: &options.default_font_family,
            default_font_size: options.default_font_size,
        }
    }

    /// Replace the line-height policy.
    #[must_use]
    pub fn with_line_height(mut self, strategy: &'a dyn LineHeightStrategy) -> Self {
        self.line_height = strategy;
        self
    }

    /// Font key and size for `style`.
    #[must_use]
    pub fn font_for(&self, style: &ComputedStyle) -> (FontKey, f32) {
        let key = FontKey {
            family: style
                .font_family
                .clone()
                .unwrap_or_else(|| self.default_font_family.to_string()),
            weight: style.font_weight.unwrap_or(400),
            style: style.font_style.unwrap_or_default(),
        };
        (key, style.font_size_or(self.default_font_size))
    }

    /// Look up an image with this context's limits.
    #[must_use]
    pub fn load_image(&self, src: &str) -> ImageLoadResult {
        self.images.load(src, self.base_directory, self.max_bytes)
    }
}
