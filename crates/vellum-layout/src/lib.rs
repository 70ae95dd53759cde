//! Layout core for the Vellum document converter.
//!
//! # Scope
//!
//! This crate turns a styled document tree into positioned, paint-ready
//! fragments:
//! - **Box Tree** ([CSS Display Level 3](https://www.w3.org/TR/css-display-3/))
//!   - Arena of block, inline, float and replaced boxes
//!   - Anonymous block wrapping for mixed content
//!   - Structural validation
//!
//! - **Block Layout** ([CSS 2.1 § 10](https://www.w3.org/TR/CSS2/visudet.html))
//!   - Width and height computation with sibling margin collapsing
//!   - Two-pass percentage height resolution
//!   - Block and inline-block formatting contexts
//!
//! - **Fragments** ([CSS Fragmentation Level 3](https://www.w3.org/TR/css-break-3/))
//!   - Staged construction: block, inline, specialized, z-order
//!   - Page assignment and paint order
//!
//! # Not Yet Implemented
//!
//! - Line wrapping and multi-line inline layout
//! - Float placement (floats flow in normal order)
//! - Table layout algorithm
//! - Splitting a box across pages

/// Arena box tree per [CSS Display Level 3](https://www.w3.org/TR/css-display-3/).
pub mod box_tree;
/// Box generation and block layout per [CSS 2.1 § 9](https://www.w3.org/TR/CSS2/visuren.html).
pub mod builder;
/// Two-pass percentage resolution per [CSS 2.1 § 10.5](https://www.w3.org/TR/CSS2/visudet.html#the-height-property).
pub mod dimension;
/// Layout errors.
pub mod error;
/// Block formatting contexts per [CSS 2.1 § 9.4.1](https://www.w3.org/TR/CSS2/visuren.html#block-formatting).
pub mod formatting_context;
/// Fragment construction per [CSS Fragmentation Level 3](https://www.w3.org/TR/css-break-3/).
pub mod fragment;
/// Rectangles, sizes and edges.
pub mod geometry;
/// Text, font and image measurement collaborators.
pub mod measure;
/// Layout configuration.
pub mod options;
/// Computed style input per [CSS Cascading Level 4](https://www.w3.org/TR/css-cascade-4/).
pub mod style;
/// Structural validation of the box tree.
pub mod validate;

// Re-exports for convenience
pub use box_tree::{
    BlockBox, BoxId, BoxKind, BoxTree, DisplayNode, FloatBox, FloatDirection, InlineBox, PageBox,
    ReplacedBox, ReplacedKind, Role, SourceIdentity,
};
pub use builder::{BoxTreeBuilder, collapse_two_margins, default_display_for_element};
pub use dimension::{
    DimensionResolver, DimensionUnit, ElementIdentity, PassCount, PercentageResolutionContext,
    RequestedDimension, ResolvedDimension,
};
pub use error::{LayoutError, LayoutResult};
pub use formatting_context::{
    BlockFormattingContext, BlockFormattingRequest, BlockFormattingResult, FormattingContextKind,
    PageContext,
};
pub use fragment::{
    BlockFragment, BuildContext, Fragment, FragmentBuilder, FragmentForest, FragmentId,
    FragmentInfo, FragmentStage, FragmentStyle, ImageFragment, LineBoxFragment, RuleFragment,
    TextRun,
};
pub use geometry::{EdgeSizes, Point, Rect, Size};
pub use measure::{
    ApproximateTextMeasurer, FamilyFontResolver, FixedImageProvider, FontKey, FontMetrics,
    FontResolver, FontSource, ImageLoadResult, ImageProvider, ImageStatus, LineHeightStrategy,
    MeasurementContext, MetricsLineHeight, ResolvedFont, TextMeasurer,
};
pub use options::LayoutOptions;
pub use style::{
    BorderStyle, BorderValue, ColorValue, ComputedStyle, Display, FontStyle, LengthValue,
    Overflow, StyleNode, StyleTree, TextAlign, TextDecoration,
};
pub use validate::{StructuralViolation, validate, validate_with_diagnostics};
