//! Computed style snapshot and the style tree consumed by the layout core.
//!
//! [§ 4.4 Computed Values](https://www.w3.org/TR/css-cascade-4/#computed)
//!
//! "The computed value is the result of resolving the specified value...
//! as far as possible without laying out the document."
//!
//! The cascade runs upstream. What arrives here is a tree of
//! [`StyleNode`]s, each carrying the few properties layout and painting
//! need. All lengths are in points; percentages stay unresolved until
//! layout knows the containing block.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::box_tree::FloatDirection;
use crate::geometry::{EdgeSizes, Size};

/// Initial `font-size` when neither the node nor the options set one.
pub const DEFAULT_FONT_SIZE_PT: f32 = 12.0;

/// [§ 2 'display'](https://www.w3.org/TR/css-display-3/#the-display-properties)
///
/// The subset of display values the engine generates boxes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Display {
    /// `display: block`
    Block,
    /// `display: inline`
    Inline,
    /// `display: inline-block`
    InlineBlock,
    /// `display: list-item`
    ListItem,
    /// `display: table`
    Table,
    /// `display: table-row`
    TableRow,
    /// `display: table-cell`
    TableCell,
    /// [§ 2.6 display: none](https://www.w3.org/TR/css-display-3/#valdef-display-none)
    ///
    /// "The element and its descendants generate no boxes or text runs."
    None,
}

/// [§ 4.1 Lengths](https://www.w3.org/TR/css-values-4/#lengths)
///
/// A length that is either absolute (points) or relative to the
/// containing block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthValue {
    /// Absolute length in points.
    Pt(f32),
    /// [§ 4.3 Percentages](https://www.w3.org/TR/css-values-4/#percentages)
    ///
    /// Percentage of the containing block's corresponding dimension.
    Percent(f32),
}

impl LengthValue {
    /// Resolve against `basis`. Percentages use `basis`, points ignore it.
    #[must_use]
    pub fn resolve(self, basis: f32) -> f32 {
        match self {
            Self::Pt(pt) => pt,
            Self::Percent(pct) => basis * pct / 100.0,
        }
    }

    /// The absolute value, or `None` for a percentage.
    #[must_use]
    pub const fn as_pt(self) -> Option<f32> {
        match self {
            Self::Pt(pt) => Some(pt),
            Self::Percent(_) => None,
        }
    }
}

/// [§ 4 Color syntax](https://www.w3.org/TR/css-color-4/#color-syntax)
/// sRGB color represented as RGBA components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorValue {
    /// "the red color channel" (0-255)
    pub r: u8,
    /// "the green color channel" (0-255)
    pub g: u8,
    /// "the blue color channel" (0-255)
    pub b: u8,
    /// "the alpha channel" (0-255, 255 = fully opaque)
    pub a: u8,
}

impl ColorValue {
    /// Black (#000000)
    pub const BLACK: Self = Self::rgb(0, 0, 0);

    /// White (#ffffff)
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    /// An opaque color.
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// [§ 4.2 The RGB hexadecimal notations](https://www.w3.org/TR/css-color-4/#hex-notation)
    ///
    /// Parses `#rgb`, `#rrggbb` and `#rrggbbaa` (leading `#` optional).
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            // "The three-digit RGB notation (#RGB) is converted into six-digit
            // form (#RRGGBB) by replicating digits, not by adding zeros."
            3 => Some(Self::rgb(
                channel(&hex[0..1].repeat(2))?,
                channel(&hex[1..2].repeat(2))?,
                channel(&hex[2..3].repeat(2))?,
            )),
            6 => Some(Self::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            8 => Some(Self {
                r: channel(&hex[0..2])?,
                g: channel(&hex[2..4])?,
                b: channel(&hex[4..6])?,
                a: channel(&hex[6..8])?,
            }),
            _ => None,
        }
    }

    /// Whether the color paints nothing.
    #[must_use]
    pub const fn is_transparent(&self) -> bool {
        self.a == 0
    }
}

/// [§ 3.2 'border-style'](https://www.w3.org/TR/css-backgrounds-3/#border-style)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderStyle {
    /// No border; the used width is zero.
    #[default]
    None,
    /// A single solid line.
    Solid,
    /// A series of dashes.
    Dashed,
    /// A series of dots.
    Dotted,
}

/// [§ 4 'border-top'](https://www.w3.org/TR/css-backgrounds-3/#border-shorthands)
///
/// One side of a border: width, style and color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BorderValue {
    /// Border width in points.
    pub width: f32,
    /// Line style.
    #[serde(default)]
    pub style: BorderStyle,
    /// Line color.
    #[serde(default = "black")]
    pub color: ColorValue,
}

const fn black() -> ColorValue {
    ColorValue::BLACK
}

impl BorderValue {
    /// [§ 3.3 'border-width'](https://www.w3.org/TR/css-backgrounds-3/#border-width)
    ///
    /// "If the border style is 'none' or 'hidden', the used width is 0."
    #[must_use]
    pub fn used_width(&self) -> f32 {
        match self.style {
            BorderStyle::None => 0.0,
            _ => self.width,
        }
    }
}

/// [§ 16.2 Alignment: the 'text-align' property](https://www.w3.org/TR/CSS2/text.html#alignment-prop)
///
/// "This property describes how inline-level content of a block
/// container is aligned."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    /// Align to the left edge.
    #[default]
    Left,
    /// Center within the line box.
    Center,
    /// Align to the right edge.
    Right,
    /// Treated as `left` for the single-line runs produced today.
    Justify,
}

impl TextAlign {
    /// Offset of a run of width `content` inside a line of width `line`.
    ///
    /// Overflowing runs start at the line's left edge.
    #[must_use]
    pub fn offset(self, line: f32, content: f32) -> f32 {
        let free = (line - content).max(0.0);
        match self {
            Self::Left | Self::Justify => 0.0,
            Self::Center => free / 2.0,
            Self::Right => free,
        }
    }
}

/// [§ 3.3 'font-style'](https://www.w3.org/TR/css-fonts-4/#font-style-prop)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    /// Upright face.
    #[default]
    Normal,
    /// Italic face.
    Italic,
    /// Slanted face.
    Oblique,
}

/// [§ 3 'overflow'](https://www.w3.org/TR/css-overflow-3/#propdef-overflow)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overflow {
    /// Content may paint outside the box.
    #[default]
    Visible,
    /// Content is clipped to the padding box.
    Hidden,
}

/// [§ 2 'text-decoration-line'](https://www.w3.org/TR/css-text-decor-3/#text-decoration-line-property)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TextDecoration {
    /// Line below the text.
    pub underline: bool,
    /// Line above the text.
    pub overline: bool,
    /// Line through the middle of the text.
    pub line_through: bool,
}

impl TextDecoration {
    /// Whether any decoration line is set.
    #[must_use]
    pub const fn any(&self) -> bool {
        self.underline || self.overline || self.line_through
    }
}

/// Computed styles for one node.
///
/// [§ 4.4 Computed Values](https://www.w3.org/TR/css-cascade-4/#computed)
///
/// All values are `Option`: `None` means "not set", so layout uses the
/// initial value or, for inherited properties, the parent's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputedStyle {
    /// [§ 2 'display'](https://www.w3.org/TR/css-display-3/#the-display-properties)
    ///
    /// None means use the element's default display value.
    pub display: Option<Display>,
    /// [§ 9.5.1 'float'](https://www.w3.org/TR/CSS2/visuren.html#float-position)
    pub float: Option<FloatDirection>,

    /// [§ 3.1 'color'](https://www.w3.org/TR/css-color-4/#the-color-property)
    pub color: Option<ColorValue>,
    /// [§ 3.2 'background-color'](https://www.w3.org/TR/css-backgrounds-3/#background-color)
    pub background_color: Option<ColorValue>,

    /// [§ 3.1 'font-family'](https://www.w3.org/TR/css-fonts-4/#font-family-prop)
    pub font_family: Option<String>,
    /// [§ 3.5 'font-size'](https://www.w3.org/TR/css-fonts-4/#font-size-prop), in points.
    pub font_size: Option<f32>,
    /// [§ 3.2 'font-weight'](https://www.w3.org/TR/css-fonts-4/#font-weight-prop)
    pub font_weight: Option<u16>,
    /// [§ 3.3 'font-style'](https://www.w3.org/TR/css-fonts-4/#font-style-prop)
    pub font_style: Option<FontStyle>,
    /// [§ 16.2 'text-align'](https://www.w3.org/TR/CSS2/text.html#alignment-prop)
    pub text_align: Option<TextAlign>,
    /// [§ 2 'text-decoration-line'](https://www.w3.org/TR/css-text-decor-3/#text-decoration-line-property)
    pub text_decoration: Option<TextDecoration>,

    /// [§ 6.1 'margin-top'](https://www.w3.org/TR/css-box-4/#margin-physical)
    pub margin_top: Option<LengthValue>,
    /// [§ 6.1 'margin-right'](https://www.w3.org/TR/css-box-4/#margin-physical)
    pub margin_right: Option<LengthValue>,
    /// [§ 6.1 'margin-bottom'](https://www.w3.org/TR/css-box-4/#margin-physical)
    pub margin_bottom: Option<LengthValue>,
    /// [§ 6.1 'margin-left'](https://www.w3.org/TR/css-box-4/#margin-physical)
    pub margin_left: Option<LengthValue>,

    /// [§ 6.2 'padding-top'](https://www.w3.org/TR/css-box-4/#padding-physical)
    pub padding_top: Option<LengthValue>,
    /// [§ 6.2 'padding-right'](https://www.w3.org/TR/css-box-4/#padding-physical)
    pub padding_right: Option<LengthValue>,
    /// [§ 6.2 'padding-bottom'](https://www.w3.org/TR/css-box-4/#padding-physical)
    pub padding_bottom: Option<LengthValue>,
    /// [§ 6.2 'padding-left'](https://www.w3.org/TR/css-box-4/#padding-physical)
    pub padding_left: Option<LengthValue>,

    /// [§ 4 'border-top'](https://www.w3.org/TR/css-backgrounds-3/#border-shorthands)
    pub border_top: Option<BorderValue>,
    /// [§ 4 'border-right'](https://www.w3.org/TR/css-backgrounds-3/#border-shorthands)
    pub border_right: Option<BorderValue>,
    /// [§ 4 'border-bottom'](https://www.w3.org/TR/css-backgrounds-3/#border-shorthands)
    pub border_bottom: Option<BorderValue>,
    /// [§ 4 'border-left'](https://www.w3.org/TR/css-backgrounds-3/#border-shorthands)
    pub border_left: Option<BorderValue>,
    /// [§ 5.1 'border-radius'](https://www.w3.org/TR/css-backgrounds-3/#border-radius),
    /// one radius for all four corners, in points.
    pub border_radius: Option<f32>,

    /// [§ 10.2 'width'](https://www.w3.org/TR/CSS2/visudet.html#the-width-property)
    ///
    /// Content width. None means 'auto'.
    pub width: Option<LengthValue>,
    /// [§ 10.5 'height'](https://www.w3.org/TR/CSS2/visudet.html#the-height-property)
    ///
    /// Content height. None means 'auto'.
    pub height: Option<LengthValue>,

    /// [§ 9.9.1 'z-index'](https://www.w3.org/TR/CSS2/visuren.html#z-index)
    pub z_index: Option<i32>,
    /// [§ 3.2 'opacity'](https://www.w3.org/TR/css-color-4/#transparency)
    pub opacity: Option<f32>,
    /// [§ 3 'overflow'](https://www.w3.org/TR/css-overflow-3/#propdef-overflow)
    pub overflow: Option<Overflow>,
}

impl ComputedStyle {
    /// [§ 7 Inheritance](https://www.w3.org/TR/css-cascade-4/#inheriting)
    ///
    /// "Inherited properties... the computed value of the parent element."
    ///
    /// Style for an anonymous box or text run inside `self`: inherited
    /// properties are copied, everything else takes its initial value.
    #[must_use]
    pub fn inherited(&self) -> Self {
        Self {
            color: self.color,
            font_family: self.font_family.clone(),
            font_size: self.font_size,
            font_weight: self.font_weight,
            font_style: self.font_style,
            text_align: self.text_align,
            text_decoration: self.text_decoration,
            ..Self::default()
        }
    }

    /// Fill unset inherited properties from `parent`.
    #[must_use]
    pub fn inherit_from(mut self, parent: &Self) -> Self {
        self.color = self.color.or(parent.color);
        if self.font_family.is_none() {
            self.font_family.clone_from(&parent.font_family);
        }
        self.font_size = self.font_size.or(parent.font_size);
        self.font_weight = self.font_weight.or(parent.font_weight);
        self.font_style = self.font_style.or(parent.font_style);
        self.text_align = self.text_align.or(parent.text_align);
        self.text_decoration = self.text_decoration.or(parent.text_decoration);
        self
    }

    /// [§ 10.3.3](https://www.w3.org/TR/CSS2/visudet.html#blockwidth)
    ///
    /// Used margins. Percentages "refer to the width of the containing
    /// block", passed as `basis`.
    #[must_use]
    pub fn margin(&self, basis: f32) -> EdgeSizes {
        let side = |v: Option<LengthValue>| v.map_or(0.0, |l| l.resolve(basis));
        EdgeSizes {
            top: side(self.margin_top),
            right: side(self.margin_right),
            bottom: side(self.margin_bottom),
            left: side(self.margin_left),
        }
    }

    /// [§ 8.4 Padding properties](https://www.w3.org/TR/CSS2/box.html#padding-properties)
    ///
    /// "Unlike margin properties, values for padding values cannot be
    /// negative." Percentages refer to the containing block width.
    #[must_use]
    pub fn padding(&self, basis: f32) -> EdgeSizes {
        let side = |v: Option<LengthValue>| v.map_or(0.0, |l| l.resolve(basis).max(0.0));
        EdgeSizes {
            top: side(self.padding_top),
            right: side(self.padding_right),
            bottom: side(self.padding_bottom),
            left: side(self.padding_left),
        }
    }

    /// Used border widths on all four sides.
    #[must_use]
    pub fn border_widths(&self) -> EdgeSizes {
        let side = |v: Option<BorderValue>| v.map_or(0.0, |b| b.used_width().max(0.0));
        EdgeSizes {
            top: side(self.border_top),
            right: side(self.border_right),
            bottom: side(self.border_bottom),
            left: side(self.border_left),
        }
    }

    /// Explicit absolute content height, if any.
    #[must_use]
    pub fn explicit_height_pt(&self) -> Option<f32> {
        self.height.and_then(LengthValue::as_pt)
    }

    /// Used font size, falling back to `default`.
    #[must_use]
    pub fn font_size_or(&self, default: f32) -> f32 {
        self.font_size.unwrap_or(default)
    }
}

/// A node of the style tree: one element or one text run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleNode {
    /// Lowercase tag name. `None` for text nodes.
    pub tag: Option<String>,
    /// The `id` attribute.
    pub id: Option<String>,
    /// The `class` attribute, split into names.
    pub classes: Vec<String>,
    /// Other attributes the engine reads (`src`, `width`, `height`).
    pub attributes: BTreeMap<String, String>,
    /// Text content. Only set on text nodes.
    pub text: Option<String>,
    /// Resolved style.
    pub style: ComputedStyle,
    /// Child nodes in document order.
    pub children: Vec<StyleNode>,
}

impl StyleNode {
    /// An element with default style and no children.
    #[must_use]
    pub fn element(tag: &str) -> Self {
        Self {
            tag: Some(tag.to_ascii_lowercase()),
            ..Self::default()
        }
    }

    /// A text node.
    #[must_use]
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::default()
        }
    }

    /// Replace the style.
    #[must_use]
    pub fn with_style(mut self, style: ComputedStyle) -> Self {
        self.style = style;
        self
    }

    /// Append a child.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Set the `id` attribute.
    #[must_use]
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    /// Add a class name.
    #[must_use]
    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    /// Set an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        let _previous = self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    /// Whether this is a text node.
    #[must_use]
    pub const fn is_text(&self) -> bool {
        self.tag.is_none() && self.text.is_some()
    }

    /// An attribute value.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Concatenated text of all descendant text nodes.
    #[must_use]
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            if let Some(text) = &node.text {
                out.push_str(text);
            }
            pending.extend(node.children.iter().rev());
        }
        out
    }
}

/// The fully-styled document handed to the layout core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleTree {
    /// Root element (usually `html` or `body`).
    pub root: StyleNode,
    /// Page size in points.
    #[serde(default = "default_page_size")]
    pub page_size: Size,
    /// [§ 7 Page margins](https://www.w3.org/TR/css-page-3/#margin-boxes), in points.
    #[serde(default)]
    pub page_margin: EdgeSizes,
}

const fn default_page_size() -> Size {
    Size::A4
}

impl StyleTree {
    /// A4 page, no margins.
    #[must_use]
    pub const fn new(root: StyleNode) -> Self {
        Self {
            root,
            page_size: Size::A4,
            page_margin: EdgeSizes::ZERO,
        }
    }

    /// Replace the page geometry.
    #[must_use]
    pub const fn with_page(mut self, size: Size, margin: EdgeSizes) -> Self {
        self.page_size = size;
        self.page_margin = margin;
        self
    }
}

/// Collapse runs of white space into single spaces and trim the ends.
///
/// [§ 4.1.1 Phase I: Collapsing and Transformation](https://www.w3.org/TR/css-text-3/#white-space-phase-1)
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex() {
        assert_eq!(ColorValue::from_hex("#fff"), Some(ColorValue::WHITE));
        assert_eq!(ColorValue::from_hex("ff0000"), Some(ColorValue::rgb(255, 0, 0)));
        assert_eq!(
            ColorValue::from_hex("#00000080").map(|c| c.a),
            Some(0x80)
        );
        assert_eq!(ColorValue::from_hex("#12"), None);
    }

    #[test]
    fn test_margin_percentages_use_containing_width() {
        let style = ComputedStyle {
            margin_top: Some(LengthValue::Percent(10.0)),
            margin_left: Some(LengthValue::Pt(4.0)),
            ..ComputedStyle::default()
        };
        let margin = style.margin(200.0);
        assert_eq!(margin.top, 20.0);
        assert_eq!(margin.left, 4.0);
        assert_eq!(margin.bottom, 0.0);
    }

    #[test]
    fn test_border_none_has_zero_width() {
        let style = ComputedStyle {
            border_top: Some(BorderValue {
                width: 3.0,
                style: BorderStyle::None,
                color: ColorValue::BLACK,
            }),
            border_bottom: Some(BorderValue {
                width: 2.0,
                style: BorderStyle::Solid,
                color: ColorValue::BLACK,
            }),
            ..ComputedStyle::default()
        };
        assert_eq!(style.border_widths(), EdgeSizes::new(0.0, 0.0, 2.0, 0.0));
    }

    #[test]
    fn test_inherited_drops_box_properties() {
        let parent = ComputedStyle {
            color: Some(ColorValue::WHITE),
            font_size: Some(18.0),
            background_color: Some(ColorValue::BLACK),
            margin_top: Some(LengthValue::Pt(10.0)),
            ..ComputedStyle::default()
        };
        let child = parent.inherited();
        assert_eq!(child.color, Some(ColorValue::WHITE));
        assert_eq!(child.font_size, Some(18.0));
        assert_eq!(child.background_color, None);
        assert_eq!(child.margin_top, None);
    }

    #[test]
    fn test_text_align_offset() {
        assert_eq!(TextAlign::Center.offset(100.0, 40.0), 30.0);
        assert_eq!(TextAlign::Right.offset(100.0, 40.0), 60.0);
        assert_eq!(TextAlign::Right.offset(100.0, 140.0), 0.0);
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  hello \n\t world  "), "hello world");
        assert_eq!(collapse_whitespace(" \n "), "");
    }
}
