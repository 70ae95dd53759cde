//! Fragments: absolutely positioned, paint-ready boxes.
//!
//! [CSS Fragmentation § 1](https://www.w3.org/TR/css-break-3/#fragmentation-model)
//!
//! "A box fragment is the portion of a box that belongs to exactly one
//! fragmentainer."
//!
//! Every fragment carries a validated [`Rect`] in page coordinates, the
//! page it lands on, its paint order key and the minimal style a painter
//! needs. Block fragments own their children; [`FragmentForest`] also
//! keeps a flattened paint order.

mod pipeline;
mod stages;

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::box_tree::BoxId;
use crate::geometry::{Point, Rect};
use crate::measure::FontKey;
use crate::style::{BorderStyle, BorderValue, ColorValue, ComputedStyle, Overflow, TextDecoration};

pub use pipeline::{BuildContext, FragmentBuilder, FragmentStage, build};
pub use stages::{BlockStage, InlineStage, SpecializedStage, ZOrderStage};

/// Globally unique fragment id. Ids start at 1 and increase in creation
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FragmentId(pub u32);

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

/// One painted border side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BorderEdge {
    /// Line width in points.
    pub width: f32,
    /// Line style.
    pub style: BorderStyle,
    /// Line color.
    pub color: ColorValue,
}

/// What a painter needs to draw a fragment's box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FragmentStyle {
    /// Background fill, if not transparent.
    pub background: Option<ColorValue>,
    /// Top border.
    pub border_top: Option<BorderEdge>,
    /// Right border.
    pub border_right: Option<BorderEdge>,
    /// Bottom border.
    pub border_bottom: Option<BorderEdge>,
    /// Left border.
    pub border_left: Option<BorderEdge>,
    /// Corner radii: top-left, top-right, bottom-right, bottom-left.
    pub corner_radii: [f32; 4],
    /// Opacity in 0..=1.
    pub opacity: f32,
    /// Whether descendants are clipped to this box.
    pub clip_overflow: bool,
}

impl Default for FragmentStyle {
    fn default() -> Self {
        Self {
            background: None,
            border_top: None,
            border_right: None,
            border_bottom: None,
            border_left: None,
            corner_radii: [0.0; 4],
            opacity: 1.0,
            clip_overflow: false,
        }
    }
}

impl FragmentStyle {
    /// Derive the paint style of a box.
    #[must_use]
    pub fn from_computed(style: &ComputedStyle) -> Self {
        let edge = |side: Option<BorderValue>| {
            side.filter(|b| b.used_width() > 0.0).map(|b| BorderEdge {
                width: b.used_width(),
                style: b.style,
                color: b.color,
            })
        };
        Self {
            background: style.background_color.filter(|c| !c.is_transparent()),
            border_top: edge(style.border_top),
            border_right: edge(style.border_right),
            border_bottom: edge(style.border_bottom),
            border_left: edge(style.border_left),
            corner_radii: [style.border_radius.unwrap_or(0.0).max(0.0); 4],
            opacity: style.opacity.unwrap_or(1.0).clamp(0.0, 1.0),
            clip_overflow: style.overflow == Some(Overflow::Hidden),
        }
    }
}

/// Fields shared by every fragment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FragmentInfo {
    /// Unique id.
    pub id: FragmentId,
    /// Border box in page-relative coordinates.
    pub rect: Rect,
    /// 1-based page number.
    pub page: u32,
    /// Paint order key; lower paints first.
    pub z_order: i32,
    /// Paint style.
    pub style: FragmentStyle,
}

/// A block container and its owned children.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockFragment {
    /// Common fields.
    pub info: FragmentInfo,
    /// Children in document order.
    pub children: Vec<Fragment>,
}

/// A run of text set in one font on one baseline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextRun {
    /// The exact text.
    pub text: String,
    /// Font the run is set in.
    pub font: FontKey,
    /// Font size in points.
    pub font_size: f32,
    /// Start of the baseline.
    pub origin: Point,
    /// Advance width.
    pub advance: f32,
    /// Ascent above the baseline.
    pub ascent: f32,
    /// Descent below the baseline.
    pub descent: f32,
    /// Decoration lines.
    pub decoration: TextDecoration,
    /// Text color, if set.
    pub color: Option<ColorValue>,
}

/// [§ 9.4.2 Inline formatting contexts](https://www.w3.org/TR/CSS2/visuren.html#inline-formatting)
///
/// "The rectangular area that contains the boxes that form a line is called
/// a line box."
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineBoxFragment {
    /// Common fields.
    pub info: FragmentInfo,
    /// Baseline position, page-relative.
    pub baseline_y: f32,
    /// Line height.
    pub line_height: f32,
    /// Runs on this line.
    pub runs: Vec<TextRun>,
}

/// An image placement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageFragment {
    /// Common fields.
    pub info: FragmentInfo,
    /// Source as authored.
    pub src: String,
    /// Area the image is drawn into, inside padding and border.
    pub content_rect: Rect,
    /// Authored width and height attributes in pixels.
    pub authored_size: (Option<u32>, Option<u32>),
    /// Intrinsic size in pixels, when known.
    pub intrinsic_size: Option<(u32, u32)>,
    /// The provider could not find the image.
    pub is_missing: bool,
    /// The image exceeded the byte cap.
    pub is_oversize: bool,
}

/// A horizontal rule; geometry only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleFragment {
    /// Common fields.
    pub info: FragmentInfo,
}

/// A drawable box.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Fragment {
    /// Block container.
    Block(BlockFragment),
    /// Line of text.
    LineBox(LineBoxFragment),
    /// Image.
    Image(ImageFragment),
    /// Horizontal rule.
    Rule(RuleFragment),
}

impl Fragment {
    /// Common fields.
    #[must_use]
    pub const fn info(&self) -> &FragmentInfo {
        match self {
            Self::Block(f) => &f.info,
            Self::LineBox(f) => &f.info,
            Self::Image(f) => &f.info,
            Self::Rule(f) => &f.info,
        }
    }

    /// Fragment id.
    #[must_use]
    pub const fn id(&self) -> FragmentId {
        self.info().id
    }

    /// Owned children; empty for leaves.
    #[must_use]
    pub fn children(&self) -> &[Fragment] {
        match self {
            Self::Block(f) => &f.children,
            Self::LineBox(_) | Self::Image(_) | Self::Rule(_) => &[],
        }
    }

    /// Number of fragments in this subtree, including itself.
    #[must_use]
    pub fn count(&self) -> usize {
        let mut total = 0;
        self.walk(&mut |_| total += 1);
        total
    }

    /// Visit this subtree in pre-order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Fragment)) {
        let mut stack = vec![self];
        while let Some(fragment) = stack.pop() {
            visit(fragment);
            stack.extend(fragment.children().iter().rev());
        }
    }
}

/// The output of fragment construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FragmentForest {
    /// Root block fragments in document order.
    pub roots: Vec<Fragment>,
    /// Every fragment id, stable-sorted ascending by z-order.
    pub paint_order: Vec<FragmentId>,
    /// Root index and child indices leading to each fragment.
    #[serde(skip)]
    index: HashMap<FragmentId, Vec<usize>>,
    /// Fragment produced for each block, inline and replaced box.
    #[serde(skip)]
    box_fragments: HashMap<BoxId, FragmentId>,
}

impl FragmentForest {
    /// Assemble a forest from its parts.
    pub(crate) fn new(
        roots: Vec<Fragment>,
        paint_order: Vec<FragmentId>,
        box_fragments: HashMap<BoxId, FragmentId>,
    ) -> Self {
        let mut index = HashMap::new();
        for (i, root) in roots.iter().enumerate() {
            let mut stack = vec![(root, vec![i])];
            while let Some((fragment, path)) = stack.pop() {
                for (j, child) in fragment.children().iter().enumerate() {
                    let mut child_path = path.clone();
                    child_path.push(j);
                    stack.push((child, child_path));
                }
                let _previous = index.insert(fragment.id(), path);
            }
        }
        Self {
            roots,
            paint_order,
            index,
            box_fragments,
        }
    }

    /// Look up a fragment by id.
    #[must_use]
    pub fn get(&self, id: FragmentId) -> Option<&Fragment> {
        let path = self.index.get(&id)?;
        let (first, rest) = path.split_first()?;
        let mut fragment = self.roots.get(*first)?;
        for &i in rest {
            fragment = fragment.children().get(i)?;
        }
        Some(fragment)
    }

    /// The fragment produced for a box.
    #[must_use]
    pub fn fragment_for_box(&self, id: BoxId) -> Option<&Fragment> {
        self.box_fragments.get(&id).and_then(|&f| self.get(f))
    }

    /// Every fragment in paint order.
    #[must_use]
    pub fn flattened(&self) -> Vec<&Fragment> {
        self.paint_order.iter().filter_map(|&id| self.get(id)).collect()
    }

    /// Every fragment in hierarchical pre-order.
    #[must_use]
    pub fn all(&self) -> Vec<&Fragment> {
        let mut out = Vec::new();
        for root in &self.roots {
            root.walk(&mut |f| out.push(f));
        }
        out
    }

    /// Number of fragments in the hierarchy.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.roots.iter().map(Fragment::count).sum()
    }

    /// Number of entries in the flattened paint order.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paint_order.len()
    }

    /// Whether the forest is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paint_order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: u32) -> FragmentInfo {
        FragmentInfo {
            id: FragmentId(id),
            rect: Rect::new(0.0, 0.0, 10.0, 10.0).unwrap(),
            page: 1,
            z_order: 0,
            style: FragmentStyle::default(),
        }
    }

    #[test]
    fn test_forest_lookup_by_path() {
        let tree = Fragment::Block(BlockFragment {
            info: info(1),
            children: vec![
                Fragment::Rule(RuleFragment { info: info(3) }),
                Fragment::Block(BlockFragment {
                    info: info(2),
                    children: vec![Fragment::Rule(RuleFragment { info: info(4) })],
                }),
            ],
        });
        let forest = FragmentForest::new(
            vec![tree],
            vec![FragmentId(1), FragmentId(2), FragmentId(3), FragmentId(4)],
            HashMap::from([(BoxId(9), FragmentId(4))]),
        );
        assert_eq!(forest.total_count(), 4);
        assert_eq!(forest.get(FragmentId(4)).map(Fragment::id), Some(FragmentId(4)));
        assert_eq!(
            forest.fragment_for_box(BoxId(9)).map(Fragment::id),
            Some(FragmentId(4))
        );
        let order: Vec<u32> = forest.all().iter().map(|f| f.id().0).collect();
        assert_eq!(order, vec![1, 3, 2, 4]);
    }

    #[test]
    fn test_style_from_computed() {
        let style = ComputedStyle {
            background_color: Some(ColorValue::TRANSPARENT),
            border_left: Some(BorderValue {
                width: 2.0,
                style: BorderStyle::Dashed,
                color: ColorValue::BLACK,
            }),
            opacity: Some(3.0),
            overflow: Some(Overflow::Hidden),
            border_radius: Some(4.0),
            ..ComputedStyle::default()
        };
        let paint = FragmentStyle::from_computed(&style);
        assert_eq!(paint.background, None);
        assert_eq!(paint.border_left.map(|b| b.width), Some(2.0));
        assert_eq!(paint.border_top, None);
        assert_eq!(paint.opacity, 1.0);
        assert!(paint.clip_overflow);
        assert_eq!(paint.corner_radii, [4.0; 4]);
    }
}
