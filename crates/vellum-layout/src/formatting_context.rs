//! Block and inline-block formatting contexts.
//!
//! [§ 9.4.1 Block formatting contexts](https://www.w3.org/TR/CSS2/visuren.html#block-formatting)
//!
//! "In a block formatting context, boxes are laid out one after the other,
//! vertically, beginning at the top of a containing block. The vertical
//! distance between two sibling boxes is determined by the 'margin'
//! properties. Vertical margins between adjacent block-level boxes in a
//! block formatting context collapse."
//!
//! Formatting here is a measuring pass over an already laid-out subtree:
//! it reports the occupied width and height of a root box (and, for an
//! inline-block, its baseline) without moving anything.

use crate::box_tree::{BlockBox, BoxId, BoxTree, DisplayNode};
use crate::error::{LayoutError, LayoutResult, ensure_finite, ensure_metric};
use crate::geometry::EdgeSizes;

/// Which kind of formatting context the root establishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormattingContextKind {
    /// Ordinary block flow.
    Block,
    /// [§ 9.2.4 'inline-block'](https://www.w3.org/TR/CSS2/visuren.html#display-prop)
    ///
    /// "This value causes an element to generate an inline-level block
    /// container."
    InlineBlock,
}

/// Opaque page identity carried through formatting for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageContext(pub u32);

/// Input to [`BlockFormattingContext::format`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockFormattingRequest {
    kind: FormattingContextKind,
    root: BoxId,
    available_width: f32,
    unbounded: bool,
    page: Option<PageContext>,
}

impl BlockFormattingRequest {
    /// A request bounded by `available_width`.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidArgument`] unless `available_width` is
    /// finite and non-negative.
    pub fn new(kind: FormattingContextKind, root: BoxId, available_width: f32) -> LayoutResult<Self> {
        Self::with_width(kind, root, available_width, false)
    }

    /// A request with no width limit.
    #[must_use]
    pub const fn unbounded(kind: FormattingContextKind, root: BoxId) -> Self {
        Self {
            kind,
            root,
            available_width: f32::INFINITY,
            unbounded: true,
            page: None,
        }
    }

    /// A request with an explicit width and unbounded flag.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidArgument`] if `unbounded` is set and
    /// the width is not positive infinity, or if it is clear and the width
    /// is not finite and non-negative.
    pub fn with_width(
        kind: FormattingContextKind,
        root: BoxId,
        available_width: f32,
        unbounded: bool,
    ) -> LayoutResult<Self> {
        if unbounded {
            if !(available_width.is_infinite() && available_width.is_sign_positive()) {
                return Err(LayoutError::invalid_argument(format!(
                    "unbounded request must use an infinite width, got {available_width}"
                )));
            }
        } else if !available_width.is_finite() {
            return Err(LayoutError::invalid_argument(format!(
                "available width {available_width} is not finite; mark the request unbounded"
            )));
        } else if available_width < 0.0 {
            return Err(LayoutError::invalid_argument(format!(
                "available width must be non-negative, got {available_width}"
            )));
        }
        Ok(Self {
            kind,
            root,
            available_width,
            unbounded,
            page: None,
        })
    }

    /// Attach a page token.
    #[must_use]
    pub const fn with_page_context(mut self, page: PageContext) -> Self {
        self.page = Some(page);
        self
    }

    /// Context kind.
    #[must_use]
    pub const fn kind(&self) -> FormattingContextKind {
        self.kind
    }

    /// Root box.
    #[must_use]
    pub const fn root(&self) -> BoxId {
        self.root
    }

    /// Available width; infinite when unbounded.
    #[must_use]
    pub const fn available_width(&self) -> f32 {
        self.available_width
    }

    /// Whether the width is unlimited.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.unbounded
    }

    /// Page token, if any.
    #[must_use]
    pub const fn page_context(&self) -> Option<PageContext> {
        self.page
    }
}

/// Output of [`BlockFormattingContext::format`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockFormattingResult {
    /// Occupied width.
    pub total_width: f32,
    /// Occupied height.
    pub total_height: f32,
    /// Baseline for inline-block roots.
    pub baseline: Option<f32>,
}

/// Formatter over a borrowed box tree.
#[derive(Debug, Clone, Copy)]
pub struct BlockFormattingContext<'a> {
    tree: &'a BoxTree,
}

impl<'a> BlockFormattingContext<'a> {
    /// A formatter for `tree`.
    #[must_use]
    pub const fn new(tree: &'a BoxTree) -> Self {
        Self { tree }
    }

    /// Measure the subtree named by `request`.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidArgument`] if the root is not a block,
    /// and [`LayoutError::InvalidGeometry`] if any collected box or
    /// resulting metric is non-finite or negative.
    pub fn format(&self, request: &BlockFormattingRequest) -> LayoutResult<BlockFormattingResult> {
        let root_node = self.tree.node(request.root)?;
        let root = root_node.as_block().ok_or_else(|| {
            LayoutError::invalid_argument(format!(
                "formatting root {} is not a block box",
                request.root
            ))
        })?;

        let mut collected: Vec<(&DisplayNode, &BlockBox)> = Vec::new();
        for id in self.tree.block_descendants(request.root) {
            let node = self.tree.node(id)?;
            let Some(block) = node.as_block() else { continue };
            if !block.has_usable_geometry() {
                check_block_geometry(&self.tree.path_to(id), block)?;
            }
            collected.push((node, block));
        }

        // STEP 1: widest box, clamped unless unbounded.
        let widest = collected
            .iter()
            .map(|(_, b)| b.width)
            .fold(0.0_f32, f32::max);
        let total_width = if request.unbounded {
            widest
        } else {
            request.available_width.min(widest)
        };

        // STEP 2: height.
        let direct: Vec<(&DisplayNode, &BlockBox)> = root_node
            .children()
            .iter()
            .filter_map(|&id| {
                let node = self.tree.get(id)?;
                Some((node, node.as_block()?))
            })
            .collect();

        let total_height = if request.kind == FormattingContextKind::InlineBlock && !direct.is_empty()
        {
            stacked_height(&direct, root.width).max(root.height)
        } else {
            vertical_extent(root_node, root, &collected)
        };

        // STEP 3: baseline.
        let baseline = match request.kind {
            FormattingContextKind::InlineBlock => Some(ensure_metric("baseline", root.height)?),
            FormattingContextKind::Block => None,
        };

        Ok(BlockFormattingResult {
            total_width: ensure_metric("total width", total_width)?,
            total_height: ensure_metric("total height", total_height)?,
            baseline,
        })
    }
}

/// Format with a fresh [`BlockFormattingContext`].
///
/// # Errors
///
/// See [`BlockFormattingContext::format`].
pub fn format(
    tree: &BoxTree,
    request: &BlockFormattingRequest,
) -> LayoutResult<BlockFormattingResult> {
    BlockFormattingContext::new(tree).format(request)
}

/// Reject non-finite positions and margins and negative sizes before
/// they are folded.
fn check_block_geometry(path: &str, block: &BlockBox) -> LayoutResult<()> {
    let _x = ensure_finite(&format!("{path} x"), block.x)?;
    let _y = ensure_finite(&format!("{path} y"), block.y)?;
    let _w = ensure_metric(&format!("{path} width"), block.width)?;
    let _h = ensure_metric(&format!("{path} height"), block.height)?;
    for (side, value) in [
        ("top", block.margin.top),
        ("right", block.margin.right),
        ("bottom", block.margin.bottom),
        ("left", block.margin.left),
    ] {
        let _m = ensure_finite(&format!("{path} margin-{side}"), value)?;
    }
    Ok(())
}

/// [§ 8.3.1 Collapsing margins](https://www.w3.org/TR/CSS2/box.html#collapsing-margins)
///
/// Sum of the children's block heights, with each adjoining pair of
/// margins collapsed to the larger of the two.
fn stacked_height(children: &[(&DisplayNode, &BlockBox)], basis: f32) -> f32 {
    let mut height = 0.0;
    let mut previous_bottom: Option<f32> = None;
    for (node, block) in children {
        let margin = effective_margin(node, block, basis);
        if let Some(bottom) = previous_bottom {
            height += bottom.max(margin.top);
        }
        height += resolved_block_height(node, block, basis);
        previous_bottom = Some(margin.bottom);
    }
    height
}

/// Union of the margin boxes' vertical extents, seeded with the root's.
fn vertical_extent(
    root_node: &DisplayNode,
    root: &BlockBox,
    collected: &[(&DisplayNode, &BlockBox)],
) -> f32 {
    let basis = root.width;
    let root_margin = effective_margin(root_node, root, basis);
    let mut min_top = root.y - root_margin.top;
    let mut max_bottom = root.y + root.height + root_margin.bottom;
    for (node, block) in collected {
        let margin = effective_margin(node, block, basis);
        min_top = min_top.min(block.y - margin.top);
        max_bottom = max_bottom.max(block.y + block.height + margin.bottom);
    }
    (max_bottom - min_top).max(0.0)
}

/// Style margin when any side is set, else the box's own margin.
fn effective_margin(node: &DisplayNode, block: &BlockBox, basis: f32) -> EdgeSizes {
    let styled = node.style.margin(basis);
    if styled.is_zero() { block.margin } else { styled }
}

/// Explicit style height plus vertical padding and border, else the
/// measured height.
fn resolved_block_height(node: &DisplayNode, block: &BlockBox, basis: f32) -> f32 {
    node.style.explicit_height_pt().map_or(block.height, |h| {
        h + node.style.padding(basis).vertical() + node.style.border_widths().vertical()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::box_tree::{BoxKind, PageBox, Role};
    use crate::geometry::Size;
    use crate::style::{ComputedStyle, LengthValue};

    fn tree() -> BoxTree {
        BoxTree::new(PageBox {
            size: Size::A4,
            margin: EdgeSizes::ZERO,
        })
    }

    fn add(tree: &mut BoxTree, block: BlockBox, style: ComputedStyle) -> BoxId {
        tree.alloc(DisplayNode::new(
            Role::Block,
            BoxKind::Block(block),
            style,
            None,
        ))
    }

    #[test]
    fn test_request_validation() {
        let id = BoxId(0);
        assert!(BlockFormattingRequest::new(FormattingContextKind::Block, id, -1.0).is_err());
        assert!(BlockFormattingRequest::new(FormattingContextKind::Block, id, f32::NAN).is_err());
        assert!(
            BlockFormattingRequest::with_width(FormattingContextKind::Block, id, 100.0, true)
                .is_err()
        );
        assert!(
            BlockFormattingRequest::with_width(
                FormattingContextKind::Block,
                id,
                f32::INFINITY,
                true
            )
            .is_ok()
        );
    }

    #[test]
    fn test_style_margin_overrides_box_margin() {
        let mut tree = tree();
        let root = add(
            &mut tree,
            BlockBox {
                width: 100.0,
                ..BlockBox::default()
            },
            ComputedStyle::default(),
        );
        let a = add(
            &mut tree,
            BlockBox {
                height: 20.0,
                margin: EdgeSizes::new(0.0, 0.0, 50.0, 0.0),
                ..BlockBox::default()
            },
            ComputedStyle {
                margin_bottom: Some(LengthValue::Pt(5.0)),
                ..ComputedStyle::default()
            },
        );
        let b = add(
            &mut tree,
            BlockBox {
                height: 20.0,
                margin: EdgeSizes::new(3.0, 0.0, 0.0, 0.0),
                ..BlockBox::default()
            },
            ComputedStyle::default(),
        );
        tree.add_root(root).unwrap();
        tree.append_child(root, a).unwrap();
        tree.append_child(root, b).unwrap();

        let request =
            BlockFormattingRequest::unbounded(FormattingContextKind::InlineBlock, root);
        let result = format(&tree, &request).unwrap();
        assert_eq!(result.total_height, 45.0);
        assert_eq!(result.baseline, Some(0.0));
    }

    #[test]
    fn test_block_context_uses_vertical_extent() {
        let mut tree = tree();
        let root = add(
            &mut tree,
            BlockBox {
                y: 10.0,
                width: 100.0,
                height: 5.0,
                ..BlockBox::default()
            },
            ComputedStyle::default(),
        );
        let child = add(
            &mut tree,
            BlockBox {
                y: 12.0,
                width: 80.0,
                height: 30.0,
                margin: EdgeSizes::new(0.0, 0.0, 8.0, 0.0),
                ..BlockBox::default()
            },
            ComputedStyle::default(),
        );
        tree.add_root(root).unwrap();
        tree.append_child(root, child).unwrap();

        let request =
            BlockFormattingRequest::new(FormattingContextKind::Block, root, 500.0).unwrap();
        let result = format(&tree, &request).unwrap();
        assert_eq!(result.total_height, 40.0);
        assert_eq!(result.total_width, 100.0);
        assert_eq!(result.baseline, None);
    }

    #[test]
    fn test_non_block_root_is_rejected() {
        let mut tree = tree();
        let inline = tree.alloc(DisplayNode::new(
            Role::Inline,
            BoxKind::Inline(crate::box_tree::InlineBox::default()),
            ComputedStyle::default(),
            None,
        ));
        let request = BlockFormattingRequest::unbounded(FormattingContextKind::Block, inline);
        assert!(matches!(
            format(&tree, &request),
            Err(LayoutError::InvalidArgument(_))
        ));
    }
}
