//! The box tree: an arena of display nodes with parent back-links.
//!
//! [§ 9.2 Controlling box generation](https://www.w3.org/TR/CSS2/visuren.html#box-gen)
//!
//! Nodes are addressed by [`BoxId`]. Children are owned by their parent's
//! child list; the parent link is an index used only to rebuild paths for
//! diagnostics.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::error::{LayoutError, LayoutResult, ensure_finite, ensure_metric};
use crate::geometry::{EdgeSizes, Rect, Size};
use crate::style::{ComputedStyle, TextAlign};

/// Index of a node in a [`BoxTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoxId(pub usize);

impl fmt::Display for BoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The role a box plays in layout, named after its CSS display keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// `display: block`
    Block,
    /// `display: inline`
    Inline,
    /// `display: inline-block`
    InlineBlock,
    /// `display: list-item`
    ListItem,
    /// A floated box.
    Float,
    /// `display: table`
    Table,
    /// `display: table-row`
    TableRow,
    /// `display: table-cell`
    TableCell,
}

impl Role {
    /// Whether this role belongs to the table model.
    #[must_use]
    pub const fn is_table_part(self) -> bool {
        matches!(self, Self::Table | Self::TableRow | Self::TableCell)
    }
}

/// [§ 9.5.1 Positioning the float](https://www.w3.org/TR/CSS2/visuren.html#float-position)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FloatDirection {
    /// "The element generates a block box that is floated to the left."
    Left,
    /// "...floated to the right."
    Right,
}

/// Which element a box came from, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceIdentity {
    /// Lowercase tag name.
    pub tag: Option<String>,
    /// The `id` attribute.
    pub id: Option<String>,
    /// Class names.
    pub classes: Vec<String>,
}

impl fmt::Display for SourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag.as_deref().unwrap_or("#anonymous"))?;
        if let Some(id) = &self.id {
            write!(f, "#{id}")?;
        }
        for class in &self.classes {
            write!(f, ".{class}")?;
        }
        Ok(())
    }
}

/// A block-level box. Geometry is the border box in page coordinates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BlockBox {
    /// Left edge of the border box.
    pub x: f32,
    /// Top edge of the border box.
    pub y: f32,
    /// Border-box width.
    pub width: f32,
    /// Border-box height.
    pub height: f32,
    /// Used margins.
    pub margin: EdgeSizes,
    /// Used padding.
    pub padding: EdgeSizes,
    /// Alignment of inline content.
    pub text_align: TextAlign,
    /// [§ 9.2.1.1 Anonymous block boxes](https://www.w3.org/TR/CSS2/visuren.html#anonymous-block-level)
    pub is_anonymous: bool,
    /// Horizontal indent reserved for a list marker.
    pub marker_offset: f32,
    /// Whether this box establishes an inline-block formatting context.
    pub is_inline_block_context: bool,
}

impl BlockBox {
    /// The border box as a validated rectangle.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidGeometry`] if the box has not been laid
    /// out consistently.
    pub fn rect(&self) -> LayoutResult<Rect> {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// Finite position and margins, finite non-negative size.
    #[must_use]
    pub fn has_usable_geometry(&self) -> bool {
        let metric = |v: f32| v.is_finite() && v >= 0.0;
        let m = &self.margin;
        self.x.is_finite()
            && self.y.is_finite()
            && metric(self.width)
            && metric(self.height)
            && [m.top, m.right, m.bottom, m.left].iter().all(|v| v.is_finite())
    }
}

/// An inline-level box holding a single text run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InlineBox {
    /// Collapsed text, if any.
    pub text: Option<String>,
    /// Measured advance width.
    pub width: f32,
    /// Measured ascent plus descent.
    pub height: f32,
    /// Distance from the top of the line to the baseline.
    pub baseline_offset: f32,
}

impl InlineBox {
    /// The text, if it contains anything besides white space.
    #[must_use]
    pub fn visible_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// A floated box. Its children are laid out in normal flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FloatBox {
    /// Float side.
    pub direction: FloatDirection,
}

/// What a replaced box shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ReplacedKind {
    /// `<hr>`: a horizontal rule.
    Rule,
    /// `<img>`
    Image {
        /// Image source as written.
        src: String,
        /// Authored `width` attribute in pixels.
        authored_width: Option<u32>,
        /// Authored `height` attribute in pixels.
        authored_height: Option<u32>,
    },
}

/// [§ 10.3.2 Inline, replaced elements](https://www.w3.org/TR/CSS2/visudet.html#inline-replaced-width)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplacedBox {
    /// Rule or image.
    pub kind: ReplacedKind,
    /// Used width in points.
    pub width: f32,
    /// Used height in points.
    pub height: f32,
}

/// Type-specific payload of a [`DisplayNode`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BoxKind {
    /// Block container.
    Block(BlockBox),
    /// Inline text.
    Inline(InlineBox),
    /// Float wrapper.
    Float(FloatBox),
    /// Rule or image.
    Replaced(ReplacedBox),
}

/// One node of the box tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayNode {
    /// Layout role.
    pub role: Role,
    /// Type-specific payload.
    pub kind: BoxKind,
    /// Computed style snapshot.
    pub style: ComputedStyle,
    /// Originating element, absent for anonymous boxes.
    pub source: Option<SourceIdentity>,
    parent: Option<BoxId>,
    children: Vec<BoxId>,
}

impl DisplayNode {
    /// A detached node.
    #[must_use]
    pub const fn new(
        role: Role,
        kind: BoxKind,
        style: ComputedStyle,
        source: Option<SourceIdentity>,
    ) -> Self {
        Self {
            role,
            kind,
            style,
            source,
            parent: None,
            children: Vec::new(),
        }
    }

    /// The parent, if attached.
    #[must_use]
    pub const fn parent(&self) -> Option<BoxId> {
        self.parent
    }

    /// Children in document order.
    #[must_use]
    pub fn children(&self) -> &[BoxId] {
        &self.children
    }

    /// The block payload, if this is a block.
    #[must_use]
    pub const fn as_block(&self) -> Option<&BlockBox> {
        match &self.kind {
            BoxKind::Block(block) => Some(block),
            _ => None,
        }
    }

    /// Mutable block payload.
    pub fn as_block_mut(&mut self) -> Option<&mut BlockBox> {
        match &mut self.kind {
            BoxKind::Block(block) => Some(block),
            _ => None,
        }
    }

    /// The inline payload, if this is inline text.
    #[must_use]
    pub const fn as_inline(&self) -> Option<&InlineBox> {
        match &self.kind {
            BoxKind::Inline(inline) => Some(inline),
            _ => None,
        }
    }

    /// The replaced payload, if this is a rule or image.
    #[must_use]
    pub const fn as_replaced(&self) -> Option<&ReplacedBox> {
        match &self.kind {
            BoxKind::Replaced(replaced) => Some(replaced),
            _ => None,
        }
    }

    /// Whether this node participates in inline formatting.
    #[must_use]
    pub const fn is_inline_level(&self) -> bool {
        matches!(self.kind, BoxKind::Inline(_))
    }

    /// Label used in structural paths: the tag name, else the role.
    #[must_use]
    pub fn label(&self) -> String {
        self.source
            .as_ref()
            .and_then(|s| s.tag.clone())
            .unwrap_or_else(|| self.role.to_string())
    }
}

/// [§ 3 Page model](https://www.w3.org/TR/css-page-3/#page-model)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageBox {
    /// Page size in points.
    pub size: Size,
    /// Page margins in points.
    pub margin: EdgeSizes,
}

impl PageBox {
    /// Width of the page content area.
    #[must_use]
    pub fn content_width(&self) -> f32 {
        (self.size.width - self.margin.horizontal()).max(0.0)
    }

    /// Height of the page content area.
    #[must_use]
    pub fn content_height(&self) -> f32 {
        (self.size.height - self.margin.vertical()).max(0.0)
    }
}

/// Arena of display nodes plus the page they are laid out on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxTree {
    nodes: Vec<DisplayNode>,
    roots: Vec<BoxId>,
    /// Page geometry.
    pub page: PageBox,
}

impl BoxTree {
    /// An empty tree for `page`.
    #[must_use]
    pub const fn new(page: PageBox) -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            page,
        }
    }

    /// Store a detached node and return its id.
    pub fn alloc(&mut self, node: DisplayNode) -> BoxId {
        let id = BoxId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Attach `child` as the last child of `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidArgument`] if either id is unknown,
    /// `child` already has a parent or is a root, or `child` is `parent` or
    /// one of its ancestors.
    pub fn append_child(&mut self, parent: BoxId, child: BoxId) -> LayoutResult<()> {
        // Only a child with descendants can close a cycle through `parent`.
        let cycle = child == parent
            || (!self.children(child).is_empty() && self.is_ancestor_or_self(child, parent));
        if self.get(parent).is_none() || cycle {
            return Err(LayoutError::invalid_argument(format!(
                "cannot append {child} to {parent}"
            )));
        }
        if self.roots.contains(&child) {
            return Err(LayoutError::invalid_argument(format!(
                "{child} is a root and cannot be attached"
            )));
        }
        let node = self.node_mut(child)?;
        if node.parent.is_some() {
            return Err(LayoutError::invalid_argument(format!(
                "{child} is already attached"
            )));
        }
        node.parent = Some(parent);
        self.node_mut(parent)?.children.push(child);
        Ok(())
    }

    /// Register `id` as a root. Roots must be blocks.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidArgument`] if `id` is unknown, is not a
    /// block, has a parent or is already a root.
    pub fn add_root(&mut self, id: BoxId) -> LayoutResult<()> {
        let node = self.node(id)?;
        if node.as_block().is_none() || node.parent.is_some() || self.roots.contains(&id) {
            return Err(LayoutError::invalid_argument(format!(
                "root {id} must be a detached block box"
            )));
        }
        self.roots.push(id);
        Ok(())
    }

    /// Whether `ancestor` is `id` or lies on its parent chain.
    fn is_ancestor_or_self(&self, ancestor: BoxId, id: BoxId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            if node_id == ancestor {
                return true;
            }
            current = self.parent(node_id);
        }
        false
    }

    /// Look up a node.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidArgument`] for an unknown id.
    pub fn node(&self, id: BoxId) -> LayoutResult<&DisplayNode> {
        self.get(id)
            .ok_or_else(|| LayoutError::invalid_argument(format!("unknown box {id}")))
    }

    /// Look up a node mutably.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidArgument`] for an unknown id.
    pub fn node_mut(&mut self, id: BoxId) -> LayoutResult<&mut DisplayNode> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| LayoutError::invalid_argument(format!("unknown box {id}")))
    }

    /// Look up a node, returning `None` for an unknown id.
    #[must_use]
    pub fn get(&self, id: BoxId) -> Option<&DisplayNode> {
        self.nodes.get(id.0)
    }

    /// Mutable block payload of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidArgument`] if `id` is unknown or not a
    /// block.
    pub fn block_mut(&mut self, id: BoxId) -> LayoutResult<&mut BlockBox> {
        self.node_mut(id)?
            .as_block_mut()
            .ok_or_else(|| LayoutError::invalid_argument(format!("{id} is not a block box")))
    }

    /// Block payload of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidArgument`] if `id` is unknown or not a
    /// block.
    pub fn block(&self, id: BoxId) -> LayoutResult<&BlockBox> {
        self.node(id)?
            .as_block()
            .ok_or_else(|| LayoutError::invalid_argument(format!("{id} is not a block box")))
    }

    /// Root block ids in document order.
    #[must_use]
    pub fn roots(&self) -> &[BoxId] {
        &self.roots
    }

    /// Children of `id`, empty for an unknown id.
    #[must_use]
    pub fn children(&self, id: BoxId) -> &[BoxId] {
        self.get(id).map_or(&[], DisplayNode::children)
    }

    /// Parent of `id`.
    #[must_use]
    pub fn parent(&self, id: BoxId) -> Option<BoxId> {
        self.get(id).and_then(DisplayNode::parent)
    }

    /// Number of nodes in the arena.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Pre-order walk of the subtree rooted at `root`, without recursion.
    #[must_use]
    pub fn preorder(&self, root: BoxId) -> Vec<BoxId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.get(id) else { continue };
            out.push(id);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Pre-order walk of every root, in root order.
    #[must_use]
    pub fn preorder_all(&self) -> Vec<BoxId> {
        self.roots.iter().flat_map(|&r| self.preorder(r)).collect()
    }

    /// Block boxes in the subtree of `root`, pre-order.
    #[must_use]
    pub fn block_descendants(&self, root: BoxId) -> Vec<BoxId> {
        self.preorder(root)
            .into_iter()
            .filter(|&id| self.get(id).is_some_and(|n| n.as_block().is_some()))
            .collect()
    }

    /// Slash-joined labels from the topmost ancestor down to `id`.
    #[must_use]
    pub fn path_to(&self, id: BoxId) -> String {
        let mut labels = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Some(node) = self.get(node_id) else { break };
            labels.push(node.label());
            current = node.parent;
        }
        labels.reverse();
        labels.join("/")
    }

    /// Check that every block reachable from the roots has finite
    /// coordinates and non-negative size.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidGeometry`] naming the first offending
    /// box.
    pub fn check_geometry(&self) -> LayoutResult<()> {
        for id in self.preorder_all() {
            let Some(block) = self.get(id).and_then(DisplayNode::as_block) else {
                continue;
            };
            if block.has_usable_geometry() {
                continue;
            }
            let path = self.path_to(id);
            let _x = ensure_finite(&format!("{path} x"), block.x)?;
            let _y = ensure_finite(&format!("{path} y"), block.y)?;
            let _w = ensure_metric(&format!("{path} width"), block.width)?;
            let _h = ensure_metric(&format!("{path} height"), block.height)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> PageBox {
        PageBox {
            size: Size::A4,
            margin: EdgeSizes::uniform(36.0),
        }
    }

    fn element(tree: &mut BoxTree, role: Role, tag: &str) -> BoxId {
        tree.alloc(DisplayNode::new(
            role,
            BoxKind::Block(BlockBox::default()),
            ComputedStyle::default(),
            Some(SourceIdentity {
                tag: Some(tag.to_string()),
                ..SourceIdentity::default()
            }),
        ))
    }

    #[test]
    fn test_role_display_is_css_keyword() {
        assert_eq!(Role::InlineBlock.to_string(), "inline-block");
        assert_eq!(Role::TableCell.to_string(), "table-cell");
        assert_eq!(Role::Block.to_string(), "block");
    }

    #[test]
    fn test_path_and_preorder() {
        let mut tree = BoxTree::new(page());
        let body = element(&mut tree, Role::Block, "body");
        let div = element(&mut tree, Role::Block, "div");
        let p = element(&mut tree, Role::Block, "p");
        let anon = tree.alloc(DisplayNode::new(
            Role::Block,
            BoxKind::Block(BlockBox::default()),
            ComputedStyle::default(),
            None,
        ));
        tree.add_root(body).unwrap();
        tree.append_child(body, div).unwrap();
        tree.append_child(div, p).unwrap();
        tree.append_child(body, anon).unwrap();

        assert_eq!(tree.path_to(p), "body/div/p");
        assert_eq!(tree.path_to(anon), "body/block");
        assert_eq!(tree.preorder(body), vec![body, div, p, anon]);
        assert_eq!(tree.parent(p), Some(div));
    }

    #[test]
    fn test_root_must_be_block() {
        let mut tree = BoxTree::new(page());
        let text = tree.alloc(DisplayNode::new(
            Role::Inline,
            BoxKind::Inline(InlineBox::default()),
            ComputedStyle::default(),
            None,
        ));
        assert!(matches!(
            tree.add_root(text),
            Err(LayoutError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_append_twice_fails() {
        let mut tree = BoxTree::new(page());
        let a = element(&mut tree, Role::Block, "a");
        let b = element(&mut tree, Role::Block, "b");
        let c = element(&mut tree, Role::Block, "c");
        tree.append_child(a, c).unwrap();
        assert!(tree.append_child(b, c).is_err());
    }

    #[test]
    fn test_append_ancestor_fails() {
        let mut tree = BoxTree::new(page());
        let a = element(&mut tree, Role::Block, "a");
        let b = element(&mut tree, Role::Block, "b");
        let c = element(&mut tree, Role::Block, "c");
        tree.add_root(a).unwrap();
        tree.append_child(a, b).unwrap();
        tree.append_child(b, c).unwrap();

        assert!(matches!(
            tree.append_child(c, b),
            Err(LayoutError::InvalidArgument(_))
        ));
        assert!(matches!(
            tree.append_child(b, b),
            Err(LayoutError::InvalidArgument(_))
        ));
        assert_eq!(tree.preorder(a), vec![a, b, c]);
        assert_eq!(tree.path_to(c), "a/b/c");

        // x > y is detached, so only the cycle check stops y adopting x.
        let x = element(&mut tree, Role::Block, "x");
        let y = element(&mut tree, Role::Block, "y");
        tree.append_child(x, y).unwrap();
        assert!(matches!(
            tree.append_child(y, x),
            Err(LayoutError::InvalidArgument(_))
        ));
        assert_eq!(tree.parent(x), None);
        assert!(tree.children(y).is_empty());
    }

    #[test]
    fn test_append_root_fails() {
        let mut tree = BoxTree::new(page());
        let a = element(&mut tree, Role::Block, "a");
        let b = element(&mut tree, Role::Block, "b");
        tree.add_root(a).unwrap();
        tree.append_child(a, b).unwrap();

        assert!(matches!(
            tree.append_child(b, a),
            Err(LayoutError::InvalidArgument(_))
        ));
        assert!(tree.add_root(a).is_err());
        assert_eq!(tree.parent(a), None);
        assert!(crate::validate::validate(&tree).is_ok());
    }

    #[test]
    fn test_check_geometry_rejects_nan() {
        let mut tree = BoxTree::new(page());
        let root = element(&mut tree, Role::Block, "body");
        tree.add_root(root).unwrap();
        tree.block_mut(root).unwrap().height = f32::NAN;
        assert!(matches!(
            tree.check_geometry(),
            Err(LayoutError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_page_content_size() {
        let page = page();
        assert_eq!(page.content_width(), 523.0);
        assert_eq!(page.content_height(), 770.0);
    }
}
