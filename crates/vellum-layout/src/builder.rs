//! Box generation and block layout from a style tree.
//!
//! [§ 9.2 Controlling box generation](https://www.w3.org/TR/CSS2/visuren.html#box-gen)
//!
//! Building runs in two phases. Generation turns [`StyleNode`]s into
//! display nodes, inserting anonymous blocks around inline runs that sit
//! next to block-level siblings. Layout then walks the tree top-down,
//! stacking block children inside their parent's content box with sibling
//! margins collapsed, and resolving percentage heights in two passes.

use std::collections::HashMap;
#[cfg(feature = "layout-trace")]
use std::cell::Cell;

use vellum_common::Diagnostics;

use crate::box_tree::{
    BlockBox, BoxId, BoxKind, BoxTree, DisplayNode, FloatBox, InlineBox, PageBox, ReplacedBox,
    ReplacedKind, Role, SourceIdentity,
};
use crate::dimension::{DimensionResolver, ElementIdentity, RequestedDimension};
use crate::error::{LayoutError, LayoutResult};
use crate::formatting_context::{BlockFormattingRequest, FormattingContextKind, format};
use crate::geometry::{Size, clamp_min};
use crate::measure::{ImageStatus, MeasurementContext, PX_TO_PT};
use crate::options::LayoutOptions;
use crate::style::{ComputedStyle, Display, LengthValue, StyleNode, StyleTree, collapse_whitespace};

/// [§ 8.3.1 Collapsing margins](https://www.w3.org/TR/CSS2/box.html#collapsing-margins)
///
/// "When two or more margins collapse, the resulting margin width is the
/// maximum of the collapsing margins' widths. In the case of negative
/// margins, the maximum of the absolute values of the negative adjoining
/// margins is deducted from the maximum of the positive adjoining margins.
/// If there are no positive margins, the maximum of the absolute values
/// of the adjoining margins is deducted from zero."
#[must_use]
pub fn collapse_two_margins(a: f32, b: f32) -> f32 {
    if a >= 0.0 && b >= 0.0 {
        a.max(b)
    } else if a < 0.0 && b < 0.0 {
        a.min(b)
    } else {
        a + b
    }
}

/// [§ 15.3 Non-replaced elements](https://html.spec.whatwg.org/multipage/rendering.html#non-replaced-elements)
///
/// The user-agent default `display` for a tag when the style tree does not
/// set one.
#[must_use]
pub fn default_display_for_element(tag: &str) -> Display {
    // [§ 15.3.1 Hidden elements]
    const HIDDEN: &[&str] = &[
        "area", "base", "basefont", "datalist", "head", "link", "meta", "noembed", "noframes",
        "param", "rp", "script", "style", "template", "title",
    ];
    // [§ 15.3.3 Flow content]
    const BLOCK: &[&str] = &[
        "address", "article", "aside", "blockquote", "body", "center", "dd", "details",
        "dialog", "dir", "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form",
        "h1", "h2", "h3", "h4", "h5", "h6", "header", "hgroup", "hr", "html", "legend", "main",
        "menu", "nav", "ol", "p", "pre", "search", "section", "summary", "ul",
    ];
    match tag {
        t if HIDDEN.contains(&t) => Display::None,
        t if BLOCK.contains(&t) => Display::Block,
        "li" => Display::ListItem,
        "table" => Display::Table,
        "tr" => Display::TableRow,
        "td" | "th" => Display::TableCell,
        _ => Display::Inline,
    }
}

/// Where a block is placed by its parent.
#[derive(Debug, Clone, Copy)]
struct Placement {
    x: f32,
    y: f32,
    containing_width: f32,
    /// Content height of the containing block, when definite.
    containing_height: Option<f32>,
}

/// An element whose children are being generated.
struct OpenElement<'s> {
    node: &'s StyleNode,
    style: ComputedStyle,
    next: usize,
    generated: Vec<BoxId>,
    /// Block receiving the generated children. `None` passes them through
    /// to the parent, for a split inline.
    container: Option<BoxId>,
    /// Box this element contributes to its parent.
    output: Option<BoxId>,
}

impl<'s> OpenElement<'s> {
    const fn new(
        node: &'s StyleNode,
        style: ComputedStyle,
        container: Option<BoxId>,
        output: Option<BoxId>,
    ) -> Self {
        Self {
            node,
            style,
            next: 0,
            generated: Vec::new(),
            container,
            output,
        }
    }

    /// Attach the generated children and return what the parent receives.
    fn close(self, tree: &mut BoxTree) -> LayoutResult<Vec<BoxId>> {
        match self.container {
            Some(container) => {
                attach_children(tree, container, self.generated, &self.style)?;
                Ok(self.output.into_iter().collect())
            }
            None => Ok(self.generated),
        }
    }
}

enum Generated<'s> {
    Boxes(Vec<BoxId>),
    Open(OpenElement<'s>),
}

/// Sibling blocks being stacked top to bottom in one containing block.
struct StackRun {
    flow: Vec<BoxId>,
    next: usize,
    placement: Placement,
    overrides: HashMap<BoxId, f32>,
    resolver: DimensionResolver,
    cursor: f32,
    previous_bottom: Option<f32>,
    /// Block being laid out: id, top edge and bottom margin.
    current: Option<(BoxId, f32, f32)>,
}

impl StackRun {
    fn new(
        tree: &BoxTree,
        ids: &[BoxId],
        placement: Placement,
        overrides: HashMap<BoxId, f32>,
        resolver: DimensionResolver,
    ) -> LayoutResult<Self> {
        let mut flow = Vec::with_capacity(ids.len());
        for &id in ids {
            match &tree.node(id)?.kind {
                // Floats are not positioned separately; their content
                // joins the normal flow.
                BoxKind::Float(_) => flow.extend_from_slice(tree.children(id)),
                _ => flow.push(id),
            }
        }
        Ok(Self::from_flow(flow, placement, overrides, resolver))
    }

    fn from_flow(
        flow: Vec<BoxId>,
        placement: Placement,
        overrides: HashMap<BoxId, f32>,
        resolver: DimensionResolver,
    ) -> Self {
        Self {
            flow,
            next: 0,
            placement,
            overrides,
            resolver,
            cursor: placement.y,
            previous_bottom: None,
            current: None,
        }
    }

    /// The height the stacked boxes occupy, including the outer margins of
    /// the first and last box.
    fn finish(self) -> Stacked {
        Stacked {
            height: clamp_min(
                self.cursor + self.previous_bottom.unwrap_or(0.0) - self.placement.y,
                0.0,
            ),
            flow: self.flow,
            placement: self.placement,
            resolver: self.resolver,
        }
    }
}

/// A finished [`StackRun`].
struct Stacked {
    height: f32,
    flow: Vec<BoxId>,
    placement: Placement,
    resolver: DimensionResolver,
}

impl Stacked {
    /// Pass 2: resolve the percentage heights deferred while stacking and
    /// return a re-stacking of the same boxes with them applied, if any
    /// resolved. A parent whose height comes only from the deferred
    /// children has no basis.
    fn restack(&mut self, explicit_height: Option<f32>) -> Option<StackRun> {
        if self.resolver.pending().is_empty() {
            return None;
        }
        let basis = explicit_height.unwrap_or(self.height);
        let parent = (basis > 0.0).then(|| Size::new(self.placement.containing_width, basis));
        let overrides: HashMap<BoxId, f32> = self
            .resolver
            .resolve_deferred(parent)
            .into_iter()
            .filter(|r| !r.is_fallback())
            .map(|r| (BoxId(r.element().key), r.size().height))
            .collect();
        if overrides.is_empty() {
            return None;
        }
        Some(StackRun::from_flow(
            std::mem::take(&mut self.flow),
            self.placement,
            overrides,
            DimensionResolver::new(Diagnostics::disabled()),
        ))
    }
}

/// Where a block is in its layout.
#[derive(Debug, Clone, Copy)]
enum BlockStep {
    /// Contents still to be laid out. `shrunk` once shrink-to-fit has
    /// narrowed the box.
    Contents { shrunk: bool },
    /// Waiting on the first stacking of the children.
    Stacking { shrunk: bool },
    /// Waiting on the re-stacking with resolved percentage heights.
    Restacking { measured: f32, shrunk: bool },
}

/// A placed block whose height is not yet known.
struct BlockRun {
    id: BoxId,
    is_inline_block: bool,
    explicit_width: Option<f32>,
    explicit_height: Option<f32>,
    width: f32,
    fill: f32,
    frame_w: f32,
    frame_h: f32,
    step: BlockStep,
    #[cfg(feature = "layout-trace")]
    depth: usize,
}

enum LayoutFrame {
    Stack(StackRun),
    Block(BlockRun),
}

enum Contents {
    Measured(f32),
    Stacking(StackRun),
}

/// Builds a laid-out [`BoxTree`] from a [`StyleTree`].
#[derive(Debug)]
pub struct BoxTreeBuilder<'a> {
    measure: MeasurementContext<'a>,
    options: &'a LayoutOptions,
    diagnostics: Diagnostics,
    #[cfg(feature = "layout-trace")]
    depth: Cell<usize>,
}

impl<'a> BoxTreeBuilder<'a> {
    /// A builder using `measure` for text and images.
    #[must_use]
    pub fn new(measure: MeasurementContext<'a>, options: &'a LayoutOptions) -> Self {
        Self {
            measure,
            options,
            diagnostics: Diagnostics::disabled(),
            #[cfg(feature = "layout-trace")]
            depth: Cell::new(0),
        }
    }

    /// Report percentage fallbacks to `diagnostics`.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Generate boxes for `styles` and lay them out on its page.
    ///
    /// Both phases walk the document with explicit work stacks, so deeply
    /// nested documents do not exhaust the call stack.
    ///
    /// # Errors
    ///
    /// Returns [`crate::LayoutError::InvalidGeometry`] if any produced
    /// block ends up with non-finite coordinates or a negative size.
    pub fn build(&self, styles: &StyleTree) -> LayoutResult<BoxTree> {
        let mut tree = BoxTree::new(PageBox {
            size: styles.page_size,
            margin: styles.page_margin,
        });

        let root_style = styles.root.style.clone();
        let generated = self.generate(&mut tree, &styles.root)?;
        let root = match generated.as_slice() {
            [] => None,
            [only] if tree.node(*only)?.as_block().is_some() => Some(*only),
            _ => {
                let anon = new_anonymous_block(&mut tree, &root_style);
                for id in generated {
                    tree.append_child(anon, id)?;
                }
                Some(anon)
            }
        };
        if let Some(root) = root {
            tree.add_root(root)?;
        }

        let page = tree.page;
        let roots = tree.roots().to_vec();
        let placement = Placement {
            x: page.margin.left,
            y: page.margin.top,
            containing_width: page.content_width(),
            containing_height: Some(page.content_height()),
        };
        let resolver = DimensionResolver::new(self.diagnostics.clone());
        let run = StackRun::new(&tree, &roots, placement, HashMap::new(), resolver)?;
        let mut stacked = self.run_layout(&mut tree, run)?;
        // Roots always have a definite basis; anything left is reported.
        let _fallbacks = stacked.resolver.resolve_deferred(None);

        tree.check_geometry()?;
        Ok(tree)
    }

    // ----- generation -----

    /// Boxes generated by `root`, in document order. Block-level and
    /// inline-level boxes may be mixed; the caller wraps as needed.
    fn generate(&self, tree: &mut BoxTree, root: &StyleNode) -> LayoutResult<Vec<BoxId>> {
        let mut out = Vec::new();
        let mut elements: Vec<OpenElement<'_>> = Vec::new();
        match self.open(tree, root, &ComputedStyle::default())? {
            Generated::Boxes(ids) => out.extend(ids),
            Generated::Open(element) => elements.push(element),
        }

        while let Some(element) = elements.last_mut() {
            let node = element.node;
            if let Some(child) = node.children.get(element.next) {
                element.next += 1;
                match self.open(tree, child, &element.style)? {
                    Generated::Boxes(ids) => element.generated.extend(ids),
                    Generated::Open(child_element) => elements.push(child_element),
                }
                continue;
            }
            let Some(done) = elements.pop() else { break };
            let ids = done.close(tree)?;
            match elements.last_mut() {
                Some(parent) => parent.generated.extend(ids),
                None => out.extend(ids),
            }
        }
        Ok(out)
    }

    /// Generate `node` itself. Leaves come back finished; elements whose
    /// children still have to be generated come back open.
    fn open<'s>(
        &self,
        tree: &mut BoxTree,
        node: &'s StyleNode,
        parent_style: &ComputedStyle,
    ) -> LayoutResult<Generated<'s>> {
        let Some(tag) = node.tag.as_deref() else {
            return Ok(Generated::Boxes(
                generate_text(tree, node, parent_style).into_iter().collect(),
            ));
        };

        let style = node.style.clone().inherit_from(parent_style);
        let display = style
            .display
            .unwrap_or_else(|| default_display_for_element(tag));
        if display == Display::None {
            return Ok(Generated::Boxes(Vec::new()));
        }
        let source = Some(SourceIdentity {
            tag: Some(tag.to_string()),
            id: node.id.clone(),
            classes: node.classes.clone(),
        });

        if let Some(direction) = style.float {
            let float = tree.alloc(DisplayNode::new(
                Role::Float,
                BoxKind::Float(FloatBox { direction }),
                style.clone(),
                source.clone(),
            ));
            let inner = ComputedStyle {
                float: None,
                ..style
            };
            let block = self.alloc_block(tree, &inner, Display::Block, source);
            tree.append_child(float, block)?;
            return Ok(Generated::Open(OpenElement::new(
                node,
                inner,
                Some(block),
                Some(float),
            )));
        }

        match tag {
            "hr" => return Ok(Generated::Boxes(vec![self.generate_rule(tree, style, source)?])),
            "img" => {
                return Ok(Generated::Boxes(vec![
                    self.generate_image(tree, node, style, source)?,
                ]));
            }
            _ => {}
        }

        if display == Display::Inline {
            // An inline containing block-level descendants is split: its
            // children are generated in place.
            if has_block_descendant(node) {
                return Ok(Generated::Open(OpenElement::new(node, style, None, None)));
            }
            return Ok(Generated::Boxes(
                generate_inline(tree, node, style, source).into_iter().collect(),
            ));
        }
        let block = self.alloc_block(tree, &style, display, source);
        Ok(Generated::Open(OpenElement::new(
            node,
            style,
            Some(block),
            Some(block),
        )))
    }

    /// A childless block box for an element with `display`.
    fn alloc_block(
        &self,
        tree: &mut BoxTree,
        style: &ComputedStyle,
        display: Display,
        source: Option<SourceIdentity>,
    ) -> BoxId {
        let role = match display {
            Display::InlineBlock => Role::InlineBlock,
            Display::ListItem => Role::ListItem,
            Display::Table => Role::Table,
            Display::TableRow => Role::TableRow,
            Display::TableCell => Role::TableCell,
            Display::Block | Display::Inline | Display::None => Role::Block,
        };
        let block = BlockBox {
            text_align: style.text_align.unwrap_or_default(),
            marker_offset: if role == Role::ListItem {
                self.options.marker_indent
            } else {
                0.0
            },
            is_inline_block_context: role == Role::InlineBlock,
            ..BlockBox::default()
        };
        tree.alloc(DisplayNode::new(
            role,
            BoxKind::Block(block),
            style.clone(),
            source,
        ))
    }

    /// `<hr>`: a block carrying the element's box properties around a rule
    /// whose thickness is the top border width.
    fn generate_rule(
        &self,
        tree: &mut BoxTree,
        style: ComputedStyle,
        source: Option<SourceIdentity>,
    ) -> LayoutResult<BoxId> {
        let wrapper = tree.alloc(DisplayNode::new(
            Role::Block,
            BoxKind::Block(BlockBox {
                text_align: style.text_align.unwrap_or_default(),
                ..BlockBox::default()
            }),
            without_box_decorations(&style),
            source.clone(),
        ));
        let thickness = match style.border_widths().top {
            t if t > 0.0 => t,
            _ => self.options.rule_thickness,
        };
        let rule = tree.alloc(DisplayNode::new(
            Role::Block,
            BoxKind::Replaced(ReplacedBox {
                kind: ReplacedKind::Rule,
                width: 0.0,
                height: thickness,
            }),
            style,
            source,
        ));
        tree.append_child(wrapper, rule)?;
        Ok(wrapper)
    }

    /// `<img>`: a block around the image, sized from authored pixel
    /// attributes, else the provider's intrinsic size.
    fn generate_image(
        &self,
        tree: &mut BoxTree,
        node: &StyleNode,
        style: ComputedStyle,
        source: Option<SourceIdentity>,
    ) -> LayoutResult<BoxId> {
        let src = node.attribute("src").unwrap_or_default().to_string();
        let authored_width = parse_pixels(node.attribute("width"));
        let authored_height = parse_pixels(node.attribute("height"));
        let (width, height) = self.image_size(&src, authored_width, authored_height);

        let extra_w = style.padding(0.0).horizontal() + style.border_widths().horizontal();
        let extra_h = style.padding(0.0).vertical() + style.border_widths().vertical();

        let wrapper = tree.alloc(DisplayNode::new(
            Role::Block,
            BoxKind::Block(BlockBox {
                text_align: style.text_align.unwrap_or_default(),
                ..BlockBox::default()
            }),
            without_box_decorations(&style),
            source.clone(),
        ));
        let image = tree.alloc(DisplayNode::new(
            Role::Inline,
            BoxKind::Replaced(ReplacedBox {
                kind: ReplacedKind::Image {
                    src,
                    authored_width,
                    authored_height,
                },
                width: width + extra_w,
                height: height + extra_h,
            }),
            style,
            source,
        ));
        tree.append_child(wrapper, image)?;
        Ok(wrapper)
    }

    /// [§ 10.3.2 Inline, replaced elements](https://www.w3.org/TR/CSS2/visudet.html#inline-replaced-width)
    ///
    /// "If 'height' and 'width' both have computed values of 'auto' and the
    /// element also has an intrinsic width, then that intrinsic width is
    /// the used value of 'width'." A single authored axis keeps the
    /// intrinsic ratio.
    fn image_size(
        &self,
        src: &str,
        authored_width: Option<u32>,
        authored_height: Option<u32>,
    ) -> (f32, f32) {
        let intrinsic = if src.is_empty() {
            None
        } else {
            let loaded = self.measure.load_image(src);
            if loaded.status == ImageStatus::Missing {
                self.diagnostics.warn_once(
                    "image",
                    &format!("missing image '{src}', laying out at authored size"),
                );
            }
            loaded.intrinsic_size
        };
        let px = |v: u32| v as f32 * PX_TO_PT;
        match (authored_width, authored_height, intrinsic) {
            (Some(w), Some(h), _) => (px(w), px(h)),
            (Some(w), None, Some((iw, ih))) if iw > 0 => (px(w), px(w) * ih as f32 / iw as f32),
            (None, Some(h), Some((iw, ih))) if ih > 0 => (px(h) * iw as f32 / ih as f32, px(h)),
            (Some(w), None, _) => (px(w), 0.0),
            (None, Some(h), _) => (0.0, px(h)),
            (None, None, Some((iw, ih))) => (px(iw), px(ih)),
            (None, None, None) => (0.0, 0.0),
        }
    }

    // ----- layout -----

    /// Lay out everything `root` stacks, depth first.
    ///
    /// The innermost frame is resumed until it either spawns a frame for
    /// its children or finishes. A finished stacking hands its result to
    /// the block below it; a finished block has already written its height
    /// into the tree.
    fn run_layout(&self, tree: &mut BoxTree, mut root: StackRun) -> LayoutResult<Stacked> {
        let mut frames: Vec<LayoutFrame> = Vec::new();
        let mut returned: Option<Stacked> = None;
        loop {
            let spawned = match frames.last_mut() {
                Some(LayoutFrame::Block(run)) => self.resume_block(tree, run, returned.take())?,
                Some(LayoutFrame::Stack(run)) => self.resume_stack(tree, run)?,
                None => self.resume_stack(tree, &mut root)?,
            };
            if let Some(frame) = spawned {
                frames.push(frame);
                continue;
            }
            match frames.pop() {
                Some(LayoutFrame::Stack(run)) => returned = Some(run.finish()),
                Some(LayoutFrame::Block(_)) => {}
                None => return Ok(root.finish()),
            }
        }
    }

    /// Place the next block of `run` below the previous one, with adjoining
    /// margins collapsed. Returns the frame that lays it out, or `None`
    /// once every box is placed.
    fn resume_stack(&self, tree: &mut BoxTree, run: &mut StackRun) -> LayoutResult<Option<LayoutFrame>> {
        if let Some((id, y, margin_bottom)) = run.current.take() {
            run.cursor = y + tree.block(id)?.height;
            run.previous_bottom = Some(margin_bottom);
        }
        while let Some(&id) = run.flow.get(run.next) {
            run.next += 1;
            if tree.node(id)?.as_block().is_none() {
                continue;
            }
            let margin = tree.node(id)?.style.margin(run.placement.containing_width);
            let gap = run.previous_bottom.map_or(margin.top, |bottom| {
                collapse_two_margins(bottom, margin.top)
            });
            let y = run.cursor + gap;
            run.current = Some((id, y, margin.bottom));
            let block = self.begin_block(
                tree,
                id,
                Placement { y, ..run.placement },
                run.overrides.get(&id).copied(),
                &mut run.resolver,
            )?;
            return Ok(Some(LayoutFrame::Block(block)));
        }
        Ok(None)
    }

    /// [§ 10.3.3 Block-level, non-replaced elements in normal flow](https://www.w3.org/TR/CSS2/visudet.html#blockwidth)
    ///
    /// Position block `id` and fix its width. The height follows once the
    /// contents are laid out.
    fn begin_block(
        &self,
        tree: &mut BoxTree,
        id: BoxId,
        placement: Placement,
        height_override: Option<f32>,
        resolver: &mut DimensionResolver,
    ) -> LayoutResult<BlockRun> {
        #[cfg(feature = "layout-trace")]
        let depth = {
            let depth = self.depth.get();
            self.depth.set(depth + 1);
            eprintln!(
                "{:indent$}[BLOCK] {} at ({}, {}) cb_width={}",
                "",
                tree.path_to(id),
                placement.x,
                placement.y,
                placement.containing_width,
                indent = depth * 2
            );
            depth
        };

        let node = tree.node(id)?;
        let style = node.style.clone();
        let is_inline_block = node.as_block().is_some_and(|b| b.is_inline_block_context);

        let basis = placement.containing_width;
        let margin = style.margin(basis);
        let padding = style.padding(basis);
        let border = style.border_widths();
        let frame_w = padding.horizontal() + border.horizontal();
        let frame_h = padding.vertical() + border.vertical();

        // STEP 1: width.
        let fill = clamp_min(basis - margin.horizontal(), 0.0);
        let explicit_width = match style.width {
            Some(LengthValue::Pt(w)) => Some(clamp_min(w, 0.0) + frame_w),
            Some(LengthValue::Percent(pct)) => {
                let identity = ElementIdentity::new(id.0, tree.path_to(id));
                let request = RequestedDimension::percentage(identity, Some(pct), None)?
                    .with_source(format!("width: {pct}%"));
                let parent = Size::new(basis, placement.containing_height.unwrap_or(0.0));
                let resolved = resolver.first_pass(request, Some(parent));
                Some(resolved.size().width + frame_w)
            }
            None => None,
        };
        let width = explicit_width.unwrap_or(fill);

        // STEP 2: explicit height, if resolvable now.
        let explicit_height = match (height_override, style.height) {
            (Some(h), _) => Some(h),
            (None, Some(LengthValue::Pt(h))) => Some(clamp_min(h, 0.0)),
            (None, Some(LengthValue::Percent(pct))) => {
                let identity = ElementIdentity::new(id.0, tree.path_to(id));
                let request = RequestedDimension::percentage(identity, None, Some(pct))?
                    .with_source(format!("height: {pct}%"));
                let parent = placement
                    .containing_height
                    .map(|h| Size::new(basis, h));
                let resolved = resolver.first_pass(request, parent);
                (!resolved.is_fallback()).then(|| resolved.size().height)
            }
            (None, None) => None,
        };

        {
            let block = tree.block_mut(id)?;
            block.x = placement.x + margin.left;
            block.y = placement.y;
            block.width = width;
            block.margin = margin;
            block.padding = padding;
        }

        Ok(BlockRun {
            id,
            is_inline_block,
            explicit_width,
            explicit_height,
            width,
            fill,
            frame_w,
            frame_h,
            step: BlockStep::Contents { shrunk: false },
            #[cfg(feature = "layout-trace")]
            depth,
        })
    }

    /// [§ 10.6.3 Block-level non-replaced elements in normal flow](https://www.w3.org/TR/CSS2/visudet.html#normal-block)
    ///
    /// Advance `run` until its children need stacking, returning that
    /// stacking, or until its height is set.
    fn resume_block(
        &self,
        tree: &mut BoxTree,
        run: &mut BlockRun,
        mut returned: Option<Stacked>,
    ) -> LayoutResult<Option<LayoutFrame>> {
        loop {
            // STEP 3: children.
            let (content_height, shrunk) = match run.step {
                BlockStep::Contents { shrunk } => {
                    match self.begin_contents(tree, run.id, run.explicit_height)? {
                        Contents::Measured(height) => (height, shrunk),
                        Contents::Stacking(stack) => {
                            run.step = BlockStep::Stacking { shrunk };
                            return Ok(Some(LayoutFrame::Stack(stack)));
                        }
                    }
                }
                BlockStep::Stacking { shrunk } => {
                    let mut stacked = returned.take().ok_or_else(|| {
                        LayoutError::invalid_argument(format!(
                            "{} resumed before its children were stacked",
                            run.id
                        ))
                    })?;
                    match stacked.restack(run.explicit_height) {
                        Some(restack) => {
                            run.step = BlockStep::Restacking {
                                measured: stacked.height,
                                shrunk,
                            };
                            return Ok(Some(LayoutFrame::Stack(restack)));
                        }
                        None => (stacked.height, shrunk),
                    }
                }
                // The block's own height keeps the first measurement.
                BlockStep::Restacking { measured, shrunk } => (measured, shrunk),
            };

            // STEP 4: shrink-to-fit for inline-blocks with auto width.
            if run.is_inline_block && run.explicit_width.is_none() && !shrunk {
                let preferred = widest_line(tree, run.id)? + run.frame_w;
                tree.block_mut(run.id)?.width = preferred;
                let request = BlockFormattingRequest::new(
                    FormattingContextKind::InlineBlock,
                    run.id,
                    run.fill,
                )?;
                let narrowed = format(tree, &request)?.total_width;
                if narrowed < run.width {
                    tree.block_mut(run.id)?.width = narrowed;
                    run.step = BlockStep::Contents { shrunk: true };
                    continue;
                }
                tree.block_mut(run.id)?.width = run.width;
            }

            // STEP 5: height.
            let height = run.explicit_height.unwrap_or(content_height) + run.frame_h;
            tree.block_mut(run.id)?.height = height;

            #[cfg(feature = "layout-trace")]
            {
                eprintln!(
                    "{:indent$}[BLOCK] {} -> {}x{}",
                    "",
                    tree.path_to(run.id),
                    tree.block(run.id)?.width,
                    height,
                    indent = run.depth * 2
                );
                self.depth.set(run.depth);
            }
            return Ok(None);
        }
    }

    /// Start laying out the children of block `id` inside its content box.
    /// Inline content is measured at once; block children are stacked.
    fn begin_contents(
        &self,
        tree: &mut BoxTree,
        id: BoxId,
        explicit_height: Option<f32>,
    ) -> LayoutResult<Contents> {
        let node = tree.node(id)?;
        let children = node.children().to_vec();
        if children.is_empty() {
            return Ok(Contents::Measured(0.0));
        }
        let block = tree.block(id)?;
        let border = node.style.border_widths();
        let content_x = block.x + border.left + block.padding.left;
        let content_y = block.y + border.top + block.padding.top;
        let content_width = clamp_min(
            block.width - block.padding.horizontal() - border.horizontal(),
            0.0,
        );

        let all_inline = children.iter().all(|&c| {
            tree.get(c)
                .is_some_and(|n| !matches!(n.kind, BoxKind::Block(_) | BoxKind::Float(_)))
        });
        if all_inline {
            return self
                .measure_inline_children(tree, &children, content_width)
                .map(Contents::Measured);
        }

        let placement = Placement {
            x: content_x,
            y: content_y,
            containing_width: content_width,
            containing_height: explicit_height,
        };
        let resolver = DimensionResolver::new(self.diagnostics.clone());
        StackRun::new(tree, &children, placement, HashMap::new(), resolver).map(Contents::Stacking)
    }

    /// Measure inline and replaced children and return the line height.
    ///
    /// [§ 10.8 Line height calculations](https://www.w3.org/TR/CSS2/visudet.html#line-height)
    fn measure_inline_children(
        &self,
        tree: &mut BoxTree,
        children: &[BoxId],
        content_width: f32,
    ) -> LayoutResult<f32> {
        let mut tallest: f32 = 0.0;
        for &child in children {
            let node = tree.node_mut(child)?;
            let (font, size) = self.measure.font_for(&node.style);
            match &mut node.kind {
                BoxKind::Inline(inline) => {
                    let Some(text) = inline.visible_text() else { continue };
                    let metrics = self.measure.text.metrics(&font, size);
                    inline.width = self.measure.text.measure_width(&font, size, text);
                    inline.height = self.measure.line_height.line_height(&metrics);
                    inline.baseline_offset = metrics.ascent;
                    tallest = tallest.max(inline.height);
                }
                BoxKind::Replaced(replaced) => {
                    if replaced.kind == ReplacedKind::Rule {
                        replaced.width = content_width;
                    }
                    tallest = tallest.max(replaced.height);
                }
                BoxKind::Block(_) | BoxKind::Float(_) => {}
            }
        }
        Ok(tallest)
    }
}

fn generate_text(
    tree: &mut BoxTree,
    node: &StyleNode,
    parent_style: &ComputedStyle,
) -> Option<BoxId> {
    let text = collapse_whitespace(node.text.as_deref()?);
    if text.is_empty() {
        return None;
    }
    let style = node.style.clone().inherit_from(&parent_style.inherited());
    Some(tree.alloc(DisplayNode::new(
        Role::Inline,
        BoxKind::Inline(InlineBox {
            text: Some(text),
            ..InlineBox::default()
        }),
        style,
        None,
    )))
}

/// [§ 9.2.2 Inline-level elements and inline boxes](https://www.w3.org/TR/CSS2/visuren.html#inline-boxes)
///
/// An inline element whose subtree is all inline becomes one
/// [`InlineBox`] with its collapsed text.
fn generate_inline(
    tree: &mut BoxTree,
    node: &StyleNode,
    style: ComputedStyle,
    source: Option<SourceIdentity>,
) -> Option<BoxId> {
    let text = collapse_whitespace(&node.text_content());
    if text.is_empty() {
        return None;
    }
    Some(tree.alloc(DisplayNode::new(
        Role::Inline,
        BoxKind::Inline(InlineBox {
            text: Some(text),
            ..InlineBox::default()
        }),
        style,
        source,
    )))
}

/// [§ 9.2.1.1 Anonymous block boxes](https://www.w3.org/TR/CSS2/visuren.html#anonymous-block-level)
///
/// "If a block container box has a block-level box inside it, then we
/// force it to have only block-level boxes inside it." Consecutive
/// inline boxes are wrapped in one anonymous block each run.
fn attach_children(
    tree: &mut BoxTree,
    parent: BoxId,
    children: Vec<BoxId>,
    style: &ComputedStyle,
) -> LayoutResult<()> {
    let mut inline_count = 0;
    for &child in &children {
        if tree.node(child)?.is_inline_level() {
            inline_count += 1;
        }
    }
    if inline_count == 0 || inline_count == children.len() {
        for child in children {
            tree.append_child(parent, child)?;
        }
        return Ok(());
    }

    let mut run: Option<BoxId> = None;
    for child in children {
        if tree.node(child)?.is_inline_level() {
            let anon = match run {
                Some(anon) => anon,
                None => {
                    let anon = new_anonymous_block(tree, style);
                    tree.append_child(parent, anon)?;
                    run = Some(anon);
                    anon
                }
            };
            tree.append_child(anon, child)?;
        } else {
            run = None;
            tree.append_child(parent, child)?;
        }
    }
    Ok(())
}

/// Total advance of the direct inline children of `id`, for
/// shrink-to-fit.
fn widest_line(tree: &BoxTree, id: BoxId) -> LayoutResult<f32> {
    let mut line: f32 = 0.0;
    for &child in tree.children(id) {
        match &tree.node(child)?.kind {
            BoxKind::Inline(inline) => line += inline.width,
            BoxKind::Replaced(replaced) => line = line.max(replaced.width),
            BoxKind::Block(_) | BoxKind::Float(_) => {}
        }
    }
    Ok(line)
}

fn new_anonymous_block(tree: &mut BoxTree, parent_style: &ComputedStyle) -> BoxId {
    let style = parent_style.inherited();
    tree.alloc(DisplayNode::new(
        Role::Block,
        BoxKind::Block(BlockBox {
            text_align: style.text_align.unwrap_or_default(),
            is_anonymous: true,
            ..BlockBox::default()
        }),
        style,
        None,
    ))
}

/// Style for the block around a replaced element: margins stay, the
/// element's own size, padding and borders move to the replaced box.
fn without_box_decorations(style: &ComputedStyle) -> ComputedStyle {
    ComputedStyle {
        width: None,
        height: None,
        padding_top: None,
        padding_right: None,
        padding_bottom: None,
        padding_left: None,
        border_top: None,
        border_right: None,
        border_bottom: None,
        border_left: None,
        background_color: None,
        ..style.clone()
    }
}

fn has_block_descendant(node: &StyleNode) -> bool {
    let mut pending: Vec<&StyleNode> = node.children.iter().collect();
    while let Some(child) = pending.pop() {
        if let Some(tag) = child.tag.as_deref() {
            let display = child
                .style
                .display
                .unwrap_or_else(|| default_display_for_element(tag));
            if !matches!(display, Display::Inline | Display::None) || matches!(tag, "hr" | "img") {
                return true;
            }
        }
        pending.extend(&child.children);
    }
    false
}

/// Parse an HTML dimension attribute such as `"120"` or `"120px"`.
fn parse_pixels(value: Option<&str>) -> Option<u32> {
    let value = value?.trim();
    value.strip_suffix("px").unwrap_or(value).trim().parse().ok()
}
