//! The four standard fragment stages.

use super::pipeline::{BuildContext, FragmentStage};
use super::{
    BlockFragment, Fragment, FragmentForest, FragmentId, FragmentInfo, FragmentStyle,
    ImageFragment, LineBoxFragment, RuleFragment, TextRun,
};
use crate::box_tree::{BlockBox, BoxId, BoxKind, DisplayNode, ReplacedKind};
use crate::error::{LayoutError, LayoutResult, ensure_metric};
use crate::geometry::{Point, Rect, clamp_min};
use crate::measure::{FontKey, ImageStatus};

/// Content-box origin and width of a block, in page coordinates.
fn content_box(node: &DisplayNode, block: &BlockBox, offset: f32) -> (f32, f32, f32) {
    let border = node.style.border_widths();
    (
        block.x + border.left + block.padding.left,
        block.y + offset + border.top + block.padding.top,
        clamp_min(
            block.width - border.horizontal() - block.padding.horizontal(),
            0.0,
        ),
    )
}

/// Block fragments for every block box, depth-first.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockStage;

impl FragmentStage for BlockStage {
    fn name(&self) -> &'static str {
        "block"
    }

    fn run(&self, ctx: &mut BuildContext<'_>) -> LayoutResult<usize> {
        let tree = ctx.tree;
        let mut produced = 0;
        for id in tree.preorder_all() {
            let node = tree.node(id)?;
            let Some(block) = node.as_block() else { continue };
            let placement = ctx.placement(id);
            let info = FragmentInfo {
                id: ctx.allocate_id(),
                rect: Rect::new(block.x, block.y + placement.offset, block.width, block.height)?,
                page: placement.page,
                z_order: ctx.z_order(id),
                style: FragmentStyle::from_computed(&node.style),
            };
            let _previous = ctx.box_fragments.insert(id, info.id);
            let _replaced = ctx.blocks.insert(
                id,
                BlockFragment {
                    info,
                    children: Vec::new(),
                },
            );
            produced += 1;
        }
        Ok(produced)
    }
}

/// One line box with one text run per inline box.
///
/// [§ 9.4.2 Inline formatting contexts](https://www.w3.org/TR/CSS2/visuren.html#inline-formatting)
///
/// Each line box sits at the top of its block with its baseline one ascent
/// below the block's y. Runs of one block follow each other horizontally,
/// offset by `text-align` and the list marker indent.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineStage;

struct MeasuredRun {
    source: BoxId,
    run: TextRun,
    line_height: f32,
}

impl FragmentStage for InlineStage {
    fn name(&self) -> &'static str {
        "inline"
    }

    fn run(&self, ctx: &mut BuildContext<'_>) -> LayoutResult<usize> {
        let tree = ctx.tree;
        let mut produced = 0;
        for id in tree.preorder_all() {
            let node = tree.node(id)?;
            let Some(block) = node.as_block() else { continue };

            let mut runs = Vec::new();
            for &child in node.children() {
                let child_node = tree.node(child)?;
                let BoxKind::Inline(inline) = &child_node.kind else { continue };
                let Some(text) = inline.visible_text() else { continue };

                let (key, size) = ctx.measure.font_for(&child_node.style);
                let metrics = ctx.measure.text.metrics(&key, size);
                let advance = ctx.measure.text.measure_width(&key, size, text);
                let resolved = ctx.measure.fonts.resolve(&key);
                runs.push(MeasuredRun {
                    source: child,
                    line_height: ensure_metric(
                        "line height",
                        ctx.measure.line_height.line_height(&metrics),
                    )?,
                    run: TextRun {
                        text: text.to_string(),
                        font: FontKey {
                            family: resolved.family,
                            weight: resolved.weight,
                            style: resolved.style,
                        },
                        font_size: size,
                        origin: Point::default(),
                        advance: ensure_metric("advance", advance)?,
                        ascent: ensure_metric("ascent", metrics.ascent)?,
                        descent: ensure_metric("descent", metrics.descent)?,
                        decoration: child_node.style.text_decoration.unwrap_or_default(),
                        color: child_node.style.color,
                    },
                });
            }
            if runs.is_empty() {
                continue;
            }

            let placement = ctx.placement(id);
            let (content_x, _, content_width) = content_box(node, block, placement.offset);
            let top = block.y + placement.offset;
            let line_width = clamp_min(content_width - block.marker_offset, 0.0);
            let total: f32 = runs.iter().map(|r| r.run.advance).sum();
            let mut x = content_x + block.marker_offset + block.text_align.offset(line_width, total);

            for MeasuredRun {
                source,
                mut run,
                line_height,
            } in runs
            {
                let baseline_y = top + run.ascent;
                run.origin = Point { x, y: baseline_y };
                let info = FragmentInfo {
                    id: ctx.allocate_id(),
                    rect: Rect::new(x, top, run.advance, line_height)?,
                    page: placement.page,
                    z_order: ctx.z_order(source),
                    style: FragmentStyle::from_computed(&tree.node(source)?.style),
                };
                x += run.advance;
                ctx.attach(
                    source,
                    Fragment::LineBox(LineBoxFragment {
                        info,
                        baseline_y,
                        line_height,
                        runs: vec![run],
                    }),
                )?;
                produced += 1;
            }
        }
        Ok(produced)
    }
}

/// Rules and images.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpecializedStage;

impl FragmentStage for SpecializedStage {
    fn name(&self) -> &'static str {
        "specialized"
    }

    fn run(&self, ctx: &mut BuildContext<'_>) -> LayoutResult<usize> {
        let tree = ctx.tree;
        let mut produced = 0;
        for id in tree.preorder_all() {
            let node = tree.node(id)?;
            let Some(block) = node.as_block() else { continue };
            let placement = ctx.placement(id);
            let (content_x, content_y, _) = content_box(node, block, placement.offset);

            for &child in node.children() {
                let child_node = tree.node(child)?;
                let BoxKind::Replaced(replaced) = &child_node.kind else { continue };
                let info = |ctx: &mut BuildContext<'_>, rect: Rect| FragmentInfo {
                    id: ctx.allocate_id(),
                    rect,
                    page: placement.page,
                    z_order: ctx.z_order(child),
                    style: FragmentStyle::from_computed(&child_node.style),
                };
                let fragment = match &replaced.kind {
                    ReplacedKind::Rule => {
                        // Centered on the containing block's vertical midline.
                        let mid = block.y + placement.offset + block.height / 2.0;
                        let rect = Rect::new(
                            content_x,
                            mid - replaced.height / 2.0,
                            replaced.width,
                            replaced.height,
                        )?;
                        // The border width became the thickness; paint it as a fill.
                        let mut info = info(ctx, rect);
                        let line = info.style.border_top.map(|edge| edge.color);
                        info.style.border_top = None;
                        info.style.border_right = None;
                        info.style.border_bottom = None;
                        info.style.border_left = None;
                        info.style.background = info.style.background.or(line);
                        Fragment::Rule(RuleFragment { info })
                    }
                    ReplacedKind::Image {
                        src,
                        authored_width,
                        authored_height,
                    } => {
                        let loaded = ctx.measure.load_image(src);
                        // Missing images were reported while sizing the box.
                        if loaded.status == ImageStatus::Oversize {
                            ctx.diagnostics.warn_once(
                                "image",
                                &format!(
                                    "image '{src}' exceeds {} bytes, not drawn",
                                    ctx.measure.max_bytes
                                ),
                            );
                        }
                        let rect = Rect::new(content_x, content_y, replaced.width, replaced.height)?;
                        let frame = child_node
                            .style
                            .padding(0.0)
                            .plus(&child_node.style.border_widths());
                        Fragment::Image(ImageFragment {
                            info: info(ctx, rect),
                            src: src.clone(),
                            content_rect: rect.inset(&frame)?,
                            authored_size: (*authored_width, *authored_height),
                            intrinsic_size: loaded.intrinsic_size,
                            is_missing: loaded.status == ImageStatus::Missing,
                            is_oversize: loaded.status == ImageStatus::Oversize,
                        })
                    }
                };
                ctx.attach(child, fragment)?;
                produced += 1;
            }
        }
        Ok(produced)
    }
}

/// Assembles the hierarchy and flattens it into paint order.
///
/// [CSS 2.1 Appendix E.2 Painting order](https://www.w3.org/TR/CSS2/zindex.html#painting-order)
///
/// The flattened list holds every fragment exactly once, stable-sorted
/// ascending by z-order so ties keep document order.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZOrderStage;

impl FragmentStage for ZOrderStage {
    fn name(&self) -> &'static str {
        "z-order"
    }

    fn run(&self, ctx: &mut BuildContext<'_>) -> LayoutResult<usize> {
        let tree = ctx.tree;
        let mut roots = Vec::new();

        // Children before parents, so every child block is complete when
        // its owner is assembled.
        let order: Vec<BoxId> = tree
            .preorder_all()
            .into_iter()
            .filter(|&id| ctx.is_block(id))
            .collect();
        for &id in order.iter().rev() {
            let mut fragment = ctx.blocks.remove(&id).ok_or_else(|| {
                LayoutError::invalid_argument(format!("block {id} has no fragment"))
            })?;
            let mut children = ctx.attachments.remove(&id).unwrap_or_default();
            children.sort_by_key(|(slot, f)| (*slot, f.id()));
            fragment.children = children.into_iter().map(|(_, f)| f).collect();

            match ctx.owner_slot(id) {
                Some((owner, slot)) => ctx
                    .attachments
                    .entry(owner)
                    .or_default()
                    .push((slot, Fragment::Block(fragment))),
                None => roots.push(Fragment::Block(fragment)),
            }
        }
        roots.reverse();

        let mut keyed: Vec<(i32, FragmentId)> = Vec::new();
        for root in &roots {
            root.walk(&mut |f| keyed.push((f.info().z_order, f.id())));
        }
        keyed.sort_by_key(|&(z, _)| z);
        let paint_order: Vec<FragmentId> = keyed.into_iter().map(|(_, id)| id).collect();
        let produced = paint_order.len();

        ctx.forest = Some(FragmentForest::new(
            roots,
            paint_order,
            std::mem::take(&mut ctx.box_fragments),
        ));
        Ok(produced)
    }
}
