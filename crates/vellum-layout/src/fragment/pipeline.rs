//! The staged fragment builder.
//!
//! Stages run in a fixed order over one shared [`BuildContext`]. Each stage
//! reads the immutable box tree, allocates fragment ids and records what it
//! produced; the last stage assembles the forest. A failing stage aborts
//! the whole build, so no partial forest is ever returned.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use vellum_common::{Category, DiagnosticEvent, Diagnostics};

use super::stages::{BlockStage, InlineStage, SpecializedStage, ZOrderStage};
use super::{BlockFragment, Fragment, FragmentForest, FragmentId};
use crate::box_tree::{BoxId, BoxTree};
use crate::error::{LayoutError, LayoutResult};
use crate::measure::MeasurementContext;

/// Where a root block and its subtree land.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PagePlacement {
    /// 1-based page number.
    pub page: u32,
    /// Vertical shift from document to page coordinates.
    pub offset: f32,
}

/// Shared state threaded through every stage.
pub struct BuildContext<'a> {
    pub(crate) tree: &'a BoxTree,
    pub(crate) measure: MeasurementContext<'a>,
    next_id: u32,
    /// Block fragments by box, children not yet attached.
    pub(crate) blocks: BTreeMap<BoxId, BlockFragment>,
    /// Leaf fragments per owning block, keyed by child slot.
    pub(crate) attachments: BTreeMap<BoxId, Vec<(usize, Fragment)>>,
    pub(crate) box_fragments: HashMap<BoxId, FragmentId>,
    placements: HashMap<BoxId, PagePlacement>,
    /// Where recoverable conditions are reported.
    pub(crate) diagnostics: Diagnostics,
    pub(crate) forest: Option<FragmentForest>,
}

impl fmt::Debug for BuildContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("next_id", &self.next_id)
            .field("blocks", &self.blocks.len())
            .field("assembled", &self.forest.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a> BuildContext<'a> {
    /// A fresh context. Each root is assigned a page from its top edge.
    ///
    /// [§ 3 Page model](https://www.w3.org/TR/css-page-3/#page-model)
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidGeometry`] if a root has a non-finite
    /// position.
    pub fn new(tree: &'a BoxTree, measure: MeasurementContext<'a>) -> LayoutResult<Self> {
        let content_height = tree.page.content_height();
        let mut placements = HashMap::new();
        for &root in tree.roots() {
            let top = tree.block(root)?.y - tree.page.margin.top;
            if !top.is_finite() {
                return Err(LayoutError::invalid_geometry(format!(
                    "root {} has non-finite top {top}",
                    tree.path_to(root)
                )));
            }
            let index = if content_height > 0.0 {
                (top / content_height).floor().max(0.0)
            } else {
                0.0
            };
            let placement = PagePlacement {
                page: 1 + index as u32,
                offset: -index * content_height,
            };
            for id in tree.preorder(root) {
                let _previous = placements.insert(id, placement);
            }
        }
        Ok(Self {
            tree,
            measure,
            next_id: 0,
            blocks: BTreeMap::new(),
            attachments: BTreeMap::new(),
            box_fragments: HashMap::new(),
            placements,
            diagnostics: Diagnostics::disabled(),
            forest: None,
        })
    }

    /// Report warnings through `diagnostics`.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// The box tree being converted.
    #[must_use]
    pub const fn tree(&self) -> &'a BoxTree {
        self.tree
    }

    /// Measurement collaborators.
    #[must_use]
    pub const fn measure(&self) -> &MeasurementContext<'a> {
        &self.measure
    }

    /// Allocate the next fragment id. The first id is 1.
    pub fn allocate_id(&mut self) -> FragmentId {
        self.next_id += 1;
        FragmentId(self.next_id)
    }

    /// Number of ids allocated so far.
    #[must_use]
    pub const fn allocated(&self) -> u32 {
        self.next_id
    }

    /// Attach a leaf fragment produced for box `source` to its owning block.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidArgument`] if `source` has no block
    /// ancestor.
    pub fn attach(&mut self, source: BoxId, fragment: Fragment) -> LayoutResult<()> {
        let (owner, slot) = self.owner_slot(source).ok_or_else(|| {
            LayoutError::invalid_argument(format!("{source} has no containing block"))
        })?;
        let _previous = self.box_fragments.insert(source, fragment.id());
        self.attachments
            .entry(owner)
            .or_default()
            .push((slot, fragment));
        Ok(())
    }

    /// Page and vertical offset of `id`.
    pub(crate) fn placement(&self, id: BoxId) -> PagePlacement {
        self.placements
            .get(&id)
            .copied()
            .unwrap_or(PagePlacement {
                page: 1,
                offset: 0.0,
            })
    }

    /// [§ 9.9.1 'z-index'](https://www.w3.org/TR/CSS2/visuren.html#z-index)
    ///
    /// The box's own `z-index`, else the nearest ancestor's, else 0.
    pub(crate) fn z_order(&self, id: BoxId) -> i32 {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Some(node) = self.tree.get(node_id) else { break };
            if let Some(z) = node.style.z_index {
                return z;
            }
            current = node.parent();
        }
        0
    }

    /// Nearest block ancestor of `id` and the index, within that block's
    /// children, of the subtree holding `id`.
    pub(crate) fn owner_slot(&self, id: BoxId) -> Option<(BoxId, usize)> {
        let mut child = id;
        let mut current = self.tree.parent(id);
        while let Some(parent) = current {
            let node = self.tree.get(parent)?;
            if node.as_block().is_some() {
                let slot = node.children().iter().position(|&c| c == child)?;
                return Some((parent, slot));
            }
            child = parent;
            current = node.parent();
        }
        None
    }

    /// Whether `id` names a block box.
    pub(crate) fn is_block(&self, id: BoxId) -> bool {
        self.tree.get(id).is_some_and(|n| n.as_block().is_some())
    }
}

/// One step of fragment construction.
pub trait FragmentStage {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Run the stage, returning how many fragments it produced.
    ///
    /// # Errors
    ///
    /// Returns a [`LayoutError`] to abort the build.
    fn run(&self, ctx: &mut BuildContext<'_>) -> LayoutResult<usize>;
}

/// Runs the fragment stages in order.
pub struct FragmentBuilder {
    stages: Vec<Box<dyn FragmentStage>>,
    diagnostics: Diagnostics,
}

impl fmt::Debug for FragmentBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.stages.iter().map(|s| s.name()).collect();
        f.debug_struct("FragmentBuilder")
            .field("stages", &names)
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

impl Default for FragmentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentBuilder {
    /// The standard pipeline: block, inline, specialized, z-order.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stages: vec![
                Box::new(BlockStage),
                Box::new(InlineStage),
                Box::new(SpecializedStage),
                Box::new(ZOrderStage),
            ],
            diagnostics: Diagnostics::disabled(),
        }
    }

    /// Replace the stage list. The last stage must assemble the forest.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<Box<dyn FragmentStage>>) -> Self {
        self.stages = stages;
        self
    }

    /// Emit a `fragment/stage-complete` event after each stage and report
    /// warnings through `diagnostics`.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Convert `tree` into a fragment forest.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidGeometry`] if any fragment rectangle is
    /// invalid, and [`LayoutError::InvalidArgument`] if no stage assembled
    /// the forest.
    pub fn build(
        &self,
        tree: &BoxTree,
        measure: &MeasurementContext<'_>,
    ) -> LayoutResult<FragmentForest> {
        let mut ctx =
            BuildContext::new(tree, *measure)?.with_diagnostics(self.diagnostics.clone());
        for stage in &self.stages {
            let produced = stage.run(&mut ctx)?;
            self.diagnostics.emit(
                DiagnosticEvent::new(Category::Fragment, "stage-complete")
                    .with("stage", stage.name())
                    .with("produced", produced)
                    .with("allocated", ctx.allocated()),
            );
        }
        ctx.forest.take().ok_or_else(|| {
            LayoutError::invalid_argument("fragment pipeline finished without assembling a forest")
        })
    }
}

/// Run the standard pipeline without diagnostics.
///
/// # Errors
///
/// See [`FragmentBuilder::build`].
pub fn build(tree: &BoxTree, measure: &MeasurementContext<'_>) -> LayoutResult<FragmentForest> {
    FragmentBuilder::new().build(tree, measure)
}
