//! The conversion pipeline: styled tree in, pages out.
//!
//! 1. Build and lay out the box tree.
//! 2. Validate its structure.
//! 3. Format each root for the summary.
//! 4. Build fragments.
//! 5. Group root fragments by page.
//!
//! Any failure aborts the whole document; nothing partial is returned.

use anyhow::{Context, Result};
use vellum_common::{Category, DiagnosticEvent, Diagnostics};
use vellum_layout::formatting_context::format;
use vellum_layout::{
    BlockFormattingRequest, BoxTreeBuilder, FontResolver, FormattingContextKind, FragmentBuilder,
    ImageProvider, LayoutOptions, LineHeightStrategy, MeasurementContext, PageContext, StyleTree,
    TextMeasurer, validate_with_diagnostics,
};

use crate::error::ConversionError;
use crate::page::{ConversionSummary, Layout, Page, RootSummary, canvas_background};

/// Measurement collaborators supplied by the host.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    /// Text measurement.
    pub text: &'a dyn TextMeasurer,
    /// Font resolution.
    pub fonts: &'a dyn FontResolver,
    /// Image lookup.
    pub images: &'a dyn ImageProvider,
    /// Line-height policy; ascent plus descent when unset.
    pub line_height: Option<&'a dyn LineHeightStrategy>,
}

impl std::fmt::Debug for Collaborators<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("custom_line_height", &self.line_height.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a> Collaborators<'a> {
    /// Bundle the three required collaborators.
    #[must_use]
    pub const fn new(
        text: &'a dyn TextMeasurer,
        fonts: &'a dyn FontResolver,
        images: &'a dyn ImageProvider,
    ) -> Self {
        Self {
            text,
            fonts,
            images,
            line_height: None,
        }
    }

    /// Use a custom line-height policy.
    #[must_use]
    pub const fn with_line_height(mut self, strategy: &'a dyn LineHeightStrategy) -> Self {
        self.line_height = Some(strategy);
        self
    }

    fn measurement(&self, options: &'a LayoutOptions) -> MeasurementContext<'a> {
        let measure = MeasurementContext::new(self.text, self.fonts, self.images, options);
        match self.line_height {
            Some(strategy) => measure.with_line_height(strategy),
            None => measure,
        }
    }
}

/// Converts style trees to paged layouts with fixed collaborators and
/// options.
#[derive(Debug)]
pub struct DocumentConverter<'a> {
    collaborators: Collaborators<'a>,
    options: &'a LayoutOptions,
    diagnostics: Diagnostics,
}

impl<'a> DocumentConverter<'a> {
    /// A converter with diagnostics disabled.
    #[must_use]
    pub fn new(collaborators: Collaborators<'a>, options: &'a LayoutOptions) -> Self {
        Self {
            collaborators,
            options,
            diagnostics: Diagnostics::disabled(),
        }
    }

    /// Send diagnostics events to `diagnostics`.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Convert one document.
    ///
    /// # Errors
    ///
    /// Fails if the page has no content area, if box construction or
    /// fragment construction meets invalid geometry, or if the tree has a
    /// structural violation. The root cause is a [`ConversionError`].
    pub fn convert(&self, styles: &StyleTree) -> Result<Layout> {
        // Warnings are deduplicated per document.
        let diagnostics = self.diagnostics.for_document();
        let content = Self::content_area(styles)?;
        let measure = self.collaborators.measurement(self.options);

        // STEP 1: Box tree.
        let tree = BoxTreeBuilder::new(measure, self.options)
            .with_diagnostics(diagnostics.clone())
            .build(styles)
            .map_err(ConversionError::from)
            .context("failed to build the box tree")?;

        // STEP 2: Structure.
        validate_with_diagnostics(&tree, &diagnostics)
            .map_err(ConversionError::from)
            .context("document structure is not supported")?;

        // STEP 3: Per-root formatting summary.
        let content_height = tree.page.content_height();
        let mut summary = ConversionSummary {
            box_count: tree.len(),
            ..ConversionSummary::default()
        };
        for (index, &root) in tree.roots().iter().enumerate() {
            let top = tree.block(root).map_err(ConversionError::from)?.y - tree.page.margin.top;
            let page = 1 + (top / content_height).floor().max(0.0) as u32;
            let request = BlockFormattingRequest::new(FormattingContextKind::Block, root, content)
                .map_err(ConversionError::from)?
                .with_page_context(PageContext(page));
            let result = format(&tree, &request)
                .map_err(ConversionError::from)
                .with_context(|| format!("failed to format root {index}"))?;
            summary.roots.push(RootSummary {
                path: tree.path_to(root),
                page,
                width: result.total_width,
                height: result.total_height,
            });
        }

        // STEP 4: Fragments.
        let forest = FragmentBuilder::new()
            .with_diagnostics(diagnostics.clone())
            .build(&tree, &measure)
            .map_err(ConversionError::from)
            .context("failed to build fragments")?;
        summary.fragment_count = forest.total_count();

        // STEP 5: Pages.
        let background = canvas_background(styles);
        let page_count = forest
            .roots
            .iter()
            .map(|f| f.info().page)
            .max()
            .unwrap_or(1);
        let mut pages: Vec<Page> = (1..=page_count)
            .map(|n| Page::new(n, styles.page_size, styles.page_margin, background))
            .collect();
        for root in forest.roots {
            let index = root.info().page.saturating_sub(1) as usize;
            if let Some(page) = pages.get_mut(index) {
                page.children.push(root);
            }
        }

        diagnostics.emit(
            DiagnosticEvent::new(Category::Document, "converted")
                .with("pages", pages.len())
                .with("boxes", summary.box_count)
                .with("fragments", summary.fragment_count),
        );
        Ok(Layout { pages, summary })
    }

    /// Content width of the page.
    fn content_area(styles: &StyleTree) -> Result<f32> {
        let width = styles.page_size.width - styles.page_margin.horizontal();
        let height = styles.page_size.height - styles.page_margin.vertical();
        if width > 0.0 && height > 0.0 && width.is_finite() && height.is_finite() {
            Ok(width)
        } else {
            Err(ConversionError::EmptyContentArea { width, height })
                .context("invalid page geometry")
        }
    }
}

/// Convert `styles` with a one-off [`DocumentConverter`].
///
/// # Errors
///
/// See [`DocumentConverter::convert`].
pub fn convert(
    styles: &StyleTree,
    collaborators: &Collaborators<'_>,
    options: &LayoutOptions,
    diagnostics: &Diagnostics,
) -> Result<Layout> {
    DocumentConverter::new(*collaborators, options)
        .with_diagnostics(diagnostics.clone())
        .convert(styles)
}
