//! Integration tests for document conversion and page assembly.

use std::sync::Arc;

use vellum_common::{Diagnostics, MemorySink};
use vellum_document::layout::{
    ApproximateTextMeasurer, ColorValue, ComputedStyle, Display, EdgeSizes, FamilyFontResolver,
    FixedImageProvider, FontMetrics, Fragment, LayoutOptions, LengthValue, LineHeightStrategy,
    Role, Size, StyleNode, StyleTree,
};
use vellum_document::{Collaborators, ConversionError, DocumentConverter, convert};

fn article() -> StyleNode {
    StyleNode::element("html")
        .with_style(ComputedStyle {
            background_color: Some(ColorValue::rgb(250, 250, 240)),
            ..ComputedStyle::default()
        })
        .with_child(
            StyleNode::element("body")
                .with_child(StyleNode::element("h1").with_child(StyleNode::text("Report")))
                .with_child(StyleNode::element("p").with_child(StyleNode::text("Body text.")))
                .with_child(StyleNode::element("hr"))
                .with_child(StyleNode::element("img").with_attribute("src", "chart.png")),
        )
}

fn run(styles: &StyleTree, diagnostics: &Diagnostics) -> anyhow::Result<vellum_document::Layout> {
    let fonts = FamilyFontResolver::default();
    let images = FixedImageProvider::new().with_image("chart.png", 400, 200, 2_048);
    let collaborators = Collaborators::new(&ApproximateTextMeasurer, &fonts, &images);
    convert(styles, &collaborators, &LayoutOptions::default(), diagnostics)
}

#[test]
fn test_single_page_document() {
    let styles = StyleTree::new(article()).with_page(Size::A4, EdgeSizes::uniform(72.0));
    let layout = run(&styles, &Diagnostics::disabled()).unwrap();

    assert_eq!(layout.pages.len(), 1);
    let page = &layout.pages[0];
    assert_eq!(page.number, 1);
    assert_eq!(page.size, Size::A4);
    assert_eq!(page.margin, EdgeSizes::uniform(72.0));
    assert_eq!(page.background, Some(ColorValue::rgb(250, 250, 240)));
    assert_eq!(page.children.len(), 1);

    assert_eq!(layout.summary.roots.len(), 1);
    assert_eq!(layout.summary.roots[0].path, "html");
    assert_eq!(layout.summary.roots[0].width, 595.0 - 144.0);
    assert_eq!(layout.summary.fragment_count, layout.fragment_count());
    assert_eq!(page.paint_order().len(), page.fragment_count());

    let root = &page.children[0];
    assert_eq!(root.info().rect.x(), 72.0);
    assert_eq!(root.info().rect.y(), 72.0);
    let all = page.paint_order();
    assert!(all.iter().any(|f| matches!(f, Fragment::Image(i) if i.intrinsic_size == Some((400, 200)))));
    assert!(all.iter().any(|f| matches!(f, Fragment::Rule(_))));
    assert!(page.contains(root.id()));
}

#[test]
fn test_events_cover_every_stage() {
    let sink = Arc::new(MemorySink::new());
    let styles = StyleTree::new(article());
    let _layout = run(&styles, &Diagnostics::new(sink.clone())).unwrap();
    let kinds = sink.kinds();
    assert_eq!(kinds.iter().filter(|k| *k == "stage-complete").count(), 4);
    assert_eq!(kinds.last().map(String::as_str), Some("converted"));
    let converted = sink.events().pop().unwrap();
    assert_eq!(converted.get("pages"), Some("1"));
}

#[test]
fn test_table_in_inline_block_aborts_document() {
    let sink = Arc::new(MemorySink::new());
    let root = StyleNode::element("body").with_child(
        StyleNode::element("div")
            .with_style(ComputedStyle {
                display: Some(Display::InlineBlock),
                ..ComputedStyle::default()
            })
            .with_child(
                StyleNode::element("table")
                    .with_child(StyleNode::element("tr").with_child(StyleNode::element("td"))),
            ),
    );
    let err = run(&StyleTree::new(root), &Diagnostics::new(sink.clone())).unwrap_err();

    let conversion = err.downcast_ref::<ConversionError>().unwrap();
    let violation = conversion.structural_violation().unwrap();
    assert_eq!(violation.role, Role::Table);
    assert_eq!(violation.path, "body/div/table");
    assert!(sink.kinds().contains(&"structural-violation".to_string()));
    assert!(!sink.kinds().contains(&"converted".to_string()));
}

#[test]
fn test_margins_larger_than_page_are_rejected() {
    let styles = StyleTree::new(article()).with_page(Size::new(100.0, 100.0), EdgeSizes::uniform(60.0));
    let err = run(&styles, &Diagnostics::disabled()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConversionError>(),
        Some(ConversionError::EmptyContentArea { .. })
    ));
}

#[test]
fn test_percentage_without_basis_is_reported() {
    let sink = Arc::new(MemorySink::new());
    let root = StyleNode::element("body").with_child(
        StyleNode::element("div").with_child(StyleNode::element("p").with_style(ComputedStyle {
            height: Some(LengthValue::Percent(50.0)),
            ..ComputedStyle::default()
        })),
    );
    let layout = run(&StyleTree::new(root), &Diagnostics::new(sink.clone())).unwrap();
    assert_eq!(layout.pages.len(), 1);
    let fallback = sink
        .events()
        .into_iter()
        .find(|e| e.kind == "percentage-fallback")
        .unwrap();
    assert!(fallback.get("reason").unwrap().contains("resolved to auto"));
}

#[test]
fn test_empty_document_still_has_a_page() {
    let root = StyleNode::element("body").with_style(ComputedStyle {
        display: Some(Display::None),
        ..ComputedStyle::default()
    });
    let layout = run(&StyleTree::new(root), &Diagnostics::disabled()).unwrap();
    assert_eq!(layout.pages.len(), 1);
    assert!(layout.pages[0].children.is_empty());
    assert_eq!(layout.summary.fragment_count, 0);
}

struct DoubleSpaced;

impl LineHeightStrategy for DoubleSpaced {
    fn line_height(&self, metrics: &FontMetrics) -> f32 {
        2.0 * metrics.height()
    }
}

#[test]
fn test_custom_line_height_reaches_fragments() {
    let fonts = FamilyFontResolver::default();
    let images = FixedImageProvider::new();
    let options = LayoutOptions::default();
    let collaborators =
        Collaborators::new(&ApproximateTextMeasurer, &fonts, &images).with_line_height(&DoubleSpaced);
    let styles = StyleTree::new(StyleNode::element("p").with_child(StyleNode::text("x")));
    let layout = DocumentConverter::new(collaborators, &options)
        .convert(&styles)
        .unwrap();
    let Fragment::LineBox(line) = &layout.pages[0].children[0].children()[0] else {
        panic!("expected a line box");
    };
    assert_eq!(line.line_height, 24.0);
}

#[test]
fn test_layout_serializes() {
    let styles = StyleTree::new(article());
    let layout = run(&styles, &Diagnostics::disabled()).unwrap();
    let value = serde_json::to_value(&layout).unwrap();
    assert_eq!(value["pages"][0]["number"], 1);
    assert_eq!(value["pages"][0]["children"][0]["type"], "block");
}
