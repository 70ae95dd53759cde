//! Integration tests for the staged fragment pipeline.

use std::collections::BTreeSet;
use std::sync::Arc;

use vellum_common::{Diagnostics, MemorySink};
use vellum_layout::fragment::{BlockStage, InlineStage, build};
use vellum_layout::{
    ApproximateTextMeasurer, BlockBox, BoxKind, BoxTree, BoxTreeBuilder, ComputedStyle,
    DisplayNode, EdgeSizes, FamilyFontResolver, FixedImageProvider, Fragment, FragmentBuilder,
    FragmentStage, LayoutError, LayoutOptions, LengthValue, MeasurementContext, PageBox, Role,
    Size, StyleNode, StyleTree,
};

fn sample() -> StyleNode {
    StyleNode::element("body")
        .with_child(StyleNode::element("h1").with_child(StyleNode::text("Title")))
        .with_child(
            StyleNode::element("div")
                .with_style(ComputedStyle {
                    z_index: Some(2),
                    ..ComputedStyle::default()
                })
                .with_child(StyleNode::text("raised"))
                .with_child(StyleNode::element("hr")),
        )
        .with_child(
            StyleNode::element("ul")
                .with_child(StyleNode::element("li").with_child(StyleNode::text("one")))
                .with_child(StyleNode::element("li").with_child(StyleNode::text("two"))),
        )
        .with_child(StyleNode::element("img").with_attribute("src", "logo.png"))
}

fn with_forest<T>(root: StyleNode, check: impl FnOnce(&BoxTree, &MeasurementContext<'_>) -> T) -> T {
    let options = LayoutOptions::default();
    let fonts = FamilyFontResolver::default();
    let images = FixedImageProvider::new().with_image("logo.png", 80, 40, 1_000);
    let measure = MeasurementContext::new(&ApproximateTextMeasurer, &fonts, &images, &options);
    let styles = StyleTree::new(root).with_page(Size::A4, EdgeSizes::uniform(36.0));
    let tree = BoxTreeBuilder::new(measure, &options).build(&styles).unwrap();
    check(&tree, &measure)
}

#[test]
fn test_ids_are_unique_and_start_at_one() {
    let forest = with_forest(sample(), |tree, measure| build(tree, measure).unwrap());
    let ids: BTreeSet<u32> = forest.all().iter().map(|f| f.id().0).collect();
    assert_eq!(ids.len(), forest.total_count());
    let expected: BTreeSet<u32> = (1..=forest.total_count() as u32).collect();
    assert_eq!(ids, expected);
}

#[test]
fn test_flattened_covers_every_fragment_once() {
    let forest = with_forest(sample(), |tree, measure| build(tree, measure).unwrap());
    let flat = forest.flattened();
    assert_eq!(flat.len(), forest.total_count());
    let distinct: BTreeSet<u32> = flat.iter().map(|f| f.id().0).collect();
    assert_eq!(distinct.len(), flat.len());
}

#[test]
fn test_paint_order_is_non_decreasing_in_z() {
    let forest = with_forest(sample(), |tree, measure| build(tree, measure).unwrap());
    let z: Vec<i32> = forest.flattened().iter().map(|f| f.info().z_order).collect();
    assert!(z.windows(2).all(|w| w[0] <= w[1]));
    // The raised div and its descendants paint last.
    assert_eq!(z.last(), Some(&2));
}

#[test]
fn test_every_kind_is_produced() {
    let forest = with_forest(sample(), |tree, measure| build(tree, measure).unwrap());
    let all = forest.all();
    assert!(all.iter().any(|f| matches!(f, Fragment::Rule(_))));
    assert!(all.iter().any(|f| matches!(f, Fragment::LineBox(_))));
    let image = all
        .iter()
        .find_map(|f| match f {
            Fragment::Image(image) => Some(image),
            _ => None,
        })
        .unwrap();
    assert_eq!(image.intrinsic_size, Some((80, 40)));
    assert_eq!(image.info.rect.width(), 60.0);
    assert!(!image.is_missing);
}

#[test]
fn test_box_lookup_finds_line_box() {
    with_forest(sample(), |tree, measure| {
        let forest = build(tree, measure).unwrap();
        let body = tree.roots()[0];
        let h1 = tree.children(body)[0];
        let text = tree.children(h1)[0];
        let Some(Fragment::LineBox(line)) = forest.fragment_for_box(text) else {
            panic!("expected a line box for the heading text");
        };
        assert_eq!(line.runs[0].text, "Title");
        let Some(Fragment::Block(block)) = forest.fragment_for_box(h1) else {
            panic!("expected a block fragment for the heading");
        };
        assert_eq!(block.children.len(), 1);
    });
}

#[test]
fn test_list_items_are_indented() {
    with_forest(sample(), |tree, measure| {
        let forest = build(tree, measure).unwrap();
        let ul = tree.children(tree.roots()[0])[2];
        let li = tree.children(ul)[0];
        let text = tree.children(li)[0];
        let li_x = forest.fragment_for_box(li).unwrap().info().rect.x();
        let run_x = forest.fragment_for_box(text).unwrap().info().rect.x();
        assert_eq!(run_x - li_x, 18.0);
    });
}

#[test]
fn test_stage_events_are_emitted_in_order() {
    let sink = Arc::new(MemorySink::new());
    let _forest = with_forest(sample(), |tree, measure| {
        FragmentBuilder::new()
            .with_diagnostics(Diagnostics::new(sink.clone()))
            .build(tree, measure)
            .unwrap()
    });
    let stages: Vec<String> = sink
        .events()
        .iter()
        .filter_map(|e| e.get("stage").map(str::to_string))
        .collect();
    assert_eq!(stages, vec!["block", "inline", "specialized", "z-order"]);
    assert!(sink.kinds().iter().all(|k| k == "stage-complete"));
}

#[test]
fn test_pipeline_without_assembly_fails() {
    let result = with_forest(sample(), |tree, measure| {
        let stages: Vec<Box<dyn FragmentStage>> = vec![Box::new(BlockStage), Box::new(InlineStage)];
        FragmentBuilder::new().with_stages(stages).build(tree, measure)
    });
    assert!(matches!(result, Err(LayoutError::InvalidArgument(_))));
}

#[test]
fn test_roots_are_assigned_to_pages() {
    let mut tree = BoxTree::new(PageBox {
        size: Size::new(100.0, 100.0),
        margin: EdgeSizes::ZERO,
    });
    for y in [0.0, 150.0] {
        let id = tree.alloc(DisplayNode::new(
            Role::Block,
            BoxKind::Block(BlockBox {
                y,
                width: 100.0,
                height: 10.0,
                ..BlockBox::default()
            }),
            ComputedStyle {
                height: Some(LengthValue::Pt(10.0)),
                ..ComputedStyle::default()
            },
            None,
        ));
        tree.add_root(id).unwrap();
    }

    let options = LayoutOptions::default();
    let fonts = FamilyFontResolver::default();
    let images = FixedImageProvider::new();
    let measure = MeasurementContext::new(&ApproximateTextMeasurer, &fonts, &images, &options);
    let forest = build(&tree, &measure).unwrap();

    let pages: Vec<u32> = forest.roots.iter().map(|f| f.info().page).collect();
    assert_eq!(pages, vec![1, 2]);
    assert_eq!(forest.roots[1].info().rect.y(), 50.0);
}

#[test]
fn test_forest_serializes_with_type_tags() {
    let forest = with_forest(sample(), |tree, measure| build(tree, measure).unwrap());
    let value = serde_json::to_value(&forest).unwrap();
    assert_eq!(value["roots"][0]["type"], "block");
    assert!(value["paint_order"].as_array().is_some_and(|a| !a.is_empty()));
}
