//! Integration tests for box generation and block layout from a JSON
//! style tree.

use vellum_layout::{
    ApproximateTextMeasurer, BoxKind, BoxTreeBuilder, ComputedStyle, EdgeSizes,
    FamilyFontResolver, FixedImageProvider, LayoutOptions, LengthValue, MeasurementContext, Role,
    Size, StyleNode, StyleTree, default_display_for_element, Display, validate,
};

const FIXTURE: &str = r#"{
    "page_size": { "width": 300.0, "height": 200.0 },
    "page_margin": { "top": 20.0, "right": 20.0, "bottom": 20.0, "left": 20.0 },
    "root": {
        "tag": "body",
        "children": [
            {
                "tag": "h1",
                "id": "title",
                "style": { "height": { "pt": 30.0 }, "margin_bottom": { "pt": 10.0 } }
            },
            {
                "tag": "p",
                "classes": ["lead"],
                "children": [ { "text": "Hello   world" } ]
            }
        ]
    }
}"#;

fn build(styles: &StyleTree) -> vellum_layout::BoxTree {
    let options = LayoutOptions::default();
    let fonts = FamilyFontResolver::default();
    let images = FixedImageProvider::new();
    let measure = MeasurementContext::new(&ApproximateTextMeasurer, &fonts, &images, &options);
    BoxTreeBuilder::new(measure, &options).build(styles).unwrap()
}

#[test]
fn test_fixture_layout() {
    let styles: StyleTree = serde_json::from_str(FIXTURE).unwrap();
    let tree = build(&styles);

    let body = tree.roots()[0];
    let body_box = tree.block(body).unwrap();
    assert_eq!((body_box.x, body_box.y, body_box.width), (20.0, 20.0, 260.0));

    let children = tree.children(body);
    assert_eq!(children.len(), 2);
    let h1 = tree.block(children[0]).unwrap();
    let p = tree.block(children[1]).unwrap();
    assert_eq!(h1.height, 30.0);
    assert_eq!(p.y, 20.0 + 30.0 + 10.0);
    assert_eq!(p.height, 12.0);
    assert_eq!(body_box.height, 30.0 + 10.0 + 12.0);
}

#[test]
fn test_fixture_text_is_collapsed() {
    let styles: StyleTree = serde_json::from_str(FIXTURE).unwrap();
    let tree = build(&styles);
    let p = tree.children(tree.roots()[0])[1];
    let text = tree.children(p)[0];
    let node = tree.node(text).unwrap();
    assert_eq!(node.role, Role::Inline);
    let BoxKind::Inline(inline) = &node.kind else {
        panic!("expected an inline box");
    };
    assert_eq!(inline.visible_text(), Some("Hello world"));
}

#[test]
fn test_source_identity_in_paths() {
    let styles: StyleTree = serde_json::from_str(FIXTURE).unwrap();
    let tree = build(&styles);
    let body = tree.roots()[0];
    let h1 = tree.children(body)[0];
    assert_eq!(tree.path_to(h1), "body/h1");
    let source = tree.node(h1).unwrap().source.clone().unwrap();
    assert_eq!(source.to_string(), "h1#title");
}

#[test]
fn test_box_tree_serializes() {
    let styles: StyleTree = serde_json::from_str(FIXTURE).unwrap();
    let tree = build(&styles);
    let value = serde_json::to_value(&tree).unwrap();
    assert_eq!(value["page"]["size"]["width"], 300.0);
    assert_eq!(value["roots"].as_array().map(Vec::len), Some(1));
}

#[test]
fn test_default_display() {
    assert_eq!(default_display_for_element("div"), Display::Block);
    assert_eq!(default_display_for_element("span"), Display::Inline);
    assert_eq!(default_display_for_element("li"), Display::ListItem);
    assert_eq!(default_display_for_element("head"), Display::None);
}

#[test]
fn test_deeply_nested_document_builds() {
    const DIVS: usize = 1_000;
    const SPANS: usize = 200;

    let mut text = StyleNode::text("deep");
    for _ in 0..SPANS {
        text = StyleNode::element("span").with_child(text);
    }
    let mut node = StyleNode::element("p").with_child(text);
    for _ in 0..DIVS {
        node = StyleNode::element("div")
            .with_style(ComputedStyle {
                padding_top: Some(LengthValue::Pt(1.0)),
                ..ComputedStyle::default()
            })
            .with_child(node);
    }
    let styles = StyleTree::new(node).with_page(Size::new(300.0, 5_000.0), EdgeSizes::ZERO);
    let tree = build(&styles);

    let root = tree.roots()[0];
    assert_eq!(tree.len(), DIVS + 2);
    assert_eq!(tree.block(root).unwrap().height, DIVS as f32 + 12.0);

    let p = tree.preorder(root)[DIVS];
    assert_eq!(tree.node(p).unwrap().role, Role::Block);
    assert_eq!(tree.block(p).unwrap().y, DIVS as f32);
    let inline = tree.children(p)[0];
    let BoxKind::Inline(inline) = &tree.node(inline).unwrap().kind else {
        panic!("expected the spans to collapse into one inline box");
    };
    assert_eq!(inline.text.as_deref(), Some("deep"));
    assert!(validate(&tree).is_ok());
}
