//! Integration tests for block and inline-block formatting contexts.

use vellum_layout::formatting_context::format;
use vellum_layout::{
    BlockBox, BlockFormattingRequest, BoxId, BoxKind, BoxTree, ComputedStyle, DisplayNode,
    EdgeSizes, FormattingContextKind, LayoutError, PageBox, PageContext, Role, Size,
};

fn page() -> PageBox {
    PageBox {
        size: Size::LETTER,
        margin: EdgeSizes::uniform(36.0),
    }
}

fn block(tree: &mut BoxTree, block: BlockBox) -> BoxId {
    tree.alloc(DisplayNode::new(
        Role::Block,
        BoxKind::Block(block),
        ComputedStyle::default(),
        None,
    ))
}

/// Root with two stacked children: 40pt (margin-bottom 10) then 60pt
/// (margin-top 6), both 250pt wide.
fn two_children() -> (BoxTree, BoxId) {
    let mut tree = BoxTree::new(page());
    let root = block(
        &mut tree,
        BlockBox {
            width: 250.0,
            ..BlockBox::default()
        },
    );
    let first = block(
        &mut tree,
        BlockBox {
            width: 250.0,
            height: 40.0,
            margin: EdgeSizes::new(0.0, 0.0, 10.0, 0.0),
            ..BlockBox::default()
        },
    );
    let second = block(
        &mut tree,
        BlockBox {
            y: 50.0,
            width: 250.0,
            height: 60.0,
            margin: EdgeSizes::new(6.0, 0.0, 0.0, 0.0),
            ..BlockBox::default()
        },
    );
    tree.add_root(root).unwrap();
    tree.append_child(root, first).unwrap();
    tree.append_child(root, second).unwrap();
    (tree, root)
}

#[test]
fn test_inline_block_height_collapses_adjoining_margins() {
    let (tree, root) = two_children();
    let request = BlockFormattingRequest::unbounded(FormattingContextKind::InlineBlock, root);
    let result = format(&tree, &request).unwrap();
    assert_eq!(result.total_height, 40.0 + 10.0 + 60.0);
}

#[test]
fn test_width_is_clamped_unless_unbounded() {
    let (tree, root) = two_children();
    let bounded =
        BlockFormattingRequest::new(FormattingContextKind::Block, root, 200.0).unwrap();
    assert_eq!(format(&tree, &bounded).unwrap().total_width, 200.0);

    let unbounded = BlockFormattingRequest::unbounded(FormattingContextKind::Block, root);
    assert_eq!(format(&tree, &unbounded).unwrap().total_width, 250.0);
}

#[test]
fn test_block_context_has_no_baseline() {
    let (tree, root) = two_children();
    let request = BlockFormattingRequest::new(FormattingContextKind::Block, root, 500.0)
        .unwrap()
        .with_page_context(PageContext(1));
    assert_eq!(request.page_context(), Some(PageContext(1)));
    let result = format(&tree, &request).unwrap();
    assert_eq!(result.baseline, None);
    assert_eq!(result.total_height, 110.0);
}

#[test]
fn test_infinite_width_must_be_flagged_unbounded() {
    let err = BlockFormattingRequest::new(FormattingContextKind::Block, BoxId(0), f32::INFINITY)
        .unwrap_err();
    assert!(matches!(err, LayoutError::InvalidArgument(_)));
}

#[test]
fn test_unknown_root_is_rejected() {
    let (tree, _) = two_children();
    let request = BlockFormattingRequest::unbounded(FormattingContextKind::Block, BoxId(99));
    assert!(format(&tree, &request).is_err());
}

#[test]
fn test_nan_descendant_is_invalid_geometry() {
    let mut tree = BoxTree::new(page());
    let root = block(
        &mut tree,
        BlockBox {
            width: 100.0,
            height: 10.0,
            ..BlockBox::default()
        },
    );
    let child = block(
        &mut tree,
        BlockBox {
            y: f32::NAN,
            width: f32::NAN,
            ..BlockBox::default()
        },
    );
    tree.add_root(root).unwrap();
    tree.append_child(root, child).unwrap();

    for kind in [FormattingContextKind::Block, FormattingContextKind::InlineBlock] {
        let request = BlockFormattingRequest::unbounded(kind, root);
        assert!(matches!(
            format(&tree, &request),
            Err(LayoutError::InvalidGeometry(_))
        ));
    }
}
