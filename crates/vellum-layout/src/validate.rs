//! Structural validation of a laid-out box tree.
//!
//! The engine has no table layout inside an inline-block formatting
//! context. Rather than produce wrong geometry, such trees are rejected
//! before fragment construction with the path to the offending box.

use serde::Serialize;
use vellum_common::{Category, DiagnosticEvent, Diagnostics};

use crate::box_tree::{BoxId, BoxTree, Role};
use crate::error::{LayoutError, LayoutResult};

/// Reason attached to a table part found inside an inline-block context.
pub const INLINE_BLOCK_TABLE_REASON: &str =
    "table layout inside an inline-block formatting context is not supported";

/// A structural problem found by [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructuralViolation {
    /// Slash-joined tag names (role names for anonymous boxes) from the
    /// root to the offending box.
    pub path: String,
    /// Role of the offending box.
    pub role: Role,
    /// Fixed explanation.
    pub reason: &'static str,
}

/// Walk every root and reject table parts inside an inline-block context.
///
/// The walk is pre-order with an explicit stack, so deep trees cannot
/// overflow the call stack.
///
/// # Errors
///
/// Returns [`LayoutError::StructuralViolation`] for the first `table`,
/// `table-row` or `table-cell` box that has an inline-block context
/// ancestor (or is one itself).
pub fn validate(tree: &BoxTree) -> LayoutResult<()> {
    for &root in tree.roots() {
        let mut stack: Vec<(BoxId, bool)> = vec![(root, false)];
        while let Some((id, inherited)) = stack.pop() {
            let Some(node) = tree.get(id) else { continue };
            let inside = inherited || node.as_block().is_some_and(|b| b.is_inline_block_context);
            if inside && node.role.is_table_part() {
                return Err(LayoutError::StructuralViolation(StructuralViolation {
                    path: tree.path_to(id),
                    role: node.role,
                    reason: INLINE_BLOCK_TABLE_REASON,
                }));
            }
            stack.extend(node.children().iter().rev().map(|&child| (child, inside)));
        }
    }
    Ok(())
}

/// [`validate`], emitting a `validation/structural-violation` event before
/// the error is returned.
///
/// # Errors
///
/// Same as [`validate`].
pub fn validate_with_diagnostics(tree: &BoxTree, diagnostics: &Diagnostics) -> LayoutResult<()> {
    let result = validate(tree);
    if let Err(LayoutError::StructuralViolation(violation)) = &result {
        diagnostics.emit(
            DiagnosticEvent::new(Category::Validation, "structural-violation")
                .with("path", &violation.path)
                .with("role", violation.role)
                .with("reason", violation.reason),
        );
    }
    result
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use vellum_common::MemorySink;

    use super::*;
    use crate::box_tree::{BlockBox, BoxKind, DisplayNode, PageBox, SourceIdentity};
    use crate::geometry::{EdgeSizes, Size};
    use crate::style::ComputedStyle;

    fn block(tree: &mut BoxTree, role: Role, tag: Option<&str>, inline_block: bool) -> BoxId {
        tree.alloc(DisplayNode::new(
            role,
            BoxKind::Block(BlockBox {
                is_inline_block_context: inline_block,
                ..BlockBox::default()
            }),
            ComputedStyle::default(),
            tag.map(|t| SourceIdentity {
                tag: Some(t.to_string()),
                ..SourceIdentity::default()
            }),
        ))
    }

    fn tree() -> BoxTree {
        BoxTree::new(PageBox {
            size: Size::LETTER,
            margin: EdgeSizes::ZERO,
        })
    }

    #[test]
    fn test_table_outside_inline_block_is_fine() {
        let mut tree = tree();
        let body = block(&mut tree, Role::Block, Some("body"), false);
        let table = block(&mut tree, Role::Table, Some("table"), false);
        tree.add_root(body).unwrap();
        tree.append_child(body, table).unwrap();
        assert_eq!(validate(&tree), Ok(()));
    }

    #[test]
    fn test_flag_does_not_leak_to_siblings() {
        let mut tree = tree();
        let body = block(&mut tree, Role::Block, Some("body"), false);
        let ib = block(&mut tree, Role::InlineBlock, Some("span"), true);
        let table = block(&mut tree, Role::Table, Some("table"), false);
        tree.add_root(body).unwrap();
        tree.append_child(body, ib).unwrap();
        tree.append_child(body, table).unwrap();
        assert!(validate(&tree).is_ok());
    }

    #[test]
    fn test_anonymous_boxes_use_role_in_path() {
        let mut tree = tree();
        let body = block(&mut tree, Role::Block, Some("body"), false);
        let ib = block(&mut tree, Role::InlineBlock, None, true);
        let cell = block(&mut tree, Role::TableCell, None, false);
        tree.add_root(body).unwrap();
        tree.append_child(body, ib).unwrap();
        tree.append_child(ib, cell).unwrap();

        let Err(LayoutError::StructuralViolation(v)) = validate(&tree) else {
            panic!("expected a structural violation");
        };
        assert_eq!(v.path, "body/inline-block/table-cell");
        assert_eq!(v.role, Role::TableCell);
    }

    #[test]
    fn test_violation_emits_event() {
        let mut tree = tree();
        let ib = block(&mut tree, Role::InlineBlock, Some("div"), true);
        let row = block(&mut tree, Role::TableRow, Some("tr"), false);
        tree.add_root(ib).unwrap();
        tree.append_child(ib, row).unwrap();

        let sink = Arc::new(MemorySink::new());
        let result = validate_with_diagnostics(&tree, &Diagnostics::new(sink.clone()));
        assert!(result.is_err());
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, "structural-violation");
        assert_eq!(events[0].get("path"), Some("div/tr"));
        assert_eq!(events[0].get("role"), Some("table-row"));
    }
}
