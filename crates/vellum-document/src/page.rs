//! Paged output.

use serde::Serialize;
use vellum_layout::{ColorValue, EdgeSizes, Fragment, FragmentId, Size, StyleTree};

/// One output page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    /// 1-based page number.
    pub number: u32,
    /// Page size in points.
    pub size: Size,
    /// Page margins in points.
    pub margin: EdgeSizes,
    /// Canvas fill, if any.
    pub background: Option<ColorValue>,
    /// Root fragments on this page, in document order.
    pub children: Vec<Fragment>,
}

impl Page {
    /// An empty page.
    #[must_use]
    pub const fn new(
        number: u32,
        size: Size,
        margin: EdgeSizes,
        background: Option<ColorValue>,
    ) -> Self {
        Self {
            number,
            size,
            margin,
            background,
            children: Vec::new(),
        }
    }

    /// [CSS 2.1 Appendix E.2 Painting order](https://www.w3.org/TR/CSS2/zindex.html#painting-order)
    ///
    /// Every fragment on the page, stable-sorted by z-order.
    #[must_use]
    pub fn paint_order(&self) -> Vec<&Fragment> {
        let mut out = Vec::new();
        for child in &self.children {
            child.walk(&mut |f| out.push(f));
        }
        out.sort_by_key(|f| f.info().z_order);
        out
    }

    /// Number of fragments on the page.
    #[must_use]
    pub fn fragment_count(&self) -> usize {
        self.children.iter().map(Fragment::count).sum()
    }

    /// Whether `id` is painted on this page.
    #[must_use]
    pub fn contains(&self, id: FragmentId) -> bool {
        let mut found = false;
        for child in &self.children {
            child.walk(&mut |f| found |= f.id() == id);
        }
        found
    }
}

/// Formatting result for one root block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RootSummary {
    /// Path of the root box.
    pub path: String,
    /// Page the root starts on.
    pub page: u32,
    /// Occupied width.
    pub width: f32,
    /// Occupied height, including margins of its descendants.
    pub height: f32,
}

/// What a conversion produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversionSummary {
    /// One entry per root, in document order.
    pub roots: Vec<RootSummary>,
    /// Boxes in the box tree.
    pub box_count: usize,
    /// Fragments across all pages.
    pub fragment_count: usize,
}

/// The converted document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    /// Pages in order. Never empty.
    pub pages: Vec<Page>,
    /// Conversion summary.
    pub summary: ConversionSummary,
}

impl Layout {
    /// Total fragments across all pages.
    #[must_use]
    pub fn fragment_count(&self) -> usize {
        self.pages.iter().map(Page::fragment_count).sum()
    }
}

/// [§ 2.11.2 The Canvas Background and the HTML `<body>` Element](https://www.w3.org/TR/css-backgrounds-3/#special-backgrounds)
///
/// "The background of the root element becomes the canvas background and its
/// background painting area extends to cover the entire canvas."
///
/// When the root is an `html` element with no background, the first `body`
/// child's background is used instead.
#[must_use]
pub fn canvas_background(styles: &StyleTree) -> Option<ColorValue> {
    let root = &styles.root;
    let visible = |c: &ColorValue| !c.is_transparent();
    if let Some(color) = root.style.background_color.filter(visible) {
        return Some(color);
    }
    if root.tag.as_deref() != Some("html") {
        return None;
    }
    root.children
        .iter()
        .find(|c| c.tag.as_deref() == Some("body"))?
        .style
        .background_color
        .filter(visible)
}

#[cfg(test)]
mod tests {
    use vellum_layout::{ComputedStyle, StyleNode};

    use super::*;

    fn with_background(tag: &str, color: Option<ColorValue>) -> StyleNode {
        StyleNode::element(tag).with_style(ComputedStyle {
            background_color: color,
            ..ComputedStyle::default()
        })
    }

    #[test]
    fn test_root_background_wins() {
        let red = ColorValue::rgb(255, 0, 0);
        let styles = StyleTree::new(
            with_background("html", Some(red))
                .with_child(with_background("body", Some(ColorValue::WHITE))),
        );
        assert_eq!(canvas_background(&styles), Some(red));
    }

    #[test]
    fn test_body_background_propagates() {
        let styles = StyleTree::new(
            with_background("html", Some(ColorValue::TRANSPARENT))
                .with_child(with_background("head", Some(ColorValue::BLACK)))
                .with_child(with_background("body", Some(ColorValue::WHITE))),
        );
        assert_eq!(canvas_background(&styles), Some(ColorValue::WHITE));
    }

    #[test]
    fn test_no_background() {
        let styles = StyleTree::new(StyleNode::element("div"));
        assert_eq!(canvas_background(&styles), None);
    }
}
