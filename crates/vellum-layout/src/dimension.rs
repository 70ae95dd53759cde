//! Width and height resolution, including two-pass percentages.
//!
//! [§ 10.2 Content width](https://www.w3.org/TR/CSS2/visudet.html#the-width-property)
//!
//! "<percentage> Specifies a percentage width. The percentage is
//! calculated with respect to the width of the generated box's containing
//! block."
//!
//! [§ 10.5 Content height](https://www.w3.org/TR/CSS2/visudet.html#the-height-property)
//!
//! "If the height of the containing block is not specified explicitly
//! (i.e., it depends on content height)... the value computes to 'auto'."
//!
//! Percentages whose basis is unknown in pass 1 are deferred. Pass 2
//! resolves them against the parent's measured content box. Anything still
//! without a basis resolves to zero and carries a fallback reason; this is
//! never an error.

use vellum_common::{Category, DiagnosticEvent, Diagnostics};

use crate::error::{LayoutError, LayoutResult};
use crate::geometry::Size;

/// Identity of the element a dimension belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementIdentity {
    /// Stable key, usually the box id.
    pub key: usize,
    /// Human-readable label for diagnostics.
    pub label: String,
}

impl ElementIdentity {
    /// Create an identity.
    #[must_use]
    pub fn new(key: usize, label: impl Into<String>) -> Self {
        Self {
            key,
            label: label.into(),
        }
    }
}

/// Unit of a requested dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionUnit {
    /// Points.
    Absolute,
    /// Percent of the parent content box.
    Percentage,
}

/// A width and/or height as authored.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestedDimension {
    element: ElementIdentity,
    width: Option<f32>,
    height: Option<f32>,
    unit: DimensionUnit,
    source: Option<String>,
}

impl RequestedDimension {
    /// Build a request.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidArgument`] if either value is
    /// non-finite or negative.
    pub fn new(
        element: ElementIdentity,
        width: Option<f32>,
        height: Option<f32>,
        unit: DimensionUnit,
    ) -> LayoutResult<Self> {
        for (axis, value) in [("width", width), ("height", height)] {
            if let Some(v) = value.filter(|v| !v.is_finite() || *v < 0.0) {
                return Err(LayoutError::invalid_argument(format!(
                    "requested {axis} for {} must be finite and non-negative, got {v}",
                    element.label
                )));
            }
        }
        Ok(Self {
            element,
            width,
            height,
            unit,
            source: None,
        })
    }

    /// Absolute request in points.
    ///
    /// # Errors
    ///
    /// See [`RequestedDimension::new`].
    pub fn absolute(
        element: ElementIdentity,
        width: Option<f32>,
        height: Option<f32>,
    ) -> LayoutResult<Self> {
        Self::new(element, width, height, DimensionUnit::Absolute)
    }

    /// Percentage request.
    ///
    /// # Errors
    ///
    /// See [`RequestedDimension::new`].
    pub fn percentage(
        element: ElementIdentity,
        width: Option<f32>,
        height: Option<f32>,
    ) -> LayoutResult<Self> {
        Self::new(element, width, height, DimensionUnit::Percentage)
    }

    /// Attach the declaration the request came from.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Requesting element.
    #[must_use]
    pub const fn element(&self) -> &ElementIdentity {
        &self.element
    }

    /// Requested width.
    #[must_use]
    pub const fn width(&self) -> Option<f32> {
        self.width
    }

    /// Requested height.
    #[must_use]
    pub const fn height(&self) -> Option<f32> {
        self.height
    }

    /// Unit of both values.
    #[must_use]
    pub const fn unit(&self) -> DimensionUnit {
        self.unit
    }

    /// Originating declaration, if recorded.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

/// Which resolution pass is running: 1 or 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PassCount(u8);

impl PassCount {
    /// The first pass.
    pub const FIRST: Self = Self(1);
    /// The second pass.
    pub const SECOND: Self = Self(2);

    /// Validate a pass number.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidArgument`] unless `pass` is 1 or 2.
    pub fn new(pass: u8) -> LayoutResult<Self> {
        match pass {
            1 | 2 => Ok(Self(pass)),
            other => Err(LayoutError::invalid_argument(format!(
                "pass count must be 1 or 2, got {other}"
            ))),
        }
    }

    /// The raw pass number.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

/// Basis available for percentage resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentageResolutionContext {
    parent: Option<Size>,
    pass: PassCount,
}

impl PercentageResolutionContext {
    /// Build a context.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidArgument`] unless `pass` is 1 or 2.
    pub fn new(parent: Option<Size>, pass: u8) -> LayoutResult<Self> {
        Ok(Self {
            parent,
            pass: PassCount::new(pass)?,
        })
    }

    /// Parent content size, if known.
    #[must_use]
    pub const fn parent(&self) -> Option<Size> {
        self.parent
    }

    /// Current pass.
    #[must_use]
    pub const fn pass(&self) -> PassCount {
        self.pass
    }
}

/// The outcome of resolving a [`RequestedDimension`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDimension {
    element: ElementIdentity,
    size: Size,
    is_percentage_width: bool,
    is_percentage_height: bool,
    pass: PassCount,
    fallback_reason: Option<String>,
}

impl ResolvedDimension {
    /// Build a resolved dimension.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidArgument`] if `pass` is not 1 or 2, or
    /// the size is non-finite or negative.
    pub fn new(
        element: ElementIdentity,
        size: Size,
        is_percentage_width: bool,
        is_percentage_height: bool,
        pass: u8,
        fallback_reason: Option<String>,
    ) -> LayoutResult<Self> {
        let pass = PassCount::new(pass)?;
        if !(size.width.is_finite() && size.height.is_finite())
            || size.width < 0.0
            || size.height < 0.0
        {
            return Err(LayoutError::invalid_argument(format!(
                "resolved size for {} must be finite and non-negative, got {}x{}",
                element.label, size.width, size.height
            )));
        }
        Ok(Self {
            element,
            size,
            is_percentage_width,
            is_percentage_height,
            pass,
            fallback_reason,
        })
    }

    /// Owning element.
    #[must_use]
    pub const fn element(&self) -> &ElementIdentity {
        &self.element
    }

    /// Resolved size. Unresolved axes are zero.
    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    /// Whether the width was resolved against a percentage basis.
    #[must_use]
    pub const fn is_percentage_width(&self) -> bool {
        self.is_percentage_width
    }

    /// Whether the height was resolved against a percentage basis.
    #[must_use]
    pub const fn is_percentage_height(&self) -> bool {
        self.is_percentage_height
    }

    /// Pass that produced this value.
    #[must_use]
    pub const fn pass(&self) -> PassCount {
        self.pass
    }

    /// Why a percentage could not be resolved, if it could not.
    #[must_use]
    pub fn fallback_reason(&self) -> Option<&str> {
        self.fallback_reason.as_deref()
    }

    /// Whether the request still needs a basis.
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

/// Resolve one request in the given context. Never fails.
#[must_use]
pub fn resolve(
    request: &RequestedDimension,
    context: &PercentageResolutionContext,
) -> ResolvedDimension {
    let mut size = Size::default();
    let mut is_percentage_width = false;
    let mut is_percentage_height = false;
    let mut fallback_reason = None;

    match request.unit {
        DimensionUnit::Absolute => {
            size.width = request.width.unwrap_or(0.0);
            size.height = request.height.unwrap_or(0.0);
        }
        DimensionUnit::Percentage => {
            if let Some(parent) = context.parent {
                if let Some(pct) = request.width {
                    size.width = pct / 100.0 * parent.width;
                    is_percentage_width = true;
                }
                if let Some(pct) = request.height {
                    size.height = pct / 100.0 * parent.height;
                    is_percentage_height = true;
                }
            } else if request.width.is_some() || request.height.is_some() {
                fallback_reason = Some(if context.pass == PassCount::FIRST {
                    format!(
                        "percentage on {} deferred: parent size not yet known",
                        request.element.label
                    )
                } else {
                    format!(
                        "percentage on {} has no basis after the second pass; resolved to auto",
                        request.element.label
                    )
                });
            }
        }
    }

    ResolvedDimension {
        element: request.element.clone(),
        size: Size::new(clamp_resolved(size.width), clamp_resolved(size.height)),
        is_percentage_width,
        is_percentage_height,
        pass: context.pass,
        fallback_reason,
    }
}

fn clamp_resolved(value: f32) -> f32 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

/// Stateful resolver that carries deferred percentages between passes.
#[derive(Debug, Default)]
pub struct DimensionResolver {
    diagnostics: Diagnostics,
    deferred: Vec<RequestedDimension>,
}

impl DimensionResolver {
    /// A resolver that reports fallbacks to `diagnostics`.
    #[must_use]
    pub fn new(diagnostics: Diagnostics) -> Self {
        Self {
            diagnostics,
            deferred: Vec::new(),
        }
    }

    /// Pass 1. A percentage that cannot be resolved is kept for pass 2.
    #[must_use]
    pub fn first_pass(
        &mut self,
        request: RequestedDimension,
        parent: Option<Size>,
    ) -> ResolvedDimension {
        let context = PercentageResolutionContext {
            parent,
            pass: PassCount::FIRST,
        };
        let resolved = resolve(&request, &context);
        if resolved.is_fallback() {
            self.deferred.push(request);
        }
        resolved
    }

    /// Queue a request for pass 2 without attempting pass 1.
    pub fn defer(&mut self, request: RequestedDimension) {
        self.deferred.push(request);
    }

    /// Pass 2 over everything deferred, against `parent`.
    ///
    /// Each remaining fallback emits a `dimension/percentage-fallback` event.
    pub fn resolve_deferred(&mut self, parent: Option<Size>) -> Vec<ResolvedDimension> {
        let context = PercentageResolutionContext {
            parent,
            pass: PassCount::SECOND,
        };
        std::mem::take(&mut self.deferred)
            .iter()
            .map(|request| {
                let resolved = resolve(request, &context);
                if let Some(reason) = resolved.fallback_reason() {
                    self.diagnostics.emit(
                        DiagnosticEvent::new(Category::Dimension, "percentage-fallback")
                            .with("element", &request.element.label)
                            .with("source", request.source().unwrap_or("-"))
                            .with("reason", reason),
                    );
                }
                resolved
            })
            .collect()
    }

    /// Requests waiting for pass 2.
    #[must_use]
    pub fn pending(&self) -> &[RequestedDimension] {
        &self.deferred
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use vellum_common::MemorySink;

    use super::*;

    fn el() -> ElementIdentity {
        ElementIdentity::new(7, "div.content")
    }

    #[test]
    fn test_absolute_ignores_parent() {
        let req = RequestedDimension::absolute(el(), Some(120.0), None).unwrap();
        let ctx = PercentageResolutionContext::new(None, 1).unwrap();
        let out = resolve(&req, &ctx);
        assert_eq!(out.size(), Size::new(120.0, 0.0));
        assert!(!out.is_percentage_width());
        assert!(out.fallback_reason().is_none());
    }

    #[test]
    fn test_percentage_with_parent() {
        let req = RequestedDimension::percentage(el(), Some(50.0), Some(25.0)).unwrap();
        let ctx = PercentageResolutionContext::new(Some(Size::new(400.0, 200.0)), 2).unwrap();
        let out = resolve(&req, &ctx);
        assert_eq!(out.size(), Size::new(200.0, 50.0));
        assert!(out.is_percentage_width());
        assert!(out.is_percentage_height());
        assert_eq!(out.pass().get(), 2);
    }

    #[test]
    fn test_second_pass_fallback_is_reported() {
        let sink = Arc::new(MemorySink::new());
        let mut resolver = DimensionResolver::new(Diagnostics::new(sink.clone()));
        let req = RequestedDimension::percentage(el(), None, Some(50.0))
            .unwrap()
            .with_source("height: 50%");

        let first = resolver.first_pass(req, None);
        assert!(first.is_fallback());
        assert_eq!(resolver.pending().len(), 1);

        let second = resolver.resolve_deferred(None);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].size(), Size::new(0.0, 0.0));
        assert!(second[0].fallback_reason().is_some_and(|r| r.contains("auto")));
        assert!(resolver.pending().is_empty());

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, "percentage-fallback");
        assert_eq!(events[0].get("source"), Some("height: 50%"));
    }

    #[test]
    fn test_negative_request_is_rejected() {
        assert!(matches!(
            RequestedDimension::absolute(el(), Some(-1.0), None),
            Err(LayoutError::InvalidArgument(_))
        ));
        assert!(RequestedDimension::percentage(el(), None, Some(f32::NAN)).is_err());
    }
}
