//! Geometry value types: rectangles, sizes, points, and edge sizes.
//!
//! [CSS Box Model Module Level 3](https://www.w3.org/TR/css-box-3/)
//!
//! All lengths are in points. [`Rect`] is validated on construction and
//! immutable afterwards; clamping only happens through the explicit
//! [`Rect::safe`], [`safe`], [`clamp_min`] and [`clamp_max`] helpers.

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, LayoutResult};

/// A rectangle positioned in 2D page space.
///
/// [§ 3 The CSS Box Model](https://www.w3.org/TR/css-box-3/#box-model)
///
/// Every coordinate is finite and both sizes are non-negative. The only way
/// to build one is [`Rect::new`], which rejects anything else, or
/// [`Rect::safe`], which clamps on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

impl Rect {
    /// The empty rectangle at the origin.
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    };

    /// Build a rectangle, validating every field.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidGeometry`] if any value is NaN or
    /// infinite, or if `width` or `height` is negative.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> LayoutResult<Self> {
        let fields = [("x", x), ("y", y), ("width", width), ("height", height)];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(LayoutError::invalid_geometry(format!(
                "rect {name} must be finite, got {value}"
            )));
        }
        if width < 0.0 || height < 0.0 {
            return Err(LayoutError::invalid_geometry(format!(
                "rect size must be non-negative, got {width}x{height}"
            )));
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Build a rectangle, replacing non-finite values with zero and
    /// negative sizes with zero.
    #[must_use]
    pub fn safe(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x: safe(x),
            y: safe(y),
            width: clamp_min(safe(width), 0.0),
            height: clamp_min(safe(height), 0.0),
        }
    }

    /// Horizontal position of the top-left corner.
    #[must_use]
    pub const fn x(&self) -> f32 {
        self.x
    }

    /// Vertical position of the top-left corner.
    #[must_use]
    pub const fn y(&self) -> f32 {
        self.y
    }

    /// Width of the rectangle.
    #[must_use]
    pub const fn width(&self) -> f32 {
        self.width
    }

    /// Height of the rectangle.
    #[must_use]
    pub const fn height(&self) -> f32 {
        self.height
    }

    /// Right edge (`x + width`).
    #[must_use]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Bottom edge (`y + height`).
    #[must_use]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Size of the rectangle.
    #[must_use]
    pub const fn size(&self) -> Size {
        Size {
            width: self.width,
            height: self.height,
        }
    }

    /// Move the rectangle by `(dx, dy)`.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidGeometry`] if the moved position is
    /// not finite.
    pub fn translate(&self, dx: f32, dy: f32) -> LayoutResult<Self> {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// [§ 3.2 Padding](https://www.w3.org/TR/css-box-3/#paddings)
    ///
    /// Shrink the rectangle by `edges` on each side, e.g. from a border box
    /// to a content box.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::InvalidGeometry`] if the edges are larger than
    /// the rectangle.
    pub fn inset(&self, edges: &EdgeSizes) -> LayoutResult<Self> {
        Self::new(
            self.x + edges.left,
            self.y + edges.top,
            self.width - edges.horizontal(),
            self.height - edges.vertical(),
        )
    }
}

/// A width/height pair in points.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    /// Horizontal extent.
    pub width: f32,
    /// Vertical extent.
    pub height: f32,
}

impl Size {
    /// A4 portrait, in points.
    pub const A4: Self = Self::new(595.0, 842.0);

    /// US Letter portrait, in points.
    pub const LETTER: Self = Self::new(612.0, 792.0);

    /// Create a size.
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// A point in page space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f32,
    /// Vertical coordinate.
    pub y: f32,
}

/// Edge sizes for padding, border, or margin.
///
/// [§ 3 The CSS Box Model](https://www.w3.org/TR/css-box-3/#box-model)
///
/// Margins may be negative; padding and border widths never are.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeSizes {
    /// Top edge size.
    pub top: f32,
    /// Right edge size.
    pub right: f32,
    /// Bottom edge size.
    pub bottom: f32,
    /// Left edge size.
    pub left: f32,
}

impl EdgeSizes {
    /// All four sides zero.
    pub const ZERO: Self = Self::uniform(0.0);

    /// The same size on all four sides.
    #[must_use]
    pub const fn uniform(value: f32) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }

    /// Create edge sizes in CSS order (top, right, bottom, left).
    #[must_use]
    pub const fn new(top: f32, right: f32, bottom: f32, left: f32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    /// `top + bottom`.
    #[must_use]
    pub fn vertical(&self) -> f32 {
        self.top + self.bottom
    }

    /// `left + right`.
    #[must_use]
    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    /// Whether every side is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.top == 0.0 && self.right == 0.0 && self.bottom == 0.0 && self.left == 0.0
    }

    /// Side-wise sum.
    #[must_use]
    pub fn plus(&self, other: &Self) -> Self {
        Self {
            top: self.top + other.top,
            right: self.right + other.right,
            bottom: self.bottom + other.bottom,
            left: self.left + other.left,
        }
    }
}

/// Replace a non-finite value with zero.
#[must_use]
pub fn safe(value: f32) -> f32 {
    if value.is_finite() { value } else { 0.0 }
}

/// Raise `value` to at least `min`. NaN becomes `min`.
#[must_use]
pub fn clamp_min(value: f32, min: f32) -> f32 {
    if value.is_nan() { min } else { value.max(min) }
}

/// Lower `value` to at most `max`. NaN becomes `max`.
#[must_use]
pub fn clamp_max(value: f32, max: f32) -> f32 {
    if value.is_nan() { max } else { value.min(max) }
}
