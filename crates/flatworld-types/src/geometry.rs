//! Point and shape value types.
//!
//! Both types are immutable values: every "mutation" produces a new value.
//! Overlap predicates between shapes live in `flatworld-world`, next to the
//! spatial index that uses the same primitives.

use core::ops::{Add, Div, Mul, Sub};

use serde::{Deserialize, Serialize};

/// A location in the two-dimensional plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// The origin `(0, 0)`.
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    /// Create a point from its coordinates.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance_to(self, other: Self) -> f64 {
        self.distance_squared_to(other).sqrt()
    }

    /// Squared Euclidean distance to `other`.
    ///
    /// Preferred for radius comparisons since it avoids the square root.
    pub fn distance_squared_to(self, other: Self) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Clamp both coordinates into `[0, max_x] x [0, max_y]`.
    #[must_use]
    pub fn clamped(self, max_x: f64, max_y: f64) -> Self {
        Self {
            x: clamp_axis(self.x, max_x),
            y: clamp_axis(self.y, max_y),
        }
    }

    /// Return `true` if both coordinates are finite.
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Clamp into `[0, max]` without panicking on degenerate bounds.
fn clamp_axis(value: f64, max: f64) -> f64 {
    if value < 0.0 {
        0.0
    } else if value > max {
        max
    } else {
        value
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f64> for Point {
    type Output = Self;

    fn div(self, rhs: f64) -> Self {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

impl core::fmt::Display for Point {
    /// Formats as `(x, y)`. A precision (`{:.3}`) is applied to both
    /// coordinates.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match f.precision() {
            Some(p) => write!(f, "({:.*}, {:.*})", p, self.x, p, self.y),
            None => write!(f, "({}, {})", self.x, self.y),
        }
    }
}

/// Which outline a [`Shape`] has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    /// Axis-aligned rectangle centered on the shape position.
    Rectangle,
    /// Axis-aligned ellipse centered on the shape position.
    Ellipse,
}

/// An axis-aligned rectangle or ellipse centered on `position`.
///
/// `width` and `height` are full extents (diameters for ellipses), not
/// half extents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    /// Center of the shape.
    pub position: Point,
    /// Full horizontal extent.
    pub width: f64,
    /// Full vertical extent.
    pub height: f64,
    /// Outline of the shape.
    pub kind: ShapeKind,
}

impl Shape {
    /// Create a shape from all of its parts.
    pub const fn new(position: Point, width: f64, height: f64, kind: ShapeKind) -> Self {
        Self {
            position,
            width,
            height,
            kind,
        }
    }

    /// Create an axis-aligned rectangle.
    pub const fn rectangle(position: Point, width: f64, height: f64) -> Self {
        Self::new(position, width, height, ShapeKind::Rectangle)
    }

    /// Create an axis-aligned ellipse.
    pub const fn ellipse(position: Point, width: f64, height: f64) -> Self {
        Self::new(position, width, height, ShapeKind::Ellipse)
    }

    /// Create a circle with the given diameter.
    pub const fn circle(position: Point, diameter: f64) -> Self {
        Self::ellipse(position, diameter, diameter)
    }

    /// Return `true` if the shape is an ellipse.
    pub const fn is_ellipse(&self) -> bool {
        matches!(self.kind, ShapeKind::Ellipse)
    }

    /// The same shape moved to `position`.
    #[must_use]
    pub const fn with_position(self, position: Point) -> Self {
        Self { position, ..self }
    }

    /// Half of the width.
    pub fn half_width(&self) -> f64 {
        self.width / 2.0
    }

    /// Half of the height.
    pub fn half_height(&self) -> f64 {
        self.height / 2.0
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn distance_of_scaled_right_triangles() {
        assert_eq!(Point::new(5.0, 3.0).distance_to(Point::new(9.0, 6.0)), 5.0);
        assert_eq!(Point::new(5.0, 3.0).distance_to(Point::new(1.0, 0.0)), 5.0);
        assert_eq!(Point::new(-8.0, 12.0).distance_to(Point::new(-4.0, 15.0)), 5.0);
        assert_eq!(Point::new(-2.0, -2.0).distance_to(Point::new(1.0, 2.0)), 5.0);
    }

    #[test]
    fn squared_distance_skips_the_root() {
        let a = Point::new(1.0, 1.0);
        let b = Point::new(4.0, 5.0);
        assert_eq!(a.distance_squared_to(b), 25.0);
        assert_eq!(b.distance_squared_to(a), 25.0);
    }

    #[test]
    fn clamped_keeps_points_inside_bounds() {
        assert_eq!(Point::new(1001.0, 0.0).clamped(100.0, 100.0), Point::new(100.0, 0.0));
        assert_eq!(Point::new(-5.0, 250.0).clamped(100.0, 200.0), Point::new(0.0, 200.0));
        assert_eq!(Point::new(40.0, 60.0).clamped(100.0, 100.0), Point::new(40.0, 60.0));
    }

    #[test]
    fn point_arithmetic() {
        let p = Point::new(2.0, 3.0) + Point::new(1.0, -1.0);
        assert_eq!(p, Point::new(3.0, 2.0));
        assert_eq!(p - Point::new(3.0, 2.0), Point::ORIGIN);
        assert_eq!(p * 2.0, Point::new(6.0, 4.0));
        assert_eq!(p / 2.0, Point::new(1.5, 1.0));
    }

    #[test]
    fn display_honours_precision() {
        let p = Point::new(1.0 / 3.0, 2.0);
        assert_eq!(format!("{p:.3}"), "(0.333, 2.000)");
        assert_eq!(Point::new(1.5, 2.0).to_string(), "(1.5, 2)");
    }

    #[test]
    fn with_position_keeps_extent() {
        let shape = Shape::ellipse(Point::new(1.0, 1.0), 3.0, 2.0);
        let moved = shape.with_position(Point::new(5.0, 5.0));
        assert_eq!(moved.position, Point::new(5.0, 5.0));
        assert_eq!(moved.width, 3.0);
        assert_eq!(moved.height, 2.0);
        assert!(moved.is_ellipse());
    }

    #[test]
    fn shape_serializes_kind_in_snake_case() {
        let shape = Shape::rectangle(Point::new(0.0, 0.0), 1.0, 2.0);
        let json = serde_json::to_value(shape).unwrap_or_default();
        assert_eq!(json["kind"], "rectangle");
    }
}
