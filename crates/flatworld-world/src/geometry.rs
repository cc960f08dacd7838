//! Overlap predicates between shapes and the rectangles of the index.
//!
//! Every shape is axis-aligned and centered on its position. The
//! ellipse tests rescale the plane so that one ellipse becomes a circle,
//! which keeps them cheap at the cost of being approximate for strongly
//! eccentric ellipses.

use flatworld_types::{Point, Shape, ShapeKind};
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle stored by its corners.
///
/// Used for the cells of the spatial index. Adjacent cells computed from
/// the same parent share bit-identical edges, so every point inside the
/// parent is contained by at least one child.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Corner with the smallest coordinates.
    pub min: Point,
    /// Corner with the largest coordinates.
    pub max: Point,
}

impl Rect {
    /// Create a rectangle from its two corners.
    pub const fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// Create the rectangle `[0, width] x [0, height]`.
    pub const fn from_size(width: f64, height: f64) -> Self {
        Self::new(Point::ORIGIN, Point::new(width, height))
    }

    /// Horizontal extent.
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Vertical extent.
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Center point.
    pub fn center(&self) -> Point {
        Point::new(
            self.min.x + self.width() / 2.0,
            self.min.y + self.height() / 2.0,
        )
    }

    /// Return `true` if `point` lies inside or on the border.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Return `true` if the circle around `center` reaches this rectangle.
    pub fn overlaps_circle(&self, center: Point, radius: f64) -> bool {
        circle_overlaps_rectangle(center, radius, self.center(), self.width(), self.height())
    }
}

/// Test whether a circle and an axis-aligned rectangle intersect.
///
/// The rectangle is given by its center and full extents. Touching
/// counts as overlapping.
pub fn circle_overlaps_rectangle(
    circle_center: Point,
    radius: f64,
    rect_center: Point,
    width: f64,
    height: f64,
) -> bool {
    let dx = (circle_center.x - rect_center.x).abs();
    let dy = (circle_center.y - rect_center.y).abs();
    let half_w = width / 2.0;
    let half_h = height / 2.0;

    if dx > half_w + radius || dy > half_h + radius {
        return false;
    }
    if dx <= half_w || dy <= half_h {
        return true;
    }

    let corner_x = dx - half_w;
    let corner_y = dy - half_h;
    corner_x.mul_add(corner_x, corner_y * corner_y) <= radius * radius
}

/// Test whether two shapes overlap, dispatching on their kinds.
pub fn shapes_overlap(a: &Shape, b: &Shape) -> bool {
    match (a.kind, b.kind) {
        (ShapeKind::Rectangle, ShapeKind::Rectangle) => rectangles_overlap(a, b),
        (ShapeKind::Ellipse, ShapeKind::Ellipse) => ellipses_overlap(a, b),
        (ShapeKind::Ellipse, ShapeKind::Rectangle) => ellipse_overlaps_rectangle(a, b),
        (ShapeKind::Rectangle, ShapeKind::Ellipse) => ellipse_overlaps_rectangle(b, a),
    }
}

/// Separating-axis test for two axis-aligned rectangles.
///
/// Strict: rectangles that only share an edge do not overlap.
pub fn rectangles_overlap(a: &Shape, b: &Shape) -> bool {
    let dx = (a.position.x - b.position.x).abs();
    let dy = (a.position.y - b.position.y).abs();
    dx < a.half_width() + b.half_width() && dy < a.half_height() + b.half_height()
}

/// Approximate test for two axis-aligned ellipses.
///
/// The plane is translated so `a` sits at the origin and scaled
/// vertically so `b` becomes a circle. The support distance of the
/// rescaled `a` along the line of centers plus the radius of `b` is then
/// compared with the distance between the centers.
pub fn ellipses_overlap(a: &Shape, b: &Shape) -> bool {
    let relation = b.width / b.height;
    if !relation.is_finite() {
        return false;
    }

    let x = b.position.x - a.position.x;
    let y = (b.position.y - a.position.y) * relation;
    let a_height = a.height * relation;

    // Vertical line of centers: atan(y / 0) is undefined.
    let angle = if x == 0.0 {
        core::f64::consts::FRAC_PI_2
    } else {
        (y / x).atan()
    };

    let support_x = a.width / 2.0 * angle.cos();
    let support_y = a_height / 2.0 * angle.sin();
    let support = support_x.hypot(support_y);
    let radius = b.width / 2.0;

    support + radius > x.hypot(y)
}

/// Approximate test for an ellipse against an axis-aligned rectangle.
///
/// The plane is scaled vertically so the ellipse becomes a circle whose
/// radius is `ellipse.width`, not half of it; the rectangle is scaled the
/// same way.
pub fn ellipse_overlaps_rectangle(ellipse: &Shape, rect: &Shape) -> bool {
    let relation = ellipse.width / ellipse.height;
    if !relation.is_finite() {
        return false;
    }

    let circle_center = Point::new(ellipse.position.x, ellipse.position.y * relation);
    let rect_center = Point::new(rect.position.x, rect.position.y * relation);
    circle_overlaps_rectangle(
        circle_center,
        ellipse.width,
        rect_center,
        rect.width,
        rect.height * relation,
    )
}
