//! Geometric primitives for BPMN diagram layout.
//!
//! This module provides the geometric types used throughout the layout
//! engine for positions, sizes, bounding boxes and polyline segments.
//!
//! # Overview
//!
//! - [`Point`] - A 2D coordinate in diagram space
//! - [`Size`] - Width and height dimensions
//! - [`Bounds`] - A rectangular bounding box defined by minimum and maximum coordinates
//! - [`Insets`] - Padding/margin values for four sides
//! - [`segments_intersect`] - Orientation based segment intersection test
//!
//! # Coordinate System
//!
//! BPMN DI uses the same coordinate system as SVG:
//!
//! ```text
//!   (0,0) ────────► +X
//!     │
//!     │
//!     ▼
//!    +Y
//! ```
//!
//! Shapes are described by their top-left corner plus a size, which is how
//! [`Bounds`] serializes (`{x, y, width, height}`).

use serde::{Deserialize, Serialize};

/// Tolerance used by the orientation and collinearity tests.
pub const EPSILON: f32 = 1e-4;

/// A 2D point representing a position in diagram coordinate space.
///
/// # Examples
///
/// ```
/// # use bpmn_layout_core::geometry::Point;
/// let p1 = Point::new(10.0, 20.0);
/// let p2 = Point::new(5.0, 5.0);
///
/// let sum = p1.add_point(p2);
/// assert_eq!(sum.x(), 15.0);
/// assert_eq!(sum.y(), 25.0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    x: f32,
    y: f32,
}

impl Point {
    /// Creates a new point with the specified coordinates
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Returns the x-coordinate of the point
    pub fn x(self) -> f32 {
        self.x
    }

    /// Returns the y-coordinate of the point
    pub fn y(self) -> f32 {
        self.y
    }

    /// Creates a new point with the specified x-coordinate
    pub fn with_x(mut self, x: f32) -> Self {
        self.x = x;
        self
    }

    /// Creates a new point with the specified y-coordinate
    pub fn with_y(mut self, y: f32) -> Self {
        self.y = y;
        self
    }

    /// Adds another point to this point, returning a new point
    pub fn add_point(self, other: Point) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    /// Subtracts another point from this point, returning a new point
    pub fn sub_point(self, other: Point) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    /// Calculates the midpoint between this point and another point
    pub fn midpoint(self, other: Point) -> Self {
        Self {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
        }
    }

    /// Euclidean distance to another point
    pub fn distance(self, other: Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Returns true when both coordinates are within `tolerance` of `other`
    pub fn approx_eq(self, other: Point, tolerance: f32) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }

    /// Rounds both coordinates to the nearest multiple of `grid`.
    ///
    /// A non-positive grid leaves the point untouched.
    pub fn snap(self, grid: f32) -> Self {
        if grid <= 0.0 {
            return self;
        }
        Self {
            x: (self.x / grid).round() * grid,
            y: (self.y / grid).round() * grid,
        }
    }
}

/// Represents the dimensions of an element with width and height
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    width: f32,
    height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Returns the width dimension of this size
    pub fn width(self) -> f32 {
        self.width
    }

    /// Returns the height dimension of this size
    pub fn height(self) -> f32 {
        self.height
    }

    /// Returns a new Size with the maximum width and height between this size and another
    pub fn max(self, other: Size) -> Self {
        Self {
            width: self.width.max(other.width),
            height: self.height.max(other.height),
        }
    }

    /// Returns a new Size with padding added to both width and height
    pub fn add_padding(self, insets: Insets) -> Self {
        Self {
            width: self.width + insets.horizontal_sum(),
            height: self.height + insets.vertical_sum(),
        }
    }

    /// Returns true if either dimension is zero or negative
    pub fn is_degenerate(self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// A rectangular bounding box with minimum and maximum coordinates.
///
/// Serializes as the BPMN DI `{x, y, width, height}` quadruple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "DiBounds", into = "DiBounds")]
pub struct Bounds {
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
}

/// Wire shape of [`Bounds`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct DiBounds {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

impl From<DiBounds> for Bounds {
    fn from(raw: DiBounds) -> Self {
        Bounds::new_from_top_left(Point::new(raw.x, raw.y), Size::new(raw.width, raw.height))
    }
}

impl From<Bounds> for DiBounds {
    fn from(bounds: Bounds) -> Self {
        DiBounds {
            x: bounds.min_x,
            y: bounds.min_y,
            width: bounds.width(),
            height: bounds.height(),
        }
    }
}

impl Bounds {
    /// Creates a new bounds from a center point and a size
    pub fn new_from_center(center: Point, size: Size) -> Self {
        let half_width = size.width / 2.0;
        let half_height = size.height / 2.0;
        Self {
            min_x: center.x - half_width,
            min_y: center.y - half_height,
            max_x: center.x + half_width,
            max_y: center.y + half_height,
        }
    }

    /// Creates a new bounds from a top-left point and a size
    pub fn new_from_top_left(top_left: Point, size: Size) -> Self {
        Self {
            min_x: top_left.x,
            min_y: top_left.y,
            max_x: top_left.x + size.width,
            max_y: top_left.y + size.height,
        }
    }

    /// Returns the minimum x-coordinate of the bounds
    pub fn min_x(self) -> f32 {
        self.min_x
    }

    /// Returns the minimum y-coordinate of the bounds
    pub fn min_y(self) -> f32 {
        self.min_y
    }

    /// Returns the maximum x-coordinate of the bounds
    pub fn max_x(self) -> f32 {
        self.max_x
    }

    /// Returns the maximum y-coordinate of the bounds
    pub fn max_y(self) -> f32 {
        self.max_y
    }

    /// Returns the center point of the bounds
    pub fn center(self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Returns the width of the bounds
    pub fn width(self) -> f32 {
        self.max_x - self.min_x
    }

    /// Returns the height of the bounds
    pub fn height(self) -> f32 {
        self.max_y - self.min_y
    }

    /// Returns the top-left corner as a Point
    pub fn min_point(self) -> Point {
        Point {
            x: self.min_x,
            y: self.min_y,
        }
    }

    /// Converts bounds to a Size object
    pub fn to_size(self) -> Size {
        Size {
            width: self.width(),
            height: self.height(),
        }
    }

    /// Returns a copy moved so that its top-left corner is `top_left`
    pub fn with_top_left(self, top_left: Point) -> Self {
        Self::new_from_top_left(top_left, self.to_size())
    }

    /// Returns a copy moved so that its center is `center`
    pub fn with_center(self, center: Point) -> Self {
        Self::new_from_center(center, self.to_size())
    }

    /// Returns a copy with the same top-left corner and a new size
    pub fn with_size(self, size: Size) -> Self {
        Self::new_from_top_left(self.min_point(), size)
    }

    /// Merges two bounds to create a larger bounds that contains both.
    ///
    /// # Examples
    ///
    /// ```
    /// # use bpmn_layout_core::geometry::{Bounds, Point, Size};
    /// let task = Bounds::new_from_top_left(Point::new(0.0, 0.0), Size::new(100.0, 80.0));
    /// let event = Bounds::new_from_top_left(Point::new(150.0, 22.0), Size::new(36.0, 36.0));
    ///
    /// let combined = task.merge(&event);
    /// assert_eq!(combined.width(), 186.0);
    /// assert_eq!(combined.height(), 80.0);
    /// ```
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Moves the bounds by the specified offset
    pub fn translate(&self, offset: Point) -> Self {
        Self {
            min_x: self.min_x + offset.x,
            min_y: self.min_y + offset.y,
            max_x: self.max_x + offset.x,
            max_y: self.max_y + offset.y,
        }
    }

    /// Expands the bounds by adding insets.
    pub fn add_padding(&self, insets: Insets) -> Self {
        Self {
            min_x: self.min_x - insets.left(),
            min_y: self.min_y - insets.top(),
            max_x: self.max_x + insets.right(),
            max_y: self.max_y + insets.bottom(),
        }
    }

    /// Returns true if the point lies inside or on the border of the bounds
    pub fn contains_point(self, point: Point) -> bool {
        point.x >= self.min_x && point.x <= self.max_x && point.y >= self.min_y && point.y <= self.max_y
    }

    /// Returns true if `other` lies completely inside these bounds, allowing
    /// `tolerance` pixels of overhang on every side.
    pub fn contains_bounds(self, other: Bounds, tolerance: f32) -> bool {
        other.min_x >= self.min_x - tolerance
            && other.min_y >= self.min_y - tolerance
            && other.max_x <= self.max_x + tolerance
            && other.max_y <= self.max_y + tolerance
    }

    /// Returns true if the interiors of the two bounds overlap.
    ///
    /// Rectangles that only touch along an edge do not intersect.
    pub fn intersects(self, other: Bounds) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }

    /// Returns the area shared by two bounds, zero if they do not overlap
    pub fn overlap_area(self, other: Bounds) -> f32 {
        let width = (self.max_x.min(other.max_x) - self.min_x.max(other.min_x)).max(0.0);
        let height = (self.max_y.min(other.max_y) - self.min_y.max(other.min_y)).max(0.0);
        width * height
    }

    /// Returns true if the horizontal extents of both bounds overlap
    pub fn overlaps_horizontally(self, other: Bounds) -> bool {
        self.min_x < other.max_x && other.min_x < self.max_x
    }

    /// Returns the point on the border of the bounds where the ray from the
    /// center towards `target` leaves the rectangle.
    ///
    /// When `target` coincides with the center the center itself is returned.
    pub fn border_point_towards(self, target: Point) -> Point {
        let center = self.center();
        let dx = target.x - center.x;
        let dy = target.y - center.y;
        if dx.abs() < EPSILON && dy.abs() < EPSILON {
            return center;
        }

        let half_width = self.width() / 2.0;
        let half_height = self.height() / 2.0;
        let scale_x = if dx.abs() < EPSILON {
            f32::INFINITY
        } else {
            half_width / dx.abs()
        };
        let scale_y = if dy.abs() < EPSILON {
            f32::INFINITY
        } else {
            half_height / dy.abs()
        };
        let scale = scale_x.min(scale_y);
        Point::new(center.x + dx * scale, center.y + dy * scale)
    }

    /// Returns true if the segment crosses the interior of the bounds.
    ///
    /// Segments that only run along the border are not considered crossing.
    pub fn intersects_segment(self, segment: Segment) -> bool {
        let (a, b) = (segment.start(), segment.end());
        let inner = Bounds {
            min_x: self.min_x + 0.5,
            min_y: self.min_y + 0.5,
            max_x: self.max_x - 0.5,
            max_y: self.max_y - 0.5,
        };
        if inner.width() <= 0.0 || inner.height() <= 0.0 {
            return false;
        }
        if inner.contains_point(a) || inner.contains_point(b) {
            return true;
        }
        let corners = [
            Point::new(inner.min_x, inner.min_y),
            Point::new(inner.max_x, inner.min_y),
            Point::new(inner.max_x, inner.max_y),
            Point::new(inner.min_x, inner.max_y),
        ];
        (0..4).any(|i| segment.intersects(Segment::new(corners[i], corners[(i + 1) % 4])))
    }

    /// Rounds the top-left corner to the grid, keeping the size
    pub fn snap(self, grid: f32) -> Self {
        self.with_top_left(self.min_point().snap(grid))
    }
}

/// Represents spacing around an element (padding, margin, etc.)
/// with potentially different values for each side
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Insets {
    top: f32,
    right: f32,
    bottom: f32,
    left: f32,
}

impl Insets {
    /// Creates new insets with specified values for each side
    pub fn new(top: f32, right: f32, bottom: f32, left: f32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    /// Creates uniform insets with the same value for all sides
    pub fn uniform(value: f32) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }

    /// Returns the top inset value
    pub fn top(self) -> f32 {
        self.top
    }

    /// Returns the right inset value
    pub fn right(self) -> f32 {
        self.right
    }

    /// Returns the bottom inset value
    pub fn bottom(self) -> f32 {
        self.bottom
    }

    /// Returns the left inset value
    pub fn left(self) -> f32 {
        self.left
    }

    /// Returns the sum of left and right insets
    pub fn horizontal_sum(self) -> f32 {
        self.left + self.right
    }

    /// Returns the sum of top and bottom insets
    pub fn vertical_sum(self) -> f32 {
        self.top + self.bottom
    }
}

/// A straight line segment between two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    start: Point,
    end: Point,
}

impl Segment {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn start(self) -> Point {
        self.start
    }

    pub fn end(self) -> Point {
        self.end
    }

    /// Returns true if the two segments share an endpoint (within tolerance)
    pub fn shares_endpoint(self, other: Segment) -> bool {
        const TOUCH: f32 = 0.5;
        self.start.approx_eq(other.start, TOUCH)
            || self.start.approx_eq(other.end, TOUCH)
            || self.end.approx_eq(other.start, TOUCH)
            || self.end.approx_eq(other.end, TOUCH)
    }

    /// Orientation and collinear-overlap intersection test.
    ///
    /// See [`segments_intersect`].
    pub fn intersects(self, other: Segment) -> bool {
        segments_intersect(self.start, self.end, other.start, other.end)
    }

    /// Length of the segment
    pub fn length(self) -> f32 {
        self.start.distance(self.end)
    }
}

/// Splits a polyline into consecutive segments.
pub fn polyline_segments(points: &[Point]) -> impl Iterator<Item = Segment> + '_ {
    points.windows(2).map(|pair| Segment::new(pair[0], pair[1]))
}

/// Returns the point half way along a polyline, measured by length.
///
/// Returns `None` for polylines with fewer than two points.
pub fn polyline_midpoint(points: &[Point]) -> Option<Point> {
    if points.len() < 2 {
        return None;
    }
    let total: f32 = polyline_segments(points).map(Segment::length).sum();
    let mut remaining = total / 2.0;
    for segment in polyline_segments(points) {
        let length = segment.length();
        if length >= remaining && length > 0.0 {
            let t = remaining / length;
            let (a, b) = (segment.start, segment.end);
            return Some(Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t));
        }
        remaining -= length;
    }
    points.last().copied()
}

/// Tests whether segment `a-b` intersects segment `c-d`.
///
/// Uses the orientation (cross product) test for proper crossings and an
/// on-segment check for the collinear and touching cases.
///
/// # Examples
///
/// ```
/// # use bpmn_layout_core::geometry::{Point, segments_intersect};
/// let crossing = segments_intersect(
///     Point::new(0.0, 0.0),
///     Point::new(10.0, 10.0),
///     Point::new(0.0, 10.0),
///     Point::new(10.0, 0.0),
/// );
/// assert!(crossing);
/// ```
pub fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    fn orient(a: Point, b: Point, c: Point) -> f32 {
        (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
    }
    fn on_segment(a: Point, b: Point, c: Point) -> bool {
        c.x >= a.x.min(b.x) - EPSILON
            && c.x <= a.x.max(b.x) + EPSILON
            && c.y >= a.y.min(b.y) - EPSILON
            && c.y <= a.y.max(b.y) + EPSILON
    }

    let o1 = orient(a, b, c);
    let o2 = orient(a, b, d);
    let o3 = orient(c, d, a);
    let o4 = orient(c, d, b);

    if ((o1 > EPSILON && o2 < -EPSILON) || (o1 < -EPSILON && o2 > EPSILON))
        && ((o3 > EPSILON && o4 < -EPSILON) || (o3 < -EPSILON && o4 > EPSILON))
    {
        return true;
    }

    (o1.abs() <= EPSILON && on_segment(a, b, c))
        || (o2.abs() <= EPSILON && on_segment(a, b, d))
        || (o3.abs() <= EPSILON && on_segment(c, d, a))
        || (o4.abs() <= EPSILON && on_segment(c, d, b))
}
