//! Planar geometry used by the index and the RkNN query engines.
//!
//! Stored geometries are points, axis-aligned rectangles (node bounding
//! boxes) and simple polygons. Query regions (circles, angular sectors and
//! their unions) live in [`region`] and are only ever built per query.

mod region;

pub use region::{Circle, Region, RegionUnion, Sector};

use crate::errors::{RknnError, RknnResult};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// A 2D point (x, y).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "POINT({} {})", self.x, self.y)
    }
}

// ============================================================================
// Rectangles
// ============================================================================

/// Axis-aligned minimum bounding rectangle.
///
/// An empty rectangle (the bounding box of nothing) is represented with
/// inverted infinite bounds so that `union` with any rectangle yields that
/// rectangle unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Rect {
    /// Creates a rectangle, normalizing the corner order.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            min_x: x1.min(x2),
            min_y: y1.min(y2),
            max_x: x1.max(x2),
            max_y: y1.max(y2),
        }
    }

    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    pub fn from_point(p: &Point) -> Self {
        Self::new(p.x, p.y, p.x, p.y)
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// Area of the rectangle; zero for empty and degenerate rectangles.
    pub fn area(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        (self.max_x - self.min_x) * (self.max_y - self.min_y)
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Area increase needed to cover `other`.
    pub fn enlargement(&self, other: &Rect) -> f64 {
        self.union(other).area() - self.area()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    /// Minimum distance from a point to the rectangle (0 when inside).
    pub fn min_distance(&self, p: &Point) -> f64 {
        if self.is_empty() {
            return f64::INFINITY;
        }
        let closest = Point::new(
            p.x.clamp(self.min_x, self.max_x),
            p.y.clamp(self.min_y, self.max_y),
        );
        p.distance(&closest)
    }

    /// Minimum distance between two rectangles (0 when they touch).
    pub fn distance(&self, other: &Rect) -> f64 {
        if self.is_empty() || other.is_empty() {
            return f64::INFINITY;
        }
        let dx = (other.min_x - self.max_x).max(self.min_x - other.max_x).max(0.0);
        let dy = (other.min_y - self.max_y).max(self.min_y - other.max_y).max(0.0);
        (dx * dx + dy * dy).sqrt()
    }

    /// Length of the diagonal; zero for empty rectangles.
    pub fn diagonal(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        Point::new(self.min_x, self.min_y).distance(&Point::new(self.max_x, self.max_y))
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Corners in counter-clockwise order starting at the lower left.
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.min_x, self.min_y),
            Point::new(self.max_x, self.min_y),
            Point::new(self.max_x, self.max_y),
            Point::new(self.min_x, self.max_y),
        ]
    }
}

impl Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ENVELOPE({}, {}, {}, {})",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

// ============================================================================
// Polygons
// ============================================================================

/// A simple polygon given by its exterior ring (closing vertex optional).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    ring: Vec<Point>,
}

impl Polygon {
    /// Creates a polygon; at least three distinct vertices are required.
    pub fn new(mut ring: Vec<Point>) -> RknnResult<Self> {
        if ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }
        if ring.len() < 3 {
            return Err(RknnError::InvalidGeometry(format!(
                "polygon needs at least 3 vertices, got {}",
                ring.len()
            )));
        }
        Ok(Self { ring })
    }

    pub fn vertices(&self) -> &[Point] {
        &self.ring
    }

    pub fn bounding_rect(&self) -> Rect {
        self.ring
            .iter()
            .fold(Rect::empty(), |acc, p| acc.union(&Rect::from_point(p)))
    }

    /// Point-in-polygon test; points on the boundary count as inside.
    pub fn contains_point(&self, p: &Point) -> bool {
        if edges(&self.ring).any(|(a, b)| on_segment(p, &a, &b)) {
            return true;
        }
        point_in_ring(p, &self.ring)
    }
}

impl Display for Polygon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "POLYGON((")?;
        for (i, c) in self.ring.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", c.x, c.y)?;
        }
        write!(f, "))")
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Geometry stored in a node: the raw input of a data node or the bounding
/// rectangle of a leaf/internal node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Point(Point),
    Rect(Rect),
    Polygon(Polygon),
}

impl Geometry {
    pub fn point(x: f64, y: f64) -> Self {
        Geometry::Point(Point::new(x, y))
    }

    pub fn rect(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Geometry::Rect(Rect::new(x1, y1, x2, y2))
    }

    pub fn polygon(ring: Vec<Point>) -> RknnResult<Self> {
        Ok(Geometry::Polygon(Polygon::new(ring)?))
    }

    pub fn as_point(&self) -> Option<&Point> {
        match self {
            Geometry::Point(p) => Some(p),
            _ => None,
        }
    }

    pub fn bounding_rect(&self) -> Rect {
        match self {
            Geometry::Point(p) => Rect::from_point(p),
            Geometry::Rect(r) => *r,
            Geometry::Polygon(poly) => poly.bounding_rect(),
        }
    }

    /// Vertices describing the shape (a single vertex for points).
    pub fn vertices(&self) -> Vec<Point> {
        match self {
            Geometry::Point(p) => vec![*p],
            Geometry::Rect(r) if r.is_empty() => Vec::new(),
            Geometry::Rect(r) => r.corners().to_vec(),
            Geometry::Polygon(poly) => poly.vertices().to_vec(),
        }
    }

    /// Distance from the shape to a point, zero when the point is inside.
    pub fn distance_to_point(&self, p: &Point) -> f64 {
        match self {
            Geometry::Point(q) => q.distance(p),
            Geometry::Rect(r) => r.min_distance(p),
            Geometry::Polygon(poly) => {
                if poly.contains_point(p) {
                    0.0
                } else {
                    edges(poly.vertices())
                        .map(|(a, b)| segment_distance(p, &a, &b))
                        .fold(f64::INFINITY, f64::min)
                }
            }
        }
    }

    /// Minimum distance between two geometries, zero when they intersect.
    pub fn distance(&self, other: &Geometry) -> f64 {
        match (self, other) {
            (Geometry::Point(p), g) | (g, Geometry::Point(p)) => g.distance_to_point(p),
            _ => {
                if self.intersects(other) {
                    return 0.0;
                }
                let a = self.vertices();
                let b = other.vertices();
                let from_a = a
                    .iter()
                    .map(|p| other.distance_to_point(p))
                    .fold(f64::INFINITY, f64::min);
                let from_b = b
                    .iter()
                    .map(|p| self.distance_to_point(p))
                    .fold(f64::INFINITY, f64::min);
                from_a.min(from_b)
            }
        }
    }
}

impl Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Geometry::Point(p) => write!(f, "{}", p),
            Geometry::Rect(r) => write!(f, "{}", r),
            Geometry::Polygon(poly) => write!(f, "{}", poly),
        }
    }
}

impl From<Point> for Geometry {
    fn from(p: Point) -> Self {
        Geometry::Point(p)
    }
}

impl From<Rect> for Geometry {
    fn from(r: Rect) -> Self {
        Geometry::Rect(r)
    }
}

// ============================================================================
// Segment helpers
// ============================================================================

/// Closed edges of a ring, wrapping around to the first vertex.
pub(crate) fn edges(ring: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    let n = ring.len();
    (0..n).map(move |i| (ring[i], ring[(i + 1) % n]))
}

/// Ray casting; boundary points are not handled here.
fn point_in_ring(p: &Point, ring: &[Point]) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let n = ring.len();
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (ring[i], ring[j]);
        if ((pi.y > p.y) != (pj.y > p.y))
            && (p.x < (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Orientation of the ordered triple: > 0 counter-clockwise, < 0 clockwise, 0 collinear.
pub(crate) fn orientation(a: &Point, b: &Point, c: &Point) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Whether `p` lies on the closed segment `a`-`b`.
pub fn on_segment(p: &Point, a: &Point, b: &Point) -> bool {
    orientation(a, b, p) == 0.0
        && p.x >= a.x.min(b.x)
        && p.x <= a.x.max(b.x)
        && p.y >= a.y.min(b.y)
        && p.y <= a.y.max(b.y)
}

/// Whether closed segments `p1`-`p2` and `q1`-`q2` share at least one point.
pub fn segments_intersect(p1: &Point, p2: &Point, q1: &Point, q2: &Point) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    on_segment(p1, q1, q2) || on_segment(p2, q1, q2) || on_segment(q1, p1, p2) || on_segment(q2, p1, p2)
}

/// Whether the segments cross at a single interior point of both.
pub(crate) fn segments_cross_properly(p1: &Point, p2: &Point, q1: &Point, q2: &Point) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);
    d1 * d2 < 0.0 && d3 * d4 < 0.0
}

/// Distance from `p` to the closed segment `a`-`b`.
pub fn segment_distance(p: &Point, a: &Point, b: &Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0);
    p.distance(&Point::new(a.x + t * dx, a.y + t * dy))
}
