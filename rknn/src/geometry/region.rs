//! Query regions: anything a range query or a pruning test can be run against.

use super::{edges, on_segment, segment_distance, segments_cross_properly, segments_intersect};
use super::{Geometry, Point, Rect};
use crate::errors::{RknnError, RknnResult};
use std::f64::consts::{PI, TAU};

/// Angular slack used when classifying directions against sector bounds.
const ANGLE_EPSILON: f64 = 1e-12;

/// A closed region of the plane.
///
/// Implementors provide point and segment tests plus an interior anchor
/// point; shape-level `intersects` and `contains` are derived from those.
pub trait Region {
    /// True when the region contains no points at all.
    fn is_empty(&self) -> bool;

    fn contains_point(&self, p: &Point) -> bool;

    fn intersects_segment(&self, a: &Point, b: &Point) -> bool;

    /// Some point inside the region, `None` when empty.
    fn anchor(&self) -> Option<Point>;

    /// Whether the region and the geometry share at least one point.
    fn intersects(&self, geometry: &Geometry) -> bool {
        if self.is_empty() {
            return false;
        }
        match geometry {
            Geometry::Point(p) => self.contains_point(p),
            Geometry::Rect(r) if r.is_empty() => false,
            Geometry::Rect(r) => {
                let corners = r.corners();
                let crossed = edges(&corners).any(|(a, b)| self.intersects_segment(&a, &b));
                crossed || self.anchor().is_some_and(|p| r.contains_point(&p))
            }
            Geometry::Polygon(poly) => {
                edges(poly.vertices()).any(|(a, b)| self.intersects_segment(&a, &b))
                    || self.anchor().is_some_and(|p| poly.contains_point(&p))
            }
        }
    }

    /// Whether the geometry lies entirely inside the region.
    ///
    /// The default checks every vertex, which is exact for convex regions.
    fn contains(&self, geometry: &Geometry) -> bool {
        if self.is_empty() {
            return false;
        }
        let vertices = geometry.vertices();
        !vertices.is_empty() && vertices.iter().all(|p| self.contains_point(p))
    }
}

// ============================================================================
// Stored geometries as regions
// ============================================================================

impl Region for Rect {
    fn is_empty(&self) -> bool {
        Rect::is_empty(self)
    }

    fn contains_point(&self, p: &Point) -> bool {
        Rect::contains_point(self, p)
    }

    fn intersects_segment(&self, a: &Point, b: &Point) -> bool {
        if Rect::contains_point(self, a) || Rect::contains_point(self, b) {
            return true;
        }
        let corners = self.corners();
        let hit = edges(&corners).any(|(c, d)| segments_intersect(a, b, &c, &d));
        hit
    }

    fn anchor(&self) -> Option<Point> {
        (!Rect::is_empty(self)).then(|| self.center())
    }
}

impl Region for Geometry {
    fn is_empty(&self) -> bool {
        matches!(self, Geometry::Rect(r) if r.is_empty())
    }

    fn contains_point(&self, p: &Point) -> bool {
        match self {
            Geometry::Point(q) => q == p,
            Geometry::Rect(r) => r.contains_point(p),
            Geometry::Polygon(poly) => poly.contains_point(p),
        }
    }

    fn intersects_segment(&self, a: &Point, b: &Point) -> bool {
        match self {
            Geometry::Point(q) => on_segment(q, a, b),
            Geometry::Rect(r) => r.intersects_segment(a, b),
            Geometry::Polygon(poly) => {
                poly.contains_point(a)
                    || poly.contains_point(b)
                    || edges(poly.vertices()).any(|(c, d)| segments_intersect(a, b, &c, &d))
            }
        }
    }

    fn anchor(&self) -> Option<Point> {
        match self {
            Geometry::Point(p) => Some(*p),
            Geometry::Rect(r) => r.anchor(),
            Geometry::Polygon(poly) => poly.vertices().first().copied(),
        }
    }

    fn contains(&self, geometry: &Geometry) -> bool {
        let vertices = geometry.vertices();
        if vertices.is_empty() || !vertices.iter().all(|p| self.contains_point(p)) {
            return false;
        }
        match self {
            // polygons may be concave: an edge of the inner shape must not leave the ring
            Geometry::Polygon(poly) => {
                let inner: Vec<(Point, Point)> = match geometry {
                    Geometry::Point(_) => Vec::new(),
                    _ => edges(&vertices).collect(),
                };
                !inner.iter().any(|(a, b)| {
                    edges(poly.vertices()).any(|(c, d)| segments_cross_properly(a, b, &c, &d))
                })
            }
            _ => true,
        }
    }
}

// ============================================================================
// Circle
// ============================================================================

/// Closed disc; a non-positive radius gives the empty region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    center: Point,
    radius: f64,
}

impl Circle {
    pub fn new(center: Point, radius: f64) -> Self {
        Self { center, radius }
    }

    pub fn center(&self) -> Point {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }
}

impl Region for Circle {
    fn is_empty(&self) -> bool {
        !(self.radius > 0.0)
    }

    fn contains_point(&self, p: &Point) -> bool {
        !Region::is_empty(self) && self.center.distance(p) <= self.radius
    }

    fn intersects_segment(&self, a: &Point, b: &Point) -> bool {
        !Region::is_empty(self) && segment_distance(&self.center, a, b) <= self.radius
    }

    fn anchor(&self) -> Option<Point> {
        (!Region::is_empty(self)).then_some(self.center)
    }

    fn intersects(&self, geometry: &Geometry) -> bool {
        !Region::is_empty(self) && geometry.distance_to_point(&self.center) <= self.radius
    }
}

// ============================================================================
// Sector
// ============================================================================

/// Circular wedge of the plane around an origin.
///
/// The wedge spans counter-clockwise from `start` by `span` radians and
/// includes its boundary. A non-positive radius gives the empty region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sector {
    origin: Point,
    radius: f64,
    start: f64,
    span: f64,
}

impl Sector {
    /// Creates a sector bounded by the two angles (radians).
    ///
    /// Fails with `InvalidGeometry` when the angular span reaches pi.
    pub fn new(origin: Point, radius: f64, angles: [f64; 2]) -> RknnResult<Self> {
        let [a0, a1] = angles;
        if !a0.is_finite() || !a1.is_finite() || radius.is_nan() {
            return Err(RknnError::InvalidGeometry(format!(
                "sector bounds must be finite: r={}, angles=[{}, {}]",
                radius, a0, a1
            )));
        }
        if radius > 0.0 && (a0 - a1).abs() >= PI {
            return Err(RknnError::InvalidGeometry(format!(
                "sector span |{} - {}| must be less than pi",
                a0, a1
            )));
        }
        Ok(Self {
            origin,
            radius,
            start: a0.min(a1),
            span: (a0 - a1).abs(),
        })
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// The bounding angles `[start, start + span]`.
    pub fn angles(&self) -> [f64; 2] {
        [self.start, self.start + self.span]
    }

    /// The same wedge with a different radius.
    pub fn with_radius(&self, radius: f64) -> Sector {
        Sector { radius, ..*self }
    }

    /// End points of the arc; both equal the origin when the sector is empty.
    pub fn arc_vertices(&self) -> [Point; 2] {
        if Region::is_empty(self) {
            return [self.origin, self.origin];
        }
        let [a0, a1] = self.angles();
        [self.point_at(a0, self.radius), self.point_at(a1, self.radius)]
    }

    /// Whether the direction from the origin to `p` falls inside the wedge.
    /// The origin itself is inside every direction.
    pub fn direction_within(&self, p: &Point) -> bool {
        if *p == self.origin {
            return true;
        }
        let theta = (p.y - self.origin.y).atan2(p.x - self.origin.x);
        let offset = (theta - self.start).rem_euclid(TAU);
        offset <= self.span + ANGLE_EPSILON || offset >= TAU - ANGLE_EPSILON
    }

    fn point_at(&self, angle: f64, r: f64) -> Point {
        Point::new(
            self.origin.x + angle.cos() * r,
            self.origin.y + angle.sin() * r,
        )
    }

    /// Points where the segment meets the bounding circle.
    fn circle_crossings(&self, a: &Point, b: &Point) -> Vec<Point> {
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let fx = a.x - self.origin.x;
        let fy = a.y - self.origin.y;
        let qa = dx * dx + dy * dy;
        if qa == 0.0 {
            return Vec::new();
        }
        let qb = 2.0 * (fx * dx + fy * dy);
        let qc = fx * fx + fy * fy - self.radius * self.radius;
        let disc = qb * qb - 4.0 * qa * qc;
        if disc < 0.0 {
            return Vec::new();
        }
        let root = disc.sqrt();
        [(-qb - root) / (2.0 * qa), (-qb + root) / (2.0 * qa)]
            .into_iter()
            .filter(|t| (0.0..=1.0).contains(t))
            .map(|t| Point::new(a.x + t * dx, a.y + t * dy))
            .collect()
    }
}

impl Region for Sector {
    fn is_empty(&self) -> bool {
        !(self.radius > 0.0)
    }

    fn contains_point(&self, p: &Point) -> bool {
        !Region::is_empty(self)
            && self.origin.distance(p) <= self.radius
            && self.direction_within(p)
    }

    fn intersects_segment(&self, a: &Point, b: &Point) -> bool {
        if Region::is_empty(self) {
            return false;
        }
        if self.contains_point(a) || self.contains_point(b) {
            return true;
        }
        let [v0, v1] = self.arc_vertices();
        if segments_intersect(a, b, &self.origin, &v0) || segments_intersect(a, b, &self.origin, &v1) {
            return true;
        }
        self.circle_crossings(a, b)
            .iter()
            .any(|p| self.direction_within(p))
    }

    fn anchor(&self) -> Option<Point> {
        if Region::is_empty(self) {
            return None;
        }
        Some(self.point_at(self.start + self.span / 2.0, self.radius / 2.0))
    }
}

// ============================================================================
// Union
// ============================================================================

/// Union of several regions.
///
/// `contains` holds when a single member contains the whole geometry, which
/// is sufficient but not necessary for the union to contain it.
#[derive(Default)]
pub struct RegionUnion {
    parts: Vec<Box<dyn Region + Send + Sync>>,
}

impl RegionUnion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, region: impl Region + Send + Sync + 'static) -> Self {
        self.parts.push(Box::new(region));
        self
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }
}

impl Region for RegionUnion {
    fn is_empty(&self) -> bool {
        self.parts.iter().all(|r| r.is_empty())
    }

    fn contains_point(&self, p: &Point) -> bool {
        self.parts.iter().any(|r| r.contains_point(p))
    }

    fn intersects_segment(&self, a: &Point, b: &Point) -> bool {
        self.parts.iter().any(|r| r.intersects_segment(a, b))
    }

    fn anchor(&self) -> Option<Point> {
        self.parts.iter().find_map(|r| r.anchor())
    }

    fn intersects(&self, geometry: &Geometry) -> bool {
        self.parts.iter().any(|r| r.intersects(geometry))
    }

    fn contains(&self, geometry: &Geometry) -> bool {
        self.parts.iter().any(|r| r.contains(geometry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn quarter(radius: f64) -> Sector {
        Sector::new(Point::new(0.0, 0.0), radius, [0.0, FRAC_PI_2 - 0.01]).unwrap()
    }

    #[test]
    fn test_sector_rejects_half_plane() {
        let err = Sector::new(Point::new(0.0, 0.0), 1.0, [0.0, PI]).unwrap_err();
        assert!(matches!(err, RknnError::InvalidGeometry(_)));
        // degenerate radius skips the span check
        assert!(Sector::new(Point::new(0.0, 0.0), 0.0, [0.0, PI]).is_ok());
    }

    #[test]
    fn test_sector_contains_point() {
        let s = quarter(10.0);
        assert!(s.contains_point(&Point::new(1.0, 1.0)));
        assert!(s.contains_point(&Point::new(0.0, 0.0)));
        assert!(s.contains_point(&Point::new(10.0, 0.0)));
        assert!(!s.contains_point(&Point::new(-1.0, 1.0)));
        assert!(!s.contains_point(&Point::new(8.0, 8.0)));
    }

    #[test]
    fn test_sector_wraps_past_two_pi() {
        let s = Sector::new(Point::new(0.0, 0.0), 5.0, [5.0 * PI / 3.0, 2.0 * PI]).unwrap();
        assert!(s.contains_point(&Point::new(1.0, 0.0)));
        assert!(s.contains_point(&Point::new(1.0, -0.5)));
        assert!(!s.contains_point(&Point::new(1.0, 0.5)));
    }

    #[test]
    fn test_empty_sector() {
        let s = quarter(0.0);
        assert!(Region::is_empty(&s));
        assert!(!s.contains_point(&Point::new(0.0, 0.0)));
        assert_eq!(s.arc_vertices(), [Point::new(0.0, 0.0), Point::new(0.0, 0.0)]);
        assert!(!s.intersects(&Geometry::rect(-1.0, -1.0, 1.0, 1.0)));
    }

    #[test]
    fn test_sector_intersects_segment_through_arc() {
        let s = quarter(1.0);
        // chord cutting the arc twice, both ends outside, clear of both radii
        assert!(s.intersects_segment(&Point::new(0.2, 1.0), &Point::new(1.0, 0.2)));
        // crosses the lower radius
        assert!(s.intersects_segment(&Point::new(0.5, 0.5), &Point::new(0.5, -0.5)));
        // passes beside the wedge
        assert!(!s.intersects_segment(&Point::new(-1.0, 2.0), &Point::new(-1.0, -2.0)));
    }

    #[test]
    fn test_sector_intersects_rect() {
        let s = quarter(2.0);
        assert!(s.intersects(&Geometry::rect(1.0, 1.0, 5.0, 5.0)));
        assert!(!s.intersects(&Geometry::rect(-5.0, -5.0, -1.0, -1.0)));
        // wedge completely inside the rectangle
        assert!(s.intersects(&Geometry::rect(-10.0, -10.0, 10.0, 10.0)));
    }

    #[test]
    fn test_circle_intersects() {
        let c = Circle::new(Point::new(0.0, 0.0), 1.0);
        assert!(c.intersects(&Geometry::point(0.6, 0.8)));
        assert!(c.intersects(&Geometry::rect(0.5, 0.5, 3.0, 3.0)));
        assert!(!c.intersects(&Geometry::rect(1.0, 1.0, 3.0, 3.0)));
        assert!(!Circle::new(Point::new(0.0, 0.0), 0.0).intersects(&Geometry::point(0.0, 0.0)));
    }

    #[test]
    fn test_union_intersects_any_member() {
        let u = RegionUnion::new()
            .with(Circle::new(Point::new(0.0, 0.0), 1.0))
            .with(Circle::new(Point::new(10.0, 0.0), 1.0));
        assert_eq!(u.len(), 2);
        assert!(u.intersects(&Geometry::point(10.5, 0.0)));
        assert!(!u.intersects(&Geometry::point(5.0, 0.0)));
    }

    #[test]
    fn test_geometry_region_contains() {
        let outer = Geometry::rect(0.0, 0.0, 10.0, 10.0);
        assert!(outer.contains(&Geometry::point(5.0, 5.0)));
        assert!(outer.contains(&Geometry::rect(1.0, 1.0, 2.0, 2.0)));
        assert!(!outer.contains(&Geometry::rect(5.0, 5.0, 12.0, 6.0)));
        assert!(outer.intersects(&Geometry::rect(5.0, 5.0, 12.0, 6.0)));
    }

    #[test]
    fn test_rect_intersects_segment() {
        let r = Rect::new(0.0, 0.0, 2.0, 2.0);
        // passes straight through without an endpoint inside
        assert!(r.intersects_segment(&Point::new(-1.0, 1.0), &Point::new(3.0, 1.0)));
        assert!(r.intersects_segment(&Point::new(1.0, 1.0), &Point::new(9.0, 9.0)));
        assert!(r.intersects_segment(&Point::new(-1.0, 2.0), &Point::new(3.0, 2.0)));
        assert!(!r.intersects_segment(&Point::new(-1.0, 3.0), &Point::new(3.0, 5.0)));

        let c = Circle::new(Point::new(1.0, 1.0), 0.5);
        assert!(c.intersects(&Geometry::rect(0.0, 0.0, 2.0, 2.0)));
        assert!(!c.intersects(&Geometry::rect(3.0, 3.0, 4.0, 4.0)));
    }
}
