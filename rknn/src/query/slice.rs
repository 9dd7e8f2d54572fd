//! SLICE: twelve sectors, each shrinking to an upper bound on how far a
//! reverse neighbor can be from the query.
//!
//! Filtering walks facilities nearest first. A facility `f` seen from the
//! query at distance `d` under angles `[min, max]` relative to a sector's
//! bounding rays guarantees that every point of the sector farther than
//! `d / (2 cos max)` is closer to `f` than to the query; the k-th smallest
//! such radius becomes the sector's bound. Facilities that could still
//! matter for some user inside the bound are kept as signatures, sorted by
//! `d / (2 cos min)`, the distance below which they can no longer beat the
//! query. Verification checks each user against its sector's signatures.

use super::{covering_radius, empty, partitions, query_point, resolve_query, RknnIter};
use crate::errors::RknnResult;
use crate::geometry::{Circle, Point, Region, RegionUnion, Sector};
use crate::holder::MinQueue;
use crate::index::SpatialIndex;
use crate::rtree::Node;
use log::debug;
use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;

const PARTITIONS: usize = 12;

/// Relative padding on upper radii, so a user tied with the bound is not
/// lost to rounding.
const BOUND_SLACK: f64 = 1e-9;

/// Nodes of `index` that have `query` among their `k` nearest neighbors.
pub fn mono_rknn<'a>(query: &Arc<Node>, k: usize, index: &'a dyn SpatialIndex) -> RknnResult<RknnIter<'a>> {
    let q = resolve_query(index, query)?;
    if k == 0 {
        return Ok(empty());
    }
    let radius = covering_radius(&[index])?;
    // the query is one of the filtered facilities in the monochromatic case
    let parts = filtering(&q, k + 1, index, radius)?;
    Verification::start(parts, q, k, index)
}

/// Users having the facility `query` among their `k` nearest facilities.
pub fn bi_rknn<'a>(
    query: &Arc<Node>,
    k: usize,
    facilities: &'a dyn SpatialIndex,
    users: &'a dyn SpatialIndex,
) -> RknnResult<RknnIter<'a>> {
    let q = resolve_query(facilities, query)?;
    if k == 0 {
        return Ok(empty());
    }
    let radius = covering_radius(&[facilities, users])?;
    let parts = filtering(&q, k, facilities, radius)?;
    Verification::start(parts, q, k, users)
}

// ============================================================================
// Partitions
// ============================================================================

struct Partition {
    wedge: Sector,
    k: usize,
    /// Smallest `k` upper radii seen so far, ascending once full.
    upper_radii: Vec<f64>,
    bound: f64,
    user_area: Sector,
    facility_area: RegionUnion,
    signatures: Vec<(f64, Arc<Node>)>,
}

impl Partition {
    fn new(wedge: Sector, k: usize) -> Self {
        let bound = wedge.radius();
        Self {
            wedge,
            k,
            upper_radii: Vec::with_capacity(k + 1),
            bound,
            user_area: wedge.with_radius(bound),
            facility_area: Self::facility_region(&wedge, bound),
            signatures: Vec::new(),
        }
    }

    /// Where a facility must lie to affect some user inside the bound.
    fn facility_region(wedge: &Sector, bound: f64) -> RegionUnion {
        let [a0, a1] = wedge.with_radius(bound).arc_vertices();
        RegionUnion::new()
            .with(Circle::new(a0, bound))
            .with(Circle::new(a1, bound))
            .with(wedge.with_radius(2.0 * bound))
    }

    fn add_upper_radius(&mut self, radius: f64) {
        if self.upper_radii.len() < self.k {
            self.upper_radii.push(radius);
            if self.upper_radii.len() == self.k {
                self.upper_radii.sort_by(f64::total_cmp);
                self.shrink();
            }
        } else if self.upper_radii.last().is_some_and(|&largest| radius < largest) {
            self.upper_radii.push(radius);
            self.upper_radii.sort_by(f64::total_cmp);
            self.upper_radii.pop();
            self.shrink();
        }
    }

    fn shrink(&mut self) {
        if self.upper_radii.len() < self.k {
            return;
        }
        if let Some(&largest) = self.upper_radii.last() {
            if largest < self.bound {
                self.bound = largest;
                self.user_area = self.wedge.with_radius(largest);
                self.facility_area = Self::facility_region(&self.wedge, largest);
            }
        }
    }

    /// Angles between `p` (seen from the origin) and the two bounding rays,
    /// smaller first; the smaller is zero when `p` lies inside the wedge.
    fn min_max_angle(&self, p: &Point) -> (f64, f64) {
        let origin = self.wedge.origin();
        let [a0, a1] = self.wedge.angles();
        let mut angles = [ray_angle(&origin, a0, p), ray_angle(&origin, a1, p)];
        angles.sort_by(f64::total_cmp);
        if self.wedge.direction_within(p) {
            angles[0] = 0.0;
        }
        (angles[0], angles[1])
    }
}

/// Angle between the ray leaving `origin` at `theta` and the vector to `p`.
fn ray_angle(origin: &Point, theta: f64, p: &Point) -> f64 {
    let (vx, vy) = (p.x - origin.x, p.y - origin.y);
    let norm = vx.hypot(vy);
    if norm == 0.0 {
        return 0.0;
    }
    let cos = (theta.cos() * vx + theta.sin() * vy) / norm;
    cos.clamp(-1.0, 1.0).acos()
}

// ============================================================================
// Filtering
// ============================================================================

fn filtering(q: &Node, k: usize, facilities: &dyn SpatialIndex, radius: f64) -> RknnResult<Vec<Partition>> {
    let origin = query_point(q)?;
    let mut parts: Vec<Partition> = partitions(origin, radius, PARTITIONS)?
        .into_iter()
        .map(|wedge| Partition::new(wedge, k))
        .collect();

    let mut queue = MinQueue::new();
    let root = facilities.root()?;
    queue.push(root.geometry().distance_to_point(&origin), root);

    let mut visited = 0usize;
    while let Some((distance, node)) = queue.pop() {
        if !parts.iter().any(|part| part.facility_area.intersects(node.geometry())) {
            continue;
        }
        if !node.is_data() {
            for child_id in node.children() {
                let child = facilities.node(child_id)?;
                queue.push(child.geometry().distance_to_point(&origin), child);
            }
            continue;
        }
        if node.same_entity(q) || distance == 0.0 {
            continue;
        }
        visited += 1;

        let location = query_point(&node)?;
        for part in parts.iter_mut() {
            let (min_angle, max_angle) = part.min_max_angle(&location);
            if min_angle >= FRAC_PI_2 {
                continue;
            }
            let upper = if max_angle >= FRAC_PI_2 {
                f64::INFINITY
            } else {
                distance / (2.0 * max_angle.cos()) * (1.0 + BOUND_SLACK)
            };
            part.add_upper_radius(upper);
            if part.facility_area.intersects(node.geometry()) {
                part.signatures
                    .push((distance / (2.0 * min_angle.cos()), Arc::clone(&node)));
            }
        }
    }

    for part in parts.iter_mut() {
        part.signatures.sort_by(|a, b| a.0.total_cmp(&b.0));
    }
    debug!(
        "SLICE filtering q={} k={}: {} facilities examined, bounds {:?}",
        q.id(),
        k,
        visited,
        parts.iter().map(|part| part.bound).collect::<Vec<_>>()
    );
    Ok(parts)
}

// ============================================================================
// Verification
// ============================================================================

/// Depth-first walk over the users inside some partition's bound.
struct Verification<'a> {
    users: &'a dyn SpatialIndex,
    parts: Vec<Partition>,
    q: Arc<Node>,
    k: usize,
    stack: Vec<Arc<Node>>,
}

impl<'a> Verification<'a> {
    fn start(parts: Vec<Partition>, q: Arc<Node>, k: usize, users: &'a dyn SpatialIndex) -> RknnResult<RknnIter<'a>> {
        let root = users.root()?;
        Ok(Box::new(Verification {
            users,
            parts,
            q,
            k,
            stack: vec![root],
        }))
    }

    /// Checks `user` against the signatures of a partition whose user area
    /// holds it. A user on a shared ray may sit beyond one neighbor's bound
    /// and within the other's.
    fn is_rknn(&self, user: &Node) -> RknnResult<bool> {
        let location = query_point(user)?;
        let part = match self
            .parts
            .iter()
            .find(|part| part.user_area.contains_point(&location))
            .or_else(|| self.parts.first())
        {
            Some(part) => part,
            None => return Ok(false),
        };

        let to_query = user.geometry().distance(self.q.geometry());
        let mut closer = 0;
        for (lower, facility) in &part.signatures {
            if facility.same_entity(user) {
                continue;
            }
            if to_query <= *lower {
                break;
            }
            if user.geometry().distance(facility.geometry()) < to_query {
                closer += 1;
                if closer >= self.k {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn step(&mut self, node: &Arc<Node>) -> RknnResult<bool> {
        if !self.parts.iter().any(|part| part.user_area.intersects(node.geometry())) {
            return Ok(false);
        }
        if !node.is_data() {
            for child_id in node.children() {
                self.stack.push(self.users.node(child_id)?);
            }
            return Ok(false);
        }
        if node.same_entity(&self.q) {
            return Ok(false);
        }
        self.is_rknn(node)
    }
}

impl Iterator for Verification<'_> {
    type Item = RknnResult<Arc<Node>>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            match self.step(&node) {
                Ok(true) => return Some(Ok(node)),
                Ok(false) => {}
                Err(err) => {
                    self.stack.clear();
                    return Some(Err(err));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Geometry;
    use crate::query::tests::{collect, oracle_bi, oracle_mono, scattered, vortree};
    use crate::rtree::RTree;
    use std::f64::consts::PI;

    fn wedge() -> Sector {
        Sector::new(Point::new(0.0, 0.0), 100.0, [0.0, PI / 6.0]).unwrap()
    }

    #[test]
    fn test_min_max_angle() {
        let part = Partition::new(wedge(), 2);
        let (min, max) = part.min_max_angle(&Point::new(1.0, 0.1));
        assert_eq!(min, 0.0);
        assert!(max > 0.0 && max < PI / 6.0);

        let (min, max) = part.min_max_angle(&Point::new(0.0, -1.0));
        assert!((min - FRAC_PI_2).abs() < 1e-12);
        assert!((max - (FRAC_PI_2 + PI / 6.0)).abs() < 1e-12);
    }

    #[test]
    fn test_bound_shrinks_after_k_radii() {
        let mut part = Partition::new(wedge(), 2);
        part.add_upper_radius(30.0);
        assert_eq!(part.bound, 100.0);
        part.add_upper_radius(f64::INFINITY);
        assert_eq!(part.bound, 100.0);
        part.add_upper_radius(50.0);
        assert_eq!(part.bound, 50.0);
        assert_eq!(part.user_area.radius(), 50.0);
        part.add_upper_radius(70.0);
        assert_eq!(part.bound, 50.0);
        part.add_upper_radius(10.0);
        assert_eq!(part.bound, 30.0);
    }

    #[test]
    fn test_facility_area_covers_arc_neighborhood() {
        let part = Partition::new(wedge().with_radius(10.0), 1);
        let [a0, _] = wedge().with_radius(10.0).arc_vertices();
        let outside_wedge = Point::new(a0.x, a0.y - 9.0);
        assert!(part.facility_area.contains_point(&outside_wedge));
        assert!(!part.facility_area.contains_point(&Point::new(-30.0, -30.0)));
    }

    #[test]
    fn test_mono_matches_oracle() {
        let points = scattered(11, 120, "p");
        let index = vortree(points.clone());
        for q in ["p0", "p60", "p119"] {
            let node = index.node(q).unwrap();
            for k in [1, 2, 6] {
                let got = collect(mono_rknn(&node, k, &index).unwrap());
                assert_eq!(got, oracle_mono(&points, q, k), "q={} k={}", q, k);
            }
        }
    }

    #[test]
    fn test_runs_on_plain_rtrees() {
        let facilities = scattered(3, 25, "f");
        let users = scattered(4, 90, "u");
        let facility_tree = RTree::in_memory(Default::default()).unwrap();
        let user_tree = RTree::in_memory(Default::default()).unwrap();
        for (id, geometry) in &facilities {
            facility_tree.insert(id.clone(), geometry.clone()).unwrap();
        }
        for (id, geometry) in &users {
            user_tree.insert(id.clone(), geometry.clone()).unwrap();
        }
        let q = facility_tree.node("f12").unwrap();
        for k in [1, 3] {
            let got = collect(bi_rknn(&q, k, &facility_tree, &user_tree).unwrap());
            assert_eq!(got, oracle_bi(&facilities, &users, "f12", k));
        }
    }

    #[test]
    fn test_user_at_query_location() {
        let facilities = vortree(vec![
            ("f0".to_string(), Geometry::point(0.0, 0.0)),
            ("f1".to_string(), Geometry::point(10.0, 0.0)),
        ]);
        let users = vortree(vec![
            ("u0".to_string(), Geometry::point(0.0, 0.0)),
            ("u1".to_string(), Geometry::point(9.0, 0.0)),
        ]);
        let q = facilities.node("f0").unwrap();
        let got = collect(bi_rknn(&q, 1, &facilities, &users).unwrap());
        assert_eq!(got.into_iter().collect::<Vec<_>>(), vec!["u0".to_string()]);
    }
}
