//! Reverse k-nearest-neighbor queries.
//!
//! Three engines answer the same question with different pruning:
//! [`vr`] (six-wedge candidate holders over the Voronoi graph), [`slice`]
//! (twelve shrinking sectors and per-wedge signatures) and [`csd`]
//! (disc-based classification spread along the Voronoi graph). Each offers a
//! monochromatic variant (one population) and a bichromatic one
//! (facilities vs. users).
//!
//! Results are streamed; the first storage error ends the stream.

pub mod csd;
pub mod slice;
pub mod vr;

use crate::errors::{RknnError, RknnResult};
use crate::geometry::{Point, Rect, Sector};
use crate::index::SpatialIndex;
use crate::rtree::{KnnQuery, Node, NodeId};
use crate::vortree::VoRTree;
use std::collections::HashMap;
use std::f64::consts::TAU;
use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::Arc;

/// Lazily produced RkNN result nodes.
pub type RknnIter<'a> = Box<dyn Iterator<Item = RknnResult<Arc<Node>>> + 'a>;

/// Distance from `node` to its k-th nearest data node in `index`, itself
/// excluded.
///
/// Zero for `k == 0`; `+inf` when the index holds no other node.
pub fn knn_radius<I: SpatialIndex + ?Sized>(index: &I, node: &Arc<Node>, k: usize) -> RknnResult<f64> {
    if k == 0 {
        return Ok(0.0);
    }
    let mut radius = f64::INFINITY;
    for found in index.nearest_stream(KnnQuery::Node(Arc::clone(node)), k)? {
        radius = found?.1;
    }
    Ok(radius)
}

/// Memoized symmetric distances between nodes, scoped to one query.
#[derive(Default)]
pub struct DistanceCalculator {
    cache: HashMap<(NodeId, NodeId), f64>,
}

impl DistanceCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn distance(&mut self, a: &Node, b: &Node) -> f64 {
        let key = if a.id() <= b.id() {
            (a.id().to_string(), b.id().to_string())
        } else {
            (b.id().to_string(), a.id().to_string())
        };
        *self
            .cache
            .entry(key)
            .or_insert_with(|| a.geometry().distance(b.geometry()))
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// Location of a query node; RkNN queries only run from point data nodes.
pub(crate) fn query_point(query: &Node) -> RknnResult<Point> {
    match query.point() {
        Some(p) if query.is_data() => Ok(*p),
        _ => Err(RknnError::InvalidGeometry(format!(
            "RkNN query {} must be a point data node, got {}",
            query.id(),
            query.geometry()
        ))),
    }
}

/// The stored copy of `query` when `index` holds it, otherwise `query`.
pub(crate) fn resolve_query<I: SpatialIndex + ?Sized>(index: &I, query: &Arc<Node>) -> RknnResult<Arc<Node>> {
    query_point(query)?;
    if index.contains_node(query)? {
        index.node(query.id())
    } else {
        Ok(Arc::clone(query))
    }
}

/// `count` equal wedges around `origin` covering the full turn.
pub(crate) fn partitions(origin: Point, radius: f64, count: usize) -> RknnResult<Vec<Sector>> {
    let step = TAU / count as f64;
    (0..count)
        .map(|i| Sector::new(origin, radius, [step * i as f64, step * (i + 1) as f64]))
        .collect()
}

/// Diagonal of the rectangle covering every given index.
///
/// Never zero, so wedges built on it still hold points at their origin.
pub(crate) fn covering_radius(indexes: &[&dyn SpatialIndex]) -> RknnResult<f64> {
    let mut bounds = Rect::empty();
    for index in indexes {
        bounds = bounds.union(&index.bounds()?);
    }
    Ok(bounds.diagonal().max(f64::MIN_POSITIVE))
}

pub(crate) fn empty<'a>() -> RknnIter<'a> {
    Box::new(std::iter::empty())
}

/// RkNN engine selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Vr,
    Slice,
    Csd,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [Algorithm::Vr, Algorithm::Slice, Algorithm::Csd];

    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Vr => "vr",
            Algorithm::Slice => "slice",
            Algorithm::Csd => "csd",
        }
    }

    /// Nodes of `index` having `query` among their `k` nearest neighbors.
    pub fn mono_rknn<'a>(&self, query: &Arc<Node>, k: usize, index: &'a VoRTree) -> RknnResult<RknnIter<'a>> {
        match self {
            Algorithm::Vr => vr::mono_rknn(query, k, index),
            Algorithm::Slice => slice::mono_rknn(query, k, index),
            Algorithm::Csd => csd::mono_rknn(query, k, index),
        }
    }

    /// Users having the facility `query` among their `k` nearest facilities.
    pub fn bi_rknn<'a>(
        &self,
        query: &Arc<Node>,
        k: usize,
        facilities: &'a VoRTree,
        users: &'a VoRTree,
    ) -> RknnResult<RknnIter<'a>> {
        match self {
            Algorithm::Vr => vr::bi_rknn(query, k, facilities, users),
            Algorithm::Slice => slice::bi_rknn(query, k, facilities, users),
            Algorithm::Csd => csd::bi_rknn(query, k, facilities, users),
        }
    }
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = RknnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vr" => Ok(Algorithm::Vr),
            "slice" => Ok(Algorithm::Slice),
            "csd" => Ok(Algorithm::Csd),
            other => Err(RknnError::InvalidConfig(format!("unknown RkNN algorithm: {}", other))),
        }
    }
}
