//! CSD: classify sites by k-NN discs and spread along the Voronoi graph.
//!
//! Every verified site `p` leaves a disc centered at `p` with its k-NN
//! radius. Triangle inequality lets a neighbor reuse that disc: if the
//! neighbor plus its distance to `p` still fits, it is a reverse neighbor
//! too; if it lies beyond the disc by more than that distance, it is not.
//! The walk continues through every reverse neighbor and through sites that
//! may still border the result region.

use super::{empty, knn_radius, resolve_query, DistanceCalculator, RknnIter};
use crate::errors::RknnResult;
use crate::index::SpatialIndex;
use crate::rtree::{Node, NodeId};
use crate::vortree::VoRTree;
use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Nodes of `index` that have `query` among their `k` nearest neighbors.
pub fn mono_rknn<'a>(query: &Arc<Node>, k: usize, index: &'a VoRTree) -> RknnResult<RknnIter<'a>> {
    let q = resolve_query(index, query)?;
    if k == 0 {
        return Ok(empty());
    }
    let semi = knn_radius(index, &q, k)? / 2.0;
    let start = index.neighbors(&q)?;
    debug!("CSD mono q={} k={}: semi radius {}, {} seeds", q.id(), k, semi, start.len());

    let mut search = Search::new(index, index, q, k, semi);
    search.visited.insert(search.q.id().to_string());
    search.seed(start);
    Ok(Box::new(search))
}

/// Users having the facility `query` among their `k` nearest facilities.
///
/// The walk starts at the user nearest to the query and follows the users'
/// Voronoi graph.
pub fn bi_rknn<'a>(
    query: &Arc<Node>,
    k: usize,
    facilities: &'a dyn SpatialIndex,
    users: &'a VoRTree,
) -> RknnResult<RknnIter<'a>> {
    let q = resolve_query(facilities, query)?;
    if k == 0 {
        return Ok(empty());
    }
    let semi = knn_radius(facilities, &q, k - 1)? / 2.0;
    let start = match users.tree().nearest(Arc::clone(&q), 1)?.into_iter().next() {
        Some((nearest, _)) => nearest,
        None => return Ok(empty()),
    };
    debug!("CSD bi q={} k={}: semi radius {}, seed {}", q.id(), k, semi, start.id());

    let mut search = Search::new(facilities, users, q, k, semi);
    search.seed(vec![start]);
    Ok(Box::new(search))
}

/// Disc of a verified site: everything within `radius` of `center` is
/// within the center's k-NN radius.
#[derive(Clone)]
struct Disc {
    center: Arc<Node>,
    radius: f64,
}

struct Search<'a> {
    facilities: &'a dyn SpatialIndex,
    graph: &'a VoRTree,
    q: Arc<Node>,
    k: usize,
    /// Sites this close to the query are reverse neighbors outright.
    semi: f64,
    positive: HashMap<NodeId, Disc>,
    negative: HashMap<NodeId, Disc>,
    distances: DistanceCalculator,
    stack: Vec<Arc<Node>>,
    visited: HashSet<NodeId>,
}

impl<'a> Search<'a> {
    fn new(facilities: &'a dyn SpatialIndex, graph: &'a VoRTree, q: Arc<Node>, k: usize, semi: f64) -> Self {
        Self {
            facilities,
            graph,
            q,
            k,
            semi,
            positive: HashMap::new(),
            negative: HashMap::new(),
            distances: DistanceCalculator::new(),
            stack: Vec::new(),
            visited: HashSet::new(),
        }
    }

    fn seed(&mut self, start: Vec<Arc<Node>>) {
        for node in start {
            if self.visited.insert(node.id().to_string()) {
                self.stack.push(node);
            }
        }
    }

    fn to_query(&self, p: &Node) -> f64 {
        // kept out of the pair cache: in the bichromatic case `q` is a
        // facility and its id may also name a site
        p.geometry().distance(self.q.geometry())
    }

    fn is_rknn(&mut self, p: &Arc<Node>) -> RknnResult<bool> {
        if self.positive.contains_key(p.id()) {
            return Ok(true);
        }
        if self.negative.contains_key(p.id()) {
            return Ok(false);
        }
        let to_query = self.to_query(p);
        if to_query <= self.semi {
            return Ok(true);
        }

        for neighbor_id in p.neighbors() {
            if let Some(disc) = self.positive.get(neighbor_id).cloned() {
                if to_query + self.distances.distance(p, &disc.center) <= disc.radius {
                    self.positive.insert(p.id().to_string(), disc);
                    return Ok(true);
                }
            }
            if let Some(disc) = self.negative.get(neighbor_id).cloned() {
                if to_query - self.distances.distance(p, &disc.center) > disc.radius {
                    self.negative.insert(p.id().to_string(), disc);
                    return Ok(false);
                }
            }
        }

        let disc = Disc {
            center: Arc::clone(p),
            radius: knn_radius(self.facilities, p, self.k)?,
        };
        if to_query <= disc.radius {
            self.positive.insert(p.id().to_string(), disc);
            Ok(true)
        } else {
            self.negative.insert(p.id().to_string(), disc);
            Ok(false)
        }
    }

    /// Whether two non-reverse-neighbors are excluded by a common disc.
    fn share_negative(&mut self, p: &Node, o: &Node) -> bool {
        let (Some(of_p), Some(of_o)) = (
            self.negative.get(p.id()).cloned(),
            self.negative.get(o.id()).cloned(),
        ) else {
            return false;
        };
        if of_p.center.id() == of_o.center.id() {
            return true;
        }
        let p_out = self.to_query(p) - self.distances.distance(p, &of_o.center) > of_o.radius;
        let o_out = self.to_query(o) - self.distances.distance(o, &of_p.center) > of_p.radius;
        p_out || o_out
    }

    fn may_be_boundary(&mut self, p: &Node) -> RknnResult<bool> {
        for neighbor_id in p.neighbors() {
            let neighbor = self.graph.node(neighbor_id)?;
            if self.is_rknn(&neighbor)? || !self.share_negative(p, &neighbor) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn expand(&mut self, p: &Node) -> RknnResult<()> {
        for neighbor_id in p.neighbors() {
            if self.visited.insert(neighbor_id.clone()) {
                self.stack.push(self.graph.node(neighbor_id)?);
            }
        }
        Ok(())
    }

    fn step(&mut self, p: &Arc<Node>) -> RknnResult<bool> {
        if self.is_rknn(p)? {
            self.expand(p)?;
            return Ok(true);
        }
        if self.may_be_boundary(p)? {
            self.expand(p)?;
        }
        Ok(false)
    }
}

impl Iterator for Search<'_> {
    type Item = RknnResult<Arc<Node>>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(p) = self.stack.pop() {
            match self.step(&p) {
                Ok(true) => return Some(Ok(p)),
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
