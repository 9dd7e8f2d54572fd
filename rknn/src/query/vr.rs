//! VR: six-wedge pruning over the Voronoi graph.
//!
//! The plane around the query is cut into six 60° wedges. Inside one wedge,
//! any site closer to the query than a point `u` is also closer to `u` than
//! the query is, so `k` sites per wedge bound where reverse neighbors can
//! be. Pruning walks the Voronoi graph outward from the query to find those
//! sites; verification checks each surviving candidate's k-NN radius.

use super::{covering_radius, empty, knn_radius, partitions, query_point, resolve_query, RknnIter};
use crate::errors::RknnResult;
use crate::geometry::{Point, Region, Sector};
use crate::holder::{MinQueue, SmallestHolder};
use crate::index::SpatialIndex;
use crate::rtree::{Node, NodeId};
use crate::vortree::VoRTree;
use log::debug;
use std::collections::HashSet;
use std::sync::Arc;

const PARTITIONS: usize = 6;

/// Nodes of `index` that have `query` among their `k` nearest neighbors.
pub fn mono_rknn<'a>(query: &Arc<Node>, k: usize, index: &'a VoRTree) -> RknnResult<RknnIter<'a>> {
    let q = resolve_query(index, query)?;
    if k == 0 {
        return Ok(empty());
    }
    let candidates = mono_pruning(&q, k, index)?;
    debug!("VR mono q={} k={}: {} candidates", q.id(), k, candidates.len());
    Ok(verification(candidates, q, k, index))
}

/// Users having the facility `query` among their `k` nearest facilities.
pub fn bi_rknn<'a>(
    query: &Arc<Node>,
    k: usize,
    facilities: &'a VoRTree,
    users: &'a dyn SpatialIndex,
) -> RknnResult<RknnIter<'a>> {
    let q = resolve_query(facilities, query)?;
    if k == 0 {
        return Ok(empty());
    }
    let candidates = bi_pruning(&q, k, facilities, users)?;
    debug!("VR bi q={} k={}: {} candidates", q.id(), k, candidates.len());
    Ok(verification(candidates, q, k, facilities))
}

struct Partition {
    wedge: Sector,
    nearest: SmallestHolder<Arc<Node>>,
}

fn location(node: &Node) -> RknnResult<Point> {
    query_point(node)
}

/// Hop-bounded expansion: a site is only considered when it is at most `k`
/// Voronoi hops away from the query.
fn mono_pruning(q: &Node, k: usize, index: &VoRTree) -> RknnResult<Vec<Arc<Node>>> {
    let origin = location(q)?;
    let radius = covering_radius(&[index as &dyn SpatialIndex])?;
    let mut parts: Vec<Partition> = partitions(origin, radius, PARTITIONS)?
        .into_iter()
        .map(|wedge| Partition {
            wedge,
            nearest: SmallestHolder::new(k),
        })
        .collect();

    let mut visited: HashSet<NodeId> = HashSet::from([q.id().to_string()]);
    let mut queue: MinQueue<(usize, Arc<Node>)> = MinQueue::new();
    for neighbor in index.neighbors(q)? {
        visited.insert(neighbor.id().to_string());
        queue.push(1.0, (1, neighbor));
    }

    // sites sharing the query's location tie with it for every user, so
    // they never count against a wedge
    let mut coincident: Vec<Arc<Node>> = Vec::new();

    while let Some((_, (hops, site))) = queue.pop() {
        let distance = site.geometry().distance(q.geometry());
        if distance == 0.0 {
            for neighbor_id in site.neighbors() {
                if visited.insert(neighbor_id.clone()) {
                    queue.push(hops as f64, (hops, index.node(neighbor_id)?));
                }
            }
            coincident.push(site);
            continue;
        }
        for part in parts.iter_mut() {
            if !part.wedge.intersects(site.geometry()) {
                continue;
            }
            if hops <= k && distance <= part.nearest.bound() {
                part.nearest.push(distance, Arc::clone(&site));
                for neighbor_id in site.neighbors() {
                    if visited.insert(neighbor_id.clone()) {
                        queue.push((hops + 1) as f64, (hops + 1, index.node(neighbor_id)?));
                    }
                }
            }
        }

        if hops <= k {
            let from = location(&site)?;
            for neighbor_id in site.neighbors() {
                if visited.contains(neighbor_id) {
                    continue;
                }
                let neighbor = index.node(neighbor_id)?;
                let to = location(&neighbor)?;
                let crosses_open_wedge = parts
                    .iter()
                    .any(|part| !part.nearest.is_full() && part.wedge.intersects_segment(&from, &to));
                if crosses_open_wedge {
                    visited.insert(neighbor_id.clone());
                    queue.push((hops + 1) as f64, (hops + 1, neighbor));
                }
            }
        }
    }

    Ok(dedup(coincident.into_iter().chain(parts.into_iter().flat_map(|part| {
        part.nearest.into_sorted_vec().into_iter().map(|(_, node)| node)
    }))))
}

/// Distance-ordered expansion; each wedge keeps the first `k` facilities it
/// meets, which bounds the users worth checking.
fn bi_pruning(
    q: &Node,
    k: usize,
    facilities: &VoRTree,
    users: &dyn SpatialIndex,
) -> RknnResult<Vec<Arc<Node>>> {
    let origin = location(q)?;
    let radius = covering_radius(&[facilities as &dyn SpatialIndex, users])?;
    let wedges = partitions(origin, radius, PARTITIONS)?;
    let mut found: Vec<Vec<f64>> = vec![Vec::new(); wedges.len()];

    let mut visited: HashSet<NodeId> = HashSet::from([q.id().to_string()]);
    let mut queue: MinQueue<Arc<Node>> = MinQueue::new();
    for neighbor in facilities.neighbors(q)? {
        visited.insert(neighbor.id().to_string());
        queue.push(neighbor.geometry().distance(q.geometry()), neighbor);
    }

    while let Some((distance, site)) = queue.pop() {
        if distance == 0.0 {
            for neighbor_id in site.neighbors() {
                if visited.insert(neighbor_id.clone()) {
                    let neighbor = facilities.node(neighbor_id)?;
                    queue.push(neighbor.geometry().distance(q.geometry()), neighbor);
                }
            }
            continue;
        }
        for (wedge, hits) in wedges.iter().zip(found.iter_mut()) {
            if hits.len() < k && wedge.intersects(site.geometry()) {
                hits.push(distance);
                for neighbor_id in site.neighbors() {
                    if visited.insert(neighbor_id.clone()) {
                        let neighbor = facilities.node(neighbor_id)?;
                        queue.push(neighbor.geometry().distance(q.geometry()), neighbor);
                    }
                }
            }
        }

        let from = location(&site)?;
        for neighbor_id in site.neighbors() {
            if visited.contains(neighbor_id) {
                continue;
            }
            let neighbor = facilities.node(neighbor_id)?;
            let to = location(&neighbor)?;
            let crosses_open_wedge = wedges
                .iter()
                .zip(found.iter())
                .any(|(wedge, hits)| hits.len() < k && wedge.intersects_segment(&from, &to));
            if crosses_open_wedge {
                visited.insert(neighbor_id.clone());
                queue.push(neighbor.geometry().distance(q.geometry()), neighbor);
            }
        }
    }

    let mut candidates = Vec::new();
    for (wedge, hits) in wedges.iter().zip(&found) {
        let reach = if hits.len() >= k {
            hits.iter().copied().fold(0.0, f64::max)
        } else {
            radius
        };
        let unpruned = wedge.with_radius(reach);
        for user in users.search(&unpruned) {
            candidates.push(user?);
        }
    }
    Ok(dedup(candidates))
}

fn dedup(nodes: impl IntoIterator<Item = Arc<Node>>) -> Vec<Arc<Node>> {
    let mut seen = HashSet::new();
    nodes
        .into_iter()
        .filter(|node| seen.insert(node.id().to_string()))
        .collect()
}

/// Keeps candidates within their own k-NN radius of the query.
fn verification<'a>(
    candidates: Vec<Arc<Node>>,
    q: Arc<Node>,
    k: usize,
    facilities: &'a dyn SpatialIndex,
) -> RknnIter<'a> {
    Box::new(candidates.into_iter().filter_map(move |candidate| {
        match knn_radius(facilities, &candidate, k) {
            Ok(radius) => (q.geometry().distance(candidate.geometry()) <= radius).then_some(Ok(candidate)),
            Err(err) => Some(Err(err)),
        }
    }))
}
