//! R-tree whose point data nodes also carry their Voronoi neighbors.
//!
//! The neighbor graph is computed once, by [`VoRTree::bulk_load`]. Later
//! inserts are indexed spatially but get no neighbors; deletes unlink the
//! removed site from its neighbors without re-triangulating. Queries over a
//! mutated tree stay sound but may miss sites.

mod delaunay;

use crate::config::IndexConfig;
use crate::errors::{RknnError, RknnResult};
use crate::geometry::{Geometry, Point, Rect, Region};
use crate::holder::MinQueue;
use crate::rtree::{IndexProperties, KnnQuery, Neighbor, Node, NodeId, RTree, RTreeStats, RangeQuery};
use crate::store::{InMemoryStore, KeyValueStore};
use log::{info, warn};
use std::collections::HashSet;
use std::sync::Arc;

pub struct VoRTree {
    tree: RTree,
}

impl VoRTree {
    /// Opens a Voronoi-augmented tree previously built on `store`.
    pub fn open(store: Box<dyn KeyValueStore>, config: IndexConfig) -> RknnResult<Self> {
        Ok(Self {
            tree: RTree::open(store, config)?,
        })
    }

    /// Indexes every point and links each one to its Voronoi neighbors.
    ///
    /// All geometries must be points and `store` must not hold a tree yet.
    pub fn bulk_load<I, S>(store: Box<dyn KeyValueStore>, config: IndexConfig, entries: I) -> RknnResult<Self>
    where
        I: IntoIterator<Item = (S, Geometry)>,
        S: Into<NodeId>,
    {
        let entries: Vec<(NodeId, Geometry)> = entries
            .into_iter()
            .map(|(id, geometry)| (id.into(), geometry))
            .collect();
        let points = entries
            .iter()
            .map(|(id, geometry)| {
                geometry.as_point().copied().ok_or_else(|| {
                    RknnError::InvalidGeometry(format!("site {} is not a point: {}", id, geometry))
                })
            })
            .collect::<RknnResult<Vec<Point>>>()?;

        let tree = RTree::open(store, config)?;
        if !tree.is_empty() {
            return Err(RknnError::InvalidConfig(
                "bulk load needs a store without an existing tree".to_string(),
            ));
        }
        for (id, geometry) in &entries {
            tree.insert(id.clone(), geometry.clone())?;
        }

        let lists = delaunay::neighbor_lists(&points);
        let mut links = 0usize;
        for ((id, _), list) in entries.iter().zip(&lists) {
            let mut node = (*tree.node(id)?).clone();
            node.set_neighbors(list.iter().map(|&j| entries[j].0.clone()).collect());
            tree.store().put(node)?;
            links += list.len();
        }
        info!(
            "Built Voronoi graph over {} sites with {} edges",
            entries.len(),
            links / 2
        );
        Ok(Self { tree })
    }

    pub fn in_memory<I, S>(config: IndexConfig, entries: I) -> RknnResult<Self>
    where
        I: IntoIterator<Item = (S, Geometry)>,
        S: Into<NodeId>,
    {
        Self::bulk_load(Box::new(InMemoryStore::new()), config, entries)
    }

    /// The underlying R-tree.
    pub fn tree(&self) -> &RTree {
        &self.tree
    }

    /// Resolves the stored neighbor list of `node`.
    pub fn neighbors(&self, node: &Node) -> RknnResult<Vec<Arc<Node>>> {
        node.neighbors().iter().map(|id| self.tree.node(id)).collect()
    }

    /// Lazily yields up to `k` data nodes by increasing distance, walking
    /// the Voronoi graph outward from the query.
    pub fn nearest(&self, query: impl Into<KnnQuery>, k: usize) -> RknnResult<VoronoiNearest<'_>> {
        VoronoiNearest::new(self, query.into(), k)
    }

    /// Indexes a new site. It gets no Voronoi neighbors.
    pub fn insert(&self, id: impl Into<NodeId>, geometry: Geometry) -> RknnResult<Arc<Node>> {
        let node = self.tree.insert(id, geometry)?;
        warn!(
            "Site {} inserted after bulk load; the Voronoi graph is not updated",
            node.id()
        );
        Ok(node)
    }

    /// Removes a site and unlinks it from its neighbors.
    pub fn delete(&self, node: &Node) -> RknnResult<()> {
        let stored = self.tree.node(node.id())?;
        self.tree.delete(node)?;
        for neighbor_id in stored.neighbors() {
            let mut neighbor = match self.tree.node(neighbor_id) {
                Ok(neighbor) => (*neighbor).clone(),
                Err(RknnError::NotFound(_)) => continue,
                Err(err) => return Err(err),
            };
            if neighbor.remove_neighbor(stored.id()) {
                self.tree.store().put(neighbor)?;
            }
        }
        warn!(
            "Site {} deleted; its Voronoi neighbors were not re-linked",
            stored.id()
        );
        Ok(())
    }

    pub fn root(&self) -> RknnResult<Arc<Node>> {
        self.tree.root()
    }

    pub fn node(&self, id: &str) -> RknnResult<Arc<Node>> {
        self.tree.node(id)
    }

    pub fn contains_node(&self, node: &Node) -> RknnResult<bool> {
        self.tree.contains_node(node)
    }

    pub fn bounds(&self) -> RknnResult<Rect> {
        self.tree.bounds()
    }

    pub fn size(&self) -> u64 {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn height(&self) -> RknnResult<u32> {
        self.tree.height()
    }

    pub fn properties(&self) -> IndexProperties {
        self.tree.properties()
    }

    pub fn stats(&self) -> RknnResult<RTreeStats> {
        self.tree.stats()
    }

    pub fn intersects<'a, R: Region + ?Sized>(&'a self, region: &'a R) -> RangeQuery<'a, R> {
        self.tree.intersects(region)
    }

    pub fn contains<'a, R: Region + ?Sized>(&'a self, region: &'a R) -> RangeQuery<'a, R> {
        self.tree.contains(region)
    }

    pub fn data_nodes(&self) -> RangeQuery<'_, Rect> {
        self.tree.data_nodes()
    }

    pub fn reset_cache(&self) {
        self.tree.reset_cache();
    }

    pub fn flush(&self) -> RknnResult<()> {
        self.tree.flush()
    }

    pub fn close(&self) -> RknnResult<()> {
        self.tree.close()
    }

    pub fn is_closed(&self) -> bool {
        self.tree.is_closed()
    }
}

/// Iterator returned by [`VoRTree::nearest`].
pub struct VoronoiNearest<'a> {
    tree: &'a RTree,
    query: KnnQuery,
    queue: MinQueue<Arc<Node>>,
    visited: HashSet<NodeId>,
    remaining: usize,
}

impl<'a> VoronoiNearest<'a> {
    fn new(index: &'a VoRTree, query: KnnQuery, k: usize) -> RknnResult<Self> {
        let mut search = Self {
            tree: &index.tree,
            query,
            queue: MinQueue::new(),
            visited: HashSet::new(),
            remaining: k,
        };
        if k == 0 {
            return Ok(search);
        }

        // an unindexed query node may share its id with an indexed site
        let seed = match search.query.node() {
            Some(node) if index.contains_node(node)? => {
                search.visited.insert(node.id().to_string());
                Some(index.node(node.id())?)
            }
            _ => None,
        };

        match seed {
            Some(site) if !site.neighbors().is_empty() => search.expand(&site)?,
            _ => {
                if let Some((entry, distance)) = search.tree.nearest(search.query.clone(), 1)?.pop() {
                    search.visited.insert(entry.id().to_string());
                    search.queue.push(distance, entry);
                }
            }
        }
        Ok(search)
    }

    fn expand(&mut self, site: &Node) -> RknnResult<()> {
        for neighbor_id in site.neighbors() {
            if self.visited.insert(neighbor_id.clone()) {
                let neighbor = self.tree.node(neighbor_id)?;
                let distance = self.query.distance_to(neighbor.geometry());
                self.queue.push(distance, neighbor);
            }
        }
        Ok(())
    }
}

impl Iterator for VoronoiNearest<'_> {
    type Item = RknnResult<Neighbor>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let (distance, node) = self.queue.pop()?;
        self.remaining -= 1;
        if self.remaining > 0 {
            if let Err(err) = self.expand(&node) {
                self.remaining = 0;
                return Some(Err(err));
            }
        }
        Some(Ok((node, distance)))
    }
}
