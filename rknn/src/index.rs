//! Read-side interface shared by [`RTree`] and [`VoRTree`].
//!
//! The RkNN engines only need node lookup, range search and an ordered
//! nearest-neighbor stream; both index kinds supply those through this trait.

use crate::errors::RknnResult;
use crate::geometry::{Rect, Region};
use crate::rtree::{KnnQuery, Neighbor, Node, RTree};
use crate::vortree::VoRTree;
use std::sync::Arc;

/// Boxed stream of `(node, distance)` pairs in ascending distance order.
pub type NearestIter<'a> = Box<dyn Iterator<Item = RknnResult<Neighbor>> + 'a>;

/// Boxed stream of data nodes.
pub type NodeIter<'a> = Box<dyn Iterator<Item = RknnResult<Arc<Node>>> + 'a>;

pub trait SpatialIndex {
    fn node(&self, id: &str) -> RknnResult<Arc<Node>>;

    fn root(&self) -> RknnResult<Arc<Node>>;

    /// Bounding rectangle of every indexed entity.
    fn bounds(&self) -> RknnResult<Rect> {
        Ok(self.root()?.bounding_rect())
    }

    /// Whether the node (same id and geometry) is indexed here.
    fn contains_node(&self, node: &Node) -> RknnResult<bool>;

    /// Up to `k` data nodes nearest to `query`, nearest first.
    fn nearest_stream<'a>(&'a self, query: KnnQuery, k: usize) -> RknnResult<NearestIter<'a>>;

    /// Data nodes intersecting `region`.
    fn search<'a>(&'a self, region: &'a dyn Region) -> NodeIter<'a>;
}

impl SpatialIndex for RTree {
    fn node(&self, id: &str) -> RknnResult<Arc<Node>> {
        RTree::node(self, id)
    }

    fn root(&self) -> RknnResult<Arc<Node>> {
        RTree::root(self)
    }

    fn contains_node(&self, node: &Node) -> RknnResult<bool> {
        RTree::contains_node(self, node)
    }

    fn nearest_stream<'a>(&'a self, query: KnnQuery, k: usize) -> RknnResult<NearestIter<'a>> {
        let found = RTree::nearest(self, query, k)?;
        Ok(Box::new(found.into_iter().map(Ok)))
    }

    fn search<'a>(&'a self, region: &'a dyn Region) -> NodeIter<'a> {
        Box::new(self.intersects(region))
    }
}

impl SpatialIndex for VoRTree {
    fn node(&self, id: &str) -> RknnResult<Arc<Node>> {
        VoRTree::node(self, id)
    }

    fn root(&self) -> RknnResult<Arc<Node>> {
        VoRTree::root(self)
    }

    fn contains_node(&self, node: &Node) -> RknnResult<bool> {
        VoRTree::contains_node(self, node)
    }

    fn nearest_stream<'a>(&'a self, query: KnnQuery, k: usize) -> RknnResult<NearestIter<'a>> {
        Ok(Box::new(VoRTree::nearest(self, query, k)?))
    }

    fn search<'a>(&'a self, region: &'a dyn Region) -> NodeIter<'a> {
        Box::new(self.intersects(region))
    }
}
