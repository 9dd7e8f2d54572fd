//! Query inputs and lazy range iteration.

use super::{Node, NodeId, RTree};
use crate::errors::RknnResult;
use crate::geometry::{Geometry, Point, Rect, Region};
use std::sync::Arc;

/// A data node paired with its distance to the query.
pub type Neighbor = (Arc<Node>, f64);

/// Target of a nearest-neighbor search.
#[derive(Debug, Clone)]
pub enum KnnQuery {
    /// Distances are measured to the node's geometry, and the node itself
    /// is skipped when met in the index.
    Node(Arc<Node>),
    Point(Point),
}

impl KnnQuery {
    /// Distance from the query to a stored geometry.
    pub fn distance_to(&self, geometry: &Geometry) -> f64 {
        match self {
            KnnQuery::Point(p) => geometry.distance_to_point(p),
            KnnQuery::Node(node) => match node.geometry() {
                Geometry::Point(p) => geometry.distance_to_point(p),
                own => own.distance(geometry),
            },
        }
    }

    /// Lower bound on the distance to anything inside `rect`.
    pub fn lower_bound(&self, rect: &Rect) -> f64 {
        match self {
            KnnQuery::Point(p) => rect.min_distance(p),
            KnnQuery::Node(node) => node.bounding_rect().distance(rect),
        }
    }

    /// Whether `candidate` is the query node itself.
    pub fn excludes(&self, candidate: &Node) -> bool {
        matches!(self, KnnQuery::Node(node) if node.same_entity(candidate))
    }

    pub fn node(&self) -> Option<&Arc<Node>> {
        match self {
            KnnQuery::Node(node) => Some(node),
            KnnQuery::Point(_) => None,
        }
    }
}

impl From<Arc<Node>> for KnnQuery {
    fn from(node: Arc<Node>) -> Self {
        KnnQuery::Node(node)
    }
}

impl From<&Arc<Node>> for KnnQuery {
    fn from(node: &Arc<Node>) -> Self {
        KnnQuery::Node(Arc::clone(node))
    }
}

impl From<Node> for KnnQuery {
    fn from(node: Node) -> Self {
        KnnQuery::Node(Arc::new(node))
    }
}

impl From<Point> for KnnQuery {
    fn from(p: Point) -> Self {
        KnnQuery::Point(p)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RangeMode {
    Intersects,
    Contains,
    All,
}

/// Depth-first range search yielding data nodes.
///
/// Directory nodes are only descended when their bounding rectangle
/// intersects the region. The first storage error ends the iteration.
pub struct RangeQuery<'a, R: ?Sized> {
    tree: &'a RTree,
    region: Option<&'a R>,
    mode: RangeMode,
    stack: Vec<NodeId>,
}

impl<'a, R: Region + ?Sized> RangeQuery<'a, R> {
    pub(crate) fn new(tree: &'a RTree, region: Option<&'a R>, mode: RangeMode) -> Self {
        let root_id = tree.properties.read().root_id.clone();
        Self {
            tree,
            region,
            mode,
            stack: vec![root_id],
        }
    }

    fn admits_directory(&self, node: &Node) -> bool {
        match self.region {
            Some(region) => region.intersects(node.geometry()),
            None => true,
        }
    }

    fn matches(&self, node: &Node) -> bool {
        match (self.region, self.mode) {
            (_, RangeMode::All) | (None, _) => true,
            (Some(region), RangeMode::Intersects) => region.intersects(node.geometry()),
            (Some(region), RangeMode::Contains) => region.contains(node.geometry()),
        }
    }
}

impl<R: Region + ?Sized> Iterator for RangeQuery<'_, R> {
    type Item = RknnResult<Arc<Node>>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            let node = match self.tree.node(&id) {
                Ok(node) => node,
                Err(err) => {
                    self.stack.clear();
                    return Some(Err(err));
                }
            };
            if node.is_data() {
                if self.matches(&node) {
                    return Some(Ok(node));
                }
            } else if self.admits_directory(&node) {
                self.stack.extend(node.children().iter().rev().cloned());
            }
        }
        None
    }
}
