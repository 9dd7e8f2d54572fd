//! Tree node record and its on-disk encoding.

use crate::errors::RknnResult;
use crate::geometry::{Geometry, Point, Rect};
use serde::{Deserialize, Serialize};

/// Opaque node identifier. Data nodes carry the caller's id, directory
/// nodes a generated UUID.
pub type NodeId = String;

/// A node of the tree.
///
/// Level 0 nodes are data nodes (the indexed entities). Nodes at level 1
/// are leaves whose children are data nodes; everything above is internal.
/// Directory nodes always have a child list, data nodes never do. Only data
/// nodes of a Voronoi-augmented tree carry a neighbor list.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: NodeId,
    geometry: Geometry,
    children: Option<Vec<NodeId>>,
    level: u32,
    neighbors: Option<Vec<NodeId>>,
}

#[derive(Serialize)]
struct NodeRecordRef<'a>(&'a Geometry, &'a Option<Vec<NodeId>>, u32, &'a Option<Vec<NodeId>>);

#[derive(Deserialize)]
struct NodeRecord(Geometry, Option<Vec<NodeId>>, u32, Option<Vec<NodeId>>);

impl Node {
    /// Creates a data node.
    pub fn data(id: impl Into<NodeId>, geometry: Geometry) -> Self {
        Self {
            id: id.into(),
            geometry,
            children: None,
            level: 0,
            neighbors: None,
        }
    }

    /// Creates a directory node at `level` (>= 1).
    pub fn directory(id: impl Into<NodeId>, rect: Rect, children: Vec<NodeId>, level: u32) -> Self {
        Self {
            id: id.into(),
            geometry: Geometry::Rect(rect),
            children: Some(children),
            level,
            neighbors: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// Child ids; empty for data nodes.
    pub fn children(&self) -> &[NodeId] {
        self.children.as_deref().unwrap_or(&[])
    }

    pub fn child_count(&self) -> usize {
        self.children().len()
    }

    /// Voronoi neighbor ids; empty when the node has none.
    pub fn neighbors(&self) -> &[NodeId] {
        self.neighbors.as_deref().unwrap_or(&[])
    }

    pub fn is_data(&self) -> bool {
        self.level == 0
    }

    pub fn is_leaf(&self) -> bool {
        self.level == 1
    }

    /// The location of a point data node.
    pub fn point(&self) -> Option<&Point> {
        self.geometry.as_point()
    }

    pub fn bounding_rect(&self) -> Rect {
        self.geometry.bounding_rect()
    }

    /// Same id and same geometry.
    pub fn same_entity(&self, other: &Node) -> bool {
        self.id == other.id && self.geometry == other.geometry
    }

    pub(crate) fn set_rect(&mut self, rect: Rect) {
        self.geometry = Geometry::Rect(rect);
    }

    pub(crate) fn push_child(&mut self, id: impl Into<NodeId>) {
        self.children.get_or_insert_with(Vec::new).push(id.into());
    }

    pub(crate) fn remove_child(&mut self, id: &str) -> bool {
        match self.children.as_mut() {
            Some(children) => {
                let before = children.len();
                children.retain(|c| c != id);
                children.len() != before
            }
            None => false,
        }
    }

    pub(crate) fn set_neighbors(&mut self, neighbors: Vec<NodeId>) {
        self.neighbors = Some(neighbors);
    }

    pub(crate) fn remove_neighbor(&mut self, id: &str) -> bool {
        match self.neighbors.as_mut() {
            Some(neighbors) => {
                let before = neighbors.len();
                neighbors.retain(|n| n != id);
                neighbors.len() != before
            }
            None => false,
        }
    }

    /// Encodes `(geometry, children, level, neighbors)`; the id is the key.
    pub(crate) fn encode(&self) -> RknnResult<Vec<u8>> {
        let record = NodeRecordRef(&self.geometry, &self.children, self.level, &self.neighbors);
        Ok(bincode::serde::encode_to_vec(&record, bincode::config::legacy())?)
    }

    pub(crate) fn decode(id: impl Into<NodeId>, bytes: &[u8]) -> RknnResult<Self> {
        let (record, _): (NodeRecord, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::legacy())?;
        let NodeRecord(geometry, children, level, neighbors) = record;
        Ok(Self {
            id: id.into(),
            geometry,
            children,
            level,
            neighbors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RknnError;

    #[test]
    fn test_data_node_decodes_with_neighbors() {
        let mut node = Node::data("p1", Geometry::point(1.5, -2.0));
        node.set_neighbors(vec!["p2".to_string(), "p3".to_string()]);

        let bytes = node.encode().unwrap();
        let decoded = Node::decode("p1", &bytes).unwrap();
        assert_eq!(decoded, node);
        assert!(decoded.is_data());
        assert_eq!(decoded.neighbors(), ["p2", "p3"]);
    }

    #[test]
    fn test_directory_children_edit() {
        let mut node = Node::directory("n", Rect::empty(), vec!["a".into(), "b".into()], 1);
        assert!(node.is_leaf());
        assert!(node.remove_child("a"));
        assert!(!node.remove_child("zzz"));
        node.push_child("c");
        assert_eq!(node.children(), ["b", "c"]);
    }

    #[test]
    fn test_empty_rect_survives_encoding() {
        let node = Node::directory("root", Rect::empty(), Vec::new(), 1);
        let decoded = Node::decode("root", &node.encode().unwrap()).unwrap();
        assert!(decoded.bounding_rect().is_empty());
        assert_eq!(decoded.child_count(), 0);
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        let err = Node::decode("x", &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, RknnError::Serialization(_)));
    }
}
