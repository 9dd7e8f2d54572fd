//! Disk-resident R-tree over a [`NodeStore`].
//!
//! The tree never holds nodes itself: every structural read goes through the
//! node store (and its cache), every structural change is written back
//! before the operation returns. Data nodes live in the same store as the
//! directory nodes, keyed by the caller's id.

mod node;
mod query;
mod split;

pub use node::{Node, NodeId};
pub use query::{KnnQuery, Neighbor, RangeQuery};

use crate::config::IndexConfig;
use crate::errors::{RknnError, RknnResult};
use crate::geometry::{Geometry, Rect, Region};
use crate::holder::{MinQueue, SmallestHolder};
use crate::store::{InMemoryStore, KeyValueStore, NodeStore, StoreStats};
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use query::RangeMode;
use split::quadratic_split;

const PROPERTIES_KEY: &str = "properties";

/// Persisted tree header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexProperties {
    pub max_children: usize,
    pub min_children: usize,
    pub root_id: NodeId,
    pub entry_count: u64,
}

/// Snapshot of tree shape and store counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RTreeStats {
    pub total_entries: u64,
    pub tree_height: u32,
    pub store: StoreStats,
}

enum Inserted {
    Absorbed,
    Split([Arc<Node>; 2]),
}

/// R-tree with quadratic split, min-fill condensation on delete and
/// best-first k-nearest-neighbor search.
pub struct RTree {
    nodes: NodeStore,
    properties: RwLock<IndexProperties>,
    /// Serializes structural mutations.
    write_lock: Mutex<()>,
}

impl RTree {
    /// Opens the tree persisted in `store`, or creates an empty one.
    ///
    /// `config` only applies when the store holds no tree yet.
    pub fn open(store: Box<dyn KeyValueStore>, config: IndexConfig) -> RknnResult<Self> {
        config.validate()?;
        let nodes = NodeStore::new(store);

        let properties = match nodes.get_meta(PROPERTIES_KEY)? {
            Some(bytes) => {
                let (properties, _): (IndexProperties, usize) =
                    bincode::serde::decode_from_slice(&bytes, bincode::config::legacy())?;
                debug!(
                    "Reopened tree with root {} ({} entries)",
                    properties.root_id, properties.entry_count
                );
                properties
            }
            None => {
                let root = Node::directory(Uuid::new_v4().to_string(), Rect::empty(), Vec::new(), 1);
                let root = nodes.put(root)?;
                let properties = IndexProperties {
                    max_children: config.max_children(),
                    min_children: config.min_children(),
                    root_id: root.id().to_string(),
                    entry_count: 0,
                };
                let bytes = bincode::serde::encode_to_vec(&properties, bincode::config::legacy())?;
                nodes.put_meta(PROPERTIES_KEY, &bytes)?;
                debug!(
                    "Created tree with fanout {}..{}",
                    properties.min_children, properties.max_children
                );
                properties
            }
        };

        Ok(Self {
            nodes,
            properties: RwLock::new(properties),
            write_lock: Mutex::new(()),
        })
    }

    /// Creates an empty tree on a fresh [`InMemoryStore`].
    pub fn in_memory(config: IndexConfig) -> RknnResult<Self> {
        Self::open(Box::new(InMemoryStore::new()), config)
    }

    /// Opens (or creates) a tree on `store` and inserts every entry.
    pub fn bulk_load<I, S>(store: Box<dyn KeyValueStore>, config: IndexConfig, entries: I) -> RknnResult<Self>
    where
        I: IntoIterator<Item = (S, Geometry)>,
        S: Into<NodeId>,
    {
        let tree = Self::open(store, config)?;
        let mut loaded = 0usize;
        for (id, geometry) in entries {
            tree.insert(id, geometry)?;
            loaded += 1;
        }
        info!("Bulk loaded {} entries", loaded);
        Ok(tree)
    }

    pub fn properties(&self) -> IndexProperties {
        self.properties.read().clone()
    }

    pub fn size(&self) -> u64 {
        self.properties.read().entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn root(&self) -> RknnResult<Arc<Node>> {
        let root_id = self.properties.read().root_id.clone();
        self.nodes.get(&root_id)
    }

    /// Level of the root; 1 for a tree whose root is a leaf.
    pub fn height(&self) -> RknnResult<u32> {
        Ok(self.root()?.level())
    }

    /// Bounding rectangle of every indexed entity.
    pub fn bounds(&self) -> RknnResult<Rect> {
        Ok(self.root()?.bounding_rect())
    }

    pub fn node(&self, id: &str) -> RknnResult<Arc<Node>> {
        self.nodes.get(id)
    }

    /// Whether `node` is indexed here: a stored node with the same id and
    /// the same geometry.
    pub fn contains_node(&self, node: &Node) -> RknnResult<bool> {
        if !self.nodes.contains(node.id())? {
            return Ok(false);
        }
        Ok(self.nodes.get(node.id())?.same_entity(node))
    }

    pub(crate) fn store(&self) -> &NodeStore {
        &self.nodes
    }

    pub fn stats(&self) -> RknnResult<RTreeStats> {
        Ok(RTreeStats {
            total_entries: self.size(),
            tree_height: self.height()?,
            store: self.nodes.stats(),
        })
    }

    /// Drops every cached node.
    pub fn reset_cache(&self) {
        self.nodes.reset_cache();
    }

    pub fn flush(&self) -> RknnResult<()> {
        self.nodes.flush()
    }

    pub fn close(&self) -> RknnResult<()> {
        let _guard = self.write_lock.lock();
        self.nodes.close()
    }

    pub fn is_closed(&self) -> bool {
        self.nodes.is_closed()
    }

    // ========================================================================
    // Insert
    // ========================================================================

    /// Indexes `geometry` under `id` and returns the stored data node.
    pub fn insert(&self, id: impl Into<NodeId>, geometry: Geometry) -> RknnResult<Arc<Node>> {
        let id = id.into();
        let _guard = self.write_lock.lock();
        if self.nodes.contains(&id)? {
            return Err(RknnError::DuplicateId(id));
        }
        let data = self.nodes.put(Node::data(id, geometry))?;
        self.insert_entry(&data)?;
        self.update_properties(|p| p.entry_count += 1)?;
        Ok(data)
    }

    /// Places an existing node (data or directory) at its own level.
    fn insert_entry(&self, entry: &Node) -> RknnResult<()> {
        let root_id = self.properties.read().root_id.clone();
        if let Inserted::Split(parts) = self.insert_at(&root_id, entry)? {
            let root = self.new_directory(&parts)?;
            debug!("Root split, new root {} at level {}", root.id(), root.level());
            let new_root_id = root.id().to_string();
            self.update_properties(|p| p.root_id = new_root_id)?;
        }
        Ok(())
    }

    fn insert_at(&self, node_id: &str, entry: &Node) -> RknnResult<Inserted> {
        let max_children = self.properties.read().max_children;
        let mut node = (*self.nodes.get(node_id)?).clone();
        let covered = node.bounding_rect().union(&entry.bounding_rect());

        if node.level() <= entry.level() {
            return Err(RknnError::InvalidGeometry(format!(
                "cannot place a level {} node under level {} node {}",
                entry.level(),
                node.level(),
                node.id()
            )));
        }

        if node.level() == entry.level() + 1 {
            node.push_child(entry.id());
            if node.child_count() > max_children {
                return Ok(Inserted::Split(self.split(node)?));
            }
            node.set_rect(covered);
            self.nodes.put(node)?;
            return Ok(Inserted::Absorbed);
        }

        let chosen = self.choose_subtree(&node, &entry.bounding_rect())?;
        match self.insert_at(&chosen, entry)? {
            Inserted::Split(parts) => {
                node.remove_child(&chosen);
                for part in &parts {
                    node.push_child(part.id());
                }
                if node.child_count() > max_children {
                    return Ok(Inserted::Split(self.split(node)?));
                }
                node.set_rect(covered);
                self.nodes.put(node)?;
            }
            Inserted::Absorbed => {
                if node.bounding_rect() != covered {
                    node.set_rect(covered);
                    self.nodes.put(node)?;
                }
            }
        }
        Ok(Inserted::Absorbed)
    }

    /// Child needing the least enlargement; ties go to the smaller cover.
    fn choose_subtree(&self, node: &Node, rect: &Rect) -> RknnResult<NodeId> {
        let mut best: Option<(f64, f64, &NodeId)> = None;
        for child_id in node.children() {
            let child_rect = self.nodes.get(child_id)?.bounding_rect();
            let cover = child_rect.union(rect).area();
            let growth = cover - child_rect.area();
            let better = match best {
                None => true,
                Some((best_growth, best_cover, _)) => {
                    growth < best_growth || (growth == best_growth && cover < best_cover)
                }
            };
            if better {
                best = Some((growth, cover, child_id));
            }
        }
        best.map(|(_, _, id)| id.clone()).ok_or_else(|| {
            RknnError::NotFound(format!("child of directory node {}", node.id()))
        })
    }

    /// Splits an overflowing node into two new siblings and drops it.
    fn split(&self, node: Node) -> RknnResult<[Arc<Node>; 2]> {
        let children = node
            .children()
            .iter()
            .map(|id| self.nodes.get(id))
            .collect::<RknnResult<Vec<_>>>()?;
        let rects: Vec<Rect> = children.iter().map(|c| c.bounding_rect()).collect();
        let min_children = self.properties.read().min_children;

        let [first, second] = quadratic_split(&rects, min_children);
        let pick = |group: &[usize]| group.iter().map(|&i| Arc::clone(&children[i])).collect::<Vec<_>>();
        let left = self.new_directory(&pick(&first))?;
        let right = self.new_directory(&pick(&second))?;
        self.nodes.delete(node.id())?;

        debug!(
            "Split level {} node {} into {} + {} children",
            node.level(),
            node.id(),
            left.child_count(),
            right.child_count()
        );
        Ok([left, right])
    }

    fn new_directory(&self, children: &[Arc<Node>]) -> RknnResult<Arc<Node>> {
        let rect = children
            .iter()
            .fold(Rect::empty(), |acc, c| acc.union(&c.bounding_rect()));
        let level = children.first().map_or(0, |c| c.level()) + 1;
        let ids = children.iter().map(|c| c.id().to_string()).collect();
        self.nodes.put(Node::directory(Uuid::new_v4().to_string(), rect, ids, level))
    }

    // ========================================================================
    // Delete
    // ========================================================================

    /// Removes a data node from the tree and from the store.
    pub fn delete(&self, node: &Node) -> RknnResult<()> {
        if !node.is_data() {
            return Err(RknnError::InvalidGeometry(format!(
                "only data nodes can be deleted, {} is at level {}",
                node.id(),
                node.level()
            )));
        }
        let _guard = self.write_lock.lock();
        let root = self.root()?;
        let mut path = self
            .find_leaf(&root, node)?
            .ok_or_else(|| RknnError::LeafNotFound(node.id().to_string()))?;

        if let Some(leaf) = path.last_mut() {
            leaf.remove_child(node.id());
        }
        self.nodes.delete(node.id())?;
        self.condense(path)?;
        self.update_properties(|p| p.entry_count = p.entry_count.saturating_sub(1))?;
        Ok(())
    }

    /// Deletes the data node stored under `id`.
    pub fn delete_id(&self, id: &str) -> RknnResult<()> {
        let node = self.nodes.get(id)?;
        self.delete(&node)
    }

    /// Path from `current` down to the leaf listing `target`, if any.
    fn find_leaf(&self, current: &Node, target: &Node) -> RknnResult<Option<Vec<Node>>> {
        if current.is_leaf() {
            let holds = current.children().iter().any(|c| c == target.id());
            return Ok(holds.then(|| vec![current.clone()]));
        }
        let rect = target.bounding_rect();
        for child_id in current.children() {
            let child = self.nodes.get(child_id)?;
            if !child.bounding_rect().intersects(&rect) {
                continue;
            }
            if let Some(mut path) = self.find_leaf(&child, target)? {
                path.insert(0, current.clone());
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    /// Walks the path bottom-up dropping underfull nodes, tightening the
    /// rest, then re-inserts orphaned subtrees and collapses the root.
    fn condense(&self, mut path: Vec<Node>) -> RknnResult<()> {
        let (min_children, root_id) = {
            let p = self.properties.read();
            (p.min_children, p.root_id.clone())
        };
        let mut orphans: Vec<NodeId> = Vec::new();

        while let Some(mut node) = path.pop() {
            if node.id() != root_id && node.child_count() < min_children {
                orphans.extend(node.children().iter().cloned());
                if let Some(parent) = path.last_mut() {
                    parent.remove_child(node.id());
                }
                self.nodes.delete(node.id())?;
                debug!("Dissolved underfull node {} (level {})", node.id(), node.level());
            } else {
                let rect = self.cover_of(&node)?;
                node.set_rect(rect);
                self.nodes.put(node)?;
            }
        }

        while let Some(orphan_id) = orphans.pop() {
            let orphan = self.nodes.get(&orphan_id)?;
            let root_level = self.root()?.level();
            if orphan.level() >= root_level {
                // Too tall to fit under the current root: re-home its children.
                orphans.extend(orphan.children().iter().cloned());
                self.nodes.delete(orphan.id())?;
            } else {
                self.insert_entry(&orphan)?;
            }
        }

        self.collapse_root()
    }

    fn collapse_root(&self) -> RknnResult<()> {
        loop {
            let root = self.root()?;
            if root.level() <= 1 || root.child_count() != 1 {
                return Ok(());
            }
            let child_id = root.children()[0].clone();
            self.nodes.delete(root.id())?;
            debug!("Collapsed root {} into {}", root.id(), child_id);
            self.update_properties(|p| p.root_id = child_id)?;
        }
    }

    fn cover_of(&self, node: &Node) -> RknnResult<Rect> {
        let mut rect = Rect::empty();
        for child_id in node.children() {
            rect = rect.union(&self.nodes.get(child_id)?.bounding_rect());
        }
        Ok(rect)
    }

    fn update_properties(&self, change: impl FnOnce(&mut IndexProperties)) -> RknnResult<()> {
        let mut properties = self.properties.write();
        change(&mut properties);
        let bytes = bincode::serde::encode_to_vec(&*properties, bincode::config::legacy())?;
        self.nodes.put_meta(PROPERTIES_KEY, &bytes)
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Data nodes whose geometry intersects `region`.
    pub fn intersects<'a, R: Region + ?Sized>(&'a self, region: &'a R) -> RangeQuery<'a, R> {
        RangeQuery::new(self, Some(region), RangeMode::Intersects)
    }

    /// Data nodes whose geometry lies inside `region`.
    pub fn contains<'a, R: Region + ?Sized>(&'a self, region: &'a R) -> RangeQuery<'a, R> {
        RangeQuery::new(self, Some(region), RangeMode::Contains)
    }

    /// Every data node, in depth-first order.
    pub fn data_nodes(&self) -> RangeQuery<'_, Rect> {
        RangeQuery::new(self, None, RangeMode::All)
    }

    /// The `k` data nodes nearest to `query`, nearest first.
    ///
    /// When the query is a node, that node itself is never reported.
    pub fn nearest(&self, query: impl Into<KnnQuery>, k: usize) -> RknnResult<Vec<Neighbor>> {
        let query = query.into();
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut queue = MinQueue::new();
        queue.push(0.0, self.properties.read().root_id.clone());
        let mut nearest = SmallestHolder::new(k);

        while let Some((bound, id)) = queue.pop() {
            if nearest.is_full() && bound > nearest.bound() {
                break;
            }
            let node = self.nodes.get(&id)?;
            for child_id in node.children() {
                let child = self.nodes.get(child_id)?;
                if node.is_leaf() {
                    if query.excludes(&child) {
                        continue;
                    }
                    let distance = query.distance_to(child.geometry());
                    nearest.push(distance, child);
                } else {
                    let distance = query.lower_bound(&child.bounding_rect());
                    if distance < nearest.bound() {
                        queue.push(distance, child_id.clone());
                    }
                }
            }
        }

        Ok(nearest
            .into_sorted_vec()
            .into_iter()
            .map(|(distance, node)| (node, distance))
            .collect())
    }
}
