//! Write-through node cache over a [`KeyValueStore`].

use super::KeyValueStore;
use crate::errors::{RknnError, RknnResult};
use crate::rtree::Node;
use log::trace;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const NODE_PREFIX: &[u8] = b"node:";
const META_PREFIX: &[u8] = b"meta:";

/// Counters exposed through [`NodeStore::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub cached_nodes: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub reads: u64,
    pub writes: u64,
    pub deletes: u64,
}

struct StoreStatistics {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl StoreStatistics {
    fn new() -> Self {
        Self {
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        }
    }
}

/// Maps node ids to nodes.
///
/// Every write goes to the backend before the cache is updated. Reads hand
/// out shared snapshots; callers mutate a clone and `put` it back.
pub struct NodeStore {
    backend: Box<dyn KeyValueStore>,
    cache: RwLock<HashMap<String, Arc<Node>>>,
    stats: StoreStatistics,
}

impl NodeStore {
    pub fn new(backend: Box<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            cache: RwLock::new(HashMap::new()),
            stats: StoreStatistics::new(),
        }
    }

    fn node_key(id: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(NODE_PREFIX.len() + id.len());
        key.extend_from_slice(NODE_PREFIX);
        key.extend_from_slice(id.as_bytes());
        key
    }

    fn meta_key(name: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(META_PREFIX.len() + name.len());
        key.extend_from_slice(META_PREFIX);
        key.extend_from_slice(name.as_bytes());
        key
    }

    /// Fetches a node, failing with `NotFound` when the id is unknown.
    pub fn get(&self, id: &str) -> RknnResult<Arc<Node>> {
        if let Some(node) = self.cache.read().get(id) {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(node));
        }
        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        trace!("Cache miss for node {}", id);

        let bytes = self
            .backend
            .get(&Self::node_key(id))?
            .ok_or_else(|| RknnError::NotFound(id.to_string()))?;
        self.stats.reads.fetch_add(1, Ordering::Relaxed);

        let node = Arc::new(Node::decode(id, &bytes)?);
        self.cache
            .write()
            .insert(id.to_string(), Arc::clone(&node));
        Ok(node)
    }

    /// Persists a node and caches it.
    pub fn put(&self, node: Node) -> RknnResult<Arc<Node>> {
        let bytes = node.encode()?;
        self.backend.put(&Self::node_key(node.id()), &bytes)?;
        self.stats.writes.fetch_add(1, Ordering::Relaxed);

        let node = Arc::new(node);
        self.cache
            .write()
            .insert(node.id().to_string(), Arc::clone(&node));
        Ok(node)
    }

    pub fn delete(&self, id: &str) -> RknnResult<()> {
        self.backend.delete(&Self::node_key(id))?;
        self.stats.deletes.fetch_add(1, Ordering::Relaxed);
        self.cache.write().remove(id);
        Ok(())
    }

    pub fn contains(&self, id: &str) -> RknnResult<bool> {
        if self.cache.read().contains_key(id) {
            return Ok(true);
        }
        self.backend.contains(&Self::node_key(id))
    }

    pub fn get_meta(&self, name: &str) -> RknnResult<Option<Vec<u8>>> {
        self.backend.get(&Self::meta_key(name))
    }

    pub fn put_meta(&self, name: &str, value: &[u8]) -> RknnResult<()> {
        self.backend.put(&Self::meta_key(name), value)
    }

    /// Drops every cached node; later reads go to the backend.
    pub fn reset_cache(&self) {
        self.cache.write().clear();
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            cached_nodes: self.cache.read().len() as u64,
            cache_hits: self.stats.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.stats.cache_misses.load(Ordering::Relaxed),
            reads: self.stats.reads.load(Ordering::Relaxed),
            writes: self.stats.writes.load(Ordering::Relaxed),
            deletes: self.stats.deletes.load(Ordering::Relaxed),
        }
    }

    pub fn flush(&self) -> RknnResult<()> {
        self.backend.flush()
    }

    /// Flushes and closes the backend, then empties the cache.
    pub fn close(&self) -> RknnResult<()> {
        if self.backend.is_closed() {
            return Ok(());
        }
        self.backend.flush()?;
        self.backend.close()?;
        self.reset_cache();
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.backend.is_closed()
    }
}
