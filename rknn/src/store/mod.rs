//! Key-value persistence seam and the node store layered on top of it.

mod node_store;

pub use node_store::{NodeStore, StoreStats};

use crate::errors::{RknnError, RknnResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Byte-keyed storage backing a [`NodeStore`].
///
/// Implementations must be safe to share between threads; the tree itself
/// serializes mutations, so backends only need per-call atomicity.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &[u8]) -> RknnResult<Option<Vec<u8>>>;

    fn put(&self, key: &[u8], value: &[u8]) -> RknnResult<()>;

    /// Removes a key. Removing a missing key is not an error.
    fn delete(&self, key: &[u8]) -> RknnResult<()>;

    fn contains(&self, key: &[u8]) -> RknnResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Makes previous writes durable. No-op for volatile stores.
    fn flush(&self) -> RknnResult<()> {
        Ok(())
    }

    fn close(&self) -> RknnResult<()>;

    fn is_closed(&self) -> bool;
}

/// Volatile [`KeyValueStore`] kept in a sorted map.
///
/// Clones share the same map, so a tree can be reopened from a clone of
/// the store it was built on.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<InMemoryStoreInner>,
}

#[derive(Default)]
struct InMemoryStoreInner {
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    closed: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.map.read().is_empty()
    }

    fn check_opened(&self) -> RknnResult<()> {
        if self.inner.closed.load(Ordering::Acquire) {
            Err(RknnError::Closed)
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &[u8]) -> RknnResult<Option<Vec<u8>>> {
        self.check_opened()?;
        Ok(self.inner.map.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> RknnResult<()> {
        self.check_opened()?;
        self.inner.map.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> RknnResult<()> {
        self.check_opened()?;
        self.inner.map.write().remove(key);
        Ok(())
    }

    fn contains(&self, key: &[u8]) -> RknnResult<bool> {
        self.check_opened()?;
        Ok(self.inner.map.read().contains_key(key))
    }

    fn close(&self) -> RknnResult<()> {
        self.inner.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_store_basic_ops() {
        let store = InMemoryStore::new();
        assert!(store.is_empty());
        store.put(b"a", b"1").unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert!(store.contains(b"a").unwrap());

        store.delete(b"a").unwrap();
        store.delete(b"a").unwrap();
        assert_eq!(store.get(b"a").unwrap(), None);
    }

    #[test]
    fn test_clones_share_contents() {
        let store = InMemoryStore::new();
        let other = store.clone();
        store.put(b"k", b"v").unwrap();
        assert_eq!(other.len(), 1);
    }

    #[test]
    fn test_closed_store_rejects_calls() {
        let store = InMemoryStore::new();
        store.close().unwrap();
        assert!(store.is_closed());
        assert!(matches!(store.get(b"k"), Err(RknnError::Closed)));
        assert!(matches!(store.put(b"k", b"v"), Err(RknnError::Closed)));
    }
}
