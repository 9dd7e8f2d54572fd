//! Fjall-backed persistence for `rknn` trees.
//!
//! ```rust,ignore
//! use rknn::{Geometry, IndexConfig};
//! use rknn_fjall_adapter::open_vortree;
//!
//! let index = open_vortree("/var/data/cafes", IndexConfig::default(), vec![
//!     ("a", Geometry::point(0.0, 0.0)),
//!     ("b", Geometry::point(4.0, 1.0)),
//! ])?;
//! index.close()?;
//!
//! // later: reopen without initial points
//! let index = open_vortree("/var/data/cafes", IndexConfig::default(), Vec::<(String, Geometry)>::new())?;
//! ```

mod config;
mod store;

pub use config::{FjallConfig, FjallConfigBuilder, DEFAULT_PARTITION};
pub use store::FjallStore;

use rknn::{Geometry, IndexConfig, NodeId, RTree, RknnResult, VoRTree};

/// Opens the R-tree stored at `path` and inserts `entries` into it.
pub fn open_rtree<I, S>(path: &str, index_config: IndexConfig, entries: I) -> RknnResult<RTree>
where
    I: IntoIterator<Item = (S, Geometry)>,
    S: Into<NodeId>,
{
    let config = FjallConfig::builder().db_path(path).build();
    open_rtree_with(config, index_config, entries)
}

pub fn open_rtree_with<I, S>(config: FjallConfig, index_config: IndexConfig, entries: I) -> RknnResult<RTree>
where
    I: IntoIterator<Item = (S, Geometry)>,
    S: Into<NodeId>,
{
    let store = FjallStore::open(config)?;
    RTree::bulk_load(Box::new(store), index_config, entries)
}

/// Opens the VoR-tree stored at `path`, or builds one from `entries`.
///
/// With no entries an existing tree is reopened as is; otherwise the
/// directory must not hold a tree yet, since the neighbor graph is only
/// built in bulk.
pub fn open_vortree<I, S>(path: &str, index_config: IndexConfig, entries: I) -> RknnResult<VoRTree>
where
    I: IntoIterator<Item = (S, Geometry)>,
    S: Into<NodeId>,
{
    let config = FjallConfig::builder().db_path(path).build();
    open_vortree_with(config, index_config, entries)
}

pub fn open_vortree_with<I, S>(config: FjallConfig, index_config: IndexConfig, entries: I) -> RknnResult<VoRTree>
where
    I: IntoIterator<Item = (S, Geometry)>,
    S: Into<NodeId>,
{
    let store = FjallStore::open(config)?;
    let mut entries = entries.into_iter().peekable();
    if entries.peek().is_none() {
        VoRTree::open(Box::new(store), index_config)
    } else {
        VoRTree::bulk_load(Box::new(store), index_config, entries)
    }
}
