//! # rknn
//!
//! A disk-resident R-tree, its Voronoi-augmented variant (the VoR-tree) and
//! three reverse k-nearest-neighbor engines built on top of them.
//!
//! ## Key Features
//!
//! - **R-tree**: quadratic split, condense-on-delete, best-first k-NN and
//!   lazy range queries over points, rectangles and polygons
//! - **VoR-tree**: every data node carries its Delaunay (Voronoi) neighbors,
//!   k-NN walks the neighbor graph instead of descending the tree
//! - **RkNN**: VR, SLICE and CSD, each monochromatic and bichromatic
//! - **Pluggable storage**: nodes live in any [`KeyValueStore`]; an in-memory
//!   store ships here, a fjall-backed one in `rknn-fjall-adapter`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rknn::{Algorithm, Geometry, IndexConfig, VoRTree};
//!
//! let points = vec![
//!     ("a", Geometry::point(0.0, 0.0)),
//!     ("b", Geometry::point(1.0, 0.0)),
//!     ("c", Geometry::point(2.0, 0.0)),
//! ];
//! let index = VoRTree::in_memory(IndexConfig::default(), points)?;
//! let b = index.node("b")?;
//! for node in Algorithm::Csd.mono_rknn(&b, 1, &index)? {
//!     println!("{}", node?.id());
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`geometry`] - points, rectangles, polygons and query regions
//! - [`store`] - key-value backends and the caching node store
//! - [`rtree`] - the disk-resident R-tree
//! - [`vortree`] - R-tree plus Voronoi neighbor graph
//! - [`index`] - the read interface shared by both trees
//! - [`query`] - RkNN engines

pub mod config;
pub mod errors;
pub mod geometry;
pub mod holder;
pub mod index;
pub mod query;
pub mod rtree;
pub mod store;
pub mod vortree;

pub use config::{IndexConfig, IndexConfigBuilder};
pub use errors::{RknnError, RknnResult};
pub use geometry::{Circle, Geometry, Point, Polygon, Rect, Region, RegionUnion, Sector};
pub use index::{NearestIter, NodeIter, SpatialIndex};
pub use query::{knn_radius, Algorithm, DistanceCalculator, RknnIter};
pub use rtree::{IndexProperties, KnnQuery, Neighbor, Node, NodeId, RTree, RTreeStats, RangeQuery};
pub use store::{InMemoryStore, KeyValueStore, NodeStore, StoreStats};
pub use vortree::{VoRTree, VoronoiNearest};
