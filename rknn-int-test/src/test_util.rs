use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rknn::{Geometry, IndexConfig, Point, RknnResult};
use rknn_fjall_adapter::{FjallConfig, FjallStore};
use std::collections::BTreeSet;
use std::env;

pub type Entries = Vec<(String, Geometry)>;

/// Runs `test` against a fresh [`TestContext`] whose directory is removed
/// afterwards, whether the test passed, failed or panicked.
pub fn run_test<T>(test: T)
where
    T: FnOnce(&TestContext) -> RknnResult<()> + std::panic::UnwindSafe,
{
    let ctx = TestContext::new();
    let result = std::panic::catch_unwind(|| test(&ctx));
    drop(ctx);
    match result {
        Ok(Ok(())) => {}
        Ok(Err(err)) => panic!("Test failed: {:?}", err),
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// Scratch directory for fjall-backed trees.
pub struct TestContext {
    path: String,
}

impl TestContext {
    pub fn new() -> Self {
        Self { path: random_path() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// A second directory next to this one, removed with the context.
    pub fn sibling(&self, name: &str) -> String {
        format!("{}-{}", self.path, name)
    }

    /// Low-memory fjall settings for `path`.
    pub fn fjall_config(&self, path: &str) -> FjallConfig {
        FjallConfig::builder().low_memory_preset().db_path(path).build()
    }

    pub fn index_config(&self) -> IndexConfig {
        IndexConfig::builder()
            .max_children(8)
            .build()
            .unwrap_or_default()
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        for path in [self.path.clone(), self.sibling("copy")] {
            if let Err(err) = FjallStore::destroy(&path) {
                log::error!("Failed to remove test directory {}: {}", path, err);
            }
        }
    }
}

pub fn random_path() -> String {
    let id = uuid::Uuid::new_v4();
    env::temp_dir().join(id.to_string()).to_string_lossy().into_owned()
}

/// `n` points uniformly spread over `[0, 100)²`, ids `{prefix}{i}`.
pub fn scattered(seed: u64, n: usize, prefix: &str) -> Entries {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let x = rng.random_range(0.0..100.0);
            let y = rng.random_range(0.0..100.0);
            (format!("{}{}", prefix, i), Geometry::point(x, y))
        })
        .collect()
}

pub fn point_of(entries: &[(String, Geometry)], id: &str) -> Point {
    entries
        .iter()
        .find(|(other, _)| other == id)
        .and_then(|(_, geometry)| geometry.as_point().copied())
        .unwrap_or_else(|| panic!("no point {}", id))
}

/// Distances from `p` to every entry except `own_id`, ascending.
pub fn sorted_distances(entries: &[(String, Geometry)], own_id: Option<&str>, p: &Point) -> Vec<f64> {
    let mut distances: Vec<f64> = entries
        .iter()
        .filter(|(id, _)| Some(id.as_str()) != own_id)
        .map(|(_, geometry)| geometry.distance_to_point(p))
        .collect();
    distances.sort_by(f64::total_cmp);
    distances
}

fn kth(distances: &[f64], k: usize) -> f64 {
    distances.get(k - 1).copied().unwrap_or(f64::INFINITY)
}

/// Brute-force monochromatic RkNN.
pub fn oracle_mono(entries: &[(String, Geometry)], q: &str, k: usize) -> BTreeSet<String> {
    let qp = point_of(entries, q);
    entries
        .iter()
        .filter(|(id, _)| id != q)
        .filter(|(id, geometry)| {
            let p = geometry.as_point().copied().unwrap_or(qp);
            p.distance(&qp) <= kth(&sorted_distances(entries, Some(id.as_str()), &p), k)
        })
        .map(|(id, _)| id.clone())
        .collect()
}

/// Brute-force bichromatic RkNN of facility `q`.
pub fn oracle_bi(facilities: &[(String, Geometry)], users: &[(String, Geometry)], q: &str, k: usize) -> BTreeSet<String> {
    let qp = point_of(facilities, q);
    users
        .iter()
        .filter(|(_, geometry)| {
            let p = geometry.as_point().copied().unwrap_or(qp);
            p.distance(&qp) <= kth(&sorted_distances(facilities, None, &p), k)
        })
        .map(|(id, _)| id.clone())
        .collect()
}

/// Ids produced by an RkNN stream.
pub fn ids<I>(iter: I) -> RknnResult<BTreeSet<String>>
where
    I: Iterator<Item = RknnResult<std::sync::Arc<rknn::Node>>>,
{
    iter.map(|node| node.map(|n| n.id().to_string())).collect()
}
