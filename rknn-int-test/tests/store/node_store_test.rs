use rknn::{Geometry, KeyValueStore, Node, NodeStore, RknnError};
use rknn_fjall_adapter::{open_rtree_with, FjallStore};
use rknn_int_test::test_util::{run_test, scattered};

#[test]
fn test_cache_counters_over_fjall() {
    run_test(|ctx| {
        let nodes = NodeStore::new(Box::new(FjallStore::open(ctx.fjall_config(ctx.path()))?));
        nodes.put(Node::data("a", Geometry::point(1.0, 2.0)))?;
        nodes.put(Node::data("b", Geometry::rect(0.0, 0.0, 3.0, 3.0)))?;

        let stats = nodes.stats();
        assert_eq!(stats.writes, 2);
        assert_eq!(stats.cached_nodes, 2);

        assert_eq!(nodes.get("a")?.geometry(), &Geometry::point(1.0, 2.0));
        assert_eq!(nodes.stats().cache_hits, 1);
        assert_eq!(nodes.stats().reads, 0);

        nodes.reset_cache();
        assert_eq!(nodes.stats().cached_nodes, 0);
        assert_eq!(nodes.get("b")?.geometry(), &Geometry::rect(0.0, 0.0, 3.0, 3.0));
        let stats = nodes.stats();
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.reads, 1);
        assert_eq!(stats.cached_nodes, 1);

        nodes.delete("a")?;
        assert!(!nodes.contains("a")?);
        assert!(matches!(nodes.get("a"), Err(RknnError::NotFound(_))));
        assert_eq!(nodes.stats().deletes, 1);
        nodes.close()
    });
}

#[test]
fn test_meta_and_nodes_share_one_partition() {
    run_test(|ctx| {
        let backend = FjallStore::open(ctx.fjall_config(ctx.path()))?;
        let nodes = NodeStore::new(Box::new(backend.clone()));
        nodes.put_meta("properties", b"v1")?;
        nodes.put(Node::data("properties", Geometry::point(0.0, 0.0)))?;

        assert_eq!(nodes.get_meta("properties")?, Some(b"v1".to_vec()));
        assert!(backend.contains(b"meta:properties")?);
        assert!(backend.contains(b"node:properties")?);
        assert_eq!(nodes.get_meta("missing")?, None);

        nodes.close()?;
        assert!(backend.is_closed());
        assert!(matches!(nodes.get_meta("properties"), Err(RknnError::Closed)));
        Ok(())
    });
}

#[test]
fn test_tree_stats_after_reset() {
    run_test(|ctx| {
        let tree = open_rtree_with(ctx.fjall_config(ctx.path()), ctx.index_config(), scattered(501, 90, "p"))?;
        let stats = tree.stats()?;
        assert_eq!(stats.total_entries, 90);
        assert!(stats.tree_height >= 2);
        assert!(stats.store.writes >= 90);

        tree.reset_cache();
        assert_eq!(tree.stats()?.store.cached_nodes, 0);
        tree.nearest(tree.node("p10")?, 4)?;
        let warmed = tree.stats()?.store;
        assert!(warmed.reads > 0);
        assert!(warmed.cached_nodes > 0);
        tree.close()
    });
}
