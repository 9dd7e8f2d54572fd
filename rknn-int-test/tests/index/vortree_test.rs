use rknn::{Geometry, KnnQuery, Node, Point, RknnError, SpatialIndex};
use rknn_fjall_adapter::open_vortree_with;
use rknn_int_test::test_util::{run_test, scattered, Entries};
use std::sync::Arc;

#[test]
fn test_neighbor_graph_is_symmetric_after_reopen() {
    run_test(|ctx| {
        let entries = scattered(201, 150, "s");
        open_vortree_with(ctx.fjall_config(ctx.path()), ctx.index_config(), entries.clone())?.close()?;

        let index = open_vortree_with(ctx.fjall_config(ctx.path()), ctx.index_config(), Entries::new())?;
        assert_eq!(index.size(), 150);
        for (id, _) in &entries {
            let site = index.node(id)?;
            assert!(!site.neighbors().is_empty(), "{} has no neighbors", id);
            for neighbor in index.neighbors(&site)? {
                assert!(neighbor.neighbors().iter().any(|n| n == id), "{} -> {}", id, neighbor.id());
            }
        }
        index.close()
    });
}

#[test]
fn test_graph_nearest_matches_tree_nearest() {
    run_test(|ctx| {
        let entries = scattered(202, 180, "s");
        let index = open_vortree_with(ctx.fjall_config(ctx.path()), ctx.index_config(), entries)?;

        for id in ["s0", "s90", "s179"] {
            let site = index.node(id)?;
            let walked: Vec<f64> = index
                .nearest(Arc::clone(&site), 12)?
                .map(|found| found.map(|(_, d)| d))
                .collect::<Result<_, _>>()?;
            let descended: Vec<f64> = index.tree().nearest(site, 12)?.into_iter().map(|(_, d)| d).collect();
            assert_eq!(walked, descended, "{}", id);
        }

        let target = Point::new(33.3, 66.6);
        let walked: Vec<f64> = index
            .nearest_stream(KnnQuery::Point(target), 5)?
            .map(|found| found.map(|(_, d)| d))
            .collect::<Result<_, _>>()?;
        let descended: Vec<f64> = index.tree().nearest(target, 5)?.into_iter().map(|(_, d)| d).collect();
        assert_eq!(walked, descended);
        index.close()
    });
}

#[test]
fn test_delete_unlinks_neighbors() {
    run_test(|ctx| {
        let entries = vec![
            ("a".to_string(), Geometry::point(0.0, 0.0)),
            ("b".to_string(), Geometry::point(1.0, 0.0)),
            ("c".to_string(), Geometry::point(2.0, 0.0)),
        ];
        let index = open_vortree_with(ctx.fjall_config(ctx.path()), ctx.index_config(), entries)?;
        let b = index.node("b")?;
        index.delete(&b)?;

        assert!(matches!(index.node("b"), Err(RknnError::NotFound(_))));
        assert!(index.node("a")?.neighbors().is_empty());
        assert!(index.node("c")?.neighbors().is_empty());
        assert_eq!(index.size(), 2);

        // a lost its only link, so the walk reseeds from the tree
        let from_a: Vec<String> = index
            .nearest(index.node("a")?, 2)?
            .map(|found| found.map(|(n, _)| n.id().to_string()))
            .collect::<Result<_, _>>()?;
        assert_eq!(from_a, vec!["c".to_string()]);
        index.close()
    });
}

#[test]
fn test_rejects_non_point_sites() {
    run_test(|ctx| {
        let err = open_vortree_with(
            ctx.fjall_config(&ctx.sibling("copy")),
            ctx.index_config(),
            vec![("zone", Geometry::rect(0.0, 0.0, 1.0, 1.0))],
        )
        .err();
        assert!(matches!(err, Some(RknnError::InvalidGeometry(_))));

        let stranger = Arc::new(Node::data("x", Geometry::point(0.5, 0.5)));
        let index = open_vortree_with(
            ctx.fjall_config(ctx.path()),
            ctx.index_config(),
            vec![("p", Geometry::point(0.0, 0.0)), ("q", Geometry::point(1.0, 1.0))],
        )?;
        assert!(!index.contains_node(&stranger)?);
        let nearest: Vec<String> = index
            .nearest(stranger, 2)?
            .map(|found| found.map(|(n, _)| n.id().to_string()))
            .collect::<Result<_, _>>()?;
        assert_eq!(nearest.len(), 2);
        index.close()
    });
}
