use rknn::{Circle, Geometry, Point, Rect, RknnError, RTree, Sector};
use rknn_fjall_adapter::open_rtree_with;
use rknn_int_test::test_util::{run_test, scattered, sorted_distances, Entries};
use std::collections::BTreeSet;

fn no_entries() -> Entries {
    Vec::new()
}

fn ids_of(tree: &RTree) -> BTreeSet<String> {
    tree.data_nodes()
        .map(|node| node.unwrap().id().to_string())
        .collect()
}

#[test]
fn test_insert_delete_survive_reopen() {
    run_test(|ctx| {
        let entries = scattered(101, 300, "p");
        let removed: Vec<&String> = entries.iter().step_by(3).map(|(id, _)| id).collect();
        {
            let tree = open_rtree_with(ctx.fjall_config(ctx.path()), ctx.index_config(), entries.clone())?;
            for id in &removed {
                tree.delete_id(id)?;
            }
            assert_eq!(tree.size(), 200);
            tree.close()?;
        }

        let tree = open_rtree_with(ctx.fjall_config(ctx.path()), ctx.index_config(), no_entries())?;
        assert_eq!(tree.size(), 200);
        assert_eq!(tree.properties().max_children, 8);
        for id in &removed {
            assert!(matches!(tree.node(id), Err(RknnError::NotFound(_))));
        }
        let expected: BTreeSet<String> = entries
            .iter()
            .map(|(id, _)| id.clone())
            .filter(|id| !removed.contains(&id))
            .collect();
        assert_eq!(ids_of(&tree), expected);
        tree.close()
    });
}

#[test]
fn test_nearest_matches_brute_force() {
    run_test(|ctx| {
        let entries = scattered(102, 250, "p");
        let tree = open_rtree_with(ctx.fjall_config(ctx.path()), ctx.index_config(), entries.clone())?;
        for target in [Point::new(50.0, 50.0), Point::new(0.0, 0.0), Point::new(120.0, -5.0)] {
            let found = tree.nearest(target, 7)?;
            let distances: Vec<f64> = found.iter().map(|(_, d)| *d).collect();
            assert_eq!(distances, sorted_distances(&entries, None, &target)[..7].to_vec());
        }

        let everything = tree.nearest(Point::new(10.0, 10.0), 1_000)?;
        assert_eq!(everything.len(), 250);
        assert!(everything.windows(2).all(|w| w[0].1 <= w[1].1));
        tree.close()
    });
}

#[test]
fn test_region_queries_match_scan() {
    run_test(|ctx| {
        let entries = scattered(103, 200, "p");
        let tree = open_rtree_with(ctx.fjall_config(ctx.path()), ctx.index_config(), entries.clone())?;

        let circle = Circle::new(Point::new(40.0, 60.0), 18.0);
        let got: BTreeSet<String> = tree
            .intersects(&circle)
            .map(|node| node.map(|n| n.id().to_string()))
            .collect::<Result<_, _>>()?;
        let expected: BTreeSet<String> = entries
            .iter()
            .filter(|(_, g)| g.distance_to_point(&circle.center()) <= 18.0)
            .map(|(id, _)| id.clone())
            .collect();
        assert_eq!(got, expected);

        let wedge = Sector::new(Point::new(50.0, 50.0), 30.0, [0.0, std::f64::consts::FRAC_PI_4])?;
        let in_wedge = tree.contains(&wedge).count();
        let expected = entries
            .iter()
            .filter(|(_, g)| g.as_point().is_some_and(|p| {
                let (dx, dy) = (p.x - 50.0, p.y - 50.0);
                dx.hypot(dy) <= 30.0 && dx >= 0.0 && dy >= 0.0 && dy <= dx
            }))
            .count();
        assert_eq!(in_wedge, expected);
        tree.close()
    });
}

#[test]
fn test_mixed_geometries() {
    run_test(|ctx| {
        let tree = open_rtree_with(
            ctx.fjall_config(ctx.path()),
            ctx.index_config(),
            vec![
                ("park", Geometry::rect(0.0, 0.0, 10.0, 10.0)),
                ("well", Geometry::point(20.0, 20.0)),
                ("lake", Geometry::rect(30.0, 0.0, 40.0, 5.0)),
            ],
        )?;
        let near = tree.nearest(Point::new(5.0, 5.0), 1)?;
        assert_eq!(near[0].0.id(), "park");
        assert_eq!(near[0].1, 0.0);

        let window = Rect::new(8.0, 8.0, 25.0, 25.0);
        let hits: BTreeSet<String> = tree
            .intersects(&window)
            .map(|node| node.map(|n| n.id().to_string()))
            .collect::<Result<_, _>>()?;
        assert_eq!(hits, BTreeSet::from(["park".to_string(), "well".to_string()]));
        tree.close()
    });
}

#[test]
fn test_duplicate_and_empty() {
    run_test(|ctx| {
        let tree = open_rtree_with(ctx.fjall_config(ctx.path()), ctx.index_config(), no_entries())?;
        assert!(tree.is_empty());
        assert!(tree.nearest(Point::new(1.0, 1.0), 3)?.is_empty());
        assert!(tree.bounds()?.is_empty());

        tree.insert("a", Geometry::point(1.0, 1.0))?;
        assert!(matches!(
            tree.insert("a", Geometry::point(2.0, 2.0)),
            Err(RknnError::DuplicateId(_))
        ));
        tree.delete_id("a")?;
        assert!(tree.is_empty());
        assert_eq!(tree.height()?, 1);
        tree.close()
    });
}
