use rknn::query::{csd, slice, vr};
use rknn::{Algorithm, Geometry, Node, RknnError, SpatialIndex};
use rknn_fjall_adapter::{open_rtree_with, open_vortree_with};
use rknn_int_test::test_util::{ids, oracle_mono, run_test, scattered, Entries};
use std::sync::Arc;

#[test]
fn test_all_algorithms_match_brute_force() {
    run_test(|ctx| {
        let entries = scattered(301, 220, "p");
        let index = open_vortree_with(ctx.fjall_config(ctx.path()), ctx.index_config(), entries.clone())?;

        for q in ["p0", "p57", "p133", "p219"] {
            let query = index.node(q)?;
            for k in [1, 2, 4, 8] {
                let expected = oracle_mono(&entries, q, k);
                for algorithm in Algorithm::ALL {
                    let got = ids(algorithm.mono_rknn(&query, k, &index)?)?;
                    assert_eq!(got, expected, "{} q={} k={}", algorithm, q, k);
                }
            }
        }
        index.close()
    });
}

#[test]
fn test_results_hold_after_reopen_with_cold_cache() {
    run_test(|ctx| {
        let entries = scattered(302, 160, "p");
        open_vortree_with(ctx.fjall_config(ctx.path()), ctx.index_config(), entries.clone())?.close()?;

        let index = open_vortree_with(ctx.fjall_config(ctx.path()), ctx.index_config(), Entries::new())?;
        let query = index.node("p42")?;
        let expected = oracle_mono(&entries, "p42", 3);

        index.reset_cache();
        let by_vr = ids(vr::mono_rknn(&query, 3, &index)?)?;
        index.reset_cache();
        let by_slice = ids(slice::mono_rknn(&query, 3, &index)?)?;
        index.reset_cache();
        let by_csd = ids(csd::mono_rknn(&query, 3, &index)?)?;

        assert_eq!(by_vr, expected);
        assert_eq!(by_slice, expected);
        assert_eq!(by_csd, expected);
        assert!(index.stats()?.store.reads > 0);
        index.close()
    });
}

#[test]
fn test_slice_runs_on_plain_rtree() {
    run_test(|ctx| {
        let entries = scattered(303, 120, "p");
        let tree = open_rtree_with(ctx.fjall_config(ctx.path()), ctx.index_config(), entries.clone())?;
        let query = tree.node("p9")?;
        for k in [1, 5] {
            let got = ids(slice::mono_rknn(&query, k, &tree as &dyn SpatialIndex)?)?;
            assert_eq!(got, oracle_mono(&entries, "p9", k), "k={}", k);
        }
        tree.close()
    });
}

#[test]
fn test_edge_cases() {
    run_test(|ctx| {
        let index = open_vortree_with(
            ctx.fjall_config(ctx.path()),
            ctx.index_config(),
            vec![("only", Geometry::point(3.0, 4.0)), ("other", Geometry::point(6.0, 8.0))],
        )?;
        let only = index.node("only")?;

        for algorithm in Algorithm::ALL {
            assert!(ids(algorithm.mono_rknn(&only, 0, &index)?)?.is_empty(), "{}", algorithm);
            let got = ids(algorithm.mono_rknn(&only, 5, &index)?)?;
            assert_eq!(got.into_iter().collect::<Vec<_>>(), vec!["other".to_string()], "{}", algorithm);
        }

        let rect = Arc::new(Node::data("zone", Geometry::rect(0.0, 0.0, 1.0, 1.0)));
        for algorithm in Algorithm::ALL {
            assert!(matches!(
                algorithm.mono_rknn(&rect, 1, &index),
                Err(RknnError::InvalidGeometry(_))
            ));
        }
        index.close()
    });
}
