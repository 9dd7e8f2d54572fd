use rknn::query::{csd, slice, vr};
use rknn::{Algorithm, Geometry, SpatialIndex};
use rknn_fjall_adapter::{open_rtree_with, open_vortree_with};
use rknn_int_test::test_util::{ids, oracle_bi, run_test, scattered};

#[test]
fn test_all_algorithms_match_brute_force() {
    run_test(|ctx| {
        let facilities = scattered(401, 60, "f");
        let users = scattered(402, 240, "u");
        let facility_index =
            open_vortree_with(ctx.fjall_config(ctx.path()), ctx.index_config(), facilities.clone())?;
        let user_index =
            open_vortree_with(ctx.fjall_config(&ctx.sibling("copy")), ctx.index_config(), users.clone())?;

        for q in ["f0", "f31", "f59"] {
            let query = facility_index.node(q)?;
            for k in [1, 2, 5] {
                let expected = oracle_bi(&facilities, &users, q, k);
                for algorithm in Algorithm::ALL {
                    let got = ids(algorithm.bi_rknn(&query, k, &facility_index, &user_index)?)?;
                    assert_eq!(got, expected, "{} q={} k={}", algorithm, q, k);
                }
            }
        }
        facility_index.close()?;
        user_index.close()
    });
}

#[test]
fn test_plain_rtree_users_and_facilities() {
    run_test(|ctx| {
        let facilities = scattered(403, 30, "f");
        let users = scattered(404, 150, "u");
        let facility_graph =
            open_vortree_with(ctx.fjall_config(ctx.path()), ctx.index_config(), facilities.clone())?;
        let user_tree = open_rtree_with(ctx.fjall_config(&ctx.sibling("copy")), ctx.index_config(), users.clone())?;

        let query = facility_graph.node("f12")?;
        for k in [1, 3] {
            let expected = oracle_bi(&facilities, &users, "f12", k);
            let by_vr = ids(vr::bi_rknn(&query, k, &facility_graph, &user_tree)?)?;
            let by_slice = ids(slice::bi_rknn(&query, k, facility_graph.tree(), &user_tree as &dyn SpatialIndex)?)?;
            assert_eq!(by_vr, expected, "vr k={}", k);
            assert_eq!(by_slice, expected, "slice k={}", k);
        }
        facility_graph.close()?;
        user_tree.close()
    });
}

#[test]
fn test_csd_walks_user_graph_with_tree_facilities() {
    run_test(|ctx| {
        let facilities = scattered(405, 25, "f");
        let users = scattered(406, 200, "u");
        let facility_tree =
            open_rtree_with(ctx.fjall_config(ctx.path()), ctx.index_config(), facilities.clone())?;
        let user_graph =
            open_vortree_with(ctx.fjall_config(&ctx.sibling("copy")), ctx.index_config(), users.clone())?;

        let query = facility_tree.node("f7")?;
        for k in [1, 2, 4] {
            let got = ids(csd::bi_rknn(&query, k, &facility_tree, &user_graph)?)?;
            assert_eq!(got, oracle_bi(&facilities, &users, "f7", k), "k={}", k);
        }
        facility_tree.close()?;
        user_graph.close()
    });
}

#[test]
fn test_more_neighbors_than_facilities() {
    run_test(|ctx| {
        let facilities = vec![
            ("left".to_string(), Geometry::point(0.0, 0.0)),
            ("right".to_string(), Geometry::point(10.0, 0.0)),
        ];
        let users = vec![
            ("u0".to_string(), Geometry::point(1.0, 1.0)),
            ("u1".to_string(), Geometry::point(9.0, -1.0)),
            ("u2".to_string(), Geometry::point(6.0, 5.0)),
        ];
        let facility_index = open_vortree_with(ctx.fjall_config(ctx.path()), ctx.index_config(), facilities)?;
        let user_index = open_vortree_with(ctx.fjall_config(&ctx.sibling("copy")), ctx.index_config(), users)?;
        let left = facility_index.node("left")?;

        for algorithm in Algorithm::ALL {
            let nearest_only = ids(algorithm.bi_rknn(&left, 1, &facility_index, &user_index)?)?;
            assert_eq!(nearest_only.into_iter().collect::<Vec<_>>(), vec!["u0".to_string()], "{}", algorithm);

            let everyone = ids(algorithm.bi_rknn(&left, 3, &facility_index, &user_index)?)?;
            assert_eq!(everyone.len(), 3, "{}", algorithm);
        }
        facility_index.close()?;
        user_index.close()
    });
}

#[test]
fn test_row_number_ids_in_both_roles() {
    run_test(|ctx| {
        let facilities = scattered(407, 40, "");
        let users = scattered(408, 40, "");
        let facility_index =
            open_vortree_with(ctx.fjall_config(ctx.path()), ctx.index_config(), facilities.clone())?;
        let user_index =
            open_vortree_with(ctx.fjall_config(&ctx.sibling("copy")), ctx.index_config(), users.clone())?;

        for q in ["10", "15", "27"] {
            let query = facility_index.node(q)?;
            for k in [5, 6, 8] {
                let expected = oracle_bi(&facilities, &users, q, k);
                for algorithm in Algorithm::ALL {
                    let got = ids(algorithm.bi_rknn(&query, k, &facility_index, &user_index)?)?;
                    assert_eq!(got, expected, "{} q={} k={}", algorithm, q, k);
                }
            }
        }
        facility_index.close()?;
        user_index.close()
    });
}
