use rknn::{Algorithm, Geometry, RknnError};
use rknn_fjall_adapter::{open_vortree_with, FjallStore};
use rknn_int_test::test_util::{ids, oracle_mono, run_test, scattered, Entries};

#[test]
fn test_working_copy_leaves_base_untouched() {
    run_test(|ctx| {
        let entries = scattered(601, 120, "p");
        open_vortree_with(ctx.fjall_config(ctx.path()), ctx.index_config(), entries.clone())?.close()?;

        let copy = ctx.sibling("copy");
        FjallStore::copy_dir(ctx.path(), &copy)?;

        let working = open_vortree_with(ctx.fjall_config(&copy), ctx.index_config(), Entries::new())?;
        assert_eq!(working.size(), 120);
        let victim = working.node("p5")?;
        working.delete(&victim)?;
        working.insert("late", Geometry::point(50.0, 50.0))?;
        assert_eq!(working.size(), 120);
        assert!(matches!(working.node("p5"), Err(RknnError::NotFound(_))));
        working.close()?;
        drop(working);

        let base = open_vortree_with(ctx.fjall_config(ctx.path()), ctx.index_config(), Entries::new())?;
        assert_eq!(base.size(), 120);
        assert!(base.node("p5").is_ok());
        assert!(matches!(base.node("late"), Err(RknnError::NotFound(_))));

        let query = base.node("p60")?;
        let expected = oracle_mono(&entries, "p60", 2);
        for algorithm in Algorithm::ALL {
            assert_eq!(ids(algorithm.mono_rknn(&query, 2, &base)?)?, expected, "{}", algorithm);
        }
        base.close()
    });
}

#[test]
fn test_copy_refuses_existing_target() {
    run_test(|ctx| {
        open_vortree_with(ctx.fjall_config(ctx.path()), ctx.index_config(), scattered(602, 10, "p"))?.close()?;
        let copy = ctx.sibling("copy");
        FjallStore::copy_dir(ctx.path(), &copy)?;
        assert!(matches!(
            FjallStore::copy_dir(ctx.path(), &copy),
            Err(RknnError::InvalidConfig(_))
        ));
        Ok(())
    });
}
