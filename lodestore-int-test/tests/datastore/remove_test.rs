use lodestore::datastore::{remove_all, RemoveOptions};
use lodestore::doc;
use lodestore::filter::field;
use lodestore_int_test::test_util::{
    cleanup, create_test_context, insert_test_documents, run_test,
};
use rand::seq::SliceRandom;
use std::thread;

#[test]
fn test_remove_first_or_all() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_test_documents(&db)?;

            assert_eq!(db.remove(doc! { last_name: "ln2" }, RemoveOptions::default())?, 1);
            assert_eq!(db.count(doc! { last_name: "ln2" })?, 1);
            assert_eq!(db.remove(doc! { last_name: "ln9" }, remove_all())?, 0);
            assert_eq!(db.remove(doc! {}, remove_all())?, 2);
            assert_eq!(db.count(doc! {})?, 0);

            let ctx = ctx.reopen()?;
            assert_eq!(ctx.db().count(doc! {})?, 0);
            assert!(!ctx.datafile_lines().iter().any(|l| l.contains("first_name")));
            cleanup(ctx)
        },
        cleanup,
    )
}

#[test]
fn test_concurrent_disjoint_removes() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let mut docs: Vec<_> = (0..100).map(|i| doc! { n: i }).collect();
            docs.shuffle(&mut rand::rng());
            db.insert_many(docs)?;

            let handles: Vec<_> = (0..4)
                .map(|worker| {
                    let db = db.clone();
                    thread::spawn(move || {
                        let lower = worker * 20;
                        let query = field("n").gte(lower).and(field("n").lt(lower + 20));
                        db.remove(query, remove_all())
                    })
                })
                .collect();

            for handle in handles {
                assert_eq!(handle.join().unwrap()?, 20);
            }

            let remaining = db.find(doc! {}).exec()?;
            assert_eq!(remaining.len(), 20);
            assert!(remaining
                .iter()
                .all(|d| d.get("n").and_then(|n| n.as_i64()).unwrap() >= 80));

            let ctx = ctx.reopen()?;
            assert_eq!(ctx.db().count(field("n").lt(80))?, 0);
            assert_eq!(ctx.db().count(doc! {})?, 20);
            cleanup(ctx)
        },
        cleanup,
    )
}

#[test]
fn test_async_removes_run_in_order() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.insert_many((0..10).map(|i| doc! { n: i, even: (i % 2 == 0) }).collect())?;

            let evens = db.remove_async(doc! { even: true }, remove_all());
            let odds = db.remove_async(doc! { even: false }, remove_all());
            let count = db.count_async(doc! {});

            assert_eq!(evens.wait()?, 5);
            assert_eq!(odds.wait()?, 5);
            assert_eq!(count.wait()?, 0);
            Ok(())
        },
        cleanup,
    )
}
