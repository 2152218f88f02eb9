use lodestore::datastore::{multi, remove_all, RemoveOptions};
use lodestore::doc;
use lodestore::index::non_unique_index;
use lodestore_int_test::test_util::{cleanup, create_test_context, run_test};
use std::time::Duration;

#[test]
fn test_compaction_keeps_one_line_per_document() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.ensure_index(non_unique_index("planet"))?;
            db.insert_many(vec![
                doc! { _id: "b", planet: "Mars" },
                doc! { _id: "a", planet: "Earth" },
                doc! { _id: "c", planet: "Venus" },
            ])?;
            db.update(doc! {}, doc! { "$set": { visited: true } }, multi())?;
            db.remove(doc! { _id: "c" }, RemoveOptions::default())?;
            assert_eq!(ctx.datafile_lines().len(), 8);

            db.compact_datafile()?;
            let lines = ctx.datafile_lines();
            assert_eq!(lines.len(), 3);
            assert!(lines[0].contains("\"_id\":\"a\""));
            assert!(lines[1].contains("\"_id\":\"b\""));
            assert!(lines[2].contains("$$indexCreated"));
            assert!(lines.iter().all(|l| !l.contains("Venus")));

            let mut temp = ctx.path().as_os_str().to_owned();
            temp.push("~");
            assert!(!std::path::PathBuf::from(temp).exists());

            let ctx = ctx.reopen()?;
            assert_eq!(ctx.db().count(doc! { visited: true })?, 2);
            cleanup(ctx)
        },
        cleanup,
    )
}

#[test]
fn test_autocompaction() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            for n in 0..10 {
                db.insert(doc! { n: n })?;
            }
            db.remove(doc! { n: { "$lt": 8 } }, remove_all())?;
            assert_eq!(ctx.datafile_lines().len(), 18);

            db.set_autocompaction_interval(Duration::from_millis(10))?;
            awaitility::at_most(Duration::from_secs(15))
                .until(|| ctx.datafile_lines().len() == 2);

            db.stop_autocompaction();
            db.insert(doc! { n: 42 })?;
            assert_eq!(ctx.datafile_lines().len(), 3);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_drop_database() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.ensure_index(non_unique_index("planet"))?;
            db.insert(doc! { planet: "Earth" })?;
            assert!(ctx.path().exists());

            db.drop_database()?;
            assert!(!ctx.path().exists());
            assert_eq!(db.count(doc! {})?, 0);
            assert_eq!(db.list_indexes()?.len(), 1);

            db.insert(doc! { planet: "Mars" })?;
            let ctx = ctx.reopen()?;
            assert_eq!(ctx.db().count(doc! {})?, 1);
            cleanup(ctx)
        },
        cleanup,
    )
}
