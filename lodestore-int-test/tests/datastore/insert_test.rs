use chrono::Utc;
use lodestore::common::Value;
use lodestore::datastore_builder::DatastoreBuilder;
use lodestore::doc;
use lodestore::errors::ErrorKind;
use lodestore::index::unique_index;
use lodestore_int_test::test_util::{
    cleanup, create_memory_test_context, create_test_context, insert_test_documents, run_test,
    string_field,
};

#[test]
fn test_insert_assigns_ids() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let inserted = insert_test_documents(&db)?;
            assert_eq!(inserted.len(), 3);
            for doc in inserted.iter() {
                let id = doc.id().unwrap();
                assert_eq!(id.as_str().map(str::len), Some(16));
            }

            let explicit = db.insert(doc! { _id: 42, name: "answer" })?;
            assert_eq!(explicit.id(), Some(&Value::from(42)));
            assert_eq!(db.count(doc! {})?, 4);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_round_trip_through_the_datafile() {
    run_test(
        create_test_context,
        |ctx| {
            let original = doc! {
                a: ["ee", "ff", 42],
                date: (Utc::now()),
                subobj: { a: "b", b: "c" },
            };
            let inserted = ctx.db().insert(original)?;
            let id = inserted.id().cloned().unwrap();

            let ctx = ctx.reopen()?;
            let mut query = lodestore::document::Document::new();
            query.put("_id", id);
            let loaded = ctx.db().find_one(query)?.unwrap();
            assert_eq!(loaded, inserted);
            assert!(loaded.get("date").unwrap().is_date());
            cleanup(ctx)
        },
        cleanup,
    )
}

#[test]
fn test_returned_documents_are_copies() {
    run_test(
        create_memory_test_context,
        |ctx| {
            let db = ctx.db();
            let mut input = doc! { name: "Mars", moons: ["Phobos", "Deimos"] };
            let mut returned = db.insert(input.clone())?;
            input.put("name", "Changed");
            returned.put("name", "Changed too");

            let mut found = db.find_one(doc! { name: "Mars" })?.unwrap();
            assert_eq!(string_field(&found, "name"), "Mars");
            found.put("moons", Value::Null);

            let again = db.find_one(doc! { name: "Mars" })?.unwrap();
            assert_eq!(again.get("moons").and_then(|m| m.as_array()).map(Vec::len), Some(2));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_invalid_documents_are_rejected() {
    run_test(
        create_memory_test_context,
        |ctx| {
            let db = ctx.db();
            let err = db.insert(doc! { "$name": "Mars" }).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::DocumentValidation);

            let err = db.insert(doc! { planet: { "a.b": 1 } }).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::DocumentValidation);

            let err = db.insert(doc! { _id: true }).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::DocumentValidation);

            assert_eq!(db.count(doc! {})?, 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_failed_batch_leaves_no_trace() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.ensure_index(unique_index("a"))?;
            db.insert(doc! { a: 5, planet: "Earth" })?;

            let err = db
                .insert_many(vec![
                    doc! { a: 1, planet: "Mars" },
                    doc! { a: 2, planet: "Venus" },
                    doc! { a: 5, planet: "Jupiter" },
                ])
                .unwrap_err();
            assert!(err.is_unique_violation());
            assert_eq!(db.count(doc! {})?, 1);
            assert!(db.find_one(doc! { a: 1 })?.is_none());

            for line in ctx.datafile_lines() {
                assert!(!line.contains("Mars"));
                assert!(!line.contains("Venus"));
                assert!(!line.contains("Jupiter"));
            }

            let ctx = ctx.reopen()?;
            assert_eq!(ctx.db().count(doc! {})?, 1);
            let db = ctx.db();
            db.insert(doc! { a: 1, planet: "Mars" })?;
            assert_eq!(db.count(doc! {})?, 2);
            cleanup(ctx)
        },
        cleanup,
    )
}

#[test]
fn test_duplicates_within_a_batch() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.ensure_index(unique_index("a"))?;
            let err = db
                .insert_many(vec![
                    doc! { a: 5, b: "hello" },
                    doc! { a: 42, b: "world" },
                    doc! { a: 5, b: "bloup" },
                    doc! { a: 7 },
                ])
                .unwrap_err();
            assert!(err.is_unique_violation());
            assert_eq!(db.count(doc! {})?, 0);

            let lines = ctx.datafile_lines();
            assert_eq!(lines.len(), 1);
            assert!(lines[0].contains("$$indexCreated"));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_duplicate_id_is_a_unique_violation() {
    run_test(
        create_memory_test_context,
        |ctx| {
            let db = ctx.db();
            db.insert(doc! { _id: "earth" })?;
            let err = db.insert(doc! { _id: "earth", name: "again" }).unwrap_err();
            assert!(err.is_unique_violation());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_timestamps() {
    let db = DatastoreBuilder::default()
        .in_memory()
        .timestamp_data(true)
        .open()
        .unwrap();

    let inserted = db.insert(doc! { planet: "Earth" }).unwrap();
    let created = inserted.get("createdAt").cloned().unwrap();
    assert!(created.is_date());
    assert_eq!(inserted.get("updatedAt"), Some(&created));

    std::thread::sleep(std::time::Duration::from_millis(5));
    db.update(
        doc! { planet: "Earth" },
        doc! { "$set": { moons: 1 } },
        Default::default(),
    )
    .unwrap();

    let updated = db.find_one(doc! { planet: "Earth" }).unwrap().unwrap();
    assert_eq!(updated.get("createdAt"), Some(&created));
    let updated_at = updated.get("updatedAt").and_then(|v| v.as_date().cloned()).unwrap();
    assert!(updated_at > *created.as_date().unwrap());
    db.close().unwrap();
}
