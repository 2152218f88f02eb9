use lodestore::datastore_builder::DatastoreBuilder;
use lodestore::doc;
use lodestore::errors::{ErrorKind, LodeError};
use lodestore_int_test::test_util::{
    cleanup, create_test_context, insert_test_documents, random_path, read_lines, run_test,
    string_field,
};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn remove_datafile(path: &PathBuf) {
    let _ = fs::remove_file(path);
}

#[test]
fn test_ids_are_stable_across_reloads() {
    run_test(
        create_test_context,
        |ctx| {
            let inserted = insert_test_documents(&ctx.db())?;
            let mut ids: Vec<String> = inserted.iter().map(|d| string_field(d, "_id")).collect();
            ids.sort();

            let ctx = ctx.reopen()?;
            let ctx = ctx.reopen()?;
            let mut reloaded: Vec<String> = ctx
                .db()
                .all_documents()?
                .iter()
                .map(|d| string_field(d, "_id"))
                .collect();
            reloaded.sort();
            assert_eq!(ids, reloaded);
            cleanup(ctx)
        },
        cleanup,
    )
}

#[test]
fn test_manual_load() {
    let path = random_path();
    fs::write(
        &path,
        "{\"_id\":\"1\",\"planet\":\"Earth\"}\n{\"_id\":\"2\",\"planet\":\"Mars\"}\n{\"$$deleted\":true,\"_id\":\"1\"}\n",
    )
    .unwrap();

    let db = DatastoreBuilder::default().filename(&path).open().unwrap();
    db.load().unwrap();
    let docs = db.all_documents().unwrap();
    assert_eq!(docs, vec![doc! { _id: "2", planet: "Mars" }]);

    db.insert(doc! { _id: "3", planet: "Venus" }).unwrap();
    db.load().unwrap();
    assert_eq!(db.count(doc! {}).unwrap(), 2);
    assert_eq!(read_lines(&path).len(), 2);

    db.close().unwrap();
    remove_datafile(&path);
}

#[test]
fn test_later_lines_win() {
    let path = random_path();
    fs::write(
        &path,
        concat!(
            "{\"_id\":\"1\",\"planet\":\"Earth\",\"moons\":0}\n",
            "{\"_id\":\"1\",\"planet\":\"Earth\",\"moons\":1}\n",
            "{\"$$indexCreated\":{\"fieldName\":\"planet\",\"unique\":true,\"sparse\":false}}\n",
            "{\"$$indexCreated\":{\"fieldName\":\"moons\",\"unique\":false,\"sparse\":false}}\n",
            "{\"$$indexRemoved\":\"moons\"}\n",
            "{\"_id\":\"2\",\"planet\":\"Ma"
        ),
    )
    .unwrap();

    let db = DatastoreBuilder::default()
        .filename(&path)
        .autoload(true)
        .open()
        .unwrap();
    let earth = db.find_one(doc! { _id: "1" }).unwrap().unwrap();
    assert_eq!(earth.get("moons").and_then(|m| m.as_i64()), Some(1));
    assert_eq!(db.count(doc! {}).unwrap(), 1);

    let names: Vec<String> = db.list_indexes().unwrap().iter().map(|i| i.name()).collect();
    assert_eq!(names, vec!["_id", "planet"]);
    assert!(db.insert(doc! { planet: "Earth" }).unwrap_err().is_unique_violation());

    db.close().unwrap();
    remove_datafile(&path);
}

#[test]
fn test_autoload_reports_to_on_load() {
    let path = random_path();
    fs::write(&path, "{\"_id\":\"1\",\"planet\":\"Earth\"}\n").unwrap();

    let outcome: Arc<Mutex<Option<Option<ErrorKind>>>> = Arc::new(Mutex::new(None));
    let outcome_clone = outcome.clone();
    let db = DatastoreBuilder::default()
        .filename(&path)
        .autoload(true)
        .on_load(move |error: Option<&LodeError>| {
            *outcome_clone.lock().unwrap() = Some(error.map(|e| e.kind().clone()));
        })
        .open()
        .unwrap();

    awaitility::at_most(Duration::from_secs(2)).until(|| outcome.lock().unwrap().is_some());
    assert_eq!(*outcome.lock().unwrap(), Some(None));
    assert_eq!(db.count(doc! {}).unwrap(), 1);

    db.close().unwrap();
    remove_datafile(&path);
}

#[test]
fn test_failed_autoload_rejects_every_operation() {
    let path = random_path();
    fs::write(
        &path,
        concat!(
            "{\"_id\":\"1\",\"a\":5}\n",
            "{\"_id\":\"2\",\"a\":5}\n",
            "{\"$$indexCreated\":{\"fieldName\":\"a\",\"unique\":true,\"sparse\":false}}\n"
        ),
    )
    .unwrap();

    let outcome: Arc<Mutex<Option<Option<ErrorKind>>>> = Arc::new(Mutex::new(None));
    let outcome_clone = outcome.clone();
    let db = DatastoreBuilder::default()
        .filename(&path)
        .autoload(true)
        .on_load(move |error: Option<&LodeError>| {
            *outcome_clone.lock().unwrap() = Some(error.map(|e| e.kind().clone()));
        })
        .open()
        .unwrap();

    awaitility::at_most(Duration::from_secs(2)).until(|| outcome.lock().unwrap().is_some());
    assert_eq!(*outcome.lock().unwrap(), Some(Some(ErrorKind::LoadFailure)));

    let err = db.insert(doc! { a: 6 }).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::LoadFailure);
    assert!(err.cause().is_some());
    assert_eq!(db.find(doc! {}).exec().unwrap_err().kind(), &ErrorKind::LoadFailure);
    assert_eq!(read_lines(&path).len(), 3);

    db.close().unwrap();
    remove_datafile(&path);
}

#[test]
fn test_corrupted_middle_line_fails_the_load() {
    let path = random_path();
    fs::write(
        &path,
        "{\"_id\":\"1\",\"a\":1}\nnot json at all\n{\"_id\":\"2\",\"a\":2}\n",
    )
    .unwrap();

    let db = DatastoreBuilder::default().filename(&path).open().unwrap();
    let err = db.load().unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::LoadFailure);
    assert_eq!(db.count(doc! {}).unwrap(), 0);

    db.close().unwrap();
    remove_datafile(&path);
}

#[test]
fn test_in_memory_datastore_leaves_no_file() {
    let path = random_path();
    let db = DatastoreBuilder::default()
        .filename(&path)
        .in_memory()
        .autoload(true)
        .open()
        .unwrap();
    db.insert(doc! { planet: "Earth" }).unwrap();
    db.compact_datafile().unwrap();
    assert_eq!(db.count(doc! {}).unwrap(), 1);
    assert!(!path.exists());

    db.load().unwrap();
    assert_eq!(db.count(doc! {}).unwrap(), 0);
    db.close().unwrap();
}
