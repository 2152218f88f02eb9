use lodestore::common::serialization_hook;
use lodestore::datastore_builder::DatastoreBuilder;
use lodestore::doc;
use lodestore::errors::ErrorKind;
use lodestore::index::unique_index;
use lodestore_int_test::test_util::{random_path, read_lines};
use std::fs;

fn rot13(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'a'..='z' => (((c as u8 - b'a') + 13) % 26 + b'a') as char,
            'A'..='Z' => (((c as u8 - b'A') + 13) % 26 + b'A') as char,
            _ => c,
        })
        .collect()
}

#[test]
fn test_hooks_transform_every_line() {
    let path = random_path();
    let open = || {
        DatastoreBuilder::default()
            .filename(&path)
            .autoload(true)
            .serialization_hooks(
                serialization_hook(|s: &str| format!("before_{}_after", rot13(s))),
                serialization_hook(|s: &str| {
                    let inner = s
                        .strip_prefix("before_")
                        .and_then(|s| s.strip_suffix("_after"))
                        .unwrap_or(s);
                    rot13(inner)
                }),
            )
            .open()
            .unwrap()
    };

    let db = open();
    db.ensure_index(unique_index("planet")).unwrap();
    db.insert(doc! { planet: "Earth", moons: 1 }).unwrap();
    db.close().unwrap();

    let lines = read_lines(&path);
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|l| l.starts_with("before_") && l.ends_with("_after")));
    assert!(lines.iter().all(|l| !l.contains("Earth")));

    let db = open();
    let earth = db.find_one(doc! { planet: "Earth" }).unwrap().unwrap();
    assert_eq!(earth.get("moons").and_then(|m| m.as_i64()), Some(1));
    assert_eq!(db.list_indexes().unwrap().len(), 2);
    db.close().unwrap();

    let lines = read_lines(&path);
    assert!(lines.iter().all(|l| l.starts_with("before_")));
    let _ = fs::remove_file(&path);
}

#[test]
fn test_hooks_must_be_inverse() {
    let result = DatastoreBuilder::default()
        .filename(random_path())
        .serialization_hooks(
            serialization_hook(|s: &str| format!("{}x", s)),
            serialization_hook(|s: &str| s.to_string()),
        )
        .open();
    assert_eq!(
        result.err().map(|e| e.kind().clone()),
        Some(ErrorKind::InvalidConfiguration)
    );
}
