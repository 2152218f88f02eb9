use icu::locale::locale;
use icu_collator::options::CollatorOptions;
use lodestore::common::{string_comparator, SortOrder};
use lodestore::datastore_builder::DatastoreBuilder;
use lodestore::doc;
use lodestore::errors::ErrorKind;
use lodestore::filter::field;
use lodestore_int_test::test_util::{
    cleanup, create_test_context, insert_test_documents, int_field, is_sorted, random_person,
    run_test, string_field,
};
use std::sync::mpsc;
use std::time::Duration;

#[test]
fn test_sort_skip_limit() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            for age in [33, 12, 57, 12, 41, 28, 57] {
                db.insert(random_person(age))?;
            }

            let docs = db.find(doc! {}).sort(doc! { age: 1 }).exec()?;
            assert!(is_sorted(docs.iter().map(|d| int_field(d, "age")), true));

            let docs = db
                .find(field("age").gt(20))
                .sort(doc! { age: (-1), last_name: 1 })
                .exec()?;
            let ages: Vec<i64> = docs.iter().map(|d| int_field(d, "age")).collect();
            assert_eq!(ages, vec![57, 57, 41, 33, 28]);
            assert!(string_field(&docs[0], "last_name") <= string_field(&docs[1], "last_name"));

            let page = db
                .find(doc! {})
                .sort_by("age", SortOrder::Ascending)
                .skip(2)
                .limit(3)
                .exec()?;
            let ages: Vec<i64> = page.iter().map(|d| int_field(d, "age")).collect();
            assert_eq!(ages, vec![28, 33, 41]);

            assert!(db.find(doc! {}).skip(10).exec()?.is_empty());
            assert_eq!(db.find(doc! {}).limit(0).exec()?.len(), 7);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_projections() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_test_documents(&db)?;

            let docs = db
                .find(doc! { first_name: "fn1" })
                .projection(doc! { first_name: 1, last_name: 1 })
                .exec()?;
            let keys: Vec<&String> = docs[0].keys().collect();
            assert_eq!(keys, vec!["_id", "first_name", "last_name"]);

            let docs = db
                .find(doc! { first_name: "fn1" })
                .projection(doc! { first_name: 1, _id: 0 })
                .exec()?;
            assert_eq!(docs[0], doc! { first_name: "fn1" });

            let docs = db
                .find(doc! { first_name: "fn2" })
                .projection(doc! { body: 0, arr: 0, list: 0, birth_day: 0, _id: 0 })
                .exec()?;
            assert_eq!(docs[0], doc! { first_name: "fn2", last_name: "ln2" });

            let err = db
                .find(doc! {})
                .projection(doc! { first_name: 1, last_name: 0 })
                .exec()
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::BadQuery);

            db.insert(doc! { planet: { name: "Mars", moons: 2, rings: false } })?;
            let mars = db
                .find(doc! { "planet.name": "Mars" })
                .projection(doc! { "planet.moons": 1, _id: 0 })
                .exec()?;
            assert_eq!(mars[0], doc! { planet: { moons: 2 } });
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_invalid_sort() {
    run_test(
        create_test_context,
        |ctx| {
            let err = ctx
                .db()
                .find(doc! {})
                .sort(doc! { age: "up" })
                .limit(1)
                .exec()
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::BadQuery);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_sort_with_collation() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.insert_many(vec![
                doc! { fruit: "Pineapple" },
                doc! { fruit: "Ôrange" },
                doc! { fruit: "Apple" },
            ])?;

            let plain = db.find(doc! {}).sort(doc! { fruit: 1 }).exec()?;
            assert_eq!(string_field(&plain[2], "fruit"), "Ôrange");

            let collated = db
                .find(doc! {})
                .sort(doc! { fruit: 1 })
                .collation(locale!("fr").into(), CollatorOptions::default())
                .exec()?;
            let fruits: Vec<String> = collated.iter().map(|d| string_field(d, "fruit")).collect();
            assert_eq!(fruits, vec!["Apple", "Ôrange", "Pineapple"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_custom_string_comparison() {
    let db = DatastoreBuilder::default()
        .in_memory()
        .compare_strings(string_comparator(|a: &str, b: &str| {
            a.to_lowercase().cmp(&b.to_lowercase())
        }))
        .open()
        .unwrap();
    db.insert_many(vec![doc! { name: "beta" }, doc! { name: "Alpha" }, doc! { name: "gamma" }])
        .unwrap();

    let docs = db.find(doc! {}).sort(doc! { name: 1 }).exec().unwrap();
    let names: Vec<String> = docs.iter().map(|d| string_field(d, "name")).collect();
    assert_eq!(names, vec!["Alpha", "beta", "gamma"]);
    db.close().unwrap();
}

#[test]
fn test_async_cursor() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let pending = db.insert_many_async((0..5).map(|n| doc! { n: n }).collect());
            let cursor = db.find(field("n").gte(3)).sort(doc! { n: 1 });

            let (sender, receiver) = mpsc::channel();
            cursor.exec_async().then(move |result| {
                let _ = sender.send(result.map(|docs| docs.len()));
            });

            assert_eq!(pending.wait()?.len(), 5);
            let found = receiver.recv_timeout(Duration::from_secs(5)).unwrap()?;
            assert_eq!(found, 2);
            Ok(())
        },
        cleanup,
    )
}
