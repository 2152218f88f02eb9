use lodestore::common::Value;
use lodestore::datastore::{multi, upsert, UpdateOptions};
use lodestore::doc;
use lodestore::errors::ErrorKind;
use lodestore::filter::field;
use lodestore::index::unique_index;
use lodestore_int_test::test_util::{
    cleanup, create_test_context, insert_test_documents, int_field, run_test, string_field,
};

#[test]
fn test_update_with_modifiers() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.insert(doc! {
                _id: "earth",
                name: "Earth",
                moons: 1,
                tags: ["blue", "wet"],
                scores: [1, 2, 3, 4, 5],
                stats: { mass: 5, radius: 6371 },
            })?;

            let result = db.update(
                doc! { _id: "earth" },
                doc! {
                    "$set": { "stats.mass": 6, inhabited: true },
                    "$inc": { moons: 2 },
                    "$unset": { "stats.radius": true },
                    "$addToSet": { tags: { "$each": ["blue", "rocky"] } },
                    "$pull": { scores: { "$gte": 4 } },
                },
                UpdateOptions::default(),
            )?;
            assert_eq!(result.num_affected(), 1);
            assert!(!result.is_upsert());

            let earth = db.find_one(doc! { _id: "earth" })?.unwrap();
            assert_eq!(int_field(&earth, "stats.mass"), 6);
            assert_eq!(int_field(&earth, "moons"), 3);
            assert!(earth.get_path("stats.radius").is_none());
            assert_eq!(earth.get("inhabited"), Some(&Value::from(true)));
            assert_eq!(
                earth.get("tags"),
                Some(&Value::from_vec(vec!["blue", "wet", "rocky"]))
            );
            assert_eq!(earth.get("scores"), Some(&Value::from_vec(vec![1, 2, 3])));

            db.update(
                doc! { _id: "earth" },
                doc! {
                    "$push": { scores: { "$each": [7, 8, 9], "$slice": (-4) } },
                    "$min": { moons: 1 },
                    "$max": { "stats.mass": 4 },
                },
                UpdateOptions::default(),
            )?;
            let earth = db.find_one(doc! { _id: "earth" })?.unwrap();
            assert_eq!(earth.get("scores"), Some(&Value::from_vec(vec![3, 7, 8, 9])));
            assert_eq!(int_field(&earth, "moons"), 1);
            assert_eq!(int_field(&earth, "stats.mass"), 6);

            db.update(
                doc! { _id: "earth" },
                doc! { "$pop": { scores: 1 }, "$push": { visited: "Apollo" } },
                UpdateOptions::default(),
            )?;
            let earth = db.find_one(doc! { _id: "earth" })?.unwrap();
            assert_eq!(earth.get("scores"), Some(&Value::from_vec(vec![3, 7, 8])));
            assert_eq!(earth.get("visited"), Some(&Value::from_vec(vec!["Apollo"])));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_replacement_keeps_id() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let inserted = db.insert(doc! { name: "Pluto", planet: true })?;
            let id = inserted.id().cloned().unwrap();

            db.update(doc! { name: "Pluto" }, doc! { name: "Pluto", dwarf: true }, UpdateOptions::default())?;
            let pluto = db.find_one(doc! { name: "Pluto" })?.unwrap();
            assert_eq!(pluto.id(), Some(&id));
            assert!(!pluto.contains_key("planet"));
            assert_eq!(pluto.get("dwarf"), Some(&Value::from(true)));

            let err = db
                .update(doc! { name: "Pluto" }, doc! { "$set": { _id: "other" } }, UpdateOptions::default())
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::DocumentValidation);

            let err = db
                .update(doc! { name: "Pluto" }, doc! { "$set": { a: 1 }, b: 2 }, UpdateOptions::default())
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::BadUpdate);

            let err = db
                .update(doc! { name: "Pluto" }, doc! { "$inc": { name: 1 } }, UpdateOptions::default())
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::BadUpdate);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_single_and_multi_update() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_test_documents(&db)?;

            let result = db.update(
                doc! { last_name: "ln2" },
                doc! { "$set": { reviewed: true } },
                UpdateOptions::default(),
            )?;
            assert_eq!(result.num_affected(), 1);
            assert_eq!(db.count(doc! { reviewed: true })?, 1);

            let result = db.update(
                doc! { last_name: "ln2" },
                doc! { "$set": { reviewed: true } },
                multi().return_updated_docs(true),
            )?;
            assert_eq!(result.num_affected(), 2);
            let affected = result.affected_documents().unwrap();
            assert_eq!(affected.len(), 2);
            assert!(affected.iter().all(|d| d.get("reviewed") == Some(&Value::from(true))));
            assert_eq!(db.count(doc! { reviewed: true })?, 2);

            let result = db.update(doc! { last_name: "ln9" }, doc! { "$set": { x: 1 } }, multi())?;
            assert_eq!(result.num_affected(), 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_upsert() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();

            let result = db.update(
                doc! { planet: "Neptune", "moons.count": 14 },
                doc! { "$set": { color: "blue" } },
                upsert().return_updated_docs(true),
            )?;
            assert!(result.is_upsert());
            assert_eq!(result.num_affected(), 1);
            let inserted = &result.affected_documents().unwrap()[0];
            assert_eq!(string_field(inserted, "planet"), "Neptune");
            assert_eq!(string_field(inserted, "color"), "blue");
            assert!(!inserted.contains_key("moons"));
            assert!(inserted.id().is_some());

            let result = db.update(
                field("planet").eq("Uranus"),
                doc! { planet: "Uranus", tilt: 98 },
                upsert(),
            )?;
            assert!(result.is_upsert());
            assert_eq!(db.count(doc! {})?, 2);

            let result = db.update(
                doc! { planet: "Uranus" },
                doc! { "$inc": { tilt: 1 } },
                upsert(),
            )?;
            assert!(!result.is_upsert());
            assert_eq!(int_field(&db.find_one(doc! { planet: "Uranus" })?.unwrap(), "tilt"), 99);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_multi_update_is_atomic() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.ensure_index(unique_index("a"))?;
            db.insert_many(vec![doc! { a: 4 }, doc! { a: 5 }, doc! { a: "abc" }])?;
            let lines_before = ctx.datafile_lines();

            let err = db
                .update(doc! { a: { "$in": [4, "abc"] } }, doc! { "$set": { a: 5 } }, multi())
                .unwrap_err();
            assert!(err.is_unique_violation());
            assert_eq!(ctx.datafile_lines(), lines_before);
            assert_eq!(db.count(doc! { a: 4 })?, 1);
            assert_eq!(db.count(doc! { a: "abc" })?, 1);
            assert_eq!(db.count(doc! { a: 5 })?, 1);

            let ctx = ctx.reopen()?;
            let db = ctx.db();
            assert_eq!(db.count(doc! {})?, 3);
            assert_eq!(db.count(doc! { a: 5 })?, 1);

            db.update(doc! { a: 4 }, doc! { "$set": { a: 6 } }, multi())?;
            assert_eq!(db.count(doc! { a: 6 })?, 1);
            assert_eq!(db.count(doc! { a: 4 })?, 0);
            cleanup(ctx)
        },
        cleanup,
    )
}

#[test]
fn test_out_of_range_array_position_is_rejected() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.insert(doc! { _id: "1", arr: [1] })?;

            for update in [
                doc! { "$set": { "arr.18446744073709551615": 1 } },
                doc! { "$inc": { "arr.4000000000": 1 } },
            ] {
                let result = db.update(doc! { _id: "1" }, update, UpdateOptions::default());
                assert_eq!(
                    result.err().map(|e| e.kind().clone()),
                    Some(ErrorKind::BadUpdate)
                );
            }

            assert!(!db.is_closed());
            assert_eq!(db.count(doc! {})?, 1);
            db.update(
                doc! { _id: "1" },
                doc! { "$push": { arr: 2 } },
                UpdateOptions::default(),
            )?;
            let doc = db.find_one(doc! { _id: "1" })?.unwrap();
            assert_eq!(
                doc.get("arr"),
                Some(&Value::from_vec(vec![Value::I64(1), Value::I64(2)]))
            );
            Ok(())
        },
        cleanup,
    )
}
