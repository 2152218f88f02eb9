use lodestore::doc;
use lodestore::errors::ErrorKind;
use lodestore::filter::{all, and, field, not, or, where_fn};
use lodestore_int_test::test_util::{
    cleanup, create_test_context, insert_test_documents, parse_date, random_person, run_test,
    string_field,
};

#[test]
fn test_find_with_query_documents() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_test_documents(&db)?;

            assert_eq!(db.find(doc! {}).exec()?.len(), 3);
            assert_eq!(db.find(doc! { last_name: "ln2" }).exec()?.len(), 2);
            assert_eq!(db.count(doc! { first_name: "fn1", last_name: "ln1" })?, 1);
            assert_eq!(db.count(doc! { first_name: "fn1", last_name: "ln2" })?, 0);

            let after_2011 = doc! { birth_day: { "$gt": (parse_date("2011-01-01T00:00:00Z")) } };
            assert_eq!(db.count(after_2011)?, 2);

            assert_eq!(db.count(doc! { first_name: { "$in": ["fn1", "fn3", "fn9"] } })?, 2);
            assert_eq!(db.count(doc! { first_name: { "$nin": ["fn1", "fn3"] } })?, 1);
            assert_eq!(db.count(doc! { list: { "$exists": true } })?, 2);
            assert_eq!(db.count(doc! { list: { "$exists": false } })?, 1);
            assert_eq!(db.count(doc! { body: { "$regex": "^quick" } })?, 1);
            assert_eq!(db.count(doc! { first_name: { "$ne": "fn1" } })?, 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_find_with_logical_operators() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_test_documents(&db)?;

            let either = doc! { "$or": [{ first_name: "fn1" }, { first_name: "fn3" }] };
            assert_eq!(db.count(either)?, 2);

            let both = doc! { "$and": [{ last_name: "ln2" }, { first_name: "fn3" }] };
            assert_eq!(db.count(both)?, 1);

            let negated = doc! { "$not": { last_name: "ln2" } };
            let docs = db.find(negated).exec()?;
            assert_eq!(docs.len(), 1);
            assert_eq!(string_field(&docs[0], "first_name"), "fn1");

            let fluent = or(vec![
                field("first_name").eq("fn1"),
                and(vec![field("last_name").eq("ln2"), not(field("first_name").eq("fn2"))]),
            ]);
            assert_eq!(db.count(fluent)?, 2);

            let predicate = where_fn(|doc| string_field(doc, "body").len() > 40);
            assert_eq!(db.count(predicate)?, 1);
            assert_eq!(db.count(all())?, 3);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_find_in_arrays_and_sub_documents() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_test_documents(&db)?;
            db.insert(doc! {
                first_name: "fn4",
                planets: [
                    { name: "Earth", moons: 1 },
                    { name: "Mars", moons: 2 },
                ],
            })?;

            assert_eq!(db.count(doc! { arr: 4 })?, 2);
            assert_eq!(db.count(doc! { list: "three" })?, 2);
            assert_eq!(db.count(doc! { arr: { "$gt": 8 } })?, 1);
            assert_eq!(db.count(doc! { arr: { "$size": 3 } })?, 3);
            assert_eq!(db.count(doc! { "planets.name": "Mars" })?, 1);
            assert_eq!(db.count(doc! { "planets.moons": { "$gte": 2 } })?, 1);

            let elem = doc! { planets: { "$elemMatch": { name: "Earth", moons: 1 } } };
            assert_eq!(db.count(elem)?, 1);
            let no_elem = doc! { planets: { "$elemMatch": { name: "Earth", moons: 2 } } };
            assert_eq!(db.count(no_elem)?, 0);

            assert_eq!(db.count(field("arr").size(3))?, 3);
            assert_eq!(db.count(field("planets").elem_match(field("moons").gt(1)))?, 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_find_one() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            for age in [12, 25, 40] {
                db.insert(random_person(age))?;
            }

            let adult = db.find_one(field("age").gte(18))?.unwrap();
            assert!(adult.get("age").and_then(|a| a.as_i64()).unwrap() >= 18);
            assert!(db.find_one(doc! { age: 99 })?.is_none());

            let projected = db
                .find_one_projected(doc! { age: 12 }, doc! { age: 1, _id: 0 })?
                .unwrap();
            assert_eq!(projected, doc! { age: 12 });
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_invalid_queries() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_test_documents(&db)?;

            let err = db.find(doc! { first_name: { "$foo": 1 } }).exec().unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::BadQuery);

            let err = db.count(doc! { "$or": { first_name: "fn1" } }).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::BadQuery);

            let err = db.find_one(doc! { arr: { "$size": "three" } }).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::BadQuery);

            assert!(field("body").regex("(").is_err());
            Ok(())
        },
        cleanup,
    )
}
