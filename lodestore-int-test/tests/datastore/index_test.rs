use lodestore::datastore::{multi, UpdateOptions};
use lodestore::doc;
use lodestore::errors::ErrorKind;
use lodestore::filter::field;
use lodestore::index::{non_unique_index, unique_index, IndexOptions};
use lodestore_int_test::test_util::{
    cleanup, create_test_context, insert_test_documents, random_person, run_test,
};
use std::time::Duration;

#[test]
fn test_ensure_index_is_idempotent() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.ensure_index(IndexOptions::compound(&["planet", "system"]).unique(true))?;
            db.ensure_index(IndexOptions::compound(&["system", "planet"]))?;
            db.ensure_index(non_unique_index("moons"))?;
            db.ensure_index(non_unique_index("moons"))?;

            let names: Vec<String> = db.list_indexes()?.iter().map(IndexOptions::name).collect();
            assert_eq!(names, vec!["_id", "planet,system", "moons"]);
            let compound = &db.list_indexes()?[1];
            assert!(compound.is_unique());
            assert!(compound.is_compound());

            let markers = ctx
                .datafile_lines()
                .iter()
                .filter(|l| l.contains("$$indexCreated"))
                .count();
            assert_eq!(markers, 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_indexes_survive_a_reload() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.ensure_index(unique_index("email").sparse(true))?;
            db.ensure_index(IndexOptions::new("seen").expire_after(Duration::from_secs(3600)))?;
            db.ensure_index(non_unique_index("age"))?;
            db.remove_index("age")?;
            db.insert(doc! { email: "a@b.c" })?;

            let ctx = ctx.reopen()?;
            let db = ctx.db();
            let indexes = db.list_indexes()?;
            assert_eq!(indexes.len(), 3);
            assert!(indexes[1].is_unique() && indexes[1].is_sparse());
            assert_eq!(indexes[2].ttl(), Some(Duration::from_secs(3600)));

            let err = db.insert(doc! { email: "a@b.c" }).unwrap_err();
            assert!(err.is_unique_violation());
            db.insert(doc! { name: "no email" })?;
            db.insert(doc! { name: "still no email" })?;
            assert_eq!(db.count(doc! {})?, 3);
            cleanup(ctx)
        },
        cleanup,
    )
}

#[test]
fn test_unique_index_on_existing_duplicates() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            insert_test_documents(&db)?;

            let err = db.ensure_index(unique_index("last_name")).unwrap_err();
            assert!(err.is_unique_violation());
            assert_eq!(db.list_indexes()?.len(), 1);
            assert!(!ctx.datafile_lines().iter().any(|l| l.contains("$$indexCreated")));

            db.ensure_index(unique_index("first_name"))?;
            let err = db
                .update(doc! { first_name: "fn1" }, doc! { "$set": { first_name: "fn2" } }, UpdateOptions::default())
                .unwrap_err();
            assert!(err.is_unique_violation());
            assert_eq!(db.count(doc! { first_name: "fn1" })?, 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_compound_unique_index() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.ensure_index(IndexOptions::compound(&["city", "street"]).unique(true))?;
            db.insert(doc! { city: "Paris", street: "Rivoli" })?;
            db.insert(doc! { city: "Paris", street: "Vaugirard" })?;
            db.insert(doc! { city: "Lyon", street: "Rivoli" })?;

            let err = db.insert(doc! { street: "Rivoli", city: "Paris" }).unwrap_err();
            assert!(matches!(err.kind(), ErrorKind::UniqueViolation { .. }));

            assert_eq!(db.count(doc! { city: "Paris", street: "Rivoli" })?, 1);
            assert_eq!(db.count(doc! { city: "Paris" })?, 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_indexed_queries_agree_with_scans() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            for age in 0..60 {
                db.insert(random_person(age % 30))?;
            }
            db.insert(doc! { age: [5, 45], first_name: "many" })?;

            let queries = vec![
                doc! { age: 12 },
                doc! { age: 45 },
                doc! { age: { "$in": [3, 4, 5] } },
                doc! { age: { "$gte": 10, "$lt": 20 } },
                doc! { age: { "$gt": 40 } },
            ];
            let scanned: Vec<usize> = queries
                .iter()
                .map(|q| db.count(q))
                .collect::<Result<_, _>>()?;

            db.ensure_index(non_unique_index("age"))?;
            let indexed: Vec<usize> = queries
                .iter()
                .map(|q| db.count(q))
                .collect::<Result<_, _>>()?;
            assert_eq!(scanned, indexed);
            assert_eq!(indexed, vec![2, 1, 7, 20, 1]);

            let young = field("age").lt(10).and(field("first_name").ne("many"));
            db.update(young, doc! { "$inc": { age: 100 } }, multi())?;
            assert_eq!(db.count(field("age").gte(100))?, 20);
            assert_eq!(db.count(doc! { age: 5 })?, 1);
            assert_eq!(db.count(doc! { age: 105 })?, 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_invalid_index_operations() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let err = db.ensure_index(IndexOptions::new("")).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidIndexSpec);

            let err = db
                .ensure_index(IndexOptions::compound(&["a", "b"]).expire_after(Duration::from_secs(1)))
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidIndexSpec);

            let err = db.ensure_index(IndexOptions::new("a,b")).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidIndexSpec);

            let err = db.remove_index("missing").unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::IndexNotFound);
            Ok(())
        },
        cleanup,
    )
}
