use lodestore::datastore::multi;
use lodestore::doc;
use lodestore::errors::LodeResult;
use lodestore::filter::field;
use lodestore::index::non_unique_index;
use lodestore_int_test::test_util::{cleanup, create_test_context, random_person};

fn main() -> LodeResult<()> {
    println!("Starting stress test...");
    let ctx = create_test_context()?;
    let db = ctx.db();
    db.ensure_index(non_unique_index("age"))?;

    let count = 100_000;
    let start = std::time::Instant::now();
    for i in 0..count {
        let mut person = random_person(i % 90);
        person.put("processed", false);
        db.insert(person)?;
    }
    println!("Inserted {} records in {:?}", count, start.elapsed());

    let start = std::time::Instant::now();
    let adults = db.find(field("age").gte(18)).exec()?;
    println!("Found {} adults in {:?}", adults.len(), start.elapsed());

    let start = std::time::Instant::now();
    let result = db.update(
        doc! { processed: false },
        doc! { "$set": { processed: true } },
        multi(),
    )?;
    println!("Updated {} records in {:?}", result.num_affected(), start.elapsed());

    let start = std::time::Instant::now();
    db.compact_datafile()?;
    println!("Compacted the datafile in {:?}", start.elapsed());

    let start = std::time::Instant::now();
    let ctx = ctx.reopen()?;
    println!(
        "Reloaded {} records in {:?}",
        ctx.db().count(doc! { processed: true })?,
        start.elapsed()
    );

    cleanup(ctx)
}
