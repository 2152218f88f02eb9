use lodestore::common::EventAware;
use lodestore::datastore::{DatastoreEvent, DatastoreEventListener};
use lodestore::doc;
use lodestore::errors::{ErrorKind, LodeError};
use lodestore_int_test::test_util::{cleanup, create_test_context, run_test};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn wait_for_event<F: Fn() -> bool>(timeout_ms: u64, check: F) {
    awaitility::at_most(Duration::from_millis(timeout_ms)).until(check);
}

fn recording_listener(events: Arc<Mutex<Vec<DatastoreEvent>>>) -> DatastoreEventListener {
    DatastoreEventListener::new(move |event: DatastoreEvent| {
        events.lock().unwrap().push(event);
        Ok(())
    })
}

#[test]
fn test_load_and_compaction_events() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            // autoload events are published before the first operation runs
            db.count(doc! {})?;
            let events = Arc::new(Mutex::new(Vec::new()));
            db.subscribe(recording_listener(events.clone()))?;

            db.insert(doc! { planet: "Earth" })?;
            db.compact_datafile()?;
            wait_for_event(1000, || events.lock().unwrap().len() == 1);
            assert_eq!(*events.lock().unwrap(), vec![DatastoreEvent::CompactionDone]);

            db.load()?;
            wait_for_event(1000, || events.lock().unwrap().len() == 3);
            assert_eq!(
                *events.lock().unwrap(),
                vec![
                    DatastoreEvent::CompactionDone,
                    DatastoreEvent::CompactionDone,
                    DatastoreEvent::Loaded,
                ]
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unsubscribe() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            // autoload events are published before the first operation runs
            db.count(doc! {})?;
            let events = Arc::new(Mutex::new(Vec::new()));
            let subscriber = db.subscribe(recording_listener(events.clone()))?.unwrap();

            db.compact_datafile()?;
            wait_for_event(1000, || events.lock().unwrap().len() == 1);

            db.unsubscribe(subscriber)?;
            db.compact_datafile()?;
            db.count(doc! {})?;
            assert_eq!(events.lock().unwrap().len(), 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_failing_listener_does_not_fail_the_operation() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.subscribe(DatastoreEventListener::new(|_event: DatastoreEvent| {
                Err(LodeError::new("listener failed", ErrorKind::EventError))
            }))?;

            db.insert(doc! { planet: "Earth" })?;
            db.compact_datafile()?;
            assert_eq!(db.count(doc! {})?, 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_listener_can_use_the_datastore() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.count(doc! {})?;
            let counts = Arc::new(Mutex::new(Vec::new()));
            let counts_clone = counts.clone();
            let handle = db.clone();
            db.subscribe(DatastoreEventListener::new(move |event: DatastoreEvent| {
                if event == DatastoreEvent::CompactionDone {
                    let counts = counts_clone.clone();
                    handle.count_async(doc! {}).then(move |count| {
                        if let Ok(count) = count {
                            counts.lock().unwrap().push(count);
                        }
                    });
                }
                Ok(())
            }))?;

            db.insert_many(vec![doc! { n: 1 }, doc! { n: 2 }])?;
            db.compact_datafile()?;
            wait_for_event(2000, || counts.lock().unwrap().len() == 1);
            assert_eq!(*counts.lock().unwrap(), vec![2]);
            Ok(())
        },
        cleanup,
    )
}
