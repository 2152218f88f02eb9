use crate::common::{
    schedule_task, EventAware, ScheduledTask, SubscriberRef, MIN_AUTOCOMPACTION_INTERVAL,
};
use crate::datastore::engine::{DatastoreEventBus, Engine};
use crate::datastore::executor::Executor;
use crate::datastore::{
    Cursor, DatastoreEventListener, FindPlan, Pending, RemoveOptions, UpdateOptions, UpdateResult,
};
use crate::datastore_config::DatastoreConfig;
use crate::document::Document;
use crate::errors::{ErrorKind, LodeError, LodeResult};
use crate::filter::{IntoQuery, Projection, Query};
use crate::index::IndexOptions;
use crate::update::UpdateSpec;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// An embedded document datastore.
///
/// `Datastore` is a cheap handle; clones share the same store. Every operation is queued
/// on a single worker thread and runs after every operation queued before it, whichever
/// handle or thread it came from. Each operation comes in a blocking form and an `_async`
/// form returning a [Pending] result.
///
/// Documents passed in and handed out are copies: mutating a returned document never
/// changes the stored one.
///
/// # Examples
///
/// ```rust
/// use lodestore::datastore::{multi, RemoveOptions};
/// use lodestore::datastore_builder::DatastoreBuilder;
/// use lodestore::doc;
/// use lodestore::index::unique_index;
///
/// let db = DatastoreBuilder::default().in_memory().open().unwrap();
/// db.ensure_index(unique_index("name")).unwrap();
/// db.insert(doc! { name: "Earth", moons: 1 }).unwrap();
/// db.insert(doc! { name: "Mars", moons: 2 }).unwrap();
///
/// let result = db
///     .update(doc! { moons: { "$gt": 0 } }, doc! { "$inc": { moons: 1 } }, multi())
///     .unwrap();
/// assert_eq!(result.num_affected(), 2);
///
/// let mars = db.find_one(doc! { name: "Mars" }).unwrap().unwrap();
/// assert_eq!(mars.get("moons").and_then(|m| m.as_i64()), Some(3));
///
/// assert_eq!(db.remove(doc! { name: "Earth" }, RemoveOptions::default()).unwrap(), 1);
/// assert_eq!(db.count(doc! {}).unwrap(), 1);
/// db.close().unwrap();
/// ```
#[derive(Clone)]
pub struct Datastore {
    inner: Arc<DatastoreInner>,
}

impl Datastore {
    pub(crate) fn open(config: DatastoreConfig) -> LodeResult<Datastore> {
        let event_bus = DatastoreEventBus::new();
        let engine = Engine::new(config.clone(), event_bus.clone());
        let executor = Executor::start(engine, config.autoload(), config.on_load())?;

        let datastore = Datastore {
            inner: Arc::new(DatastoreInner {
                config,
                executor,
                event_bus,
                autocompaction: Mutex::new(None),
            }),
        };
        if let Some(interval) = datastore.inner.config.autocompaction_interval() {
            datastore.set_autocompaction_interval(interval)?;
        }
        log::debug!(
            "Opened datastore {}",
            datastore
                .inner
                .config
                .filename()
                .map(|f| f.display().to_string())
                .unwrap_or_else(|| "in memory".to_string())
        );
        Ok(datastore)
    }

    pub fn config(&self) -> &DatastoreConfig {
        &self.inner.config
    }

    pub fn insert(&self, doc: Document) -> LodeResult<Document> {
        self.insert_async(doc).wait()
    }

    pub fn insert_async(&self, doc: Document) -> Pending<Document> {
        self.inner.executor.submit(move |engine| {
            engine.insert(vec![doc])?.into_iter().next().ok_or_else(|| {
                log::error!("Insert returned no document");
                LodeError::new("Insert returned no document", ErrorKind::InternalError)
            })
        })
    }

    /// Inserts every document or, if any of them is rejected, none.
    pub fn insert_many(&self, docs: Vec<Document>) -> LodeResult<Vec<Document>> {
        self.insert_many_async(docs).wait()
    }

    pub fn insert_many_async(&self, docs: Vec<Document>) -> Pending<Vec<Document>> {
        self.inner.executor.submit(move |engine| engine.insert(docs))
    }

    /// A [Cursor] over the documents matching `query`. Nothing runs until the cursor is
    /// executed.
    pub fn find(&self, query: impl IntoQuery) -> Cursor {
        Cursor::new(self.clone(), query.into_query())
    }

    pub fn find_one(&self, query: impl IntoQuery) -> LodeResult<Option<Document>> {
        self.find_one_async(query).wait()
    }

    pub fn find_one_async(&self, query: impl IntoQuery) -> Pending<Option<Document>> {
        self.find_one_projected_async(query, None)
    }

    /// Like [Datastore::find_one], keeping or dropping the fields listed in `projection`.
    pub fn find_one_projected(
        &self,
        query: impl IntoQuery,
        projection: Document,
    ) -> LodeResult<Option<Document>> {
        self.find_one_projected_async(query, Some(projection)).wait()
    }

    fn find_one_projected_async(
        &self,
        query: impl IntoQuery,
        projection: Option<Document>,
    ) -> Pending<Option<Document>> {
        let query = match query.into_query() {
            Ok(query) => query,
            Err(e) => return Pending::ready(Err(e)),
        };
        let projection = match projection.as_ref().map(Projection::parse).transpose() {
            Ok(projection) => projection,
            Err(e) => return Pending::ready(Err(e)),
        };
        let plan = FindPlan::single().with_projection(projection);
        self.inner.executor.submit(move |engine| {
            Ok(engine.find(&query, &plan)?.into_iter().next())
        })
    }

    pub(crate) fn find_with_plan(&self, query: Query, plan: FindPlan) -> Pending<Vec<Document>> {
        self.inner
            .executor
            .submit(move |engine| engine.find(&query, &plan))
    }

    pub fn count(&self, query: impl IntoQuery) -> LodeResult<usize> {
        self.count_async(query).wait()
    }

    pub fn count_async(&self, query: impl IntoQuery) -> Pending<usize> {
        match query.into_query() {
            Ok(query) => self.inner.executor.submit(move |engine| engine.count(&query)),
            Err(e) => Pending::ready(Err(e)),
        }
    }

    /// Applies `update` to the documents matching `query`.
    ///
    /// `update` either holds only modifiers (`$set`, `$inc`, ...) or is a replacement
    /// document. When several documents are updated, either all of them are or none.
    pub fn update(
        &self,
        query: impl IntoQuery,
        update: Document,
        options: UpdateOptions,
    ) -> LodeResult<UpdateResult> {
        self.update_async(query, update, options).wait()
    }

    pub fn update_async(
        &self,
        query: impl IntoQuery,
        update: Document,
        options: UpdateOptions,
    ) -> Pending<UpdateResult> {
        let parsed = query
            .into_query()
            .and_then(|query| Ok((query, UpdateSpec::parse(&update)?)));
        match parsed {
            Ok((query, update)) => self
                .inner
                .executor
                .submit(move |engine| engine.update(&query, &update, options)),
            Err(e) => Pending::ready(Err(e)),
        }
    }

    /// Removes the first document matching `query`, or all of them with
    /// [RemoveOptions] `multi`. Returns the number removed.
    pub fn remove(&self, query: impl IntoQuery, options: RemoveOptions) -> LodeResult<usize> {
        self.remove_async(query, options).wait()
    }

    pub fn remove_async(&self, query: impl IntoQuery, options: RemoveOptions) -> Pending<usize> {
        match query.into_query() {
            Ok(query) => self
                .inner
                .executor
                .submit(move |engine| engine.remove(&query, options)),
            Err(e) => Pending::ready(Err(e)),
        }
    }

    /// Creates an index unless one over the same fields already exists.
    pub fn ensure_index(&self, options: IndexOptions) -> LodeResult<()> {
        self.ensure_index_async(options).wait()
    }

    pub fn ensure_index_async(&self, options: IndexOptions) -> Pending<()> {
        self.inner
            .executor
            .submit(move |engine| engine.ensure_index(options))
    }

    pub fn remove_index(&self, name: &str) -> LodeResult<()> {
        self.remove_index_async(name).wait()
    }

    pub fn remove_index_async(&self, name: &str) -> Pending<()> {
        let name = name.to_string();
        self.inner
            .executor
            .submit(move |engine| engine.remove_index(&name))
    }

    /// Every index, the `_id` index first.
    pub fn list_indexes(&self) -> LodeResult<Vec<IndexOptions>> {
        self.list_indexes_async().wait()
    }

    pub fn list_indexes_async(&self) -> Pending<Vec<IndexOptions>> {
        self.inner
            .executor
            .submit(|engine| Ok(engine.list_indexes()))
    }

    /// Every live document in `_id` order.
    pub fn all_documents(&self) -> LodeResult<Vec<Document>> {
        self.all_documents_async().wait()
    }

    pub fn all_documents_async(&self) -> Pending<Vec<Document>> {
        self.inner
            .executor
            .submit(|engine| Ok(engine.all_documents()))
    }

    /// Reloads the datastore from its datafile. An in-memory datastore is emptied.
    pub fn load(&self) -> LodeResult<()> {
        self.load_async().wait()
    }

    pub fn load_async(&self) -> Pending<()> {
        self.inner.executor.submit(|engine| engine.load())
    }

    /// Rewrites the datafile with one line per live document and index.
    pub fn compact_datafile(&self) -> LodeResult<()> {
        self.compact_datafile_async().wait()
    }

    pub fn compact_datafile_async(&self) -> Pending<()> {
        self.inner.executor.submit(|engine| engine.compact())
    }

    /// Removes every document and secondary index and deletes the datafile.
    pub fn drop_database(&self) -> LodeResult<()> {
        self.drop_database_async().wait()
    }

    pub fn drop_database_async(&self) -> Pending<()> {
        self.inner.executor.submit(|engine| engine.drop_database())
    }

    /// Compacts the datafile every `interval`, replacing any previous schedule. Intervals
    /// below five seconds are raised to five seconds.
    pub fn set_autocompaction_interval(&self, interval: Duration) -> LodeResult<()> {
        let interval = interval.max(MIN_AUTOCOMPACTION_INTERVAL);
        let weak: Weak<DatastoreInner> = Arc::downgrade(&self.inner);
        let task = schedule_task(interval, move || {
            if let Some(inner) = weak.upgrade() {
                inner
                    .executor
                    .submit_background("autocompaction", |engine| engine.compact());
            }
        })?;
        *self.inner.autocompaction.lock() = Some(task);
        log::debug!("Autocompaction scheduled every {:?}", interval);
        Ok(())
    }

    pub fn stop_autocompaction(&self) {
        self.inner.stop_autocompaction();
    }

    /// Finishes every queued operation and stops the worker. Operations issued afterwards
    /// fail with [ErrorKind::StoreClosed].
    pub fn close(&self) -> LodeResult<()> {
        self.inner.stop_autocompaction();
        self.inner.executor.close()?;
        self.inner.event_bus.close()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.executor.is_closed()
    }
}

impl EventAware for Datastore {
    fn subscribe(&self, listener: DatastoreEventListener) -> LodeResult<Option<SubscriberRef>> {
        self.inner.event_bus.register(listener)
    }

    fn unsubscribe(&self, subscriber: SubscriberRef) -> LodeResult<()> {
        self.inner.event_bus.deregister(subscriber)
    }
}

struct DatastoreInner {
    config: DatastoreConfig,
    executor: Executor,
    event_bus: DatastoreEventBus,
    autocompaction: Mutex<Option<ScheduledTask>>,
}

impl DatastoreInner {
    fn stop_autocompaction(&self) {
        if let Some(task) = self.autocompaction.lock().take() {
            task.cancel();
        }
    }
}

impl Drop for DatastoreInner {
    fn drop(&mut self) {
        self.stop_autocompaction();
    }
}
