use crate::errors::LodeResult;
use anyhow::Error;
use basu::error::BasuError;
use basu::event::Event;
use basu::Handle;
use std::fmt::Debug;
use std::sync::Arc;

/// Lifecycle events published by a [Datastore](crate::datastore::Datastore).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatastoreEvent {
    /// A load (automatic or explicit) completed successfully.
    Loaded,
    /// The datafile was rewritten by a compaction.
    CompactionDone,
}

pub trait DatastoreEventCallback: Send + Sync + Fn(DatastoreEvent) -> LodeResult<()> {}

impl<F> DatastoreEventCallback for F where F: Send + Sync + Fn(DatastoreEvent) -> LodeResult<()> {}

/// Listener for [DatastoreEvent]s.
///
/// Listeners run on the thread publishing the event, which is the datastore's worker.
/// An error returned by the callback is logged and does not fail the operation.
#[derive(Clone)]
pub struct DatastoreEventListener {
    on_event: Arc<dyn DatastoreEventCallback>,
}

impl DatastoreEventListener {
    pub fn new(on_event: impl DatastoreEventCallback + 'static) -> Self {
        DatastoreEventListener {
            on_event: Arc::new(on_event),
        }
    }
}

impl Handle<DatastoreEvent> for DatastoreEventListener {
    fn handle(&self, event: &Event<DatastoreEvent>) -> Result<(), BasuError> {
        match (self.on_event)(event.data) {
            Ok(_) => Ok(()),
            Err(e) => Err(BasuError::HandlerError(Error::from(e))),
        }
    }
}

impl Debug for DatastoreEventListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatastoreEventListener").finish()
    }
}
