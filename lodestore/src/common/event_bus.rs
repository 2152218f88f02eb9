use crate::common::DATASTORE_EVENT;
use crate::datastore::DatastoreEventListener;
use crate::errors::{ErrorKind, LodeError, LodeResult};
use basu::error::BasuError;
use basu::event::Event;
use basu::{EventBus, Handle, HandlerId};
use std::marker::PhantomData;
use std::sync::Arc;

/// Something that datastore event listeners can be attached to.
pub trait EventAware {
    fn subscribe(&self, listener: DatastoreEventListener) -> LodeResult<Option<SubscriberRef>>;

    fn unsubscribe(&self, subscriber: SubscriberRef) -> LodeResult<()>;
}

/// A typed wrapper around a [basu] event bus.
///
/// Publishing without any registered listener is a cheap no-op.
#[derive(Clone)]
pub struct LodeEventBus<E, L> {
    inner: Arc<LodeEventBusInner<E, L>>,
}

impl<E, L> Default for LodeEventBus<E, L>
where
    L: Handle<E> + 'static,
    E: Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E, L> LodeEventBus<E, L>
where
    L: Handle<E> + 'static,
    E: Send + Sync,
{
    pub fn new() -> Self {
        LodeEventBus {
            inner: Arc::new(LodeEventBusInner::new()),
        }
    }

    pub fn register(&self, listener: L) -> LodeResult<Option<SubscriberRef>> {
        self.inner.register(listener)
    }

    pub fn deregister(&self, subscriber: SubscriberRef) -> LodeResult<()> {
        self.inner.deregister(subscriber)
    }

    pub fn publish(&self, event: E) -> LodeResult<()> {
        self.inner.publish(event)
    }

    /// Removes every listener.
    pub fn close(&self) -> LodeResult<()> {
        self.inner.close()
    }

    pub fn has_listeners(&self) -> bool {
        self.inner.has_listeners()
    }
}

/// Handle returned by a subscription, used to unsubscribe.
pub struct SubscriberRef {
    pub(crate) inner: HandlerId,
}

impl SubscriberRef {
    pub fn new(inner: HandlerId) -> Self {
        SubscriberRef { inner }
    }
}

struct LodeEventBusInner<E, L> {
    event_bus: EventBus<E>,
    phantom_data: PhantomData<L>,
}

impl<E, L> LodeEventBusInner<E, L>
where
    L: Handle<E> + 'static,
    E: Send + Sync,
{
    fn new() -> Self {
        LodeEventBusInner {
            event_bus: EventBus::new(),
            phantom_data: PhantomData,
        }
    }

    fn register(&self, listener: L) -> LodeResult<Option<SubscriberRef>> {
        match self.event_bus.subscribe(DATASTORE_EVENT, Box::new(listener)) {
            Ok(subscriber) => Ok(Some(SubscriberRef::new(subscriber))),
            Err(e) => Err(Self::lode_error(e)),
        }
    }

    fn deregister(&self, subscriber: SubscriberRef) -> LodeResult<()> {
        self.event_bus
            .unsubscribe(DATASTORE_EVENT, &subscriber.inner)
            .map_err(Self::lode_error)
    }

    fn publish(&self, event: E) -> LodeResult<()> {
        if !self.has_listeners() {
            return Ok(());
        }

        let basu_event = Event::new(event);
        self.event_bus
            .publish(DATASTORE_EVENT, &basu_event)
            .map_err(Self::lode_error)
    }

    fn close(&self) -> LodeResult<()> {
        self.event_bus.clear().map_err(Self::lode_error)
    }

    fn has_listeners(&self) -> bool {
        match self.event_bus.get_handler_count(DATASTORE_EVENT) {
            Ok(count) => count > 0,
            Err(BasuError::EventTypeNotFOUND) => false,
            Err(e) => {
                log::warn!("Failed to check listeners: {}, defaulting to false", e);
                false
            }
        }
    }

    fn lode_error(e: BasuError) -> LodeError {
        let error = match e {
            BasuError::EventTypeNotFOUND => LodeError::new(
                "Event bus error: no handler is registered for datastore events",
                ErrorKind::EventError,
            ),
            BasuError::MutexPoisoned => LodeError::new(
                "Event bus error: internal mutex poisoned",
                ErrorKind::EventError,
            ),
            BasuError::HandlerError(e) => LodeError::new(
                &format!("Event handler error: {}", e),
                ErrorKind::EventError,
            ),
        };
        log::error!("{}", error);
        error
    }
}
