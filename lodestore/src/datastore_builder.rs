use crate::common::{SerializationHook, StringComparator};
use crate::datastore::Datastore;
use crate::datastore_config::DatastoreConfig;
use crate::errors::{LodeError, LodeResult};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Fluent builder of a [Datastore].
///
/// The first invalid setting is remembered and returned by [DatastoreBuilder::open].
///
/// # Examples
///
/// ```rust
/// use lodestore::datastore_builder::DatastoreBuilder;
/// use lodestore::doc;
///
/// let db = DatastoreBuilder::default()
///     .in_memory()
///     .timestamp_data(true)
///     .open()
///     .unwrap();
/// let doc = db.insert(doc! { planet: "Earth" }).unwrap();
/// assert!(doc.contains_key("createdAt"));
/// ```
#[derive(Default)]
pub struct DatastoreBuilder {
    error: Option<LodeError>,
    config: DatastoreConfig,
}

impl DatastoreBuilder {
    pub fn new() -> Self {
        DatastoreBuilder {
            error: None,
            config: DatastoreConfig::new(),
        }
    }

    /// Persists the datastore to `filename`. Without a filename the datastore is in memory.
    pub fn filename(mut self, filename: impl AsRef<Path>) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_filename(filename.as_ref()) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Keeps the datastore in memory even if a filename is set.
    pub fn in_memory(mut self) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_in_memory() {
                self.error = Some(e);
            }
        }
        self
    }

    /// Loads the datafile as the first queued operation. If that load fails every later
    /// operation fails too.
    pub fn autoload(mut self, autoload: bool) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_autoload(autoload) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Called with the outcome of the automatic load, on a separate thread.
    pub fn on_load<F>(mut self, hook: F) -> Self
    where
        F: Fn(Option<&LodeError>) + Send + Sync + 'static,
    {
        if self.error.is_none() {
            if let Err(e) = self.config.set_on_load(Arc::new(hook)) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn timestamp_data(mut self, timestamp_data: bool) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_timestamp_data(timestamp_data) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn compare_strings(mut self, comparator: StringComparator) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_compare_strings(comparator) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn serialization_hooks(
        mut self,
        after_serialization: SerializationHook,
        before_deserialization: SerializationHook,
    ) -> Self {
        if self.error.is_none() {
            if let Err(e) = self
                .config
                .set_serialization_hooks(after_serialization, before_deserialization)
            {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn autocompaction_interval(mut self, interval: Duration) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_autocompaction_interval(interval) {
                self.error = Some(e);
            }
        }
        self
    }

    pub(crate) fn into_config(self) -> LodeResult<DatastoreConfig> {
        if let Some(error) = self.error {
            return Err(error);
        }
        self.config.validate()?;
        Ok(self.config)
    }

    pub fn open(self) -> LodeResult<Datastore> {
        let config = self.into_config()?;
        Datastore::open(config)
    }
}
