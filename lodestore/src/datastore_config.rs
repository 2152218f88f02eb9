//! Configuration of a datastore.

use crate::common::{
    uid, SerializationHook, StringComparator, SERIALIZATION_HOOK_PROBES, TEMP_FILE_SUFFIX,
};
use crate::datastore::LoadHook;
use crate::errors::{ErrorKind, LodeError, LodeResult};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Settings of a datastore, usually assembled by a
/// [DatastoreBuilder](crate::datastore_builder::DatastoreBuilder).
///
/// Clones share the same settings. Once validated by opening a datastore the
/// configuration is frozen and every setter fails with [ErrorKind::InvalidConfiguration].
#[derive(Clone)]
pub struct DatastoreConfig {
    inner: Arc<DatastoreConfigInner>,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DatastoreConfig {
    pub fn new() -> Self {
        DatastoreConfig {
            inner: Arc::new(DatastoreConfigInner::new()),
        }
    }

    /// The datafile, or `None` for an in-memory datastore.
    pub fn filename(&self) -> Option<PathBuf> {
        self.inner.filename()
    }

    pub fn set_filename(&self, filename: &Path) -> LodeResult<()> {
        self.inner.set_filename(filename)
    }

    pub fn is_in_memory(&self) -> bool {
        self.filename().is_none()
    }

    pub fn set_in_memory(&self) -> LodeResult<()> {
        self.inner.set_flag(&self.inner.in_memory, true, "in_memory")
    }

    pub fn autoload(&self) -> bool {
        self.inner.autoload.load(Ordering::Relaxed)
    }

    pub fn set_autoload(&self, autoload: bool) -> LodeResult<()> {
        self.inner.set_flag(&self.inner.autoload, autoload, "autoload")
    }

    pub fn on_load(&self) -> Option<LoadHook> {
        self.inner.on_load.get().cloned()
    }

    pub fn set_on_load(&self, hook: LoadHook) -> LodeResult<()> {
        self.inner.set_once(&self.inner.on_load, hook, "on_load")
    }

    /// Whether `createdAt` and `updatedAt` are maintained on every document.
    pub fn timestamp_data(&self) -> bool {
        self.inner.timestamp_data.load(Ordering::Relaxed)
    }

    pub fn set_timestamp_data(&self, timestamp_data: bool) -> LodeResult<()> {
        self.inner
            .set_flag(&self.inner.timestamp_data, timestamp_data, "timestamp_data")
    }

    /// Custom string ordering used by indexes and sorting.
    pub fn compare_strings(&self) -> Option<StringComparator> {
        self.inner.compare_strings.get().cloned()
    }

    pub fn set_compare_strings(&self, comparator: StringComparator) -> LodeResult<()> {
        self.inner
            .set_once(&self.inner.compare_strings, comparator, "compare_strings")
    }

    pub fn after_serialization(&self) -> Option<SerializationHook> {
        self.inner.serialization_hooks.get().map(|(after, _)| after.clone())
    }

    pub fn before_deserialization(&self) -> Option<SerializationHook> {
        self.inner
            .serialization_hooks
            .get()
            .map(|(_, before)| before.clone())
    }

    /// Sets the transformations applied to each datafile line on write and on read. The
    /// second must undo the first.
    pub fn set_serialization_hooks(
        &self,
        after_serialization: SerializationHook,
        before_deserialization: SerializationHook,
    ) -> LodeResult<()> {
        self.inner.set_once(
            &self.inner.serialization_hooks,
            (after_serialization, before_deserialization),
            "serialization hooks",
        )
    }

    pub fn autocompaction_interval(&self) -> Option<Duration> {
        self.inner.autocompaction_interval.get().cloned()
    }

    pub fn set_autocompaction_interval(&self, interval: Duration) -> LodeResult<()> {
        self.inner.set_once(
            &self.inner.autocompaction_interval,
            interval,
            "autocompaction_interval",
        )
    }

    /// Checks the settings and freezes them.
    pub(crate) fn validate(&self) -> LodeResult<()> {
        self.inner.validate()
    }

    pub fn is_configured(&self) -> bool {
        self.inner.configured.load(Ordering::Relaxed)
    }
}

struct DatastoreConfigInner {
    configured: AtomicBool,
    filename: OnceLock<PathBuf>,
    in_memory: AtomicBool,
    autoload: AtomicBool,
    on_load: OnceLock<LoadHook>,
    timestamp_data: AtomicBool,
    compare_strings: OnceLock<StringComparator>,
    serialization_hooks: OnceLock<(SerializationHook, SerializationHook)>,
    autocompaction_interval: OnceLock<Duration>,
}

impl DatastoreConfigInner {
    fn new() -> Self {
        DatastoreConfigInner {
            configured: AtomicBool::from(false),
            filename: OnceLock::new(),
            in_memory: AtomicBool::from(false),
            autoload: AtomicBool::from(false),
            on_load: OnceLock::new(),
            timestamp_data: AtomicBool::from(false),
            compare_strings: OnceLock::new(),
            serialization_hooks: OnceLock::new(),
            autocompaction_interval: OnceLock::new(),
        }
    }

    fn filename(&self) -> Option<PathBuf> {
        if self.in_memory.load(Ordering::Relaxed) {
            return None;
        }
        self.filename.get().cloned()
    }

    fn set_filename(&self, filename: &Path) -> LodeResult<()> {
        if filename.as_os_str().is_empty() {
            log::error!("Datafile name cannot be empty");
            return Err(LodeError::new(
                "Datafile name cannot be empty",
                ErrorKind::InvalidConfiguration,
            ));
        }
        if filename.to_string_lossy().ends_with(TEMP_FILE_SUFFIX) {
            log::error!(
                "Datafile name cannot end with {}, it is reserved for compaction",
                TEMP_FILE_SUFFIX
            );
            return Err(LodeError::new(
                &format!(
                    "Datafile name cannot end with {}, it is reserved for compaction",
                    TEMP_FILE_SUFFIX
                ),
                ErrorKind::InvalidConfiguration,
            ));
        }
        self.set_once(&self.filename, filename.to_path_buf(), "filename")
    }

    fn set_flag(&self, flag: &AtomicBool, value: bool, name: &str) -> LodeResult<()> {
        self.ensure_not_configured(name)?;
        flag.store(value, Ordering::Relaxed);
        Ok(())
    }

    fn set_once<T>(&self, cell: &OnceLock<T>, value: T, name: &str) -> LodeResult<()> {
        self.ensure_not_configured(name)?;
        cell.set(value).map_err(|_| {
            log::error!("{} is already set", name);
            LodeError::new(
                &format!("{} is already set", name),
                ErrorKind::InvalidConfiguration,
            )
        })
    }

    fn ensure_not_configured(&self, name: &str) -> LodeResult<()> {
        if self.configured.load(Ordering::Relaxed) {
            log::error!("{} cannot be changed after the datastore is opened", name);
            return Err(LodeError::new(
                &format!("{} cannot be changed after the datastore is opened", name),
                ErrorKind::InvalidConfiguration,
            ));
        }
        Ok(())
    }

    fn validate(&self) -> LodeResult<()> {
        if self.configured.load(Ordering::Relaxed) {
            return Ok(());
        }

        if self.filename.get().is_none() && !self.in_memory.load(Ordering::Relaxed) {
            log::debug!("No datafile configured, the datastore lives in memory");
        }

        if let Some((after, before)) = self.serialization_hooks.get() {
            // both hooks must round trip arbitrary strings
            for probe in 0..SERIALIZATION_HOOK_PROBES {
                let sample = uid(1 + probe * 10);
                if before(&after(&sample)) != sample {
                    log::error!("before_deserialization is not the inverse of after_serialization");
                    return Err(LodeError::new(
                        "before_deserialization is not the inverse of after_serialization",
                        ErrorKind::InvalidConfiguration,
                    ));
                }
            }
        }

        self.configured.store(true, Ordering::Relaxed);
        Ok(())
    }
}
