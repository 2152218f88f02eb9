use std::cmp::Ordering;
use std::sync::Arc;

use parking_lot::RwLock;

pub type Atomic<T> = Arc<RwLock<T>>;

#[inline]
pub fn atomic<T>(t: T) -> Atomic<T> {
    Arc::new(RwLock::new(t))
}

/// Caller supplied string ordering, used for index keys and cursor sorting.
pub type StringComparator = Arc<dyn Fn(&str, &str) -> Ordering + Send + Sync>;

/// Caller supplied transformation applied to every log line on its way to or from disk.
pub type SerializationHook = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Wraps a closure into a [StringComparator].
pub fn string_comparator<F>(f: F) -> StringComparator
where
    F: Fn(&str, &str) -> Ordering + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wraps a closure into a [SerializationHook].
pub fn serialization_hook<F>(f: F) -> SerializationHook
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    Arc::new(f)
}
