use crate::common::{compare_documents, Value, DOC_ID, FIELD_SEPARATOR, OPERATOR_PREFIX};
use crate::document::{get_dot_value, set_dot_value, unset_dot_value};
use crate::errors::{ErrorKind, LodeError, LodeResult};
use indexmap::map::{IntoIter, Iter, Keys};
use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};

/// A schema-less document: an insertion-ordered mapping from field names to [Value]s.
///
/// Documents compare equal regardless of the order their fields were inserted in.
/// Field names must not start with `$` (reserved for operators) nor contain a `.`
/// (reserved as path separator); [Document::validate_keys] enforces this at every depth
/// and the datastore calls it on every document it accepts.
///
/// Dot paths (`"address.city"`, `"tags.0"`) are resolved by [Document::get_path],
/// [Document::set_path] and [Document::unset_path].
///
/// # Examples
///
/// ```rust
/// use lodestore::doc;
/// use lodestore::common::Value;
///
/// let doc = doc! {
///     name: "Alice",
///     address: { city: "Paris" },
///     tags: ["a", "b"]
/// };
/// assert_eq!(doc.get_path("address.city"), Some(Value::from("Paris")));
/// ```
#[derive(Clone, Default)]
pub struct Document {
    data: IndexMap<String, Value>,
}

impl Document {
    /// Creates a new empty document.
    pub fn new() -> Self {
        Document {
            data: IndexMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Sets a top-level field, keeping the field's position if it already exists.
    /// Returns the previous value.
    pub fn put<K: Into<String>, T: Into<Value>>(&mut self, key: K, value: T) -> Option<Value> {
        self.data.insert(key.into(), value.into())
    }

    /// Sets a top-level field at the first position.
    pub(crate) fn put_first<K: Into<String>, T: Into<Value>>(&mut self, key: K, value: T) {
        let key = key.into();
        self.data.shift_remove(&key);
        self.data.shift_insert(0, key, value.into());
    }

    /// Returns the top-level field `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.data.get_mut(key)
    }

    /// Removes a top-level field, keeping the order of the remaining ones.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Returns the `_id` of the document, if it has one.
    pub fn id(&self) -> Option<&Value> {
        self.data.get(DOC_ID)
    }

    pub fn keys(&self) -> Keys<'_, String, Value> {
        self.data.keys()
    }

    pub fn iter(&self) -> Iter<'_, String, Value> {
        self.data.iter()
    }

    /// Resolves a dot path.
    ///
    /// Numeric segments index into arrays; any other segment applied to an array is mapped
    /// over its elements and yields the array of the results. Returns `None` when the path
    /// does not exist.
    pub fn get_path(&self, path: &str) -> Option<Value> {
        let parts: Vec<&str> = path.split(FIELD_SEPARATOR).collect();
        match parts.split_first() {
            Some((first, rest)) => self
                .data
                .get(*first)
                .and_then(|value| get_dot_value(value, rest)),
            None => None,
        }
    }

    /// Sets the value at a dot path, creating intermediate documents as needed.
    ///
    /// Fails with [ErrorKind::BadUpdate] when the path traverses a value that is neither a
    /// document nor an array.
    pub fn set_path(&mut self, path: &str, value: Value) -> LodeResult<()> {
        let parts: Vec<&str> = path.split(FIELD_SEPARATOR).collect();
        set_dot_value(self, &parts, value)
    }

    /// Removes the value at a dot path. Returns `true` if something was removed.
    pub fn unset_path(&mut self, path: &str) -> bool {
        let parts: Vec<&str> = path.split(FIELD_SEPARATOR).collect();
        unset_dot_value(self, &parts)
    }

    /// Checks the naming rules on every field, recursively through nested documents and
    /// arrays.
    pub fn validate_keys(&self) -> LodeResult<()> {
        for (key, value) in self.data.iter() {
            check_key(key)?;
            validate_value_keys(value)?;
        }
        Ok(())
    }

    /// Returns an independent copy of the document.
    ///
    /// Every value is owned, so a clone shares nothing with its source; this is the copy
    /// made whenever a document crosses the datastore boundary.
    #[inline]
    pub fn deep_copy(&self) -> Document {
        self.clone()
    }
}

fn check_key(key: &str) -> LodeResult<()> {
    if key.starts_with(OPERATOR_PREFIX) {
        log::error!("Field names cannot begin with the $ character: {}", key);
        return Err(LodeError::new(
            &format!("Field names cannot begin with the $ character: {}", key),
            ErrorKind::DocumentValidation,
        ));
    }

    if key.contains(FIELD_SEPARATOR) {
        log::error!("Field names cannot contain a '.': {}", key);
        return Err(LodeError::new(
            &format!("Field names cannot contain a '.': {}", key),
            ErrorKind::DocumentValidation,
        ));
    }
    Ok(())
}

fn validate_value_keys(value: &Value) -> LodeResult<()> {
    match value {
        Value::Document(doc) => doc.validate_keys(),
        Value::Array(values) => values.iter().try_for_each(validate_value_keys),
        _ => Ok(()),
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.data.len() == other.data.len()
            && self
                .data
                .iter()
                .all(|(key, value)| other.data.get(key).is_some_and(|v| v == value))
    }
}

impl Eq for Document {}

impl PartialOrd for Document {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Document {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_documents(self, other, None)
    }
}

impl Hash for Document {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut entries: Vec<(&String, &Value)> = self.data.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.len().hash(state);
        for (key, value) in entries {
            key.hash(state);
            value.hash(state);
        }
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.data.len()))?;
        for (key, value) in self.data.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}: {}", key, value)?;
        }
        write!(f, "}}")
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a String, &'a Value);
    type IntoIter = Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Document {
            data: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

pub fn normalize(value: &str) -> String {
    value.trim_matches('"').to_string()
}

/// Creates a [Document] with JSON-like syntax.
///
/// # Examples
///
/// ```rust
/// use lodestore::doc;
///
/// let empty = doc!{};
///
/// let simple = doc!{
///     name: "Alice",
///     age: 30
/// };
///
/// let base = 100;
/// let with_expr = doc!{
///     score: (base * 2),
///     "$set": { a: 1 }
/// };
///
/// let complex = doc!{
///     user: {
///         name: "Charlie",
///         tags: ["admin", "user"]
///     },
///     values: [1, 2, 3]
/// };
/// ```
#[macro_export]
macro_rules! doc {
    ({}) => {
        $crate::document::Document::new()
    };

    () => {
        $crate::document::Document::new()
    };

    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::doc!($($key : $value),*)
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            #[allow(unused_imports)]
            use $crate::doc_value;

            let mut doc = $crate::document::Document::new();
            $(
                doc.put($crate::document::normalize(stringify!($key)), $crate::doc_value!($value));
            )*
            doc
        }
    };
}

/// Helper macro to convert values for the doc! macro.
#[macro_export]
macro_rules! doc_value {
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        {
            $crate::common::Value::Document($crate::doc!{ $($key : $value),* })
        }
    };

    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}
