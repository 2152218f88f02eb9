use crate::common::{StringComparator, DATE_TAG};
use crate::document::Document;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};

/// Compare two floats with a total order; NaN sorts after every other number.
#[inline]
fn num_cmp_float(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Represents a [Document] value.
///
/// # Variants
/// - Null: explicit null
/// - Bool(bool): boolean true/false
/// - I64(i64) / F64(f64): numbers; both variants compare and test equal across each other
/// - String(String): text value
/// - Date(DateTime<Utc>): a point in time with millisecond precision
/// - Array(Vec<Value>): ordered sequence
/// - Document(Document): nested document
///
/// # Ordering
/// Values of different types are ordered by type rank:
/// null < numbers < strings < booleans < dates < arrays < documents.
/// Arrays compare element by element and then by length; documents compare their
/// key-sorted entries. An absent field (see [compare_optional]) sorts before everything.
///
/// # Usage
/// ```text
/// let v1: Value = 42.into();
/// let v2 = Value::from("hello");
/// let doc = doc! { age: 42, name: "Alice" };
/// ```
#[derive(Clone, Default)]
pub enum Value {
    /// Represents a null value.
    #[default]
    Null,
    /// Represents a boolean value.
    Bool(bool),
    /// Represents an integral number.
    I64(i64),
    /// Represents a floating point number.
    F64(f64),
    /// Represents a string value.
    String(String),
    /// Represents a date.
    Date(DateTime<Utc>),
    /// Represents an array value.
    Array(Vec<Value>),
    /// Represents a nested document.
    Document(Document),
}

impl Value {
    /// Creates a value from anything convertible into one.
    pub fn from<T: Into<Value>>(value: T) -> Value {
        value.into()
    }

    pub fn from_vec<T: Into<Value>>(values: Vec<T>) -> Value {
        Value::Array(values.into_iter().map(|v| v.into()).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::I64(_) | Value::F64(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_date(&self) -> bool {
        matches!(self, Value::Date(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_document(&self) -> bool {
        matches!(self, Value::Document(_))
    }

    /// Primitive values are the ones that can be looked up by exact key in an index.
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Value::Array(_) | Value::Document(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as an integer; floats are accepted only when they have no
    /// fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            Value::F64(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::I64(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_document_mut(&mut self) -> Option<&mut Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    /// Loose truthiness, used by projections and flag-like operator arguments.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::I64(v) => *v != 0,
            Value::F64(v) => *v != 0.0 && !v.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::I64(_) | Value::F64(_) => "number",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Array(_) => "array",
            Value::Document(_) => "document",
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::I64(_) | Value::F64(_) => 1,
            Value::String(_) => 2,
            Value::Bool(_) => 3,
            Value::Date(_) => 4,
            Value::Array(_) => 5,
            Value::Document(_) => 6,
        }
    }

    /// Takes the value out, leaving [Value::Null] behind.
    pub fn take(&mut self) -> Value {
        std::mem::take(self)
    }
}

/// Compares two values with the datastore's cross-type ordering.
///
/// `comparator`, when supplied, replaces the default byte-wise ordering of strings,
/// including strings nested in arrays and documents.
pub fn compare_values(a: &Value, b: &Value, comparator: Option<&StringComparator>) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::I64(x), Value::I64(y)) => x.cmp(y),
        (Value::I64(_) | Value::F64(_), Value::I64(_) | Value::F64(_)) => {
            let x = a.as_f64().unwrap_or(f64::NAN);
            let y = b.as_f64().unwrap_or(f64::NAN);
            num_cmp_float(x, y)
        }
        (Value::String(x), Value::String(y)) => match comparator {
            Some(cmp) => cmp(x, y),
            None => x.cmp(y),
        },
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Date(x), Value::Date(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                let ordering = compare_values(left, right, comparator);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Document(x), Value::Document(y)) => compare_documents(x, y, comparator),
        _ => a.type_rank().cmp(&b.type_rank()),
    }
}

/// Compares two possibly absent values; an absent value sorts before any present one.
pub fn compare_optional(
    a: Option<&Value>,
    b: Option<&Value>,
    comparator: Option<&StringComparator>,
) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare_values(a, b, comparator),
    }
}

pub(crate) fn compare_documents(a: &Document, b: &Document, comparator: Option<&StringComparator>) -> Ordering {
    let mut a_entries: Vec<(&String, &Value)> = a.iter().collect();
    let mut b_entries: Vec<(&String, &Value)> = b.iter().collect();
    a_entries.sort_by(|x, y| x.0.cmp(y.0));
    b_entries.sort_by(|x, y| x.0.cmp(y.0));

    for ((a_key, a_value), (b_key, b_value)) in a_entries.iter().zip(b_entries.iter()) {
        let ordering = a_key
            .cmp(b_key)
            .then_with(|| compare_values(a_value, b_value, comparator));
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a_entries.len().cmp(&b_entries.len())
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        compare_values(self, other, None) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_values(self, other, None)
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_rank().hash(state);
        match self {
            Value::Null => {}
            Value::Bool(v) => v.hash(state),
            Value::I64(_) | Value::F64(_) => {
                // numbers equal across variants must hash alike
                let number = self.as_f64().unwrap_or(f64::NAN);
                let normalized = if number == 0.0 {
                    0.0
                } else if number.is_nan() {
                    f64::NAN
                } else {
                    number
                };
                normalized.to_bits().hash(state)
            }
            Value::String(v) => v.hash(state),
            Value::Date(v) => v.timestamp_millis().hash(state),
            Value::Array(v) => v.hash(state),
            Value::Document(v) => v.hash(state),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{:?}", v),
            Value::Date(v) => write!(f, "{}", v.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Value::Array(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            }
            Value::Document(doc) => write!(f, "{}", doc),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::I64(v) => serializer.serialize_i64(*v),
            Value::F64(v) => serializer.serialize_f64(*v),
            Value::String(v) => serializer.serialize_str(v),
            Value::Date(v) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(DATE_TAG, &v.timestamp_millis())?;
                map.end()
            }
            Value::Array(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for value in values {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
            Value::Document(doc) => doc.serialize(serializer),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::I64(value as i64)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::I64(value as i64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        match i64::try_from(value) {
            Ok(v) => Value::I64(v),
            Err(_) => Value::F64(value as f64),
        }
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::F64(value as f64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::F64(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::String(value.clone())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Date(crate::common::truncate_to_millis(value))
    }
}

impl From<Document> for Value {
    fn from(value: Document) -> Self {
        Value::Document(value)
    }
}

impl From<&Value> for Value {
    fn from(value: &Value) -> Self {
        value.clone()
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::from_vec(values)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}
