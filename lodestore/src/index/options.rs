use crate::common::{
    Value, DOC_ID, INDEX_EXPIRE_AFTER, INDEX_FIELD_NAME, INDEX_NAME_SEPARATOR, INDEX_SPARSE,
    INDEX_UNIQUE, OPERATOR_PREFIX,
};
use crate::document::Document;
use crate::errors::{ErrorKind, LodeError, LodeResult};
use itertools::Itertools;
use std::time::Duration;

/// Definition of a secondary index.
///
/// An index covers one field path, or several for a compound index. Its identity is the
/// canonical name returned by [IndexOptions::name]: the sorted field paths joined with `,`,
/// so the declaration order of a compound index does not matter.
///
/// # Examples
///
/// ```rust
/// use lodestore::index::IndexOptions;
/// use std::time::Duration;
///
/// let by_email = IndexOptions::new("email").unique(true);
/// let by_place = IndexOptions::compound(&["star", "planet"]);
/// assert_eq!(by_place.name(), "planet,star");
///
/// let sessions = IndexOptions::new("lastSeen").expire_after(Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct IndexOptions {
    field_names: Vec<String>,
    unique: bool,
    sparse: bool,
    expire_after: Option<Duration>,
}

impl IndexOptions {
    /// Index on a single field path.
    pub fn new(field_name: &str) -> IndexOptions {
        IndexOptions {
            field_names: vec![field_name.to_string()],
            unique: false,
            sparse: false,
            expire_after: None,
        }
    }

    /// Index on several field paths.
    pub fn compound(field_names: &[&str]) -> IndexOptions {
        IndexOptions {
            field_names: field_names.iter().map(|f| f.to_string()).collect(),
            unique: false,
            sparse: false,
            expire_after: None,
        }
    }

    pub fn unique(mut self, unique: bool) -> IndexOptions {
        self.unique = unique;
        self
    }

    pub fn sparse(mut self, sparse: bool) -> IndexOptions {
        self.sparse = sparse;
        self
    }

    /// Documents whose indexed Date is older than `now - ttl` expire.
    pub fn expire_after(mut self, ttl: Duration) -> IndexOptions {
        self.expire_after = Some(ttl);
        self
    }

    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_sparse(&self) -> bool {
        self.sparse
    }

    pub fn is_compound(&self) -> bool {
        self.field_names.len() > 1
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.expire_after
    }

    /// Canonical, order independent index name.
    pub fn name(&self) -> String {
        canonical_index_name(&self.field_names)
    }

    pub fn validate(&self) -> LodeResult<()> {
        if self.field_names.is_empty() || self.field_names.iter().any(|f| f.is_empty()) {
            log::error!("Cannot create an index without a fieldName");
            return Err(LodeError::new(
                "Cannot create an index without a fieldName",
                ErrorKind::InvalidIndexSpec,
            ));
        }

        for field in self.field_names.iter() {
            if field.contains(INDEX_NAME_SEPARATOR) {
                log::error!("Cannot use comma in index fieldName: {}", field);
                return Err(LodeError::new(
                    &format!("Cannot use comma in index fieldName: {}", field),
                    ErrorKind::InvalidIndexSpec,
                ));
            }
            if field.starts_with(OPERATOR_PREFIX) {
                log::error!("Index fieldName cannot start with $: {}", field);
                return Err(LodeError::new(
                    &format!("Index fieldName cannot start with $: {}", field),
                    ErrorKind::InvalidIndexSpec,
                ));
            }
        }

        if self.field_names.iter().duplicates().next().is_some() {
            log::error!("Compound index {:?} repeats a field", self.field_names);
            return Err(LodeError::new(
                &format!("Compound index {:?} repeats a field", self.field_names),
                ErrorKind::InvalidIndexSpec,
            ));
        }

        if self.is_compound() && self.expire_after.is_some() {
            log::error!("A compound index cannot expire documents");
            return Err(LodeError::new(
                "A compound index cannot expire documents",
                ErrorKind::InvalidIndexSpec,
            ));
        }
        Ok(())
    }

    /// Metadata document stored in index-created log markers.
    pub(crate) fn to_document(&self) -> Document {
        let mut doc = Document::new();
        if self.is_compound() {
            doc.put(INDEX_FIELD_NAME, Value::from_vec(self.field_names.clone()));
        } else {
            doc.put(INDEX_FIELD_NAME, self.field_names[0].clone());
        }
        doc.put(INDEX_UNIQUE, self.unique);
        doc.put(INDEX_SPARSE, self.sparse);
        if let Some(ttl) = self.expire_after {
            doc.put(INDEX_EXPIRE_AFTER, ttl.as_secs_f64());
        }
        doc
    }

    pub(crate) fn from_document(doc: &Document) -> LodeResult<IndexOptions> {
        let field_names = match doc.get(INDEX_FIELD_NAME) {
            Some(Value::String(name)) => vec![name.clone()],
            Some(Value::Array(names)) => names
                .iter()
                .map(|n| n.as_str().map(|s| s.to_string()))
                .collect::<Option<Vec<String>>>()
                .ok_or_else(|| invalid_metadata(doc))?,
            _ => return Err(invalid_metadata(doc)),
        };

        let flag = |key: &str| doc.get(key).map(|v| v.is_truthy()).unwrap_or(false);
        let expire_after = match doc.get(INDEX_EXPIRE_AFTER) {
            None | Some(Value::Null) => None,
            Some(value) => {
                let seconds = value.as_f64().ok_or_else(|| invalid_metadata(doc))?;
                Some(Duration::try_from_secs_f64(seconds).map_err(|_| invalid_metadata(doc))?)
            }
        };

        let options = IndexOptions {
            field_names,
            unique: flag(INDEX_UNIQUE),
            sparse: flag(INDEX_SPARSE),
            expire_after,
        };
        options.validate()?;
        Ok(options)
    }
}

fn invalid_metadata(doc: &Document) -> LodeError {
    log::error!("Invalid index metadata {}", doc);
    LodeError::new(
        &format!("Invalid index metadata {}", doc),
        ErrorKind::InvalidIndexSpec,
    )
}

/// Sorted field paths joined with `,`.
pub fn canonical_index_name<S: AsRef<str>>(field_names: &[S]) -> String {
    field_names
        .iter()
        .map(|f| f.as_ref())
        .sorted()
        .join(&INDEX_NAME_SEPARATOR.to_string())
}

/// Options of the built-in `_id` index.
pub(crate) fn id_index() -> IndexOptions {
    IndexOptions::new(DOC_ID).unique(true)
}

pub fn unique_index(field_name: &str) -> IndexOptions {
    IndexOptions::new(field_name).unique(true)
}

pub fn non_unique_index(field_name: &str) -> IndexOptions {
    IndexOptions::new(field_name)
}

pub fn ttl_index(field_name: &str, ttl: Duration) -> IndexOptions {
    IndexOptions::new(field_name).expire_after(ttl)
}
