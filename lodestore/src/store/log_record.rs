use crate::common::{Value, DELETED_TAG, DOC_ID, INDEX_CREATED_TAG, INDEX_REMOVED_TAG};
use crate::document::Document;
use crate::errors::{ErrorKind, LodeError, LodeResult};
use crate::index::IndexOptions;
use crate::store::{deserialize_document, serialize_document};

/// One line of the append-only datafile.
#[derive(Debug, Clone, PartialEq)]
pub enum LogRecord {
    /// The latest full state of a document.
    Document(Document),
    /// Tombstone for the document with this `_id`.
    Deleted(Value),
    IndexCreated(IndexOptions),
    /// Canonical name of a removed index.
    IndexRemoved(String),
}

impl LogRecord {
    pub fn to_line(&self) -> LodeResult<String> {
        let doc = match self {
            LogRecord::Document(doc) => return serialize_document(doc),
            LogRecord::Deleted(id) => {
                let mut doc = Document::new();
                doc.put(DELETED_TAG, true);
                doc.put(DOC_ID, id.clone());
                doc
            }
            LogRecord::IndexCreated(options) => {
                let mut doc = Document::new();
                doc.put(INDEX_CREATED_TAG, options.to_document());
                doc
            }
            LogRecord::IndexRemoved(name) => {
                let mut doc = Document::new();
                doc.put(INDEX_REMOVED_TAG, name.clone());
                doc
            }
        };
        serialize_document(&doc)
    }

    pub fn from_line(line: &str) -> LodeResult<LogRecord> {
        let mut doc = deserialize_document(line)?;

        if doc.get(DELETED_TAG).is_some_and(|v| v.is_truthy()) {
            return match doc.remove(DOC_ID) {
                Some(id) => Ok(LogRecord::Deleted(id)),
                None => Err(malformed(line)),
            };
        }

        if let Some(spec) = doc.get(INDEX_CREATED_TAG) {
            return match spec {
                Value::Document(spec) => Ok(LogRecord::IndexCreated(IndexOptions::from_document(spec)?)),
                _ => Err(malformed(line)),
            };
        }

        if let Some(name) = doc.get(INDEX_REMOVED_TAG) {
            return match name {
                Value::String(name) => Ok(LogRecord::IndexRemoved(name.clone())),
                _ => Err(malformed(line)),
            };
        }

        if doc.id().is_none() {
            return Err(malformed(line));
        }
        Ok(LogRecord::Document(doc))
    }
}

fn malformed(line: &str) -> LodeError {
    log::error!("Malformed log record: {}", line);
    LodeError::new(
        &format!("Malformed log record: {}", line),
        ErrorKind::EncodingError,
    )
}
