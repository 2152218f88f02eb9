use crate::document::Document;

/// Options controlling an update.
///
/// # Examples
///
/// ```rust
/// use lodestore::datastore::{multi, upsert, UpdateOptions};
///
/// let options = UpdateOptions::default();
/// assert!(!options.is_multi() && !options.is_upsert());
///
/// let options = multi().return_updated_docs(true);
/// assert!(options.is_multi() && options.is_return_updated_docs());
/// assert!(upsert().is_upsert());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    multi: bool,
    upsert: bool,
    return_updated_docs: bool,
}

impl UpdateOptions {
    pub fn new(multi: bool, upsert: bool, return_updated_docs: bool) -> Self {
        UpdateOptions {
            multi,
            upsert,
            return_updated_docs,
        }
    }

    /// Update every match instead of only the first one in `_id` order.
    pub fn multi(mut self, multi: bool) -> Self {
        self.multi = multi;
        self
    }

    /// Insert a document built from the query and the update when nothing matches.
    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    /// Return copies of the updated documents in the [UpdateResult].
    pub fn return_updated_docs(mut self, return_updated_docs: bool) -> Self {
        self.return_updated_docs = return_updated_docs;
        self
    }

    pub fn is_multi(&self) -> bool {
        self.multi
    }

    pub fn is_upsert(&self) -> bool {
        self.upsert
    }

    pub fn is_return_updated_docs(&self) -> bool {
        self.return_updated_docs
    }
}

/// [UpdateOptions] updating every match.
pub fn multi() -> UpdateOptions {
    UpdateOptions::new(true, false, false)
}

/// [UpdateOptions] inserting a document when nothing matches.
pub fn upsert() -> UpdateOptions {
    UpdateOptions::new(false, true, false)
}

/// Options controlling a removal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    multi: bool,
}

impl RemoveOptions {
    pub fn new(multi: bool) -> Self {
        RemoveOptions { multi }
    }

    pub fn is_multi(&self) -> bool {
        self.multi
    }
}

/// [RemoveOptions] removing every match.
pub fn remove_all() -> RemoveOptions {
    RemoveOptions::new(true)
}

/// Outcome of an update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateResult {
    num_affected: usize,
    affected_documents: Option<Vec<Document>>,
    upsert: bool,
}

impl UpdateResult {
    pub(crate) fn new(
        num_affected: usize,
        affected_documents: Option<Vec<Document>>,
        upsert: bool,
    ) -> Self {
        UpdateResult {
            num_affected,
            affected_documents,
            upsert,
        }
    }

    pub fn num_affected(&self) -> usize {
        self.num_affected
    }

    /// Copies of the updated (or upserted) documents, when requested through
    /// [UpdateOptions::return_updated_docs].
    pub fn affected_documents(&self) -> Option<&[Document]> {
        self.affected_documents.as_deref()
    }

    pub fn into_affected_documents(self) -> Option<Vec<Document>> {
        self.affected_documents
    }

    /// Whether the single affected document was inserted by an upsert.
    pub fn is_upsert(&self) -> bool {
        self.upsert
    }
}
