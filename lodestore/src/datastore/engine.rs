use crate::common::{
    compare_values, now_utc, uid, LodeEventBus, StringComparator, Value, CREATED_AT, DOC_ID,
    GENERATED_ID_LENGTH, INDEX_NAME_SEPARATOR, UPDATED_AT,
};
use crate::datastore::{
    DatastoreEvent, DatastoreEventListener, FindPlan, RemoveOptions, UpdateOptions, UpdateResult,
};
use crate::datastore_config::DatastoreConfig;
use crate::document::Document;
use crate::errors::{ErrorKind, LodeError, LodeResult};
use crate::filter::{matches, Query};
use crate::index::{canonical_index_name, IndexOptions, IndexRegistry, KeyBounds};
use crate::store::{LogRecord, Persistence};
use crate::update::UpdateSpec;
use chrono::{DateTime, TimeDelta, Utc};
use indexmap::IndexMap;
use std::collections::HashMap;

pub(crate) type DatastoreEventBus = LodeEventBus<DatastoreEvent, DatastoreEventListener>;

/// The state of a datastore, owned by its worker thread.
///
/// Documents live in one arena keyed by `_id`; indexes only hold `_id`s. Every write
/// changes the indexes first, then appends to the datafile, then touches the arena, and
/// undoes the index changes when a later step fails.
pub(crate) struct Engine {
    config: DatastoreConfig,
    comparator: Option<StringComparator>,
    documents: HashMap<Value, Document>,
    indexes: IndexRegistry,
    persistence: Persistence,
    event_bus: DatastoreEventBus,
    expired: Vec<Value>,
}

impl Engine {
    pub(crate) fn new(config: DatastoreConfig, event_bus: DatastoreEventBus) -> Engine {
        let comparator = config.compare_strings();
        Engine {
            persistence: Persistence::new(&config),
            indexes: IndexRegistry::new(comparator.clone()),
            documents: HashMap::new(),
            comparator,
            config,
            event_bus,
            expired: Vec::new(),
        }
    }

    /// Replaces the in-memory state with the content of the datafile, then compacts it.
    ///
    /// Fails with [ErrorKind::LoadFailure] and keeps the previous state if the datafile
    /// cannot be read or its documents violate an index.
    pub(crate) fn load(&mut self) -> LodeResult<()> {
        self.expired.clear();
        if self.persistence.is_in_memory() {
            self.documents.clear();
            self.indexes.reset();
            self.publish(DatastoreEvent::Loaded);
            return Ok(());
        }

        let records = self
            .persistence
            .read_records()
            .map_err(|e| load_failure("Failed to read the datafile", e))?;

        let mut documents: IndexMap<Value, Document> = IndexMap::new();
        let mut definitions: IndexMap<String, IndexOptions> = self
            .indexes
            .definitions()
            .into_iter()
            .map(|options| (options.name(), options))
            .collect();
        for record in records {
            match record {
                LogRecord::Document(doc) => {
                    if let Some(id) = doc.id().cloned() {
                        documents.insert(id, doc);
                    }
                }
                LogRecord::Deleted(id) => {
                    documents.shift_remove(&id);
                }
                LogRecord::IndexCreated(options) if options.name() != DOC_ID => {
                    definitions.insert(options.name(), options);
                }
                LogRecord::IndexCreated(_) => {}
                LogRecord::IndexRemoved(name) => {
                    definitions.shift_remove(&name);
                }
            }
        }

        let mut indexes = IndexRegistry::new(self.comparator.clone());
        for options in definitions.into_values() {
            indexes.add(options);
        }
        {
            let docs: Vec<&Document> = documents.values().collect();
            indexes
                .insert_many(&docs)
                .map_err(|e| load_failure("Datafile violates an index constraint", e))?;
        }

        let previous_documents =
            std::mem::replace(&mut self.documents, documents.into_iter().collect());
        let previous_indexes = std::mem::replace(&mut self.indexes, indexes);
        if let Err(e) = self.compact() {
            self.documents = previous_documents;
            self.indexes = previous_indexes;
            return Err(load_failure(
                "Failed to compact the datafile after loading",
                e,
            ));
        }
        log::debug!(
            "Loaded {} documents and {} indexes",
            self.documents.len(),
            self.indexes.definitions().len()
        );
        self.publish(DatastoreEvent::Loaded);
        Ok(())
    }

    /// Validates, copies and stores `docs` as one atomic batch.
    pub(crate) fn insert(&mut self, docs: Vec<Document>) -> LodeResult<Vec<Document>> {
        let mut prepared = Vec::with_capacity(docs.len());
        for doc in docs.iter() {
            prepared.push(self.prepare_for_insertion(doc)?);
        }
        if prepared.is_empty() {
            return Ok(Vec::new());
        }

        let refs: Vec<&Document> = prepared.iter().collect();
        self.indexes.insert_many(&refs)?;

        let records: Vec<LogRecord> = prepared.iter().cloned().map(LogRecord::Document).collect();
        if let Err(e) = self.persistence.persist_new_state(&records) {
            self.indexes.remove_many(&refs);
            return Err(e);
        }

        let inserted = prepared.iter().map(Document::deep_copy).collect();
        for doc in prepared {
            if let Some(id) = doc.id().cloned() {
                self.documents.insert(id, doc);
            }
        }
        Ok(inserted)
    }

    pub(crate) fn find(&mut self, query: &Query, plan: &FindPlan) -> LodeResult<Vec<Document>> {
        let ids = self.get_candidates(query);
        let matched: Vec<&Document> = ids
            .iter()
            .filter_map(|id| self.documents.get(id))
            .filter(|doc| matches(query, doc))
            .collect();
        plan.execute(matched, self.comparator.as_ref())
    }

    pub(crate) fn count(&mut self, query: &Query) -> LodeResult<usize> {
        let ids = self.get_candidates(query);
        Ok(ids
            .iter()
            .filter_map(|id| self.documents.get(id))
            .filter(|doc| matches(query, doc))
            .count())
    }

    pub(crate) fn update(
        &mut self,
        query: &Query,
        update: &UpdateSpec,
        options: UpdateOptions,
    ) -> LodeResult<UpdateResult> {
        let targets = self.matching_ids(query, options.is_multi());
        if targets.is_empty() {
            if options.is_upsert() {
                return self.upsert(query, update, options);
            }
            let affected = options.is_return_updated_docs().then(Vec::new);
            return Ok(UpdateResult::new(0, affected, false));
        }

        let now = Value::from(now_utc());
        let mut updated = Vec::with_capacity(targets.len());
        for id in targets.iter() {
            if let Some(original) = self.documents.get(id) {
                updated.push(self.updated_version(original, update, &now)?);
            }
        }

        {
            let pairs: Vec<(&Document, &Document)> = targets
                .iter()
                .zip(updated.iter())
                .filter_map(|(id, new)| self.documents.get(id).map(|old| (old, new)))
                .collect();
            self.indexes.update_many(&pairs)?;

            let records: Vec<LogRecord> =
                updated.iter().cloned().map(LogRecord::Document).collect();
            if let Err(e) = self.persistence.persist_new_state(&records) {
                let reverted: Vec<(&Document, &Document)> =
                    pairs.iter().map(|(old, new)| (*new, *old)).collect();
                if let Err(revert) = self.indexes.update_many(&reverted) {
                    log::error!("Failed to revert indexes after a failed update: {}", revert);
                }
                return Err(e);
            }
        }

        let affected = options
            .is_return_updated_docs()
            .then(|| updated.iter().map(Document::deep_copy).collect());
        let num_affected = updated.len();
        for doc in updated {
            if let Some(id) = doc.id().cloned() {
                self.documents.insert(id, doc);
            }
        }
        Ok(UpdateResult::new(num_affected, affected, false))
    }

    pub(crate) fn remove(&mut self, query: &Query, options: RemoveOptions) -> LodeResult<usize> {
        let targets = self.matching_ids(query, options.is_multi());
        self.remove_documents(&targets)
    }

    /// Removes the documents among `ids` that are still present and still expired.
    pub(crate) fn remove_expired(&mut self, mut ids: Vec<Value>) -> LodeResult<usize> {
        let thresholds = self.expiry_thresholds();
        ids.sort_by(|a, b| compare_values(a, b, self.comparator.as_ref()));
        ids.dedup();
        let expired: Vec<Value> = ids
            .into_iter()
            .filter(|id| {
                self.documents
                    .get(id)
                    .is_some_and(|doc| is_expired(doc, &thresholds))
            })
            .collect();
        let removed = self.remove_documents(&expired)?;
        if removed > 0 {
            log::debug!("Removed {} expired documents", removed);
        }
        Ok(removed)
    }

    /// Expired `_id`s found by reads since the last call.
    pub(crate) fn take_expired(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.expired)
    }

    pub(crate) fn ensure_index(&mut self, options: IndexOptions) -> LodeResult<()> {
        options.validate()?;
        let name = options.name();
        if self.indexes.contains(&name) {
            return Ok(());
        }

        {
            let docs: Vec<&Document> = self.documents.values().collect();
            self.indexes.build(options.clone(), &docs)?;
        }
        if let Err(e) = self
            .persistence
            .persist_new_state(&[LogRecord::IndexCreated(options)])
        {
            let _ = self.indexes.remove_index(&name);
            return Err(e);
        }
        log::debug!("Created index {}", name);
        Ok(())
    }

    /// Removes the index named `name`; fields may be listed in any order.
    pub(crate) fn remove_index(&mut self, name: &str) -> LodeResult<()> {
        let fields: Vec<&str> = name.split(INDEX_NAME_SEPARATOR).map(str::trim).collect();
        let name = canonical_index_name(&fields);
        if name == DOC_ID || !self.indexes.contains(&name) {
            return self.indexes.remove_index(&name);
        }

        self.persistence
            .persist_new_state(&[LogRecord::IndexRemoved(name.clone())])?;
        self.indexes.remove_index(&name)?;
        log::debug!("Removed index {}", name);
        Ok(())
    }

    /// Rewrites the datafile with one line per live document and index.
    pub(crate) fn compact(&mut self) -> LodeResult<()> {
        let thresholds = self.expiry_thresholds();
        if !thresholds.is_empty() {
            let expired: Vec<Value> = self
                .documents
                .iter()
                .filter(|(_, doc)| is_expired(doc, &thresholds))
                .map(|(id, _)| id.clone())
                .collect();
            self.remove_documents(&expired)?;
        }

        if !self.persistence.is_in_memory() {
            let mut records: Vec<LogRecord> = self
                .indexes
                .all_ids()
                .iter()
                .filter_map(|id| self.documents.get(id))
                .map(|doc| LogRecord::Document(doc.clone()))
                .collect();
            records.extend(
                self.indexes
                    .definitions()
                    .into_iter()
                    .map(LogRecord::IndexCreated),
            );
            self.persistence.compact(&records)?;
        }
        self.publish(DatastoreEvent::CompactionDone);
        Ok(())
    }

    /// Forgets every document and secondary index and deletes the datafile.
    pub(crate) fn drop_database(&mut self) -> LodeResult<()> {
        self.documents.clear();
        self.indexes = IndexRegistry::new(self.comparator.clone());
        self.expired.clear();
        self.persistence.drop_file()?;
        log::debug!("Dropped datastore");
        Ok(())
    }

    pub(crate) fn all_documents(&mut self) -> Vec<Document> {
        let ids = self.get_candidates(&Query::All);
        ids.iter()
            .filter_map(|id| self.documents.get(id))
            .map(Document::deep_copy)
            .collect()
    }

    pub(crate) fn list_indexes(&self) -> Vec<IndexOptions> {
        self.indexes.iter().map(|index| index.options().clone()).collect()
    }

    /// `_id`s of the live documents possibly matching `query`, in `_id` order.
    ///
    /// The result is a superset of the matches. Expired documents are left out and queued
    /// for removal.
    fn get_candidates(&mut self, query: &Query) -> Vec<Value> {
        let mut ids = self.candidate_ids(query);
        ids.sort_by(|a, b| compare_values(a, b, self.comparator.as_ref()));
        ids.dedup();

        let thresholds = self.expiry_thresholds();
        if thresholds.is_empty() {
            return ids;
        }
        let mut live = Vec::with_capacity(ids.len());
        for id in ids {
            match self.documents.get(&id) {
                Some(doc) if is_expired(doc, &thresholds) => self.expired.push(id),
                _ => live.push(id),
            }
        }
        live
    }

    fn candidate_ids(&self, query: &Query) -> Vec<Value> {
        let equalities: HashMap<&str, &Value> = query.equality_clauses().into_iter().collect();
        if !equalities.is_empty() {
            for index in self.indexes.iter() {
                let options = index.options();
                if !options.is_compound() || index.holds_arrays() {
                    continue;
                }
                let fields = options.field_names();
                if fields.iter().all(|f| equalities.contains_key(f.as_str())) {
                    let key: Vec<Option<Value>> = fields
                        .iter()
                        .map(|f| equalities.get(f.as_str()).map(|v| (*v).clone()))
                        .collect();
                    return index.get_matching_key(&key);
                }
            }
            for index in self.indexes.iter() {
                let options = index.options();
                if options.is_compound() {
                    continue;
                }
                if let Some(value) = equalities.get(options.field_names()[0].as_str()) {
                    return index.get_matching(value);
                }
            }
        }

        for (path, values) in query.in_clauses() {
            if let Some(index) = self.single_field_index(path) {
                return index.get_matching_any(values);
            }
        }

        for (path, bounds) in query.range_clauses() {
            // a custom string order may disagree with the matcher's
            if self.comparator.is_some() && has_string_bound(&bounds) {
                continue;
            }
            if let Some(index) = self.single_field_index(path) {
                return index.get_between_bounds(&bounds);
            }
        }

        self.indexes.all_ids()
    }

    fn single_field_index(&self, path: &str) -> Option<&crate::index::Index> {
        self.indexes
            .get(path)
            .filter(|index| !index.options().is_compound())
    }

    fn matching_ids(&mut self, query: &Query, multi: bool) -> Vec<Value> {
        let mut targets = Vec::new();
        for id in self.get_candidates(query) {
            if self.documents.get(&id).is_some_and(|doc| matches(query, doc)) {
                targets.push(id);
                if !multi {
                    break;
                }
            }
        }
        targets
    }

    fn remove_documents(&mut self, ids: &[Value]) -> LodeResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let records: Vec<LogRecord> = ids.iter().cloned().map(LogRecord::Deleted).collect();
        self.persistence.persist_new_state(&records)?;

        let removed: Vec<Document> = ids
            .iter()
            .filter_map(|id| self.documents.remove(id))
            .collect();
        let refs: Vec<&Document> = removed.iter().collect();
        self.indexes.remove_many(&refs);
        Ok(removed.len())
    }

    fn upsert(
        &mut self,
        query: &Query,
        update: &UpdateSpec,
        options: UpdateOptions,
    ) -> LodeResult<UpdateResult> {
        let doc = match update {
            UpdateSpec::Replace(replacement) => replacement.clone(),
            UpdateSpec::Modify(_) => update.apply(&query.upsert_base())?,
        };
        let inserted = self.insert(vec![doc])?;
        let affected = options.is_return_updated_docs().then_some(inserted);
        Ok(UpdateResult::new(1, affected, true))
    }

    fn prepare_for_insertion(&self, doc: &Document) -> LodeResult<Document> {
        doc.validate_keys()?;
        let mut prepared = doc.deep_copy();
        match prepared.id() {
            None => prepared.put_first(DOC_ID, self.create_new_id()),
            Some(id) if id.is_string() || id.is_number() => {}
            Some(id) => {
                log::error!("{} must be a string or a number, found {}", DOC_ID, id.type_name());
                return Err(LodeError::new(
                    &format!("{} must be a string or a number, found {}", DOC_ID, id.type_name()),
                    ErrorKind::DocumentValidation,
                ));
            }
        }

        if self.config.timestamp_data() {
            let now = Value::from(now_utc());
            if !prepared.contains_key(CREATED_AT) {
                prepared.put(CREATED_AT, now.clone());
            }
            if !prepared.contains_key(UPDATED_AT) {
                prepared.put(UPDATED_AT, now);
            }
        }
        Ok(prepared)
    }

    fn updated_version(
        &self,
        original: &Document,
        update: &UpdateSpec,
        now: &Value,
    ) -> LodeResult<Document> {
        let mut updated = update.apply(original)?;
        if self.config.timestamp_data() {
            let touches_created = update.touches(CREATED_AT);
            if !touches_created {
                if let Some(created) = original.get(CREATED_AT) {
                    updated.put(CREATED_AT, created.clone());
                }
            }
            let supplied = touches_created || update.touches(UPDATED_AT);
            if !supplied || !updated.contains_key(UPDATED_AT) {
                updated.put(UPDATED_AT, now.clone());
            }
        }
        Ok(updated)
    }

    fn create_new_id(&self) -> Value {
        loop {
            let id = Value::from(uid(GENERATED_ID_LENGTH));
            if !self.documents.contains_key(&id) {
                return id;
            }
        }
    }

    // (field, oldest date still alive) per TTL index
    fn expiry_thresholds(&self) -> Vec<(String, DateTime<Utc>)> {
        let now = Utc::now();
        self.indexes
            .ttl_indexes()
            .into_iter()
            .filter_map(|(field, ttl)| {
                let ttl = TimeDelta::from_std(ttl).ok()?;
                now.checked_sub_signed(ttl).map(|threshold| (field, threshold))
            })
            .collect()
    }

    fn publish(&self, event: DatastoreEvent) {
        if let Err(e) = self.event_bus.publish(event) {
            log::warn!("Datastore event listener failed on {:?}: {}", event, e);
        }
    }
}

fn is_expired(doc: &Document, thresholds: &[(String, DateTime<Utc>)]) -> bool {
    thresholds.iter().any(|(field, threshold)| {
        matches!(doc.get_path(field), Some(Value::Date(date)) if date < *threshold)
    })
}

fn has_string_bound(bounds: &KeyBounds) -> bool {
    [&bounds.lower, &bounds.upper]
        .iter()
        .any(|bound| matches!(bound, Some((Value::String(_), _))))
}

fn load_failure(message: &str, cause: LodeError) -> LodeError {
    log::error!("{}: {}", message, cause);
    LodeError::new_with_cause(message, ErrorKind::LoadFailure, cause)
}
