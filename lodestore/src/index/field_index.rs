use crate::common::{compare_values, StringComparator, Value, DOC_ID};
use crate::document::Document;
use crate::errors::{ErrorKind, LodeError, LodeResult};
use crate::index::{IndexKey, IndexOptions};
use indexmap::IndexSet;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

/// Range bounds for [Index::get_between_bounds]. Each bound is a value and whether it is
/// inclusive.
#[derive(Debug, Clone, Default)]
pub struct KeyBounds {
    pub lower: Option<(Value, bool)>,
    pub upper: Option<(Value, bool)>,
}

impl KeyBounds {
    pub fn is_unbounded(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }
}

/// A sorted index over one or more field paths.
///
/// The tree maps each [IndexKey] to the `_id`s of the documents holding it; the documents
/// themselves live in the datastore arena. Arrays in a single-field index are indexed once
/// per distinct element.
pub struct Index {
    options: IndexOptions,
    tree: BTreeMap<IndexKey, BTreeSet<Value>>,
    comparator: Option<StringComparator>,
    // compound keys with an array part
    array_keys: usize,
}

impl Index {
    pub fn new(options: IndexOptions, comparator: Option<StringComparator>) -> Index {
        Index {
            options,
            tree: BTreeMap::new(),
            comparator,
            array_keys: 0,
        }
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    pub fn name(&self) -> String {
        self.options.name()
    }

    /// Number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.tree.len()
    }

    pub fn reset(&mut self) {
        self.tree.clear();
        self.array_keys = 0;
    }

    /// Whether some compound key holds an array. Such keys only match an equality lookup
    /// on the whole array, not on its elements.
    pub fn holds_arrays(&self) -> bool {
        self.array_keys > 0
    }

    /// Indexes `doc`. On a uniqueness violation nothing of `doc` stays in the index.
    pub fn insert(&mut self, doc: &Document) -> LodeResult<()> {
        let id = document_id(doc)?;
        let keys = self.keys_for(doc);

        let mut inserted: Vec<IndexKey> = Vec::with_capacity(keys.len());
        for key in keys {
            if let Err(e) = self.insert_key(key.clone(), &id) {
                for done in inserted.iter() {
                    self.remove_key(done, &id);
                }
                return Err(e);
            }
            inserted.push(key);
        }
        Ok(())
    }

    /// Indexes every document of the batch or none of them.
    pub fn insert_many(&mut self, docs: &[&Document]) -> LodeResult<()> {
        for (position, doc) in docs.iter().enumerate() {
            if let Err(e) = self.insert(doc) {
                for done in docs[..position].iter() {
                    self.remove(done);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Withdraws every key `doc` contributed.
    pub fn remove(&mut self, doc: &Document) {
        let Ok(id) = document_id(doc) else {
            return;
        };
        for key in self.keys_for(doc) {
            self.remove_key(&key, &id);
        }
    }

    pub fn remove_many(&mut self, docs: &[&Document]) {
        for doc in docs {
            self.remove(doc);
        }
    }

    /// Replaces `old` with `new`; on failure `old` is indexed again.
    pub fn update(&mut self, old: &Document, new: &Document) -> LodeResult<()> {
        self.remove(old);
        if let Err(e) = self.insert(new) {
            self.restore(old);
            return Err(e);
        }
        Ok(())
    }

    /// Replaces every `old` with its `new` as one unit.
    ///
    /// All old versions are withdrawn before any new one is inserted, so documents may
    /// trade unique values among themselves.
    pub fn update_many(&mut self, pairs: &[(&Document, &Document)]) -> LodeResult<()> {
        for (old, _) in pairs {
            self.remove(old);
        }

        for (position, (_, new)) in pairs.iter().enumerate() {
            if let Err(e) = self.insert(new) {
                for (_, done) in pairs[..position].iter() {
                    self.remove(done);
                }
                for (old, _) in pairs {
                    self.restore(old);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Undoes a successful [Index::update_many] with the same pairs.
    pub fn revert_update_many(&mut self, pairs: &[(&Document, &Document)]) {
        let swapped: Vec<(&Document, &Document)> = pairs.iter().map(|(o, n)| (*n, *o)).collect();
        if let Err(e) = self.update_many(&swapped) {
            log::warn!("Failed to revert index '{}': {}", self.name(), e);
        }
    }

    /// `_id`s of the documents whose key equals `value`. An array value unions the matches
    /// of its elements.
    pub fn get_matching(&self, value: &Value) -> Vec<Value> {
        match value {
            Value::Array(values) => self.get_matching_any(values),
            _ => self.ids_for(&self.key(Some(value.clone()))),
        }
    }

    /// `_id`s of the documents holding the compound key made of `values`, given in the
    /// declaration order of the index fields.
    pub fn get_matching_key(&self, values: &[Option<Value>]) -> Vec<Value> {
        let parts: SmallVec<[Option<Value>; 2]> = values.iter().cloned().collect();
        self.ids_for(&IndexKey::new(parts, self.comparator.clone()))
    }

    /// Union of the matches of every value, without duplicates.
    pub fn get_matching_any(&self, values: &[Value]) -> Vec<Value> {
        let mut ids = IndexSet::new();
        for value in values {
            let key = self.key(Some(value.clone()));
            if let Some(set) = self.tree.get(&key) {
                ids.extend(set.iter().cloned());
            }
        }
        ids.into_iter().collect()
    }

    /// `_id`s of the documents whose key lies within `bounds`, in key order.
    pub fn get_between_bounds(&self, bounds: &KeyBounds) -> Vec<Value> {
        if let (Some((low, low_inclusive)), Some((high, high_inclusive))) =
            (&bounds.lower, &bounds.upper)
        {
            match compare_values(low, high, self.comparator.as_ref()) {
                Ordering::Greater => return Vec::new(),
                Ordering::Equal if !(*low_inclusive && *high_inclusive) => return Vec::new(),
                _ => {}
            }
        }

        let to_bound = |bound: &Option<(Value, bool)>| match bound {
            Some((value, true)) => Bound::Included(self.key(Some(value.clone()))),
            Some((value, false)) => Bound::Excluded(self.key(Some(value.clone()))),
            None => Bound::Unbounded,
        };

        let mut ids = IndexSet::new();
        for (_, set) in self.tree.range((to_bound(&bounds.lower), to_bound(&bounds.upper))) {
            ids.extend(set.iter().cloned());
        }
        ids.into_iter().collect()
    }

    /// Every indexed `_id` in key order, without duplicates.
    pub fn get_all(&self) -> Vec<Value> {
        let mut ids = IndexSet::new();
        for set in self.tree.values() {
            ids.extend(set.iter().cloned());
        }
        ids.into_iter().collect()
    }

    fn key(&self, value: Option<Value>) -> IndexKey {
        IndexKey::single(value, self.comparator.clone())
    }

    fn keys_for(&self, doc: &Document) -> Vec<IndexKey> {
        if self.options.is_compound() {
            let parts: SmallVec<[Option<Value>; 2]> = self
                .options
                .field_names()
                .iter()
                .map(|field| doc.get_path(field))
                .collect();
            if self.options.is_sparse() && parts.iter().any(|p| p.is_none()) {
                return Vec::new();
            }
            return vec![IndexKey::new(parts, self.comparator.clone())];
        }

        match doc.get_path(&self.options.field_names()[0]) {
            None if self.options.is_sparse() => Vec::new(),
            None => vec![self.key(None)],
            Some(Value::Array(mut values)) => {
                values.sort_by(|a, b| compare_values(a, b, self.comparator.as_ref()));
                values.dedup_by(|a, b| {
                    compare_values(a, b, self.comparator.as_ref()) == Ordering::Equal
                });
                values.into_iter().map(|v| self.key(Some(v))).collect()
            }
            Some(value) => vec![self.key(Some(value))],
        }
    }

    fn insert_key(&mut self, key: IndexKey, id: &Value) -> LodeResult<()> {
        if self.options.is_unique() {
            if let Some(existing) = self.tree.get(&key) {
                if existing.iter().any(|other| other != id) {
                    let name = self.name();
                    log::error!("Unique violation on index '{}' for key {}", name, key);
                    return Err(LodeError::unique_violation(&name, &key.to_string()));
                }
            }
        }
        if !self.tree.contains_key(&key) && has_array_part(&key) {
            self.array_keys += 1;
        }
        self.tree.entry(key).or_default().insert(id.clone());
        Ok(())
    }

    fn remove_key(&mut self, key: &IndexKey, id: &Value) {
        if let Some(set) = self.tree.get_mut(key) {
            set.remove(id);
            if set.is_empty() {
                self.tree.remove(key);
                if has_array_part(key) {
                    self.array_keys -= 1;
                }
            }
        }
    }

    fn restore(&mut self, doc: &Document) {
        if let Err(e) = self.insert(doc) {
            log::warn!("Failed to restore document in index '{}': {}", self.name(), e);
        }
    }

    fn ids_for(&self, key: &IndexKey) -> Vec<Value> {
        self.tree
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}

fn has_array_part(key: &IndexKey) -> bool {
    key.parts().len() > 1 && key.parts().iter().any(|p| matches!(p, Some(Value::Array(_))))
}

fn document_id(doc: &Document) -> LodeResult<Value> {
    doc.get(DOC_ID).cloned().ok_or_else(|| {
        log::error!("Cannot index a document without {}", DOC_ID);
        LodeError::new(
            &format!("Cannot index a document without {}", DOC_ID),
            ErrorKind::InternalError,
        )
    })
}
