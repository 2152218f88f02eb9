use crate::common::{StringComparator, Value, DOC_ID};
use crate::document::Document;
use crate::errors::{ErrorKind, LodeError, LodeResult};
use crate::index::{id_index, Index, IndexOptions};
use indexmap::IndexMap;
use std::time::Duration;

/// The set of indexes of a datastore, keyed by canonical name.
///
/// The `_id` index is always present and always first. Every mutation is applied to all
/// indexes or, if one of them rejects it, to none.
pub struct IndexRegistry {
    indexes: IndexMap<String, Index>,
    comparator: Option<StringComparator>,
}

impl IndexRegistry {
    pub fn new(comparator: Option<StringComparator>) -> IndexRegistry {
        let mut indexes = IndexMap::new();
        let id = Index::new(id_index(), comparator.clone());
        indexes.insert(DOC_ID.to_string(), id);
        IndexRegistry {
            indexes,
            comparator,
        }
    }

    pub fn id_index(&self) -> Option<&Index> {
        self.indexes.get(DOC_ID)
    }

    pub fn get(&self, name: &str) -> Option<&Index> {
        self.indexes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.indexes.contains_key(name)
    }

    /// Indexes in registry order, `_id` first.
    pub fn iter(&self) -> impl Iterator<Item = &Index> {
        self.indexes.values()
    }

    /// Definitions of the secondary indexes, `_id` excluded.
    pub fn definitions(&self) -> Vec<IndexOptions> {
        self.indexes
            .iter()
            .filter(|(name, _)| name.as_str() != DOC_ID)
            .map(|(_, index)| index.options().clone())
            .collect()
    }

    /// Single-field indexes with a time to live.
    pub fn ttl_indexes(&self) -> Vec<(String, Duration)> {
        self.indexes
            .values()
            .filter_map(|index| {
                index
                    .options()
                    .ttl()
                    .map(|ttl| (index.options().field_names()[0].clone(), ttl))
            })
            .collect()
    }

    /// Registers an empty index. An index with the same name is replaced.
    pub(crate) fn add(&mut self, options: IndexOptions) {
        let index = Index::new(options, self.comparator.clone());
        self.indexes.insert(index.name(), index);
    }

    /// Builds a new index over `docs` and registers it. Nothing changes if a document
    /// violates the index constraints.
    pub(crate) fn build(&mut self, options: IndexOptions, docs: &[&Document]) -> LodeResult<()> {
        let mut index = Index::new(options, self.comparator.clone());
        index.insert_many(docs)?;
        self.indexes.insert(index.name(), index);
        Ok(())
    }

    pub(crate) fn remove_index(&mut self, name: &str) -> LodeResult<()> {
        if name == DOC_ID {
            log::error!("Cannot remove the {} index", DOC_ID);
            return Err(LodeError::new(
                &format!("Cannot remove the {} index", DOC_ID),
                ErrorKind::InvalidIndexSpec,
            ));
        }

        match self.indexes.shift_remove(name) {
            Some(_) => Ok(()),
            None => {
                log::error!("Index {} does not exist", name);
                Err(LodeError::new(
                    &format!("Index {} does not exist", name),
                    ErrorKind::IndexNotFound,
                ))
            }
        }
    }

    pub(crate) fn insert_many(&mut self, docs: &[&Document]) -> LodeResult<()> {
        for position in 0..self.indexes.len() {
            if let Some((_, index)) = self.indexes.get_index_mut(position) {
                if let Err(e) = index.insert_many(docs) {
                    self.rollback(position, |index| index.remove_many(docs));
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn remove_many(&mut self, docs: &[&Document]) {
        for index in self.indexes.values_mut() {
            index.remove_many(docs);
        }
    }

    pub(crate) fn update_many(&mut self, pairs: &[(&Document, &Document)]) -> LodeResult<()> {
        for position in 0..self.indexes.len() {
            if let Some((_, index)) = self.indexes.get_index_mut(position) {
                if let Err(e) = index.update_many(pairs) {
                    self.rollback(position, |index| index.revert_update_many(pairs));
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Every document `_id` in `_id` order.
    pub fn all_ids(&self) -> Vec<Value> {
        self.id_index().map(|index| index.get_all()).unwrap_or_default()
    }

    pub(crate) fn reset(&mut self) {
        for index in self.indexes.values_mut() {
            index.reset();
        }
    }

    // undoes the first `count` indexes
    fn rollback<F>(&mut self, count: usize, undo: F)
    where
        F: Fn(&mut Index),
    {
        for position in 0..count {
            if let Some((_, index)) = self.indexes.get_index_mut(position) {
                undo(index);
            }
        }
    }
}
