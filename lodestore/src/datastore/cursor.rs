use crate::common::{compare_optional, SortOrder, StringComparator, Value};
use crate::datastore::{Datastore, Pending};
use crate::document::Document;
use crate::errors::{ErrorKind, LodeError, LodeResult};
use crate::filter::{Projection, Query};
use icu_collator::options::CollatorOptions;
use icu_collator::{Collator, CollatorBorrowed, CollatorPreferences};
use std::cmp::Ordering;

/// A deferred query.
///
/// Building a cursor does nothing; [Cursor::exec] enqueues the query on the datastore and
/// runs the pipeline filter, sort, skip, limit, projection over the documents matching at
/// that point of the queue. The first invalid argument given to any builder method is
/// kept and returned by `exec`.
///
/// # Examples
///
/// ```rust
/// use lodestore::datastore_builder::DatastoreBuilder;
/// use lodestore::common::SortOrder;
/// use lodestore::doc;
///
/// let db = DatastoreBuilder::default().in_memory().open().unwrap();
/// db.insert_many(vec![doc! { n: 3 }, doc! { n: 1 }, doc! { n: 2 }]).unwrap();
///
/// let docs = db
///     .find(doc! {})
///     .sort_by("n", SortOrder::Descending)
///     .skip(1)
///     .projection(doc! { n: 1, _id: 0 })
///     .exec()
///     .unwrap();
/// assert_eq!(docs, vec![doc! { n: 2 }, doc! { n: 1 }]);
/// ```
pub struct Cursor {
    datastore: Datastore,
    query: Query,
    plan: FindPlan,
    error: Option<LodeError>,
}

impl Cursor {
    pub(crate) fn new(datastore: Datastore, query: LodeResult<Query>) -> Cursor {
        let (query, error) = match query {
            Ok(query) => (query, None),
            Err(e) => (Query::All, Some(e)),
        };
        Cursor {
            datastore,
            query,
            plan: FindPlan::default(),
            error,
        }
    }

    /// Sorts by the fields of `sort`, in order; `1` ascending, `-1` descending.
    pub fn sort(mut self, sort: Document) -> Self {
        for (field, direction) in sort.iter() {
            match direction {
                Value::I64(_) | Value::F64(_) => {
                    let sign = direction.as_f64().unwrap_or(1.0);
                    let order = SortOrder::from_sign(if sign < 0.0 { -1 } else { 1 });
                    self.plan.sort.push((field.clone(), order));
                }
                other => {
                    let error = LodeError::new(
                        &format!(
                            "Sort direction of {} must be 1 or -1, found {}",
                            field,
                            other.type_name()
                        ),
                        ErrorKind::BadQuery,
                    );
                    self.capture(error);
                }
            }
        }
        self
    }

    pub fn sort_by(mut self, field: &str, order: SortOrder) -> Self {
        self.plan.sort.push((field.to_string(), order));
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.plan.skip = skip;
        self
    }

    /// Returns at most `limit` documents. A limit of `0` means no limit.
    pub fn limit(mut self, limit: usize) -> Self {
        self.plan.limit = (limit > 0).then_some(limit);
        self
    }

    /// Keeps (`1`) or drops (`0`) the listed fields of every result.
    pub fn projection(mut self, projection: Document) -> Self {
        match Projection::parse(&projection) {
            Ok(projection) => self.plan.projection = Some(projection),
            Err(e) => self.capture(e),
        }
        self
    }

    /// Compares strings of the sort fields with an ICU collator instead of the datastore's
    /// string ordering.
    pub fn collation(mut self, preferences: CollatorPreferences, options: CollatorOptions) -> Self {
        self.plan.collation = Some((preferences, options));
        self
    }

    pub fn exec(self) -> LodeResult<Vec<Document>> {
        self.exec_async().wait()
    }

    pub fn exec_async(self) -> Pending<Vec<Document>> {
        if let Some(error) = self.error {
            return Pending::ready(Err(error));
        }
        self.datastore.find_with_plan(self.query, self.plan)
    }

    fn capture(&mut self, error: LodeError) {
        log::error!("{}", error);
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

/// The part of a cursor evaluated after matching.
#[derive(Clone, Default)]
pub(crate) struct FindPlan {
    sort: Vec<(String, SortOrder)>,
    skip: usize,
    limit: Option<usize>,
    projection: Option<Projection>,
    collation: Option<(CollatorPreferences, CollatorOptions)>,
}

impl FindPlan {
    pub(crate) fn single() -> FindPlan {
        FindPlan {
            limit: Some(1),
            ..FindPlan::default()
        }
    }

    pub(crate) fn with_projection(mut self, projection: Option<Projection>) -> FindPlan {
        self.projection = projection;
        self
    }

    /// Sorts, pages and projects `matched`, returning independent copies.
    pub(crate) fn execute(
        &self,
        mut matched: Vec<&Document>,
        comparator: Option<&StringComparator>,
    ) -> LodeResult<Vec<Document>> {
        if !self.sort.is_empty() {
            let collator = match &self.collation {
                Some((preferences, options)) => Some(create_collator(preferences.clone(), *options)?),
                None => None,
            };
            matched.sort_by(|a, b| self.compare(a, b, collator.as_ref(), comparator));
        }

        let limit = self.limit.unwrap_or(usize::MAX);
        matched
            .into_iter()
            .skip(self.skip)
            .take(limit)
            .map(|doc| match &self.projection {
                Some(projection) => projection.apply(doc),
                None => Ok(doc.deep_copy()),
            })
            .collect()
    }

    fn compare(
        &self,
        a: &Document,
        b: &Document,
        collator: Option<&CollatorBorrowed>,
        comparator: Option<&StringComparator>,
    ) -> Ordering {
        for (field, order) in self.sort.iter() {
            let a_value = a.get_path(field);
            let b_value = b.get_path(field);
            let ordering = match (&a_value, &b_value, collator) {
                (Some(Value::String(x)), Some(Value::String(y)), Some(collator)) => {
                    collator.compare(x, y)
                }
                _ => compare_optional(a_value.as_ref(), b_value.as_ref(), comparator),
            };
            if ordering != Ordering::Equal {
                return order.apply(ordering);
            }
        }
        Ordering::Equal
    }
}

fn create_collator(
    preferences: CollatorPreferences,
    options: CollatorOptions,
) -> LodeResult<CollatorBorrowed<'static>> {
    Collator::try_new(preferences, options).map_err(|e| {
        log::error!("Failed to create collator: {}", e);
        LodeError::new(
            &format!("Failed to create collator: {}", e),
            ErrorKind::InvalidConfiguration,
        )
    })
}
