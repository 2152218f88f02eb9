use crate::common::Value;
use crate::document::Document;
use crate::errors::LodeResult;
use crate::filter::{Condition, ElementQuery, FieldOperator, Query};
use regex::Regex;
use std::sync::Arc;

/// Creates a fluent query builder for the field at `path`.
///
/// ```rust
/// use lodestore::doc;
/// use lodestore::filter::{field, matches};
///
/// let query = field("age").gt(30).and(field("status").eq("active"));
/// assert!(matches(&query, &doc! { age: 31, status: "active" }));
/// ```
pub fn field(path: &str) -> FluentQuery {
    FluentQuery {
        path: path.to_string(),
    }
}

/// Matches every document.
pub fn all() -> Query {
    Query::All
}

pub fn and(queries: Vec<Query>) -> Query {
    Query::And(queries)
}

pub fn or(queries: Vec<Query>) -> Query {
    Query::Or(queries)
}

pub fn not(query: Query) -> Query {
    Query::Not(Box::new(query))
}

/// A query evaluated by an arbitrary predicate.
pub fn where_fn<F>(predicate: F) -> Query
where
    F: Fn(&Document) -> bool + Send + Sync + 'static,
{
    Query::Where(Arc::new(predicate))
}

/// Builder for a condition on one field.
pub struct FluentQuery {
    path: String,
}

impl FluentQuery {
    pub fn eq<T: Into<Value>>(self, value: T) -> Query {
        self.condition(Condition::Equals(value.into()))
    }

    pub fn ne<T: Into<Value>>(self, value: T) -> Query {
        self.operator(FieldOperator::Ne(value.into()))
    }

    pub fn gt<T: Into<Value>>(self, value: T) -> Query {
        self.operator(FieldOperator::Gt(value.into()))
    }

    pub fn gte<T: Into<Value>>(self, value: T) -> Query {
        self.operator(FieldOperator::Gte(value.into()))
    }

    pub fn lt<T: Into<Value>>(self, value: T) -> Query {
        self.operator(FieldOperator::Lt(value.into()))
    }

    pub fn lte<T: Into<Value>>(self, value: T) -> Query {
        self.operator(FieldOperator::Lte(value.into()))
    }

    /// Both bounds inclusive.
    pub fn between<T: Into<Value>>(self, lower: T, upper: T) -> Query {
        self.condition(Condition::Operators(vec![
            FieldOperator::Gte(lower.into()),
            FieldOperator::Lte(upper.into()),
        ]))
    }

    pub fn in_array<T: Into<Value>>(self, values: Vec<T>) -> Query {
        self.operator(FieldOperator::In(values.into_iter().map(Into::into).collect()))
    }

    pub fn not_in_array<T: Into<Value>>(self, values: Vec<T>) -> Query {
        self.operator(FieldOperator::Nin(values.into_iter().map(Into::into).collect()))
    }

    pub fn exists(self, exists: bool) -> Query {
        self.operator(FieldOperator::Exists(exists))
    }

    /// Fails if `pattern` is not a valid regular expression.
    pub fn regex(self, pattern: &str) -> LodeResult<Query> {
        let regex = Regex::new(pattern)?;
        Ok(self.operator(FieldOperator::Regex(regex)))
    }

    pub fn size(self, size: usize) -> Query {
        self.operator(FieldOperator::Size(size))
    }

    /// Some element of the array field, a document, matches `query`.
    pub fn elem_match(self, query: Query) -> Query {
        self.operator(FieldOperator::ElemMatch(Box::new(ElementQuery::Document(query))))
    }

    fn operator(self, operator: FieldOperator) -> Query {
        self.condition(Condition::Operators(vec![operator]))
    }

    fn condition(self, condition: Condition) -> Query {
        Query::Field {
            path: self.path,
            condition,
        }
    }
}
