use crate::common::{Value, FIELD_SEPARATOR, OPERATOR_PREFIX};
use crate::document::Document;
use crate::errors::{ErrorKind, LodeError, LodeResult};
use crate::index::KeyBounds;
use regex::Regex;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// Arbitrary predicate evaluated against a whole document.
pub type WherePredicate = Arc<dyn Fn(&Document) -> bool + Send + Sync>;

/// A parsed query.
///
/// Queries are either parsed from a query document with [Query::parse] or built with the
/// fluent functions of this module ([field](crate::filter::field), [and](crate::filter::and),
/// ...). They are evaluated with [matches](crate::filter::matches).
#[derive(Clone)]
pub enum Query {
    /// Matches every document.
    All,
    And(Vec<Query>),
    Or(Vec<Query>),
    Not(Box<Query>),
    Where(WherePredicate),
    /// A condition on the value found at a dot path.
    Field { path: String, condition: Condition },
}

/// The condition part of a field query.
#[derive(Clone, Debug)]
pub enum Condition {
    /// Deep equality with the field, or with any element when the field is an array.
    Equals(Value),
    /// Every operator must hold.
    Operators(Vec<FieldOperator>),
}

#[derive(Clone, Debug)]
pub enum FieldOperator {
    Lt(Value),
    Lte(Value),
    Gt(Value),
    Gte(Value),
    Ne(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
    Regex(Regex),
    Size(usize),
    ElemMatch(Box<ElementQuery>),
}

/// Argument of `$elemMatch`: a query for document elements, or operators for primitive
/// elements.
#[derive(Clone, Debug)]
pub enum ElementQuery {
    Document(Query),
    Value(Condition),
}

impl ElementQuery {
    /// Parses the query applied to single array elements: operators for primitive
    /// elements, a query document for document elements, anything else for equality.
    pub(crate) fn parse(value: &Value) -> LodeResult<ElementQuery> {
        match value {
            Value::Document(doc) if is_operator_document(doc) => {
                Ok(ElementQuery::Value(Condition::parse(value)?))
            }
            Value::Document(doc) => Ok(ElementQuery::Document(Query::parse(doc)?)),
            _ => Ok(ElementQuery::Value(Condition::Equals(value.clone()))),
        }
    }
}

impl FieldOperator {
    /// Operators that look at an array field as a whole rather than at its elements.
    pub(crate) fn applies_to_whole_array(&self) -> bool {
        matches!(
            self,
            FieldOperator::Size(_) | FieldOperator::ElemMatch(_) | FieldOperator::Exists(_)
        )
    }

    fn parse(name: &str, arg: &Value) -> LodeResult<FieldOperator> {
        let operator = match name {
            "$lt" => FieldOperator::Lt(arg.clone()),
            "$lte" => FieldOperator::Lte(arg.clone()),
            "$gt" => FieldOperator::Gt(arg.clone()),
            "$gte" => FieldOperator::Gte(arg.clone()),
            "$ne" => FieldOperator::Ne(arg.clone()),
            "$in" => FieldOperator::In(array_argument(name, arg)?),
            "$nin" => FieldOperator::Nin(array_argument(name, arg)?),
            "$exists" => FieldOperator::Exists(arg.is_truthy()),
            "$regex" => match arg {
                Value::String(pattern) => FieldOperator::Regex(Regex::new(pattern)?),
                _ => {
                    return Err(bad_query(&format!(
                        "$regex operator called with non regular expression {}",
                        arg
                    )))
                }
            },
            "$size" => match arg.as_f64() {
                Some(n) if n >= 0.0 && n.fract() == 0.0 => FieldOperator::Size(n as usize),
                _ => {
                    return Err(bad_query(&format!(
                        "$size operator called without an integer {}",
                        arg
                    )))
                }
            },
            "$elemMatch" => match arg {
                Value::Document(_) => FieldOperator::ElemMatch(Box::new(ElementQuery::parse(arg)?)),
                _ => {
                    return Err(bad_query(&format!(
                        "$elemMatch operator called with non document {}",
                        arg
                    )))
                }
            },
            _ => return Err(bad_query(&format!("Unknown comparison function {}", name))),
        };
        Ok(operator)
    }
}

impl Condition {
    fn parse(value: &Value) -> LodeResult<Condition> {
        let Value::Document(doc) = value else {
            return Ok(Condition::Equals(value.clone()));
        };
        if !doc.keys().any(|k| k.starts_with(OPERATOR_PREFIX)) {
            return Ok(Condition::Equals(value.clone()));
        }
        if !doc.keys().all(|k| k.starts_with(OPERATOR_PREFIX)) {
            return Err(bad_query("You cannot mix operators and normal fields"));
        }

        let operators = doc
            .iter()
            .map(|(name, arg)| FieldOperator::parse(name, arg))
            .collect::<LodeResult<Vec<_>>>()?;
        Ok(Condition::Operators(operators))
    }
}

impl Query {
    /// Parses a query document.
    ///
    /// Top-level keys are field paths or the logical operators `$and`, `$or` (arrays of
    /// query documents) and `$not` (a query document). Several keys are combined with a
    /// logical and; an empty document matches everything.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use lodestore::doc;
    /// use lodestore::filter::{matches, Query};
    ///
    /// let query = Query::parse(&doc! {
    ///     "$or": [{ planet: "Earth" }, { age: { "$gt": 40 } }]
    /// }).unwrap();
    /// assert!(matches(&query, &doc! { planet: "Mars", age: 41 }));
    /// ```
    pub fn parse(doc: &Document) -> LodeResult<Query> {
        let mut clauses = Vec::with_capacity(doc.size());
        for (key, value) in doc.iter() {
            clauses.push(parse_clause(key, value)?);
        }

        match clauses.len() {
            0 => Ok(Query::All),
            1 => Ok(clauses.remove(0)),
            _ => Ok(Query::And(clauses)),
        }
    }

    /// Combines with another query so that both must match.
    pub fn and(self, other: Query) -> Query {
        match self {
            Query::And(mut queries) => {
                queries.push(other);
                Query::And(queries)
            }
            query => Query::And(vec![query, other]),
        }
    }

    /// Combines with another query so that either may match.
    pub fn or(self, other: Query) -> Query {
        match self {
            Query::Or(mut queries) => {
                queries.push(other);
                Query::Or(queries)
            }
            query => Query::Or(vec![query, other]),
        }
    }

    pub fn not(self) -> Query {
        Query::Not(Box::new(self))
    }

    /// Field conditions joined at the top level by an implicit or explicit `$and`.
    fn top_level_fields(&self) -> Vec<(&str, &Condition)> {
        match self {
            Query::Field { path, condition } => vec![(path.as_str(), condition)],
            Query::And(queries) => queries
                .iter()
                .filter_map(|q| match q {
                    Query::Field { path, condition } => Some((path.as_str(), condition)),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Top-level `field == primitive` clauses usable for an index lookup.
    pub(crate) fn equality_clauses(&self) -> Vec<(&str, &Value)> {
        self.top_level_fields()
            .into_iter()
            .filter_map(|(path, condition)| match condition {
                Condition::Equals(value) if value.is_primitive() => Some((path, value)),
                _ => None,
            })
            .collect()
    }

    /// Top-level `$in` clauses.
    pub(crate) fn in_clauses(&self) -> Vec<(&str, &[Value])> {
        let mut clauses = Vec::new();
        for (path, condition) in self.top_level_fields() {
            if let Condition::Operators(operators) = condition {
                for operator in operators {
                    if let FieldOperator::In(values) = operator {
                        clauses.push((path, values.as_slice()));
                    }
                }
            }
        }
        clauses
    }

    /// Top-level range clauses, one [KeyBounds] per field.
    pub(crate) fn range_clauses(&self) -> Vec<(&str, KeyBounds)> {
        let mut clauses = Vec::new();
        for (path, condition) in self.top_level_fields() {
            let Condition::Operators(operators) = condition else {
                continue;
            };
            let mut bounds = KeyBounds::default();
            for operator in operators {
                match operator {
                    FieldOperator::Gt(v) => bounds.lower = Some((v.clone(), false)),
                    FieldOperator::Gte(v) => bounds.lower = Some((v.clone(), true)),
                    FieldOperator::Lt(v) => bounds.upper = Some((v.clone(), false)),
                    FieldOperator::Lte(v) => bounds.upper = Some((v.clone(), true)),
                    _ => {}
                }
            }
            if !bounds.is_unbounded() {
                clauses.push((path, bounds));
            }
        }
        clauses
    }

    /// Plain top-level equality fields, the base of a document created by an upsert.
    pub(crate) fn upsert_base(&self) -> Document {
        let mut doc = Document::new();
        for (path, condition) in self.top_level_fields() {
            if let Condition::Equals(value) = condition {
                if !path.contains(FIELD_SEPARATOR) {
                    doc.put(path, value.clone());
                }
            }
        }
        doc
    }
}

fn parse_clause(key: &str, value: &Value) -> LodeResult<Query> {
    if !key.starts_with(OPERATOR_PREFIX) {
        return Ok(Query::Field {
            path: key.to_string(),
            condition: Condition::parse(value)?,
        });
    }

    match key {
        "$and" | "$or" => {
            let Value::Array(items) = value else {
                return Err(bad_query(&format!("{} operator used without an array", key)));
            };
            let mut queries = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Document(doc) => queries.push(Query::parse(doc)?),
                    _ => return Err(bad_query(&format!("{} operator expects query documents", key))),
                }
            }
            if key == "$and" {
                Ok(Query::And(queries))
            } else {
                Ok(Query::Or(queries))
            }
        }
        "$not" => match value {
            Value::Document(doc) => Ok(Query::Not(Box::new(Query::parse(doc)?))),
            _ => Err(bad_query("$not operator expects a query document")),
        },
        "$where" => Err(bad_query(
            "$where cannot be expressed in a query document, use where_fn",
        )),
        _ => Err(bad_query(&format!("Unknown logical operator {}", key))),
    }
}

fn is_operator_document(doc: &Document) -> bool {
    !doc.is_empty()
        && doc
            .keys()
            .all(|k| k.starts_with(OPERATOR_PREFIX) && !matches!(k.as_str(), "$and" | "$or" | "$not"))
}

fn array_argument(name: &str, arg: &Value) -> LodeResult<Vec<Value>> {
    match arg {
        Value::Array(values) => Ok(values.clone()),
        _ => Err(bad_query(&format!("{} operator called with a non-array", name))),
    }
}

fn bad_query(message: &str) -> LodeError {
    log::error!("{}", message);
    LodeError::new(message, ErrorKind::BadQuery)
}

/// Conversion into a [Query], implemented for queries and query documents.
pub trait IntoQuery {
    fn into_query(self) -> LodeResult<Query>;
}

impl IntoQuery for Query {
    fn into_query(self) -> LodeResult<Query> {
        Ok(self)
    }
}

impl IntoQuery for Document {
    fn into_query(self) -> LodeResult<Query> {
        Query::parse(&self)
    }
}

impl IntoQuery for &Document {
    fn into_query(self) -> LodeResult<Query> {
        Query::parse(self)
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let join = |queries: &[Query], separator: &str| {
            queries
                .iter()
                .map(|q| q.to_string())
                .collect::<Vec<_>>()
                .join(separator)
        };

        match self {
            Query::All => write!(f, "All"),
            Query::And(queries) => write!(f, "({})", join(queries, " && ")),
            Query::Or(queries) => write!(f, "({})", join(queries, " || ")),
            Query::Not(query) => write!(f, "!{}", query),
            Query::Where(_) => write!(f, "(where <fn>)"),
            Query::Field { path, condition } => match condition {
                Condition::Equals(value) => write!(f, "({} == {})", path, value),
                Condition::Operators(operators) => {
                    let rendered: Vec<String> = operators
                        .iter()
                        .map(|op| format!("{} {}", path, op))
                        .collect();
                    write!(f, "({})", rendered.join(" && "))
                }
            },
        }
    }
}

impl Debug for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Query{}", self)
    }
}

impl Display for FieldOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldOperator::Lt(v) => write!(f, "< {}", v),
            FieldOperator::Lte(v) => write!(f, "<= {}", v),
            FieldOperator::Gt(v) => write!(f, "> {}", v),
            FieldOperator::Gte(v) => write!(f, ">= {}", v),
            FieldOperator::Ne(v) => write!(f, "!= {}", v),
            FieldOperator::In(values) => write!(f, "in {}", Value::Array(values.clone())),
            FieldOperator::Nin(values) => write!(f, "not in {}", Value::Array(values.clone())),
            FieldOperator::Exists(exists) => write!(f, "exists {}", exists),
            FieldOperator::Regex(regex) => write!(f, "=~ /{}/", regex.as_str()),
            FieldOperator::Size(size) => write!(f, "size {}", size),
            FieldOperator::ElemMatch(element) => match element.as_ref() {
                ElementQuery::Document(query) => write!(f, "elemMatch {}", query),
                ElementQuery::Value(condition) => write!(f, "elemMatch {:?}", condition),
            },
        }
    }
}
