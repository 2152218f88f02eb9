use crate::common::{compare_values, Value};
use crate::document::Document;
use crate::filter::{Condition, ElementQuery, FieldOperator, Query};
use std::cmp::Ordering;

/// Evaluates `query` against `doc`.
pub fn matches(query: &Query, doc: &Document) -> bool {
    match query {
        Query::All => true,
        Query::And(queries) => queries.iter().all(|q| matches(q, doc)),
        Query::Or(queries) => queries.iter().any(|q| matches(q, doc)),
        Query::Not(query) => !matches(query, doc),
        Query::Where(predicate) => predicate(doc),
        Query::Field { path, condition } => {
            let value = doc.get_path(path);
            matches_condition(value.as_ref(), condition)
        }
    }
}

fn matches_condition(value: Option<&Value>, condition: &Condition) -> bool {
    match condition {
        Condition::Equals(expected) => match value {
            Some(Value::Array(elements)) if !expected.is_array() => {
                elements.iter().any(|element| element == expected)
            }
            Some(actual) => actual == expected,
            None => false,
        },
        Condition::Operators(operators) => match value {
            Some(Value::Array(elements)) => {
                let (whole, per_element): (Vec<&FieldOperator>, Vec<&FieldOperator>) =
                    operators.iter().partition(|op| op.applies_to_whole_array());

                whole.iter().all(|op| apply_operator(op, value))
                    && (per_element.is_empty()
                        || elements
                            .iter()
                            .any(|element| per_element.iter().all(|op| apply_operator(op, Some(element)))))
            }
            _ => operators.iter().all(|op| apply_operator(op, value)),
        },
    }
}

fn apply_operator(operator: &FieldOperator, value: Option<&Value>) -> bool {
    match operator {
        FieldOperator::Lt(bound) => compare_comparable(value, bound).is_some_and(|o| o.is_lt()),
        FieldOperator::Lte(bound) => compare_comparable(value, bound).is_some_and(|o| o.is_le()),
        FieldOperator::Gt(bound) => compare_comparable(value, bound).is_some_and(|o| o.is_gt()),
        FieldOperator::Gte(bound) => compare_comparable(value, bound).is_some_and(|o| o.is_ge()),
        FieldOperator::Ne(other) => value != Some(other),
        FieldOperator::In(candidates) => value.is_some_and(|v| candidates.contains(v)),
        FieldOperator::Nin(candidates) => !value.is_some_and(|v| candidates.contains(v)),
        FieldOperator::Exists(exists) => value.is_some() == *exists,
        FieldOperator::Regex(regex) => value
            .and_then(|v| v.as_str())
            .is_some_and(|s| regex.is_match(s)),
        FieldOperator::Size(size) => value
            .and_then(|v| v.as_array())
            .is_some_and(|elements| elements.len() == *size),
        FieldOperator::ElemMatch(element_query) => value
            .and_then(|v| v.as_array())
            .is_some_and(|elements| {
                elements
                    .iter()
                    .any(|element| matches_element(element_query, element))
            }),
    }
}

/// Evaluates an `$elemMatch` style query against one array element.
pub(crate) fn matches_element(element_query: &ElementQuery, element: &Value) -> bool {
    match element_query {
        ElementQuery::Document(query) => element
            .as_document()
            .is_some_and(|doc| matches(query, doc)),
        ElementQuery::Value(condition) => matches_condition(Some(element), condition),
    }
}

/// Ordering of two values for `$lt`-style operators, defined only for two numbers, two
/// strings or two dates.
fn compare_comparable(value: Option<&Value>, bound: &Value) -> Option<Ordering> {
    let value = value?;
    let comparable = (value.is_number() && bound.is_number())
        || (value.is_string() && bound.is_string())
        || (value.is_date() && bound.is_date());
    if comparable {
        Some(compare_values(value, bound, None))
    } else {
        None
    }
}
