use crate::common::Value;
use crate::document::Document;
use crate::errors::{ErrorKind, LodeError, LodeResult};

/// How many `null` slots a positional write may add past the end of an array.
const MAX_ARRAY_PADDING: usize = 1024;

fn array_index(part: &str) -> Option<usize> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse::<usize>().ok()
}

/// Resolves the remaining path `parts` below `value`.
///
/// On arrays a numeric segment selects an element, any other segment is applied to every
/// element; elements where the path does not exist are left out of the result.
pub fn get_dot_value(value: &Value, parts: &[&str]) -> Option<Value> {
    let Some((first, rest)) = parts.split_first() else {
        return Some(value.clone());
    };

    match value {
        Value::Document(doc) => doc.get(first).and_then(|v| get_dot_value(v, rest)),
        Value::Array(values) => match array_index(first) {
            Some(index) => values.get(index).and_then(|v| get_dot_value(v, rest)),
            None => Some(Value::Array(
                values
                    .iter()
                    .filter_map(|element| get_dot_value(element, parts))
                    .collect(),
            )),
        },
        _ => None,
    }
}

pub(crate) fn set_dot_value(doc: &mut Document, parts: &[&str], value: Value) -> LodeResult<()> {
    let Some((first, rest)) = parts.split_first() else {
        return Err(empty_path());
    };

    if rest.is_empty() {
        doc.put(*first, value);
        return Ok(());
    }

    if !doc.contains_key(first) || doc.get(first).is_some_and(|v| v.is_null()) {
        doc.put(*first, Document::new());
    }

    match doc.get_mut(first) {
        Some(child) => set_in_value(child, first, rest, value),
        None => Err(empty_path()),
    }
}

fn set_in_value(target: &mut Value, name: &str, parts: &[&str], value: Value) -> LodeResult<()> {
    match target {
        Value::Document(doc) => set_dot_value(doc, parts, value),
        Value::Array(values) => {
            let Some((first, rest)) = parts.split_first() else {
                return Err(empty_path());
            };
            let Some(index) = array_index(first) else {
                return Err(not_traversable(name, "array", first));
            };
            if index >= values.len() {
                let new_len = index
                    .checked_add(1)
                    .filter(|len| len - values.len() <= MAX_ARRAY_PADDING)
                    .ok_or_else(|| out_of_range(name, index, values.len()))?;
                values.resize(new_len, Value::Null);
            }
            if rest.is_empty() {
                values[index] = value;
                return Ok(());
            }
            if values[index].is_null() {
                values[index] = Value::Document(Document::new());
            }
            set_in_value(&mut values[index], first, rest, value)
        }
        other => Err(not_traversable(name, other.type_name(), parts[0])),
    }
}

pub(crate) fn unset_dot_value(doc: &mut Document, parts: &[&str]) -> bool {
    let Some((first, rest)) = parts.split_first() else {
        return false;
    };

    if rest.is_empty() {
        return doc.remove(first).is_some();
    }

    match doc.get_mut(first) {
        Some(child) => unset_in_value(child, rest),
        None => false,
    }
}

fn unset_in_value(target: &mut Value, parts: &[&str]) -> bool {
    match target {
        Value::Document(doc) => unset_dot_value(doc, parts),
        Value::Array(values) => {
            let Some((first, rest)) = parts.split_first() else {
                return false;
            };
            match (array_index(first), rest.is_empty()) {
                // keep positions stable, like an unset array slot
                (Some(index), true) if index < values.len() => {
                    values[index] = Value::Null;
                    true
                }
                (Some(index), false) => match values.get_mut(index) {
                    Some(element) => unset_in_value(element, rest),
                    None => false,
                },
                _ => false,
            }
        }
        _ => false,
    }
}

fn empty_path() -> LodeError {
    log::error!("Field path cannot be empty");
    LodeError::new("Field path cannot be empty", ErrorKind::BadUpdate)
}

fn not_traversable(name: &str, type_name: &str, part: &str) -> LodeError {
    log::error!("Cannot create field '{}' in {} '{}'", part, type_name, name);
    LodeError::new(
        &format!("Cannot create field '{}' in {} '{}'", part, type_name, name),
        ErrorKind::BadUpdate,
    )
}

fn out_of_range(name: &str, index: usize, len: usize) -> LodeError {
    log::error!("Position {} is too far past the end of array '{}' ({} elements)", index, name, len);
    LodeError::new(
        &format!(
            "Position {} is too far past the end of array '{}' ({} elements)",
            index, name, len
        ),
        ErrorKind::BadUpdate,
    )
}
