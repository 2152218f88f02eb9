use crate::common::{compare_values, now_utc, Value, OPERATOR_PREFIX};
use crate::document::Document;
use crate::errors::{ErrorKind, LodeError, LodeResult};
use crate::filter::{matches_element, ElementQuery};
use std::cmp::Ordering;

const MODIFIERS: [&str; 11] = [
    "$set",
    "$unset",
    "$inc",
    "$push",
    "$addToSet",
    "$pop",
    "$pull",
    "$min",
    "$max",
    "$rename",
    "$currentDate",
];

/// A single update modifier applied to one field path.
#[derive(Debug, Clone)]
pub enum Modifier {
    Set { path: String, value: Value },
    Unset { path: String },
    Inc { path: String, amount: Value },
    /// Appends `values`, then keeps the first (positive) or last (negative) `slice`
    /// elements.
    Push {
        path: String,
        values: Vec<Value>,
        slice: Option<i64>,
    },
    AddToSet { path: String, values: Vec<Value> },
    /// Removes the last element when `from_end`, the first one otherwise.
    Pop { path: String, from_end: Option<bool> },
    Pull { path: String, element: ElementQuery },
    Min { path: String, value: Value },
    Max { path: String, value: Value },
    Rename { path: String, to: String },
    CurrentDate { path: String },
}

impl Modifier {
    /// Parses one top-level modifier (`$set`, `$inc`, ...) into per-field modifiers.
    pub(crate) fn parse(name: &str, arg: &Value) -> LodeResult<Vec<Modifier>> {
        if !MODIFIERS.contains(&name) {
            return Err(bad_update(&format!("Unknown modifier {}", name)));
        }
        let Value::Document(fields) = arg else {
            return Err(bad_update(&format!(
                "Modifier {}'s argument must be an object",
                name
            )));
        };

        let mut modifiers = Vec::with_capacity(fields.size());
        for (path, value) in fields.iter() {
            let path = path.clone();
            let modifier = match name {
                "$set" => Modifier::Set {
                    path,
                    value: value.clone(),
                },
                "$unset" => Modifier::Unset { path },
                "$inc" => {
                    if !value.is_number() {
                        return Err(bad_update(&format!("{} must be a number", value)));
                    }
                    Modifier::Inc {
                        path,
                        amount: value.clone(),
                    }
                }
                "$push" => parse_push(path, value)?,
                "$addToSet" => Modifier::AddToSet {
                    path,
                    values: parse_add_to_set(value)?,
                },
                "$pop" => {
                    let Some(n) = value.as_f64() else {
                        return Err(bad_update(&format!(
                            "{} isn't an integer, can't use it with $pop",
                            value
                        )));
                    };
                    let from_end = match n.partial_cmp(&0.0) {
                        Some(Ordering::Greater) => Some(true),
                        Some(Ordering::Less) => Some(false),
                        _ => None,
                    };
                    Modifier::Pop { path, from_end }
                }
                "$pull" => Modifier::Pull {
                    path,
                    element: ElementQuery::parse(value)?,
                },
                "$min" => Modifier::Min {
                    path,
                    value: value.clone(),
                },
                "$max" => Modifier::Max {
                    path,
                    value: value.clone(),
                },
                "$rename" => match value {
                    Value::String(to) if !to.is_empty() && to != &path => Modifier::Rename {
                        path,
                        to: to.clone(),
                    },
                    _ => {
                        return Err(bad_update(&format!(
                            "$rename target for {} must be a different field name",
                            path
                        )))
                    }
                },
                "$currentDate" => {
                    let accepted = match value {
                        Value::Bool(true) => true,
                        Value::Document(spec) => {
                            matches!(spec.get("$type").and_then(|t| t.as_str()), Some("date"))
                        }
                        _ => false,
                    };
                    if !accepted {
                        return Err(bad_update(&format!(
                            "$currentDate for {} must be true or {{\"$type\": \"date\"}}",
                            path
                        )));
                    }
                    Modifier::CurrentDate { path }
                }
                _ => return Err(bad_update(&format!("Unknown modifier {}", name))),
            };
            modifiers.push(modifier);
        }
        Ok(modifiers)
    }

    /// The field path this modifier writes, and for `$rename` the path it writes to.
    pub fn paths(&self) -> Vec<&str> {
        match self {
            Modifier::Rename { path, to } => vec![path.as_str(), to.as_str()],
            Modifier::Set { path, .. }
            | Modifier::Unset { path }
            | Modifier::Inc { path, .. }
            | Modifier::Push { path, .. }
            | Modifier::AddToSet { path, .. }
            | Modifier::Pop { path, .. }
            | Modifier::Pull { path, .. }
            | Modifier::Min { path, .. }
            | Modifier::Max { path, .. }
            | Modifier::CurrentDate { path } => vec![path.as_str()],
        }
    }

    /// Applies the modifier to `doc` in place.
    pub(crate) fn apply(&self, doc: &mut Document) -> LodeResult<()> {
        match self {
            Modifier::Set { path, value } => doc.set_path(path, value.clone()),
            Modifier::Unset { path } => {
                doc.unset_path(path);
                Ok(())
            }
            Modifier::Inc { path, amount } => {
                let next = match doc.get_path(path) {
                    None => amount.clone(),
                    Some(current) if current.is_number() => add_numbers(&current, amount),
                    Some(_) => {
                        return Err(bad_update(&format!(
                            "Don't use the $inc modifier on non-number field {}",
                            path
                        )))
                    }
                };
                doc.set_path(path, next)
            }
            Modifier::Push {
                path,
                values,
                slice,
            } => {
                let mut array = existing_array(doc, path, "$push")?;
                array.extend(values.iter().cloned());
                if let Some(slice) = slice {
                    array = apply_slice(array, *slice);
                }
                doc.set_path(path, Value::Array(array))
            }
            Modifier::AddToSet { path, values } => {
                let mut array = existing_array(doc, path, "$addToSet")?;
                for value in values {
                    if !array.contains(value) {
                        array.push(value.clone());
                    }
                }
                doc.set_path(path, Value::Array(array))
            }
            Modifier::Pop { path, from_end } => {
                let Some(Value::Array(mut array)) = doc.get_path(path) else {
                    return Err(bad_update(&format!(
                        "Can't $pop an element from non-array field {}",
                        path
                    )));
                };
                match from_end {
                    Some(true) => {
                        array.pop();
                    }
                    Some(false) if !array.is_empty() => {
                        array.remove(0);
                    }
                    _ => {}
                }
                doc.set_path(path, Value::Array(array))
            }
            Modifier::Pull { path, element } => {
                let Some(Value::Array(mut array)) = doc.get_path(path) else {
                    return Err(bad_update(&format!(
                        "Can't $pull an element from non-array field {}",
                        path
                    )));
                };
                array.retain(|value| !matches_element(element, value));
                doc.set_path(path, Value::Array(array))
            }
            Modifier::Min { path, value } => {
                replace_if(doc, path, value, Ordering::Less)
            }
            Modifier::Max { path, value } => {
                replace_if(doc, path, value, Ordering::Greater)
            }
            Modifier::Rename { path, to } => {
                if let Some(value) = doc.get_path(path) {
                    doc.unset_path(path);
                    doc.set_path(to, value)?;
                }
                Ok(())
            }
            Modifier::CurrentDate { path } => doc.set_path(path, Value::Date(now_utc())),
        }
    }
}

fn parse_push(path: String, value: &Value) -> LodeResult<Modifier> {
    let Value::Document(spec) = value else {
        return Ok(Modifier::Push {
            path,
            values: vec![value.clone()],
            slice: None,
        });
    };
    if !spec.keys().any(|k| k.starts_with(OPERATOR_PREFIX)) {
        return Ok(Modifier::Push {
            path,
            values: vec![value.clone()],
            slice: None,
        });
    }

    if spec.keys().any(|k| k != "$each" && k != "$slice") {
        return Err(bad_update("Can only use $slice in conjunction with $each when $push to array"));
    }
    let values = match spec.get("$each") {
        Some(Value::Array(values)) => values.clone(),
        Some(_) => return Err(bad_update("$each requires an array value")),
        None => return Err(bad_update("$slice requires $each when used with $push")),
    };
    let slice = match spec.get("$slice") {
        None => None,
        Some(Value::I64(n)) => Some(*n),
        Some(other) => {
            return Err(bad_update(&format!(
                "$slice requires an integer, got {}",
                other
            )))
        }
    };
    Ok(Modifier::Push {
        path,
        values,
        slice,
    })
}

fn parse_add_to_set(value: &Value) -> LodeResult<Vec<Value>> {
    match value {
        Value::Document(spec) if spec.keys().any(|k| k.starts_with(OPERATOR_PREFIX)) => {
            if spec.size() != 1 {
                return Err(bad_update("Can't use another field in conjunction with $each"));
            }
            match spec.get("$each") {
                Some(Value::Array(values)) => Ok(values.clone()),
                _ => Err(bad_update("$each requires an array value")),
            }
        }
        _ => Ok(vec![value.clone()]),
    }
}

fn existing_array(doc: &Document, path: &str, modifier: &str) -> LodeResult<Vec<Value>> {
    match doc.get_path(path) {
        None => Ok(Vec::new()),
        Some(Value::Array(values)) => Ok(values),
        Some(_) => Err(bad_update(&format!(
            "Can't {} an element on non-array field {}",
            modifier, path
        ))),
    }
}

fn apply_slice(array: Vec<Value>, slice: i64) -> Vec<Value> {
    let len = array.len();
    let keep = slice.unsigned_abs() as usize;
    if slice >= 0 {
        array.into_iter().take(keep).collect()
    } else {
        array.into_iter().skip(len.saturating_sub(keep)).collect()
    }
}

fn add_numbers(current: &Value, amount: &Value) -> Value {
    match (current, amount) {
        (Value::I64(a), Value::I64(b)) => match a.checked_add(*b) {
            Some(sum) => Value::I64(sum),
            None => Value::F64(*a as f64 + *b as f64),
        },
        _ => Value::F64(current.as_f64().unwrap_or(0.0) + amount.as_f64().unwrap_or(0.0)),
    }
}

fn replace_if(doc: &mut Document, path: &str, value: &Value, wanted: Ordering) -> LodeResult<()> {
    let replace = match doc.get_path(path) {
        None => true,
        Some(current) => compare_values(value, &current, None) == wanted,
    };
    if replace {
        doc.set_path(path, value.clone())?;
    }
    Ok(())
}

pub(crate) fn bad_update(message: &str) -> LodeError {
    log::error!("{}", message);
    LodeError::new(message, ErrorKind::BadUpdate)
}
