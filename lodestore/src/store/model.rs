use crate::common::{date_from_millis, Value, DATE_TAG};
use crate::document::Document;
use crate::errors::{ErrorKind, LodeError, LodeResult};

/// Serializes a document into one line of the datafile.
pub fn serialize_document(doc: &Document) -> LodeResult<String> {
    Ok(serde_json::to_string(doc)?)
}

/// Parses one line of the datafile back into a document.
pub fn deserialize_document(line: &str) -> LodeResult<Document> {
    let json: serde_json::Value = serde_json::from_str(line)?;
    match from_json(json)? {
        Value::Document(doc) => Ok(doc),
        other => {
            log::error!("Expected a document but found {}", other.type_name());
            Err(LodeError::new(
                &format!("Expected a document but found {}", other.type_name()),
                ErrorKind::EncodingError,
            ))
        }
    }
}

/// Converts parsed json into a [Value], restoring dates from their `{"$$date": ms}` form.
pub(crate) fn from_json(json: serde_json::Value) -> LodeResult<Value> {
    let value = match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::I64(i),
            None => Value::F64(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(values) => Value::Array(
            values
                .into_iter()
                .map(from_json)
                .collect::<LodeResult<Vec<_>>>()?,
        ),
        serde_json::Value::Object(map) => {
            if map.len() == 1 {
                if let Some(millis) = map.get(DATE_TAG).and_then(|m| m.as_f64()) {
                    return Ok(Value::Date(date_from_millis(millis as i64)?));
                }
            }
            let mut doc = Document::new();
            for (key, value) in map {
                doc.put(key, from_json(value)?);
            }
            Value::Document(doc)
        }
    };
    Ok(value)
}
