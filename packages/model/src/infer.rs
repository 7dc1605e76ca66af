//! Structural schema inference.
//!
//! Used whenever a composite value shows up without a declared field schema
//! (legacy JSON blobs, untyped fields, value keys missing from a schema).
//! Encoder, decoder and normalization all go through these functions, so the
//! mapping must stay total and deterministic:
//!
//! | value   | kind          |
//! |---------|---------------|
//! | text    | `text`        |
//! | number  | `number`      |
//! | boolean | `boolean`     |
//! | list    | `object-list` |
//! | object  | `object`      |

use crate::property::{FieldMap, FieldSchema, FieldValue, ValueKind};
use std::collections::HashSet;

/// Kind implied by the shape of a value
pub fn infer_kind(value: &FieldValue) -> ValueKind {
    match value {
        FieldValue::Text(_) => ValueKind::Text,
        FieldValue::Number(_) => ValueKind::Number,
        FieldValue::Boolean(_) => ValueKind::Boolean,
        FieldValue::Object(map) => ValueKind::Object {
            fields: infer_object_fields(map),
        },
        FieldValue::List(items) => ValueKind::ObjectList {
            fields: infer_fields(items),
        },
    }
}

/// Field schema of a single value map, in key order
pub fn infer_object_fields(map: &FieldMap) -> Vec<FieldSchema> {
    map.iter()
        .map(|(id, value)| FieldSchema::new(id.clone(), id.clone(), infer_kind(value)))
        .collect()
}

/// Field schema covering every item of a list.
///
/// Fields appear in first-seen order; the first occurrence of a key decides
/// its kind.
pub fn infer_fields(items: &[FieldMap]) -> Vec<FieldSchema> {
    undeclared_fields(&[], items)
}

/// Inferred schema entries for keys present in `maps` but absent from `fields`
pub fn undeclared_fields<'a>(
    fields: &[FieldSchema],
    maps: impl IntoIterator<Item = &'a FieldMap>,
) -> Vec<FieldSchema> {
    let mut seen: HashSet<&str> = fields.iter().map(|f| f.id.as_str()).collect();
    let mut extra = Vec::new();

    for map in maps {
        for (id, value) in map {
            if seen.insert(id.as_str()) {
                extra.push(FieldSchema::new(id.clone(), id.clone(), infer_kind(value)));
            }
        }
    }

    extra
}

/// Total conversion from a JSON value.
///
/// `null` becomes empty text; list elements that are not objects are wrapped
/// as `{ "value": element }` so every list stays a list of value maps.
pub fn from_json(value: serde_json::Value) -> FieldValue {
    use serde_json::Value;

    match value {
        Value::Null => FieldValue::Text(String::new()),
        Value::Bool(b) => FieldValue::Boolean(b),
        Value::Number(n) => match n.as_f64() {
            Some(f) => FieldValue::Number(f),
            None => FieldValue::Text(n.to_string()),
        },
        Value::String(s) => FieldValue::Text(s),
        Value::Array(elements) => FieldValue::List(
            elements
                .into_iter()
                .map(|element| match element {
                    Value::Object(object) => object_to_map(object),
                    other => {
                        let mut map = FieldMap::new();
                        map.insert("value".to_string(), from_json(other));
                        map
                    }
                })
                .collect(),
        ),
        Value::Object(object) => FieldValue::Object(object_to_map(object)),
    }
}

fn object_to_map(object: serde_json::Map<String, serde_json::Value>) -> FieldMap {
    object
        .into_iter()
        .map(|(key, value)| (key, from_json(value)))
        .collect()
}
