//! Flat id → value projection consumed by the live-preview renderer.

use crate::graph::Graph;
use crate::property::{FieldMap, FieldValue, ValueKind};
use std::collections::BTreeMap;

/// Flatten every leaf property value across all nodes into one namespace.
///
/// - scalar properties map `id → value`
/// - object properties contribute each leaf field under its field id,
///   recursively
/// - object-list properties map `id → list of items`
///
/// Later nodes win when two entries share an id.
pub fn flatten(graph: &Graph) -> BTreeMap<String, FieldValue> {
    let mut flat = BTreeMap::new();

    for node in &graph.nodes {
        for property in &node.properties {
            match (&property.kind, &property.value) {
                (ValueKind::Object { .. }, FieldValue::Object(map)) => {
                    flatten_object(map, &node.id, &mut flat);
                }
                _ => insert(&mut flat, &property.id, property.value.clone(), &node.id),
            }
        }
    }

    flat
}

fn flatten_object(map: &FieldMap, node_id: &str, flat: &mut BTreeMap<String, FieldValue>) {
    for (id, value) in map {
        match value {
            FieldValue::Object(inner) => flatten_object(inner, node_id, flat),
            other => insert(flat, id, other.clone(), node_id),
        }
    }
}

fn insert(flat: &mut BTreeMap<String, FieldValue>, id: &str, value: FieldValue, node_id: &str) {
    if flat.insert(id.to_string(), value).is_some() {
        tracing::debug!(id, node_id, "flat projection id collision, later node wins");
    }
}
