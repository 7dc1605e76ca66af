//! Graph decoder: element tree → `Graph`.

use crate::error::{DecodeError, DecodeResult};
use crate::tree::{self, Element};
use crate::ROOT_ELEMENT;
use blueprint_model::infer::from_json;
use blueprint_model::{
    coerce_scalar, infer_fields, infer_kind, infer_object_fields, Edge, FieldMap, FieldSchema,
    FieldValue, Graph, Node, Position, Property, ValueKind,
};
use std::collections::HashMap;

/// Decode a graph document.
///
/// Fails when the `<graph>` root is absent, a node has no `id`, an edge has
/// no `source`/`target`, or the markup itself is malformed. Edges that point
/// at missing nodes are kept; dropping them is normalization's job.
pub fn decode(source: &str) -> DecodeResult<Graph> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let root = tree::build(source)?.ok_or(DecodeError::MissingRoot)?;
    if root.name != ROOT_ELEMENT {
        return Err(DecodeError::MissingRoot);
    }

    let mut graph = Graph::new();

    if let Some(nodes) = root.child("nodes") {
        for (index, element) in nodes.elements_named("node").enumerate() {
            graph.nodes.push(decode_node(element, index)?);
        }
    }

    if let Some(edges) = root.child("edges") {
        for (index, element) in edges.elements_named("edge").enumerate() {
            graph.edges.push(decode_edge(element, index)?);
        }
    }

    Ok(graph)
}

fn decode_node(element: &Element<'_>, index: usize) -> DecodeResult<Node> {
    let id = element
        .attr("id")
        .filter(|id| !id.is_empty())
        .ok_or(DecodeError::MissingNodeId { index })?;

    let position = Position {
        x: number_attr(element, "x").unwrap_or(0.0),
        y: number_attr(element, "y").unwrap_or(0.0),
        z: number_attr(element, "z").unwrap_or(0.0),
    };

    let properties = element
        .child("props")
        .map(|props| decode_properties(props, id))
        .unwrap_or_default();

    Ok(Node {
        id: id.to_string(),
        title: element.attr("title").unwrap_or_default().to_string(),
        prompt: element
            .child("description")
            .map(|d| d.text())
            .unwrap_or_default(),
        position,
        properties,
        parent: element
            .attr("parent")
            .filter(|p| !p.is_empty())
            .map(str::to_string),
    })
}

/// Properties of one node. A repeated id keeps the position of its first
/// occurrence and the content of its last.
fn decode_properties(props: &Element<'_>, node_id: &str) -> Vec<Property> {
    let mut properties: Vec<Property> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for element in props.elements_named("prop") {
        let Some(id) = element.attr("name").or_else(|| element.attr("id")) else {
            tracing::warn!(node_id, pos = element.pos, "skipping property without a name");
            continue;
        };

        let (kind, value) = decode_slot(element, None);
        let value = value.unwrap_or_else(|| empty_value(&kind));
        let property = Property {
            id: id.to_string(),
            title: element.attr("title").unwrap_or(id).to_string(),
            kind,
            value,
        };

        match positions.get(id) {
            Some(&at) => {
                tracing::warn!(node_id, property_id = id, "duplicate property id, last one wins");
                properties[at] = property;
            }
            None => {
                positions.insert(id.to_string(), properties.len());
                properties.push(property);
            }
        }
    }

    properties
}

fn decode_edge(element: &Element<'_>, index: usize) -> DecodeResult<Edge> {
    let source = element
        .attr("source")
        .filter(|s| !s.is_empty())
        .ok_or(DecodeError::MissingEdgeEndpoint {
            index,
            attribute: "source",
        })?;
    let target = element
        .attr("target")
        .filter(|t| !t.is_empty())
        .ok_or(DecodeError::MissingEdgeEndpoint {
            index,
            attribute: "target",
        })?;

    let id = match element.attr("id").filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => format!("{}->{}", source, target),
    };

    Ok(Edge {
        id,
        source: source.to_string(),
        target: target.to_string(),
        role: element.attr("role").map(str::to_string),
    })
}

/// Decode a `<prop>` or `<field>` element into its kind and value.
///
/// The element's own `type` wins; otherwise `declared` (from an enclosing
/// `<schema>`) is used; otherwise the kind is inferred from the element's
/// shape. `None` means the value is unset.
fn decode_slot(element: &Element<'_>, declared: Option<&ValueKind>) -> (ValueKind, Option<FieldValue>) {
    let unset = element.attr("unset") == Some("true");
    let kind = match element.attr("type") {
        Some(tag) => ValueKind::from_tag(tag),
        None => match declared {
            Some(kind) => kind.clone(),
            None => return decode_untyped(element, unset),
        },
    };

    match kind {
        ValueKind::Object { .. } => decode_object(element, unset),
        ValueKind::ObjectList { .. } => decode_object_list(element, unset),
        ValueKind::Select { .. } => {
            let kind = ValueKind::Select {
                options: decode_options(element),
            };
            let value = (!unset).then(|| FieldValue::Text(choice_text(element)));
            (kind, value)
        }
        ValueKind::Font { .. } => {
            let kind = ValueKind::Font {
                options: decode_options(element),
            };
            let value = (!unset).then(|| FieldValue::Text(choice_text(element)));
            (kind, value)
        }
        ValueKind::Slider { .. } => {
            let kind = ValueKind::Slider {
                min: number_attr(element, "min"),
                max: number_attr(element, "max"),
                step: number_attr(element, "step"),
            };
            let value = (!unset).then(|| coerce_scalar(&kind, &element.text()));
            (kind, value)
        }
        scalar => {
            let value = (!unset).then(|| coerce_scalar(&scalar, &element.text()));
            (scalar, value)
        }
    }
}

/// Shape-based reading of an element that carries no type at all
fn decode_untyped(element: &Element<'_>, unset: bool) -> (ValueKind, Option<FieldValue>) {
    if element.child("field").is_some() {
        return decode_object(element, unset);
    }
    if element.child("item").is_some() || element.child("schema").is_some() {
        return decode_object_list(element, unset);
    }
    if let Some(blob) = legacy_blob(element) {
        return (infer_kind(&blob), (!unset).then_some(blob));
    }
    (ValueKind::Text, (!unset).then(|| FieldValue::Text(element.text())))
}

fn decode_object(element: &Element<'_>, unset: bool) -> (ValueKind, Option<FieldValue>) {
    if !element.has_element_children() {
        match legacy_blob(element) {
            Some(FieldValue::Object(map)) => {
                let fields = infer_object_fields(&map);
                return (ValueKind::Object { fields }, (!unset).then_some(FieldValue::Object(map)));
            }
            Some(other) => {
                tracing::warn!(pos = element.pos, "object property holds a non-object blob");
                return (infer_kind(&other), (!unset).then_some(other));
            }
            None => {}
        }
    }

    let mut fields = Vec::new();
    let mut map = FieldMap::new();
    for field in element.elements_named("field") {
        let Some(id) = field.attr("name") else {
            tracing::warn!(pos = field.pos, "skipping field without a name");
            continue;
        };
        let (kind, value) = decode_slot(field, None);
        upsert_field(&mut fields, schema_entry(field, id, kind));
        if let Some(value) = value {
            map.insert(id.to_string(), value);
        }
    }

    (ValueKind::Object { fields }, (!unset).then_some(FieldValue::Object(map)))
}

fn decode_object_list(element: &Element<'_>, unset: bool) -> (ValueKind, Option<FieldValue>) {
    if !element.has_element_children() {
        match legacy_blob(element) {
            Some(FieldValue::List(items)) => {
                let fields = infer_fields(&items);
                return (ValueKind::ObjectList { fields }, (!unset).then_some(FieldValue::List(items)));
            }
            Some(other) => {
                tracing::warn!(pos = element.pos, "object-list property holds a non-list blob");
                return (infer_kind(&other), (!unset).then_some(other));
            }
            None => {}
        }
    }

    let schema = element.child("schema");
    let mut fields = schema.map(decode_schema).unwrap_or_default();
    let mut items = Vec::new();

    for item in element.elements_named("item") {
        let mut map = FieldMap::new();
        for field in item.elements_named("field") {
            let Some(id) = field.attr("name") else {
                tracing::warn!(pos = field.pos, "skipping item field without a name");
                continue;
            };
            let declared = fields.iter().find(|f| f.id == id).map(|f| f.kind.clone());
            let (kind, value) = decode_slot(field, declared.as_ref());
            if declared.is_none() {
                fields.push(schema_entry(field, id, kind));
            }
            if let Some(value) = value {
                map.insert(id.to_string(), value);
            }
        }
        items.push(map);
    }

    (ValueKind::ObjectList { fields }, (!unset).then_some(FieldValue::List(items)))
}

fn decode_schema(schema: &Element<'_>) -> Vec<FieldSchema> {
    let mut fields = Vec::new();
    for field in schema.elements_named("field") {
        let Some(id) = field.attr("name") else {
            tracing::warn!(pos = field.pos, "skipping schema field without a name");
            continue;
        };
        let (kind, _) = decode_slot(field, None);
        upsert_field(&mut fields, schema_entry(field, id, kind));
    }
    fields
}

fn schema_entry(field: &Element<'_>, id: &str, kind: ValueKind) -> FieldSchema {
    FieldSchema::new(id, field.attr("title").unwrap_or(id), kind)
}

/// Same last-write rule as properties
fn upsert_field(fields: &mut Vec<FieldSchema>, entry: FieldSchema) {
    match fields.iter_mut().find(|f| f.id == entry.id) {
        Some(existing) => *existing = entry,
        None => fields.push(entry),
    }
}

fn decode_options(element: &Element<'_>) -> Vec<String> {
    if let Some(options) = element.child("options") {
        return options.elements_named("option").map(|o| o.text()).collect();
    }
    // legacy comma-separated attribute
    element
        .attr("options")
        .map(|list| {
            list.split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn choice_text(element: &Element<'_>) -> String {
    match element.child("value") {
        Some(value) => value.text(),
        None => element.text(),
    }
}

/// Composite value stored as opaque JSON text by older writers
fn legacy_blob(element: &Element<'_>) -> Option<FieldValue> {
    let text = element.text();
    let trimmed = text.trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(json) => Some(from_json(json)),
        Err(e) => {
            tracing::warn!(pos = element.pos, error = %e, "unreadable legacy JSON value");
            None
        }
    }
}

fn empty_value(kind: &ValueKind) -> FieldValue {
    match kind {
        ValueKind::Object { .. } => FieldValue::Object(FieldMap::new()),
        ValueKind::ObjectList { .. } => FieldValue::List(Vec::new()),
        _ => FieldValue::Text(String::new()),
    }
}

fn number_attr(element: &Element<'_>, name: &str) -> Option<f64> {
    let raw = element.attr(name)?;
    match raw.trim().parse::<f64>() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(attribute = name, value = raw, pos = element.pos, "ignoring non-numeric attribute");
            None
        }
    }
}
