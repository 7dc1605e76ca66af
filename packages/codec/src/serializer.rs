use crate::escape::escape;
use crate::{FORMAT_VERSION, ROOT_ELEMENT};
use blueprint_model::infer::undeclared_fields;
use blueprint_model::{Edge, FieldMap, FieldSchema, FieldValue, Graph, Node, Property, ValueKind};

/// Serializer converts a Graph into the canonical document text
///
/// Output is deterministic: nodes, properties, edges and list items in array
/// order, object fields in schema order. Composite properties are written as
/// nested `field`/`item` elements that carry both schema and value, so the
/// document stays diffable and hand-editable.
///
/// Value-map keys that the schema does not declare are appended after the
/// declared fields with an inferred kind, so nothing is dropped.
pub struct Serializer {
    indent_level: usize,
    indent_string: String,
}

/// What a slot element carries
#[derive(Clone, Copy)]
enum Slot<'a> {
    /// Schema only (inside `<schema>`)
    Schema,
    /// Schema plus value; `None` writes `unset="true"`
    Value(Option<&'a FieldValue>),
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer {
    pub fn new() -> Self {
        Self {
            indent_level: 0,
            indent_string: "  ".to_string(), // 2 spaces
        }
    }

    pub fn with_indent(indent: &str) -> Self {
        Self {
            indent_level: 0,
            indent_string: indent.to_string(),
        }
    }

    /// Serialize a Graph to document text
    pub fn serialize(&mut self, graph: &Graph) -> String {
        let mut output = String::new();
        output.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        output.push_str(&format!("<{} version=\"{}\">\n", ROOT_ELEMENT, FORMAT_VERSION));
        self.indent_level += 1;

        if graph.nodes.is_empty() {
            self.line(&mut output, "<nodes/>");
        } else {
            self.line(&mut output, "<nodes>");
            self.indent_level += 1;
            for node in &graph.nodes {
                self.serialize_node(node, &mut output);
            }
            self.indent_level -= 1;
            self.line(&mut output, "</nodes>");
        }

        if graph.edges.is_empty() {
            self.line(&mut output, "<edges/>");
        } else {
            self.line(&mut output, "<edges>");
            self.indent_level += 1;
            for edge in &graph.edges {
                self.serialize_edge(edge, &mut output);
            }
            self.indent_level -= 1;
            self.line(&mut output, "</edges>");
        }

        self.indent_level -= 1;
        output.push_str(&format!("</{}>\n", ROOT_ELEMENT));
        output
    }

    fn serialize_node(&mut self, node: &Node, output: &mut String) {
        let mut open = format!(
            "<node id=\"{}\" title=\"{}\" x=\"{}\" y=\"{}\" z=\"{}\"",
            escape(&node.id),
            escape(&node.title),
            node.position.x,
            node.position.y,
            node.position.z
        );
        if let Some(parent) = &node.parent {
            open.push_str(&format!(" parent=\"{}\"", escape(parent)));
        }
        open.push('>');
        self.line(output, &open);

        self.indent_level += 1;
        self.line(
            output,
            &format!("<description>{}</description>", escape(&node.prompt)),
        );

        if !node.properties.is_empty() {
            self.line(output, "<props>");
            self.indent_level += 1;
            for property in &node.properties {
                self.serialize_property(property, output);
            }
            self.indent_level -= 1;
            self.line(output, "</props>");
        }
        self.indent_level -= 1;

        self.line(output, "</node>");
    }

    fn serialize_property(&mut self, property: &Property, output: &mut String) {
        self.serialize_slot(
            "prop",
            &property.id,
            &property.title,
            &property.kind,
            Slot::Value(Some(&property.value)),
            output,
        );
    }

    fn serialize_edge(&mut self, edge: &Edge, output: &mut String) {
        let mut tag = format!(
            "<edge id=\"{}\" source=\"{}\" target=\"{}\"",
            escape(&edge.id),
            escape(&edge.source),
            escape(&edge.target)
        );
        if let Some(role) = &edge.role {
            tag.push_str(&format!(" role=\"{}\"", escape(role)));
        }
        tag.push_str("/>");
        self.line(output, &tag);
    }

    /// Write one `<prop>`/`<field>` element, recursing into composite kinds
    fn serialize_slot(
        &mut self,
        tag: &str,
        id: &str,
        title: &str,
        kind: &ValueKind,
        slot: Slot<'_>,
        output: &mut String,
    ) {
        let mut open = format!(
            "<{} name=\"{}\" title=\"{}\" type=\"{}\"",
            tag,
            escape(id),
            escape(title),
            escape(kind.tag())
        );
        if let ValueKind::Slider { min, max, step } = kind {
            for (name, bound) in [("min", min), ("max", max), ("step", step)] {
                if let Some(bound) = bound {
                    open.push_str(&format!(" {}=\"{}\"", name, bound));
                }
            }
        }
        if let Slot::Value(None) = slot {
            open.push_str(" unset=\"true\"");
        }

        match kind {
            ValueKind::Object { fields } => {
                let map = match slot {
                    Slot::Value(Some(FieldValue::Object(map))) => Some(map),
                    _ => None,
                };
                let all_fields = with_undeclared(fields, map.into_iter());

                if all_fields.is_empty() {
                    self.line(output, &format!("{}></{}>", open, tag));
                    return;
                }

                self.line(output, &format!("{}>", open));
                self.indent_level += 1;
                for field in &all_fields {
                    let field_slot = match slot {
                        Slot::Schema => Slot::Schema,
                        Slot::Value(_) => Slot::Value(map.and_then(|m| m.get(&field.id))),
                    };
                    self.serialize_field(field, field_slot, output);
                }
                self.indent_level -= 1;
                self.line(output, &format!("</{}>", tag));
            }
            ValueKind::ObjectList { fields } => {
                let items: &[FieldMap] = match slot {
                    Slot::Value(Some(FieldValue::List(items))) => items,
                    _ => &[],
                };
                let all_fields = with_undeclared(fields, items.iter());

                self.line(output, &format!("{}>", open));
                self.indent_level += 1;

                if all_fields.is_empty() {
                    self.line(output, "<schema/>");
                } else {
                    self.line(output, "<schema>");
                    self.indent_level += 1;
                    for field in &all_fields {
                        self.serialize_field(field, Slot::Schema, output);
                    }
                    self.indent_level -= 1;
                    self.line(output, "</schema>");
                }

                for item in items {
                    if all_fields.is_empty() {
                        self.line(output, "<item/>");
                        continue;
                    }
                    self.line(output, "<item>");
                    self.indent_level += 1;
                    for field in &all_fields {
                        self.serialize_field(field, Slot::Value(item.get(&field.id)), output);
                    }
                    self.indent_level -= 1;
                    self.line(output, "</item>");
                }

                self.indent_level -= 1;
                self.line(output, &format!("</{}>", tag));
            }
            ValueKind::Select { options } | ValueKind::Font { options } => {
                self.line(output, &format!("{}>", open));
                self.indent_level += 1;
                if let Slot::Value(Some(value)) = slot {
                    self.line(
                        output,
                        &format!("<value>{}</value>", escape(&value.to_literal())),
                    );
                }
                if options.is_empty() {
                    self.line(output, "<options/>");
                } else {
                    self.line(output, "<options>");
                    self.indent_level += 1;
                    for option in options {
                        self.line(output, &format!("<option>{}</option>", escape(option)));
                    }
                    self.indent_level -= 1;
                    self.line(output, "</options>");
                }
                self.indent_level -= 1;
                self.line(output, &format!("</{}>", tag));
            }
            _ => match slot {
                Slot::Value(Some(value)) => self.line(
                    output,
                    &format!("{}>{}</{}>", open, escape(&value.to_literal()), tag),
                ),
                Slot::Value(None) | Slot::Schema => self.line(output, &format!("{}/>", open)),
            },
        }
    }

    fn serialize_field(&mut self, field: &FieldSchema, slot: Slot<'_>, output: &mut String) {
        self.serialize_slot("field", &field.id, &field.title, &field.kind, slot, output);
    }

    fn line(&self, output: &mut String, content: &str) {
        for _ in 0..self.indent_level {
            output.push_str(&self.indent_string);
        }
        output.push_str(content);
        output.push('\n');
    }
}

fn with_undeclared<'a>(
    fields: &[FieldSchema],
    maps: impl Iterator<Item = &'a FieldMap>,
) -> Vec<FieldSchema> {
    let mut all = fields.to_vec();
    let extra = undeclared_fields(fields, maps);
    if !extra.is_empty() {
        tracing::debug!(count = extra.len(), "writing undeclared fields with inferred kinds");
    }
    all.extend(extra);
    all
}

/// Convenience function to serialize a graph with default settings
pub fn encode(graph: &Graph) -> String {
    Serializer::new().serialize(graph)
}
