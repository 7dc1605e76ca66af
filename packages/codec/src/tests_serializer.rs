/// Round-trip tests: decode(encode(g)) must reproduce conformant graphs exactly
use crate::*;
use blueprint_model::{Edge, FieldMap, FieldSchema, FieldValue, Graph, Node, Property, ValueKind};

fn map(entries: &[(&str, FieldValue)]) -> FieldMap {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn roundtrip(graph: &Graph) -> Graph {
    let text = encode(graph);
    decode(&text).unwrap_or_else(|e| panic!("failed to decode:\n{}\n{}", text, e))
}

#[test]
fn test_roundtrip_empty_graph() {
    let graph = Graph::new();
    let text = encode(&graph);
    assert!(text.contains("<nodes/>"));
    assert!(text.contains("<edges/>"));
    assert_eq!(roundtrip(&graph), graph);
}

#[test]
fn test_roundtrip_nodes_and_edges() {
    let graph = Graph::new()
        .with_node(Node::new("hero", "Hero").with_prompt("Big banner").at(10.0, -4.5))
        .with_node(Node::new("cta", "Call to action").at(0.25, 300.0))
        .with_edge(Edge::new("e1", "hero", "cta"))
        .with_edge(Edge::new("e2", "cta", "hero").with_role("back"));

    assert_eq!(roundtrip(&graph), graph);
}

#[test]
fn test_roundtrip_scalar_kinds() {
    let node = Node::new("a", "A")
        .with_property(Property::text("label", "Label", "Buy now"))
        .with_property(Property::number("count", "Count", 3.0))
        .with_property(Property::number("ratio", "Ratio", 0.1 + 0.2))
        .with_property(Property::boolean("visible", "Visible", false))
        .with_property(Property::color("bg", "Background", "#3366FF"))
        .with_property(Property::slider("opacity", "Opacity", 0.5, 0.0, 1.0, 0.05))
        .with_property(Property::select(
            "size",
            "Size",
            "md",
            vec!["sm".into(), "md".into(), "lg".into()],
        ));
    let graph = Graph::new().with_node(node);

    assert_eq!(roundtrip(&graph), graph);
}

#[test]
fn test_roundtrip_reserved_characters() {
    let node = Node::new("q", "Tom & \"Jerry\" <3")
        .with_prompt("if a < b && b > c then 'ok'")
        .with_property(Property::text("t", "T's", "<b>bold</b> & more"));
    let graph = Graph::new().with_node(node);

    let text = encode(&graph);
    assert!(text.contains("Tom &amp; &quot;Jerry&quot; &lt;3"));
    assert_eq!(roundtrip(&graph), graph);
}

#[test]
fn test_roundtrip_text_that_looks_misdecoded() {
    let node = Node::new("deg", "Â°")
        .with_prompt("CafÃ© is spelled wrong on purpose")
        .with_property(Property::text("t", "Ã©", "donâ€™t"));
    let graph = Graph::new().with_node(node);

    let text = encode(&graph);
    assert!(text.contains("title=\"&#194;&#176;\""));
    assert_eq!(roundtrip(&graph), graph);
}

#[test]
fn test_roundtrip_whitespace_in_text() {
    let node = Node::new("w", "W")
        .with_prompt("  line one\n  line two  ")
        .with_property(Property::text("pad", "Pad", "  spaced  "));
    let graph = Graph::new().with_node(node);

    assert_eq!(roundtrip(&graph), graph);
}

#[test]
fn test_roundtrip_object_list() {
    let fields = vec![
        FieldSchema::text("label", "Label"),
        FieldSchema::number("qty", "Qty"),
    ];
    let items = vec![
        map(&[("label", "A".into()), ("qty", 1.0.into())]),
        map(&[("label", "B".into()), ("qty", 2.0.into())]),
    ];
    let graph = Graph::new().with_node(
        Node::new("cart", "Cart").with_property(Property::object_list("rows", "Rows", fields, items)),
    );

    let decoded = roundtrip(&graph);
    assert_eq!(decoded, graph);

    let rows = decoded.nodes[0].property("rows").unwrap();
    assert_eq!(rows.kind.fields()[1].kind, ValueKind::Number);
    assert_eq!(rows.value.as_list().unwrap()[1]["qty"], FieldValue::Number(2.0));
}

#[test]
fn test_roundtrip_empty_object_list_keeps_schema() {
    let fields = vec![FieldSchema::text("label", "Label")];
    let graph = Graph::new().with_node(
        Node::new("n", "N").with_property(Property::object_list("rows", "Rows", fields, vec![])),
    );

    let text = encode(&graph);
    assert!(text.contains("<schema>"));
    assert!(!text.contains("<item"));
    assert_eq!(roundtrip(&graph), graph);
}

#[test]
fn test_unset_field_is_preserved() {
    let fields = vec![
        FieldSchema::text("label", "Label"),
        FieldSchema::boolean("done", "Done"),
    ];
    let items = vec![map(&[("label", "only label".into())])];
    let graph = Graph::new().with_node(
        Node::new("n", "N").with_property(Property::object_list("todo", "Todo", fields, items)),
    );

    let text = encode(&graph);
    assert!(text.contains(r#"<field name="done" title="Done" type="boolean" unset="true"/>"#));

    let decoded = roundtrip(&graph);
    let item = &decoded.nodes[0].property("todo").unwrap().value.as_list().unwrap()[0];
    assert!(!item.contains_key("done"));
    assert_eq!(decoded, graph);
}

#[test]
fn test_roundtrip_nested_composites() {
    let address_fields = vec![
        FieldSchema::text("street", "Street"),
        FieldSchema::text("city", "City"),
    ];
    let tag_fields = vec![FieldSchema::text("name", "Name")];
    let fields = vec![
        FieldSchema::text("name", "Name"),
        FieldSchema::new(
            "address",
            "Address",
            ValueKind::Object {
                fields: address_fields,
            },
        ),
        FieldSchema::new("tags", "Tags", ValueKind::ObjectList { fields: tag_fields }),
    ];
    let value = map(&[
        ("name", "Ada".into()),
        (
            "address",
            FieldValue::Object(map(&[("street", "1 Loop".into()), ("city", "London".into())])),
        ),
        (
            "tags",
            FieldValue::List(vec![map(&[("name", "math".into())]), map(&[("name", "code".into())])]),
        ),
    ]);
    let graph = Graph::new()
        .with_node(Node::new("p", "Person").with_property(Property::object("person", "Person", fields, value)));

    assert_eq!(roundtrip(&graph), graph);
}

#[test]
fn test_undeclared_keys_are_written_with_inferred_kind() {
    let fields = vec![FieldSchema::text("label", "Label")];
    let items = vec![map(&[("label", "A".into()), ("price", 9.5.into())])];
    let graph = Graph::new().with_node(
        Node::new("n", "N").with_property(Property::object_list("rows", "Rows", fields, items.clone())),
    );

    let decoded = roundtrip(&graph);
    let rows = decoded.nodes[0].property("rows").unwrap();
    let ids: Vec<&str> = rows.kind.fields().iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["label", "price"]);
    assert_eq!(rows.kind.fields()[1].kind, ValueKind::Number);
    assert_eq!(rows.value, FieldValue::List(items));
}

#[test]
fn test_encode_is_deterministic() {
    let graph = Graph::new()
        .with_node(Node::new("a", "A").with_property(Property::text("k", "K", "v")))
        .with_edge(Edge::new("e", "a", "a"));
    assert_eq!(encode(&graph), encode(&graph));
    assert_eq!(encode(&roundtrip(&graph)), encode(&graph));
}

#[test]
fn test_custom_indent() {
    let graph = Graph::new().with_node(Node::new("a", "A"));
    let text = Serializer::with_indent("\t").serialize(&graph);
    assert!(text.contains("\n\t<nodes>\n\t\t<node "));
    assert_eq!(decode(&text).unwrap(), graph);
}

#[test]
fn test_parent_attribute_roundtrips() {
    let mut child = Node::new("child", "Child");
    child.parent = Some("root".to_string());
    let graph = Graph::new().with_node(Node::new("root", "Root")).with_node(child);

    assert_eq!(roundtrip(&graph), graph);
}
