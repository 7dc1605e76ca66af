//! Documents written by older tools: untyped fields, JSON blobs, comma-separated
//! options and misdecoded text. Each must decode, and re-encoding the result
//! must produce a stable, fully typed document.

use blueprint_codec::{decode, encode};
use blueprint_model::{FieldValue, ValueKind};

#[test]
fn test_json_blob_object_list_gets_inferred_schema() {
    let source = r#"<?xml version="1.0"?>
<graph>
  <nodes>
    <node id="cart" title="Cart">
      <props>
        <prop name="rows" title="Rows">[{"label":"A","qty":1},{"label":"B","extra":true}]</prop>
      </props>
    </node>
  </nodes>
</graph>"#;

    let graph = decode(source).unwrap();
    let rows = graph.nodes[0].property("rows").unwrap();

    let fields: Vec<(&str, &ValueKind)> = rows
        .kind
        .fields()
        .iter()
        .map(|f| (f.id.as_str(), &f.kind))
        .collect();
    assert_eq!(
        fields,
        vec![
            ("label", &ValueKind::Text),
            ("qty", &ValueKind::Number),
            ("extra", &ValueKind::Boolean),
        ]
    );

    let items = rows.value.as_list().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["qty"], FieldValue::Number(1.0));
    assert!(!items[1].contains_key("qty"));

    // once re-encoded the document is typed and stable
    let reencoded = encode(&graph);
    assert!(reencoded.contains("type=\"object-list\""));
    assert_eq!(decode(&reencoded).unwrap(), graph);
}

#[test]
fn test_json_blob_object_under_declared_type() {
    let source = r#"<graph><nodes><node id="p" title="P"><props>
        <prop name="meta" title="Meta" type="object">{"author":"ada","year":1843,"draft":null}</prop>
    </props></node></nodes></graph>"#;

    let graph = decode(source).unwrap();
    let meta = graph.nodes[0].property("meta").unwrap();
    let map = meta.value.as_object().unwrap();

    assert_eq!(map["author"], FieldValue::text("ada"));
    assert_eq!(map["year"], FieldValue::Number(1843.0));
    assert_eq!(map["draft"], FieldValue::text(""));
    assert_eq!(meta.kind.fields().len(), 3);
}

#[test]
fn test_non_object_list_elements_are_wrapped() {
    let source = r#"<graph><nodes><node id="n" title="N"><props>
        <prop name="tags" title="Tags" type="object-list">["red", "blue"]</prop>
    </props></node></nodes></graph>"#;

    let graph = decode(source).unwrap();
    let items = graph.nodes[0].property("tags").unwrap().value.as_list().unwrap().to_vec();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1]["value"], FieldValue::text("blue"));
}

#[test]
fn test_untyped_fields_are_inferred_from_shape() {
    let source = r#"<graph><nodes><node id="n" title="N"><props>
        <prop name="card" title="Card">
          <field name="heading">Hello</field>
          <field name="rows">
            <item><field name="k">v</field></item>
          </field>
        </prop>
    </props></node></nodes></graph>"#;

    let graph = decode(source).unwrap();
    let card = graph.nodes[0].property("card").unwrap();

    assert!(matches!(card.kind, ValueKind::Object { .. }));
    let fields = card.kind.fields();
    assert_eq!(fields[0].kind, ValueKind::Text);
    assert!(matches!(fields[1].kind, ValueKind::ObjectList { .. }));
    assert_eq!(fields[1].kind.fields()[0].id, "k");

    let map = card.value.as_object().unwrap();
    assert_eq!(map["heading"], FieldValue::text("Hello"));
}

#[test]
fn test_comma_separated_options_attribute() {
    let source = r#"<graph><nodes><node id="n" title="N"><props>
        <prop name="size" title="Size" type="select" options="sm, md,lg">md</prop>
    </props></node></nodes></graph>"#;

    let graph = decode(source).unwrap();
    let size = graph.nodes[0].property("size").unwrap();
    assert_eq!(size.kind.options(), ["sm", "md", "lg"]);
    assert_eq!(size.value, FieldValue::text("md"));
}

#[test]
fn test_misdecoded_text_is_repaired() {
    let source = "<graph><nodes><node id=\"c\" title=\"CafÃ©\">\
        <description>donâ€™t panic</description></node></nodes></graph>";

    let graph = decode(source).unwrap();
    assert_eq!(graph.nodes[0].title, "Café");
    assert_eq!(graph.nodes[0].prompt, "don’t panic");
}

#[test]
fn test_byte_order_mark_and_comments() {
    let source = "\u{feff}<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
        <!-- exported by an older tool -->\n\
        <graph version=\"1\"><nodes><node id=\"a\" title=\"A\"/></nodes></graph>\n";

    let graph = decode(source).unwrap();
    assert_eq!(graph.nodes.len(), 1);
    assert!(graph.edges.is_empty());
}

#[test]
fn test_unknown_type_is_carried_as_text() {
    let source = r#"<graph><nodes><node id="n" title="N"><props>
        <prop name="icon" title="Icon" type="icon">star</prop>
    </props></node></nodes></graph>"#;

    let graph = decode(source).unwrap();
    let icon = graph.nodes[0].property("icon").unwrap();
    assert_eq!(
        icon.kind,
        ValueKind::Custom {
            tag: "icon".to_string()
        }
    );
    assert_eq!(icon.value, FieldValue::text("star"));
    assert_eq!(decode(&encode(&graph)).unwrap(), graph);
}
