//! Typed, nestable node properties.
//!
//! A property is a named value plus the `ValueKind` that says how to read it.
//! Composite kinds (`Object`, `ObjectList`) carry their own field schema, so
//! the same `FieldSchema` shape describes both top-level properties and the
//! fields nested inside them, to any depth.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value map of an object or of one object-list item, keyed by field id
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Closed set of property kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ValueKind {
    Text,
    Number,
    Boolean,
    Color,
    Slider {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<f64>,
    },
    Select {
        #[serde(default)]
        options: Vec<String>,
    },
    Font {
        #[serde(default)]
        options: Vec<String>,
    },
    Object {
        #[serde(default)]
        fields: Vec<FieldSchema>,
    },
    ObjectList {
        #[serde(default)]
        fields: Vec<FieldSchema>,
    },
    /// Scalar type tag this crate does not know; carried as text
    Custom { tag: String },
}

impl ValueKind {
    /// Wire tag used by the document format
    pub fn tag(&self) -> &str {
        match self {
            ValueKind::Text => "text",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Color => "color",
            ValueKind::Slider { .. } => "slider",
            ValueKind::Select { .. } => "select",
            ValueKind::Font { .. } => "font",
            ValueKind::Object { .. } => "object",
            ValueKind::ObjectList { .. } => "object-list",
            ValueKind::Custom { tag } => tag,
        }
    }

    /// Kind for a wire tag, with empty parameters
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "text" => ValueKind::Text,
            "number" => ValueKind::Number,
            "boolean" => ValueKind::Boolean,
            "color" => ValueKind::Color,
            "slider" => ValueKind::Slider {
                min: None,
                max: None,
                step: None,
            },
            "select" => ValueKind::Select { options: vec![] },
            "font" => ValueKind::Font { options: vec![] },
            "object" => ValueKind::Object { fields: vec![] },
            "object-list" => ValueKind::ObjectList { fields: vec![] },
            other => ValueKind::Custom {
                tag: other.to_string(),
            },
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, ValueKind::Object { .. } | ValueKind::ObjectList { .. })
    }

    /// Choice-based kinds carry an ordered options list
    pub fn is_choice(&self) -> bool {
        matches!(self, ValueKind::Select { .. } | ValueKind::Font { .. })
    }

    /// High-churn kinds whose edits arrive as a continuous stream
    pub fn is_continuous(&self) -> bool {
        matches!(self, ValueKind::Color | ValueKind::Slider { .. })
    }

    pub fn options(&self) -> &[String] {
        match self {
            ValueKind::Select { options } | ValueKind::Font { options } => options,
            _ => &[],
        }
    }

    pub fn fields(&self) -> &[FieldSchema] {
        match self {
            ValueKind::Object { fields } | ValueKind::ObjectList { fields } => fields,
            _ => &[],
        }
    }

    pub fn fields_mut(&mut self) -> Option<&mut Vec<FieldSchema>> {
        match self {
            ValueKind::Object { fields } | ValueKind::ObjectList { fields } => Some(fields),
            _ => None,
        }
    }
}

/// Declared shape of one field inside an object or object-list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub id: String,
    pub title: String,
    pub kind: ValueKind,
}

impl FieldSchema {
    pub fn new(id: impl Into<String>, title: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind,
        }
    }

    pub fn text(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(id, title, ValueKind::Text)
    }

    pub fn number(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(id, title, ValueKind::Number)
    }

    pub fn boolean(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(id, title, ValueKind::Boolean)
    }
}

/// Runtime value of a property or field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Boolean(bool),
    Number(f64),
    Text(String),
    List(Vec<FieldMap>),
    Object(FieldMap),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            FieldValue::Text(_) | FieldValue::Number(_) | FieldValue::Boolean(_)
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&FieldMap> {
        match self {
            FieldValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldMap]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Literal text of a scalar, as written into a document.
    /// Composite values fall back to their JSON form.
    pub fn to_literal(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Boolean(b) => b.to_string(),
            FieldValue::List(_) | FieldValue::Object(_) => {
                serde_json::to_string(self).unwrap_or_default()
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

/// Declared-type-directed coercion of scalar text.
///
/// `number`/`slider` parse to a number and `boolean` accepts `true`/`false`
/// in any case. Anything unparsable keeps the raw string.
pub fn coerce_scalar(kind: &ValueKind, raw: &str) -> FieldValue {
    match kind {
        ValueKind::Number | ValueKind::Slider { .. } => match raw.trim().parse::<f64>() {
            Ok(n) => FieldValue::Number(n),
            Err(_) => FieldValue::Text(raw.to_string()),
        },
        ValueKind::Boolean => {
            let trimmed = raw.trim();
            if trimmed.eq_ignore_ascii_case("true") {
                FieldValue::Boolean(true)
            } else if trimmed.eq_ignore_ascii_case("false") {
                FieldValue::Boolean(false)
            } else {
                FieldValue::Text(raw.to_string())
            }
        }
        _ => FieldValue::Text(raw.to_string()),
    }
}

/// Typed property attached to a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    pub title: String,
    pub kind: ValueKind,
    pub value: FieldValue,
}

impl Property {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        kind: ValueKind,
        value: FieldValue,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind,
            value,
        }
    }

    pub fn text(id: impl Into<String>, title: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(id, title, ValueKind::Text, FieldValue::Text(value.into()))
    }

    pub fn number(id: impl Into<String>, title: impl Into<String>, value: f64) -> Self {
        Self::new(id, title, ValueKind::Number, FieldValue::Number(value))
    }

    pub fn boolean(id: impl Into<String>, title: impl Into<String>, value: bool) -> Self {
        Self::new(id, title, ValueKind::Boolean, FieldValue::Boolean(value))
    }

    pub fn color(id: impl Into<String>, title: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(id, title, ValueKind::Color, FieldValue::Text(value.into()))
    }

    pub fn slider(
        id: impl Into<String>,
        title: impl Into<String>,
        value: f64,
        min: f64,
        max: f64,
        step: f64,
    ) -> Self {
        Self::new(
            id,
            title,
            ValueKind::Slider {
                min: Some(min),
                max: Some(max),
                step: Some(step),
            },
            FieldValue::Number(value),
        )
    }

    pub fn select(
        id: impl Into<String>,
        title: impl Into<String>,
        value: impl Into<String>,
        options: Vec<String>,
    ) -> Self {
        Self::new(
            id,
            title,
            ValueKind::Select { options },
            FieldValue::Text(value.into()),
        )
    }

    pub fn object(
        id: impl Into<String>,
        title: impl Into<String>,
        fields: Vec<FieldSchema>,
        value: FieldMap,
    ) -> Self {
        Self::new(id, title, ValueKind::Object { fields }, FieldValue::Object(value))
    }

    pub fn object_list(
        id: impl Into<String>,
        title: impl Into<String>,
        fields: Vec<FieldSchema>,
        items: Vec<FieldMap>,
    ) -> Self {
        Self::new(
            id,
            title,
            ValueKind::ObjectList { fields },
            FieldValue::List(items),
        )
    }
}
