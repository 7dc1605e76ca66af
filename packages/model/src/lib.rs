//! # Blueprint Model
//!
//! Entity definitions for the blueprint graph document.
//!
//! ```text
//! Graph
//!  ├── nodes: Node { id, title, prompt, position, properties }
//!  │              └── Property { id, title, kind, value }
//!  │                     └── ValueKind::Object / ObjectList carry FieldSchema trees
//!  └── edges: Edge { id, source, target, role }
//! ```
//!
//! Build status is not part of the model. It is derived by `blueprint-diff`
//! against a base snapshot every time it is read.

pub mod graph;
pub mod infer;
pub mod projection;
pub mod property;

pub use graph::{Edge, EdgeKey, Graph, Node, Position};
pub use infer::{from_json, infer_fields, infer_kind, infer_object_fields, undeclared_fields};
pub use projection::flatten;
pub use property::{coerce_scalar, FieldMap, FieldSchema, FieldValue, Property, ValueKind};
