//! # Blueprint Codec
//!
//! Bidirectional codec between `blueprint_model::Graph` and the textual graph
//! document.
//!
//! ```text
//! document text ──tokenize──▶ tokens ──tree──▶ elements ──parser──▶ Graph
//! Graph ──serializer──▶ document text
//! ```
//!
//! `decode(&encode(g)) == g` holds for every graph whose value maps conform
//! to their schemas.

pub mod error;
pub mod escape;
pub mod parser;
pub mod repair;
pub mod serializer;
pub mod tokenizer;
pub mod tree;

#[cfg(test)]
mod tests_serializer;

pub use error::{DecodeError, DecodeResult};
pub use parser::decode;
pub use serializer::{encode, Serializer};

/// Root element name
pub const ROOT_ELEMENT: &str = "graph";

/// Version written on the root element
pub const FORMAT_VERSION: &str = "1";
