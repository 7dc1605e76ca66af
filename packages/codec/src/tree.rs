//! Element tree built from the token stream.
//!
//! Text and attribute values are run through text repair and unescaped here,
//! so the graph decoder only ever sees final strings.

use crate::error::{DecodeError, DecodeResult};
use crate::escape::unescape;
use crate::repair::repair_text;
use crate::tokenizer::{tokenize, RawAttribute, Token};

#[derive(Debug, Clone, PartialEq)]
pub struct Element<'src> {
    pub name: &'src str,
    pub attributes: Vec<(&'src str, String)>,
    pub children: Vec<Content<'src>>,
    pub self_closing: bool,
    pub pos: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Content<'src> {
    Element(Element<'src>),
    Text(String),
}

impl<'src> Element<'src> {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element<'src>> {
        self.children.iter().filter_map(|c| match c {
            Content::Element(e) => Some(e),
            Content::Text(_) => None,
        })
    }

    pub fn elements_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element<'src>> {
        self.elements().filter(move |e| e.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&Element<'src>> {
        self.elements().find(|e| e.name == name)
    }

    pub fn has_element_children(&self) -> bool {
        self.elements().next().is_some()
    }

    /// Concatenated direct text content
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|c| match c {
                Content::Text(t) => Some(t.as_str()),
                Content::Element(_) => None,
            })
            .collect()
    }
}

/// Build the element tree and return the first top-level element.
///
/// `Ok(None)` means the text contained no element at all.
pub fn build(source: &str) -> DecodeResult<Option<Element<'_>>> {
    let mut stack: Vec<Element<'_>> = Vec::new();
    let mut root = None;

    for token in tokenize(source)? {
        match token {
            Token::Open {
                name,
                attributes,
                self_closing,
                pos,
            } => {
                let attributes = attributes
                    .into_iter()
                    .map(decode_attribute)
                    .collect::<DecodeResult<Vec<_>>>()?;

                let element = Element {
                    name,
                    attributes,
                    children: Vec::new(),
                    self_closing,
                    pos,
                };

                if self_closing {
                    attach(&mut stack, &mut root, element);
                } else {
                    stack.push(element);
                }
            }
            Token::Close { name, pos } => {
                let element = stack.pop().ok_or_else(|| {
                    DecodeError::invalid_syntax(pos, format!("unexpected closing tag </{}>", name))
                })?;
                if element.name != name {
                    return Err(DecodeError::mismatched_tag(pos, element.name, name));
                }
                attach(&mut stack, &mut root, element);
            }
            Token::Text { raw, pos } => {
                // Text outside the root element is ignored
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Content::Text(decode_text(raw, pos)?));
                }
            }
        }
    }

    if let Some(open) = stack.last() {
        return Err(DecodeError::unexpected_eof(source.len(), open.name));
    }

    Ok(root)
}

fn attach<'src>(
    stack: &mut [Element<'src>],
    root: &mut Option<Element<'src>>,
    element: Element<'src>,
) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Content::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => tracing::warn!(
            element = element.name,
            pos = element.pos,
            "ignoring extra top-level element"
        ),
    }
}

fn decode_attribute(attribute: RawAttribute<'_>) -> DecodeResult<(&str, String)> {
    Ok((attribute.name, decode_text(attribute.raw, attribute.pos)?))
}

// Repair sees the raw slice so that characters written as numeric
// references are never reinterpreted.
fn decode_text(raw: &str, pos: usize) -> DecodeResult<String> {
    let repaired = repair_text(raw);
    Ok(unescape(&repaired, pos)?.into_owned())
}
