use thiserror::Error;

pub type DecodeResult<T> = Result<T, DecodeError>;

/// Fatal decode failures.
///
/// "No document present" is not an error; callers represent it as `None`
/// before the codec is ever invoked.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Missing <graph> root element")]
    MissingRoot,

    #[error("Node #{index} is missing its required id")]
    MissingNodeId { index: usize },

    #[error("Edge #{index} is missing required attribute `{attribute}`")]
    MissingEdgeEndpoint {
        index: usize,
        attribute: &'static str,
    },

    #[error("Invalid syntax at {pos}: {message}")]
    InvalidSyntax { pos: usize, message: String },

    #[error("Mismatched closing tag at {pos}: expected </{expected}>, found </{found}>")]
    MismatchedTag {
        pos: usize,
        expected: String,
        found: String,
    },

    #[error("Unexpected end of document at {pos}: <{open}> is never closed")]
    UnexpectedEof { pos: usize, open: String },

    #[error("Unknown entity `&{entity};` at {pos}")]
    UnknownEntity { pos: usize, entity: String },
}

impl DecodeError {
    pub fn invalid_syntax(pos: usize, message: impl Into<String>) -> Self {
        Self::InvalidSyntax {
            pos,
            message: message.into(),
        }
    }

    pub fn mismatched_tag(pos: usize, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::MismatchedTag {
            pos,
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn unexpected_eof(pos: usize, open: impl Into<String>) -> Self {
        Self::UnexpectedEof {
            pos,
            open: open.into(),
        }
    }

    pub fn unknown_entity(pos: usize, entity: impl Into<String>) -> Self {
        Self::UnknownEntity {
            pos,
            entity: entity.into(),
        }
    }
}
