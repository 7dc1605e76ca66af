//! Error types for the editor

use blueprint_codec::DecodeError;
use blueprint_workspace::AuthorityError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("Mutation error: {0}")]
    Mutation(#[from] crate::mutations::MutationError),

    #[error("Invalid snapshot: {0}")]
    Decode(#[from] DecodeError),

    #[error("Remote call failed: {0}")]
    Remote(String),

    #[error("Node `{0}` is not being manipulated")]
    NotManipulating(String),
}

impl From<AuthorityError> for SyncError {
    fn from(e: AuthorityError) -> Self {
        SyncError::Remote(e.to_string())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
