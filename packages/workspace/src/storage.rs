use crate::config::AuthorityConfig;
use blueprint_codec::{decode, encode, DecodeError};
use blueprint_model::{flatten, Graph};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error("Failed to encode projection: {0}")]
    Projection(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Raw text of a stored document together with its decoded graph
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub text: String,
    pub graph: Graph,
}

/// Project-relative document files.
///
/// A missing or whitespace-only file means "no document" and reads as
/// `None`; only text that is present but unreadable is an error. Writes go
/// to a sibling temp file first and are renamed into place.
#[derive(Debug, Clone)]
pub struct ProjectStorage {
    current: PathBuf,
    base: PathBuf,
    projection: PathBuf,
}

impl ProjectStorage {
    pub fn new(config: &AuthorityConfig) -> Self {
        Self {
            current: config.current_path(),
            base: config.base_path(),
            projection: config.projection_path(),
        }
    }

    pub fn current_path(&self) -> &Path {
        &self.current
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }

    pub fn projection_path(&self) -> &Path {
        &self.projection
    }

    pub async fn read_current(&self) -> StorageResult<Option<StoredDocument>> {
        read_document(&self.current).await
    }

    pub async fn read_base(&self) -> StorageResult<Option<Graph>> {
        Ok(read_document(&self.base).await?.map(|doc| doc.graph))
    }

    /// Raw text of the current document, `None` when absent or blank
    pub async fn read_current_text(&self) -> StorageResult<Option<String>> {
        read_text(&self.current).await
    }

    /// Encode and persist the current document, returning the written text
    pub async fn write_current(&self, graph: &Graph) -> StorageResult<String> {
        let text = encode(graph);
        write_atomic(&self.current, &text).await?;
        tracing::info!(path = ?self.current, bytes = text.len(), "wrote current document");
        Ok(text)
    }

    pub async fn write_base(&self, graph: &Graph) -> StorageResult<()> {
        let text = encode(graph);
        write_atomic(&self.base, &text).await?;
        tracing::info!(path = ?self.base, nodes = graph.nodes.len(), "wrote base document");
        Ok(())
    }

    /// Regenerate the flat id → value projection
    pub async fn write_projection(&self, graph: &Graph) -> StorageResult<()> {
        let json = serde_json::to_string_pretty(&flatten(graph))?;
        write_atomic(&self.projection, &json).await?;
        tracing::debug!(path = ?self.projection, "wrote property projection");
        Ok(())
    }
}

async fn read_text(path: &Path) -> StorageResult<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) if text.trim().is_empty() => Ok(None),
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StorageError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

async fn read_document(path: &Path) -> StorageResult<Option<StoredDocument>> {
    let Some(text) = read_text(path).await? else {
        return Ok(None);
    };
    let graph = decode(&text).map_err(|source| StorageError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(StoredDocument { text, graph }))
}

async fn write_atomic(path: &Path, contents: &str) -> StorageResult<()> {
    let io_error = |source: std::io::Error| StorageError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
    }

    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    tokio::fs::write(&temp, contents).await.map_err(io_error)?;
    tokio::fs::rename(&temp, path).await.map_err(io_error)?;
    Ok(())
}
