use crate::normalize::{normalize, Normalized, PropertyRename};
use crate::storage::{ProjectStorage, StorageResult};
use blueprint_model::Graph;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Who initiated a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteOrigin {
    /// Automation such as the coding agent; always broadcast
    Agent,
    /// An editor client that already holds its own edit
    Interactive,
    /// The document file was changed by another program
    External,
}

/// In-memory canonical state for one project scope.
///
/// The current graph is loaded from storage on first access and mirrored
/// back on every write. The base graph is read from storage on demand.
pub struct GraphStore {
    storage: ProjectStorage,
    loaded: bool,
    current: Graph,
    version: u64,
    base_version: u64,
    last_origin: WriteOrigin,
    /// Text most recently read or written for the current document
    last_text: Option<String>,
    /// `(node, original property id)` → id given by a collision rename
    renames: HashMap<(String, String), String>,
}

impl GraphStore {
    pub fn new(storage: ProjectStorage) -> Self {
        Self {
            storage,
            loaded: false,
            current: Graph::new(),
            version: 0,
            base_version: 0,
            last_origin: WriteOrigin::Agent,
            last_text: None,
            renames: HashMap::new(),
        }
    }

    pub fn storage(&self) -> &ProjectStorage {
        &self.storage
    }

    /// Load the current document unless already loaded
    pub async fn ensure_loaded(&mut self) -> StorageResult<()> {
        if self.loaded {
            return Ok(());
        }

        match self.storage.read_current().await? {
            Some(stored) => {
                let Normalized { graph, report } = normalize(stored.graph);
                self.record_renames(&report.renamed_properties);
                tracing::info!(
                    nodes = graph.nodes.len(),
                    edges = graph.edges.len(),
                    clean = report.is_clean(),
                    "loaded current document"
                );
                self.current = graph;
                self.last_text = Some(stored.text);
            }
            None => {
                tracing::info!("no current document, starting from an empty graph");
                self.current = Graph::new();
                self.last_text = None;
            }
        }

        self.loaded = true;
        Ok(())
    }

    pub async fn current(&mut self) -> StorageResult<&Graph> {
        self.ensure_loaded().await?;
        Ok(&self.current)
    }

    pub async fn base(&self) -> StorageResult<Option<Graph>> {
        self.storage.read_base().await
    }

    /// Normalize, persist and adopt `graph`. Returns the new version.
    pub async fn persist(&mut self, graph: Graph, origin: WriteOrigin) -> StorageResult<u64> {
        self.ensure_loaded().await?;

        let Normalized { graph, report } = normalize(graph);
        self.record_renames(&report.renamed_properties);

        let text = self.storage.write_current(&graph).await?;
        self.storage.write_projection(&graph).await?;

        self.current = graph;
        self.last_text = Some(text);
        self.last_origin = origin;
        self.version += 1;

        tracing::debug!(version = self.version, ?origin, "persisted current graph");
        Ok(self.version)
    }

    /// Replace the base snapshot wholesale. Returns the new base version.
    pub async fn persist_base(&mut self, graph: Graph) -> StorageResult<u64> {
        let Normalized { graph, .. } = normalize(graph);
        self.storage.write_base(&graph).await?;
        self.base_version += 1;
        Ok(self.base_version)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn base_version(&self) -> u64 {
        self.base_version
    }

    pub fn last_origin(&self) -> WriteOrigin {
        self.last_origin
    }

    pub fn last_text(&self) -> Option<&str> {
        self.last_text.as_deref()
    }

    /// Id a property now has, following collision renames
    pub fn resolve_property_id(&self, node_id: &str, property_id: &str) -> Option<&str> {
        let node = self.current.node(node_id)?;
        if let Some(property) = node.property(property_id) {
            return Some(property.id.as_str());
        }

        let renamed = self
            .renames
            .get(&(node_id.to_string(), property_id.to_string()))?;
        node.property(renamed).map(|p| p.id.as_str())
    }

    /// Drop in-memory state; the next access reloads from storage
    pub fn clear(&mut self) {
        self.loaded = false;
        self.current = Graph::new();
        self.last_text = None;
        self.renames.clear();
        tracing::info!("cleared in-memory graph state");
    }

    fn record_renames(&mut self, renames: &[PropertyRename]) {
        for rename in renames {
            self.renames.insert(
                (rename.node_id.clone(), rename.from.clone()),
                rename.to.clone(),
            );
        }
    }
}
