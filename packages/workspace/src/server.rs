//! # Graph Authority
//!
//! Owns the canonical graph for one project scope and fans snapshots out to
//! subscribers.
//!
//! ```text
//!  write / patch ──▶ normalize ──▶ persist ──▶ request broadcast
//!                                                   │
//!                            ┌──────────────────────┘
//!                            ▼
//!                 broadcaster task: first request opens the window,
//!                 later ones join it, one snapshot is sent when it closes
//!                            │
//!                  tokio::sync::broadcast (bounded)
//!                  ├──▶ Subscription ──▶ SSE client
//!                  └──▶ Subscription ──▶ SyncStore
//! ```
//!
//! A subscriber that falls more than `subscriber_buffer` updates behind is
//! dropped; the others are unaffected and the write path never waits on
//! delivery.

use crate::config::AuthorityConfig;
use crate::state::{GraphStore, WriteOrigin};
use crate::storage::{ProjectStorage, StorageError};
use blueprint_codec::{decode, encode, DecodeError};
use blueprint_diff::{build_states, compare, GraphDiff, NodeBuildState};
use blueprint_model::{coerce_scalar, flatten, FieldValue, Graph};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{mpsc, Mutex};

#[derive(Error, Debug)]
pub enum AuthorityError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Invalid document: {0}")]
    Decode(#[from] DecodeError),

    #[error("Unknown node `{0}`")]
    UnknownNode(String),

    #[error("Node `{node}` has no property `{property}`")]
    UnknownProperty { node: String, property: String },
}

pub type AuthorityResult<T> = Result<T, AuthorityError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub origin: WriteOrigin,
    /// Only consulted for interactive writes
    pub broadcast: bool,
}

impl WriteOptions {
    pub fn agent() -> Self {
        Self {
            origin: WriteOrigin::Agent,
            broadcast: true,
        }
    }

    pub fn interactive(broadcast: bool) -> Self {
        Self {
            origin: WriteOrigin::Interactive,
            broadcast,
        }
    }

    pub fn external() -> Self {
        Self {
            origin: WriteOrigin::External,
            broadcast: true,
        }
    }

    pub fn should_broadcast(&self) -> bool {
        self.broadcast || self.origin != WriteOrigin::Interactive
    }
}

/// One broadcast: the full encoded current document plus its versions
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotUpdate {
    pub version: u64,
    pub base_version: u64,
    pub document: String,
    pub origin: WriteOrigin,
    pub timestamp: DateTime<Utc>,
}

impl SnapshotUpdate {
    pub fn graph(&self) -> Result<Graph, DecodeError> {
        decode(&self.document)
    }

    fn is_newer_than(&self, (version, base_version): (u64, u64)) -> bool {
        self.version > version || self.base_version > base_version
    }
}

/// Receiving end of the snapshot stream. Dropping it unsubscribes.
pub struct Subscription {
    initial: Option<SnapshotUpdate>,
    receiver: Option<broadcast::Receiver<SnapshotUpdate>>,
    last: (u64, u64),
}

impl Subscription {
    /// Next snapshot: the current one first, then one per broadcast.
    /// `None` once the authority is gone or this subscriber was dropped for
    /// falling behind.
    pub async fn next(&mut self) -> Option<SnapshotUpdate> {
        if let Some(initial) = self.initial.take() {
            self.last = (initial.version, initial.base_version);
            return Some(initial);
        }

        loop {
            let receiver = self.receiver.as_mut()?;
            match receiver.recv().await {
                Ok(update) if update.is_newer_than(self.last) => {
                    self.last = (update.version, update.base_version);
                    return Some(update);
                }
                // already delivered as the initial snapshot
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber fell behind, dropping it");
                    self.receiver = None;
                    return None;
                }
                Err(RecvError::Closed) => {
                    self.receiver = None;
                    return None;
                }
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.initial.is_none() && self.receiver.is_none()
    }
}

struct Inner {
    config: AuthorityConfig,
    store: Mutex<GraphStore>,
    updates: broadcast::Sender<SnapshotUpdate>,
    requests: mpsc::UnboundedSender<()>,
}

impl Inner {
    async fn snapshot(&self) -> AuthorityResult<SnapshotUpdate> {
        let mut store = self.store.lock().await;
        let document = encode(store.current().await?);
        Ok(SnapshotUpdate {
            version: store.version(),
            base_version: store.base_version(),
            document,
            origin: store.last_origin(),
            timestamp: Utc::now(),
        })
    }
}

/// Cloneable handle to the canonical graph of one project scope
#[derive(Clone)]
pub struct GraphAuthority {
    inner: Arc<Inner>,
}

impl GraphAuthority {
    /// Create the authority and spawn its broadcaster on the current tokio
    /// runtime.
    pub fn new(config: AuthorityConfig) -> Self {
        let (updates, _) = broadcast::channel(config.subscriber_buffer.max(1));
        let (requests, receiver) = mpsc::unbounded_channel();
        let window = config.broadcast_window;

        let inner = Arc::new(Inner {
            store: Mutex::new(GraphStore::new(ProjectStorage::new(&config))),
            config,
            updates,
            requests,
        });

        tokio::spawn(run_broadcaster(Arc::downgrade(&inner), receiver, window));

        Self { inner }
    }

    pub fn config(&self) -> &AuthorityConfig {
        &self.inner.config
    }

    /// Current document with its versions, as a subscriber would receive it
    pub async fn snapshot(&self) -> AuthorityResult<SnapshotUpdate> {
        self.inner.snapshot().await
    }

    pub async fn current(&self) -> AuthorityResult<Graph> {
        let mut store = self.inner.store.lock().await;
        Ok(store.current().await?.clone())
    }

    /// Current graph in document form
    pub async fn current_document(&self) -> AuthorityResult<String> {
        let mut store = self.inner.store.lock().await;
        Ok(encode(store.current().await?))
    }

    pub async fn base(&self) -> AuthorityResult<Option<Graph>> {
        let store = self.inner.store.lock().await;
        Ok(store.base().await?)
    }

    pub async fn diff(&self) -> AuthorityResult<GraphDiff> {
        let mut store = self.inner.store.lock().await;
        let base = store.base().await?;
        Ok(compare(base.as_ref(), store.current().await?))
    }

    pub async fn build_states(&self) -> AuthorityResult<Vec<NodeBuildState>> {
        let mut store = self.inner.store.lock().await;
        let base = store.base().await?;
        Ok(build_states(store.current().await?, base.as_ref()))
    }

    /// Flat id → value map of every leaf property
    pub async fn projection(&self) -> AuthorityResult<BTreeMap<String, FieldValue>> {
        let mut store = self.inner.store.lock().await;
        Ok(flatten(store.current().await?))
    }

    /// Replace the current graph. Returns the new version.
    pub async fn write(&self, graph: Graph, options: WriteOptions) -> AuthorityResult<u64> {
        let version = {
            let mut store = self.inner.store.lock().await;
            store.persist(graph, options.origin).await?
        };

        tracing::info!(version, origin = ?options.origin, "accepted graph write");
        if options.should_broadcast() {
            self.request_broadcast();
        }
        Ok(version)
    }

    /// Decode document text and write it
    pub async fn write_document(&self, text: &str, options: WriteOptions) -> AuthorityResult<u64> {
        let graph = decode(text)?;
        self.write(graph, options).await
    }

    /// Replace the base snapshot; `None` records the current graph as built.
    /// Returns the new base version.
    pub async fn record_build(&self, graph: Option<Graph>) -> AuthorityResult<u64> {
        let base_version = {
            let mut store = self.inner.store.lock().await;
            let graph = match graph {
                Some(graph) => graph,
                None => store.current().await?.clone(),
            };
            store.persist_base(graph).await?
        };

        tracing::info!(base_version, "recorded build");
        self.request_broadcast();
        Ok(base_version)
    }

    /// Set one property of one node. Ids renamed by collision handling are
    /// resolved, and text for scalar kinds is coerced by the declared kind.
    pub async fn patch_property(
        &self,
        node_id: &str,
        property_id: &str,
        value: FieldValue,
        options: WriteOptions,
    ) -> AuthorityResult<u64> {
        let version = {
            let mut store = self.inner.store.lock().await;
            let mut graph = store.current().await?.clone();

            let Some(resolved) = store
                .resolve_property_id(node_id, property_id)
                .map(str::to_string)
            else {
                return Err(if graph.contains_node(node_id) {
                    AuthorityError::UnknownProperty {
                        node: node_id.to_string(),
                        property: property_id.to_string(),
                    }
                } else {
                    AuthorityError::UnknownNode(node_id.to_string())
                });
            };

            let property = graph
                .node_mut(node_id)
                .and_then(|node| node.property_mut(&resolved))
                .ok_or_else(|| AuthorityError::UnknownProperty {
                    node: node_id.to_string(),
                    property: property_id.to_string(),
                })?;

            property.value = match value {
                FieldValue::Text(raw) if !property.kind.is_composite() => {
                    coerce_scalar(&property.kind, &raw)
                }
                other => other,
            };

            store.persist(graph, options.origin).await?
        };

        tracing::info!(version, node_id, property_id, "patched property");
        if options.should_broadcast() {
            self.request_broadcast();
        }
        Ok(version)
    }

    /// Re-read the current document after an outside edit. Text identical to
    /// what was last read or written is ignored. Returns the new version when
    /// a write happened.
    pub async fn reload_external(&self) -> AuthorityResult<Option<u64>> {
        let text = {
            let store = self.inner.store.lock().await;
            match store.storage().read_current_text().await? {
                Some(text) if store.last_text() != Some(text.as_str()) => text,
                _ => return Ok(None),
            }
        };

        tracing::info!("current document changed on disk");
        let version = self.write_document(&text, WriteOptions::external()).await?;
        Ok(Some(version))
    }

    /// Subscribe to snapshots. The first item is the current snapshot.
    pub async fn subscribe(&self) -> AuthorityResult<Subscription> {
        // subscribe before reading so no broadcast falls in between
        let receiver = self.inner.updates.subscribe();
        let initial = self.inner.snapshot().await?;
        tracing::info!(
            version = initial.version,
            subscribers = self.subscriber_count(),
            "new subscriber"
        );

        Ok(Subscription {
            last: (initial.version, initial.base_version),
            initial: Some(initial),
            receiver: Some(receiver),
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.updates.receiver_count()
    }

    /// Drop the in-memory graph; the next access reloads from storage
    pub async fn clear(&self) {
        self.inner.store.lock().await.clear();
    }

    fn request_broadcast(&self) {
        if self.inner.requests.send(()).is_err() {
            tracing::warn!("broadcaster is not running, snapshot not sent");
        }
    }
}

async fn run_broadcaster(
    inner: Weak<Inner>,
    mut requests: mpsc::UnboundedReceiver<()>,
    window: Duration,
) {
    while requests.recv().await.is_some() {
        tokio::time::sleep(window).await;

        let mut joined = 0usize;
        while requests.try_recv().is_ok() {
            joined += 1;
        }

        let Some(inner) = inner.upgrade() else {
            break;
        };

        match inner.snapshot().await {
            Ok(update) => {
                let version = update.version;
                match inner.updates.send(update) {
                    Ok(receivers) => {
                        tracing::info!(version, receivers, joined, "broadcast snapshot")
                    }
                    Err(_) => tracing::debug!(version, "no subscribers for snapshot"),
                }
            }
            Err(e) => tracing::error!(error = %e, "failed to build snapshot for broadcast"),
        }
    }

    tracing::debug!("broadcaster stopped");
}
