//! # Sync Store
//!
//! One client's view of the graph: a local belief that is edited
//! optimistically and kept in step with the authority's snapshots.
//!
//! ## Pending operations
//!
//! ```text
//! Idle ──begin──▶ Applying ──confirm──▶ Idle
//!                    │
//!                    └──fail──▶ RolledBack ──take_error──▶ Idle
//! ```
//!
//! Every optimistic mutation holds a `PendingToken` until the remote write
//! settles. While any token is held, incoming snapshots are deferred (latest
//! wins) and applied once the last token is released. A token whose deadline
//! passes is released by `expire_pending` without rolling back.

use crate::config::SyncConfig;
use crate::debounce::{PropertyDebouncer, QueuedWrite};
use crate::errors::{SyncError, SyncResult};
use crate::mutations::{Mutation, MutationError};
use crate::reconcile::reconcile;
use crate::remote::GraphRemote;
use blueprint_diff::{compare, derive_build_state, BuildState, GraphDiff};
use blueprint_model::{coerce_scalar, flatten, FieldValue, Graph, Position};
use blueprint_workspace::SnapshotUpdate;
use std::collections::{BTreeMap, HashSet};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PendingToken(pub u64);

/// Optimistic mutation waiting for its remote write to settle
#[derive(Debug, Clone)]
pub struct PendingOperation {
    pub token: PendingToken,
    pub mutation: Mutation,
    /// Local graph right before the mutation
    pub snapshot: Graph,
    pub deadline: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Idle,
    Applying { pending: usize },
    /// The last failed write was rolled back; its error is not taken yet
    RolledBack,
}

/// What `receive` did with a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    Applied,
    Deferred,
    Stale,
}

/// What `set_property` did with a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyWrite {
    Unchanged,
    Queued,
    Persisted(u64),
}

pub struct SyncStore<R: GraphRemote> {
    remote: R,
    config: SyncConfig,

    local: Graph,
    base: Option<Graph>,
    base_outdated: bool,

    /// Nodes under exclusive local manipulation, e.g. a drag
    manipulating: HashSet<String>,

    pending: Vec<PendingOperation>,
    next_token: u64,

    /// `(version, base_version)` of the last snapshot applied
    last_applied: Option<(u64, u64)>,
    /// Version of our own latest persisted write
    own_version: u64,
    deferred: Option<SnapshotUpdate>,

    error: Option<SyncError>,
    debouncer: PropertyDebouncer,
}

impl<R: GraphRemote> SyncStore<R> {
    pub fn new(remote: R, config: SyncConfig) -> Self {
        Self {
            debouncer: PropertyDebouncer::new(config.property_debounce),
            remote,
            config,
            local: Graph::new(),
            base: None,
            base_outdated: false,
            manipulating: HashSet::new(),
            pending: Vec::new(),
            next_token: 0,
            last_applied: None,
            own_version: 0,
            deferred: None,
            error: None,
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn graph(&self) -> &Graph {
        &self.local
    }

    pub fn base(&self) -> Option<&Graph> {
        self.base.as_ref()
    }

    pub fn last_applied_version(&self) -> Option<u64> {
        self.last_applied.map(|(version, _)| version)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn has_deferred(&self) -> bool {
        self.deferred.is_some()
    }

    pub fn is_manipulating(&self, node_id: &str) -> bool {
        self.manipulating.contains(node_id)
    }

    pub fn state(&self) -> MutationState {
        if !self.pending.is_empty() {
            MutationState::Applying {
                pending: self.pending.len(),
            }
        } else if self.error.is_some() {
            MutationState::RolledBack
        } else {
            MutationState::Idle
        }
    }

    /// Last surfaced error, cleared on read
    pub fn take_error(&mut self) -> Option<SyncError> {
        self.error.take()
    }

    // ========================================================================
    // Authoritative reads
    // ========================================================================

    /// First load from the authority. Versions are only comparable within
    /// one authority process, so everything version-related starts over.
    pub async fn connect(&mut self) -> SyncResult<()> {
        self.last_applied = None;
        self.own_version = 0;
        self.deferred = None;
        self.refresh().await
    }

    /// Replace the local graph with the authority's, including deletions.
    /// Manipulated nodes keep their local position and pending mutations are
    /// replayed on top.
    pub async fn refresh(&mut self) -> SyncResult<()> {
        let snapshot = self.remote.fetch_current().await?;
        let mut graph = snapshot.graph()?;
        let base = self.remote.fetch_base().await?;

        self.hold_manipulated(&mut graph);
        self.replay_from(graph, 0);
        self.base = base;
        self.base_outdated = false;
        self.last_applied = Some((snapshot.version, snapshot.base_version));
        if self
            .deferred
            .as_ref()
            .is_some_and(|deferred| !self.is_fresh(deferred))
        {
            self.deferred = None;
        }

        tracing::info!(
            version = snapshot.version,
            nodes = self.local.nodes.len(),
            "refreshed from authority"
        );
        Ok(())
    }

    /// Feed one snapshot from the authority's stream
    pub async fn receive(&mut self, update: SnapshotUpdate) -> SyncResult<Received> {
        self.expire_pending();

        if !self.is_fresh(&update) {
            tracing::debug!(version = update.version, "ignoring stale snapshot");
            return Ok(Received::Stale);
        }

        if !self.pending.is_empty() {
            tracing::debug!(
                version = update.version,
                pending = self.pending.len(),
                "deferring snapshot behind pending operations"
            );
            let replace = self.deferred.as_ref().map_or(true, |deferred| {
                update.version >= deferred.version || update.base_version > deferred.base_version
            });
            if replace {
                self.deferred = Some(update);
            }
            return Ok(Received::Deferred);
        }

        self.apply_snapshot(&update)?;
        self.sync_base().await?;
        Ok(Received::Applied)
    }

    // ========================================================================
    // Optimistic mutations
    // ========================================================================

    /// Apply locally, persist the whole graph, then confirm or roll back
    pub async fn apply(&mut self, mutation: Mutation) -> SyncResult<u64> {
        let token = self.begin(mutation)?;
        let result = self
            .remote
            .write_current(self.local.clone(), self.config.broadcast_own_writes)
            .await;
        let version = self.settle(token, result)?;
        self.sync_base().await?;
        Ok(version)
    }

    /// Apply `mutation` locally and hold a pending token for it
    pub fn begin(&mut self, mutation: Mutation) -> SyncResult<PendingToken> {
        let snapshot = self.local.clone();
        mutation.apply(&mut self.local)?;

        self.next_token += 1;
        let token = PendingToken(self.next_token);
        tracing::debug!(?token, mutation = mutation.name(), "applied optimistic mutation");

        self.pending.push(PendingOperation {
            token,
            mutation,
            snapshot,
            deadline: Instant::now() + self.config.suppression,
        });
        Ok(token)
    }

    /// The write behind `token` was persisted as `version`
    pub fn confirm(&mut self, token: PendingToken, version: u64) {
        let Some(index) = self.position(token) else {
            tracing::debug!(?token, "confirmation for an operation no longer pending");
            return;
        };

        let op = self.pending.remove(index);
        self.own_version = self.own_version.max(version);
        tracing::debug!(?token, version, mutation = op.mutation.name(), "confirmed");
        self.apply_deferred();
    }

    /// The write behind `token` failed: roll its mutation back and surface
    /// `error`. Later pending mutations are replayed on the restored graph.
    pub fn fail(&mut self, token: PendingToken, error: SyncError) {
        match self.position(token) {
            Some(index) => {
                let op = self.pending.remove(index);
                tracing::warn!(
                    ?token,
                    mutation = op.mutation.name(),
                    error = %error,
                    "write failed, rolling back"
                );
                let mut graph = op.snapshot;
                self.hold_manipulated(&mut graph);
                self.replay_from(graph, index);
            }
            None => tracing::warn!(?token, error = %error, "write failed after its operation expired"),
        }

        self.error = Some(error);
        self.apply_deferred();
    }

    /// Release pending operations past their deadline. Their optimistic
    /// state stays. Returns how many were released.
    pub fn expire_pending(&mut self) -> usize {
        let now = Instant::now();
        let before = self.pending.len();

        self.pending.retain(|op| {
            let expired = op.deadline <= now;
            if expired {
                tracing::warn!(
                    token = ?op.token,
                    mutation = op.mutation.name(),
                    "pending operation timed out, lifting suppression"
                );
            }
            !expired
        });

        let expired = before - self.pending.len();
        if expired > 0 {
            self.apply_deferred();
        }
        expired
    }

    // ========================================================================
    // Manipulation
    // ========================================================================

    pub fn begin_manipulation(&mut self, node_id: &str) -> SyncResult<()> {
        if !self.local.contains_node(node_id) {
            return Err(MutationError::NodeNotFound(node_id.to_string()).into());
        }
        self.manipulating.insert(node_id.to_string());
        tracing::trace!(node_id, "manipulation started");
        Ok(())
    }

    /// Move a manipulated node locally without persisting
    pub fn drag(&mut self, node_id: &str, position: Position) -> SyncResult<()> {
        if !self.manipulating.contains(node_id) {
            return Err(SyncError::NotManipulating(node_id.to_string()));
        }
        let node = self
            .local
            .node_mut(node_id)
            .ok_or_else(|| MutationError::NodeNotFound(node_id.to_string()))?;
        node.position = position;
        Ok(())
    }

    /// Persist the final position. `None` when the node disappeared during
    /// the manipulation.
    pub async fn end_manipulation(&mut self, node_id: &str) -> SyncResult<Option<u64>> {
        if !self.manipulating.remove(node_id) {
            return Err(SyncError::NotManipulating(node_id.to_string()));
        }

        let Some(position) = self.local.node(node_id).map(|n| n.position) else {
            return Ok(None);
        };

        let version = self
            .apply(Mutation::MoveNode {
                node_id: node_id.to_string(),
                position,
            })
            .await?;
        Ok(Some(version))
    }

    // ========================================================================
    // Properties
    // ========================================================================

    /// Change one property. Continuous kinds are queued and persisted once
    /// per debounce window, other kinds are persisted right away. A value
    /// equal to the current one is dropped.
    pub async fn set_property(
        &mut self,
        node_id: &str,
        property_id: &str,
        value: FieldValue,
    ) -> SyncResult<PropertyWrite> {
        let (value, continuous) = {
            let property = self
                .local
                .node(node_id)
                .ok_or_else(|| MutationError::NodeNotFound(node_id.to_string()))?
                .property(property_id)
                .ok_or_else(|| MutationError::PropertyNotFound {
                    node: node_id.to_string(),
                    property: property_id.to_string(),
                })?;

            let value = match value {
                FieldValue::Text(raw) if !property.kind.is_composite() => {
                    coerce_scalar(&property.kind, &raw)
                }
                other => other,
            };

            if property.value == value {
                tracing::trace!(node_id, property_id, "property unchanged");
                return Ok(PropertyWrite::Unchanged);
            }
            (value, property.kind.is_continuous())
        };

        let mutation = Mutation::SetProperty {
            node_id: node_id.to_string(),
            property_id: property_id.to_string(),
            value: value.clone(),
        };

        if !continuous {
            let token = self.begin(mutation)?;
            let result = self
                .remote
                .patch_property(node_id, property_id, value, self.config.broadcast_own_writes)
                .await;
            let version = self.settle(token, result)?;
            self.sync_base().await?;
            return Ok(PropertyWrite::Persisted(version));
        }

        if let Some(token) = self.debouncer.coalesce(node_id, property_id, value.clone()) {
            mutation.apply(&mut self.local)?;
            // a rollback or replay must see the latest value
            if let Some(op) = self.pending.iter_mut().find(|op| op.token == token) {
                op.mutation = mutation;
            }
            return Ok(PropertyWrite::Queued);
        }

        let token = self.begin(mutation)?;
        self.debouncer.push(node_id, property_id, value, token);
        Ok(PropertyWrite::Queued)
    }

    /// Persist queued property writes whose window has closed. Returns how
    /// many writes were attempted; failures surface through `take_error`.
    pub async fn flush_due(&mut self) -> usize {
        let writes = self.debouncer.take_due(Instant::now());
        self.flush(writes).await
    }

    /// Persist every queued property write now
    pub async fn flush_all(&mut self) -> usize {
        let writes = self.debouncer.take_all();
        self.flush(writes).await
    }

    /// When the next queued property write falls due
    pub fn next_flush(&self) -> Option<Instant> {
        self.debouncer.next_due()
    }

    // ========================================================================
    // Derived views
    // ========================================================================

    pub fn build_state(&self, node_id: &str) -> Option<BuildState> {
        self.local
            .node(node_id)
            .map(|node| derive_build_state(node, self.base.as_ref()))
    }

    pub fn diff(&self) -> GraphDiff {
        compare(self.base.as_ref(), &self.local)
    }

    /// Flat id → value map for a live preview
    pub fn preview(&self) -> BTreeMap<String, FieldValue> {
        flatten(&self.local)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn flush(&mut self, writes: Vec<QueuedWrite>) -> usize {
        let count = writes.len();
        for write in writes {
            let result = self
                .remote
                .patch_property(
                    &write.node_id,
                    &write.property_id,
                    write.value,
                    self.config.broadcast_own_writes,
                )
                .await;
            match result {
                Ok(version) => self.confirm(write.token, version),
                Err(e) => self.fail(write.token, e),
            }
        }

        if let Err(e) = self.sync_base().await {
            tracing::warn!(error = %e, "failed to refresh base snapshot");
        }
        count
    }

    fn settle(&mut self, token: PendingToken, result: SyncResult<u64>) -> SyncResult<u64> {
        match result {
            Ok(version) => {
                self.confirm(token, version);
                Ok(version)
            }
            Err(e) => {
                self.fail(token, e.clone());
                Err(e)
            }
        }
    }

    fn position(&self, token: PendingToken) -> Option<usize> {
        self.pending.iter().position(|op| op.token == token)
    }

    /// Snapshots taken before our latest write, or not newer than the last
    /// one applied, carry nothing we should show
    fn is_fresh(&self, update: &SnapshotUpdate) -> bool {
        if update.version < self.own_version {
            return false;
        }
        match self.last_applied {
            Some((version, base_version)) => {
                update.version > version || update.base_version > base_version
            }
            None => true,
        }
    }

    fn apply_snapshot(&mut self, update: &SnapshotUpdate) -> SyncResult<()> {
        let incoming = update.graph()?;
        self.local = reconcile(&self.local, &incoming);

        if self
            .last_applied
            .map_or(true, |(_, base_version)| base_version != update.base_version)
        {
            self.base_outdated = true;
        }
        self.last_applied = Some((update.version, update.base_version));

        tracing::debug!(version = update.version, "applied snapshot");
        Ok(())
    }

    fn apply_deferred(&mut self) {
        if !self.pending.is_empty() {
            return;
        }
        let Some(update) = self.deferred.take() else {
            return;
        };

        if !self.is_fresh(&update) {
            tracing::debug!(version = update.version, "dropping deferred snapshot, now stale");
            return;
        }
        if let Err(e) = self.apply_snapshot(&update) {
            tracing::warn!(version = update.version, error = %e, "dropping undecodable snapshot");
        }
    }

    async fn sync_base(&mut self) -> SyncResult<()> {
        if self.base_outdated {
            self.base = self.remote.fetch_base().await?;
            self.base_outdated = false;
        }
        Ok(())
    }

    /// Restart from `graph` and re-apply pending mutations from `start` on.
    /// Mutations that no longer apply are dropped.
    /// Carry live positions of nodes under manipulation into `graph`
    fn hold_manipulated(&self, graph: &mut Graph) {
        for node in &mut graph.nodes {
            if self.manipulating.contains(&node.id) {
                if let Some(local) = self.local.node(&node.id) {
                    node.position = local.position;
                }
            }
        }
    }

    fn replay_from(&mut self, graph: Graph, start: usize) {
        self.local = graph;

        let mut kept = Vec::with_capacity(self.pending.len());
        for (index, mut op) in std::mem::take(&mut self.pending).into_iter().enumerate() {
            if index >= start {
                op.snapshot = self.local.clone();
                if let Err(e) = op.mutation.apply(&mut self.local) {
                    tracing::warn!(
                        token = ?op.token,
                        mutation = op.mutation.name(),
                        error = %e,
                        "dropping pending mutation that no longer applies"
                    );
                    continue;
                }
            }
            kept.push(op);
        }
        self.pending = kept;
    }
}
