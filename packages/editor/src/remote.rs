//! Seam between a `SyncStore` and the authority it persists through.

use crate::errors::SyncResult;
use async_trait::async_trait;
use blueprint_model::{FieldValue, Graph};
use blueprint_workspace::{GraphAuthority, SnapshotUpdate, WriteOptions};

/// Write path and authoritative reads of one project scope.
///
/// Every write made through this trait is interactive: `broadcast` decides
/// whether the authority echoes it to subscribers.
#[async_trait]
pub trait GraphRemote: Send + Sync {
    /// Current document with its versions
    async fn fetch_current(&self) -> SyncResult<SnapshotUpdate>;

    async fn fetch_base(&self) -> SyncResult<Option<Graph>>;

    /// Replace the current graph. Returns the new version.
    async fn write_current(&self, graph: Graph, broadcast: bool) -> SyncResult<u64>;

    /// Set one property of one node. Returns the new version.
    async fn patch_property(
        &self,
        node_id: &str,
        property_id: &str,
        value: FieldValue,
        broadcast: bool,
    ) -> SyncResult<u64>;
}

#[async_trait]
impl GraphRemote for GraphAuthority {
    async fn fetch_current(&self) -> SyncResult<SnapshotUpdate> {
        Ok(self.snapshot().await?)
    }

    async fn fetch_base(&self) -> SyncResult<Option<Graph>> {
        Ok(self.base().await?)
    }

    async fn write_current(&self, graph: Graph, broadcast: bool) -> SyncResult<u64> {
        Ok(self.write(graph, WriteOptions::interactive(broadcast)).await?)
    }

    async fn patch_property(
        &self,
        node_id: &str,
        property_id: &str,
        value: FieldValue,
        broadcast: bool,
    ) -> SyncResult<u64> {
        Ok(GraphAuthority::patch_property(
            self,
            node_id,
            property_id,
            value,
            WriteOptions::interactive(broadcast),
        )
        .await?)
    }
}
