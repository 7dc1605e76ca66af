//! # Blueprint Editor
//!
//! Client side of graph synchronization.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ caller: drag, edit, set property            │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ SyncStore                                   │
//! │  - Apply mutations optimistically           │
//! │  - Persist through a GraphRemote            │
//! │  - Roll back on failed writes               │
//! │  - Debounce high-churn property writes      │
//! │  - Reconcile incoming snapshots             │
//! └─────────────────────────────────────────────┘
//!                     ↓ ↑
//! ┌─────────────────────────────────────────────┐
//! │ GraphAuthority: persist, broadcast          │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use blueprint_editor::{Mutation, SyncConfig, SyncStore};
//!
//! let mut store = SyncStore::new(authority.clone(), SyncConfig::default());
//! store.connect().await?;
//!
//! store
//!     .apply(Mutation::UpdateNode {
//!         node_id: "hero".to_string(),
//!         title: Some("Hero banner".to_string()),
//!         prompt: None,
//!     })
//!     .await?;
//!
//! let mut updates = authority.subscribe().await?;
//! while let Some(update) = updates.next().await {
//!     store.receive(update).await?;
//! }
//! ```

mod config;
mod debounce;
mod errors;
mod mutations;
mod reconcile;
mod remote;
mod session;

pub use config::{SyncConfig, DEFAULT_PROPERTY_DEBOUNCE, DEFAULT_SUPPRESSION};
pub use debounce::{PropertyDebouncer, QueuedWrite};
pub use errors::{SyncError, SyncResult};
pub use mutations::{Mutation, MutationError};
pub use reconcile::reconcile;
pub use remote::GraphRemote;
pub use session::{
    MutationState, PendingOperation, PendingToken, PropertyWrite, Received, SyncStore,
};
