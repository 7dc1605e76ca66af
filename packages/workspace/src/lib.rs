//! # Blueprint Workspace
//!
//! Server side of graph synchronization: normalization, project storage, the
//! `GraphAuthority` that persists writes and broadcasts snapshots, and the
//! document watcher. The `blueprint-server` binary puts an HTTP surface on
//! top.

pub mod config;
pub mod normalize;
pub mod server;
pub mod state;
pub mod storage;
pub mod watcher;

pub use config::AuthorityConfig;
pub use normalize::{normalize, NormalizeReport, Normalized, PropertyRename};
pub use server::{
    AuthorityError, AuthorityResult, GraphAuthority, SnapshotUpdate, Subscription, WriteOptions,
};
pub use state::{GraphStore, WriteOrigin};
pub use storage::{ProjectStorage, StorageError, StorageResult, StoredDocument};
pub use watcher::{spawn_document_watcher, FileWatcher, WatcherError, WatcherResult};
