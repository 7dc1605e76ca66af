//! # Blueprint Diff
//!
//! Compares a base snapshot (the last recorded build) with the current graph.
//!
//! ```text
//! base ──┐
//!        ├──▶ compare ──▶ GraphDiff { added / modified / deleted nodes, added / deleted edges }
//! current┘
//!
//! node + base ──▶ derive_build_state ──▶ Built | Unbuilt
//! ```
//!
//! Only a node's title and prompt count as a change. Property values are
//! live-tunable and never invalidate a build.

pub mod differ;

pub use differ::{build_states, compare, derive_build_state, BuildState, GraphDiff, NodeBuildState};
