//! Coalescing queue for high-churn property writes.
//!
//! The first change to a property opens a window; changes inside the window
//! replace the queued value without moving its deadline, so a continuous
//! stream of edits is persisted at most once per window.

use crate::session::PendingToken;
use blueprint_model::FieldValue;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct QueuedWrite {
    pub node_id: String,
    pub property_id: String,
    pub value: FieldValue,
    /// Pending operation this write confirms or fails
    pub token: PendingToken,
    pub due: Instant,
}

#[derive(Debug)]
pub struct PropertyDebouncer {
    window: Duration,
    queued: Vec<QueuedWrite>,
}

impl PropertyDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            queued: Vec::new(),
        }
    }

    pub fn queued(&self, node_id: &str, property_id: &str) -> Option<&QueuedWrite> {
        self.queued
            .iter()
            .find(|w| w.node_id == node_id && w.property_id == property_id)
    }

    /// Replace the value of an already queued write. Returns its token, or
    /// `None` when nothing is queued for this property.
    pub fn coalesce(
        &mut self,
        node_id: &str,
        property_id: &str,
        value: FieldValue,
    ) -> Option<PendingToken> {
        let write = self
            .queued
            .iter_mut()
            .find(|w| w.node_id == node_id && w.property_id == property_id)?;
        write.value = value;
        Some(write.token)
    }

    pub fn push(
        &mut self,
        node_id: impl Into<String>,
        property_id: impl Into<String>,
        value: FieldValue,
        token: PendingToken,
    ) {
        self.queued.push(QueuedWrite {
            node_id: node_id.into(),
            property_id: property_id.into(),
            value,
            token,
            due: Instant::now() + self.window,
        });
    }

    /// Remove and return every write due at `now`, oldest first
    pub fn take_due(&mut self, now: Instant) -> Vec<QueuedWrite> {
        let (due, rest) = std::mem::take(&mut self.queued)
            .into_iter()
            .partition(|w| w.due <= now);
        self.queued = rest;
        due
    }

    pub fn take_all(&mut self) -> Vec<QueuedWrite> {
        std::mem::take(&mut self.queued)
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.queued.iter().map(|w| w.due).min()
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }
}
