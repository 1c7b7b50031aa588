//! Pending-call registry.
//!
//! Keyed store of outstanding tool invocations awaiting host-side
//! resolution. This is the single mutable structure shared between the
//! stdin reader task and the tool bridge; every mutation goes through the
//! internal async mutex.
//!
//! Each correlation id is a fresh UUID v4 and leaves the map exactly once:
//! resolved, rejected, purged on timeout, or abandoned at shutdown. Late or
//! duplicate settlements are logged and swallowed — they never raise.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};
use tracing::debug;
use uuid::Uuid;

/// Settled outcome of a host-fulfilled tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// The host executed the tool and returned a payload.
    Success(serde_json::Value),
    /// The host reported a failure reason.
    Failure(String),
}

/// Thread-safe registry of pending tool calls keyed by correlation id.
///
/// Cheap to clone; all clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct PendingCallRegistry {
    slots: Arc<Mutex<HashMap<String, oneshot::Sender<ToolOutcome>>>>,
}

impl PendingCallRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh correlation id and its result slot.
    ///
    /// The caller awaits the returned receiver; the registry keeps the
    /// sender until the call is settled or abandoned.
    pub async fn register(&self) -> (String, oneshot::Receiver<ToolOutcome>) {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.slots.lock().await.insert(id.clone(), tx);
        debug!(request_id = %id, "registry: pending call registered");
        (id, rx)
    }

    /// Settle the call `id` with a success payload.
    ///
    /// Unknown or already-settled ids are logged and ignored.
    pub async fn resolve(&self, id: &str, data: serde_json::Value) {
        self.settle(id, ToolOutcome::Success(data)).await;
    }

    /// Settle the call `id` with a failure reason.
    ///
    /// Unknown or already-settled ids are logged and ignored.
    pub async fn reject(&self, id: &str, reason: String) {
        self.settle(id, ToolOutcome::Failure(reason)).await;
    }

    /// Remove the slot for `id` without settling it (timeout purge).
    ///
    /// Returns `true` when a slot was present.
    pub async fn discard(&self, id: &str) -> bool {
        let removed = self.slots.lock().await.remove(id).is_some();
        if removed {
            debug!(request_id = %id, "registry: pending call discarded");
        }
        removed
    }

    /// Settle every still-open slot with `reason`. Used at shutdown.
    pub async fn abandon_all(&self, reason: &str) {
        let drained: Vec<_> = self.slots.lock().await.drain().collect();
        if drained.is_empty() {
            return;
        }
        debug!(count = drained.len(), reason, "registry: abandoning pending calls");
        for (id, tx) in drained {
            if tx.send(ToolOutcome::Failure(reason.to_owned())).is_err() {
                debug!(request_id = %id, "registry: waiter already gone during abandon");
            }
        }
    }

    /// Number of calls currently awaiting resolution.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// Whether no calls are awaiting resolution.
    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }

    async fn settle(&self, id: &str, outcome: ToolOutcome) {
        let Some(tx) = self.slots.lock().await.remove(id) else {
            debug!(request_id = %id, "registry: unknown or already-settled id, ignoring");
            return;
        };
        if tx.send(outcome).is_err() {
            // Waiter timed out between our lookup and the send.
            debug!(request_id = %id, "registry: waiter gone, resolution dropped");
        }
    }
}
