//! Host capability catalog and the tool bridge.
//!
//! The bridge exposes host-registered capabilities to the agent runtime.
//! Execution happens back on the host: an invocation publishes a
//! `tool_request` event and suspends on a registry slot until the host's
//! `tool_response` arrives or the deadline fires. The catalog itself is
//! opaque to the bridge beyond name/argument passthrough.

pub mod registry;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::protocol::OutboundEvent;
use crate::tools::registry::{PendingCallRegistry, ToolOutcome};
use crate::{AppError, Result};

/// Declaration of one host-registered capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Capability name used in `tool_request` events.
    pub name: String,
    /// Human-readable description shown to the runtime.
    #[serde(default)]
    pub description: String,
    /// JSON schema for the argument payload.
    #[serde(default)]
    pub input_schema: serde_json::Value,
}

/// Source of the host-registered capability declarations.
pub trait ToolCatalog: Send + Sync {
    /// List the capabilities the host has registered.
    fn list(&self) -> Vec<ToolDescriptor>;
}

/// Fixed catalog backed by a descriptor list.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog(pub Vec<ToolDescriptor>);

impl ToolCatalog for StaticCatalog {
    fn list(&self) -> Vec<ToolDescriptor> {
        self.0.clone()
    }
}

/// Mediates tool invocations between the agent runtime and the host.
pub struct ToolBridge {
    registry: PendingCallRegistry,
    events: mpsc::Sender<OutboundEvent>,
    catalog: Arc<dyn ToolCatalog>,
    deadline: Duration,
}

impl ToolBridge {
    /// Build a bridge over `registry`, emitting requests through `events`.
    #[must_use]
    pub fn new(
        registry: PendingCallRegistry,
        events: mpsc::Sender<OutboundEvent>,
        catalog: Arc<dyn ToolCatalog>,
        deadline: Duration,
    ) -> Self {
        Self {
            registry,
            events,
            catalog,
            deadline,
        }
    }

    /// Capability declarations offered to the runtime at connect time.
    #[must_use]
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.catalog.list()
    }

    /// Invoke a host capability and wait for its resolution.
    ///
    /// Registers a pending call, emits a `tool_request` event carrying the
    /// fresh correlation id, and suspends until the host settles the slot.
    /// The suspension is local to the calling task; the reader keeps
    /// settling resolutions independently.
    ///
    /// # Errors
    ///
    /// - [`AppError::Tool`] — the host returned a failure payload, or the
    ///   call was abandoned at shutdown.
    /// - [`AppError::ToolTimeout`] — no resolution within the deadline; the
    ///   registry slot is purged and a later resolution is dropped.
    pub async fn invoke(&self, name: &str, arguments: serde_json::Value) -> Result<serde_json::Value> {
        let (request_id, slot) = self.registry.register().await;
        debug!(request_id = %request_id, tool = name, "tool bridge: requesting host execution");

        let request = OutboundEvent::ToolRequest {
            request_id: request_id.clone(),
            tool: name.to_owned(),
            arguments,
        };
        if self.events.send(request).await.is_err() {
            self.registry.discard(&request_id).await;
            return Err(AppError::Tool("outbound channel closed".into()));
        }

        match tokio::time::timeout(self.deadline, slot).await {
            Ok(Ok(ToolOutcome::Success(data))) => Ok(data),
            Ok(Ok(ToolOutcome::Failure(reason))) => Err(AppError::Tool(reason)),
            Ok(Err(_)) => Err(AppError::Tool(format!(
                "call '{request_id}' abandoned before resolution"
            ))),
            Err(_elapsed) => {
                self.registry.discard(&request_id).await;
                warn!(request_id = %request_id, tool = name, "tool bridge: deadline expired");
                Err(AppError::ToolTimeout(format!(
                    "no response for '{name}' within {:?}",
                    self.deadline
                )))
            }
        }
    }
}

impl std::fmt::Debug for ToolBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolBridge")
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}
