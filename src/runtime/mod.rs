//! Agent runtime abstraction.
//!
//! The runtime is an external collaborator reachable only through the
//! [`AgentRuntime`] trait: connect, send a query, best-effort interrupt,
//! disconnect, and a consumable event stream. Keeping it behind a trait
//! lets the session layer run against a scripted fake in tests.

pub mod process;

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::protocol::ContentKind;
use crate::Result;

/// One event from the runtime's ordered, one-directional stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    /// A streamed content block opened.
    StreamStart {
        /// Content classification.
        kind: ContentKind,
    },
    /// Incremental fragment of an open streamed block.
    StreamDelta {
        /// Content classification.
        kind: ContentKind,
        /// Fragment text.
        content: String,
    },
    /// A streamed content block closed.
    StreamStop {
        /// Content classification.
        kind: ContentKind,
    },
    /// Aggregate text block for the turn.
    TextBlock {
        /// Block text.
        content: String,
    },
    /// Aggregate reasoning block for the turn.
    ThinkingBlock {
        /// Reasoning text.
        content: String,
    },
    /// The runtime invoked one of its own tools.
    ToolUseBlock {
        /// Tool name.
        name: String,
        /// Argument payload.
        input: serde_json::Value,
    },
    /// Result of a runtime-side tool invocation.
    ToolResultBlock {
        /// Result text.
        content: String,
        /// Whether the execution failed.
        is_error: bool,
    },
    /// The runtime finished processing the current send.
    TurnCompleted {
        /// Whether the turn ended in error.
        is_error: bool,
    },
    /// The event stream itself failed; the listener will stop.
    Fatal {
        /// Failure description.
        message: String,
    },
}

/// Narrow interface to the conversational agent runtime.
///
/// Methods return boxed futures so implementations stay object-safe; the
/// coordinator owns the runtime as `Box<dyn AgentRuntime>` and runs inside
/// a spawned task, so implementations must be `Send + Sync`.
pub trait AgentRuntime: Send + Sync {
    /// Establish the session.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AppError::Runtime`] when the runtime cannot be reached.
    fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Submit a query for the next turn.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AppError::Runtime`] when the runtime rejects the send.
    fn send(&mut self, text: &str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Best-effort interruption of the in-flight turn. Completion of the
    /// interrupted turn still arrives through the event stream.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AppError::Runtime`] when the request cannot be
    /// delivered; callers treat this as non-fatal.
    fn interrupt(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Tear the session down.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AppError::Runtime`] when teardown fails; callers log
    /// and proceed.
    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Take the runtime's event stream. Yields `Some` exactly once, after a
    /// successful [`AgentRuntime::connect`].
    fn take_events(&mut self) -> Option<mpsc::Receiver<RuntimeEvent>>;
}

/// Creates a runtime per session start.
pub trait RuntimeFactory: Send + Sync {
    /// Build an unconnected runtime instance.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AppError::Runtime`] when the runtime cannot be
    /// constructed.
    fn create(&self) -> Result<Box<dyn AgentRuntime>>;
}
