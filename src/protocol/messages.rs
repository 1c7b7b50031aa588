//! Protocol message model.
//!
//! Inbound and outbound messages are disjoint serde enums, internally
//! tagged by `command` (host → bridge) and `type` (bridge → host).

use serde::{Deserialize, Serialize};

/// Content classification for streamed fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Plain response text.
    Text,
    /// Extended reasoning ("thinking") output.
    Thinking,
    /// A tool invocation block.
    ToolUse,
    /// A tool result block.
    ToolResult,
}

/// Severity attached to an outbound `log` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Diagnostic detail.
    Debug,
    /// Normal operational message.
    Info,
    /// Recoverable anomaly.
    Warning,
    /// Failure visible to the host.
    Error,
}

/// Commands accepted from the host, one JSON object per stdin line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum InboundCommand {
    /// Begin the agent session. Idempotent: a no-op while a session is live.
    StartSession,
    /// Submit a user turn, preempting any turn still in flight.
    UserMessage {
        /// Message text; an empty string is ignored.
        #[serde(default)]
        text: String,
    },
    /// Replace the context preamble prepended to the next user message.
    SetContext {
        /// API key the agent may use for authenticated requests.
        #[serde(default)]
        api_key: Option<String>,
        /// Current warrior source in the host's editor.
        #[serde(default)]
        warrior_code: Option<String>,
        /// Summary of the most recent battle.
        #[serde(default)]
        recent_battle: Option<String>,
    },
    /// Resolve a pending tool call issued through a `tool_request` event.
    ToolResponse {
        /// Correlation id from the matching `tool_request`.
        request_id: String,
        /// Result payload.
        #[serde(default)]
        data: serde_json::Value,
        /// Whether the host-side execution failed.
        #[serde(default)]
        is_error: bool,
    },
    /// Terminate the session and the bridge process.
    Shutdown,
}

/// Events emitted to the host, one JSON object per stdout line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// The agent session is connected and accepting user messages.
    SessionReady,
    /// Aggregate text block (only when no deltas streamed this turn).
    AgentText {
        /// Block text.
        content: String,
    },
    /// Aggregate reasoning block (only when no deltas streamed this turn).
    AgentThinking {
        /// Reasoning text.
        content: String,
    },
    /// The runtime invoked one of its own tools (informational).
    AgentToolUse {
        /// Tool name.
        name: String,
        /// Serialized argument payload; empty when the tool took none.
        input: String,
    },
    /// Result of a runtime-side tool invocation.
    AgentToolResult {
        /// Result text.
        content: String,
        /// Whether the tool execution failed.
        is_error: bool,
    },
    /// The bridge requests host-side execution of a registered capability.
    ToolRequest {
        /// Correlation id to echo back in `tool_response`.
        request_id: String,
        /// Capability name.
        tool: String,
        /// Argument payload, passed through opaquely.
        arguments: serde_json::Value,
    },
    /// The surviving turn completed.
    TurnEnded,
    /// Operational log line surfaced to the host.
    Log {
        /// Log text.
        message: String,
        /// Severity.
        level: LogLevel,
    },
    /// Protocol or runtime error visible to the host.
    Error {
        /// Error description.
        message: String,
    },
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
}

impl OutboundEvent {
    /// Shorthand for an [`OutboundEvent::Error`] event.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
