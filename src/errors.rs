//! Error types shared across the bridge.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all bridge failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Wire protocol failure: framing, serialization, or a malformed line.
    Protocol(String),
    /// Agent runtime connection or event-stream failure.
    Runtime(String),
    /// Host-side tool execution reported a failure payload.
    Tool(String),
    /// A pending tool call expired before the host resolved it.
    ToolTimeout(String),
    /// File-system or stream I/O failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::Runtime(msg) => write!(f, "runtime: {msg}"),
            Self::Tool(msg) => write!(f, "tool: {msg}"),
            Self::ToolTimeout(msg) => write!(f, "tool timeout: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
