//! Wire protocol for the host ↔ bridge JSON-lines channel.
//!
//! One self-contained JSON message per line in each direction. The host
//! writes [`messages::InboundCommand`] lines to the bridge's stdin; the
//! bridge writes [`messages::OutboundEvent`] lines to stdout. All other
//! diagnostics go to stderr via `tracing` so the protocol stream stays
//! machine-parseable.

pub mod codec;
pub mod messages;
pub mod reader;
pub mod writer;

pub use messages::{ContentKind, InboundCommand, LogLevel, OutboundEvent};
