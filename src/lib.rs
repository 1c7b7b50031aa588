#![forbid(unsafe_code)]

//! Session bridge between the ModelWar client and a conversational agent
//! runtime, multiplexing host commands, streamed agent output, and
//! externally-fulfilled tool invocations over two JSON-lines streams.

pub mod config;
pub mod errors;
pub mod protocol;
pub mod runtime;
pub mod session;
pub mod tools;

pub use config::BridgeConfig;
pub use errors::{AppError, Result};
