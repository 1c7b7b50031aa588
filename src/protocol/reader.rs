//! Inbound reader task — the dual-channel input demultiplexer.
//!
//! The coordinator's command loop can block for the length of an agent turn,
//! and a turn may itself be waiting on a `tool_response` that arrives on the
//! same stdin stream the coordinator would otherwise be reading. This task
//! breaks that cycle: it parses every inbound line itself, settles
//! `tool_response` messages against the [`PendingCallRegistry`] immediately,
//! and queues everything else for the coordinator to drain at its own pace.
//!
//! Tool resolutions are therefore serviceable at all times, no matter what
//! the coordinator is doing.

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::protocol::codec::{BridgeCodec, InboundFrame, MAX_LINE_BYTES};
use crate::protocol::{InboundCommand, OutboundEvent};
use crate::tools::registry::PendingCallRegistry;
use crate::Result;

/// Read JSON lines from `input` until EOF or cancellation.
///
/// - `tool_response` lines settle `registry` directly, bypassing the queue.
/// - Every other recognized command is sent to `command_tx`.
/// - A line that fails to parse produces one [`OutboundEvent::Error`]
///   echoing the raw text and is otherwise ignored; an over-limit line
///   produces one error event and is discarded. In both cases the stream
///   stays synchronized on the next newline.
/// - EOF and unrecoverable stream errors enqueue an implicit
///   [`InboundCommand::Shutdown`] before returning.
///
/// # Errors
///
/// Returns `Ok(())` on clean EOF or cancellation; stream-level failures are
/// converted into the implicit shutdown rather than surfaced to the caller.
pub async fn run_reader<R>(
    input: R,
    command_tx: mpsc::Sender<InboundCommand>,
    registry: PendingCallRegistry,
    event_tx: mpsc::Sender<OutboundEvent>,
    cancel: CancellationToken,
) -> Result<()>
where
    R: AsyncRead + Unpin + Send,
{
    let mut framed = FramedRead::new(input, BridgeCodec::new());

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("reader: cancellation received, stopping");
                break;
            }

            item = framed.next() => {
                match item {
                    None => {
                        debug!("reader: EOF on input stream, requesting shutdown");
                        let _ = command_tx.send(InboundCommand::Shutdown).await;
                        break;
                    }

                    Some(Ok(InboundFrame::Oversize)) => {
                        warn!("reader: oversized line discarded");
                        let _ = event_tx
                            .send(OutboundEvent::error(format!(
                                "line too long: exceeded {MAX_LINE_BYTES} bytes"
                            )))
                            .await;
                    }

                    Some(Err(e)) => {
                        warn!(error = %e, "reader: input stream error, requesting shutdown");
                        let _ = command_tx.send(InboundCommand::Shutdown).await;
                        break;
                    }

                    Some(Ok(InboundFrame::Line(line))) => {
                        if dispatch_line(&line, &command_tx, &registry, &event_tx).await {
                            debug!("reader: command queue closed, stopping");
                            break;
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

/// Parse and route one inbound line. Returns `true` when the command queue
/// is gone and the reader should stop.
async fn dispatch_line(
    line: &str,
    command_tx: &mpsc::Sender<InboundCommand>,
    registry: &PendingCallRegistry,
    event_tx: &mpsc::Sender<OutboundEvent>,
) -> bool {
    if line.trim().is_empty() {
        return false;
    }

    let command: InboundCommand = match serde_json::from_str(line) {
        Ok(command) => command,
        Err(_) => {
            let _ = event_tx
                .send(OutboundEvent::error(format!("Invalid JSON: {line}")))
                .await;
            return false;
        }
    };

    match command {
        InboundCommand::ToolResponse {
            request_id,
            data,
            is_error,
        } => {
            // Settled here, never queued: a blocked coordinator must not be
            // able to starve the tool bridge of its resolution.
            if is_error {
                let reason = match data {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                registry.reject(&request_id, reason).await;
            } else {
                registry.resolve(&request_id, data).await;
            }
            false
        }
        other => command_tx.send(other).await.is_err(),
    }
}
