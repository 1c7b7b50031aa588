//! Outbound writer task.
//!
//! The outbound stream is a single shared sink: every emitter sends
//! [`OutboundEvent`]s through one [`mpsc`] channel, and this task alone
//! serializes and writes them. Whole lines only — the host never observes
//! interleaved partial writes.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::protocol::OutboundEvent;
use crate::{AppError, Result};

/// Serialize queued events to `output` as JSON lines until the channel
/// closes or `cancel` fires.
///
/// Each event is written as a compact single-line JSON object followed by
/// `\n`, then flushed so the host sees it immediately.
///
/// # Errors
///
/// Returns [`AppError::Protocol`] when serialization fails and
/// [`AppError::Io`] when the write or flush fails (host side closed).
pub async fn run_writer<W>(
    mut output: W,
    mut event_rx: mpsc::Receiver<OutboundEvent>,
    cancel: CancellationToken,
) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("writer: cancellation received, stopping");
                break;
            }

            event = event_rx.recv() => {
                match event {
                    None => {
                        debug!("writer: event channel closed, stopping");
                        break;
                    }
                    Some(event) => {
                        let mut bytes = serde_json::to_vec(&event).map_err(|e| {
                            AppError::Protocol(format!("failed to serialize outbound event: {e}"))
                        })?;
                        bytes.push(b'\n');

                        if let Err(e) = output.write_all(&bytes).await {
                            warn!(error = %e, "writer: write to output failed");
                            return Err(AppError::Io(e.to_string()));
                        }
                        output.flush().await.map_err(|e| AppError::Io(e.to_string()))?;
                    }
                }
            }
        }
    }

    let _ = output.flush().await;
    Ok(())
}
