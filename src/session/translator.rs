//! Event translator — runtime events to outbound protocol events.
//!
//! Streamed fragments are forwarded immediately; aggregate text/reasoning
//! blocks are suppressed once any incremental text streamed for the turn,
//! so the host never sees the same content twice. Turn completion here is
//! the sole source of `turn_ended` events, with stale completions from
//! preempted turns swallowed via [`TurnFlags::consume_stale`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::protocol::{ContentKind, OutboundEvent};
use crate::runtime::RuntimeEvent;
use crate::session::TurnFlags;

/// Translate one runtime event into at most one outbound event.
///
/// Returns `None` when the event is swallowed: blank aggregate text, an
/// aggregate duplicated by earlier deltas, or the completion of a
/// preempted turn.
pub fn translate(event: RuntimeEvent, flags: &TurnFlags) -> Option<OutboundEvent> {
    match event {
        RuntimeEvent::StreamStart { kind } => Some(OutboundEvent::StreamStart { kind }),
        RuntimeEvent::StreamDelta { kind, content } => {
            if matches!(kind, ContentKind::Text | ContentKind::Thinking) {
                flags.mark_streamed();
            }
            Some(OutboundEvent::StreamDelta { kind, content })
        }
        RuntimeEvent::StreamStop { kind } => Some(OutboundEvent::StreamStop { kind }),
        RuntimeEvent::TextBlock { content } => {
            if content.trim().is_empty() || flags.streamed_text() {
                None
            } else {
                Some(OutboundEvent::AgentText { content })
            }
        }
        RuntimeEvent::ThinkingBlock { content } => {
            if flags.streamed_text() {
                None
            } else {
                Some(OutboundEvent::AgentThinking { content })
            }
        }
        RuntimeEvent::ToolUseBlock { name, input } => {
            let input = if input.is_null() {
                String::new()
            } else {
                input.to_string()
            };
            Some(OutboundEvent::AgentToolUse { name, input })
        }
        RuntimeEvent::ToolResultBlock { content, is_error } => {
            Some(OutboundEvent::AgentToolResult { content, is_error })
        }
        RuntimeEvent::TurnCompleted { is_error } => {
            if flags.consume_stale() {
                debug!(is_error, "translator: swallowing completion of preempted turn");
                return None;
            }
            flags.set_query_active(false);
            flags.set_turn_active(false);
            flags.clear_streamed();
            Some(OutboundEvent::TurnEnded)
        }
        RuntimeEvent::Fatal { message } => Some(OutboundEvent::error(message)),
    }
}

/// Listener task: drain the runtime's event stream into outbound events.
///
/// Stops on cancellation, when the runtime closes its stream, or after a
/// [`RuntimeEvent::Fatal`] — in the fatal case the error is reported to the
/// host and the task ends while the bridge process stays alive.
pub async fn run_listener(
    mut events: mpsc::Receiver<RuntimeEvent>,
    event_tx: mpsc::Sender<OutboundEvent>,
    flags: Arc<TurnFlags>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("listener: cancellation received, stopping");
                break;
            }

            event = events.recv() => {
                let Some(event) = event else {
                    debug!("listener: runtime event stream closed, stopping");
                    break;
                };
                let fatal = matches!(event, RuntimeEvent::Fatal { .. });
                if let Some(out) = translate(event, &flags) {
                    if event_tx.send(out).await.is_err() {
                        debug!("listener: outbound channel closed, stopping");
                        break;
                    }
                }
                if fatal {
                    debug!("listener: runtime stream raised, stopping");
                    break;
                }
            }
        }
    }
}
