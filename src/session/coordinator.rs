//! Turn & interrupt coordinator.
//!
//! Drains the demultiplexer's command queue and drives the session state
//! machine: at most one session process-wide, at most one turn in flight
//! from the host's point of view, preemption always won by the newest user
//! message. Shutdown (explicit command, input EOF, or a termination signal
//! via the cancellation token) abandons all pending tool calls and
//! disconnects the runtime.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::protocol::{InboundCommand, LogLevel, OutboundEvent};
use crate::runtime::{AgentRuntime, RuntimeFactory};
use crate::session::{translator, ContextPreamble, SessionState, TurnFlags};
use crate::tools::registry::PendingCallRegistry;
use crate::Result;

/// Internal lifecycle phase; `Running` splits into `Ready`/`Busy` by flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Starting,
    Running,
    ShuttingDown,
    Terminated,
}

/// Owns the session lifecycle and the runtime handle.
pub struct Coordinator {
    factory: Box<dyn RuntimeFactory>,
    events: mpsc::Sender<OutboundEvent>,
    registry: PendingCallRegistry,
    flags: Arc<TurnFlags>,
    context: ContextPreamble,
    phase: Phase,
    runtime: Option<Box<dyn AgentRuntime>>,
    listener: Option<JoinHandle<()>>,
    listener_cancel: CancellationToken,
}

impl Coordinator {
    /// Build a coordinator with no session.
    #[must_use]
    pub fn new(
        factory: Box<dyn RuntimeFactory>,
        events: mpsc::Sender<OutboundEvent>,
        registry: PendingCallRegistry,
        flags: Arc<TurnFlags>,
    ) -> Self {
        Self {
            factory,
            events,
            registry,
            flags,
            context: ContextPreamble::default(),
            phase: Phase::Idle,
            runtime: None,
            listener: None,
            listener_cancel: CancellationToken::new(),
        }
    }

    /// Externally observable session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        match self.phase {
            Phase::Idle => SessionState::Idle,
            Phase::Starting => SessionState::Starting,
            Phase::Running => {
                if self.flags.turn_active() {
                    SessionState::Busy
                } else {
                    SessionState::Ready
                }
            }
            Phase::ShuttingDown => SessionState::ShuttingDown,
            Phase::Terminated => SessionState::Terminated,
        }
    }

    /// Command loop: drain `commands` until shutdown.
    ///
    /// EOF on the queue and a fired `cancel` token both behave as an
    /// implicit shutdown.
    ///
    /// # Errors
    ///
    /// Currently infallible; the `Result` return keeps the task signature
    /// uniform with the reader and writer tasks.
    pub async fn run(
        &mut self,
        mut commands: mpsc::Receiver<InboundCommand>,
        cancel: CancellationToken,
    ) -> Result<()> {
        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    self.shutdown("termination signal").await;
                    break;
                }

                command = commands.recv() => {
                    match command {
                        None => {
                            self.shutdown("command queue closed").await;
                            break;
                        }
                        Some(InboundCommand::Shutdown) => {
                            self.shutdown("shutdown command").await;
                            break;
                        }
                        Some(command) => self.handle(command).await,
                    }
                }
            }
        }
        Ok(())
    }

    /// Apply one non-shutdown command to the state machine.
    pub async fn handle(&mut self, command: InboundCommand) {
        match command {
            InboundCommand::StartSession => self.start_session().await,
            InboundCommand::UserMessage { text } => self.user_message(text).await,
            InboundCommand::SetContext {
                api_key,
                warrior_code,
                recent_battle,
            } => {
                self.context.replace(api_key, warrior_code, recent_battle);
                debug!("context updated");
            }
            InboundCommand::ToolResponse { request_id, .. } => {
                // Normally settled by the reader; reaching the queue means a
                // caller bypassed the demultiplexer (tests do).
                debug!(request_id = %request_id, "tool_response reached command queue, ignoring");
            }
            InboundCommand::Shutdown => self.shutdown("shutdown command").await,
        }
    }

    async fn start_session(&mut self) {
        if self.phase != Phase::Idle {
            debug!(phase = ?self.phase, "session already active, ignoring start");
            self.emit(OutboundEvent::Log {
                message: "Session already active".to_owned(),
                level: LogLevel::Warning,
            })
            .await;
            return;
        }
        self.phase = Phase::Starting;

        let mut runtime = match self.factory.create() {
            Ok(runtime) => runtime,
            Err(err) => {
                warn!(error = %err, "runtime construction failed");
                self.emit(OutboundEvent::error(format!("session start failed: {err}")))
                    .await;
                self.phase = Phase::Idle;
                return;
            }
        };

        if let Err(err) = runtime.connect().await {
            warn!(error = %err, "runtime connect failed");
            self.emit(OutboundEvent::error(format!("session start failed: {err}")))
                .await;
            self.phase = Phase::Idle;
            return;
        }

        let Some(events) = runtime.take_events() else {
            self.emit(OutboundEvent::error(
                "session start failed: runtime produced no event stream",
            ))
            .await;
            self.phase = Phase::Idle;
            return;
        };

        self.listener_cancel = CancellationToken::new();
        self.listener = Some(tokio::spawn(translator::run_listener(
            events,
            self.events.clone(),
            Arc::clone(&self.flags),
            self.listener_cancel.clone(),
        )));

        self.runtime = Some(runtime);
        self.phase = Phase::Running;
        self.emit(OutboundEvent::SessionReady).await;
        info!("session ready");
    }

    async fn user_message(&mut self, text: String) {
        if text.is_empty() {
            debug!("empty user message ignored");
            return;
        }
        if self.runtime.is_none() || self.phase != Phase::Running {
            self.emit(OutboundEvent::error("No active session")).await;
            return;
        }

        let full_message = self.context.apply(&text);
        let preview: String = text.chars().take(60).collect();
        debug!(preview = %preview, "user message accepted");

        self.flags.set_turn_active(true);

        if self.flags.query_active() {
            // Preemption: the newest message defines the turn. The stale
            // completion from the interrupted query gets swallowed by the
            // listener.
            self.flags.mark_preempted();
            if let Some(runtime) = &mut self.runtime {
                if let Err(err) = runtime.interrupt().await {
                    debug!(error = %err, "best-effort interrupt failed");
                }
            }
        }

        self.flags.set_query_active(true);
        let send_result = match &mut self.runtime {
            Some(runtime) => runtime.send(&full_message).await,
            None => return,
        };
        if let Err(err) = send_result {
            warn!(error = %err, "query send failed");
            self.flags.set_query_active(false);
            self.flags.set_turn_active(false);
            self.emit(OutboundEvent::error(format!("query failed: {err}")))
                .await;
        }
    }

    /// Tear the session down and stop accepting commands.
    pub async fn shutdown(&mut self, reason: &str) {
        if self.phase == Phase::Terminated {
            return;
        }
        info!(reason, "session shutting down");
        self.phase = Phase::ShuttingDown;

        self.listener_cancel.cancel();
        if let Some(listener) = self.listener.take() {
            if let Err(err) = listener.await {
                debug!(error = %err, "listener task join failed");
            }
        }

        self.registry.abandon_all("session shutdown").await;

        if let Some(mut runtime) = self.runtime.take() {
            if let Err(err) = runtime.disconnect().await {
                debug!(error = %err, "runtime disconnect failed");
            }
        }

        self.flags.reset();
        self.phase = Phase::Terminated;
    }

    async fn emit(&self, event: OutboundEvent) {
        if self.events.send(event).await.is_err() {
            debug!("outbound channel closed, event dropped");
        }
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("phase", &self.phase)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
