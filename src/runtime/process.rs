//! Child-process agent runtime.
//!
//! Spawns the configured agent CLI and speaks JSON lines on its stdio:
//! queries, interrupts, and tool results go down stdin; content blocks,
//! stream deltas, tool calls, and turn completions come back on stdout.
//! Tool calls from the child are routed through the [`ToolBridge`] and the
//! settled result is written back, so a host round-trip never blocks the
//! stdout pump.
//!
//! The child inherits only an allowlisted environment and is spawned with
//! `kill_on_drop` so a crashed bridge cannot leak agent processes.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::protocol::ContentKind;
use crate::runtime::{AgentRuntime, RuntimeEvent, RuntimeFactory};
use crate::tools::ToolBridge;
use crate::{AppError, Result};

/// Environment variables the agent process inherits; everything else is
/// stripped via `env_clear()`.
const ALLOWED_ENV_VARS: &[&str] = &[
    "PATH",
    "HOME",
    "RUST_LOG",
    // Windows-specific variables.
    "USERPROFILE",
    "SystemRoot",
    "TEMP",
    "TMP",
    "USERNAME",
    "APPDATA",
    "LOCALAPPDATA",
    "COMSPEC",
];

/// Lines read from the agent process's stdout.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ChildLine {
    StreamStart {
        kind: ContentKind,
    },
    StreamDelta {
        kind: ContentKind,
        content: String,
    },
    StreamStop {
        kind: ContentKind,
    },
    Text {
        content: String,
    },
    Thinking {
        content: String,
    },
    ToolUse {
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    ToolResult {
        content: String,
        #[serde(default)]
        is_error: bool,
    },
    ToolCall {
        call_id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    TurnCompleted {
        #[serde(default)]
        is_error: bool,
    },
}

/// [`AgentRuntime`] implementation backed by a spawned agent CLI process.
pub struct ProcessRuntime {
    agent: AgentConfig,
    startup_timeout: Duration,
    bridge: Arc<ToolBridge>,
    cancel: CancellationToken,
    child: Option<Child>,
    stdin_tx: Option<mpsc::Sender<serde_json::Value>>,
    events_rx: Option<mpsc::Receiver<RuntimeEvent>>,
}

impl ProcessRuntime {
    /// Build an unconnected runtime for `agent`.
    #[must_use]
    pub fn new(agent: AgentConfig, startup_timeout: Duration, bridge: Arc<ToolBridge>) -> Self {
        Self {
            agent,
            startup_timeout,
            bridge,
            cancel: CancellationToken::new(),
            child: None,
            stdin_tx: None,
            events_rx: None,
        }
    }

    async fn spawn_child(&mut self) -> Result<(Child, ChildStdin, BufReader<ChildStdout>)> {
        let mut cmd = Command::new(&self.agent.cli);
        cmd.args(&self.agent.args);

        cmd.env_clear();
        for &key in ALLOWED_ENV_VARS {
            if let Ok(val) = std::env::var(key) {
                cmd.env(key, val);
            }
        }

        if let Some(root) = &self.agent.workspace_root {
            cmd.current_dir(root);
        }

        cmd.stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|err| AppError::Runtime(format!("failed to spawn agent: {err}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::Runtime("failed to capture agent stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Runtime("failed to capture agent stdout".into()))?;

        let mut reader = BufReader::new(stdout);
        let mut ready = String::new();

        match tokio::time::timeout(self.startup_timeout, reader.read_line(&mut ready)).await {
            Ok(Ok(n)) if n > 0 => {
                info!(ready_line = ready.trim(), "agent emitted ready signal");
            }
            Ok(Ok(_)) => {
                return Err(AppError::Runtime(
                    "agent process exited before ready signal".into(),
                ));
            }
            Ok(Err(err)) => {
                return Err(AppError::Runtime(format!(
                    "failed to read agent ready signal: {err}"
                )));
            }
            Err(_elapsed) => {
                child.kill().await.ok();
                return Err(AppError::Runtime(format!(
                    "startup timeout: no ready signal within {:?}",
                    self.startup_timeout
                )));
            }
        }

        Ok((child, stdin, reader))
    }
}

impl AgentRuntime for ProcessRuntime {
    fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let (child, stdin, reader) = self.spawn_child().await?;

            let (stdin_tx, stdin_rx) = mpsc::channel::<serde_json::Value>(64);
            let (event_tx, events_rx) = mpsc::channel::<RuntimeEvent>(256);

            tokio::spawn(run_stdin_writer(stdin, stdin_rx, self.cancel.clone()));
            tokio::spawn(run_stdout_pump(
                reader,
                event_tx,
                Arc::clone(&self.bridge),
                stdin_tx.clone(),
                self.cancel.clone(),
            ));

            // Declare the host capability catalog before the first query.
            let tools = serde_json::json!({
                "op": "tools",
                "tools": self.bridge.descriptors(),
            });
            stdin_tx
                .send(tools)
                .await
                .map_err(|_| AppError::Runtime("agent stdin closed during connect".into()))?;

            self.child = Some(child);
            self.stdin_tx = Some(stdin_tx);
            self.events_rx = Some(events_rx);
            Ok(())
        })
    }

    fn send(&mut self, text: &str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let msg = serde_json::json!({ "op": "query", "text": text });
        Box::pin(async move {
            let tx = self
                .stdin_tx
                .as_ref()
                .ok_or_else(|| AppError::Runtime("runtime not connected".into()))?;
            tx.send(msg)
                .await
                .map_err(|_| AppError::Runtime("agent stdin closed".into()))
        })
    }

    fn interrupt(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let tx = self
                .stdin_tx
                .as_ref()
                .ok_or_else(|| AppError::Runtime("runtime not connected".into()))?;
            tx.send(serde_json::json!({ "op": "interrupt" }))
                .await
                .map_err(|_| AppError::Runtime("agent stdin closed".into()))
        })
    }

    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.cancel.cancel();
            self.stdin_tx = None;
            if let Some(mut child) = self.child.take() {
                if let Err(err) = child.kill().await {
                    warn!(error = %err, "failed to kill agent process");
                }
            }
            Ok(())
        })
    }

    fn take_events(&mut self) -> Option<mpsc::Receiver<RuntimeEvent>> {
        self.events_rx.take()
    }
}

impl std::fmt::Debug for ProcessRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessRuntime")
            .field("agent", &self.agent)
            .field("connected", &self.child.is_some())
            .finish_non_exhaustive()
    }
}

/// Forward queued JSON values to the child's stdin as lines.
async fn run_stdin_writer(
    mut stdin: ChildStdin,
    mut rx: mpsc::Receiver<serde_json::Value>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            msg = rx.recv() => {
                let Some(msg) = msg else { break };
                let mut bytes = match serde_json::to_vec(&msg) {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        warn!(error = %err, "agent stdin writer: serialization failed");
                        continue;
                    }
                };
                bytes.push(b'\n');
                if stdin.write_all(&bytes).await.is_err() || stdin.flush().await.is_err() {
                    debug!("agent stdin writer: pipe closed, stopping");
                    break;
                }
            }
        }
    }
}

/// Parse the child's stdout lines into [`RuntimeEvent`]s.
///
/// `tool_call` lines are dispatched through the [`ToolBridge`] on their own
/// tasks; the settled result is written back to the child via `stdin_tx`
/// without ever parking this pump.
async fn run_stdout_pump(
    mut reader: BufReader<ChildStdout>,
    event_tx: mpsc::Sender<RuntimeEvent>,
    bridge: Arc<ToolBridge>,
    stdin_tx: mpsc::Sender<serde_json::Value>,
    cancel: CancellationToken,
) {
    let mut line = String::new();
    loop {
        line.clear();
        let read = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            read = reader.read_line(&mut line) => read,
        };

        match read {
            Ok(0) => {
                let _ = event_tx
                    .send(RuntimeEvent::Fatal {
                        message: "agent process closed its output stream".into(),
                    })
                    .await;
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let parsed: ChildLine = match serde_json::from_str(trimmed) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        warn!(error = %err, raw_line = trimmed, "agent stdout: unparseable line, skipping");
                        continue;
                    }
                };
                match parsed {
                    ChildLine::ToolCall { call_id, name, input } => {
                        let bridge = Arc::clone(&bridge);
                        let stdin_tx = stdin_tx.clone();
                        tokio::spawn(async move {
                            let reply = match bridge.invoke(&name, input).await {
                                Ok(data) => serde_json::json!({
                                    "op": "tool_result",
                                    "call_id": call_id,
                                    "data": data,
                                    "is_error": false,
                                }),
                                Err(err) => serde_json::json!({
                                    "op": "tool_result",
                                    "call_id": call_id,
                                    "data": err.to_string(),
                                    "is_error": true,
                                }),
                            };
                            if stdin_tx.send(reply).await.is_err() {
                                debug!("tool result dropped: agent stdin closed");
                            }
                        });
                    }
                    other => {
                        if event_tx.send(map_child_line(other)).await.is_err() {
                            debug!("agent stdout pump: event channel closed, stopping");
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                let _ = event_tx
                    .send(RuntimeEvent::Fatal {
                        message: format!("agent output stream error: {err}"),
                    })
                    .await;
                break;
            }
        }
    }
}

fn map_child_line(line: ChildLine) -> RuntimeEvent {
    match line {
        ChildLine::StreamStart { kind } => RuntimeEvent::StreamStart { kind },
        ChildLine::StreamDelta { kind, content } => RuntimeEvent::StreamDelta { kind, content },
        ChildLine::StreamStop { kind } => RuntimeEvent::StreamStop { kind },
        ChildLine::Text { content } => RuntimeEvent::TextBlock { content },
        ChildLine::Thinking { content } => RuntimeEvent::ThinkingBlock { content },
        ChildLine::ToolUse { name, input } => RuntimeEvent::ToolUseBlock { name, input },
        ChildLine::ToolResult { content, is_error } => {
            RuntimeEvent::ToolResultBlock { content, is_error }
        }
        ChildLine::TurnCompleted { is_error } => RuntimeEvent::TurnCompleted { is_error },
        // tool_call is intercepted before mapping.
        ChildLine::ToolCall { name, input, .. } => RuntimeEvent::ToolUseBlock { name, input },
    }
}

/// Builds [`ProcessRuntime`] instances for the coordinator.
#[derive(Debug)]
pub struct ProcessRuntimeFactory {
    agent: AgentConfig,
    startup_timeout: Duration,
    bridge: Arc<ToolBridge>,
}

impl ProcessRuntimeFactory {
    /// Build a factory from the agent configuration and tool bridge.
    #[must_use]
    pub fn new(agent: AgentConfig, startup_timeout: Duration, bridge: Arc<ToolBridge>) -> Self {
        Self {
            agent,
            startup_timeout,
            bridge,
        }
    }
}

impl RuntimeFactory for ProcessRuntimeFactory {
    fn create(&self) -> Result<Box<dyn AgentRuntime>> {
        Ok(Box::new(ProcessRuntime::new(
            self.agent.clone(),
            self.startup_timeout,
            Arc::clone(&self.bridge),
        )))
    }
}
