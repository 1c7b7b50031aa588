//! Session state shared between the coordinator and the runtime listener.

pub mod coordinator;
pub mod translator;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub use coordinator::Coordinator;

/// Externally observable lifecycle state of the single session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session exists.
    Idle,
    /// Runtime connect in progress.
    Starting,
    /// Session usable, no turn active.
    Ready,
    /// One turn active.
    Busy,
    /// Teardown in progress.
    ShuttingDown,
    /// Session destroyed; no further commands accepted.
    Terminated,
}

/// Turn bookkeeping shared between the coordinator (command side) and the
/// listener task (runtime event side).
///
/// `stale_completions` counts preempted turns whose completion notification
/// has not yet arrived; each stale completion is swallowed exactly once, so
/// any number of stacked preemptions collapses to the newest turn.
#[derive(Debug, Default)]
pub struct TurnFlags {
    turn_active: AtomicBool,
    query_active: AtomicBool,
    streamed_text: AtomicBool,
    stale_completions: AtomicUsize,
}

impl TurnFlags {
    /// Create cleared flags.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a turn is currently active.
    #[must_use]
    pub fn turn_active(&self) -> bool {
        self.turn_active.load(Ordering::SeqCst)
    }

    /// Mark a turn active or finished.
    pub fn set_turn_active(&self, active: bool) {
        self.turn_active.store(active, Ordering::SeqCst);
    }

    /// Whether a query is currently in flight at the runtime.
    #[must_use]
    pub fn query_active(&self) -> bool {
        self.query_active.load(Ordering::SeqCst)
    }

    /// Mark a query in flight or settled.
    pub fn set_query_active(&self, active: bool) {
        self.query_active.store(active, Ordering::SeqCst);
    }

    /// Whether any incremental text has been emitted for the current turn.
    #[must_use]
    pub fn streamed_text(&self) -> bool {
        self.streamed_text.load(Ordering::SeqCst)
    }

    /// Record that incremental text was emitted for the current turn.
    pub fn mark_streamed(&self) {
        self.streamed_text.store(true, Ordering::SeqCst);
    }

    /// Clear the streamed-text marker at turn end.
    pub fn clear_streamed(&self) {
        self.streamed_text.store(false, Ordering::SeqCst);
    }

    /// Record a preemption: one more stale completion to swallow.
    pub fn mark_preempted(&self) {
        self.stale_completions.fetch_add(1, Ordering::SeqCst);
    }

    /// Consume one pending stale completion, if any. Returns `true` when
    /// the caller should swallow the completion it is holding.
    pub fn consume_stale(&self) -> bool {
        self.stale_completions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Reset everything; used when the session is torn down.
    pub fn reset(&self) {
        self.turn_active.store(false, Ordering::SeqCst);
        self.query_active.store(false, Ordering::SeqCst);
        self.streamed_text.store(false, Ordering::SeqCst);
        self.stale_completions.store(0, Ordering::SeqCst);
    }
}

/// Opaque context preamble prepended to the next outbound user query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextPreamble {
    api_key: Option<String>,
    warrior_code: Option<String>,
    recent_battle: Option<String>,
}

impl ContextPreamble {
    /// Replace the preamble contents. Absent fields clear their part.
    pub fn replace(
        &mut self,
        api_key: Option<String>,
        warrior_code: Option<String>,
        recent_battle: Option<String>,
    ) {
        self.api_key = api_key.filter(|s| !s.is_empty());
        self.warrior_code = warrior_code.filter(|s| !s.is_empty());
        self.recent_battle = recent_battle.filter(|s| !s.is_empty());
    }

    /// Render the preamble, or `None` when every part is empty.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(key) = &self.api_key {
            parts.push(format!("[Context] API Key for curl requests: {key}"));
        }
        if let Some(code) = &self.warrior_code {
            parts.push(format!(
                "[Context] Current warrior code in editor:\n```redcode\n{code}\n```"
            ));
        }
        if let Some(battle) = &self.recent_battle {
            parts.push(format!("[Context] {battle}"));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }

    /// Prefix `text` with the rendered preamble, if any.
    #[must_use]
    pub fn apply(&self, text: &str) -> String {
        match self.render() {
            Some(context) => format!("{context}\n\nUser message: {text}"),
            None => text.to_owned(),
        }
    }
}
