//! Shared test support: a scripted fake agent runtime and a coordinator rig.
//!
//! The fake runtime records queries and interrupts, and hands the test a
//! [`FakeHandle`] through which scripted [`RuntimeEvent`]s are injected —
//! the session layer cannot tell it apart from a live runtime.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use modelwar_bridge::protocol::OutboundEvent;
use modelwar_bridge::runtime::{AgentRuntime, RuntimeEvent, RuntimeFactory};
use modelwar_bridge::session::{Coordinator, TurnFlags};
use modelwar_bridge::tools::registry::PendingCallRegistry;
use modelwar_bridge::{AppError, Result};

/// Test-side handle to one connected fake runtime.
pub struct FakeHandle {
    /// Inject scripted runtime events through this sender.
    pub events: mpsc::Sender<RuntimeEvent>,
    /// Queries the coordinator submitted, in order.
    pub sent: Arc<Mutex<Vec<String>>>,
    /// Number of best-effort interrupts received.
    pub interrupts: Arc<AtomicUsize>,
    /// Number of disconnects received.
    pub disconnects: Arc<AtomicUsize>,
}

pub struct FakeRuntime {
    handle_tx: mpsc::UnboundedSender<FakeHandle>,
    sent: Arc<Mutex<Vec<String>>>,
    interrupts: Arc<AtomicUsize>,
    disconnects: Arc<AtomicUsize>,
    events_rx: Option<mpsc::Receiver<RuntimeEvent>>,
    fail_connect: bool,
}

impl AgentRuntime for FakeRuntime {
    fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if self.fail_connect {
                return Err(AppError::Runtime("scripted connect failure".into()));
            }
            let (events, events_rx) = mpsc::channel(64);
            self.events_rx = Some(events_rx);
            let _ = self.handle_tx.send(FakeHandle {
                events,
                sent: Arc::clone(&self.sent),
                interrupts: Arc::clone(&self.interrupts),
                disconnects: Arc::clone(&self.disconnects),
            });
            Ok(())
        })
    }

    fn send(&mut self, text: &str) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let text = text.to_owned();
        Box::pin(async move {
            self.sent.lock().expect("sent lock").push(text);
            Ok(())
        })
    }

    fn interrupt(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.interrupts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn take_events(&mut self) -> Option<mpsc::Receiver<RuntimeEvent>> {
        self.events_rx.take()
    }
}

/// Factory producing fake runtimes; each successful connect delivers a
/// [`FakeHandle`] to the test through the paired receiver.
pub struct FakeFactory {
    handle_tx: mpsc::UnboundedSender<FakeHandle>,
    pub fail_connect: bool,
}

impl FakeFactory {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FakeHandle>) {
        let (handle_tx, handle_rx) = mpsc::unbounded_channel();
        (
            Self {
                handle_tx,
                fail_connect: false,
            },
            handle_rx,
        )
    }
}

impl RuntimeFactory for FakeFactory {
    fn create(&self) -> Result<Box<dyn AgentRuntime>> {
        Ok(Box::new(FakeRuntime {
            handle_tx: self.handle_tx.clone(),
            sent: Arc::new(Mutex::new(Vec::new())),
            interrupts: Arc::new(AtomicUsize::new(0)),
            disconnects: Arc::new(AtomicUsize::new(0)),
            events_rx: None,
            fail_connect: self.fail_connect,
        }))
    }
}

/// A coordinator wired to a fake runtime factory and capture channels.
pub struct TestRig {
    pub coordinator: Coordinator,
    pub events_rx: mpsc::Receiver<OutboundEvent>,
    pub handles: mpsc::UnboundedReceiver<FakeHandle>,
    pub registry: PendingCallRegistry,
    pub flags: Arc<TurnFlags>,
}

pub fn rig() -> TestRig {
    let (factory, handles) = FakeFactory::new();
    let (event_tx, events_rx) = mpsc::channel(256);
    let registry = PendingCallRegistry::new();
    let flags = Arc::new(TurnFlags::new());
    let coordinator = Coordinator::new(
        Box::new(factory),
        event_tx,
        registry.clone(),
        Arc::clone(&flags),
    );
    TestRig {
        coordinator,
        events_rx,
        handles,
        registry,
        flags,
    }
}

/// Receive the next outbound event within two seconds or panic.
pub async fn recv_event(rx: &mut mpsc::Receiver<OutboundEvent>) -> OutboundEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for outbound event")
        .expect("outbound channel closed")
}

/// Assert that no outbound event arrives within the given window.
pub async fn assert_no_event(rx: &mut mpsc::Receiver<OutboundEvent>, window: Duration) {
    let got = tokio::time::timeout(window, rx.recv()).await;
    assert!(got.is_err(), "unexpected outbound event: {got:?}");
}

/// Receive the fake handle created by a successful session start.
pub async fn recv_handle(rx: &mut mpsc::UnboundedReceiver<FakeHandle>) -> FakeHandle {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for fake runtime handle")
        .expect("factory channel closed")
}
