//! Shutdown-path tests: explicit command, queue EOF, and signal-driven
//! teardown all converge on the same cleanup.

use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use modelwar_bridge::protocol::{InboundCommand, OutboundEvent};
use modelwar_bridge::session::SessionState;
use modelwar_bridge::tools::registry::ToolOutcome;

use super::support::{recv_event, recv_handle, rig};

/// An explicit `shutdown` command disconnects the runtime, abandons
/// pending tool calls, and lands in `Terminated`.
#[tokio::test]
async fn shutdown_command_tears_the_session_down() {
    let mut rig = rig();
    let (command_tx, command_rx) = mpsc::channel(8);

    command_tx.send(InboundCommand::StartSession).await.unwrap();
    command_tx.send(InboundCommand::Shutdown).await.unwrap();
    drop(command_tx);

    // A tool call left hanging when the shutdown arrives.
    let (_id, slot) = rig.registry.register().await;

    rig.coordinator
        .run(command_rx, CancellationToken::new())
        .await
        .expect("run exits cleanly");

    assert_eq!(recv_event(&mut rig.events_rx).await, OutboundEvent::SessionReady);
    assert_eq!(rig.coordinator.state(), SessionState::Terminated);

    let handle = recv_handle(&mut rig.handles).await;
    assert_eq!(handle.disconnects.load(Ordering::SeqCst), 1);

    let outcome = tokio::time::timeout(Duration::from_secs(2), slot)
        .await
        .expect("abandoned slot settles")
        .expect("slot delivered");
    assert_eq!(outcome, ToolOutcome::Failure("session shutdown".to_owned()));
    assert!(rig.registry.is_empty().await);
}

/// Closing the command queue (stdin EOF upstream) is an implicit shutdown.
#[tokio::test]
async fn command_queue_eof_is_an_implicit_shutdown() {
    let mut rig = rig();
    let (command_tx, command_rx) = mpsc::channel(8);

    command_tx.send(InboundCommand::StartSession).await.unwrap();
    drop(command_tx);

    rig.coordinator
        .run(command_rx, CancellationToken::new())
        .await
        .expect("run exits cleanly");

    assert_eq!(rig.coordinator.state(), SessionState::Terminated);
    let handle = recv_handle(&mut rig.handles).await;
    assert_eq!(handle.disconnects.load(Ordering::SeqCst), 1);
}

/// A fired cancellation token (termination signal) shuts the session down
/// even while the command queue stays open.
#[tokio::test]
async fn cancellation_token_shuts_the_session_down() {
    let mut rig = rig();
    let (command_tx, command_rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();

    command_tx.send(InboundCommand::StartSession).await.unwrap();
    cancel.cancel();

    rig.coordinator
        .run(command_rx, cancel)
        .await
        .expect("run exits cleanly");
    drop(command_tx);

    assert_eq!(rig.coordinator.state(), SessionState::Terminated);
}

/// The coordinator loop runs on its own spawned task, the way the binary
/// wires it, and still drives the session to completion.
#[tokio::test]
async fn run_drives_the_session_from_a_spawned_task() {
    let mut rig = rig();
    let (command_tx, command_rx) = mpsc::channel(8);
    let mut coordinator = rig.coordinator;

    let task = tokio::spawn(async move {
        coordinator
            .run(command_rx, CancellationToken::new())
            .await
            .expect("run exits cleanly");
        coordinator
    });

    command_tx.send(InboundCommand::StartSession).await.unwrap();
    assert_eq!(recv_event(&mut rig.events_rx).await, OutboundEvent::SessionReady);

    command_tx.send(InboundCommand::Shutdown).await.unwrap();
    let coordinator = task.await.expect("task joins");
    assert_eq!(coordinator.state(), SessionState::Terminated);
}

/// Shutdown with no session ever started still terminates cleanly.
#[tokio::test]
async fn shutdown_without_session_terminates() {
    let mut rig = rig();
    let (command_tx, command_rx) = mpsc::channel(8);

    command_tx.send(InboundCommand::Shutdown).await.unwrap();
    drop(command_tx);

    rig.coordinator
        .run(command_rx, CancellationToken::new())
        .await
        .expect("run exits cleanly");

    assert_eq!(rig.coordinator.state(), SessionState::Terminated);
    assert!(
        rig.handles.try_recv().is_err(),
        "no runtime may have been created"
    );
}
