#![forbid(unsafe_code)]

//! `modelwar-bridge` — session bridge binary.
//!
//! Wires the stdin demultiplexer, the outbound writer, the tool bridge, and
//! the turn coordinator together over the process's stdio, and maps
//! termination signals onto the shutdown transition. The protocol owns
//! stdout; all diagnostics go to stderr.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use modelwar_bridge::config::BridgeConfig;
use modelwar_bridge::protocol::{reader, writer};
use modelwar_bridge::runtime::process::ProcessRuntimeFactory;
use modelwar_bridge::session::{Coordinator, TurnFlags};
use modelwar_bridge::tools::registry::PendingCallRegistry;
use modelwar_bridge::tools::{StaticCatalog, ToolBridge, ToolCatalog, ToolDescriptor};
use modelwar_bridge::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "modelwar-bridge", about = "ModelWar agent session bridge", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file; defaults apply when absent.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a JSON file declaring the host capability catalog.
    #[arg(long)]
    tools: Option<PathBuf>,

    /// Log output format (text or json), written to stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("modelwar-bridge bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = match &args.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };
    let catalog = load_catalog(args.tools.as_deref())?;
    info!(tools = catalog.list().len(), "configuration loaded");

    let ct = CancellationToken::new();
    let (event_tx, event_rx) = mpsc::channel(256);
    let (command_tx, command_rx) = mpsc::channel(64);
    let registry = PendingCallRegistry::new();
    let flags = Arc::new(TurnFlags::new());

    let bridge = Arc::new(ToolBridge::new(
        registry.clone(),
        event_tx.clone(),
        Arc::new(catalog),
        config.tool_timeout(),
    ));
    let factory = Box::new(ProcessRuntimeFactory::new(
        config.agent.clone(),
        config.startup_timeout(),
        bridge,
    ));

    // The writer exits when the last event sender drops, so queued events
    // flush even during shutdown; it deliberately gets no cancel token.
    let writer_handle = tokio::spawn(writer::run_writer(
        tokio::io::stdout(),
        event_rx,
        CancellationToken::new(),
    ));
    let reader_handle = tokio::spawn(reader::run_reader(
        tokio::io::stdin(),
        command_tx,
        registry.clone(),
        event_tx.clone(),
        ct.clone(),
    ));

    let mut coordinator = Coordinator::new(factory, event_tx.clone(), registry, flags);
    let coord_ct = ct.clone();
    let mut coordinator_handle =
        tokio::spawn(async move { coordinator.run(command_rx, coord_ct).await });

    // Main's own sender must go away or the writer never sees channel close.
    drop(event_tx);

    tokio::select! {
        () = shutdown_signal() => {
            info!("termination signal received");
            ct.cancel();
            let _ = (&mut coordinator_handle).await;
        }
        result = &mut coordinator_handle => {
            if let Err(err) = result {
                error!(%err, "coordinator task failed");
            }
        }
    }

    ct.cancel();
    let (reader_result, writer_result) = tokio::join!(reader_handle, writer_handle);
    if let Ok(Err(err)) = reader_result {
        error!(%err, "reader task failed");
    }
    if let Ok(Err(err)) = writer_result {
        error!(%err, "writer task failed");
    }

    info!("modelwar-bridge shut down");
    Ok(())
}

/// Load the host capability catalog from `path`, or an empty catalog.
fn load_catalog(path: Option<&Path>) -> Result<StaticCatalog> {
    let Some(path) = path else {
        return Ok(StaticCatalog::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|err| AppError::Config(format!("cannot read tool catalog: {err}")))?;
    let descriptors: Vec<ToolDescriptor> = serde_json::from_str(&text)
        .map_err(|err| AppError::Config(format!("invalid tool catalog: {err}")))?;
    Ok(StaticCatalog(descriptors))
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
