//! Action Recorder - passive desktop activity capture.
//!
//! Records clicks, scroll bursts and typing bursts together with annotated
//! screenshots, takes periodic full-screen captures, and ships the session
//! in encrypted batches to a remote dataset store.

pub mod capture;
pub mod config;
pub mod processing;
pub mod recorder;
pub mod session;
pub mod storage;
pub mod upload;

use anyhow::Context;
use capture::{PrimaryScreen, SystemWindowProbe};
use clap::Parser;
use config::{AgentConfig, CONFIG_FILE};
use recorder::RecordingCoordinator;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub const AGENT_LOG_FILE: &str = "agent.log";

#[derive(Parser, Debug)]
#[command(name = "action-recorder", version)]
struct Args {
    /// JSON config file; created with defaults when missing
    #[arg(long, default_value = CONFIG_FILE)]
    config: PathBuf,
}

/// Run the agent until Ctrl+C.
pub fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = AgentConfig::load_or_default(&args.config);
    init_tracing(&config)?;

    tracing::info!("Starting Action Recorder v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Config: {:?}", config);

    if !capture::has_screen_recording_permission() {
        capture::request_screen_recording_permission();
        anyhow::bail!("Screen recording permission is required; grant it and restart");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build async runtime")?;

    runtime.block_on(async move {
        let mut coordinator = RecordingCoordinator::new(
            config,
            Arc::new(PrimaryScreen),
            Arc::new(SystemWindowProbe),
        );

        let mut actions = coordinator.subscribe();
        let observer = tokio::spawn(async move {
            loop {
                match actions.recv().await {
                    Ok(line) => tracing::trace!("Observer: {}", line),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Observer lagged; skipped {} actions", skipped)
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let session = coordinator.start().await?;
        tracing::info!("Recording into {}; press Ctrl+C to stop", session.root().display());

        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl+C")?;
        tracing::info!("Shutdown requested");

        let summary = coordinator.stop().await?;
        match &summary.consolidated_log {
            Some(path) => tracing::info!("Session log written to {}", path.display()),
            None => tracing::info!("Session ended without recorded actions"),
        }
        tracing::info!(
            "Session {} finished ({} output files)",
            summary.session_dir.display(),
            summary.output_files.len()
        );

        drop(coordinator);
        observer.abort();
        Ok::<_, anyhow::Error>(())
    })
}

/// Console output plus a plain-text copy in `<save_path>/log/agent.log`.
fn init_tracing(config: &AgentConfig) -> anyhow::Result<()> {
    let log_dir = config.save_path.join("log");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(AGENT_LOG_FILE))
        .context("failed to open agent log")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "action_recorder_lib=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
        .init();
    Ok(())
}
