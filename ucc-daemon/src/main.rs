//! UCC Daemon (uccd)
//!
//! Privileged service that runs the fan control loop on its own worker
//! thread and exposes it to unprivileged clients over a Unix domain socket.
//!
//! # Lifecycle
//! 1. Parse CLI, initialize logging (journald when available)
//! 2. Load `/etc/ucc/uccd.json` (defaults if missing)
//! 3. Build the hardware backend and start the fan control worker
//! 4. Serve the socket until SIGINT/SIGTERM
//! 5. Stop the worker and remove the socket

mod cli;
mod config;
mod server;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error, info, warn};

use ucc_core::{ControlSettings, FanSubsystemCoordinator, PeriodicWorker};

use crate::cli::Cli;
use crate::config::{BackendConfig, DaemonConfig};
use crate::server::DaemonState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log to the systemd journal when it is reachable, stdout otherwise
///
/// Returns true when logging to the journal.
fn init_logging() -> bool {
    use tracing_subscriber::prelude::*;

    let log_level = std::env::var("UCC_LOG").unwrap_or_else(|_| "info".to_string());

    if Path::new("/run/systemd/journal/socket").exists() {
        match tracing_journald::layer() {
            Ok(journald_layer) => {
                tracing_subscriber::registry()
                    .with(journald_layer)
                    .with(tracing_subscriber::EnvFilter::new(&log_level))
                    .init();
                return true;
            }
            Err(e) => {
                eprintln!("Failed to create journald layer: {}, falling back to stdout", e);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(tracing_subscriber::EnvFilter::new(&log_level))
        .init();
    false
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            info!("SIGNAL: Received SIGINT");
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("SIGNAL: Received SIGINT"),
        _ = sigterm.recv() => info!("SIGNAL: Received SIGTERM"),
    }
}

fn warn_if_unprivileged(backend: &BackendConfig) {
    // SAFETY: geteuid has no preconditions.
    let euid = unsafe { libc::geteuid() };
    if euid != 0 && matches!(backend, BackendConfig::Hwmon { .. }) {
        warn!(
            "Running as euid={} with the hwmon backend; PWM writes will likely fail",
            euid
        );
    }
}

fn cleanup(socket_path: &Path) {
    if socket_path.exists() {
        if let Err(e) = std::fs::remove_file(socket_path) {
            warn!("Failed to remove socket: {}", e);
        }
    }
    debug!("Cleanup complete");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let use_journald = init_logging();
    info!("STARTUP: uccd {} starting", VERSION);
    info!(
        "STARTUP: Logging to {}",
        if use_journald { "systemd journal" } else { "stdout" }
    );

    let mut config = DaemonConfig::load(&cli.config)
        .with_context(|| format!("loading config {:?}", cli.config))?;
    if let Some(socket) = cli.socket {
        config.socket_path = socket;
    }
    if cli.simulate && !matches!(config.backend, BackendConfig::Simulated { .. }) {
        info!("STARTUP: --simulate given, ignoring configured {} backend", config.backend.kind());
        config.backend = BackendConfig::default();
    }
    config.validate()?;
    warn_if_unprivileged(&config.backend);

    info!("STARTUP: Socket path: {:?}", config.socket_path);
    info!("STARTUP: Backend: {}", config.backend.kind());
    info!("STARTUP: Poll interval: {:?}", config.poll_interval());

    let settings = Arc::new(ControlSettings::new(
        config.profile.clone(),
        config.fan_control_enabled,
    ));
    let coordinator = FanSubsystemCoordinator::new(config.backend.ports(settings.clone()));
    let fan_control = coordinator.handle();

    let mut worker = PeriodicWorker::new(coordinator, config.poll_interval(), true)
        .context("starting fan control worker")?;
    info!("Fan control worker started");

    let state = Arc::new(DaemonState::new(settings, fan_control));
    let listener = match server::bind(&config.socket_path) {
        Ok(listener) => listener,
        Err(e) => {
            error!("Server error: {:#}", e);
            worker.stop();
            return Err(e);
        }
    };

    server::serve(listener, state, shutdown_signal()).await;

    worker.stop();
    cleanup(&config.socket_path);
    info!("SHUTDOWN: uccd terminated gracefully");
    Ok(())
}
