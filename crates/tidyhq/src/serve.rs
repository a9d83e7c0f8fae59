// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tidyhq serve` command implementation.
//!
//! Opens the SQLite store, registers the enabled notification handlers, and
//! runs the dispatcher's worker loops until SIGINT or SIGTERM. Jobs claimed
//! when the signal arrives finish their current delivery attempt; anything
//! left `processing` by a crash is reclaimed on the next start.

use tidyhq_config::TidyConfig;
use tidyhq_core::{HealthStatus, StorageAdapter, TidyError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::commands::build_engine;

/// Runs the `tidyhq serve` command.
pub async fn run_serve(config: TidyConfig) -> Result<(), TidyError> {
    info!(name = %config.app.name, "starting tidyhq serve");

    let engine = build_engine(&config).await?;
    let dispatcher = engine.dispatcher();

    for (channel, health) in dispatcher.registry().health().await {
        match health {
            HealthStatus::Healthy => info!(%channel, "handler healthy"),
            HealthStatus::Degraded(reason) => warn!(%channel, %reason, "handler degraded"),
            HealthStatus::Unhealthy(reason) => error!(%channel, %reason, "handler unhealthy"),
        }
    }

    let cancel = install_signal_handler();
    dispatcher.clone().run(cancel).await;

    dispatcher.registry().shutdown().await;
    engine.store().close().await?;
    info!("tidyhq serve stopped");
    Ok(())
}

/// Installs handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is received.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        wait_for_signal().await;
        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c => info!("received SIGINT (Ctrl+C), initiating shutdown"),
                _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
            }
        }
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler, listening for Ctrl+C only");
            if let Err(e) = ctrl_c.await {
                error!(error = %e, "failed to listen for Ctrl+C");
            }
            info!("received SIGINT (Ctrl+C), initiating shutdown");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl+C");
    }
    info!("received Ctrl+C, initiating shutdown");
}

/// Logs go to stderr so stdout carries only command output.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tidyhq={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
