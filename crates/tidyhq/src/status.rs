// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tidyhq status` command implementation.

use std::collections::BTreeMap;
use std::process::ExitCode;

use serde::Serialize;
use tidyhq_booking::Engine;
use tidyhq_core::{HealthStatus, JobStats, PluginAdapter};
use tidyhq_storage::SqliteStore;

/// Structured status output.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub healthy: bool,
    pub store: String,
    pub handlers: BTreeMap<String, String>,
    pub queue: Option<JobStats>,
}

fn describe(health: &HealthStatus) -> String {
    match health {
        HealthStatus::Healthy => "healthy".to_string(),
        HealthStatus::Degraded(reason) => format!("degraded: {reason}"),
        HealthStatus::Unhealthy(reason) => format!("unhealthy: {reason}"),
    }
}

/// Runs the `tidyhq status` command. Degraded handlers still count as healthy.
pub async fn run_status(engine: &Engine<SqliteStore>) -> ExitCode {
    let store_health = engine
        .store()
        .health_check()
        .await
        .unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));
    let mut healthy = !matches!(store_health, HealthStatus::Unhealthy(_));

    let mut handlers = BTreeMap::new();
    for (channel, health) in engine.dispatcher().registry().health().await {
        healthy &= !matches!(health, HealthStatus::Unhealthy(_));
        handlers.insert(channel.to_string(), describe(&health));
    }

    let response = StatusResponse {
        healthy,
        store: describe(&store_health),
        handlers,
        queue: engine.notification_stats().await.data,
    };
    match serde_json::to_string_pretty(&response) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("error: failed to serialize status: {e}");
            return ExitCode::FAILURE;
        }
    }
    if healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
