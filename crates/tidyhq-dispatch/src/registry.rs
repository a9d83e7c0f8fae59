// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel-to-handler routing table.

use std::collections::HashMap;
use std::sync::Arc;

use tidyhq_core::{Channel, HealthStatus, NotificationHandler};
use tracing::{info, warn};

/// Maps each channel to at most one handler.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<Channel, Arc<dyn NotificationHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for its channel, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn NotificationHandler>) {
        let channel = handler.channel();
        info!(%channel, handler = handler.name(), "notification handler registered");
        if let Some(previous) = self.handlers.insert(channel, handler) {
            warn!(%channel, replaced = previous.name(), "handler replaced");
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, handler: Arc<dyn NotificationHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn get(&self, channel: Channel) -> Option<&Arc<dyn NotificationHandler>> {
        self.handlers.get(&channel)
    }

    /// Registered channels, email first.
    pub fn channels(&self) -> Vec<Channel> {
        let mut channels: Vec<Channel> = self.handlers.keys().copied().collect();
        channels.sort_by_key(|c| c.to_string());
        channels
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs every handler's health check. Errors are reported as unhealthy.
    pub async fn health(&self) -> Vec<(Channel, HealthStatus)> {
        let mut report = Vec::with_capacity(self.handlers.len());
        for channel in self.channels() {
            if let Some(handler) = self.handlers.get(&channel) {
                let status = handler
                    .health_check()
                    .await
                    .unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));
                report.push((channel, status));
            }
        }
        report
    }

    /// Shuts every handler down, logging failures.
    pub async fn shutdown(&self) {
        for (channel, handler) in &self.handlers {
            if let Err(e) = handler.shutdown().await {
                warn!(%channel, error = %e, "handler shutdown failed");
            }
        }
    }
}
