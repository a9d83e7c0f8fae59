// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock notification handler for deterministic testing.
//!
//! `MockHandler` implements `NotificationHandler` with scripted outcomes and
//! captures every delivered job for assertion in tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use tidyhq_core::{
    AdapterType, Channel, DeliveryReceipt, HealthStatus, JobId, NotificationHandler,
    NotificationJob, PluginAdapter, TidyError,
};

/// Outcome of one scripted delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scripted {
    Deliver,
    Transient(String),
    Permanent(String),
    /// Never completes; exercises the dispatcher's handler timeout.
    Hang,
}

/// A scripted handler for one channel.
///
/// Each call to `deliver()` pops the next scripted outcome; once the script
/// is exhausted the fallback outcome (initially [`Scripted::Deliver`]) is used.
pub struct MockHandler {
    channel: Channel,
    script: Mutex<VecDeque<Scripted>>,
    fallback: Mutex<Scripted>,
    delivered: Mutex<Vec<NotificationJob>>,
    released: Mutex<Vec<JobId>>,
    calls: AtomicUsize,
}

impl MockHandler {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Scripted::Deliver),
            delivered: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue an outcome for the next unscripted call.
    pub async fn push(&self, outcome: Scripted) {
        self.script.lock().await.push_back(outcome);
    }

    /// Outcome used once the script runs dry.
    pub async fn always(&self, outcome: Scripted) {
        *self.fallback.lock().await = outcome;
    }

    /// Jobs that were delivered successfully, in call order.
    pub async fn delivered(&self) -> Vec<NotificationJob> {
        self.delivered.lock().await.clone()
    }

    /// Jobs released after reaching a terminal status.
    pub async fn released(&self) -> Vec<JobId> {
        self.released.lock().await.clone()
    }

    /// Number of `deliver()` calls, whatever their outcome.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginAdapter for MockHandler {
    fn name(&self) -> &str {
        match self.channel {
            Channel::Email => "mock-email",
            Channel::Sms => "mock-sms",
        }
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        match self.channel {
            Channel::Email => AdapterType::Email,
            Channel::Sms => AdapterType::Sms,
        }
    }

    async fn health_check(&self) -> Result<HealthStatus, TidyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), TidyError> {
        Ok(())
    }
}

#[async_trait]
impl NotificationHandler for MockHandler {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn deliver(&self, job: &NotificationJob) -> Result<DeliveryReceipt, TidyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().await.pop_front();
        let outcome = match next {
            Some(outcome) => outcome,
            None => self.fallback.lock().await.clone(),
        };
        match outcome {
            Scripted::Deliver => {
                self.delivered.lock().await.push(job.clone());
                Ok(DeliveryReceipt {
                    provider_id: Some(format!("mock-{}", job.id)),
                })
            }
            Scripted::Transient(message) => Err(TidyError::delivery(message)),
            Scripted::Permanent(message) => Err(TidyError::permanent(message)),
            Scripted::Hang => std::future::pending().await,
        }
    }

    async fn release(&self, job: &NotificationJob) {
        self.released.lock().await.push(job.id);
    }
}
