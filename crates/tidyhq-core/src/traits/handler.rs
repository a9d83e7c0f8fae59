// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification handler trait for outbound delivery providers (SMTP, SMS gateways).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TidyError;
use crate::models::NotificationJob;
use crate::traits::adapter::PluginAdapter;
use crate::types::Channel;

/// Proof of a successful hand-off to the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    /// Provider-side message id, when the provider returns one.
    pub provider_id: Option<String>,
}

/// Delivers notification jobs for one channel.
///
/// Handlers report the outcome; they never touch the queue. Failures are
/// classified through the error variant:
/// [`TidyError::ProviderPermanent`] stops retries, anything else is transient.
#[async_trait]
pub trait NotificationHandler: PluginAdapter {
    /// The channel this handler serves.
    fn channel(&self) -> Channel;

    /// Attempts one delivery of the job's payload.
    async fn deliver(&self, job: &NotificationJob) -> Result<DeliveryReceipt, TidyError>;

    /// Called exactly once when the job reaches a terminal status.
    ///
    /// Handlers free per-job resources here (e.g. transient attachment files).
    async fn release(&self, job: &NotificationJob) {
        let _ = job;
    }
}

/// Convenience for handler implementations that only serve `channel`.
pub fn ensure_channel(job: &NotificationJob, channel: Channel) -> Result<(), TidyError> {
    if job.channel == channel {
        Ok(())
    } else {
        Err(TidyError::permanent(format!(
            "job {} is for channel {} but was routed to the {channel} handler",
            job.id, job.channel
        )))
    }
}
