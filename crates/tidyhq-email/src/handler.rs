// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `NotificationHandler` implementation for the `email` channel.

use async_trait::async_trait;
use lettre::message::Mailbox;
use tidyhq_config::model::EmailConfig;
use tidyhq_core::traits::handler::ensure_channel;
use tidyhq_core::{
    AdapterType, Channel, DeliveryReceipt, HealthStatus, NotificationHandler, NotificationJob,
    PluginAdapter, TidyError,
};
use tracing::{debug, info, warn};

use crate::error::EmailError;
use crate::message::{AttachmentFile, compose};
use crate::transport::{MailTransport, SmtpMailer};

/// Delivers email jobs through a [`MailTransport`].
pub struct EmailHandler {
    from: Mailbox,
    reply_to: Option<Mailbox>,
    transport: Box<dyn MailTransport>,
}

impl EmailHandler {
    /// Builds the handler with an SMTP transport from config.
    pub fn from_config(config: &EmailConfig) -> Result<Self, TidyError> {
        let transport = SmtpMailer::from_config(config)?;
        Self::with_transport(config, Box::new(transport))
    }

    /// Builds the handler around any transport; sender addresses still come from config.
    pub fn with_transport(
        config: &EmailConfig,
        transport: Box<dyn MailTransport>,
    ) -> Result<Self, TidyError> {
        let from = config
            .from_address
            .as_deref()
            .ok_or_else(|| TidyError::Config("email.from_address is not set".into()))?
            .parse::<Mailbox>()
            .map_err(|e| TidyError::Config(format!("email.from_address: {e}")))?;
        let reply_to = config
            .reply_to
            .as_deref()
            .map(str::parse::<Mailbox>)
            .transpose()
            .map_err(|e| TidyError::Config(format!("email.reply_to: {e}")))?;
        Ok(Self {
            from,
            reply_to,
            transport,
        })
    }

    async fn send(&self, job: &NotificationJob) -> Result<Option<String>, EmailError> {
        let attachment = match &job.payload.attachment_path {
            Some(path) => Some(AttachmentFile::read(path).await?),
            None => None,
        };
        let message = compose(&self.from, self.reply_to.as_ref(), &job.payload, attachment)?;
        self.transport.send(message).await
    }
}

#[async_trait]
impl PluginAdapter for EmailHandler {
    fn name(&self) -> &str {
        "smtp"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Email
    }

    async fn health_check(&self) -> Result<HealthStatus, TidyError> {
        Ok(match self.transport.ping().await {
            Ok(true) => HealthStatus::Healthy,
            Ok(false) => HealthStatus::Degraded("SMTP relay did not answer NOOP".into()),
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), TidyError> {
        Ok(())
    }
}

#[async_trait]
impl NotificationHandler for EmailHandler {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn deliver(&self, job: &NotificationJob) -> Result<DeliveryReceipt, TidyError> {
        ensure_channel(job, Channel::Email)?;
        match self.send(job).await {
            Ok(provider_id) => {
                info!(job_id = %job.id, to = %job.payload.recipient, "notification email sent");
                Ok(DeliveryReceipt { provider_id })
            }
            Err(e) => {
                debug!(job_id = %job.id, permanent = e.is_permanent(), error = %e, "email delivery failed");
                Err(e.into())
            }
        }
    }

    async fn release(&self, job: &NotificationJob) {
        let Some(path) = &job.payload.attachment_path else {
            return;
        };
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(job_id = %job.id, path = %path.display(), "attachment removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(job_id = %job.id, path = %path.display(), error = %e, "failed to remove attachment")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use lettre::Message;
    use tidyhq_core::{JobQueue, NewJob, NotificationPayload};
    use tidyhq_test_utils::InMemoryStore;
    use tidyhq_test_utils::fixtures::{sms_job, t0};

    #[derive(Clone, Default)]
    struct Recording {
        sent: Arc<Mutex<Vec<String>>>,
        fail_with: Arc<Mutex<Option<fn() -> EmailError>>>,
    }

    #[async_trait]
    impl MailTransport for Recording {
        async fn send(&self, message: Message) -> Result<Option<String>, EmailError> {
            if let Some(make) = *self.fail_with.lock().unwrap() {
                return Err(make());
            }
            let text = String::from_utf8_lossy(&message.formatted()).into_owned();
            self.sent.lock().unwrap().push(text);
            Ok(Some("2.0.0 Ok: queued as 4F2A".into()))
        }

        async fn ping(&self) -> Result<bool, EmailError> {
            Ok(true)
        }
    }

    fn config() -> EmailConfig {
        EmailConfig {
            enabled: true,
            smtp_host: Some("smtp.example.com".into()),
            from_address: Some("Sparkle Cleaning <bookings@sparkle.example.com>".into()),
            reply_to: Some("office@sparkle.example.com".into()),
            ..Default::default()
        }
    }

    fn handler(transport: &Recording) -> EmailHandler {
        EmailHandler::with_transport(&config(), Box::new(transport.clone())).unwrap()
    }

    async fn stored(job: NewJob) -> NotificationJob {
        let store = InMemoryStore::new();
        let id = store.enqueue(job, t0()).await.unwrap();
        store.get_job(id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn delivers_and_returns_relay_receipt() {
        let transport = Recording::default();
        let job = stored(NewJob::new(
            Channel::Email,
            NotificationPayload::email("dana@example.com", "Booking confirmed", "See you Friday"),
        ))
        .await;

        let receipt = handler(&transport).deliver(&job).await.unwrap();
        assert_eq!(receipt.provider_id.as_deref(), Some("2.0.0 Ok: queued as 4F2A"));
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Subject: Booking confirmed"));
        assert!(sent[0].contains("Reply-To: office@sparkle.example.com"));
    }

    #[tokio::test]
    async fn wrong_channel_is_permanent() {
        let transport = Recording::default();
        let job = stored(sms_job("+15550100100")).await;
        let err = handler(&transport).deliver(&job).await.unwrap_err();
        assert!(err.is_permanent_delivery_failure());
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn relay_outage_is_transient() {
        let transport = Recording::default();
        *transport.fail_with.lock().unwrap() =
            Some(|| EmailError::Unavailable("connection refused".into()));
        let job = stored(NewJob::new(
            Channel::Email,
            NotificationPayload::email("dana@example.com", "Hi", "body"),
        ))
        .await;
        let err = handler(&transport).deliver(&job).await.unwrap_err();
        assert!(matches!(err, TidyError::ProviderDelivery { .. }));
    }

    #[tokio::test]
    async fn missing_attachment_is_permanent() {
        let transport = Recording::default();
        let job = stored(NewJob::new(
            Channel::Email,
            NotificationPayload::email("dana@example.com", "Invoice", "Attached")
                .with_attachment("/nonexistent/tidyhq/invoice.pdf"),
        ))
        .await;
        let err = handler(&transport).deliver(&job).await.unwrap_err();
        assert!(err.is_permanent_delivery_failure());
    }

    #[tokio::test]
    async fn attachment_is_sent_then_released() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice-B1.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let transport = Recording::default();
        let handler = handler(&transport);
        let job = stored(NewJob::new(
            Channel::Email,
            NotificationPayload::email("dana@example.com", "Invoice", "Attached")
                .with_attachment(&path),
        ))
        .await;

        handler.deliver(&job).await.unwrap();
        assert!(transport.sent.lock().unwrap()[0].contains("invoice-B1.pdf"));
        assert!(path.exists(), "delivery alone must not remove the file");

        handler.release(&job).await;
        assert!(!path.exists());
        // A second release is harmless.
        handler.release(&job).await;
    }

    #[test]
    fn requires_from_address() {
        let config = EmailConfig {
            from_address: None,
            ..config()
        };
        let result = EmailHandler::with_transport(&config, Box::new(Recording::default()));
        assert!(matches!(result, Err(TidyError::Config(_))));
    }

    #[tokio::test]
    async fn health_follows_transport() {
        let transport = Recording::default();
        assert_eq!(
            handler(&transport).health_check().await.unwrap(),
            HealthStatus::Healthy
        );
    }
}
