// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `NotificationHandler` implementation for the `sms` channel.

use async_trait::async_trait;
use tidyhq_config::model::SmsConfig;
use tidyhq_core::traits::handler::ensure_channel;
use tidyhq_core::{
    AdapterType, Channel, DeliveryReceipt, HealthStatus, NotificationHandler, NotificationJob,
    PluginAdapter, TidyError,
};
use tracing::{debug, info};

use crate::client::SmsClient;

/// Delivers SMS jobs through [`SmsClient`].
pub struct SmsHandler {
    client: SmsClient,
}

impl SmsHandler {
    pub fn from_config(config: &SmsConfig) -> Result<Self, TidyError> {
        Ok(Self {
            client: SmsClient::new(config)?,
        })
    }
}

#[async_trait]
impl PluginAdapter for SmsHandler {
    fn name(&self) -> &str {
        "twilio"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Sms
    }

    async fn health_check(&self) -> Result<HealthStatus, TidyError> {
        Ok(match self.client.ping().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) if e.is_permanent() => HealthStatus::Unhealthy(e.to_string()),
            Err(e) => HealthStatus::Degraded(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), TidyError> {
        Ok(())
    }
}

#[async_trait]
impl NotificationHandler for SmsHandler {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    async fn deliver(&self, job: &NotificationJob) -> Result<DeliveryReceipt, TidyError> {
        ensure_channel(job, Channel::Sms)?;
        match self
            .client
            .send(&job.payload.recipient, &job.payload.message)
            .await
        {
            Ok(sent) => {
                info!(job_id = %job.id, sid = %sent.sid, "notification SMS sent");
                Ok(DeliveryReceipt {
                    provider_id: Some(sent.sid),
                })
            }
            Err(e) => {
                debug!(job_id = %job.id, permanent = e.is_permanent(), error = %e, "SMS delivery failed");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidyhq_core::{JobQueue, NewJob};
    use tidyhq_test_utils::InMemoryStore;
    use tidyhq_test_utils::fixtures::{email_job, sms_job, t0};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> SmsConfig {
        SmsConfig {
            enabled: true,
            account_sid: Some("AC123".into()),
            auth_token: Some("secret".into()),
            from_number: Some("+15550109999".into()),
            api_base_url: base_url.to_string(),
            request_timeout_secs: 1,
        }
    }

    async fn stored(job: NewJob) -> NotificationJob {
        let store = InMemoryStore::new();
        let id = store.enqueue(job, t0()).await.unwrap();
        store.get_job(id).await.unwrap().unwrap()
    }

    async fn gateway(status: u16) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_json(serde_json::json!({"sid": "SM42", "message": "status test"})),
            )
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn receipt_carries_message_sid() {
        let server = gateway(201).await;
        let handler = SmsHandler::from_config(&config(&server.uri())).unwrap();
        let receipt = handler.deliver(&stored(sms_job("+15550100100")).await).await.unwrap();
        assert_eq!(receipt.provider_id.as_deref(), Some("SM42"));
    }

    #[tokio::test]
    async fn server_errors_and_throttling_are_transient() {
        for status in [429, 500, 503] {
            let server = gateway(status).await;
            let handler = SmsHandler::from_config(&config(&server.uri())).unwrap();
            let err = handler
                .deliver(&stored(sms_job("+15550100100")).await)
                .await
                .unwrap_err();
            assert!(
                matches!(err, TidyError::ProviderDelivery { .. }),
                "{status}: {err}"
            );
        }
    }

    #[tokio::test]
    async fn rejected_requests_are_permanent() {
        let server = gateway(400).await;
        let handler = SmsHandler::from_config(&config(&server.uri())).unwrap();
        let err = handler
            .deliver(&stored(sms_job("+15550100100")).await)
            .await
            .unwrap_err();
        assert!(err.is_permanent_delivery_failure(), "{err}");
    }

    #[tokio::test]
    async fn credential_rejections_are_retried() {
        for status in [401, 403] {
            let server = gateway(status).await;
            let handler = SmsHandler::from_config(&config(&server.uri())).unwrap();
            let err = handler
                .deliver(&stored(sms_job("+15550100100")).await)
                .await
                .unwrap_err();
            assert!(!err.is_permanent_delivery_failure(), "HTTP {status}: {err}");
            assert!(matches!(err, TidyError::ProviderDelivery { .. }), "{err}");
        }
    }

    #[tokio::test]
    async fn slow_gateway_times_out_as_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_delay(std::time::Duration::from_secs(3))
                    .set_body_json(serde_json::json!({"sid": "SM42"})),
            )
            .mount(&server)
            .await;
        let handler = SmsHandler::from_config(&config(&server.uri())).unwrap();
        let err = handler
            .deliver(&stored(sms_job("+15550100100")).await)
            .await
            .unwrap_err();
        assert!(matches!(err, TidyError::ProviderDelivery { .. }), "{err}");
    }

    #[tokio::test]
    async fn email_jobs_are_refused() {
        let server = gateway(201).await;
        let handler = SmsHandler::from_config(&config(&server.uri())).unwrap();
        let err = handler
            .deliver(&stored(email_job("dana@example.com")).await)
            .await
            .unwrap_err();
        assert!(err.is_permanent_delivery_failure());
    }

    #[tokio::test]
    async fn unreachable_gateway_degrades_health() {
        let handler = SmsHandler::from_config(&config("http://127.0.0.1:9")).unwrap();
        assert!(matches!(
            handler.health_check().await.unwrap(),
            HealthStatus::Degraded(_)
        ));
    }
}
