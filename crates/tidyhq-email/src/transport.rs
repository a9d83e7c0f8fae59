// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMTP transport seam.
//!
//! [`MailTransport`] lets the handler be exercised without a relay;
//! [`SmtpMailer`] is the production implementation over lettre's async
//! SMTP transport.

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tidyhq_config::model::EmailConfig;
use tracing::debug;

use crate::error::EmailError;

/// Sends a fully built message.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Returns the relay's acceptance line (e.g. `2.0.0 Ok: queued as 4F2A`), when given.
    async fn send(&self, message: Message) -> Result<Option<String>, EmailError>;

    /// Checks that the relay is reachable.
    async fn ping(&self) -> Result<bool, EmailError>;
}

/// lettre SMTP transport built from [`EmailConfig`].
pub struct SmtpMailer {
    inner: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Builds the transport for `security` = `starttls`, `tls`, or `none`.
    pub fn from_config(config: &EmailConfig) -> Result<Self, EmailError> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| EmailError::Config("email.smtp_host is not set".into()))?;

        let builder = match config.security.as_str() {
            "starttls" => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| EmailError::Config(e.to_string()))?,
            "tls" => AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| EmailError::Config(e.to_string()))?,
            "none" => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
            other => {
                return Err(EmailError::Config(format!(
                    "unknown email.security mode `{other}`"
                )));
            }
        };
        let mut builder = builder.port(config.smtp_port);
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        debug!(host, port = config.smtp_port, security = %config.security, "SMTP transport configured");
        Ok(Self {
            inner: builder.build(),
        })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, message: Message) -> Result<Option<String>, EmailError> {
        let response = self.inner.send(message).await?;
        Ok(response.first_line().map(str::to_string))
    }

    async fn ping(&self) -> Result<bool, EmailError> {
        Ok(self.inner.test_connection().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(security: &str) -> EmailConfig {
        EmailConfig {
            enabled: true,
            smtp_host: Some("smtp.example.com".into()),
            security: security.into(),
            from_address: Some("bookings@example.com".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn builds_each_security_mode() {
        for mode in ["starttls", "tls", "none"] {
            assert!(SmtpMailer::from_config(&config(mode)).is_ok(), "{mode}");
        }
    }

    #[test]
    fn rejects_unknown_security_mode() {
        let err = SmtpMailer::from_config(&config("ssl3")).err().unwrap();
        assert!(matches!(err, EmailError::Config(_)));
        assert!(err.to_string().contains("ssl3"));
    }

    #[test]
    fn requires_a_host() {
        let config = EmailConfig {
            smtp_host: None,
            ..config("starttls")
        };
        assert!(matches!(
            SmtpMailer::from_config(&config),
            Err(EmailError::Config(_))
        ));
    }
}
