// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for a Twilio-compatible Messages API.

use std::time::Duration;

use serde::Deserialize;
use tidyhq_config::model::SmsConfig;
use tracing::debug;

use crate::error::SmsError;
use crate::phone::validate_e164;

const API_VERSION: &str = "2010-04-01";

/// Message resource returned on acceptance.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResource {
    pub sid: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

/// Authenticated client bound to one account and sender number.
#[derive(Debug, Clone)]
pub struct SmsClient {
    http: reqwest::Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl SmsClient {
    pub fn new(config: &SmsConfig) -> Result<Self, SmsError> {
        let account_sid = required(&config.account_sid, "sms.account_sid")?;
        let auth_token = required(&config.auth_token, "sms.auth_token")?;
        let from_number = required(&config.from_number, "sms.from_number")?;
        validate_e164(&from_number)
            .map_err(|_| SmsError::Config(format!("sms.from_number `{from_number}` is not E.164")))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SmsError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            account_sid,
            auth_token,
            from_number,
        })
    }

    fn account_url(&self) -> String {
        format!("{}/{API_VERSION}/Accounts/{}", self.base_url, self.account_sid)
    }

    /// Sends `body` to `to`. The recipient must be E.164.
    pub async fn send(&self, to: &str, body: &str) -> Result<MessageResource, SmsError> {
        validate_e164(to)?;
        let url = format!("{}/Messages.json", self.account_url());
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        debug!(status = %status, "SMS gateway response received");
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &text));
        }
        response
            .json::<MessageResource>()
            .await
            .map_err(|e| SmsError::Decode(e.to_string()))
    }

    /// Fetches the account resource to confirm credentials and reachability.
    pub async fn ping(&self) -> Result<(), SmsError> {
        let url = format!("{}.json", self.account_url());
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(api_error(status.as_u16(), &text))
        }
    }
}

fn required(value: &Option<String>, key: &str) -> Result<String, SmsError> {
    value
        .clone()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SmsError::Config(format!("{key} is not set")))
}

fn api_error(status: u16, body: &str) -> SmsError {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = match (parsed.code, parsed.message) {
        (Some(code), Some(message)) => format!("{message} (code {code})"),
        (None, Some(message)) => message,
        _ if body.is_empty() => "no response body".to_string(),
        _ => body.to_string(),
    };
    SmsError::Api { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{basic_auth, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> SmsConfig {
        SmsConfig {
            enabled: true,
            account_sid: Some("AC123".into()),
            auth_token: Some("secret".into()),
            from_number: Some("+15550109999".into()),
            api_base_url: base_url.to_string(),
            request_timeout_secs: 2,
        }
    }

    #[tokio::test]
    async fn send_posts_form_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
            .and(basic_auth("AC123", "secret"))
            .and(body_string_contains("To=%2B15550100100"))
            .and(body_string_contains("From=%2B15550109999"))
            .and(body_string_contains("Body=See+you+Friday"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({"sid": "SM42", "status": "queued"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = SmsClient::new(&config(&server.uri())).unwrap();
        let sent = client.send("+15550100100", "See you Friday").await.unwrap();
        assert_eq!(sent.sid, "SM42");
        assert_eq!(sent.status.as_deref(), Some("queued"));
    }

    #[tokio::test]
    async fn api_errors_carry_provider_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": 21211,
                "message": "The 'To' number is not a valid phone number.",
                "status": 400
            })))
            .mount(&server)
            .await;

        let client = SmsClient::new(&config(&server.uri())).unwrap();
        let err = client.send("+15550100100", "hi").await.unwrap_err();
        assert!(err.is_permanent());
        let text = err.to_string();
        assert!(text.contains("21211"), "got: {text}");
        assert!(text.contains("HTTP 400"), "got: {text}");
    }

    #[tokio::test]
    async fn invalid_recipient_never_reaches_the_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let client = SmsClient::new(&config(&server.uri())).unwrap();
        let err = client.send("555-0100", "hi").await.unwrap_err();
        assert!(matches!(err, SmsError::InvalidNumber(_)));
    }

    #[tokio::test]
    async fn ping_checks_account() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2010-04-01/Accounts/AC123.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"sid": "AC123"})))
            .mount(&server)
            .await;

        let client = SmsClient::new(&config(&format!("{}/", server.uri()))).unwrap();
        client.ping().await.unwrap();
    }

    #[test]
    fn missing_credentials_are_config_errors() {
        let mut cfg = config("https://api.twilio.com");
        cfg.auth_token = None;
        let err = SmsClient::new(&cfg).unwrap_err();
        assert!(err.to_string().contains("sms.auth_token"));

        let mut cfg = config("https://api.twilio.com");
        cfg.from_number = Some("5550109999".into());
        assert!(matches!(SmsClient::new(&cfg), Err(SmsError::Config(_))));
    }

    #[test]
    fn api_error_falls_back_to_raw_body() {
        match api_error(502, "Bad Gateway") {
            SmsError::Api { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected {other}"),
        }
    }
}
