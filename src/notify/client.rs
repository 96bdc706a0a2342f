use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;

use super::{NotificationPayload, NotifyClient, NotifyError};
use crate::config::NotifyConfig;

const EMAIL_ENDPOINT: &str = "v2/notifications/email";

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    iat: i64,
}

/// GOV.UK Notify API client
#[derive(Clone)]
pub struct GovUkNotifyClient {
    client: reqwest::Client,
    base_url: String,
    iss: String,
    secret: String,
}

impl GovUkNotifyClient {
    /// Create a client from a combined Notify API key
    /// (`{name}-{service id}-{secret}`, both ids being UUIDs).
    pub fn new(api_key: &str, base_url: impl Into<String>) -> Result<Self, NotifyError> {
        let (iss, secret) = parse_api_key(api_key).ok_or(NotifyError::InvalidApiKey)?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            iss,
            secret,
        })
    }

    pub fn from_config(config: &NotifyConfig) -> Result<Self, NotifyError> {
        Self::new(&config.api_key, config.base_url.clone())
    }

    /// HS256 token, signed fresh for every request
    fn bearer_token(&self) -> Result<String, NotifyError> {
        let claims = Claims {
            iss: &self.iss,
            iat: Utc::now().timestamp(),
        };
        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?)
    }
}

/// Split a Notify API key into the service id (issuer) and signing secret.
fn parse_api_key(api_key: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = api_key.split('-').collect();
    if parts.len() != 11 {
        return None;
    }
    Some((parts[1..=5].join("-"), parts[6..=10].join("-")))
}

#[async_trait]
impl NotifyClient for GovUkNotifyClient {
    async fn send(&self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, EMAIL_ENDPOINT))
            .bearer_auth(self.bearer_token()?)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 200 || status.as_u16() == 201 {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), body = %body, "Notify rejected notification");
        Err(NotifyError::from_status(status.as_u16()))
    }
}

/// Logs notifications instead of sending them (dry runs)
#[derive(Debug, Clone, Default)]
pub struct LoggingNotifyClient;

#[async_trait]
impl NotifyClient for LoggingNotifyClient {
    async fn send(&self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        tracing::info!(
            email = %payload.email_address,
            template_id = %payload.template_id,
            template = ?payload.template,
            personalisation = ?payload.personalisation,
            "Notification (dry run)"
        );
        Ok(())
    }
}
