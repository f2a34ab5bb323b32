//! Client for the backend's serverless mail functions.
//!
//! IMAP fetch and SMTP send run inside the backend as `fetch-emails` and
//! `send-email`; this client only posts JSON to `{base}/functions/v1/{name}`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use uuid::Uuid;

pub const FETCH_EMAILS: &str = "fetch-emails";
pub const SEND_EMAIL: &str = "send-email";

#[derive(Debug, Clone, Error)]
pub enum FunctionError {
    #[error("Mail function timed out")]
    Timeout,
    #[error("Mail function request failed: {0}")]
    Transport(String),
    #[error("Mail function returned error: HTTP {status} - {message}")]
    Remote { status: u16, message: String },
    #[error("Failed to parse mail function response: {0}")]
    ParseError(String),
    #[error("Mail functions are not configured")]
    NotConfigured,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchEmailsRequest {
    pub account_id: Uuid,
    pub user_id: Uuid,
    /// Only messages received after this instant
    pub since: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchedEmail {
    pub message_id: String,
    #[serde(default)]
    pub folder: Option<String>,
    pub from: String,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub preview: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchEmailsResponse {
    #[serde(default)]
    pub emails: Vec<FetchedEmail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendEmailRequest {
    pub account_id: Uuid,
    pub user_id: Uuid,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendEmailResponse {
    pub message_id: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "message")]
    error: String,
}

#[derive(Clone)]
pub struct FunctionsClient {
    http: Client,
    base_url: Option<String>,
    service_key: Option<SecretString>,
}

impl std::fmt::Debug for FunctionsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionsClient")
            .field("http", &"<reqwest::Client>")
            .field("base_url", &self.base_url)
            .field("service_key", &self.service_key.as_ref().map(|_| "<secret>"))
            .finish()
    }
}

impl FunctionsClient {
    // mailbox fetches can be slow on large inboxes
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(base_url: String, service_key: SecretString) -> Result<Self, FunctionError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("workdesk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FunctionError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: Some(base_url.trim_end_matches('/').to_string()),
            service_key: Some(service_key),
        })
    }

    /// A client that rejects every call; used with the in-memory backend.
    pub fn disabled() -> Self {
        Self {
            http: Client::new(),
            base_url: None,
            service_key: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.base_url.is_some()
    }

    pub async fn fetch_emails(
        &self,
        request: &FetchEmailsRequest,
    ) -> Result<FetchEmailsResponse, FunctionError> {
        self.invoke(FETCH_EMAILS, request).await
    }

    pub async fn send_email(
        &self,
        request: &SendEmailRequest,
    ) -> Result<SendEmailResponse, FunctionError> {
        self.invoke(SEND_EMAIL, request).await
    }

    async fn invoke<B: Serialize, R: DeserializeOwned>(
        &self,
        name: &str,
        body: &B,
    ) -> Result<R, FunctionError> {
        let (Some(base_url), Some(key)) = (&self.base_url, &self.service_key) else {
            return Err(FunctionError::NotConfigured);
        };
        let url = format!("{base_url}/functions/v1/{name}");

        tracing::debug!(function = name, "Invoking mail function");
        let response = self
            .http
            .post(&url)
            .header("apikey", key.expose_secret())
            .bearer_auth(key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&raw)
                .map(|b| b.error)
                .unwrap_or(raw);
            tracing::warn!(function = name, status = status.as_u16(), message = %message, "Mail function failed");
            return Err(FunctionError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| FunctionError::ParseError(e.to_string()))
    }
}

fn map_reqwest_error(e: reqwest::Error) -> FunctionError {
    if e.is_timeout() {
        FunctionError::Timeout
    } else {
        FunctionError::Transport(e.to_string())
    }
}
