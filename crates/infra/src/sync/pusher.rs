//! Remote push client
//!
//! The sync service hands each unsynced record to a [`RemotePusher`]. The
//! HTTP implementation posts the record as JSON to `{base_url}/{kind}` and
//! sends an idempotency key so a retried push after a lost response is
//! not applied twice.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use timekeep_domain::constants::IDEMPOTENCY_KEY_HEADER;
use timekeep_domain::{EntityKind, RemoteAck, RemoteConfig};
use tracing::{debug, instrument};

use super::errors::SyncError;

/// Sends one record to the remote and reports its acceptance.
#[async_trait]
pub trait RemotePusher: Send + Sync {
    async fn push(
        &self,
        kind: EntityKind,
        payload: &Value,
        idempotency_key: &str,
    ) -> Result<RemoteAck, SyncError>;
}

/// JSON-over-HTTP pusher
pub struct HttpRemotePusher {
    client: Client,
    base_url: String,
    api_token: Option<String>,
    timeout: Duration,
}

impl HttpRemotePusher {
    /// Build a pusher from the remote section of the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] when no base URL is configured or the
    /// HTTP client cannot be built.
    pub fn new(config: &RemoteConfig) -> Result<Self, SyncError> {
        let base_url = config
            .base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| SyncError::Config("remote.base_url is not set".to_string()))?;

        if base_url.starts_with("file:") {
            return Err(SyncError::Config("file:// URLs are not supported".into()));
        }

        let timeout = Duration::from_secs(config.timeout_seconds);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url, api_token: config.api_token.clone(), timeout })
    }

    fn endpoint(&self, kind: EntityKind) -> String {
        format!("{}/{}", self.base_url, kind.path())
    }

    async fn send_request(&self, builder: RequestBuilder) -> Result<Response, SyncError> {
        let builder = match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };

        let response = tokio::time::timeout(self.timeout, builder.send())
            .await
            .map_err(|_| SyncError::Timeout(self.timeout))?
            .map_err(|err| map_transport_error(&err, self.timeout))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(map_status(status, &body))
    }
}

#[async_trait]
impl RemotePusher for HttpRemotePusher {
    #[instrument(skip(self, payload), fields(kind = %kind))]
    async fn push(
        &self,
        kind: EntityKind,
        payload: &Value,
        idempotency_key: &str,
    ) -> Result<RemoteAck, SyncError> {
        let url = self.endpoint(kind);
        debug!(url = %url, idempotency_key, "Pushing record");

        let builder =
            self.client.post(&url).header(IDEMPOTENCY_KEY_HEADER, idempotency_key).json(payload);
        let response = self.send_request(builder).await?;

        let body = response
            .bytes()
            .await
            .map_err(|e| SyncError::Network(format!("Failed to read response: {e}")))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(RemoteAck::default());
        }

        serde_json::from_slice(&body)
            .map_err(|e| SyncError::Client(format!("Failed to parse response: {e}")))
    }
}

fn map_transport_error(err: &reqwest::Error, timeout: Duration) -> SyncError {
    if err.is_timeout() {
        SyncError::Timeout(timeout)
    } else if err.is_builder() {
        SyncError::Config(err.to_string())
    } else {
        SyncError::Network(err.to_string())
    }
}

fn map_status(status: StatusCode, body: &str) -> SyncError {
    let message = if body.is_empty() { status.to_string() } else { format!("{status}: {body}") };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SyncError::Auth(message),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {
            SyncError::RateLimit(message)
        }
        status if status.is_server_error() => SyncError::Server(message),
        _ => SyncError::Client(message),
    }
}
