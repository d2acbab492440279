//! HTTP client posting signed action envelopes to the venue.

use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::action::types::{ActionEnvelope, ActionError, ActionResult};
use crate::config::AuthorizationConfig;
use crate::observability::metrics;

/// Client for the venue's exchange endpoint.
#[derive(Debug, Clone)]
pub struct AuthorizationClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl AuthorizationClient {
    /// Create a client posting to `endpoint`.
    pub fn new(endpoint: &str, timeout: Duration) -> ActionResult<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ActionError::Transport(format!("invalid endpoint '{endpoint}': {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ActionError::Transport(e.to_string()))?;
        Ok(Self { http, endpoint })
    }

    pub fn from_config(config: &AuthorizationConfig) -> ActionResult<Self> {
        Self::new(&config.endpoint, Duration::from_secs(config.timeout_secs))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Post the envelope. Succeeds only when the venue answers `{"status": "ok", ...}` and
    /// returns the full response body.
    pub async fn submit(&self, envelope: &ActionEnvelope) -> ActionResult<Value> {
        tracing::info!(
            endpoint = %self.endpoint,
            nonce = envelope.nonce,
            "Posting signed action"
        );

        let response = match self
            .http
            .post(self.endpoint.clone())
            .json(envelope)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                metrics::record_authorization("transport");
                return Err(ActionError::Transport(e.to_string()));
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                metrics::record_authorization("transport");
                return Err(ActionError::Transport(e.to_string()));
            }
        };

        match classify_response(&body) {
            Ok(value) => {
                metrics::record_authorization("ok");
                tracing::info!(nonce = envelope.nonce, "Action accepted");
                Ok(value)
            }
            Err(e) => {
                metrics::record_authorization("rejected");
                tracing::warn!(
                    http_status = %status,
                    nonce = envelope.nonce,
                    error = %e,
                    "Action rejected"
                );
                Err(e)
            }
        }
    }
}

/// Decide success from a response body. Anything but `status == "ok"` is a rejection carrying
/// the venue's `response` field, or the raw body when there is none.
pub fn classify_response(body: &str) -> ActionResult<Value> {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return Err(ActionError::RemoteAuthorization(body.to_string())),
    };

    if value.get("status").and_then(Value::as_str) == Some("ok") {
        return Ok(value);
    }

    let message = match value.get("response") {
        Some(Value::String(message)) => message.clone(),
        Some(other) => other.to_string(),
        None => body.to_string(),
    };
    Err(ActionError::RemoteAuthorization(message))
}
