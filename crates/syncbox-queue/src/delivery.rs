//! Remote delivery of queued payloads.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use syncbox_config::DeliveryConfig;

use crate::error::DeliveryError;

#[cfg(test)]
#[path = "delivery_tests.rs"]
mod tests;

/// Performs the remote call for one payload.
///
/// Failures are returned as values and drive the retry policy.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    async fn deliver(&self, payload: &Value) -> Result<(), DeliveryError>;
}

/// Posts payloads as JSON to a fixed endpoint.
pub struct HttpDeliveryClient {
    url: String,
    client: reqwest::Client,
}

impl HttpDeliveryClient {
    /// Create a client posting to `url` with a per-request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// Create from the `[delivery]` config section.
    pub fn from_config(config: &DeliveryConfig) -> Result<Self, DeliveryError> {
        Self::new(config.url(), config.timeout())
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DeliveryClient for HttpDeliveryClient {
    async fn deliver(&self, payload: &Value) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout
                } else {
                    DeliveryError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            debug!("Delivered payload to {} ({})", self.url, status);
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}
