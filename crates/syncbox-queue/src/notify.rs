//! Outcome reports and the sinks they are sent to.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use syncbox_config::NotifyConfig;

use crate::entry::EntryId;
use crate::error::NotifyError;

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;

/// Report severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportSeverity {
    Success,
    Error,
}

impl std::fmt::Display for ReportSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportSeverity::Success => write!(f, "SUCCESS"),
            ReportSeverity::Error => write!(f, "ERROR"),
        }
    }
}

/// A queue outcome worth surfacing to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Report {
    /// A drain cycle finished. `count` entries were delivered out of
    /// `attempted` read from the store.
    BatchCompleted { count: usize, attempted: usize },
    /// An entry hit the retry ceiling and was dropped.
    Abandoned { id: EntryId, attempts: u32 },
}

impl Report {
    pub fn severity(&self) -> ReportSeverity {
        match self {
            Report::BatchCompleted { .. } => ReportSeverity::Success,
            Report::Abandoned { .. } => ReportSeverity::Error,
        }
    }

    /// Short human-readable summary.
    pub fn title(&self) -> String {
        match self {
            Report::BatchCompleted { count, .. } => format!("Synced {} features", count),
            Report::Abandoned { attempts, .. } => {
                format!("Error while syncing feature. Retried {} times", attempts)
            }
        }
    }
}

/// Destination for reports.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Sink name.
    fn name(&self) -> &str;

    /// Deliver a report.
    async fn notify(&self, report: &Report) -> Result<(), NotifyError>;
}

/// Writes reports to the tracing log.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, report: &Report) -> Result<(), NotifyError> {
        match report.severity() {
            ReportSeverity::Success => info!("[REPORT] {}", report.title()),
            ReportSeverity::Error => error!("[REPORT] {}", report.title()),
        }
        Ok(())
    }
}

/// Posts reports as JSON to a webhook.
pub struct WebhookSink {
    url: String,
    client: reqwest::Client,
}

impl WebhookSink {
    /// Create a sink whose requests give up after `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Send {
                sink: "webhook".to_string(),
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn notify(&self, report: &Report) -> Result<(), NotifyError> {
        let payload = serde_json::json!({
            "title": report.title(),
            "severity": report.severity(),
            "report": report,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Send {
                sink: self.name().to_string(),
                message: e.to_string(),
            })?;

        if response.status().is_success() {
            debug!("Webhook report sent");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(NotifyError::Send {
                sink: self.name().to_string(),
                message: format!("webhook returned {}: {}", status, body),
            })
        }
    }
}

/// Fans reports out to every registered sink.
///
/// Each sink call is bounded by the notifier timeout. Sink failures are
/// logged and returned for inspection; they never reach the queue.
pub struct Notifier {
    sinks: Vec<Box<dyn NotificationSink>>,
    timeout: Duration,
}

impl Notifier {
    /// Create a notifier with only the log sink.
    pub fn new() -> Self {
        Self {
            sinks: vec![Box::new(LogSink)],
            timeout: NotifyConfig::default().timeout(),
        }
    }

    /// Create from the `[notify]` config section.
    pub fn from_config(config: &NotifyConfig) -> Self {
        let mut notifier = Self::new().with_timeout(config.timeout());

        if let Some(url) = config.webhook() {
            match WebhookSink::new(url, config.timeout()) {
                Ok(sink) => {
                    info!("Adding webhook notification sink");
                    notifier.add_sink(Box::new(sink));
                }
                Err(e) => warn!("Webhook sink disabled: {}", e),
            }
        }

        notifier
    }

    /// Set the upper bound on a single sink call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn add_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Send a report to all sinks.
    pub async fn notify(&self, report: &Report) -> Vec<NotifyError> {
        let mut errors = Vec::new();

        for sink in &self.sinks {
            let result = match tokio::time::timeout(self.timeout, sink.notify(report)).await {
                Ok(result) => result,
                Err(_) => Err(NotifyError::Send {
                    sink: sink.name().to_string(),
                    message: format!("timed out after {:?}", self.timeout),
                }),
            };

            if let Err(e) = result {
                warn!("Failed to send report via {}: {}", sink.name(), e);
                errors.push(e);
            }
        }

        errors
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
