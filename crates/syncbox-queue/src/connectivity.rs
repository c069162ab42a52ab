//! Online/offline signal.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use syncbox_config::ConnectivityConfig;

use crate::error::DeliveryError;

#[cfg(test)]
#[path = "connectivity_tests.rs"]
mod tests;

/// Source of the current connectivity state and its changes.
pub trait ConnectivityMonitor: Send + Sync {
    /// Whether the device is currently considered online.
    fn is_online(&self) -> bool;

    /// Receiver notified on every state change.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Connectivity state driven by the owner through [`set_online`](Self::set_online).
pub struct ManualConnectivity {
    sender: watch::Sender<bool>,
}

impl ManualConnectivity {
    pub fn new(online: bool) -> Self {
        let (sender, _) = watch::channel(online);
        Self { sender }
    }

    /// A signal that starts online.
    pub fn online() -> Self {
        Self::new(true)
    }

    /// A signal that starts offline.
    pub fn offline() -> Self {
        Self::new(false)
    }

    /// Update the state. Subscribers are only woken on an actual change.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.sender.send_if_modified(|state| {
            if *state == online {
                false
            } else {
                *state = online;
                true
            }
        });

        if changed {
            debug!("Connectivity changed: {}", if online { "online" } else { "offline" });
        }
        changed
    }
}

impl ConnectivityMonitor for ManualConnectivity {
    fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

/// Periodic reachability probe.
///
/// Any HTTP response from the probe URL counts as online; a transport error
/// or timeout counts as offline. The state starts offline until the first
/// probe completes.
pub struct ProbeConnectivity {
    url: String,
    interval: Duration,
    client: reqwest::Client,
    state: ManualConnectivity,
}

impl ProbeConnectivity {
    pub fn new(
        url: impl Into<String>,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            interval,
            client,
            state: ManualConnectivity::offline(),
        })
    }

    /// Create from the `[connectivity]` section. `None` when no probe URL is set.
    pub fn from_config(config: &ConnectivityConfig) -> Result<Option<Self>, DeliveryError> {
        config
            .probe_url
            .as_ref()
            .map(|url| Self::new(url, config.probe_interval(), config.probe_timeout()))
            .transpose()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Probe once and publish the result.
    pub async fn check(&self) -> bool {
        let online = match self.client.head(&self.url).send().await {
            Ok(response) => {
                debug!("Probe {} answered {}", self.url, response.status());
                true
            }
            Err(e) => {
                debug!("Probe {} failed: {}", self.url, e);
                false
            }
        };

        if self.state.set_online(online) {
            info!(
                "Connectivity is now {} (probe {})",
                if online { "online" } else { "offline" },
                self.url
            );
        }
        online
    }

    /// Probe on a fixed interval until `shutdown` fires.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Connectivity probe started ({}, interval: {:?})",
            self.url, self.interval
        );

        loop {
            self.check().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.changed() => {
                    info!("Connectivity probe shutting down");
                    break;
                }
            }
        }
    }
}

impl ConnectivityMonitor for ProbeConnectivity {
    fn is_online(&self) -> bool {
        self.state.is_online()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}
