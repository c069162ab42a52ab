//! Queue controller: enqueue, drain and the connectivity-driven run loop.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

use syncbox_config::QueueConfig;

use crate::connectivity::ConnectivityMonitor;
use crate::delivery::DeliveryClient;
use crate::entry::{EntryId, QueueEntry, RetryDecision, StoredEntry};
use crate::error::{DeliveryError, QueueError};
use crate::notify::{Notifier, Report};
use crate::store::EntryStore;

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;

/// An entry dropped during a drain cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbandonedEntry {
    pub id: EntryId,
    pub attempts: u32,
    pub reason: String,
}

/// Outcome of one drain cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// The cycle did nothing because the device was offline.
    pub skipped_offline: bool,
    /// Entries in the snapshot taken at the start of the cycle.
    pub attempted: usize,
    /// Entries delivered and removed.
    pub delivered: usize,
    /// Entries that failed and were kept with a higher retry count.
    pub retried: usize,
    /// Entries that hit the retry ceiling and were removed.
    pub abandoned: Vec<AbandonedEntry>,
}

impl DrainReport {
    fn skipped() -> Self {
        Self {
            skipped_offline: true,
            ..Default::default()
        }
    }
}

enum EntryOutcome {
    Delivered,
    Retrying,
}

/// Coordinates the entry store, delivery client, connectivity signal and
/// notifier.
pub struct QueueController {
    max_attempts: u32,
    store: Arc<dyn EntryStore>,
    delivery: Arc<dyn DeliveryClient>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    notifier: Notifier,
    drain_lock: Mutex<()>,
}

impl QueueController {
    pub fn new(
        config: &QueueConfig,
        store: Arc<dyn EntryStore>,
        delivery: Arc<dyn DeliveryClient>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        notifier: Notifier,
    ) -> Self {
        Self {
            max_attempts: config.max_attempts,
            store,
            delivery,
            connectivity,
            notifier,
            drain_lock: Mutex::new(()),
        }
    }

    /// Get the entry store.
    pub fn store(&self) -> &Arc<dyn EntryStore> {
        &self.store
    }

    /// Persist a payload for later delivery.
    ///
    /// A `null` payload is ignored and returns `Ok(None)`. Enqueueing does not
    /// trigger a drain.
    pub async fn enqueue(&self, payload: Value) -> Result<Option<EntryId>, QueueError> {
        if payload.is_null() {
            debug!("Ignoring empty payload");
            return Ok(None);
        }

        let id = self.store.add(&QueueEntry::new(payload)).await?;
        debug!("Enqueued entry {}", id);
        Ok(Some(id))
    }

    /// Attempt delivery of every entry currently stored.
    ///
    /// Entries are processed one at a time in id order. Delivery failures
    /// are absorbed into the report; store failures abort the cycle.
    pub async fn drain(&self) -> Result<DrainReport, QueueError> {
        if !self.connectivity.is_online() {
            debug!("Offline, skipping drain");
            return Ok(DrainReport::skipped());
        }

        let _guard = self.drain_lock.lock().await;

        // The state may have flipped while waiting on another cycle.
        if !self.connectivity.is_online() {
            debug!("Went offline while waiting, skipping drain");
            return Ok(DrainReport::skipped());
        }

        let snapshot = self.store.get_all().await?;
        let mut report = DrainReport {
            attempted: snapshot.len(),
            ..Default::default()
        };

        if snapshot.is_empty() {
            debug!("Queue is empty");
            return Ok(report);
        }

        info!("Draining {} queued entries", snapshot.len());

        for entry in snapshot {
            match self.process_entry(entry).await {
                Ok(EntryOutcome::Delivered) => report.delivered += 1,
                Ok(EntryOutcome::Retrying) => report.retried += 1,
                Err(QueueError::RetryExhausted {
                    id,
                    attempts,
                    reason,
                }) => {
                    error!(
                        "Entry {} abandoned after {} attempts: {}",
                        id, attempts, reason
                    );
                    report.abandoned.push(AbandonedEntry {
                        id,
                        attempts,
                        reason: reason.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        self.notifier
            .notify(&Report::BatchCompleted {
                count: report.delivered,
                attempted: report.attempted,
            })
            .await;

        info!(
            "Drain finished: {} delivered, {} retrying, {} abandoned",
            report.delivered,
            report.retried,
            report.abandoned.len()
        );

        Ok(report)
    }

    async fn process_entry(&self, entry: StoredEntry) -> Result<EntryOutcome, QueueError> {
        match self.delivery.deliver(entry.payload()).await {
            Ok(()) => {
                self.store.delete(entry.id).await?;
                debug!("Delivered entry {}", entry.id);
                Ok(EntryOutcome::Delivered)
            }
            Err(reason) => self.handle_failure(entry, reason).await,
        }
    }

    async fn handle_failure(
        &self,
        mut entry: StoredEntry,
        reason: DeliveryError,
    ) -> Result<EntryOutcome, QueueError> {
        match entry.entry.decide_after_failure(self.max_attempts) {
            RetryDecision::Abandon { attempts } => {
                self.store.delete(entry.id).await?;
                self.notifier
                    .notify(&Report::Abandoned {
                        id: entry.id,
                        attempts,
                    })
                    .await;
                Err(QueueError::RetryExhausted {
                    id: entry.id,
                    attempts,
                    reason,
                })
            }
            RetryDecision::Retry { retry_count } => {
                entry.entry.retry_count = retry_count;
                self.store.put(&entry).await?;
                warn!(
                    "Delivery of entry {} failed (retry {}/{}): {}",
                    entry.id, retry_count, self.max_attempts, reason
                );
                Ok(EntryOutcome::Retrying)
            }
        }
    }

    /// Drain once at startup, then on every offline to online transition,
    /// until `shutdown` fires or the connectivity source goes away.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut online = self.connectivity.subscribe();
        online.mark_unchanged();

        info!("Queue controller started");
        self.drain_logged().await;

        loop {
            tokio::select! {
                changed = online.changed() => {
                    if changed.is_err() {
                        warn!("Connectivity source closed, stopping queue controller");
                        break;
                    }
                    if *online.borrow_and_update() {
                        info!("Back online, draining queue");
                        self.drain_logged().await;
                    } else {
                        debug!("Went offline");
                    }
                }
                _ = shutdown.changed() => {
                    info!("Queue controller shutting down");
                    break;
                }
            }
        }
    }

    async fn drain_logged(&self) {
        if let Err(e) = self.drain().await {
            error!("Queue drain failed: {}", e);
        }
    }
}
