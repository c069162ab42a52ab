//! Test doubles shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::entry::{EntryId, QueueEntry, StoredEntry};
use crate::error::{DeliveryError, NotifyError, QueueError};
use crate::notify::{NotificationSink, Report};
use crate::store::{EntryStore, MemoryEntryStore};
use crate::DeliveryClient;

/// Delivery client that fails for a fixed set of payloads.
#[derive(Default)]
pub struct ScriptedDelivery {
    failing: Vec<Value>,
    delay: Option<Duration>,
    calls: Mutex<Vec<Value>>,
}

impl ScriptedDelivery {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing_for(payloads: Vec<Value>) -> Self {
        Self {
            failing: payloads,
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryClient for ScriptedDelivery {
    async fn deliver(&self, payload: &Value) -> Result<(), DeliveryError> {
        self.calls.lock().unwrap().push(payload.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.contains(payload) {
            Err(DeliveryError::Rejected {
                status: 500,
                body: "scripted failure".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

/// Sink that keeps every report it receives.
#[derive(Clone, Default)]
pub struct RecordingSink {
    reports: Arc<Mutex<Vec<Report>>>,
}

impl RecordingSink {
    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify(&self, report: &Report) -> Result<(), NotifyError> {
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}

/// Sink that always fails.
pub struct FailingSink;

#[async_trait]
impl NotificationSink for FailingSink {
    fn name(&self) -> &str {
        "failing"
    }

    async fn notify(&self, _report: &Report) -> Result<(), NotifyError> {
        Err(NotifyError::Send {
            sink: "failing".to_string(),
            message: "sink down".to_string(),
        })
    }
}

/// Sink that never finishes.
pub struct HangingSink;

#[async_trait]
impl NotificationSink for HangingSink {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn notify(&self, _report: &Report) -> Result<(), NotifyError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Memory store that counts reads and can be switched into a broken state.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryEntryStore,
    reads: AtomicUsize,
    broken: std::sync::atomic::AtomicBool,
}

impl CountingStore {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn break_store(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), QueueError> {
        if self.broken.load(Ordering::SeqCst) {
            Err(QueueError::StoreUnavailable("store is broken".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl EntryStore for CountingStore {
    async fn add(&self, entry: &QueueEntry) -> Result<EntryId, QueueError> {
        self.check()?;
        self.inner.add(entry).await
    }

    async fn get_all(&self) -> Result<Vec<StoredEntry>, QueueError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.get_all().await
    }

    async fn put(&self, entry: &StoredEntry) -> Result<(), QueueError> {
        self.check()?;
        self.inner.put(entry).await
    }

    async fn delete(&self, id: EntryId) -> Result<(), QueueError> {
        self.check()?;
        self.inner.delete(id).await
    }

    async fn count(&self) -> Result<usize, QueueError> {
        self.check()?;
        self.inner.count().await
    }
}
