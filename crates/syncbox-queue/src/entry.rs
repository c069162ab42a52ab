//! Queue entry definition and retry policy.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Store-assigned entry identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub i64);

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unit of work waiting for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Opaque request body.
    pub payload: Value,
    /// Failed delivery attempts so far.
    pub retry_count: u32,
}

impl QueueEntry {
    /// Create a fresh entry.
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            retry_count: 0,
        }
    }

    /// Decide what happens after a failed delivery attempt.
    ///
    /// The attempt that just failed is counted, so an entry at
    /// `retry_count = max_attempts - 1` is abandoned.
    pub fn decide_after_failure(&self, max_attempts: u32) -> RetryDecision {
        let attempts = self.retry_count.saturating_add(1);
        if attempts >= max_attempts {
            RetryDecision::Abandon { attempts }
        } else {
            RetryDecision::Retry {
                retry_count: attempts,
            }
        }
    }
}

/// Outcome of the retry policy for one failed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Rewrite the entry with the new counter and wait for the next drain.
    Retry { retry_count: u32 },
    /// Purge the entry and report the attempts made.
    Abandon { attempts: u32 },
}

/// An entry as persisted, with its identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub id: EntryId,
    #[serde(flatten)]
    pub entry: QueueEntry,
}

impl StoredEntry {
    pub fn new(id: EntryId, entry: QueueEntry) -> Self {
        Self { id, entry }
    }

    pub fn payload(&self) -> &Value {
        &self.entry.payload
    }

    pub fn retry_count(&self) -> u32 {
        self.entry.retry_count
    }
}
