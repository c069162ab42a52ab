//! # Syncbox Queue
//!
//! Durable client-side delivery queue for work produced while offline.
//!
//! ## Features
//!
//! - SQLite-backed entry store with versioned schema
//! - Drain on startup and on every offline to online transition
//! - Sequential delivery with a per-entry retry ceiling
//! - Batch and abandonment reports fanned out to notification sinks
//!
//! ```text
//! producer ──enqueue──► QueueController ──add──► EntryStore
//!                            │  ▲
//!            online edge ────┘  └── get_all / put / delete
//!                            │
//!                            ├──deliver──► DeliveryClient
//!                            └──report───► Notifier
//! ```

pub mod connectivity;
pub mod controller;
pub mod delivery;
pub mod entry;
pub mod error;
pub mod notify;
pub mod schema;
pub mod store;

#[cfg(test)]
mod test_helpers;

pub use connectivity::{ConnectivityMonitor, ManualConnectivity, ProbeConnectivity};
pub use controller::{AbandonedEntry, DrainReport, QueueController};
pub use delivery::{DeliveryClient, HttpDeliveryClient};
pub use entry::{EntryId, QueueEntry, RetryDecision, StoredEntry};
pub use error::{DeliveryError, NotifyError, QueueError};
pub use notify::{LogSink, NotificationSink, Notifier, Report, ReportSeverity, WebhookSink};
pub use store::{EntryStore, MemoryEntryStore, SqliteEntryStore};
