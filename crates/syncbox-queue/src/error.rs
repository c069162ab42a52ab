//! Queue errors.

use thiserror::Error;

use crate::entry::EntryId;

/// Queue error types.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The backing store cannot be opened or used.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Payload could not be encoded for storage.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Entry reached the retry ceiling and was purged.
    #[error("Entry {id} abandoned after {attempts} attempts: {reason}")]
    RetryExhausted {
        id: EntryId,
        attempts: u32,
        #[source]
        reason: DeliveryError,
    },
}

/// Failure of a single delivery attempt.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// Request never produced a response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request did not complete within the client timeout.
    #[error("Request timed out")]
    Timeout,

    /// Remote answered with a non-success status.
    #[error("Remote rejected delivery with {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Notification sink failure.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification via {sink} failed: {message}")]
    Send { sink: String, message: String },
}
