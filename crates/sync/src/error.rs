//! Error types for the sync engine

use ledgerwatch_ports::{FetchError, TransportError};
use thiserror::Error;

/// Sync engine errors
///
/// `Clone` so one failure can be delivered to every consumer of a
/// subscription.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The account answered 404; retried internally while awaiting existence
    #[error("Account {0} does not exist yet")]
    NotFoundYet(String),

    #[error("Request failed with status {status}")]
    RequestFailed { status: u16 },

    /// Read failed without an HTTP status (network, decoding)
    #[error("Fetch failed: {0}")]
    Fetch(FetchError),

    #[error("Operation cancelled")]
    Cancelled,

    /// Unrecoverable push stream failure
    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Failed to decode pushed message: {0}")]
    Decode(String),
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;

impl From<FetchError> for SyncError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::RequestFailed { status, .. } => SyncError::RequestFailed { status },
            other => SyncError::Fetch(other),
        }
    }
}

impl From<TransportError> for SyncError {
    fn from(err: TransportError) -> Self {
        SyncError::Stream(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Decode(err.to_string())
    }
}
