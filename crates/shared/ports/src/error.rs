use thiserror::Error;

/// Errors of a single request/response read
///
/// Infrastructure implementations convert their specific errors to this type.
/// A 404 on a resource that may legitimately be absent is not an error: the
/// read returns `Ok(None)` instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request to {url} failed with status {status}")]
    RequestFailed { status: u16, url: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl FetchError {
    /// HTTP status of the failed request, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Errors of the server-push transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Stream request rejected with status {status}")]
    Rejected { status: u16 },

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Stream interrupted: {0}")]
    Stream(String),
}

impl TransportError {
    /// Whether reconnecting can help. Client errors other than timeouts and
    /// rate limiting mean the stream URL itself is wrong.
    pub fn is_recoverable(&self) -> bool {
        match self {
            TransportError::Rejected { status } => {
                !(400..500).contains(status) || *status == 408 || *status == 429
            }
            TransportError::Connect(_) | TransportError::Stream(_) => true,
        }
    }
}
