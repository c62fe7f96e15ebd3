//! Error types for the gateway crate

use ledgerwatch_ports::FetchError;
use thiserror::Error;

/// Horizon adapter errors
#[derive(Error, Debug)]
pub enum HorizonError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Request to {url} failed with status {status}")]
    Status { status: u16, url: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Convert infrastructure HorizonError to port FetchError
impl From<HorizonError> for FetchError {
    fn from(err: HorizonError) -> Self {
        match err {
            HorizonError::Http(e) => FetchError::Network(e.to_string()),
            HorizonError::Url(e) => FetchError::Network(e.to_string()),
            HorizonError::Status { status, url } => FetchError::RequestFailed { status, url },
            HorizonError::Parse(msg) => FetchError::Decode(msg),
        }
    }
}
