//! Transport error types

use thiserror::Error;

/// Why an outbound request produced no usable body.
///
/// Adapters never see these directly; the convenience wrappers on
/// [`super::Transport`] collapse them to `None` after logging.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("HTTP status {status} for {url}")]
    Status { status: reqwest::StatusCode, url: String },

    #[error("Empty response body from {0}")]
    EmptyBody(String),

    #[error("Response too large ({size} bytes, max {max})")]
    TooLarge { size: u64, max: usize },

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid proxy {address}: {reason}")]
    InvalidProxy { address: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else {
            Self::Other(err.to_string())
        }
    }
}

impl From<reqwest::header::InvalidHeaderValue> for TransportError {
    fn from(err: reqwest::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<reqwest::header::InvalidHeaderName> for TransportError {
    fn from(err: reqwest::header::InvalidHeaderName) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}
