// crates/network/src/error.rs
//! Error types for network operations

use syncwatch_core::{CoreError, FailureKind};
use thiserror::Error;

/// Result type for network operations
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Errors that can occur during network operations
#[derive(Debug, Error)]
pub enum NetworkError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The server answered `{ok: false}`
    #[error("Server refused the request: {0}")]
    Rejected(String),

    /// Response body did not match the expected shape
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Domain payload failed validation
    #[error("Invalid payload: {0}")]
    Payload(#[from] CoreError),

    /// A subscription registry lock was poisoned
    #[error("Stream registry lock poisoned")]
    LockPoisoned,
}

impl NetworkError {
    /// Returns true if the error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::Http(e) => !e.is_builder() && !e.is_decode(),
            NetworkError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true if the error is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        match self {
            NetworkError::Status { status, .. } => (400..500).contains(status),
            NetworkError::Http(e) => e.status().is_some_and(|s| s.is_client_error()),
            _ => false,
        }
    }

    /// Returns true if the error is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        match self {
            NetworkError::Status { status, .. } => *status >= 500,
            NetworkError::Http(e) => e.status().is_some_and(|s| s.is_server_error()),
            _ => false,
        }
    }

    /// Maps the error onto the shared failure taxonomy
    pub fn kind(&self) -> FailureKind {
        match self {
            NetworkError::Decode(_) | NetworkError::Payload(_) => FailureKind::MalformedPayload,
            NetworkError::Http(e) if e.is_decode() => FailureKind::MalformedPayload,
            _ => FailureKind::Transport,
        }
    }

    pub(crate) fn from_status(status: reqwest::StatusCode) -> Self {
        NetworkError::Status {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        }
    }
}
