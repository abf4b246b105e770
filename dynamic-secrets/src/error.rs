//! Error types using thiserror 2.0.
//!
//! Each layer owns its error: [`TransportError`] for the secrets-manager
//! HTTP API, [`StoreError`] for lease persistence, and [`LeaseError`] for
//! the manager surface that wraps both.

use thiserror::Error;

/// Errors raised while talking to the secrets manager.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Secrets manager unreachable or returned a server error
    #[error("Vault unavailable: {0}")]
    Unavailable(String),

    /// Request exceeded the configured timeout
    #[error("Vault request timed out: {0}")]
    Timeout(String),

    /// Token rejected or lacks the required policy
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Nothing mounted or stored at the requested path
    #[error("Not found at path: {0}")]
    NotFound(String),

    /// Rate limited
    #[error("Rate limited")]
    RateLimited,

    /// Any other non-success status
    #[error("Unexpected status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, as returned
        body: String,
    },

    /// Response body did not match the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Token or namespace cannot be sent as a header value
    #[error("Invalid header value for {0}")]
    InvalidHeader(&'static str),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Client(#[source] reqwest::Error),
}

impl TransportError {
    /// Check if error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::Timeout(_) | Self::RateLimited
        )
    }

    /// Classify a reqwest send/receive failure.
    #[must_use]
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}

/// Errors raised by a lease store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backing file could not be read or written
    #[error("Lease store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document could not be (de)serialized
    #[error("Lease store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Blocking store task panicked or was cancelled
    #[error("Lease store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Errors surfaced by the lease manager.
#[derive(Error, Debug)]
pub enum LeaseError {
    /// Secrets manager request failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Lease store operation failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Malformed action, path or configuration
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Credential payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Environment configuration could not be loaded
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type for lease operations.
pub type LeaseResult<T> = Result<T, LeaseError>;

impl LeaseError {
    /// Check if error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Create an invalid argument error.
    #[must_use]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
