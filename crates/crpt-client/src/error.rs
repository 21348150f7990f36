//! Client error types.

use thiserror::Error;

/// Errors from submitting a document.
///
/// Limiter outcomes stay separate from transport and payload failures so a
/// caller can tell "never sent" from "sent and failed".
#[derive(Debug, Error)]
pub enum ClientError {
    /// No slot was granted; the request was never sent.
    #[error("rate limiter: {0}")]
    Limiter(#[from] crpt_limiter::LimitError),

    /// The HTTP exchange failed (connection, timeout, body read).
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The document could not be encoded or decoded as JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    /// Returns `true` when the request was abandoned while waiting for a
    /// rate-limit slot.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Limiter(e) if e.is_cancelled())
    }
}

/// Convenience alias for client results.
pub type ClientResult<T> = std::result::Result<T, ClientError>;
