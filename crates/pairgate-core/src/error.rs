//! Error types for Pairgate

use thiserror::Error;

/// Main error type for Pairgate operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Handshake timed out after {0} seconds")]
    HandshakeTimedOut(u64),

    #[error("Messaging client error: {0}")]
    Client(String),

    #[error("Connection closed before pairing: {0}")]
    ConnectionClosed(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using Pairgate's Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a messaging client error
    pub fn client(message: impl Into<String>) -> Self {
        Error::Client(message.into())
    }

    /// Create an archive error
    pub fn archive(message: impl Into<String>) -> Self {
        Error::Archive(message.into())
    }

    /// Whether a retry by the user could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::HandshakeTimedOut(_) | Error::Client(_) | Error::ConnectionClosed(_)
        )
    }
}
