//! Bridge error types

use thiserror::Error;

/// Errors that can occur while driving the messaging client
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("Client command failed: {0}")]
    Command(String),

    #[error("Client reported no protocol version")]
    MissingVersion,

    #[error("Connection refused: {0}")]
    Refused(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type BridgeResult<T> = Result<T, BridgeError>;

impl From<BridgeError> for pairgate_core::Error {
    fn from(err: BridgeError) -> Self {
        pairgate_core::Error::client(err.to_string())
    }
}
