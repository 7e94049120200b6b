//! Error types shared across the bridge

use thiserror::Error;

/// Bridge errors
#[derive(Error, Debug)]
pub enum Error {
    /// Sending or receiving on a transport failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// A message could not be decoded into the expected protocol shape
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The session ended while an operation was waiting on it
    #[error("Session closed")]
    SessionClosed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Decode(format!("invalid base64 payload: {}", err))
    }
}

/// Result alias for bridge operations
pub type Result<T> = std::result::Result<T, Error>;
