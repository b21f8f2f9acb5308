//! Error types for Cassette Core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error(
        "Cannot persist response for [{method}] {url} because the status code was {status} and `record_failed_requests` is disabled"
    )]
    Policy {
        method: String,
        url: String,
        status: u16,
    },

    #[error("[{0}] must be implemented by the recording backend")]
    NotImplemented(&'static str),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid recording ID: {0}")]
    InvalidRecordingId(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Persist hook error: {0}")]
    Hook(String),
}

pub type Result<T> = std::result::Result<T, Error>;
