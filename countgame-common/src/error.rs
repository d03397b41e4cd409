//! Common error types for the counting game

use thiserror::Error;

/// Common result type for counting game operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by protocol and configuration code
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or unknown wire message
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
