//! Common error types for vita agents

use thiserror::Error;

/// Common result type for vita operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across vita microservices
#[derive(Error, Debug)]
pub enum Error {
    /// Channel store operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed envelope construction request
    #[error("Validation error: {0}")]
    Validation(String),

    /// Message channel unavailable or failed
    #[error("Channel error: {0}")]
    Channel(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
