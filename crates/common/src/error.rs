//! Error types for Logbay
//!
//! One error enum shared by every crate in the workspace. Endpoint
//! construction surfaces these to the factory caller; steady-state tasks log
//! and swallow them instead of propagating across task boundaries.

use thiserror::Error;

/// Main error type for Logbay operations
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration errors (missing required field, unknown endpoint type,
    /// unreadable TLS material, invalid port)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A second endpoint registered under an already-taken name
    #[error("Endpoint {0} already exists")]
    Duplicate(String),

    /// I/O errors (listen failures, trust-material reads)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Redis client errors (publish failures, subscription setup)
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// External service errors (HTTP posts, WebSocket writes)
    #[error("External service error: {0}")]
    External(String),

    /// Generic errors
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Result type alias for Logbay operations
pub type Result<T> = std::result::Result<T, Error>;
