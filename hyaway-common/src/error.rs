//! Common error types for hyAway

use thiserror::Error;

/// Common result type for hyAway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across hyAway crates
///
/// The persistence and broadcast variants are contained by the preference
/// store and synchronizer: they are logged and never reach UI callers.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Durable write rejected by the storage backend (quota, disabled storage)
    #[error("Persistence write failed for {key}: {reason}")]
    PersistenceWrite { key: String, reason: String },

    /// Stored state could not be decoded on rehydration
    #[error("Persisted state for {key} is corrupt: {reason}")]
    PersistenceReadCorrupt { key: String, reason: String },

    /// Cross-tab broadcast transport missing or blocked
    #[error("Broadcast transport unavailable: {0}")]
    BroadcastUnavailable(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
