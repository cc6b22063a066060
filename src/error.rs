//! Error types for the data room service.

use thiserror::Error;

/// Common error type for the data room service.
#[derive(Error, Debug)]
pub enum DataRoomError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant automatically.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for request parameters.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Request conflicts with existing state (e.g. folder outside the room).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Access denied.
    #[error("access denied: {0}")]
    Access(String),

    /// The resource exists but is not available yet.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The upload session has expired.
    #[error("expired: {0}")]
    Expired(String),

    /// Chunk or artifact storage failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// The final artifact could not be assembled from staged chunks.
    #[error("assembly error: {0}")]
    Assembly(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for DataRoomError {
    fn from(e: sqlx::Error) -> Self {
        DataRoomError::Database(e.to_string())
    }
}

/// Result type alias for data room operations.
pub type Result<T> = std::result::Result<T, DataRoomError>;
