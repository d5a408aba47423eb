//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store and tracker operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Attribute or checkpoint serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The store could not answer a query (network, auth, unavailable).
    ///
    /// Transient: the next scheduled cycle retries.
    #[error("query failed: {0}")]
    Query(String),

    /// Record not found.
    #[error("{record_type} record not found: {id}")]
    NotFound { record_type: String, id: String },

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether retrying later may succeed without operator action.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Query(_) | StoreError::Io(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
