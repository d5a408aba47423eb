//! Error types for the daemon.

use std::path::PathBuf;

use tandem_store::StoreError;
use tandem_sync::{ConfigError, SyncError};
use thiserror::Error;

/// Errors that can stop the daemon.
#[derive(Debug, Error)]
pub enum Error {
    /// Sync error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The log file could not be opened.
    #[error("failed to open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A global subscriber was already installed.
    #[error("failed to install logger: {0}")]
    Logger(String),
}

/// Result type for daemon operations.
pub type Result<T> = std::result::Result<T, Error>;
