//! Error types for the sync module.

use std::path::PathBuf;

use tandem_core::{CoreError, RecordRef, StoreKind};
use tandem_store::StoreError;
use thiserror::Error;

/// Errors that can occur during a sync cycle.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A change query failed. Retried on the next scheduled cycle.
    #[error("querying {record_type} on the {kind} store failed: {source}")]
    StoreQuery {
        kind: StoreKind,
        record_type: String,
        #[source]
        source: StoreError,
    },

    /// Applying a change to a store failed.
    #[error("writing {record} to the {kind} store failed: {source}")]
    Write {
        kind: StoreKind,
        record: RecordRef,
        #[source]
        source: StoreError,
    },

    /// The mapping could not convert a change. Skips the mapping's cycle.
    #[error("mapping {mapping} is misconfigured: {source}")]
    Mapping {
        mapping: String,
        #[source]
        source: CoreError,
    },

    /// Checkpoints could not be read or made durable.
    #[error("tracker persistence failed: {0}")]
    Tracker(#[source] StoreError),

    /// Invalid worker configuration.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The worker task ended abnormally.
    #[error("worker task failed: {0}")]
    Join(String),
}

impl SyncError {
    /// Whether the error must stop the worker rather than just one mapping.
    ///
    /// Without durable checkpoints the worker cannot advance safely.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::Tracker(_) | SyncError::Config(_) | SyncError::Join(_)
        )
    }
}

/// Errors in worker configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("delay must be a finite, non-negative number of seconds, got {0}")]
    InvalidDelay(f64),

    #[error("interval must be greater than zero")]
    InvalidInterval,
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
