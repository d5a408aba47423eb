//! Error types for Tandem Core.

use thiserror::Error;

use crate::types::StoreKind;

/// Errors raised by pure data-model operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// An attribute has no counterpart in the mapping.
    ///
    /// This is a configuration defect: the mapping does not cover a name the
    /// caller tried to convert.
    #[error("attribute {attribute:?} has no mapping for the {target} store")]
    UnmappedAttribute { attribute: String, target: StoreKind },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
