//! # Tandem Core
//!
//! Pure primitives for Tandem: store kinds, timestamps, records, field
//! mappings, change sets, and the echo-detection predicate.
//!
//! This crate contains no I/O. Stores, trackers, and the worker loop live in
//! `tandem-store` and `tandem-sync`.
//!
//! ## Key Types
//!
//! - [`Mapping`] - Correspondence between local attribute names and remote field names
//! - [`Record`] - A record as reported by either store
//! - [`RecordRef`] - Identity of a logical record across both stores
//! - [`ChangeSet`] - Genuine external changes found in one collection pass
//! - [`Runner`] - Decides whether a record changed outside of synchronization
//!
//! ## Naming
//!
//! Local attribute names are canonical. Snapshots and change sets are always
//! keyed by local names; [`Mapping::convert`] rewrites them into the remote
//! vocabulary when a write targets the remote store.

pub mod change;
pub mod error;
pub mod mapping;
pub mod record;
pub mod runner;
pub mod types;

pub use change::{AttributeSnapshot, ChangeSet};
pub use error::{CoreError, Result};
pub use mapping::{FieldPair, Mapping};
pub use record::{Attributes, Record, Value};
pub use runner::{MarkerRunner, Runner};
pub use types::{RecordRef, StoreKind, Timestamp};
