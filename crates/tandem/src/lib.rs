//! # Tandem
//!
//! Bidirectional synchronization between a CRM-hosted object store and a
//! local relational database.
//!
//! ## Overview
//!
//! Tandem keeps a set of mapped attributes in agreement across two
//! independently owned record stores:
//!
//! - **Mappings**: Declared correspondence between local attribute names and
//!   remote field names for one record type pair
//! - **Echo suppression**: Every write the engine makes is marked on the
//!   written record, so it is never mistaken for an external change
//! - **Checkpoints**: Durable per-mapping progress, so a crash never skips
//!   changes
//! - **Polling**: A worker runs one cycle per interval until stopped
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tandem::{Daemon, WorkerConfig};
//! use tandem::core::Mapping;
//! use tandem::store::{MemoryStore, SqliteStore};
//!
//! async fn example() -> tandem::Result<()> {
//!     tandem::logging::init(Some("log/tandem.log".as_ref()))?;
//!
//!     let remote = Arc::new(MemoryStore::remote());
//!     let local = Arc::new(SqliteStore::open("app.db")?);
//!
//!     let daemon = Daemon::new(remote, local, WorkerConfig::from_file("tandem.json")?)?
//!         .before(|worker| {
//!             worker.register(Mapping::new(
//!                 "accounts",
//!                 "accounts",
//!                 "Account",
//!                 [("name", "Name")],
//!             ));
//!         });
//!
//!     let result = daemon.run().await;
//!     std::process::exit(tandem::exit_code(&result));
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `tandem::core` - Records, mappings, change sets, and the runner
//! - `tandem::store` - Store and tracker traits with memory, SQLite, and file
//!   implementations
//! - `tandem::sync` - Collector and worker

pub mod daemon;
pub mod error;
pub mod logging;

// Re-export component crates
pub use tandem_core as core;
pub use tandem_store as store;
pub use tandem_sync as sync;

// Re-export main types for convenience
pub use daemon::{exit_code, Daemon};
pub use error::{Error, Result};

pub use tandem_core::{Mapping, Record, RecordRef, StoreKind, Timestamp};
pub use tandem_sync::{TieBreak, Worker, WorkerConfig, WorkerState};
