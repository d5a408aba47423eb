//! # Tandem Sync
//!
//! The reconciliation engine: collect genuine changes from both stores and
//! apply them across, once per cycle, on a fixed cadence.
//!
//! ## Overview
//!
//! For every registered [`Mapping`](tandem_core::Mapping) a cycle:
//!
//! 1. reads the mapping's checkpoint from the [`Tracker`](tandem_store::Tracker)
//! 2. runs the [`Collector`] over the window since that checkpoint
//! 3. applies the newer side of each changed record to the other store
//! 4. advances the checkpoint to the cycle's start time
//!
//! The [`Worker`] repeats this on an interval until asked to stop. A stop
//! request is only honoured between cycles.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tandem_core::Mapping;
//! use tandem_store::{MemoryStore, MemoryTracker, SqliteStore};
//! use tandem_sync::{Worker, WorkerConfig};
//!
//! async fn example() {
//!     let remote = Arc::new(MemoryStore::remote());
//!     let local = Arc::new(SqliteStore::open("app.db").unwrap());
//!     let tracker = Arc::new(MemoryTracker::new());
//!
//!     let mut worker = Worker::new(remote, local, tracker, WorkerConfig::default());
//!     worker.register(Mapping::new(
//!         "accounts",
//!         "accounts",
//!         "Account",
//!         [("name", "Name"), ("phone", "Phone")],
//!     ));
//!
//!     let handle = worker.spawn();
//!     // ...
//!     handle.shutdown().await.unwrap();
//! }
//! ```
//!
//! ## Cycle Timeline
//!
//! ```text
//! checkpoint - delay          start - delay   start
//!        |--------- window ---------|           |
//!        (exclusive)           (inclusive)      `-- next checkpoint
//! ```

pub mod collector;
pub mod config;
pub mod error;
pub mod worker;

pub use collector::Collector;
pub use config::{TieBreak, WorkerConfig};
pub use error::{ConfigError, Result, SyncError};
pub use worker::{CycleReport, MappingFailure, MappingReport, Worker, WorkerHandle, WorkerState};
