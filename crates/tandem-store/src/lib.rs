//! # Tandem Store
//!
//! Storage abstraction for Tandem. Both sides of a synchronization, the
//! CRM-hosted object store and the local relational database, are consumed
//! through the [`RecordStore`] trait. Checkpoints are persisted through the
//! [`Tracker`] trait.
//!
//! ## Key Types
//!
//! - [`RecordStore`] - Async trait for querying and writing records
//! - [`MemoryStore`] - In-memory store of either kind, for tests and stand-ins
//! - [`SqliteStore`] - SQLite-backed local store; also a [`Tracker`]
//! - [`Tracker`] - Per-mapping "last successful sync" checkpoints
//! - [`FileTracker`] - Checkpoints in a flat JSON file, replaced atomically
//! - [`MemoryTracker`] - In-memory checkpoints for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tandem_store::{FileTracker, QueryWindow, RecordStore, SqliteStore, Tracker};
//! use tandem_core::Timestamp;
//!
//! async fn example() {
//!     let local = SqliteStore::open("app.db").unwrap();
//!     let tracker = FileTracker::open(".tandem").unwrap();
//!
//!     let since = tracker.checkpoint_for("accounts").await.unwrap();
//!     let window = QueryWindow::new(since, Timestamp::now());
//!     let records = local.query("accounts", &window).await.unwrap();
//!     println!("{} records changed", records.len());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Marked writes**: local stores stamp `synchronized_at` with the write's
//!   own modification time on `create` and `update`, in the same operation as
//!   the attribute write; remote stores keep no marker
//! - **Half-open windows**: queries return records modified in `(since, until]`
//! - **Monotonic checkpoints**: trackers never move a checkpoint backwards

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod tracker;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use tracker::{Checkpoint, FileTracker, MemoryTracker, Tracker};
pub use traits::{QueryWindow, RecordStore, RecordWrite};
