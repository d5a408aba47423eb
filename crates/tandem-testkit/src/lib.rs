//! # Tandem Testkit
//!
//! Testing utilities for Tandem.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a remote and a local memory store, a tracker, and a sample
//!   mapping wired together, plus record builders
//! - **Doubles**: a fixed-answer [`Runner`](tandem_core::Runner), store
//!   wrappers that fail on demand or delay writes, and a failing tracker
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! ```rust
//! use tandem_testkit::{fixtures, TestFixture};
//!
//! let fixture = TestFixture::new();
//! fixture.seed_remote(fixtures::remote_record("a001", 1_000, "Acme", "x"));
//! assert_eq!(fixture.remote.len(fixtures::REMOTE_TYPE), 1);
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use tandem_testkit::generators::{attributes_for, field_pairs};
//!
//! proptest! {
//!     #[test]
//!     fn round_trip((pairs, attrs) in field_pairs().prop_flat_map(attributes_for)) {
//!         // ...
//!     }
//! }
//! ```

pub mod doubles;
pub mod fixtures;
pub mod generators;

pub use doubles::{FailingStore, FailingTracker, FixedRunner, SlowStore};
pub use fixtures::TestFixture;
