//! Echo detection: did a record change because of something other than us?
//!
//! Every engine write to the local store stamps the record's `synchronized_at`
//! marker with the write's own modification time, and every engine write to
//! the remote store is followed by such a marked local write. A record whose
//! last modification is not newer than the marker has not been touched since,
//! so reporting it again would only echo our own write back across. Remote
//! records are checked against the marker of their linked local record.
//!
//! This is the only place that distinguishes engine writes from external
//! writes. The collector depends on the [`Runner`] trait so tests can swap in
//! a fixed answer.

use crate::record::Record;
use crate::types::Timestamp;

/// Decides whether a record carries a genuine external change.
pub trait Runner: Send + Sync {
    /// `marker` is the time of the engine's last write to the record, if any.
    fn changed(&self, record: &Record, marker: Option<Timestamp>) -> bool;
}

/// The marker comparison used in production.
///
/// Returns true when there is no marker (never synchronized) or when the
/// record was modified strictly after the marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerRunner;

impl Runner for MarkerRunner {
    fn changed(&self, record: &Record, marker: Option<Timestamp>) -> bool {
        match marker {
            None => true,
            Some(marker) => record.last_modified_at > marker,
        }
    }
}

impl<R: Runner + ?Sized> Runner for std::sync::Arc<R> {
    fn changed(&self, record: &Record, marker: Option<Timestamp>) -> bool {
        (**self).changed(record, marker)
    }
}
