//! RecordStore trait: the capability both sides of a sync expose.
//!
//! The remote object store and the local database have the same shape from
//! the engine's point of view. Implementations report their [`StoreKind`] so
//! the engine can tell which vocabulary their fields use.

use std::sync::Arc;

use async_trait::async_trait;
use tandem_core::{Attributes, Record, StoreKind, Timestamp};

use crate::error::Result;

/// Bounds of a change query.
///
/// Matches records with `since < last_modified_at <= until`, so consecutive
/// windows that share a boundary never overlap and never leave a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub since: Timestamp,
    pub until: Timestamp,
}

impl QueryWindow {
    pub fn new(since: Timestamp, until: Timestamp) -> Self {
        Self { since, until }
    }

    /// A window covering everything up to `until`.
    pub fn up_to(until: Timestamp) -> Self {
        Self::new(Timestamp::BEGINNING, until)
    }

    pub fn contains(&self, at: Timestamp) -> bool {
        at > self.since && at <= self.until
    }

    pub fn is_empty(&self) -> bool {
        self.until <= self.since
    }
}

/// An engine write: field values plus an optional link to the remote id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordWrite {
    /// Field values in the target store's vocabulary.
    pub attributes: Attributes,
    /// Link the record to this remote id. Ignored by remote stores.
    pub external_id: Option<String>,
}

impl RecordWrite {
    pub fn new(attributes: Attributes) -> Self {
        Self {
            attributes,
            external_id: None,
        }
    }

    pub fn link(external_id: impl Into<String>) -> Self {
        Self {
            attributes: Attributes::new(),
            external_id: Some(external_id.into()),
        }
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }
}

/// Async interface to one record store.
///
/// # Design Notes
///
/// - **Marked writes**: `create` and `update` are only called by the sync
///   engine. On a local store both set `synchronized_at` to the record's new
///   `last_modified_at` in the same operation. Remote stores keep no marker;
///   their records are judged against the linked local record's marker.
/// - **Partial updates**: `update` merges the given attributes into the
///   record; fields not named are left alone. An empty write only moves the
///   marker.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Which side of the sync this store is.
    fn kind(&self) -> StoreKind;

    /// Records of `record_type` modified within `window`, oldest first.
    async fn query(&self, record_type: &str, window: &QueryWindow) -> Result<Vec<Record>>;

    /// Get a record by its own id.
    async fn find(&self, record_type: &str, id: &str) -> Result<Option<Record>>;

    /// Get the record linked to a remote id.
    ///
    /// For a remote store this is the same as [`RecordStore::find`].
    async fn find_by_external_id(
        &self,
        record_type: &str,
        external_id: &str,
    ) -> Result<Option<Record>>;

    /// Create a record and return it as stored.
    async fn create(&self, record_type: &str, write: RecordWrite) -> Result<Record>;

    /// Update a record and return it as stored.
    ///
    /// Fails with `StoreError::NotFound` if the record does not exist.
    async fn update(&self, record_type: &str, id: &str, write: RecordWrite) -> Result<Record>;
}

#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    fn kind(&self) -> StoreKind {
        (**self).kind()
    }

    async fn query(&self, record_type: &str, window: &QueryWindow) -> Result<Vec<Record>> {
        (**self).query(record_type, window).await
    }

    async fn find(&self, record_type: &str, id: &str) -> Result<Option<Record>> {
        (**self).find(record_type, id).await
    }

    async fn find_by_external_id(
        &self,
        record_type: &str,
        external_id: &str,
    ) -> Result<Option<Record>> {
        (**self).find_by_external_id(record_type, external_id).await
    }

    async fn create(&self, record_type: &str, write: RecordWrite) -> Result<Record> {
        (**self).create(record_type, write).await
    }

    async fn update(&self, record_type: &str, id: &str, write: RecordWrite) -> Result<Record> {
        (**self).update(record_type, id, write).await
    }
}

/// Modification time for an engine write to a record last modified at `previous`.
///
/// Never earlier than the clock and always strictly after `previous`, so a
/// marked write is distinguishable from the change it overwrote.
pub(crate) fn write_stamp(previous: Option<Timestamp>) -> Timestamp {
    let now = Timestamp::now();
    match previous {
        Some(prev) if prev >= now => Timestamp::from_millis(prev.as_millis().saturating_add(1)),
        _ => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_is_half_open() {
        let window = QueryWindow::new(Timestamp::from_millis(10), Timestamp::from_millis(20));
        assert!(!window.contains(Timestamp::from_millis(10)));
        assert!(window.contains(Timestamp::from_millis(11)));
        assert!(window.contains(Timestamp::from_millis(20)));
        assert!(!window.contains(Timestamp::from_millis(21)));
    }

    #[test]
    fn test_adjacent_windows_partition() {
        let first = QueryWindow::new(Timestamp::from_millis(0), Timestamp::from_millis(50));
        let second = QueryWindow::new(Timestamp::from_millis(50), Timestamp::from_millis(100));

        for t in 1..=100 {
            let at = Timestamp::from_millis(t);
            assert!(first.contains(at) ^ second.contains(at), "t={}", t);
        }
    }

    #[test]
    fn test_write_stamp_moves_past_future_modification() {
        let future = Timestamp::now().saturating_add(std::time::Duration::from_secs(60));
        assert!(write_stamp(Some(future)) > future);
    }
}
