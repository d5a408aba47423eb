//! Test doubles for the engine's seams.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tandem_core::{Record, Runner, StoreKind, Timestamp};
use tandem_store::{
    MemoryTracker, QueryWindow, RecordStore, RecordWrite, Result, StoreError, Tracker,
};

/// A runner that gives the same answer for every record.
#[derive(Debug, Clone, Copy)]
pub struct FixedRunner(pub bool);

impl Runner for FixedRunner {
    fn changed(&self, _record: &Record, _marker: Option<Timestamp>) -> bool {
        self.0
    }
}

/// A memory tracker whose writes can be made to fail.
#[derive(Default)]
pub struct FailingTracker {
    inner: MemoryTracker,
    failing: AtomicBool,
}

impl FailingTracker {
    /// A tracker that fails every `record_success` from the start.
    pub fn failing() -> Self {
        let tracker = Self::default();
        tracker.set_failing(true);
        tracker
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &MemoryTracker {
        &self.inner
    }
}

#[async_trait]
impl Tracker for FailingTracker {
    async fn checkpoint_for(&self, mapping_id: &str) -> Result<Timestamp> {
        self.inner.checkpoint_for(mapping_id).await
    }

    async fn record_success(&self, mapping_id: &str, at: Timestamp) -> Result<Timestamp> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.inner.record_success(mapping_id, at).await
    }
}

/// Wraps a store and fails every call for chosen record types.
pub struct FailingStore<S> {
    inner: S,
    failing: Mutex<BTreeSet<String>>,
}

impl<S: RecordStore> FailingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn fail_type(&self, record_type: &str) {
        self.failing.lock().unwrap().insert(record_type.to_string());
    }

    pub fn recover_type(&self, record_type: &str) {
        self.failing.lock().unwrap().remove(record_type);
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check(&self, record_type: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(record_type) {
            return Err(StoreError::Query(format!("{record_type} is unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for FailingStore<S> {
    fn kind(&self) -> StoreKind {
        self.inner.kind()
    }

    async fn query(&self, record_type: &str, window: &QueryWindow) -> Result<Vec<Record>> {
        self.check(record_type)?;
        self.inner.query(record_type, window).await
    }

    async fn find(&self, record_type: &str, id: &str) -> Result<Option<Record>> {
        self.check(record_type)?;
        self.inner.find(record_type, id).await
    }

    async fn find_by_external_id(
        &self,
        record_type: &str,
        external_id: &str,
    ) -> Result<Option<Record>> {
        self.check(record_type)?;
        self.inner.find_by_external_id(record_type, external_id).await
    }

    async fn create(&self, record_type: &str, write: RecordWrite) -> Result<Record> {
        self.check(record_type)?;
        self.inner.create(record_type, write).await
    }

    async fn update(&self, record_type: &str, id: &str, write: RecordWrite) -> Result<Record> {
        self.check(record_type)?;
        self.inner.update(record_type, id, write).await
    }
}

/// Wraps a store and delays every `create` and `update`.
///
/// The delay falls before the write, like a round trip to a remote API, so
/// the stored modification time trails the moment the write was issued.
pub struct SlowStore<S> {
    inner: S,
    latency: Duration,
}

impl<S: RecordStore> SlowStore<S> {
    pub fn new(inner: S, latency: Duration) -> Self {
        Self { inner, latency }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for SlowStore<S> {
    fn kind(&self) -> StoreKind {
        self.inner.kind()
    }

    async fn query(&self, record_type: &str, window: &QueryWindow) -> Result<Vec<Record>> {
        self.inner.query(record_type, window).await
    }

    async fn find(&self, record_type: &str, id: &str) -> Result<Option<Record>> {
        self.inner.find(record_type, id).await
    }

    async fn find_by_external_id(
        &self,
        record_type: &str,
        external_id: &str,
    ) -> Result<Option<Record>> {
        self.inner.find_by_external_id(record_type, external_id).await
    }

    async fn create(&self, record_type: &str, write: RecordWrite) -> Result<Record> {
        tokio::time::sleep(self.latency).await;
        self.inner.create(record_type, write).await
    }

    async fn update(&self, record_type: &str, id: &str, write: RecordWrite) -> Result<Record> {
        tokio::time::sleep(self.latency).await;
        self.inner.update(record_type, id, write).await
    }
}
