//! The reconciliation worker.
//!
//! A [`Worker`] owns both stores, the tracker, and the registered mappings.
//! [`Worker::run_cycle`] synchronizes every mapping once; [`Worker::run`]
//! repeats that on the configured interval until a stop is requested.
//!
//! ## State Machine
//!
//! ```text
//! Idle -> Running -> Sleeping -> Running -> ... -> Stopped
//! ```
//!
//! Stops are observed only while sleeping, so a cycle always finishes
//! (including its checkpoint writes) before the worker exits.

use std::sync::Arc;
use std::time::Instant;

use tandem_core::{
    AttributeSnapshot, Attributes, Mapping, MarkerRunner, RecordRef, Runner, StoreKind, Timestamp,
};
use tandem_store::{QueryWindow, RecordStore, RecordWrite, StoreError, Tracker};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::collector::Collector;
use crate::config::WorkerConfig;
use crate::error::{Result, SyncError};

/// Lifecycle state published by a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Constructed, loop not started.
    Idle,
    /// A cycle is in progress.
    Running,
    /// Waiting for the next interval tick.
    Sleeping,
    /// The loop exited after a stop request or a fatal error.
    Stopped,
}

/// Outcome of one mapping within a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingReport {
    pub mapping: String,
    pub window: QueryWindow,
    /// Records with at least one genuine change.
    pub changes: usize,
    /// Changes written to the other store.
    pub applied: usize,
    /// Checkpoint stored after the mapping completed.
    pub checkpoint: Timestamp,
}

/// A mapping whose cycle was skipped. It is retried next cycle.
#[derive(Debug)]
pub struct MappingFailure {
    pub mapping: String,
    pub error: SyncError,
}

/// Summary of one cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    pub mappings: Vec<MappingReport>,
    pub failures: Vec<MappingFailure>,
}

impl CycleReport {
    /// True if every mapping completed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Total changes applied across mappings.
    pub fn applied(&self) -> usize {
        self.mappings.iter().map(|m| m.applied).sum()
    }

    pub fn mapping(&self, id: &str) -> Option<&MappingReport> {
        self.mappings.iter().find(|m| m.mapping == id)
    }
}

/// Periodic bidirectional synchronization between a remote and a local store.
pub struct Worker<R, L, T> {
    remote: R,
    local: L,
    tracker: T,
    mappings: Vec<Mapping>,
    runner: Arc<dyn Runner>,
    config: WorkerConfig,
    state: watch::Sender<WorkerState>,
}

impl<R, L, T> Worker<R, L, T>
where
    R: RecordStore,
    L: RecordStore,
    T: Tracker,
{
    pub fn new(remote: R, local: L, tracker: T, config: WorkerConfig) -> Self {
        let (state, _) = watch::channel(WorkerState::Idle);
        Self {
            remote,
            local,
            tracker,
            mappings: Vec::new(),
            runner: Arc::new(MarkerRunner),
            config,
            state,
        }
    }

    /// Replace the echo-detection predicate.
    pub fn with_runner(mut self, runner: impl Runner + 'static) -> Self {
        self.runner = Arc::new(runner);
        self
    }

    /// Add a mapping, replacing any registered mapping with the same id.
    pub fn register(&mut self, mapping: Mapping) {
        match self.mappings.iter_mut().find(|m| m.id() == mapping.id()) {
            Some(existing) => *existing = mapping,
            None => self.mappings.push(mapping),
        }
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: WorkerState) {
        self.state.send_replace(state);
    }

    /// Synchronize every registered mapping once.
    ///
    /// A mapping that fails is logged, reported, and skipped; the rest still
    /// run. Only fatal errors are returned.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let started_at = Timestamp::now();
        let started = Instant::now();

        tracing::info!(
            mappings = self.mappings.len(),
            started_at = %started_at,
            "starting sync cycle"
        );

        let mut reports = Vec::with_capacity(self.mappings.len());
        let mut failures = Vec::new();

        for mapping in &self.mappings {
            match self.sync_mapping(mapping, started_at).await {
                Ok(report) => reports.push(report),
                Err(error) if error.is_fatal() => {
                    tracing::error!(
                        mapping = mapping.id(),
                        error = %error,
                        fatal = true,
                        "aborting sync cycle"
                    );
                    return Err(error);
                }
                Err(error) => {
                    tracing::error!(
                        mapping = mapping.id(),
                        error = %error,
                        "mapping sync failed, retrying next cycle"
                    );
                    failures.push(MappingFailure {
                        mapping: mapping.id().to_string(),
                        error,
                    });
                }
            }
        }

        let report = CycleReport {
            started_at,
            finished_at: Timestamp::now(),
            mappings: reports,
            failures,
        };

        tracing::info!(
            applied = report.applied(),
            failures = report.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "finished sync cycle"
        );

        Ok(report)
    }

    async fn sync_mapping(&self, mapping: &Mapping, started_at: Timestamp) -> Result<MappingReport> {
        let checkpoint = self
            .tracker
            .checkpoint_for(mapping.id())
            .await
            .map_err(SyncError::Tracker)?;
        let window = self.config.window(checkpoint, started_at);

        let changes = Collector::new(mapping, &self.remote, &self.local, &*self.runner)
            .run(&window)
            .await?;

        let mut applied = 0;
        for (key, snapshots) in changes.iter() {
            if self.apply(mapping, key, snapshots).await? {
                applied += 1;
            }
        }

        let checkpoint = self
            .tracker
            .record_success(mapping.id(), started_at)
            .await
            .map_err(SyncError::Tracker)?;

        tracing::debug!(
            mapping = mapping.id(),
            changes = changes.len(),
            applied,
            checkpoint = %checkpoint,
            "mapping synchronized"
        );

        Ok(MappingReport {
            mapping: mapping.id().to_string(),
            window,
            changes: changes.len(),
            applied,
            checkpoint,
        })
    }

    /// Write the winning snapshot of one record to the other store.
    async fn apply(
        &self,
        mapping: &Mapping,
        key: &RecordRef,
        snapshots: &[AttributeSnapshot],
    ) -> Result<bool> {
        let Some(winner) = self.config.tie_break().pick(snapshots) else {
            return Ok(false);
        };

        let target = winner.kind.other();
        let attributes =
            mapping
                .convert(target, &winner.attributes)
                .map_err(|source| SyncError::Mapping {
                    mapping: mapping.id().to_string(),
                    source,
                })?;

        match winner.kind {
            StoreKind::Remote => self.apply_to_local(mapping, key, attributes).await?,
            StoreKind::Local => self.apply_to_remote(mapping, key, winner, attributes).await?,
        }

        tracing::debug!(
            mapping = mapping.id(),
            record = %key,
            from = %winner.kind,
            to = %target,
            modified = %winner.timestamp,
            "applied change"
        );

        Ok(true)
    }

    async fn apply_to_local(
        &self,
        mapping: &Mapping,
        key: &RecordRef,
        attributes: Attributes,
    ) -> Result<()> {
        let record_type = mapping.local_type();
        let failed = write_error(StoreKind::Local, key);

        let existing = self
            .local
            .find_by_external_id(record_type, &key.id)
            .await
            .map_err(&failed)?;

        match existing {
            Some(record) => self
                .local
                .update(record_type, &record.id, RecordWrite::new(attributes))
                .await
                .map_err(&failed)?,
            None => self
                .local
                .create(
                    record_type,
                    RecordWrite::new(attributes).with_external_id(key.id.clone()),
                )
                .await
                .map_err(&failed)?,
        };

        Ok(())
    }

    /// Write a local change to the remote store, then mark the local record.
    ///
    /// Remote records carry no marker, so the local record's marker must end
    /// up at or after the remote write for the next cycle to see it as our own.
    async fn apply_to_remote(
        &self,
        mapping: &Mapping,
        key: &RecordRef,
        winner: &AttributeSnapshot,
        attributes: Attributes,
    ) -> Result<()> {
        let record_type = mapping.remote_type();
        let failed = write_error(StoreKind::Remote, key);

        let exists = key.is_linked()
            && self
                .remote
                .find(record_type, &key.id)
                .await
                .map_err(&failed)?
                .is_some();

        let mark = if exists {
            self.remote
                .update(record_type, &key.id, RecordWrite::new(attributes))
                .await
                .map_err(&failed)?;
            RecordWrite::default()
        } else {
            if key.is_linked() {
                tracing::warn!(
                    mapping = mapping.id(),
                    record = %key,
                    "linked remote record is gone, recreating"
                );
            }
            let created = self
                .remote
                .create(record_type, RecordWrite::new(attributes))
                .await
                .map_err(&failed)?;

            tracing::debug!(
                mapping = mapping.id(),
                local = %winner.record_id,
                remote = %created.id,
                "created remote record"
            );
            RecordWrite::link(created.id)
        };

        self.local
            .update(mapping.local_type(), &winner.record_id, mark)
            .await
            .map_err(write_error(StoreKind::Local, key))?;

        Ok(())
    }

    /// Run cycles on the configured interval until `stop` becomes true.
    ///
    /// The first cycle starts immediately. Returns early with the error if a
    /// cycle fails fatally.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) -> Result<()> {
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            mappings = self.mappings.len(),
            interval_ms = self.config.interval().as_millis() as u64,
            delay_ms = self.config.delay().as_millis() as u64,
            "worker started"
        );

        loop {
            tokio::select! {
                biased;
                _ = stop_requested(&mut stop) => break,
                _ = ticker.tick() => {}
            }

            self.set_state(WorkerState::Running);
            if let Err(error) = self.run_cycle().await {
                self.set_state(WorkerState::Stopped);
                return Err(error);
            }
            self.set_state(WorkerState::Sleeping);
        }

        self.set_state(WorkerState::Stopped);
        tracing::info!("worker stopped");
        Ok(())
    }
}

impl<R, L, T> Worker<R, L, T>
where
    R: RecordStore + 'static,
    L: RecordStore + 'static,
    T: Tracker + 'static,
{
    /// Run the loop on a background task.
    pub fn spawn(self) -> WorkerHandle {
        let (stop, stop_rx) = watch::channel(false);
        let state = self.subscribe();
        let join = tokio::spawn(async move { self.run(stop_rx).await });

        WorkerHandle { stop, state, join }
    }
}

fn write_error(kind: StoreKind, record: &RecordRef) -> impl Fn(StoreError) -> SyncError + '_ {
    move |source| SyncError::Write {
        kind,
        record: record.clone(),
        source,
    }
}

/// Resolves once `stop` holds true. Never resolves if the sender is gone.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        if stop.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Control over a spawned worker.
pub struct WorkerHandle {
    stop: watch::Sender<bool>,
    state: watch::Receiver<WorkerState>,
    join: JoinHandle<Result<()>>,
}

impl WorkerHandle {
    /// Ask the worker to stop after the current cycle.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the worker to exit on its own.
    pub async fn join(self) -> Result<()> {
        self.join
            .await
            .map_err(|e| SyncError::Join(e.to_string()))?
    }

    /// Request a stop and wait for the in-flight cycle to finish.
    pub async fn shutdown(self) -> Result<()> {
        self.stop();
        self.join().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tandem_store::{MemoryStore, MemoryTracker};
    use tandem_testkit::{fixtures, TestFixture};

    type TestWorker = Worker<Arc<MemoryStore>, Arc<MemoryStore>, Arc<MemoryTracker>>;

    fn worker(fx: &TestFixture) -> TestWorker {
        let config = WorkerConfig::new(Duration::ZERO, Duration::from_millis(20), ".tandem").unwrap();
        let mut worker = Worker::new(fx.remote.clone(), fx.local.clone(), fx.tracker.clone(), config);
        worker.register(fx.mapping.clone());
        worker
    }

    #[test]
    fn test_register_replaces_same_id() {
        let fx = TestFixture::new();
        let mut worker = worker(&fx);

        worker.register(Mapping::new(fx.mapping.id(), "other", "Other__c", [("a", "A")]));
        assert_eq!(worker.mappings().len(), 1);
        assert_eq!(worker.mappings()[0].local_type(), "other");

        worker.register(Mapping::new("second", "b", "B", [("b", "B")]));
        assert_eq!(worker.mappings().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_cycle_advances_checkpoint() {
        let fx = TestFixture::new();
        let worker = worker(&fx);

        let report = worker.run_cycle().await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.applied(), 0);

        let checkpoint = fx.tracker.get(fx.mapping.id()).unwrap();
        assert_eq!(checkpoint.last_run, report.started_at);
    }

    #[tokio::test]
    async fn test_remote_change_creates_linked_local_record() {
        let fx = TestFixture::new();
        fx.seed_remote(fixtures::remote_record("a001", 1_000, "Acme", "x"));
        let worker = worker(&fx);

        let report = worker.run_cycle().await.unwrap();
        assert_eq!(report.applied(), 1);

        let local = fx.local.records(fixtures::LOCAL_TYPE);
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].external_id.as_deref(), Some("a001"));
        assert_eq!(local[0].get("name"), Some(&tandem_core::Value::from("Acme")));
        assert_eq!(local[0].synchronized_at, Some(local[0].last_modified_at));
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let fx = TestFixture::new();
        let worker = worker(&fx);
        assert_eq!(worker.state(), WorkerState::Idle);

        let mut states = worker.subscribe();
        let handle = worker.spawn();

        states
            .wait_for(|s| *s == WorkerState::Sleeping)
            .await
            .unwrap();

        handle.shutdown().await.unwrap();
        assert_eq!(*states.borrow(), WorkerState::Stopped);
    }
}
