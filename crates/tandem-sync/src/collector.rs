//! Change collection for one mapping and one cycle.
//!
//! The collector queries both stores for records modified inside the cycle's
//! window, asks the [`Runner`] whether each record changed for a reason other
//! than our own last write, and gathers the genuine changes into a
//! [`ChangeSet`] keyed by logical record.
//!
//! Pairing is by external id: a remote record is keyed by its own id, a local
//! record by the remote id it is linked to. A local record that has never
//! been linked is keyed by its local id until the worker creates its remote
//! counterpart.
//!
//! Only local records carry a sync marker. A remote record is judged against
//! the marker of the local record linked to it, and counts as changed when
//! no linked local record exists.
//!
//! Nothing is written here. Resolving which side wins is the worker's job.

use std::collections::HashMap;
use std::time::Instant;

use tandem_core::{
    AttributeSnapshot, ChangeSet, Mapping, Record, Runner, StoreKind, Timestamp, Value,
};
use tandem_store::{QueryWindow, RecordStore, StoreError};

use crate::error::{Result, SyncError};

/// Collects genuine changes for one mapping.
pub struct Collector<'a> {
    mapping: &'a Mapping,
    remote: &'a dyn RecordStore,
    local: &'a dyn RecordStore,
    runner: &'a dyn Runner,
}

impl<'a> Collector<'a> {
    pub fn new(
        mapping: &'a Mapping,
        remote: &'a dyn RecordStore,
        local: &'a dyn RecordStore,
        runner: &'a dyn Runner,
    ) -> Self {
        Self {
            mapping,
            remote,
            local,
            runner,
        }
    }

    /// Build the change set for `window`.
    ///
    /// Both stores are queried before anything is collected, so a failing
    /// query yields an error and no partial result.
    pub async fn run(&self, window: &QueryWindow) -> Result<ChangeSet> {
        let started = Instant::now();

        let remote_records = self.query(self.remote, StoreKind::Remote, window).await?;
        let local_records = self.query(self.local, StoreKind::Local, window).await?;

        // Markers of linked local records in the window, by remote id.
        let markers: HashMap<String, Option<Timestamp>> = local_records
            .iter()
            .filter_map(|r| Some((r.external_id.clone()?, r.synchronized_at)))
            .collect();

        let mut changes = ChangeSet::new();
        let mut suppressed = 0usize;

        for record in remote_records {
            let marker = match markers.get(&record.id) {
                Some(marker) => *marker,
                None => self.linked_marker(&record.id).await?,
            };
            if !self.collect(&mut changes, StoreKind::Remote, &record, marker) {
                suppressed += 1;
            }
        }

        for record in local_records {
            if !self.collect(&mut changes, StoreKind::Local, &record, record.synchronized_at) {
                suppressed += 1;
            }
        }

        tracing::debug!(
            mapping = self.mapping.id(),
            changes = changes.len(),
            snapshots = changes.snapshot_count(),
            suppressed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "collected changes"
        );

        Ok(changes)
    }

    /// Add `record` to `changes` if the runner reports it changed.
    fn collect(
        &self,
        changes: &mut ChangeSet,
        kind: StoreKind,
        record: &Record,
        marker: Option<Timestamp>,
    ) -> bool {
        if !self.runner.changed(record, marker) {
            tracing::trace!(
                mapping = self.mapping.id(),
                kind = %kind,
                id = %record.id,
                "suppressed echo of our own write"
            );
            return false;
        }

        let key = record.entity_ref(kind);
        tracing::trace!(
            mapping = self.mapping.id(),
            record = %key,
            modified = %record.last_modified_at,
            "collected change"
        );
        changes.insert(key, self.snapshot(kind, record));
        true
    }

    /// The sync marker of the local record linked to `remote_id`.
    async fn linked_marker(&self, remote_id: &str) -> Result<Option<Timestamp>> {
        let record_type = self.mapping.local_type();
        let linked = self
            .local
            .find_by_external_id(record_type, remote_id)
            .await
            .map_err(query_error(StoreKind::Local, record_type))?;
        Ok(linked.and_then(|r| r.synchronized_at))
    }

    async fn query(
        &self,
        store: &dyn RecordStore,
        kind: StoreKind,
        window: &QueryWindow,
    ) -> Result<Vec<Record>> {
        let record_type = self.mapping.record_type(kind);
        store
            .query(record_type, window)
            .await
            .map_err(query_error(kind, record_type))
    }

    /// The mapped attributes of `record`, keyed by local names.
    ///
    /// A mapped field the record does not carry is reported as null.
    fn snapshot(&self, kind: StoreKind, record: &Record) -> AttributeSnapshot {
        AttributeSnapshot {
            kind,
            record_id: record.id.clone(),
            timestamp: record.last_modified_at,
            attributes: self
                .mapping
                .attributes(kind, |field| record.get(field).cloned().unwrap_or(Value::Null)),
        }
    }
}

fn query_error(kind: StoreKind, record_type: &str) -> impl Fn(StoreError) -> SyncError + '_ {
    move |source| SyncError::StoreQuery {
        kind,
        record_type: record_type.to_string(),
        source,
    }
}
