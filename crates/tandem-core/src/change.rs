//! Change sets: genuine external changes found in one collection pass.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::record::Attributes;
use crate::types::{RecordRef, StoreKind, Timestamp};

/// The mapped attributes of one side of a record at one modification.
///
/// Attributes are keyed by local names regardless of which store they were
/// read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSnapshot {
    /// Store the snapshot was read from.
    pub kind: StoreKind,
    /// Id of the source record in that store.
    pub record_id: String,
    /// The source record's last-modification time.
    pub timestamp: Timestamp,
    pub attributes: Attributes,
}

/// Genuinely changed snapshots per logical record.
///
/// Snapshots under one key are kept ordered by `(timestamp, kind)`, so the
/// last entry is the most recent change and an exact tie lists the local
/// side before the remote side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    entries: BTreeMap<RecordRef, Vec<AttributeSnapshot>>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a snapshot under a record.
    ///
    /// A second snapshot from the same side replaces the first.
    pub fn insert(&mut self, key: RecordRef, snapshot: AttributeSnapshot) {
        let snapshots = self.entries.entry(key).or_default();
        snapshots.retain(|s| s.kind != snapshot.kind);
        snapshots.push(snapshot);
        snapshots.sort_by_key(|s| (s.timestamp, s.kind));
    }

    /// Snapshots for a record; empty if nothing changed.
    pub fn get(&self, key: &RecordRef) -> &[AttributeSnapshot] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The snapshot for one side of a record, if that side changed.
    pub fn side(&self, key: &RecordRef, kind: StoreKind) -> Option<&AttributeSnapshot> {
        self.get(key).iter().find(|s| s.kind == kind)
    }

    pub fn contains(&self, key: &RecordRef) -> bool {
        !self.get(key).is_empty()
    }

    /// Number of records with at least one change.
    pub fn len(&self) -> usize {
        self.entries.values().filter(|s| !s.is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of snapshots across all records.
    pub fn snapshot_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn keys(&self) -> impl Iterator<Item = &RecordRef> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RecordRef, &[AttributeSnapshot])> {
        self.entries.iter().map(|(k, v)| (k, v.as_slice()))
    }
}

impl IntoIterator for ChangeSet {
    type Item = (RecordRef, Vec<AttributeSnapshot>);
    type IntoIter = std::collections::btree_map::IntoIter<RecordRef, Vec<AttributeSnapshot>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
