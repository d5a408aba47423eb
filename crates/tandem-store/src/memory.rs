//! In-memory implementation of the RecordStore trait.
//!
//! Usable as either side of a sync. Besides the trait's engine writes it
//! offers "external" writes ([`MemoryStore::insert`], [`MemoryStore::edit`])
//! that behave like another application editing the store: they set the
//! modification time and leave the sync marker untouched.
//!
//! A remote-kind store never sets `synchronized_at` itself.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use tandem_core::{Attributes, Record, StoreKind, Timestamp};

use crate::error::{Result, StoreError};
use crate::traits::{write_stamp, QueryWindow, RecordStore, RecordWrite};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    kind: StoreKind,
    inner: RwLock<MemoryStoreInner>,
    unavailable: AtomicBool,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Records indexed by type, then id.
    records: HashMap<String, BTreeMap<String, Record>>,

    /// Next generated id.
    next_id: u64,
}

impl MemoryStoreInner {
    fn generate_id(&mut self, kind: StoreKind) -> String {
        self.next_id += 1;
        match kind {
            StoreKind::Remote => format!("a00{:015}", self.next_id),
            StoreKind::Local => self.next_id.to_string(),
        }
    }

    fn table(&self, record_type: &str) -> Option<&BTreeMap<String, Record>> {
        self.records.get(record_type)
    }
}

impl MemoryStore {
    /// Create a new empty store of the given kind.
    pub fn new(kind: StoreKind) -> Self {
        Self {
            kind,
            inner: RwLock::new(MemoryStoreInner::default()),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn remote() -> Self {
        Self::new(StoreKind::Remote)
    }

    pub fn local() -> Self {
        Self::new(StoreKind::Local)
    }

    /// Make every trait call fail with [`StoreError::Query`] until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Query(format!("{} store unavailable", self.kind)));
        }
        Ok(())
    }

    /// Insert a record as an external actor would.
    ///
    /// An empty id is replaced with a generated one. Remote records are
    /// always their own external id. Returns the stored record.
    pub fn insert(&self, record_type: &str, mut record: Record) -> Record {
        let mut inner = self.inner.write().unwrap();

        if record.id.is_empty() {
            record.id = inner.generate_id(self.kind);
        }
        if self.kind == StoreKind::Remote {
            record.external_id = Some(record.id.clone());
        }

        inner
            .records
            .entry(record_type.to_string())
            .or_default()
            .insert(record.id.clone(), record.clone());

        record
    }

    /// Change fields as an external actor would, at time `at`.
    pub fn edit(
        &self,
        record_type: &str,
        id: &str,
        fields: Attributes,
        at: Timestamp,
    ) -> Result<Record> {
        let mut inner = self.inner.write().unwrap();
        let record = inner
            .records
            .get_mut(record_type)
            .and_then(|t| t.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                record_type: record_type.to_string(),
                id: id.to_string(),
            })?;

        record.fields.extend(fields);
        record.last_modified_at = at;
        Ok(record.clone())
    }

    /// Read a record without going through the async trait.
    pub fn get(&self, record_type: &str, id: &str) -> Option<Record> {
        let inner = self.inner.read().unwrap();
        inner.table(record_type).and_then(|t| t.get(id)).cloned()
    }

    /// All records of a type, ordered by id.
    pub fn records(&self, record_type: &str) -> Vec<Record> {
        let inner = self.inner.read().unwrap();
        inner
            .table(record_type)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, record_type: &str) -> usize {
        let inner = self.inner.read().unwrap();
        inner.table(record_type).map(BTreeMap::len).unwrap_or(0)
    }

    pub fn is_empty(&self, record_type: &str) -> bool {
        self.len(record_type) == 0
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn kind(&self) -> StoreKind {
        self.kind
    }

    async fn query(&self, record_type: &str, window: &QueryWindow) -> Result<Vec<Record>> {
        self.check_available()?;
        let inner = self.inner.read().unwrap();

        let mut records: Vec<Record> = inner
            .table(record_type)
            .map(|t| {
                t.values()
                    .filter(|r| window.contains(r.last_modified_at))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        records.sort_by_key(|r| r.last_modified_at);
        Ok(records)
    }

    async fn find(&self, record_type: &str, id: &str) -> Result<Option<Record>> {
        self.check_available()?;
        Ok(self.get(record_type, id))
    }

    async fn find_by_external_id(
        &self,
        record_type: &str,
        external_id: &str,
    ) -> Result<Option<Record>> {
        self.check_available()?;
        let inner = self.inner.read().unwrap();

        Ok(inner.table(record_type).and_then(|t| {
            t.values()
                .find(|r| r.external_id.as_deref() == Some(external_id))
                .cloned()
        }))
    }

    async fn create(&self, record_type: &str, write: RecordWrite) -> Result<Record> {
        self.check_available()?;
        let mut inner = self.inner.write().unwrap();

        let id = inner.generate_id(self.kind);
        let stamp = write_stamp(None);
        let (external_id, marker) = match self.kind {
            StoreKind::Remote => (Some(id.clone()), None),
            StoreKind::Local => (write.external_id, Some(stamp)),
        };

        let record = Record {
            id: id.clone(),
            external_id,
            last_modified_at: stamp,
            synchronized_at: marker,
            fields: write.attributes,
        };

        inner
            .records
            .entry(record_type.to_string())
            .or_default()
            .insert(id, record.clone());

        Ok(record)
    }

    async fn update(&self, record_type: &str, id: &str, write: RecordWrite) -> Result<Record> {
        self.check_available()?;
        let kind = self.kind;
        let mut inner = self.inner.write().unwrap();

        let record = inner
            .records
            .get_mut(record_type)
            .and_then(|t| t.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                record_type: record_type.to_string(),
                id: id.to_string(),
            })?;

        let stamp = write_stamp(Some(record.last_modified_at));
        record.fields.extend(write.attributes);
        record.last_modified_at = stamp;
        if kind == StoreKind::Local {
            if let Some(external_id) = write.external_id {
                record.external_id = Some(external_id);
            }
            record.synchronized_at = Some(stamp);
        }

        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::Value;

    fn attrs(name: &str) -> Attributes {
        Attributes::from([("Name".to_string(), Value::from(name))])
    }

    #[tokio::test]
    async fn test_create_marks_local_record() {
        let store = MemoryStore::local();
        let record = store
            .create("accounts", RecordWrite::new(attrs("Acme")).with_external_id("a001"))
            .await
            .unwrap();

        assert_eq!(record.synchronized_at, Some(record.last_modified_at));
        assert_eq!(record.external_id.as_deref(), Some("a001"));
        assert_eq!(store.len("accounts"), 1);
    }

    #[tokio::test]
    async fn test_remote_writes_carry_no_marker() {
        let store = MemoryStore::remote();
        let created = store
            .create("Account", RecordWrite::new(attrs("Acme")))
            .await
            .unwrap();
        assert_eq!(created.synchronized_at, None);
        assert_eq!(created.external_id.as_deref(), Some(created.id.as_str()));

        let updated = store
            .update("Account", &created.id, RecordWrite::new(attrs("Globex")))
            .await
            .unwrap();
        assert_eq!(updated.synchronized_at, None);
        assert!(updated.last_modified_at > created.last_modified_at);
    }

    #[tokio::test]
    async fn test_update_merges_and_marks() {
        let store = MemoryStore::local();
        let inserted = store.insert(
            "accounts",
            Record::new("", Timestamp::from_millis(1_000))
                .with_field("name", "old")
                .with_field("phone", "555"),
        );

        let updated = store
            .update(
                "accounts",
                &inserted.id,
                RecordWrite::new(Attributes::from([("name".to_string(), Value::from("new"))]))
                    .with_external_id("a001"),
            )
            .await
            .unwrap();

        assert_eq!(updated.get("name"), Some(&Value::from("new")));
        assert_eq!(updated.get("phone"), Some(&Value::from("555")));
        assert_eq!(updated.external_id.as_deref(), Some("a001"));
        assert_eq!(updated.synchronized_at, Some(updated.last_modified_at));
        assert!(updated.last_modified_at > Timestamp::from_millis(1_000));
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let store = MemoryStore::local();
        let err = store
            .update("accounts", "404", RecordWrite::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_query_respects_window() {
        let store = MemoryStore::remote();
        store.insert("Account", Record::new("a1", Timestamp::from_millis(100)));
        store.insert("Account", Record::new("a2", Timestamp::from_millis(200)));
        store.insert("Account", Record::new("a3", Timestamp::from_millis(300)));

        let window = QueryWindow::new(Timestamp::from_millis(100), Timestamp::from_millis(300));
        let ids: Vec<_> = store
            .query("Account", &window)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();

        assert_eq!(ids, vec!["a2", "a3"]);
    }

    #[tokio::test]
    async fn test_external_edit_leaves_marker() {
        let store = MemoryStore::local();
        let record = store.insert(
            "accounts",
            Record::new("7", Timestamp::from_millis(100)).synchronized_at(Timestamp::from_millis(100)),
        );

        let edited = store
            .edit("accounts", &record.id, attrs("x"), Timestamp::from_millis(500))
            .unwrap();
        assert_eq!(edited.synchronized_at, Some(Timestamp::from_millis(100)));
        assert_eq!(edited.last_modified_at, Timestamp::from_millis(500));
    }

    #[tokio::test]
    async fn test_find_by_external_id() {
        let store = MemoryStore::local();
        store.insert(
            "accounts",
            Record::new("", Timestamp::from_millis(1)).with_external_id("a001"),
        );

        let found = store.find_by_external_id("accounts", "a001").await.unwrap();
        assert!(found.is_some());
        assert!(store
            .find_by_external_id("accounts", "a002")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_queries() {
        let store = MemoryStore::remote();
        store.set_unavailable(true);

        let err = store
            .query("Account", &QueryWindow::up_to(Timestamp::now()))
            .await
            .unwrap_err();
        assert!(err.is_transient());

        store.set_unavailable(false);
        assert!(store
            .query("Account", &QueryWindow::up_to(Timestamp::now()))
            .await
            .is_ok());
    }
}
