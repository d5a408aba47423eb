//! SQLite implementation of the RecordStore and Tracker traits.
//!
//! This is the local side of a sync: a relational database holding records
//! of any number of types, each with an optional link to its remote id and
//! the engine's `synchronized_at` marker. The same database can hold the
//! worker's checkpoints. It uses rusqlite with bundled SQLite, wrapped in
//! async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tandem_core::{Attributes, Record, StoreKind, Timestamp};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::tracker::Tracker;
use crate::traits::{write_stamp, QueryWindow, RecordStore, RecordWrite};

const RECORD_COLUMNS: &str = "id, external_id, fields, updated_at, synchronized_at";

/// SQLite-based local store.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }

    /// Insert a record as the owning application would.
    ///
    /// Keeps the given timestamps and marker; the record's id is assigned by
    /// the database. Returns the stored record.
    pub async fn insert(&self, record_type: &str, record: &Record) -> Result<Record> {
        let record_type = record_type.to_string();
        let record = record.clone();

        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO records (record_type, external_id, fields, updated_at, synchronized_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record_type,
                    record.external_id,
                    serde_json::to_string(&record.fields)?,
                    record.last_modified_at.as_millis(),
                    record.synchronized_at.map(|t| t.as_millis()),
                ],
            )?;

            let id = conn.last_insert_rowid();
            Ok(Record {
                id: id.to_string(),
                ..record
            })
        })
        .await
    }

    /// Change fields as the owning application would, at time `at`.
    ///
    /// The sync marker is left as it was.
    pub async fn edit(
        &self,
        record_type: &str,
        id: &str,
        fields: Attributes,
        at: Timestamp,
    ) -> Result<Record> {
        let record_type = record_type.to_string();
        let id = id.to_string();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let mut record = load_record(&tx, &record_type, &id)?.ok_or_else(|| {
                StoreError::NotFound {
                    record_type: record_type.clone(),
                    id: id.clone(),
                }
            })?;

            record.fields.extend(fields);
            record.last_modified_at = at;
            save_record(&tx, &record)?;
            tx.commit()?;

            Ok(record)
        })
        .await
    }
}

fn parse_id(id: &str) -> Option<i64> {
    id.parse().ok()
}

// Helper to convert a row to Record
fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
    let id: i64 = row.get("id")?;
    let fields_json: String = row.get("fields")?;
    let fields: Attributes = serde_json::from_str(&fields_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Record {
        id: id.to_string(),
        external_id: row.get("external_id")?,
        last_modified_at: Timestamp::from_millis(row.get("updated_at")?),
        synchronized_at: row
            .get::<_, Option<i64>>("synchronized_at")?
            .map(Timestamp::from_millis),
        fields,
    })
}

fn load_record(conn: &Connection, record_type: &str, id: &str) -> Result<Option<Record>> {
    let Some(rowid) = parse_id(id) else {
        return Ok(None);
    };

    let record = conn
        .query_row(
            &format!(
                "SELECT {} FROM records WHERE record_type = ?1 AND id = ?2",
                RECORD_COLUMNS
            ),
            params![record_type, rowid],
            row_to_record,
        )
        .optional()?;

    Ok(record)
}

fn save_record(conn: &Connection, record: &Record) -> Result<()> {
    let rowid = parse_id(&record.id)
        .ok_or_else(|| StoreError::InvalidData(format!("non-numeric local id: {}", record.id)))?;

    conn.execute(
        "UPDATE records
         SET external_id = ?1, fields = ?2, updated_at = ?3, synchronized_at = ?4
         WHERE id = ?5",
        params![
            record.external_id,
            serde_json::to_string(&record.fields)?,
            record.last_modified_at.as_millis(),
            record.synchronized_at.map(|t| t.as_millis()),
            rowid,
        ],
    )?;

    Ok(())
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Local
    }

    async fn query(&self, record_type: &str, window: &QueryWindow) -> Result<Vec<Record>> {
        let record_type = record_type.to_string();
        let window = *window;

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM records
                 WHERE record_type = ?1 AND updated_at > ?2 AND updated_at <= ?3
                 ORDER BY updated_at, id",
                RECORD_COLUMNS
            ))?;

            let records = stmt
                .query_map(
                    params![
                        record_type,
                        window.since.as_millis(),
                        window.until.as_millis()
                    ],
                    row_to_record,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(records)
        })
        .await
    }

    async fn find(&self, record_type: &str, id: &str) -> Result<Option<Record>> {
        let record_type = record_type.to_string();
        let id = id.to_string();

        self.blocking(move |conn| load_record(conn, &record_type, &id))
            .await
    }

    async fn find_by_external_id(
        &self,
        record_type: &str,
        external_id: &str,
    ) -> Result<Option<Record>> {
        let record_type = record_type.to_string();
        let external_id = external_id.to_string();

        self.blocking(move |conn| {
            let record = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM records WHERE record_type = ?1 AND external_id = ?2",
                        RECORD_COLUMNS
                    ),
                    params![record_type, external_id],
                    row_to_record,
                )
                .optional()?;
            Ok(record)
        })
        .await
    }

    async fn create(&self, record_type: &str, write: RecordWrite) -> Result<Record> {
        let stamp = write_stamp(None);
        let record = Record {
            id: String::new(),
            external_id: write.external_id,
            last_modified_at: stamp,
            synchronized_at: Some(stamp),
            fields: write.attributes,
        };

        self.insert(record_type, &record).await
    }

    async fn update(&self, record_type: &str, id: &str, write: RecordWrite) -> Result<Record> {
        let record_type = record_type.to_string();
        let id = id.to_string();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let mut record = load_record(&tx, &record_type, &id)?.ok_or_else(|| {
                StoreError::NotFound {
                    record_type: record_type.clone(),
                    id: id.clone(),
                }
            })?;

            let stamp = write_stamp(Some(record.last_modified_at));
            record.fields.extend(write.attributes);
            if write.external_id.is_some() {
                record.external_id = write.external_id;
            }
            record.last_modified_at = stamp;
            record.synchronized_at = Some(stamp);

            save_record(&tx, &record)?;
            tx.commit()?;

            Ok(record)
        })
        .await
    }
}

#[async_trait]
impl Tracker for SqliteStore {
    async fn checkpoint_for(&self, mapping_id: &str) -> Result<Timestamp> {
        let mapping_id = mapping_id.to_string();

        self.blocking(move |conn| {
            let last_run: Option<i64> = conn
                .query_row(
                    "SELECT last_run FROM checkpoints WHERE mapping_id = ?1",
                    params![mapping_id],
                    |row| row.get(0),
                )
                .optional()?;

            Ok(last_run
                .map(Timestamp::from_millis)
                .unwrap_or(Timestamp::BEGINNING))
        })
        .await
    }

    async fn record_success(&self, mapping_id: &str, at: Timestamp) -> Result<Timestamp> {
        let mapping_id = mapping_id.to_string();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO checkpoints (mapping_id, last_run, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(mapping_id) DO UPDATE SET
                     last_run = MAX(last_run, excluded.last_run),
                     updated_at = excluded.updated_at",
                params![mapping_id, at.as_millis(), Timestamp::now().as_millis()],
            )?;

            let stored: i64 = tx.query_row(
                "SELECT last_run FROM checkpoints WHERE mapping_id = ?1",
                params![mapping_id],
                |row| row.get(0),
            )?;
            tx.commit()?;

            Ok(Timestamp::from_millis(stored))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::Value;

    fn account(name: &str, at: i64) -> Record {
        Record::new("", Timestamp::from_millis(at)).with_field("name", name)
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = SqliteStore::open_memory().unwrap();
        let stored = store.insert("accounts", &account("Acme", 1_000)).await.unwrap();

        let found = store.find("accounts", &stored.id).await.unwrap().unwrap();
        assert_eq!(found.get("name"), Some(&Value::from("Acme")));
        assert_eq!(found.last_modified_at, Timestamp::from_millis(1_000));
        assert_eq!(found.synchronized_at, None);

        assert!(store.find("contacts", &stored.id).await.unwrap().is_none());
        assert!(store.find("accounts", "not-a-number").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_window() {
        let store = SqliteStore::open_memory().unwrap();
        store.insert("accounts", &account("a", 100)).await.unwrap();
        store.insert("accounts", &account("b", 200)).await.unwrap();
        store.insert("accounts", &account("c", 300)).await.unwrap();
        store.insert("contacts", &account("d", 200)).await.unwrap();

        let window = QueryWindow::new(Timestamp::from_millis(100), Timestamp::from_millis(300));
        let names: Vec<_> = store
            .query("accounts", &window)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.fields["name"].clone())
            .collect();

        assert_eq!(names, vec![Value::from("b"), Value::from("c")]);
    }

    #[tokio::test]
    async fn test_create_is_marked_and_linked() {
        let store = SqliteStore::open_memory().unwrap();
        let created = store
            .create(
                "accounts",
                RecordWrite::new(Attributes::from([("name".to_string(), Value::from("Acme"))]))
                    .with_external_id("a001"),
            )
            .await
            .unwrap();

        assert_eq!(created.synchronized_at, Some(created.last_modified_at));
        let linked = store
            .find_by_external_id("accounts", "a001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(linked.id, created.id);
    }

    #[tokio::test]
    async fn test_update_merges_and_marks() {
        let store = SqliteStore::open_memory().unwrap();
        let stored = store
            .insert("accounts", &account("old", 1_000).with_field("phone", "555"))
            .await
            .unwrap();

        let updated = store
            .update(
                "accounts",
                &stored.id,
                RecordWrite::new(Attributes::from([("name".to_string(), Value::from("new"))])),
            )
            .await
            .unwrap();

        assert_eq!(updated.get("name"), Some(&Value::from("new")));
        assert_eq!(updated.get("phone"), Some(&Value::from("555")));
        assert_eq!(updated.synchronized_at, Some(updated.last_modified_at));

        let reloaded = store.find("accounts", &stored.id).await.unwrap().unwrap();
        assert_eq!(reloaded, updated);
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let store = SqliteStore::open_memory().unwrap();
        let err = store
            .update("accounts", "42", RecordWrite::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_edit_keeps_marker() {
        let store = SqliteStore::open_memory().unwrap();
        let stored = store
            .insert(
                "accounts",
                &account("a", 100).synchronized_at(Timestamp::from_millis(100)),
            )
            .await
            .unwrap();

        let edited = store
            .edit(
                "accounts",
                &stored.id,
                Attributes::from([("name".to_string(), Value::from("b"))]),
                Timestamp::from_millis(900),
            )
            .await
            .unwrap();

        assert_eq!(edited.last_modified_at, Timestamp::from_millis(900));
        assert_eq!(edited.synchronized_at, Some(Timestamp::from_millis(100)));
    }

    #[tokio::test]
    async fn test_checkpoints() {
        let store = SqliteStore::open_memory().unwrap();
        assert!(store.checkpoint_for("accounts").await.unwrap().is_beginning());

        store
            .record_success("accounts", Timestamp::from_millis(2_000))
            .await
            .unwrap();
        let stored = store
            .record_success("accounts", Timestamp::from_millis(1_000))
            .await
            .unwrap();

        assert_eq!(stored, Timestamp::from_millis(2_000));
        assert_eq!(
            store.checkpoint_for("accounts").await.unwrap(),
            Timestamp::from_millis(2_000)
        );
    }

    #[tokio::test]
    async fn test_file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.db");

        let id = {
            let store = SqliteStore::open(&path).unwrap();
            store
                .record_success("accounts", Timestamp::from_millis(7))
                .await
                .unwrap();
            store.insert("accounts", &account("a", 1)).await.unwrap().id
        };

        let store = SqliteStore::open(&path).unwrap();
        assert!(store.find("accounts", &id).await.unwrap().is_some());
        assert_eq!(
            store.checkpoint_for("accounts").await.unwrap(),
            Timestamp::from_millis(7)
        );
    }
}
