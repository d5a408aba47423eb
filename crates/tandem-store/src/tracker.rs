//! Tracker: durable "last successful synchronization" checkpoints.
//!
//! A checkpoint is the start time of the last cycle that completed for a
//! mapping. The worker reads it to bound the next change query and records a
//! new one only after a cycle has fully applied its changes, so a crash can
//! cause records to be looked at twice but never skipped.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tandem_core::Timestamp;
use tokio::io::AsyncWriteExt;

use crate::error::{Result, StoreError};

/// Persisted state for one mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Start of the last successful cycle.
    pub last_run: Timestamp,
    /// When the checkpoint was written.
    pub updated_at: Timestamp,
}

impl Checkpoint {
    /// Move the checkpoint to `at`, never backwards.
    pub fn advance(self, at: Timestamp, now: Timestamp) -> Self {
        Self {
            last_run: self.last_run.max(at),
            updated_at: now,
        }
    }
}

/// Async interface to checkpoint persistence.
///
/// Implementations must make `record_success` durable before returning and
/// must never store a checkpoint earlier than the one already stored.
#[async_trait]
pub trait Tracker: Send + Sync {
    /// The last successful sync time, or [`Timestamp::BEGINNING`] if never run.
    async fn checkpoint_for(&self, mapping_id: &str) -> Result<Timestamp>;

    /// Persist a successful sync at `at`. Returns the stored checkpoint.
    async fn record_success(&self, mapping_id: &str, at: Timestamp) -> Result<Timestamp>;
}

#[async_trait]
impl<T: Tracker + ?Sized> Tracker for Arc<T> {
    async fn checkpoint_for(&self, mapping_id: &str) -> Result<Timestamp> {
        (**self).checkpoint_for(mapping_id).await
    }

    async fn record_success(&self, mapping_id: &str, at: Timestamp) -> Result<Timestamp> {
        (**self).record_success(mapping_id, at).await
    }
}

/// In-memory tracker for tests.
#[derive(Default)]
pub struct MemoryTracker {
    checkpoints: Mutex<BTreeMap<String, Checkpoint>>,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a checkpoint directly.
    pub fn set(&self, mapping_id: &str, at: Timestamp) {
        self.checkpoints.lock().unwrap().insert(
            mapping_id.to_string(),
            Checkpoint {
                last_run: at,
                updated_at: Timestamp::now(),
            },
        );
    }

    pub fn get(&self, mapping_id: &str) -> Option<Checkpoint> {
        self.checkpoints.lock().unwrap().get(mapping_id).copied()
    }
}

#[async_trait]
impl Tracker for MemoryTracker {
    async fn checkpoint_for(&self, mapping_id: &str) -> Result<Timestamp> {
        Ok(self
            .get(mapping_id)
            .map(|c| c.last_run)
            .unwrap_or(Timestamp::BEGINNING))
    }

    async fn record_success(&self, mapping_id: &str, at: Timestamp) -> Result<Timestamp> {
        let mut checkpoints = self.checkpoints.lock().unwrap();
        let now = Timestamp::now();
        let next = checkpoints
            .get(mapping_id)
            .map(|c| c.advance(at, now))
            .unwrap_or(Checkpoint {
                last_run: at,
                updated_at: now,
            });
        checkpoints.insert(mapping_id.to_string(), next);
        Ok(next.last_run)
    }
}

/// On-disk layout of a tracker file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct TrackerFile {
    #[serde(default)]
    checkpoints: BTreeMap<String, Checkpoint>,
}

/// Checkpoints in a flat JSON file, one entry per mapping.
///
/// Every update rewrites a sibling temp file, syncs it, and renames it over
/// the original, so readers see either the old or the new file.
pub struct FileTracker {
    path: PathBuf,
    state: tokio::sync::Mutex<BTreeMap<String, Checkpoint>>,
}

impl FileTracker {
    /// Open a tracker file, starting empty if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let checkpoints = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str::<TrackerFile>(&contents)?.checkpoints,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), mappings = checkpoints.len(), "opened tracker");

        Ok(Self {
            path,
            state: tokio::sync::Mutex::new(checkpoints),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> Result<PathBuf> {
        let mut name: OsString = self
            .path
            .file_name()
            .ok_or_else(|| {
                StoreError::InvalidData(format!(
                    "tracker path has no file name: {}",
                    self.path.display()
                ))
            })?
            .to_os_string();
        name.push(".tmp");
        Ok(self.path.with_file_name(name))
    }

    async fn persist(&self, checkpoints: &BTreeMap<String, Checkpoint>) -> Result<()> {
        let temp_path = self.temp_path()?;
        let contents = serde_json::to_string_pretty(&TrackerFile {
            checkpoints: checkpoints.clone(),
        })?;

        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Tracker for FileTracker {
    async fn checkpoint_for(&self, mapping_id: &str) -> Result<Timestamp> {
        let state = self.state.lock().await;
        Ok(state
            .get(mapping_id)
            .map(|c| c.last_run)
            .unwrap_or(Timestamp::BEGINNING))
    }

    async fn record_success(&self, mapping_id: &str, at: Timestamp) -> Result<Timestamp> {
        let mut state = self.state.lock().await;

        let now = Timestamp::now();
        let next = state
            .get(mapping_id)
            .map(|c| c.advance(at, now))
            .unwrap_or(Checkpoint {
                last_run: at,
                updated_at: now,
            });

        let mut updated = state.clone();
        updated.insert(mapping_id.to_string(), next);
        self.persist(&updated).await?;
        *state = updated;

        Ok(next.last_run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_memory_tracker_defaults_to_beginning() {
        let tracker = MemoryTracker::new();
        assert_eq!(
            tracker.checkpoint_for("accounts").await.unwrap(),
            Timestamp::BEGINNING
        );
    }

    #[tokio::test]
    async fn test_file_tracker_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".tandem");

        let tracker = FileTracker::open(&path).unwrap();
        tracker
            .record_success("accounts", Timestamp::from_millis(1_000))
            .await
            .unwrap();
        tracker
            .record_success("contacts", Timestamp::from_millis(2_000))
            .await
            .unwrap();
        drop(tracker);

        let reopened = FileTracker::open(&path).unwrap();
        assert_eq!(
            reopened.checkpoint_for("accounts").await.unwrap(),
            Timestamp::from_millis(1_000)
        );
        assert_eq!(
            reopened.checkpoint_for("contacts").await.unwrap(),
            Timestamp::from_millis(2_000)
        );
        assert!(!dir.path().join(".tandem.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_tracker_never_regresses() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = FileTracker::open(dir.path().join("tracker.json")).unwrap();

        tracker
            .record_success("accounts", Timestamp::from_millis(5_000))
            .await
            .unwrap();
        let stored = tracker
            .record_success("accounts", Timestamp::from_millis(3_000))
            .await
            .unwrap();

        assert_eq!(stored, Timestamp::from_millis(5_000));
    }

    #[tokio::test]
    async fn test_file_tracker_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            FileTracker::open(&path),
            Err(StoreError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_file_tracker_empty_file_is_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.json");
        std::fs::write(&path, "").unwrap();

        let tracker = FileTracker::open(&path).unwrap();
        assert!(tracker.checkpoint_for("x").await.unwrap().is_beginning());
    }

    proptest! {
        #[test]
        fn test_checkpoint_advance_monotonic(start in any::<i64>(), steps in prop::collection::vec(any::<i64>(), 0..16)) {
            let mut checkpoint = Checkpoint {
                last_run: Timestamp::from_millis(start),
                updated_at: Timestamp::from_millis(0),
            };
            for step in steps {
                let before = checkpoint.last_run;
                checkpoint = checkpoint.advance(Timestamp::from_millis(step), Timestamp::from_millis(0));
                prop_assert!(checkpoint.last_run >= before);
            }
        }
    }
}
