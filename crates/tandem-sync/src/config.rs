//! Worker configuration.
//!
//! A [`WorkerConfig`] is built and validated once at startup and is read-only
//! afterwards. It can be loaded from a JSON file:
//!
//! ```json
//! {
//!   "delay": 1.5,
//!   "interval": 10,
//!   "tracker_path": "config/.tandem",
//!   "tie_break": "prefer_remote"
//! }
//! ```
//!
//! Every key is optional. Keys this module does not know about (store
//! credentials, for instance) are ignored so the same file can be shared
//! with the store clients.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tandem_core::{AttributeSnapshot, StoreKind, Timestamp};
use tandem_store::QueryWindow;

use crate::error::ConfigError;

pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_TRACKER_PATH: &str = ".tandem";

/// Which side wins when both sides changed at exactly the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    #[default]
    PreferRemote,
    PreferLocal,
}

impl TieBreak {
    pub fn preferred(&self) -> StoreKind {
        match self {
            TieBreak::PreferRemote => StoreKind::Remote,
            TieBreak::PreferLocal => StoreKind::Local,
        }
    }

    /// The snapshot to apply: latest timestamp, preferred side on a tie.
    pub fn pick<'a>(&self, snapshots: &'a [AttributeSnapshot]) -> Option<&'a AttributeSnapshot> {
        let preferred = self.preferred();
        snapshots
            .iter()
            .max_by_key(|s| (s.timestamp, s.kind == preferred))
    }
}

/// Validated, immutable worker settings.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    delay: Duration,
    interval: Duration,
    tracker_path: PathBuf,
    tie_break: TieBreak,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_DELAY,
            interval: DEFAULT_INTERVAL,
            tracker_path: PathBuf::from(DEFAULT_TRACKER_PATH),
            tie_break: TieBreak::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    delay: Option<f64>,
    interval: Option<u64>,
    tracker_path: Option<PathBuf>,
    tie_break: Option<TieBreak>,
}

impl WorkerConfig {
    pub fn new(
        delay: Duration,
        interval: Duration,
        tracker_path: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            delay,
            interval,
            tracker_path: tracker_path.into(),
            tie_break: TieBreak::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_tracker_path(mut self, tracker_path: impl Into<PathBuf>) -> Self {
        self.tracker_path = tracker_path.into();
        self
    }

    /// Load from a JSON file, falling back to defaults for missing keys.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_json::from_str(json)?;
        let defaults = Self::default();

        let delay = match file.delay {
            Some(secs) => {
                Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidDelay(secs))?
            }
            None => defaults.delay,
        };

        let config = Self {
            delay,
            interval: file
                .interval
                .map(Duration::from_secs)
                .unwrap_or(defaults.interval),
            tracker_path: file.tracker_path.unwrap_or(defaults.tracker_path),
            tie_break: file.tie_break.unwrap_or(defaults.tie_break),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::InvalidInterval);
        }
        Ok(())
    }

    /// Subtracted from both ends of every change query window.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Time between cycle starts.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn tracker_path(&self) -> &Path {
        &self.tracker_path
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    /// Change query window for a cycle started at `started_at`.
    ///
    /// Both bounds lag by `delay` so that records still replicating inside
    /// the store are picked up by a later cycle instead of being skipped.
    pub fn window(&self, checkpoint: Timestamp, started_at: Timestamp) -> QueryWindow {
        QueryWindow::new(
            checkpoint.saturating_sub(self.delay),
            started_at.saturating_sub(self.delay),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::Attributes;

    fn snap(kind: StoreKind, at: i64) -> AttributeSnapshot {
        AttributeSnapshot {
            kind,
            record_id: "1".into(),
            timestamp: Timestamp::from_millis(at),
            attributes: Attributes::new(),
        }
    }

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.delay(), Duration::from_secs(1));
        assert_eq!(config.interval(), Duration::from_secs(5));
        assert_eq!(config.tie_break(), TieBreak::PreferRemote);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_with_extra_keys() {
        let config = WorkerConfig::from_json(
            r#"{"delay": 0.5, "interval": 30, "tracker_path": "/tmp/t", "client_id": "x"}"#,
        )
        .unwrap();

        assert_eq!(config.delay(), Duration::from_millis(500));
        assert_eq!(config.interval(), Duration::from_secs(30));
        assert_eq!(config.tracker_path(), Path::new("/tmp/t"));
    }

    #[test]
    fn test_from_json_empty_uses_defaults() {
        assert_eq!(WorkerConfig::from_json("{}").unwrap(), WorkerConfig::default());
    }

    #[test]
    fn test_rejects_negative_delay() {
        assert!(matches!(
            WorkerConfig::from_json(r#"{"delay": -1}"#),
            Err(ConfigError::InvalidDelay(_))
        ));
    }

    #[test]
    fn test_rejects_zero_interval() {
        assert!(matches!(
            WorkerConfig::from_json(r#"{"interval": 0}"#),
            Err(ConfigError::InvalidInterval)
        ));
        assert!(WorkerConfig::new(Duration::ZERO, Duration::ZERO, ".t").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tandem.json");
        std::fs::write(&path, r#"{"tie_break": "prefer_local"}"#).unwrap();

        let config = WorkerConfig::from_file(&path).unwrap();
        assert_eq!(config.tie_break(), TieBreak::PreferLocal);

        assert!(matches!(
            WorkerConfig::from_file(dir.path().join("missing.json")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_window_lags_by_delay() {
        let config = WorkerConfig::new(Duration::from_secs(2), Duration::from_secs(5), ".t").unwrap();
        let window = config.window(Timestamp::from_millis(10_000), Timestamp::from_millis(15_000));

        assert_eq!(window.since, Timestamp::from_millis(8_000));
        assert_eq!(window.until, Timestamp::from_millis(13_000));

        let first = config.window(Timestamp::BEGINNING, Timestamp::from_millis(15_000));
        assert!(first.since.is_beginning());
    }

    #[test]
    fn test_pick_latest() {
        let snaps = [snap(StoreKind::Remote, 10), snap(StoreKind::Local, 20)];
        assert_eq!(TieBreak::PreferRemote.pick(&snaps).unwrap().kind, StoreKind::Local);
    }

    #[test]
    fn test_pick_tie() {
        let snaps = [snap(StoreKind::Local, 10), snap(StoreKind::Remote, 10)];
        assert_eq!(TieBreak::PreferRemote.pick(&snaps).unwrap().kind, StoreKind::Remote);
        assert_eq!(TieBreak::PreferLocal.pick(&snaps).unwrap().kind, StoreKind::Local);
        assert!(TieBreak::PreferLocal.pick(&[]).is_none());
    }
}
