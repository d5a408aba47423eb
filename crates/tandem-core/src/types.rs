//! Strong type definitions for Tandem.
//!
//! Identifiers and timestamps are newtypes so a remote id can never be passed
//! where a local id is expected, and millisecond values are never confused
//! with seconds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Which of the two record stores a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// The local relational database.
    Local,
    /// The CRM-hosted object store.
    Remote,
}

impl StoreKind {
    /// The opposite store.
    pub const fn other(self) -> Self {
        match self {
            StoreKind::Local => StoreKind::Remote,
            StoreKind::Remote => StoreKind::Local,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            StoreKind::Local => "local",
            StoreKind::Remote => "remote",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point in time as Unix milliseconds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Sentinel for "never synchronized". Earlier than every real timestamp.
    pub const BEGINNING: Self = Self(i64::MIN);

    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Self(millis)
    }

    /// Subtract a duration, clamping at [`Timestamp::BEGINNING`].
    pub fn saturating_sub(self, duration: Duration) -> Self {
        let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        Self(self.0.saturating_sub(millis))
    }

    /// Add a duration, clamping at `i64::MAX`.
    pub fn saturating_add(self, duration: Duration) -> Self {
        let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        Self(self.0.saturating_add(millis))
    }

    pub fn is_beginning(&self) -> bool {
        *self == Self::BEGINNING
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_beginning() {
            f.write_str("Timestamp(BEGINNING)")
        } else {
            write!(f, "Timestamp({})", self.0)
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_beginning() {
            f.write_str("beginning")
        } else {
            write!(f, "{}ms", self.0)
        }
    }
}

impl From<i64> for Timestamp {
    fn from(millis: i64) -> Self {
        Self(millis)
    }
}

/// Identity of a logical record: an id plus the store that issued it.
///
/// A record that is known to the remote store is always referenced by its
/// remote id with [`StoreKind::Remote`], whichever side it was observed on.
/// A local record that has not yet been linked to a remote record is
/// referenced by its local id with [`StoreKind::Local`].
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    pub id: String,
    pub kind: StoreKind,
}

impl RecordRef {
    pub fn new(id: impl Into<String>, kind: StoreKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    pub fn remote(id: impl Into<String>) -> Self {
        Self::new(id, StoreKind::Remote)
    }

    pub fn local(id: impl Into<String>) -> Self {
        Self::new(id, StoreKind::Local)
    }

    /// Whether the id is a remote (external) identifier.
    pub fn is_linked(&self) -> bool {
        self.kind == StoreKind::Remote
    }
}

impl fmt::Debug for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordRef({}:{})", self.kind, self.id)
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_kind_other() {
        assert_eq!(StoreKind::Local.other(), StoreKind::Remote);
        assert_eq!(StoreKind::Remote.other(), StoreKind::Local);
    }

    #[test]
    fn test_timestamp_saturating_sub_clamps() {
        let t = Timestamp::BEGINNING.saturating_sub(Duration::from_secs(5));
        assert!(t.is_beginning());

        let t = Timestamp::from_millis(10_000).saturating_sub(Duration::from_millis(2_500));
        assert_eq!(t, Timestamp::from_millis(7_500));
    }

    #[test]
    fn test_beginning_precedes_everything() {
        assert!(Timestamp::BEGINNING < Timestamp::from_millis(i64::MIN + 1));
        assert!(Timestamp::BEGINNING < Timestamp::now());
    }

    #[test]
    fn test_record_ref_display() {
        let r = RecordRef::remote("a001");
        assert_eq!(r.to_string(), "remote:a001");
        assert!(r.is_linked());
        assert!(!RecordRef::local("7").is_linked());
    }

    #[test]
    fn test_store_kind_serde() {
        let json = serde_json::to_string(&StoreKind::Remote).unwrap();
        assert_eq!(json, "\"remote\"");
    }
}
