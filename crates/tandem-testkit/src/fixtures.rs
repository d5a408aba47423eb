//! Test fixtures and helpers.
//!
//! Common setup code for unit and integration tests.

use std::sync::Arc;

use tandem_core::{Mapping, Record, Timestamp};
use tandem_store::{MemoryStore, MemoryTracker};

/// Id of the sample mapping.
pub const MAPPING_ID: &str = "custom_objects";
/// Local record type of the sample mapping.
pub const LOCAL_TYPE: &str = "custom_objects";
/// Remote record type of the sample mapping.
pub const REMOTE_TYPE: &str = "CustomObject__c";

/// The sample mapping: `name <-> Name`, `example <-> Example_Field__c`.
pub fn sample_mapping() -> Mapping {
    Mapping::new(
        MAPPING_ID,
        LOCAL_TYPE,
        REMOTE_TYPE,
        [("name", "Name"), ("example", "Example_Field__c")],
    )
}

/// A never-synchronized remote record of the sample type.
pub fn remote_record(id: &str, modified_ms: i64, name: &str, example: &str) -> Record {
    Record::new(id, Timestamp::from_millis(modified_ms))
        .with_field("Name", name)
        .with_field("Example_Field__c", example)
}

/// A never-synchronized, unlinked local record of the sample type.
///
/// Pass an empty id to have the store generate one.
pub fn local_record(id: &str, modified_ms: i64, name: &str, example: &str) -> Record {
    Record::new(id, Timestamp::from_millis(modified_ms))
        .with_field("name", name)
        .with_field("example", example)
}

/// Two memory stores, a tracker, and the sample mapping.
pub struct TestFixture {
    pub remote: Arc<MemoryStore>,
    pub local: Arc<MemoryStore>,
    pub tracker: Arc<MemoryTracker>,
    pub mapping: Mapping,
}

impl TestFixture {
    pub fn new() -> Self {
        Self {
            remote: Arc::new(MemoryStore::remote()),
            local: Arc::new(MemoryStore::local()),
            tracker: Arc::new(MemoryTracker::new()),
            mapping: sample_mapping(),
        }
    }

    /// Insert into the remote store as an external actor.
    pub fn seed_remote(&self, record: Record) -> Record {
        self.remote.insert(REMOTE_TYPE, record)
    }

    /// Insert into the local store as an external actor.
    pub fn seed_local(&self, record: Record) -> Record {
        self.local.insert(LOCAL_TYPE, record)
    }

    pub fn remote_get(&self, id: &str) -> Option<Record> {
        self.remote.get(REMOTE_TYPE, id)
    }

    pub fn local_get(&self, id: &str) -> Option<Record> {
        self.local.get(LOCAL_TYPE, id)
    }

    /// The local record linked to `external_id`, if any.
    pub fn local_linked_to(&self, external_id: &str) -> Option<Record> {
        self.local
            .records(LOCAL_TYPE)
            .into_iter()
            .find(|r| r.external_id.as_deref() == Some(external_id))
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::Value;

    #[test]
    fn test_seeded_records_use_store_vocabulary() {
        let fixture = TestFixture::new();
        let remote = fixture.seed_remote(remote_record("a001", 10, "Acme", "x"));
        let local = fixture.seed_local(local_record("", 10, "Acme", "x").with_external_id("a001"));

        assert_eq!(remote.get("Name"), Some(&Value::from("Acme")));
        assert_eq!(remote.external_id.as_deref(), Some("a001"));
        assert_eq!(local.get("name"), Some(&Value::from("Acme")));
        assert!(!local.id.is_empty());
        assert_eq!(fixture.local_linked_to("a001").unwrap().id, local.id);
    }
}
