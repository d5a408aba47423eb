//! Records as reported by either store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{RecordRef, StoreKind, Timestamp};

/// Attribute values are opaque JSON values; the engine never inspects them.
pub use serde_json::Value;

/// A named collection of attribute values.
pub type Attributes = BTreeMap<String, Value>;

/// A single record read from a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// The id assigned by the store that holds the record.
    pub id: String,

    /// The remote id this record corresponds to.
    ///
    /// For remote records this is the record's own id. For local records it
    /// is the link column, `None` until the record has been pushed.
    pub external_id: Option<String>,

    /// When the record was last modified, by anyone.
    pub last_modified_at: Timestamp,

    /// When the sync engine last wrote to this record. Local records only.
    pub synchronized_at: Option<Timestamp>,

    /// Field values in the owning store's vocabulary.
    pub fields: Attributes,
}

impl Record {
    pub fn new(id: impl Into<String>, last_modified_at: Timestamp) -> Self {
        Self {
            id: id.into(),
            external_id: None,
            last_modified_at,
            synchronized_at: None,
            fields: Attributes::new(),
        }
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_fields(mut self, fields: Attributes) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn synchronized_at(mut self, at: Timestamp) -> Self {
        self.synchronized_at = Some(at);
        self
    }

    /// Look up a field value by its store-side name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// The logical identity of this record, given the store it came from.
    pub fn entity_ref(&self, kind: StoreKind) -> RecordRef {
        match kind {
            StoreKind::Remote => RecordRef::remote(self.id.clone()),
            StoreKind::Local => match &self.external_id {
                Some(external_id) => RecordRef::remote(external_id.clone()),
                None => RecordRef::local(self.id.clone()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ref_for_remote_record() {
        let record = Record::new("a001", Timestamp::from_millis(1));
        assert_eq!(record.entity_ref(StoreKind::Remote), RecordRef::remote("a001"));
    }

    #[test]
    fn test_entity_ref_for_linked_local_record() {
        let record = Record::new("12", Timestamp::from_millis(1)).with_external_id("a001");
        assert_eq!(record.entity_ref(StoreKind::Local), RecordRef::remote("a001"));
    }

    #[test]
    fn test_entity_ref_for_unlinked_local_record() {
        let record = Record::new("12", Timestamp::from_millis(1));
        assert_eq!(record.entity_ref(StoreKind::Local), RecordRef::local("12"));
    }
}
