//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::json;

use tandem_core::{Attributes, Mapping, Record, StoreKind, Timestamp, Value};

/// Generate a local attribute name.
pub fn local_name() -> impl Strategy<Value = String> {
    "[a-z][a-z_]{0,11}"
}

/// Generate a StoreKind.
pub fn store_kind() -> impl Strategy<Value = StoreKind> {
    prop_oneof![Just(StoreKind::Local), Just(StoreKind::Remote)]
}

/// Generate a reasonable timestamp.
pub fn timestamp() -> impl Strategy<Value = Timestamp> {
    (0i64..=i64::MAX / 2).prop_map(Timestamp::from_millis)
}

/// Generate an attribute value.
pub fn value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[ -~]{0,16}".prop_map(Value::from),
        (any::<i32>(), "[a-z]{0,8}").prop_map(|(n, s)| json!({ "n": n, "s": s })),
    ]
}

/// Generate one-to-one (local, remote) pairs.
///
/// Remote names are derived from local names (`first_name` becomes
/// `FIRST_NAME__c`), so both sides are unique.
pub fn field_pairs() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::btree_set(local_name(), 1..8).prop_map(|names| {
        names
            .into_iter()
            .map(|local| {
                let remote = format!("{}__c", local.to_ascii_uppercase());
                (local, remote)
            })
            .collect()
    })
}

/// Generate a mapping over [`field_pairs`].
pub fn mapping() -> impl Strategy<Value = Mapping> {
    field_pairs().prop_map(|pairs| Mapping::new("generated", "generated", "Generated__c", pairs))
}

/// Generate attributes keyed by a subset of `pairs`' local names.
pub fn attributes_for(
    pairs: Vec<(String, String)>,
) -> impl Strategy<Value = (Vec<(String, String)>, Attributes)> {
    let names: Vec<String> = pairs.iter().map(|(local, _)| local.clone()).collect();
    let len = names.len();
    (
        Just(pairs),
        prop::sample::subsequence(names, 0..=len),
        prop::collection::vec(value(), len),
    )
        .prop_map(|(pairs, names, values)| {
            let attributes = names.into_iter().zip(values).collect();
            (pairs, attributes)
        })
}

/// Generate a record of `mapping` in the given store's vocabulary.
///
/// Every mapped field is present. The sync marker is either absent or at an
/// arbitrary time relative to the modification.
pub fn record_for(mapping: &Mapping, kind: StoreKind) -> impl Strategy<Value = Record> {
    let fields: Vec<String> = mapping.fields(kind).into_iter().map(str::to_string).collect();
    let len = fields.len();
    (
        "[a-z0-9]{1,12}",
        timestamp(),
        prop::option::of(timestamp()),
        prop::collection::vec(value(), len),
    )
        .prop_map(move |(id, modified, marker, values)| {
            let mut record = Record::new(id, modified)
                .with_fields(fields.iter().cloned().zip(values).collect());
            record.synchronized_at = marker;
            record
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_field_pairs_are_one_to_one(pairs in field_pairs()) {
            let mapping = Mapping::new("m", "l", "R", pairs.clone());
            prop_assert_eq!(mapping.len(), pairs.len());
        }

        #[test]
        fn test_attributes_use_mapped_names((pairs, attributes) in field_pairs().prop_flat_map(attributes_for)) {
            let mapping = Mapping::new("m", "l", "R", pairs);
            for name in attributes.keys() {
                prop_assert!(mapping.remote_field(name).is_some());
            }
        }

        #[test]
        fn test_record_uses_store_vocabulary(
            (mapping, kind, record) in (mapping(), store_kind()).prop_flat_map(|(mapping, kind)| {
                let record = record_for(&mapping, kind);
                (Just(mapping), Just(kind), record)
            })
        ) {
            prop_assert_eq!(record.fields.len(), mapping.len());
            for name in mapping.fields(kind) {
                prop_assert!(record.get(name).is_some());
            }
        }

        #[test]
        fn test_record_carries_every_field(record in record_for(&crate::fixtures::sample_mapping(), StoreKind::Remote)) {
            prop_assert!(record.get("Name").is_some());
            prop_assert!(record.get("Example_Field__c").is_some());
        }
    }
}
