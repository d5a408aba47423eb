//! Field mappings between the local and remote vocabularies.
//!
//! A [`Mapping`] pairs a local record type with a remote record type and holds
//! an ordered, one-to-one set of `(local_attribute, remote_field)` pairs.
//!
//! Conversion is strict: any attribute outside the mapping's vocabulary is
//! reported as [`CoreError::UnmappedAttribute`] rather than dropped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::record::Attributes;
use crate::types::StoreKind;

/// One local attribute and the remote field it corresponds to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldPair {
    pub local: String,
    pub remote: String,
}

impl FieldPair {
    pub fn new(local: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            remote: remote.into(),
        }
    }

    /// The name on the given side.
    pub fn name(&self, kind: StoreKind) -> &str {
        match kind {
            StoreKind::Local => &self.local,
            StoreKind::Remote => &self.remote,
        }
    }
}

/// Declared correspondence for one local/remote record-type pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    id: String,
    local_type: String,
    remote_type: String,
    pairs: Vec<FieldPair>,
}

impl Mapping {
    /// Create a mapping.
    ///
    /// `id` keys the mapping's checkpoint and must be unique per worker.
    /// Duplicate pairs resolve as in [`Mapping::add_mappings`].
    pub fn new<I, L, R>(
        id: impl Into<String>,
        local_type: impl Into<String>,
        remote_type: impl Into<String>,
        pairs: I,
    ) -> Self
    where
        I: IntoIterator<Item = (L, R)>,
        L: Into<String>,
        R: Into<String>,
    {
        let mut mapping = Self {
            id: id.into(),
            local_type: local_type.into(),
            remote_type: remote_type.into(),
            pairs: Vec::new(),
        };
        mapping.add_mappings(pairs);
        mapping
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn local_type(&self) -> &str {
        &self.local_type
    }

    pub fn remote_type(&self) -> &str {
        &self.remote_type
    }

    /// The record type name on the given side.
    pub fn record_type(&self, kind: StoreKind) -> &str {
        match kind {
            StoreKind::Local => &self.local_type,
            StoreKind::Remote => &self.remote_type,
        }
    }

    pub fn pairs(&self) -> &[FieldPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Mapped names on the given side, in declaration order.
    pub fn fields(&self, kind: StoreKind) -> Vec<&str> {
        self.pairs.iter().map(|p| p.name(kind)).collect()
    }

    pub fn local_fields(&self) -> Vec<&str> {
        self.fields(StoreKind::Local)
    }

    pub fn remote_fields(&self) -> Vec<&str> {
        self.fields(StoreKind::Remote)
    }

    /// The remote field for a local attribute.
    pub fn remote_field(&self, local: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|p| p.local == local)
            .map(|p| p.remote.as_str())
    }

    /// The local attribute for a remote field.
    pub fn local_field(&self, remote: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|p| p.remote == remote)
            .map(|p| p.local.as_str())
    }

    /// Merge additional pairs into the mapping.
    ///
    /// A pair whose local name is already mapped replaces the existing pair in
    /// place. Any other pair already using the new remote field is removed so
    /// the correspondence stays one-to-one. There is no removal operation.
    pub fn add_mappings<I, L, R>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (L, R)>,
        L: Into<String>,
        R: Into<String>,
    {
        for (local, remote) in pairs {
            let pair = FieldPair::new(local, remote);

            self.pairs
                .retain(|p| p.remote != pair.remote || p.local == pair.local);

            match self.pairs.iter_mut().find(|p| p.local == pair.local) {
                Some(existing) => existing.remote = pair.remote,
                None => self.pairs.push(pair),
            }
        }
    }

    /// Convert attributes keyed by local names for a write to `target`.
    ///
    /// For [`StoreKind::Remote`] every key is rewritten to its remote field.
    /// For [`StoreKind::Local`] local names pass through unchanged; remote
    /// field names are accepted and rewritten back to their local names, with
    /// local names taking precedence when a name appears in both vocabularies.
    /// Values are never modified.
    pub fn convert(&self, target: StoreKind, attributes: &Attributes) -> Result<Attributes> {
        attributes
            .iter()
            .map(|(name, value)| {
                let converted = match target {
                    StoreKind::Remote => self.remote_field(name),
                    StoreKind::Local => self
                        .pairs
                        .iter()
                        .find(|p| p.local == *name)
                        .map(|p| p.local.as_str())
                        .or_else(|| self.local_field(name)),
                };

                converted
                    .map(|key| (key.to_string(), value.clone()))
                    .ok_or_else(|| CoreError::UnmappedAttribute {
                        attribute: name.clone(),
                        target,
                    })
            })
            .collect()
    }

    /// Build a collection keyed by local names from a projection.
    ///
    /// `project` is called once per mapped name in the `target` store's
    /// vocabulary, in declaration order, so a caller can read a record's
    /// fields without knowing which names the mapping uses. The result is
    /// keyed and iterated by local name in sorted order; use
    /// [`Mapping::local_fields`] for declaration order.
    pub fn attributes<V, F>(&self, target: StoreKind, mut project: F) -> BTreeMap<String, V>
    where
        F: FnMut(&str) -> V,
    {
        self.pairs
            .iter()
            .map(|p| (p.local.clone(), project(p.name(target))))
            .collect()
    }
}
