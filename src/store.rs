//! Append-only store of committed email metadata.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::types::RecordMetadata;
use crate::vector::EntryId;

/// Errors specific to record store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Entry {0} is already present; committed records are never overwritten")]
    DuplicateEntry(EntryId),
}

/// Ordered mapping from entry ID to committed metadata.
///
/// One-to-one with the similarity index by ID. Append-only: `put` on an
/// existing ID fails, and nothing removes individual entries. Because
/// IDs come from a monotonic counter, ID order equals insertion order.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: BTreeMap<EntryId, RecordMetadata>,
}

impl RecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Commits metadata under a fresh ID.
    ///
    /// Fails if the ID is already present.
    pub fn put(&mut self, id: EntryId, metadata: RecordMetadata) -> Result<(), StoreError> {
        if self.records.contains_key(&id) {
            return Err(StoreError::DuplicateEntry(id));
        }
        self.records.insert(id, metadata);
        Ok(())
    }

    /// Looks up committed metadata. Absence is not an error.
    #[must_use]
    pub fn get(&self, id: EntryId) -> Option<&RecordMetadata> {
        self.records.get(&id)
    }

    /// Iterates `(id, metadata)` in insertion order. Restartable and finite.
    pub fn iter(&self) -> impl Iterator<Item = (EntryId, &RecordMetadata)> {
        self.records.iter().map(|(id, metadata)| (*id, metadata))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
