//! Binary snapshot codec for the index+store pair.
//!
//! # Storage Format
//!
//! A single blob, little-endian throughout:
//! - Header (20 bytes): magic, format version, dimension, next_id,
//!   entry_count
//! - Records: `entry_count` × { id u32, embedding dimension × f32,
//!   metadata_len u32, metadata JSON }
//!
//! The header's entry_count must equal the records actually present.
//! Any mismatch — short data, trailing bytes, duplicate or out-of-range
//! IDs — is corruption: the snapshot is rejected whole rather than
//! truncated to the readable prefix, because a partial load would
//! resurrect embeddings without provenance.

use std::collections::HashSet;

use thiserror::Error;
use tracing::warn;

use crate::store::RecordStore;
use crate::types::RecordMetadata;
use crate::vector::{EntryId, SimilarityIndex, VectorDimension};

/// Magic bytes identifying a snapshot blob.
const MAGIC_BYTES: &[u8; 4] = b"MDEX";

/// Current snapshot format version.
const FORMAT_VERSION: u32 = 1;

/// Size of the snapshot header in bytes.
const HEADER_SIZE: usize = 20;

/// Errors specific to snapshot encoding and decoding.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Invalid snapshot format: {0}")]
    Corrupt(String),

    #[error("Failed to serialize snapshot metadata: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A frozen, self-contained copy of the committed state.
///
/// Captured inside the exclusive lock (cheap in-memory copy); encoding
/// and I/O happen afterward on the frozen view, off the lock. The
/// sequence is a runtime ordering token stamped under that lock, not
/// part of the wire format: once the lock is released, flushes can be
/// scheduled in any order, and the writer uses the sequence to refuse
/// persisting older state over newer.
#[derive(Debug, Clone)]
pub struct Snapshot {
    dimension: VectorDimension,
    next_id: u32,
    sequence: u64,
    rows: Vec<SnapshotRow>,
}

#[derive(Debug, Clone)]
struct SnapshotRow {
    id: EntryId,
    embedding: Vec<f32>,
    metadata: RecordMetadata,
}

impl Snapshot {
    /// Freezes the current index+store pair.
    ///
    /// Must be called under the same mutation lock used for commits so
    /// the pair is quiescent and the one-to-one pairing holds. The
    /// sequence must come from a counter advanced under that lock, so
    /// that a higher sequence always denotes a newer state.
    #[must_use]
    pub fn capture(index: &SimilarityIndex, store: &RecordStore, sequence: u64) -> Self {
        let rows = index
            .entries()
            .iter()
            .filter_map(|(id, embedding)| match store.get(*id) {
                Some(metadata) => Some(SnapshotRow {
                    id: *id,
                    embedding: embedding.clone(),
                    metadata: metadata.clone(),
                }),
                None => {
                    // Unreachable under the mutation lock; never persist
                    // an embedding without provenance
                    warn!(id = id.get(), "skipping index entry with no metadata record");
                    None
                }
            })
            .collect();

        Self {
            dimension: index.dimension(),
            next_id: index.next_id(),
            sequence,
            rows,
        }
    }

    /// Number of entries in the frozen state.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.rows.len()
    }

    /// Lock-ordered position of this state among captured snapshots.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Serializes the snapshot to its binary form.
    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        let dimension = self.dimension.get();
        let mut bytes = Vec::with_capacity(HEADER_SIZE + self.rows.len() * (8 + dimension * 4));

        bytes.extend_from_slice(MAGIC_BYTES);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(dimension as u32).to_le_bytes());
        bytes.extend_from_slice(&self.next_id.to_le_bytes());
        bytes.extend_from_slice(&(self.rows.len() as u32).to_le_bytes());

        for row in &self.rows {
            bytes.extend_from_slice(&row.id.to_bytes());
            for value in &row.embedding {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
            let metadata = serde_json::to_vec(&row.metadata)?;
            bytes.extend_from_slice(&(metadata.len() as u32).to_le_bytes());
            bytes.extend_from_slice(&metadata);
        }

        Ok(bytes)
    }

    /// Parses a snapshot blob, validating the header and every record.
    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let mut reader = Reader::new(bytes);

        let magic = reader.take(4)?;
        if magic != MAGIC_BYTES {
            return Err(SnapshotError::Corrupt("bad magic bytes".to_string()));
        }

        let version = reader.read_u32()?;
        if version != FORMAT_VERSION {
            return Err(SnapshotError::Corrupt(format!(
                "unsupported format version {version}, expected {FORMAT_VERSION}"
            )));
        }

        let dimension = VectorDimension::new(reader.read_u32()? as usize)
            .map_err(|e| SnapshotError::Corrupt(e.to_string()))?;
        let next_id = reader.read_u32()?;
        let entry_count = reader.read_u32()? as usize;

        let mut seen = HashSet::with_capacity(entry_count);
        let mut rows = Vec::with_capacity(entry_count);

        for ordinal in 0..entry_count {
            let id = EntryId::from_bytes(
                reader
                    .take(4)?
                    .try_into()
                    .expect("take(4) yields exactly 4 bytes"),
            )
            .ok_or_else(|| SnapshotError::Corrupt(format!("record {ordinal} has zero ID")))?;

            if id.get() >= next_id {
                return Err(SnapshotError::Corrupt(format!(
                    "record ID {id} is not below the persisted counter {next_id}"
                )));
            }
            if !seen.insert(id) {
                return Err(SnapshotError::Corrupt(format!("duplicate record ID {id}")));
            }

            let mut embedding = Vec::with_capacity(dimension.get());
            for _ in 0..dimension.get() {
                embedding.push(reader.read_f32()?);
            }

            let metadata_len = reader.read_u32()? as usize;
            let metadata: RecordMetadata = serde_json::from_slice(reader.take(metadata_len)?)
                .map_err(|e| {
                    SnapshotError::Corrupt(format!("record {id} metadata is not valid JSON: {e}"))
                })?;

            rows.push(SnapshotRow {
                id,
                embedding,
                metadata,
            });
        }

        if reader.remaining() != 0 {
            return Err(SnapshotError::Corrupt(format!(
                "{} trailing bytes after {entry_count} records",
                reader.remaining()
            )));
        }

        Ok(Self {
            dimension,
            next_id,
            // Restored snapshots are never re-flushed; any live capture
            // outranks them
            sequence: 0,
            rows,
        })
    }

    /// Rebuilds the live index+store pair from the frozen state.
    ///
    /// The restored pair must satisfy the one-to-one pairing invariant;
    /// anything else is corruption, not a partial load.
    pub fn into_state(self) -> Result<(SimilarityIndex, RecordStore), SnapshotError> {
        let entries = self
            .rows
            .iter()
            .map(|row| (row.id, row.embedding.clone()))
            .collect();

        let index = SimilarityIndex::from_parts(self.dimension, self.next_id, entries)
            .map_err(|e| SnapshotError::Corrupt(e.to_string()))?;

        let mut store = RecordStore::new();
        for row in self.rows {
            store
                .put(row.id, row.metadata)
                .map_err(|e| SnapshotError::Corrupt(e.to_string()))?;
        }

        if index.len() != store.len() {
            return Err(SnapshotError::Corrupt(format!(
                "index has {} entries but store has {} records",
                index.len(),
                store.len()
            )));
        }

        Ok((index, store))
    }

    /// Dimension recorded in the snapshot header.
    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }
}

/// Bounds-checked cursor over the snapshot blob.
struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], SnapshotError> {
        let end = self.offset.checked_add(len).ok_or_else(|| {
            SnapshotError::Corrupt("record length overflows the blob".to_string())
        })?;
        if end > self.bytes.len() {
            return Err(SnapshotError::Corrupt(format!(
                "blob truncated: needed {len} bytes at offset {}, {} available",
                self.offset,
                self.bytes.len() - self.offset
            )));
        }
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32, SnapshotError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes(
            bytes.try_into().expect("take(4) yields exactly 4 bytes"),
        ))
    }

    fn read_f32(&mut self) -> Result<f32, SnapshotError> {
        let bytes = self.take(4)?;
        Ok(f32::from_le_bytes(
            bytes.try_into().expect("take(4) yields exactly 4 bytes"),
        ))
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }
}
