//! In-memory nearest-neighbor index over fixed-dimension embeddings.
//!
//! The index is a flat append-only structure searched exhaustively.
//! Entry counts here are bounded by inbound mail volume, so a linear
//! scan of contiguous vectors beats an approximate structure while
//! keeping `search` exactly correct for any k.

use crate::vector::types::{EntryId, VectorDimension, VectorError};

/// Append-only similarity index over fixed-dimension embeddings.
///
/// Owns the monotonic ID counter: `insert` assigns the next ID and the
/// counter is persisted with the snapshot so IDs are never reused, even
/// across restarts. Entries are immutable after insertion; there is no
/// steady-state deletion.
#[derive(Debug, Clone)]
pub struct SimilarityIndex {
    /// Dimension every stored and queried vector must match.
    dimension: VectorDimension,

    /// Committed entries in insertion (and therefore ID) order.
    entries: Vec<(EntryId, Vec<f32>)>,

    /// Next ID to assign. Starts at 1 and only moves forward.
    next_id: u32,
}

impl SimilarityIndex {
    /// Creates an empty index for the given dimension.
    #[must_use]
    pub fn new(dimension: VectorDimension) -> Self {
        Self {
            dimension,
            entries: Vec::new(),
            next_id: 1,
        }
    }

    /// Creates an empty index that continues an existing ID sequence.
    ///
    /// Used by the administrative clear operation, which empties the
    /// index but must not recycle previously assigned IDs.
    #[must_use]
    pub fn with_next_id(dimension: VectorDimension, next_id: u32) -> Self {
        Self {
            dimension,
            entries: Vec::new(),
            next_id: next_id.max(1),
        }
    }

    /// Rebuilds an index from restored snapshot parts.
    ///
    /// Validates every embedding against the dimension and every ID
    /// against the restored counter. Duplicate-ID detection is the
    /// snapshot codec's responsibility; this constructor enforces the
    /// per-entry invariants.
    pub fn from_parts(
        dimension: VectorDimension,
        next_id: u32,
        entries: Vec<(EntryId, Vec<f32>)>,
    ) -> Result<Self, VectorError> {
        for (id, embedding) in &entries {
            dimension.validate_vector(embedding)?;
            if id.get() >= next_id {
                return Err(VectorError::InvalidEntryId {
                    id: id.get(),
                    reason: "restored entry ID is not below the persisted counter",
                });
            }
        }
        Ok(Self {
            dimension,
            entries,
            next_id: next_id.max(1),
        })
    }

    /// Inserts an embedding, assigning and returning the next entry ID.
    ///
    /// O(1) amortized append. Fails on dimension mismatch or when the
    /// ID space is exhausted; the index is unchanged on failure.
    pub fn insert(&mut self, embedding: Vec<f32>) -> Result<EntryId, VectorError> {
        self.dimension.validate_vector(&embedding)?;

        let id = EntryId::new(self.next_id).ok_or(VectorError::IdExhausted)?;
        self.next_id = self.next_id.checked_add(1).ok_or(VectorError::IdExhausted)?;

        self.entries.push((id, embedding));
        Ok(id)
    }

    /// Removes the entry appended by a failed commit.
    ///
    /// Only the most recent insertion can be rolled back, and only while
    /// the caller still holds the exclusive lock that covered the
    /// insert. The ID counter is not rewound: an ID handed out is spent.
    pub(crate) fn rollback(&mut self, id: EntryId) {
        if self.entries.last().is_some_and(|(last, _)| *last == id) {
            self.entries.pop();
        }
    }

    /// Searches for the k nearest entries to the query vector.
    ///
    /// Returns `(id, squared_euclidean_distance)` pairs ascending by
    /// distance, ties broken by ascending ID so the earliest-committed
    /// entry wins deterministically. Result length is at most
    /// `min(k, len)`. An empty index yields an empty result.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(EntryId, f32)>, VectorError> {
        self.dimension.validate_vector(query)?;

        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut candidates: Vec<(EntryId, f32)> = self
            .entries
            .iter()
            .map(|(id, embedding)| (*id, squared_euclidean(query, embedding)))
            .collect();

        candidates.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        candidates.truncate(k);

        Ok(candidates)
    }

    /// Returns the number of committed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entries have been committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the index dimension.
    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    /// Returns the next ID the counter will assign.
    #[must_use]
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Returns the committed entries in insertion order, for snapshotting.
    #[must_use]
    pub fn entries(&self) -> &[(EntryId, Vec<f32>)] {
        &self.entries
    }
}

/// Squared Euclidean distance between two equal-length vectors.
fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
