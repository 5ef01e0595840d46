//! Type-safe wrappers and core types for the similarity index.
//!
//! This module provides newtypes and error types following the project's
//! strict type safety guidelines. All types implement necessary traits
//! for ergonomic usage while preventing primitive obsession.

use std::num::NonZeroU32;
use thiserror::Error;

/// Standard embedding dimension (all-MiniLM-L6-v2 model).
pub const EMBEDDING_DIMENSION_384: usize = 384;

/// Type-safe wrapper for committed entry IDs.
///
/// Uses `NonZeroU32` internally for space optimization and to ensure
/// entry IDs are never zero (which could indicate uninitialized state).
/// IDs are assigned by a single monotonic counter and never reused,
/// even across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(NonZeroU32);

impl EntryId {
    /// Creates a new `EntryId` from a non-zero u32.
    ///
    /// Returns `None` if the provided ID is zero.
    #[must_use]
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(Self)
    }

    /// Creates a new `EntryId` from a non-zero u32, panicking if zero.
    ///
    /// # Panics
    /// Panics if `id` is zero. Use `new()` for fallible construction.
    #[must_use]
    pub fn new_unchecked(id: u32) -> Self {
        Self(NonZeroU32::new(id).expect("EntryId cannot be zero"))
    }

    /// Returns the underlying u32 value.
    #[must_use]
    pub fn get(&self) -> u32 {
        self.0.get()
    }

    /// Converts to little-endian bytes for snapshot storage.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 4] {
        self.0.get().to_le_bytes()
    }

    /// Creates from little-endian bytes.
    ///
    /// Returns `None` if the bytes represent zero.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 4]) -> Option<Self> {
        let id = u32::from_le_bytes(bytes);
        Self::new(id)
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.get())
    }
}

/// Type-safe wrapper for similarity scores.
///
/// Scores are normalized to the range [0.0, 1.0] where:
/// - 1.0 indicates identical content
/// - 0.0 indicates unrelated content
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity(f32);

impl Similarity {
    /// Creates a new `Similarity` with validation.
    ///
    /// Returns an error if the value is not in the range [0.0, 1.0] or is NaN.
    pub fn new(value: f32) -> Result<Self, VectorError> {
        if value.is_nan() {
            return Err(VectorError::InvalidScore {
                value,
                reason: "Similarity cannot be NaN",
            });
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(VectorError::InvalidScore {
                value,
                reason: "Similarity must be in range [0.0, 1.0]",
            });
        }
        Ok(Self(value))
    }

    /// Creates a similarity of 0.0 (unrelated).
    #[must_use]
    pub const fn zero() -> Self {
        Self(0.0)
    }

    /// Creates a similarity of 1.0 (identical).
    #[must_use]
    pub const fn one() -> Self {
        Self(1.0)
    }

    /// Returns the underlying f32 value.
    #[must_use]
    pub fn get(&self) -> f32 {
        self.0
    }

    /// Converts a raw squared-Euclidean distance into a similarity score.
    ///
    /// Applies `1 - min(distance / normalizer, 1)`. The normalizer is a
    /// deployment constant calibrated against the embedding space (see
    /// `DetectionConfig::distance_normalizer`), never derived per-query.
    pub fn from_distance(distance: f32, normalizer: f32) -> Result<Self, VectorError> {
        if !(normalizer.is_finite() && normalizer > 0.0) {
            return Err(VectorError::InvalidNormalizer { value: normalizer });
        }
        Self::new(1.0 - (distance / normalizer).min(1.0))
    }
}

impl Eq for Similarity {}

impl PartialOrd for Similarity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Similarity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .partial_cmp(&other.0)
            .expect("Similarity values should never be NaN")
    }
}

/// Type-safe wrapper for embedding dimensions.
///
/// The dimension is fixed at index-creation time. Every vector entering
/// the index or a search is validated against it; a mismatch is a hard
/// error, never silently padded or truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension` with validation.
    ///
    /// Returns an error if the dimension is zero.
    pub fn new(dim: usize) -> Result<Self, VectorError> {
        if dim == 0 {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "Vector dimension cannot be zero",
            });
        }
        Ok(Self(dim))
    }

    /// Creates a standard 384-dimensional vector dimension.
    #[must_use]
    pub const fn dimension_384() -> Self {
        Self(EMBEDDING_DIMENSION_384)
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has the expected dimension.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.0 {
            return Err(VectorError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

/// Errors that can occur during similarity index operations.
///
/// All error messages include actionable suggestions for resolution.
#[derive(Error, Debug)]
pub enum VectorError {
    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure all vectors use the same embedding model"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector dimension: {dimension}\nReason: {reason}")]
    InvalidDimension {
        dimension: usize,
        reason: &'static str,
    },

    #[error("Invalid similarity value: {value}\nReason: {reason}")]
    InvalidScore { value: f32, reason: &'static str },

    #[error(
        "Invalid distance normalizer: {value}\nSuggestion: Set detection.distance_normalizer to a finite value above zero"
    )]
    InvalidNormalizer { value: f32 },

    #[error(
        "Entry ID space exhausted\nSuggestion: The index has assigned the maximum number of IDs; archive and clear the index"
    )]
    IdExhausted,

    #[error("Invalid entry ID {id}: {reason}")]
    InvalidEntryId { id: u32, reason: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_id_construction() {
        let id = EntryId::new(42).unwrap();
        assert_eq!(id.get(), 42);

        assert!(EntryId::new(0).is_none());

        let id = EntryId::new_unchecked(100);
        assert_eq!(id.get(), 100);
    }

    #[test]
    #[should_panic(expected = "EntryId cannot be zero")]
    fn test_entry_id_unchecked_panic() {
        let _ = EntryId::new_unchecked(0);
    }

    #[test]
    fn test_entry_id_serialization() {
        let id = EntryId::new(12345).unwrap();
        let bytes = id.to_bytes();
        let deserialized = EntryId::from_bytes(bytes).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_entry_id_ordering() {
        let earlier = EntryId::new(3).unwrap();
        let later = EntryId::new(7).unwrap();
        assert!(earlier < later);
    }

    #[test]
    fn test_similarity_validation() {
        let sim = Similarity::new(0.5).unwrap();
        assert_eq!(sim.get(), 0.5);

        assert_eq!(Similarity::zero().get(), 0.0);
        assert_eq!(Similarity::one().get(), 1.0);

        assert!(Similarity::new(-0.1).is_err());
        assert!(Similarity::new(1.1).is_err());
        assert!(Similarity::new(f32::NAN).is_err());
    }

    #[test]
    fn test_similarity_from_distance() {
        // Zero distance is identical content
        let sim = Similarity::from_distance(0.0, 2.0).unwrap();
        assert_eq!(sim.get(), 1.0);

        // Distance at the normalizer maps to zero
        let sim = Similarity::from_distance(2.0, 2.0).unwrap();
        assert_eq!(sim.get(), 0.0);

        // Distances beyond the normalizer clamp to zero
        let sim = Similarity::from_distance(10.0, 2.0).unwrap();
        assert_eq!(sim.get(), 0.0);

        // Midpoint
        let sim = Similarity::from_distance(1.0, 2.0).unwrap();
        assert_eq!(sim.get(), 0.5);

        // Invalid normalizers are rejected
        assert!(Similarity::from_distance(1.0, 0.0).is_err());
        assert!(Similarity::from_distance(1.0, -1.0).is_err());
        assert!(Similarity::from_distance(1.0, f32::NAN).is_err());
    }

    #[test]
    fn test_vector_dimension() {
        let dim = VectorDimension::new(384).unwrap();
        assert_eq!(dim.get(), 384);

        let standard = VectorDimension::dimension_384();
        assert_eq!(standard.get(), 384);

        assert!(VectorDimension::new(0).is_err());

        let vec = vec![0.1; 384];
        assert!(dim.validate_vector(&vec).is_ok());

        let wrong_vec = vec![0.1; 100];
        assert!(dim.validate_vector(&wrong_vec).is_err());
    }
}
