//! Similarity index over semantic embeddings.
//!
//! This module provides the nearest-neighbor structure at the heart of
//! duplicate detection: an append-only, exhaustively-searched index of
//! fixed-dimension vectors with a monotonic ID counter.
//!
//! # Architecture
//! The index is deliberately flat. Inbound-mail volumes keep entry counts
//! far below the point where an approximate structure pays for itself,
//! and a flat scan guarantees the true k nearest by the configured metric
//! (squared Euclidean distance over raw embeddings).

mod index;
mod types;

// Re-export core types for public API
pub use index::SimilarityIndex;
pub use types::{
    EMBEDDING_DIMENSION_384, EntryId, Similarity, VectorDimension, VectorError,
};
