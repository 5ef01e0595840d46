//! Error types for the duplicate-detection engine
//!
//! This module provides structured error types using thiserror for better
//! error handling and actionable error messages.

use thiserror::Error;

use crate::store::StoreError;
use crate::vector::VectorError;

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum DedupError {
    /// The embedding provider failed; the request was aborted before any
    /// state was touched.
    #[error("Embedding provider failed: {reason}")]
    EmbeddingFailure { reason: String },

    /// The classifier failed after the duplicate re-check but before
    /// commit; index and store are exactly as before the request.
    #[error("Classification failed: {reason}")]
    ClassificationFailure { reason: String },

    /// A loaded snapshot violates its own header or the index/store
    /// pairing invariant. The caller discards it and starts empty.
    #[error("Snapshot is corrupted: {reason}")]
    IndexCorruption { reason: String },

    /// Writing the snapshot failed. The in-memory state remains
    /// authoritative; surfaced as a warning, never a request failure.
    #[error("Failed to persist snapshot: {reason}")]
    PersistenceFailure { reason: String },

    /// Threshold, dimension, or another knob is out of range. Fails fast
    /// at startup, never at request time.
    #[error("Invalid configuration: {reason}")]
    ConfigurationError { reason: String },

    /// Similarity index errors
    #[error("Vector operation failed: {0}")]
    Vector(#[from] VectorError),

    /// Record store errors
    #[error("Record store operation failed: {0}")]
    Store(#[from] StoreError),
}

impl DedupError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::EmbeddingFailure { .. } => "EMBEDDING_FAILURE",
            Self::ClassificationFailure { .. } => "CLASSIFICATION_FAILURE",
            Self::IndexCorruption { .. } => "INDEX_CORRUPTION",
            Self::PersistenceFailure { .. } => "PERSISTENCE_FAILURE",
            Self::ConfigurationError { .. } => "CONFIG_ERROR",
            Self::Vector(_) => "VECTOR_ERROR",
            Self::Store(_) => "STORE_ERROR",
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::EmbeddingFailure { .. } => vec![
                "Check that the embedding model is initialized and reachable",
                "Retry the request; no state was modified",
            ],
            Self::ClassificationFailure { .. } => vec![
                "Check the classifier backend",
                "Retry the request; the commit was rolled back cleanly",
            ],
            Self::IndexCorruption { .. } => vec![
                "The snapshot was discarded and the engine started empty",
                "Re-ingest mail or restore the snapshot file from backup",
            ],
            Self::PersistenceFailure { .. } => vec![
                "Check disk space and permissions for the snapshot path",
                "The in-memory index is intact; the write is retried on the next flush",
            ],
            Self::ConfigurationError { .. } => vec![
                "Fix the offending value in settings.toml or the MAILDEX_ environment overrides",
            ],
            _ => vec![],
        }
    }
}

/// Result type alias for engine operations
pub type DedupResult<T> = Result<T, DedupError>;
