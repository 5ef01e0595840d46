//! Duplicate-detection and classification-commit engine for inbound email.
//!
//! An email arrives, gets embedded, and is checked against a similarity
//! index of everything seen before. Near-duplicates resolve to the
//! original entry; novel mail is classified and committed exactly once,
//! even under concurrent submissions of the same content, and the
//! committed state survives restarts through an atomic snapshot.

pub mod classify;
pub mod config;
pub mod detector;
pub mod embedding;
pub mod error;
pub mod persist;
pub mod service;
pub mod store;
pub mod types;
pub mod vector;

// Explicit exports for better API clarity
pub use classify::{Classifier, ClassifyError, KeywordClassifier, REQUEST_TYPES};
pub use config::{DetectionConfig, EmbeddingConfig, FlushMode, PersistenceConfig, Settings};
pub use detector::DuplicateDetector;
pub use embedding::{EmbeddingError, EmbeddingProvider, FastEmbedProvider, HashEmbeddingProvider};
pub use error::{DedupError, DedupResult};
pub use persist::{FileBackend, PersistenceBackend, PersistenceManager, Snapshot, SnapshotError};
pub use service::DedupService;
pub use store::{RecordStore, StoreError};
pub use types::{
    Classification, EmailContent, IndexStats, ProcessOutcome, RecordMetadata, SimilarMatch,
};
pub use vector::{
    EMBEDDING_DIMENSION_384, EntryId, Similarity, SimilarityIndex, VectorDimension, VectorError,
};
