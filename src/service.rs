//! Classification orchestrator: the engine's top-level protocol.
//!
//! Each request moves through RECEIVED → CHECKED → {DUPLICATE_RESOLVED |
//! COMMITTED} → DONE. The duplicate check runs twice on the commit path:
//! once optimistically under the shared lock, and again under the
//! exclusive lock before committing. A single check-then-add would let
//! two concurrent submissions of the same content both read "no
//! duplicate" and both commit; the re-check closes that race at the cost
//! of a second in-memory search, which is the cheap side of the trade.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error, info};

use crate::classify::Classifier;
use crate::config::Settings;
use crate::detector::DuplicateDetector;
use crate::embedding::EmbeddingProvider;
use crate::error::{DedupError, DedupResult};
use crate::persist::{PersistenceBackend, PersistenceManager, Snapshot};
use crate::store::RecordStore;
use crate::types::{EmailContent, IndexStats, ProcessOutcome, RecordMetadata, SimilarMatch};
use crate::vector::{SimilarityIndex, VectorDimension};

/// The index+store pair, guarded as one unit.
///
/// One lock over both structures: splitting them would let readers
/// observe an index entry whose metadata has not landed yet. The
/// sequence advances with every mutation (commit or clear) and stamps
/// each captured snapshot, so the persistence layer can tell which of
/// two racing flushes carries the newer state.
struct EngineState {
    index: SimilarityIndex,
    store: RecordStore,
    sequence: u64,
}

/// Duplicate-detection and classification-commit engine.
///
/// Thread-safe; share one instance behind an `Arc` across request
/// handlers. Collaborators (embedder, classifier, persistence backend)
/// are injected at construction.
pub struct DedupService {
    state: RwLock<EngineState>,
    detector: DuplicateDetector,
    embedder: Arc<dyn EmbeddingProvider>,
    classifier: Arc<dyn Classifier>,
    persistence: PersistenceManager,
    dimension: VectorDimension,
}

impl DedupService {
    /// Builds the service: validates configuration, wires collaborators,
    /// and restores the persisted snapshot.
    ///
    /// Configuration problems fail here, never at request time. A
    /// corrupt snapshot is discarded with an error log and the engine
    /// starts empty; it is never truncated into a partial load.
    pub fn new(
        settings: &Settings,
        embedder: Arc<dyn EmbeddingProvider>,
        classifier: Arc<dyn Classifier>,
        backend: Arc<dyn PersistenceBackend>,
    ) -> DedupResult<Self> {
        settings.validate()?;

        let dimension = VectorDimension::new(settings.embedding.dimension)?;
        if embedder.dimension() != dimension {
            return Err(DedupError::ConfigurationError {
                reason: format!(
                    "embedding provider produces {}-dimensional vectors but embedding.dimension is {}",
                    embedder.dimension().get(),
                    dimension.get()
                ),
            });
        }

        let detector = DuplicateDetector::new(&settings.detection)?;
        let persistence = PersistenceManager::new(backend, &settings.persistence);

        let (index, store) = match persistence.restore(dimension) {
            Ok(pair) => pair,
            Err(DedupError::IndexCorruption { reason }) => {
                error!("discarding corrupt snapshot, starting empty: {reason}");
                (SimilarityIndex::new(dimension), RecordStore::new())
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            state: RwLock::new(EngineState {
                index,
                store,
                sequence: 0,
            }),
            detector,
            embedder,
            classifier,
            persistence,
            dimension,
        })
    }

    /// Processes one email: duplicate check, then classify-and-commit if
    /// novel.
    ///
    /// For a duplicate, the best match's request type is copied rather
    /// than reclassified, and the reported confidence is the match
    /// similarity. For a novel email the commit of embedding and
    /// metadata is a single critical section; any failure before it
    /// leaves no trace.
    pub fn process(&self, email: &EmailContent) -> DedupResult<ProcessOutcome> {
        let embedding = self
            .embedder
            .embed(&email.canonical_text())
            .map_err(|e| DedupError::EmbeddingFailure {
                reason: e.to_string(),
            })?;

        // Optimistic pass under the shared lock
        {
            let state = self.state.read();
            let matches = self
                .detector
                .check(&state.index, &state.store, &embedding)?;
            if !matches.is_empty() {
                debug!(
                    subject = %email.subject,
                    similarity = matches[0].similarity,
                    "duplicate resolved on first pass"
                );
                return Ok(Self::duplicate_outcome(matches));
            }
        }

        // Re-check under the exclusive lock: an equivalent email may have
        // committed while this request only held the read lock. The
        // embedding is reused, so nothing slow runs inside the lock.
        let mut state = self.state.write();
        let matches = self
            .detector
            .check(&state.index, &state.store, &embedding)?;
        if !matches.is_empty() {
            debug!(
                subject = %email.subject,
                similarity = matches[0].similarity,
                "duplicate resolved on re-check"
            );
            return Ok(Self::duplicate_outcome(matches));
        }

        let classification = self
            .classifier
            .classify(email)
            .map_err(|e| DedupError::ClassificationFailure {
                reason: e.to_string(),
            })?;
        if !(0.0..=1.0).contains(&classification.confidence)
            || classification.confidence.is_nan()
        {
            return Err(DedupError::ClassificationFailure {
                reason: format!(
                    "classifier returned confidence {} outside [0.0, 1.0]",
                    classification.confidence
                ),
            });
        }

        let metadata = RecordMetadata::from_classification(email, &classification);
        let id = state.index.insert(embedding)?;
        if let Err(e) = state.store.put(id, metadata) {
            // Unreachable for a freshly assigned ID; never leave a torn
            // entry visible
            state.index.rollback(id);
            return Err(e.into());
        }

        info!(
            id = id.get(),
            request_type = %classification.request_type,
            "committed new entry"
        );

        // Freeze the state and stamp its lock order inside the lock;
        // serialization and I/O happen outside it, where flushes may be
        // scheduled out of order
        state.sequence += 1;
        let snapshot = Snapshot::capture(&state.index, &state.store, state.sequence);
        drop(state);
        self.persistence.flush(snapshot);

        Ok(ProcessOutcome {
            request_type: classification.request_type,
            confidence: classification.confidence,
            is_duplicate: false,
            similar_matches: Vec::new(),
        })
    }

    /// Administrative reset: atomically empties index and store and
    /// persists the empty state.
    ///
    /// The ID counter survives, so IDs assigned before the clear are
    /// never handed out again.
    pub fn clear(&self) -> DedupResult<()> {
        let mut state = self.state.write();
        let next_id = state.index.next_id();
        state.index = SimilarityIndex::with_next_id(self.dimension, next_id);
        state.store = RecordStore::new();

        // The clear advances the sequence like any commit, so a stale
        // snapshot still queued in a deferred flusher can never overwrite
        // the persisted empty state
        state.sequence += 1;
        let snapshot = Snapshot::capture(&state.index, &state.store, state.sequence);
        drop(state);

        self.persistence.flush_now(&snapshot)?;
        info!("cleared index and persisted empty state");
        Ok(())
    }

    /// Point-in-time counters.
    #[must_use]
    pub fn stats(&self) -> IndexStats {
        let state = self.state.read();
        IndexStats {
            entry_count: state.index.len(),
            record_count: state.store.len(),
            dimension: state.index.dimension().get(),
            next_id: state.index.next_id(),
        }
    }

    fn duplicate_outcome(matches: Vec<SimilarMatch>) -> ProcessOutcome {
        let best = &matches[0];
        ProcessOutcome {
            request_type: best.request_type.clone(),
            confidence: best.similarity,
            is_duplicate: true,
            similar_matches: matches,
        }
    }
}
