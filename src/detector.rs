//! Duplicate detection policy over the similarity index.

use crate::config::DetectionConfig;
use crate::error::{DedupError, DedupResult};
use crate::store::RecordStore;
use crate::types::SimilarMatch;
use crate::vector::{Similarity, SimilarityIndex};

/// Decides duplicate vs. novel by thresholding index search results.
///
/// Stateless apart from its tuning; the caller supplies the index and
/// store under whichever lock the current pass holds.
#[derive(Debug, Clone, Copy)]
pub struct DuplicateDetector {
    threshold: f32,
    top_k: usize,
    distance_normalizer: f32,
}

impl DuplicateDetector {
    /// Builds a detector, validating the tuning up front.
    ///
    /// A threshold outside [0, 1], a zero top_k, or a degenerate
    /// normalizer is a configuration error, never silently clamped.
    pub fn new(config: &DetectionConfig) -> DedupResult<Self> {
        if !(0.0..=1.0).contains(&config.threshold) || config.threshold.is_nan() {
            return Err(DedupError::ConfigurationError {
                reason: format!("threshold must be in [0.0, 1.0], got {}", config.threshold),
            });
        }
        if config.top_k == 0 {
            return Err(DedupError::ConfigurationError {
                reason: "top_k must be at least 1".to_string(),
            });
        }
        if !(config.distance_normalizer.is_finite() && config.distance_normalizer > 0.0) {
            return Err(DedupError::ConfigurationError {
                reason: format!(
                    "distance_normalizer must be finite and above zero, got {}",
                    config.distance_normalizer
                ),
            });
        }

        Ok(Self {
            threshold: config.threshold,
            top_k: config.top_k,
            distance_normalizer: config.distance_normalizer,
        })
    }

    /// Returns matches at or above the threshold, best first.
    ///
    /// Ordering is descending similarity with ties broken by ascending
    /// entry ID, so the earliest-committed entry wins deterministically.
    /// An empty index yields an empty result, never an error.
    pub fn check(
        &self,
        index: &SimilarityIndex,
        store: &RecordStore,
        embedding: &[f32],
    ) -> DedupResult<Vec<SimilarMatch>> {
        let neighbors = index.search(embedding, self.top_k)?;

        // Search returns ascending distance with ascending-ID ties, which
        // is exactly descending similarity with earliest-ID ties.
        let mut matches = Vec::new();
        for (id, distance) in neighbors {
            let similarity = Similarity::from_distance(distance, self.distance_normalizer)?;
            if similarity.get() < self.threshold {
                continue;
            }

            let metadata = store.get(id).ok_or_else(|| DedupError::IndexCorruption {
                reason: format!("index entry {id} has no metadata record"),
            })?;
            matches.push(SimilarMatch::new(similarity, metadata));
        }

        Ok(matches)
    }

    /// The configured inclusive threshold.
    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}
