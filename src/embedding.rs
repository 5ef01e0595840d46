//! Embedding provider seam and implementations.
//!
//! The engine consumes embeddings through the [`EmbeddingProvider`]
//! trait. Providers must fail loudly on model error; returning a zero or
//! garbage vector would silently poison the index.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::Path;
use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use thiserror::Error;

use crate::vector::{VectorDimension, VectorError};

/// Error type for embedding operations
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Failed to initialize embedding model: {0}")]
    ModelInit(String),

    #[error("Embedding generation failed: {0}")]
    Generation(String),

    #[error(transparent)]
    Vector(#[from] VectorError),
}

/// Converts email text into a fixed-dimension vector.
///
/// The dimension is fixed per deployment and every produced vector is
/// validated against it before it reaches the index.
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Get the dimension of embeddings produced by this provider.
    #[must_use]
    fn dimension(&self) -> VectorDimension;
}

/// FastEmbed implementation using the AllMiniLML6V2 model.
///
/// Produces 384-dimensional unit-normalized embeddings. The model is
/// downloaded into the configured cache directory on first use.
pub struct FastEmbedProvider {
    model: Mutex<TextEmbedding>,
    dimension: VectorDimension,
}

impl FastEmbedProvider {
    /// Create a new provider, downloading the model if not cached.
    ///
    /// # Errors
    /// Returns an error if the model fails to initialize or download.
    pub fn new(cache_dir: impl AsRef<Path>) -> Result<Self, EmbeddingError> {
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::AllMiniLML6V2)
                .with_cache_dir(cache_dir.as_ref().to_path_buf())
                .with_show_download_progress(false),
        )
        .map_err(|e| EmbeddingError::ModelInit(
            format!("{e}. Ensure you have internet connection for first-time model download")
        ))?;

        Ok(Self {
            model: Mutex::new(model),
            dimension: VectorDimension::dimension_384(),
        })
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let embeddings = self
            .model
            .lock()
            .map_err(|_| {
                EmbeddingError::Generation(
                    "Failed to acquire embedding model lock - model may be poisoned".to_string(),
                )
            })?
            .embed(vec![text.to_string()], None)
            .map_err(|e| EmbeddingError::Generation(e.to_string()))?;

        let embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Generation("Model returned no embedding".to_string()))?;

        self.dimension.validate_vector(&embedding)?;
        Ok(embedding)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }
}

/// Deterministic token-hash embedder.
///
/// Hashes each lowercased token into a signed bucket and normalizes the
/// result to unit length, so identical text maps to an identical vector
/// and disjoint vocabularies map to near-orthogonal vectors. Useful for
/// tests and offline runs where the ONNX model is unavailable; not a
/// substitute for a semantic model in production.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbeddingProvider {
    dimension: VectorDimension,
}

impl HashEmbeddingProvider {
    #[must_use]
    pub fn new(dimension: VectorDimension) -> Self {
        Self { dimension }
    }
}

impl EmbeddingProvider for HashEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let dim = self.dimension.get();
        let mut embedding = vec![0.0f32; dim];

        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let hash = hasher.finish();

            let bucket = (hash % dim as u64) as usize;
            let sign = if hash & (1u64 << 63) == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut embedding {
                *value /= magnitude;
            }
        }

        Ok(embedding)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> HashEmbeddingProvider {
        HashEmbeddingProvider::new(VectorDimension::new(64).unwrap())
    }

    #[test]
    fn test_hash_embeddings_are_deterministic() {
        let p = provider();
        let a = p.embed("Invoice payment request #1").unwrap();
        let b = p.embed("Invoice payment request #1").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_embeddings_are_unit_normalized() {
        let p = provider();
        let v = p.embed("some email body text").unwrap();
        let magnitude: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_different_text_differs() {
        let p = provider();
        let a = p.embed("Invoice payment request").unwrap();
        let b = p.embed("Completely unrelated greeting").unwrap();
        assert_ne!(a, b);

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        assert!(dot < 0.9, "disjoint vocabularies should not be near-identical");
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let p = provider();
        let v = p.embed("").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
        assert_eq!(v.len(), 64);
    }
}
