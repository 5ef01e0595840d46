//! Configuration module for the duplicate-detection engine.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `MAILDEX_` and use double
//! underscores to separate nested levels:
//! - `MAILDEX_DETECTION__THRESHOLD=0.9` sets `detection.threshold`
//! - `MAILDEX_PERSISTENCE__FLUSH_MODE=deferred` sets `persistence.flush_mode`
//! - `MAILDEX_EMBEDDING__DIMENSION=384` sets `embedding.dimension`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{DedupError, DedupResult};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Path to the snapshot file
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Duplicate detection settings
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Embedding provider settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Snapshot persistence settings
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DetectionConfig {
    /// Similarity threshold above which an email counts as a duplicate.
    /// Inclusive: a match exactly at the threshold is a duplicate.
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Number of nearest neighbors considered per check
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Squared-distance value that maps to similarity 0.0.
    ///
    /// Calibrated offline against the embedding space. Both shipped
    /// providers emit unit-normalized vectors, so squared distance lies
    /// in [0, 4] and 2.0 (orthogonal vectors) is the neutral point.
    #[serde(default = "default_distance_normalizer")]
    pub distance_normalizer: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// Model identifier, informational only
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension, fixed per deployment
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Cache directory for downloaded models
    #[serde(default = "default_model_cache")]
    pub cache_dir: PathBuf,
}

/// When committed state reaches the persistence backend.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FlushMode {
    /// Write before `process` returns. Durability-first.
    Sync,
    /// Hand the frozen snapshot to a background flusher with a bounded
    /// delay. Throughput-first; a crash can lose the last few commits.
    Deferred,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PersistenceConfig {
    #[serde(default = "default_flush_mode")]
    pub flush_mode: FlushMode,

    /// Upper bound on how long a deferred snapshot may wait (ms)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            snapshot_path: default_snapshot_path(),
            debug: false,
            detection: DetectionConfig::default(),
            embedding: EmbeddingConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            top_k: default_top_k(),
            distance_normalizer: default_distance_normalizer(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimension: default_dimension(),
            cache_dir: default_model_cache(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            flush_mode: default_flush_mode(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_version() -> u32 {
    1
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from(".maildex/snapshot.bin")
}

fn default_false() -> bool {
    false
}

fn default_threshold() -> f32 {
    0.95
}

fn default_top_k() -> usize {
    5
}

fn default_distance_normalizer() -> f32 {
    2.0
}

fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}

fn default_dimension() -> usize {
    384
}

fn default_model_cache() -> PathBuf {
    PathBuf::from(".maildex/models")
}

fn default_flush_mode() -> FlushMode {
    FlushMode::Sync
}

fn default_max_delay_ms() -> u64 {
    500
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::figment(PathBuf::from(".maildex/settings.toml"))
            .extract()
            .map_err(Box::new)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, Box<figment::Error>> {
        Self::figment(path.into()).extract().map_err(Box::new)
    }

    fn figment(config_path: PathBuf) -> Figment {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(config_path))
            // Layer in environment variables with MAILDEX_ prefix
            // Use double underscore (__) to separate nested levels
            .merge(Env::prefixed("MAILDEX_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
    }

    /// Fail-fast validation of every tunable.
    ///
    /// Called once at service construction so a bad threshold or
    /// dimension can never surface as a request-time error.
    pub fn validate(&self) -> DedupResult<()> {
        if !(0.0..=1.0).contains(&self.detection.threshold) || self.detection.threshold.is_nan() {
            return Err(DedupError::ConfigurationError {
                reason: format!(
                    "detection.threshold must be in [0.0, 1.0], got {}",
                    self.detection.threshold
                ),
            });
        }
        if self.detection.top_k == 0 {
            return Err(DedupError::ConfigurationError {
                reason: "detection.top_k must be at least 1".to_string(),
            });
        }
        if !(self.detection.distance_normalizer.is_finite()
            && self.detection.distance_normalizer > 0.0)
        {
            return Err(DedupError::ConfigurationError {
                reason: format!(
                    "detection.distance_normalizer must be finite and above zero, got {}",
                    self.detection.distance_normalizer
                ),
            });
        }
        if self.embedding.dimension == 0 {
            return Err(DedupError::ConfigurationError {
                reason: "embedding.dimension cannot be zero".to_string(),
            });
        }
        if self.persistence.flush_mode == FlushMode::Deferred && self.persistence.max_delay_ms == 0
        {
            return Err(DedupError::ConfigurationError {
                reason: "persistence.max_delay_ms must be above zero in deferred mode".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.detection.threshold, 0.95);
        assert_eq!(settings.detection.top_k, 5);
        assert_eq!(settings.embedding.dimension, 384);
        assert_eq!(settings.persistence.flush_mode, FlushMode::Sync);
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let mut settings = Settings::default();
        settings.detection.threshold = 1.5;
        let err = settings.validate().unwrap_err();
        assert_eq!(err.status_code(), "CONFIG_ERROR");

        settings.detection.threshold = -0.1;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_top_k() {
        let mut settings = Settings::default();
        settings.detection.top_k = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_normalizer() {
        let mut settings = Settings::default();
        settings.detection.distance_normalizer = 0.0;
        assert!(settings.validate().is_err());

        settings.detection.distance_normalizer = f32::INFINITY;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("settings.toml");
        std::fs::write(
            &config_path,
            r#"
[detection]
threshold = 0.9
top_k = 3

[persistence]
flush_mode = "deferred"
max_delay_ms = 250
"#,
        )
        .unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.detection.threshold, 0.9);
        assert_eq!(settings.detection.top_k, 3);
        assert_eq!(settings.persistence.flush_mode, FlushMode::Deferred);
        assert_eq!(settings.persistence.max_delay_ms, 250);
        // Unset values keep their defaults
        assert_eq!(settings.embedding.dimension, 384);
    }
}
