//! Shared helpers for integration tests.
//!
//! Services are built with the deterministic hash embedder so tests
//! never download a model: identical text maps to an identical vector
//! and disjoint vocabularies land far apart.

#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;

use maildex::{
    DedupService, EmailContent, FileBackend, FlushMode, HashEmbeddingProvider, KeywordClassifier,
    Settings, VectorDimension,
};

pub const DIM: usize = 64;

pub fn test_settings(dir: &TempDir) -> Settings {
    let mut settings = Settings::default();
    settings.snapshot_path = dir.path().join("snapshot.bin");
    settings.embedding.dimension = DIM;
    settings
}

pub fn deferred_settings(dir: &TempDir, max_delay_ms: u64) -> Settings {
    let mut settings = test_settings(dir);
    settings.persistence.flush_mode = FlushMode::Deferred;
    settings.persistence.max_delay_ms = max_delay_ms;
    settings
}

pub fn build_service(settings: &Settings) -> DedupService {
    DedupService::new(
        settings,
        Arc::new(HashEmbeddingProvider::new(
            VectorDimension::new(settings.embedding.dimension).unwrap(),
        )),
        Arc::new(KeywordClassifier::new()),
        Arc::new(FileBackend::new(settings.snapshot_path.clone())),
    )
    .expect("failed to build test service")
}

pub fn email(subject: &str, body: &str) -> EmailContent {
    EmailContent::new(
        subject,
        "sender@example.com",
        "Mon, 3 Aug 2026 10:00:00 +0000",
        body,
    )
}
