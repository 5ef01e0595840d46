//! End-to-end duplicate detection flow against a live service.

mod common;

use std::sync::Arc;

use tempfile::TempDir;

use common::{DIM, build_service, email, test_settings};
use maildex::{
    Classification, Classifier, ClassifyError, DedupService, EmailContent, EmbeddingError,
    EmbeddingProvider, FileBackend, KeywordClassifier, VectorDimension,
};

#[test]
fn novel_then_duplicate_then_unrelated() {
    let dir = TempDir::new().unwrap();
    let service = build_service(&test_settings(&dir));

    // Submit email A: novel, classified, committed
    let invoice = email("Invoice payment request #1", "Please settle invoice #1.");
    let outcome = service.process(&invoice).unwrap();
    assert!(!outcome.is_duplicate);
    assert!(outcome.similar_matches.is_empty());
    assert_eq!(outcome.request_type, "INVOICE_PAYMENT");
    assert_eq!(service.stats().entry_count, 1);

    // Resubmit identical text: duplicate, index unchanged
    let outcome = service.process(&invoice).unwrap();
    assert!(outcome.is_duplicate);
    assert!(outcome.similar_matches[0].similarity >= 0.99);
    assert_eq!(outcome.similar_matches[0].subject, "Invoice payment request #1");
    assert_eq!(service.stats().entry_count, 1);

    // Submit unrelated email B: novel, index grows
    let greeting = email("Completely unrelated greeting", "Long time no see, old friend!");
    let outcome = service.process(&greeting).unwrap();
    assert!(!outcome.is_duplicate);
    assert_eq!(service.stats().entry_count, 2);
}

#[test]
fn index_and_store_stay_paired() {
    let dir = TempDir::new().unwrap();
    let service = build_service(&test_settings(&dir));

    // Mixed sequence of novel mail and duplicates
    for (subject, body) in [
        ("Invoice payment request", "Please pay."),
        ("Invoice payment request", "Please pay."),
        ("Balance question", "What is my current balance?"),
        ("Reimbursement claim", "Taxi receipts attached."),
        ("Balance question", "What is my current balance?"),
    ] {
        service.process(&email(subject, body)).unwrap();
    }

    let stats = service.stats();
    assert_eq!(stats.entry_count, 3);
    assert_eq!(
        stats.entry_count, stats.record_count,
        "every index entry must have exactly one metadata record"
    );
}

#[test]
fn duplicate_reports_best_match_first() {
    let dir = TempDir::new().unwrap();
    let service = build_service(&test_settings(&dir));

    let original = email("Statement request for March", "Please send my March statement.");
    service.process(&original).unwrap();

    let outcome = service.process(&original).unwrap();
    assert!(outcome.is_duplicate);
    // Confidence for a duplicate is the best match's similarity
    assert_eq!(outcome.confidence, outcome.similar_matches[0].similarity);
    for window in outcome.similar_matches.windows(2) {
        assert!(window[0].similarity >= window[1].similarity);
    }
}

/// Maps known texts onto fixed vectors so distances are exact.
struct FixtureEmbedder;

impl EmbeddingProvider for FixtureEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut v = vec![0.0; DIM];
        if text.contains("at threshold") {
            // Squared distance 1.0 from the anchor: similarity exactly 0.5
            v[0] = 1.0;
        } else if text.contains("below threshold") {
            // Squared distance 1.21: similarity 0.395
            v[0] = 1.1;
        }
        // The anchor itself stays at the origin
        Ok(v)
    }

    fn dimension(&self) -> VectorDimension {
        VectorDimension::new(DIM).unwrap()
    }
}

#[test]
fn threshold_boundary_is_inclusive() {
    let dir = TempDir::new().unwrap();
    let mut settings = test_settings(&dir);
    settings.detection.threshold = 0.5;

    let service = DedupService::new(
        &settings,
        Arc::new(FixtureEmbedder),
        Arc::new(KeywordClassifier::new()),
        Arc::new(FileBackend::new(settings.snapshot_path.clone())),
    )
    .unwrap();

    service.process(&email("anchor", "anchor body")).unwrap();

    // Similarity exactly at the threshold counts as a duplicate
    let outcome = service.process(&email("at threshold", "boundary")).unwrap();
    assert!(outcome.is_duplicate);
    assert_eq!(outcome.similar_matches[0].similarity, 0.5);
    assert_eq!(service.stats().entry_count, 1);

    // Just below the threshold is novel
    let outcome = service
        .process(&email("below threshold", "boundary"))
        .unwrap();
    assert!(!outcome.is_duplicate);
    assert_eq!(service.stats().entry_count, 2);
}

struct FailingClassifier;

impl Classifier for FailingClassifier {
    fn classify(&self, _email: &EmailContent) -> Result<Classification, ClassifyError> {
        Err(ClassifyError::Backend("llm unavailable".to_string()))
    }
}

#[test]
fn classifier_outage_aborts_cleanly_and_recovers() {
    let dir = TempDir::new().unwrap();
    let settings = test_settings(&dir);

    {
        let service = DedupService::new(
            &settings,
            Arc::new(maildex::HashEmbeddingProvider::new(
                VectorDimension::new(DIM).unwrap(),
            )),
            Arc::new(FailingClassifier),
            Arc::new(FileBackend::new(settings.snapshot_path.clone())),
        )
        .unwrap();

        let err = service
            .process(&email("during outage", "some body"))
            .unwrap_err();
        assert_eq!(err.status_code(), "CLASSIFICATION_FAILURE");
        assert_eq!(service.stats().entry_count, 0);
    }

    // Same snapshot path with a working classifier: the failed request
    // left nothing behind, so the email is still novel
    let service = build_service(&settings);
    let outcome = service.process(&email("during outage", "some body")).unwrap();
    assert!(!outcome.is_duplicate);
}

#[test]
fn invalid_threshold_fails_at_startup() {
    let dir = TempDir::new().unwrap();
    let mut settings = test_settings(&dir);
    settings.detection.threshold = 1.2;

    let err = DedupService::new(
        &settings,
        Arc::new(maildex::HashEmbeddingProvider::new(
            VectorDimension::new(DIM).unwrap(),
        )),
        Arc::new(KeywordClassifier::new()),
        Arc::new(FileBackend::new(settings.snapshot_path.clone())),
    )
    .unwrap_err();
    assert_eq!(err.status_code(), "CONFIG_ERROR");
}
