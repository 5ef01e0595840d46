//! Domain types shared across the engine.
//!
//! These are the shapes that cross the engine's boundaries: the parsed
//! email handed in by the mail layer, the metadata committed alongside
//! each index entry, and the outcome returned to callers.

use serde::{Deserialize, Serialize};

use crate::vector::Similarity;

/// A parsed inbound email, as provided by the (out-of-scope) MIME layer.
///
/// The engine never touches raw RFC 5322 messages; by the time an email
/// reaches `process`, subject, sender, date, and plain-text body have
/// already been extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub from_address: String,
    /// Date header as the mail layer provides it (RFC 2822 style).
    pub date: String,
    /// Plain-text body with markup already stripped.
    pub body: String,
}

impl EmailContent {
    pub fn new(
        subject: impl Into<String>,
        from_address: impl Into<String>,
        date: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            from_address: from_address.into(),
            date: date.into(),
            body: body.into(),
        }
    }

    /// Text handed to the embedding provider.
    ///
    /// Subject and body only: sender and date are excluded so a resend
    /// of identical content still registers as a duplicate.
    #[must_use]
    pub fn canonical_text(&self) -> String {
        format!("Subject: {}\n{}", self.subject, self.body)
    }
}

/// Result of classifying a novel email into a request-type category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Request-type label, e.g. `INVOICE_PAYMENT`.
    pub request_type: String,
    /// Classifier confidence in [0.0, 1.0].
    pub confidence: f32,
}

/// Metadata committed one-to-one with each index entry.
///
/// Immutable once committed: corrections are modeled as new entries,
/// never updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub subject: String,
    pub from_address: String,
    pub date: String,
    pub request_type: String,
    pub confidence: f32,
    /// Structured fields pulled out by the (out-of-scope) extraction
    /// stage, carried opaquely.
    #[serde(default)]
    pub extracted_fields: serde_json::Map<String, serde_json::Value>,
}

impl RecordMetadata {
    /// Builds the metadata for a freshly classified email.
    #[must_use]
    pub fn from_classification(email: &EmailContent, classification: &Classification) -> Self {
        Self {
            subject: email.subject.clone(),
            from_address: email.from_address.clone(),
            date: email.date.clone(),
            request_type: classification.request_type.clone(),
            confidence: classification.confidence,
            extracted_fields: serde_json::Map::new(),
        }
    }
}

/// A previously committed entry that matched the query above threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarMatch {
    pub similarity: f32,
    pub subject: String,
    pub from_address: String,
    pub date: String,
    pub request_type: String,
}

impl SimilarMatch {
    #[must_use]
    pub fn new(similarity: Similarity, metadata: &RecordMetadata) -> Self {
        Self {
            similarity: similarity.get(),
            subject: metadata.subject.clone(),
            from_address: metadata.from_address.clone(),
            date: metadata.date.clone(),
            request_type: metadata.request_type.clone(),
        }
    }
}

/// What `process` hands back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessOutcome {
    pub request_type: String,
    pub confidence: f32,
    pub is_duplicate: bool,
    /// Matches at or above threshold, descending by similarity.
    /// Empty for novel emails.
    pub similar_matches: Vec<SimilarMatch>,
}

/// Point-in-time counters exposed by the service.
///
/// `entry_count` and `record_count` are always equal at a quiescent
/// point; they are reported separately so callers can observe the
/// index/store pairing invariant rather than trust it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub entry_count: usize,
    pub record_count: usize,
    pub dimension: usize,
    pub next_id: u32,
}
