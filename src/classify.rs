//! Request-type classification seam.
//!
//! The engine consumes classification as a black box: anything
//! implementing [`Classifier`] can sit behind it, from the bundled
//! keyword matcher to an LLM-backed service. The classifier is only
//! invoked for novel emails, after the duplicate re-check and before
//! commit.

use thiserror::Error;

use crate::types::{Classification, EmailContent};

/// Error type for classification operations
#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Classifier backend error: {0}")]
    Backend(String),
}

/// Maps an email to a request-type label and confidence.
///
/// Implementations must be thread-safe; the orchestrator calls them
/// while holding its exclusive lock, so they should not block on
/// anything slower than they must.
pub trait Classifier: Send + Sync {
    fn classify(&self, email: &EmailContent) -> Result<Classification, ClassifyError>;
}

/// Request types the bundled classifier can produce.
pub const REQUEST_TYPES: &[&str] = &[
    "REIMBURSEMENT",
    "INVOICE_PAYMENT",
    "ACCOUNT_INQUIRY",
    "STATEMENT_REQUEST",
    "OTHER",
];

/// Keyword-rule classifier over subject and body.
///
/// First matching rule wins; anything unmatched falls through to
/// `OTHER`. Confidences are fixed per rule, calibrated against the
/// historical label set rather than computed.
#[derive(Debug, Default, Clone)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Classifier for KeywordClassifier {
    fn classify(&self, email: &EmailContent) -> Result<Classification, ClassifyError> {
        let subject = email.subject.to_lowercase();
        let body = email.body.to_lowercase();

        let (request_type, confidence) = if subject.contains("reimburs") || body.contains("reimburs")
        {
            ("REIMBURSEMENT", 0.85)
        } else if subject.contains("invoice") || subject.contains("payment") {
            ("INVOICE_PAYMENT", 0.78)
        } else if subject.contains("account") || body.contains("balance") {
            ("ACCOUNT_INQUIRY", 0.72)
        } else if subject.contains("statement") || body.contains("statement") {
            ("STATEMENT_REQUEST", 0.81)
        } else {
            ("OTHER", 0.60)
        };

        Ok(Classification {
            request_type: request_type.to_string(),
            confidence,
        })
    }
}
