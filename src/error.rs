//! Error types for the ocr-lambda library.
//!
//! Three layers, from the outside in:
//!
//! * [`FetchError`] and [`crate::engine::EngineError`]: what the two external
//!   collaborators (object store, PDF engine) report at their boundary.
//!
//! * [`ProcessingError`]: the closed set of conditions any pipeline stage can
//!   raise. Boundary errors are translated into it by the stage that called
//!   the collaborator.
//!
//! * [`StageFailure`]: a [`ProcessingError`] tagged with the
//!   [`ProcessingStage`] it was raised in. This is the only error value that
//!   leaves a stage, and the only input to [`crate::taxonomy::classify`].
//!
//! [`ServiceError`] sits beside them for faults that are not part of any
//! single invocation (bad configuration, Lambda runtime API failures).

use crate::taxonomy::{classify, Classification, ProcessingStage};
use thiserror::Error;

/// A condition raised while processing one request.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProcessingError {
    // ── Request ───────────────────────────────────────────────────────────
    #[error("request has no s3_path")]
    MissingS3Path,

    #[error("graphics_mode '{value}' is not one of: {expected}")]
    InvalidGraphicsMode { value: String, expected: String },

    #[error("'{path}' is not a valid s3://bucket/key reference: {reason}")]
    InvalidS3Path { path: String, reason: String },

    // ── Object store ──────────────────────────────────────────────────────
    #[error("object s3://{bucket}/{key} does not exist")]
    ObjectNotFound { bucket: String, key: String },

    #[error("bucket '{bucket}' does not exist")]
    BucketNotFound { bucket: String },

    #[error("access denied to s3://{bucket}/{key}: {detail}")]
    AccessDenied {
        bucket: String,
        key: String,
        detail: String,
    },

    #[error("download did not complete within {secs}s")]
    StoreTimeout { secs: u64 },

    #[error("download failed: {detail}")]
    DownloadFailed { detail: String },

    // ── Document ──────────────────────────────────────────────────────────
    #[error("document is empty (0 bytes)")]
    EmptyDocument,

    #[error("document is encrypted: {detail}")]
    Encrypted { detail: String },

    #[error("document structure is corrupt: {detail}")]
    Corrupt { detail: String },

    #[error("document could not be opened: {detail}")]
    ParseFailed { detail: String },

    // ── Resources ─────────────────────────────────────────────────────────
    #[error("processing deadline exceeded: {detail}")]
    EngineTimeout { detail: String },

    #[error("memory budget exceeded: {detail}")]
    MemoryLimit { detail: String },

    // ── Extraction ────────────────────────────────────────────────────────
    #[error("extraction failed{}: {detail}", on_page(.page))]
    ExtractionFailed { page: Option<usize>, detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    #[error("internal error: {0}")]
    Internal(String),
}

fn on_page(page: &Option<usize>) -> String {
    page.map(|p| format!(" on page {p}")).unwrap_or_default()
}

impl ProcessingError {
    /// Tag this condition with the stage that raised it.
    pub fn at(self, stage: ProcessingStage) -> StageFailure {
        StageFailure { stage, error: self }
    }
}

/// A [`ProcessingError`] together with the stage it was raised in.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("[{stage}] {error}")]
pub struct StageFailure {
    pub stage: ProcessingStage,
    #[source]
    pub error: ProcessingError,
}

impl StageFailure {
    pub fn classify(&self) -> Classification {
        classify(self.stage, &self.error)
    }
}

/// What an [`crate::pipeline::fetch::ObjectStore`] reports.
///
/// Deciding between a missing bucket and a missing key is the adapter's job;
/// the pipeline only forwards the distinction.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("no such key")]
    ObjectNotFound,

    #[error("no such bucket")]
    BucketNotFound,

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("{0}")]
    Other(String),
}

/// Faults outside a single invocation.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Builder or environment validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The Lambda runtime API could not be reached or answered unexpectedly.
    #[error("Lambda runtime API error: {0}")]
    RuntimeApi(String),

    /// Response envelope could not be serialised.
    #[error("Failed to serialise response: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_failure_display_includes_stage() {
        let f = ProcessingError::EmptyDocument.at(ProcessingStage::OpenPdf);
        assert_eq!(f.to_string(), "[open_pdf] document is empty (0 bytes)");
    }

    #[test]
    fn extraction_failure_display_with_and_without_page() {
        let with_page = ProcessingError::ExtractionFailed {
            page: Some(3),
            detail: "bad content stream".into(),
        };
        assert!(with_page.to_string().contains("page 3"));

        let without = ProcessingError::ExtractionFailed {
            page: None,
            detail: "worker panicked".into(),
        };
        assert_eq!(without.to_string(), "extraction failed: worker panicked");
    }

    #[test]
    fn access_denied_display() {
        let e = ProcessingError::AccessDenied {
            bucket: "docs".into(),
            key: "a.pdf".into(),
            detail: "403".into(),
        };
        assert!(e.to_string().contains("s3://docs/a.pdf"));
    }
}
