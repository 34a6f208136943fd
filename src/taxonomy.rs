//! Error taxonomy: the fixed catalog of failure codes and the classifier that
//! maps a stage-tagged condition onto it.
//!
//! Callers route on the bracketed code at the start of the `error` field, so
//! every code string here is a wire contract. The catalog is a single table
//! ([`CATALOG`]) rather than logic spread across the pipeline; [`classify`] is
//! the only place where a raised condition becomes a code.

use crate::error::ProcessingError;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Pipeline phase a failure originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    RequestValidation,
    S3Download,
    OpenPdf,
    ExtractPdf,
    RequestProcessing,
}

impl ProcessingStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RequestValidation => "request_validation",
            Self::S3Download => "s3_download",
            Self::OpenPdf => "open_pdf",
            Self::ExtractPdf => "extract_pdf",
            Self::RequestProcessing => "request_processing",
        }
    }

    /// Who the failure is attributed to in `error_origin`.
    pub fn origin(self) -> &'static str {
        match self {
            Self::RequestValidation => "caller",
            Self::S3Download => "s3",
            Self::OpenPdf | Self::ExtractPdf => "pdf_engine",
            Self::RequestProcessing => "ocr_lambda",
        }
    }
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse failure family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Storage,
    Format,
    Resource,
    Unknown,
}

/// Every failure code the service can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    MissingS3Path,
    InvalidGraphicsMode,
    InvalidS3Path,
    S3ObjectNotFound,
    S3BucketNotFound,
    S3AccessDenied,
    S3Timeout,
    S3DownloadFailed,
    PdfEmpty,
    PdfEncrypted,
    PdfCorrupt,
    PdfParseFailed,
    PymupdfTimeout,
    PymupdfMemoryLimit,
    PymupdfExtractionFailed,
    UnhandledException,
}

/// One row of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub code: ErrorCode,
    pub category: ErrorCategory,
    /// Stages the code may be raised in; the first is the canonical one.
    pub stages: &'static [ProcessingStage],
    pub retryable: bool,
    pub fallback_recommended: bool,
    pub is_timeout: bool,
    /// Value of the legacy `error_type` field.
    pub legacy_type: &'static str,
    pub summary: &'static str,
}

use ErrorCategory as C;
use ProcessingStage as S;

const VALIDATION: &[ProcessingStage] = &[S::RequestValidation];
const DOWNLOAD: &[ProcessingStage] = &[S::S3Download];
const OPEN: &[ProcessingStage] = &[S::OpenPdf];
const OPEN_OR_EXTRACT: &[ProcessingStage] = &[S::OpenPdf, S::ExtractPdf];
const EXTRACT: &[ProcessingStage] = &[S::ExtractPdf];
const PROCESSING: &[ProcessingStage] = &[S::RequestProcessing];

const fn entry(
    code: ErrorCode,
    category: ErrorCategory,
    stages: &'static [ProcessingStage],
    retryable: bool,
    fallback_recommended: bool,
    is_timeout: bool,
    legacy_type: &'static str,
    summary: &'static str,
) -> CatalogEntry {
    CatalogEntry {
        code,
        category,
        stages,
        retryable,
        fallback_recommended,
        is_timeout,
        legacy_type,
        summary,
    }
}

/// The complete error catalog, in declaration order of [`ErrorCode`].
pub static CATALOG: [CatalogEntry; 16] = [
    entry(
        ErrorCode::MissingS3Path,
        C::Validation,
        VALIDATION,
        false,
        false,
        false,
        "ValidationError",
        "Missing s3_path parameter",
    ),
    entry(
        ErrorCode::InvalidGraphicsMode,
        C::Validation,
        VALIDATION,
        false,
        false,
        false,
        "ValidationError",
        "Invalid graphics_mode parameter",
    ),
    entry(
        ErrorCode::InvalidS3Path,
        C::Validation,
        VALIDATION,
        false,
        false,
        false,
        "ValidationError",
        "Invalid S3 path format, expected s3://bucket-name/path/to/file.pdf",
    ),
    entry(
        ErrorCode::S3ObjectNotFound,
        C::Storage,
        DOWNLOAD,
        false,
        false,
        false,
        "NoSuchKey",
        "PDF object not found in S3",
    ),
    entry(
        ErrorCode::S3BucketNotFound,
        C::Storage,
        DOWNLOAD,
        false,
        false,
        false,
        "NoSuchBucket",
        "S3 bucket not found",
    ),
    entry(
        ErrorCode::S3AccessDenied,
        C::Storage,
        DOWNLOAD,
        false,
        false,
        false,
        "AccessDenied",
        "Access denied reading PDF from S3",
    ),
    entry(
        ErrorCode::S3Timeout,
        C::Storage,
        DOWNLOAD,
        true,
        true,
        true,
        "TimeoutError",
        "Timed out downloading PDF from S3",
    ),
    entry(
        ErrorCode::S3DownloadFailed,
        C::Storage,
        DOWNLOAD,
        true,
        false,
        false,
        "ClientError",
        "Failed to download PDF from S3",
    ),
    entry(
        ErrorCode::PdfEmpty,
        C::Format,
        OPEN,
        false,
        false,
        false,
        "EmptyFileError",
        "PDF file is empty",
    ),
    entry(
        ErrorCode::PdfEncrypted,
        C::Format,
        OPEN,
        false,
        false,
        false,
        "EncryptedPdfError",
        "PDF is encrypted or password protected",
    ),
    entry(
        ErrorCode::PdfCorrupt,
        C::Format,
        OPEN,
        false,
        false,
        false,
        "FileDataError",
        "PDF structure is corrupt",
    ),
    entry(
        ErrorCode::PdfParseFailed,
        C::Format,
        OPEN,
        false,
        false,
        false,
        "FileDataError",
        "Failed to open PDF",
    ),
    entry(
        ErrorCode::PymupdfTimeout,
        C::Resource,
        OPEN_OR_EXTRACT,
        true,
        true,
        true,
        "TimeoutError",
        "PDF processing timed out",
    ),
    entry(
        ErrorCode::PymupdfMemoryLimit,
        C::Resource,
        OPEN_OR_EXTRACT,
        true,
        true,
        false,
        "MemoryError",
        "PDF processing exceeded the memory limit",
    ),
    entry(
        ErrorCode::PymupdfExtractionFailed,
        C::Format,
        EXTRACT,
        true,
        true,
        false,
        "RuntimeError",
        "Failed to extract text from PDF",
    ),
    entry(
        ErrorCode::UnhandledException,
        C::Unknown,
        PROCESSING,
        true,
        false,
        false,
        "InternalError",
        "Unexpected error while processing request",
    ),
];

impl ErrorCode {
    pub const ALL: [ErrorCode; 16] = [
        Self::MissingS3Path,
        Self::InvalidGraphicsMode,
        Self::InvalidS3Path,
        Self::S3ObjectNotFound,
        Self::S3BucketNotFound,
        Self::S3AccessDenied,
        Self::S3Timeout,
        Self::S3DownloadFailed,
        Self::PdfEmpty,
        Self::PdfEncrypted,
        Self::PdfCorrupt,
        Self::PdfParseFailed,
        Self::PymupdfTimeout,
        Self::PymupdfMemoryLimit,
        Self::PymupdfExtractionFailed,
        Self::UnhandledException,
    ];

    /// The wire identifier, e.g. `OCR_LAMBDA_S3_TIMEOUT`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingS3Path => "OCR_LAMBDA_MISSING_S3_PATH",
            Self::InvalidGraphicsMode => "OCR_LAMBDA_INVALID_GRAPHICS_MODE",
            Self::InvalidS3Path => "OCR_LAMBDA_INVALID_S3_PATH",
            Self::S3ObjectNotFound => "OCR_LAMBDA_S3_OBJECT_NOT_FOUND",
            Self::S3BucketNotFound => "OCR_LAMBDA_S3_BUCKET_NOT_FOUND",
            Self::S3AccessDenied => "OCR_LAMBDA_S3_ACCESS_DENIED",
            Self::S3Timeout => "OCR_LAMBDA_S3_TIMEOUT",
            Self::S3DownloadFailed => "OCR_LAMBDA_S3_DOWNLOAD_FAILED",
            Self::PdfEmpty => "OCR_LAMBDA_PDF_EMPTY",
            Self::PdfEncrypted => "OCR_LAMBDA_PDF_ENCRYPTED",
            Self::PdfCorrupt => "OCR_LAMBDA_PDF_CORRUPT",
            Self::PdfParseFailed => "OCR_LAMBDA_PDF_PARSE_FAILED",
            Self::PymupdfTimeout => "OCR_LAMBDA_PYMUPDF_TIMEOUT",
            Self::PymupdfMemoryLimit => "OCR_LAMBDA_PYMUPDF_MEMORY_LIMIT",
            Self::PymupdfExtractionFailed => "OCR_LAMBDA_PYMUPDF_EXTRACTION_FAILED",
            Self::UnhandledException => "OCR_LAMBDA_UNHANDLED_EXCEPTION",
        }
    }

    /// Catalog row for this code.
    pub fn entry(self) -> &'static CatalogEntry {
        // CATALOG is declared in the same order as the enum.
        &CATALOG[self as usize]
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Returned when a string is not one of the catalog identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown error code '{0}'")]
pub struct UnknownErrorCode(pub String);

impl FromStr for ErrorCode {
    type Err = UnknownErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| UnknownErrorCode(s.to_string()))
    }
}

/// Outcome of classifying one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub code: ErrorCode,
    pub category: ErrorCategory,
    /// Stage reported to the caller: the raising stage when the catalog
    /// allows it, otherwise the code's canonical stage.
    pub stage: ProcessingStage,
    pub retryable: bool,
    pub fallback_recommended: bool,
    pub is_timeout: bool,
}

impl Classification {
    fn from_code(code: ErrorCode, raised_in: ProcessingStage) -> Self {
        let entry = code.entry();
        let stage = if entry.stages.contains(&raised_in) {
            raised_in
        } else {
            entry.stages[0]
        };
        Self {
            code,
            category: entry.category,
            stage,
            retryable: entry.retryable,
            fallback_recommended: entry.fallback_recommended,
            is_timeout: entry.is_timeout,
        }
    }

    pub fn summary(&self) -> &'static str {
        self.code.entry().summary
    }

    pub fn legacy_type(&self) -> &'static str {
        self.code.entry().legacy_type
    }
}

/// Map a condition raised in `stage` onto the catalog.
///
/// Only the condition's kind and the stage are consulted. A condition that is
/// not expected in the stage it surfaced from is unhandled.
pub fn classify(stage: ProcessingStage, error: &ProcessingError) -> Classification {
    use ProcessingError as E;

    let code = match (stage, error) {
        (S::RequestValidation, E::MissingS3Path) => ErrorCode::MissingS3Path,
        (S::RequestValidation, E::InvalidGraphicsMode { .. }) => ErrorCode::InvalidGraphicsMode,
        (S::RequestValidation, E::InvalidS3Path { .. }) => ErrorCode::InvalidS3Path,

        (S::S3Download, E::ObjectNotFound { .. }) => ErrorCode::S3ObjectNotFound,
        (S::S3Download, E::BucketNotFound { .. }) => ErrorCode::S3BucketNotFound,
        (S::S3Download, E::AccessDenied { .. }) => ErrorCode::S3AccessDenied,
        (S::S3Download, E::StoreTimeout { .. }) => ErrorCode::S3Timeout,
        (S::S3Download, E::DownloadFailed { .. }) => ErrorCode::S3DownloadFailed,

        (S::OpenPdf, E::EmptyDocument) => ErrorCode::PdfEmpty,
        (S::OpenPdf, E::Encrypted { .. }) => ErrorCode::PdfEncrypted,
        (S::OpenPdf, E::Corrupt { .. }) => ErrorCode::PdfCorrupt,
        (S::OpenPdf, E::ParseFailed { .. }) => ErrorCode::PdfParseFailed,

        (S::OpenPdf | S::ExtractPdf, E::EngineTimeout { .. }) => ErrorCode::PymupdfTimeout,
        (S::OpenPdf | S::ExtractPdf, E::MemoryLimit { .. }) => ErrorCode::PymupdfMemoryLimit,

        // Once the document is open, any engine-reported failure is an
        // extraction failure regardless of its nature.
        (
            S::ExtractPdf,
            E::ExtractionFailed { .. }
            | E::Encrypted { .. }
            | E::Corrupt { .. }
            | E::ParseFailed { .. },
        ) => ErrorCode::PymupdfExtractionFailed,

        _ => ErrorCode::UnhandledException,
    };

    Classification::from_code(code, stage)
}
