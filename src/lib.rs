//! # ocr-lambda
//!
//! Extract page markdown, word bounding boxes and document information from a
//! PDF stored in S3, as one synchronous Lambda invocation.
//!
//! ## Why a fixed error taxonomy?
//!
//! The caller is a router, not a person. When extraction fails it has to
//! decide between retrying, sending the document to an external OCR service,
//! or giving up, and it needs to make that call without parsing free-form
//! error text. Every failure therefore carries one code from a closed catalog
//! ([`taxonomy::CATALOG`]) together with its stage, retryability and fallback
//! recommendation. The bracketed code at the start of `error` is the contract.
//!
//! ## Pipeline Overview
//!
//! ```text
//! event
//!  │
//!  ├─ 0. Auth      optional bearer token check (AUTH_SECRET_ID)
//!  ├─ 1. Validate  s3_path / graphics_mode, unwrap API Gateway bodies
//!  ├─ 2. Fetch     GetObject through an ObjectStore (bounded by a timeout)
//!  ├─ 3. Open      empty / size checks, PDFium open (spawn_blocking)
//!  ├─ 4. Extract   page by page: markdown + words, deadline and memory checks
//!  ├─ 5. Geometry  normalized + absolute word boxes
//!  └─ 6. Assemble  success envelope, or classified failure envelope
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ocr_lambda::{InvocationContext, Processor, ServiceConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::from_env()?;
//!     let processor = Processor::from_config(config).await;
//!     let request = json!({ "s3_path": "s3://my-bucket/report.pdf" });
//!     let envelope = processor.process(&request, &InvocationContext::default()).await;
//!     println!("{}", serde_json::to_string_pretty(&envelope)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr-lambda` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod runtime;
pub mod taxonomy;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use auth::{AuthError, SecretSource, SecretsManagerSource};
pub use config::{GraphicsMode, ServiceConfig, ServiceConfigBuilder};
pub use engine::{EngineDocument, EngineError, EnginePage, PdfEngine, PdfiumEngine};
pub use error::{FetchError, ProcessingError, ServiceError, StageFailure};
pub use output::{
    BoundingBox, DocumentInfo, ExtractionResult, FailureResponse, PageDimensions, PageStructure,
    ResponseEnvelope, SuccessResponse, TableData, WordBoundingBox,
};
pub use pipeline::fetch::{DirectoryStore, ObjectStore};
pub use pipeline::request::{DocumentReference, ExtractionRequest};
pub use pipeline::s3::S3Store;
pub use process::{InvocationContext, Processor};
pub use taxonomy::{classify, Classification, ErrorCategory, ErrorCode, ProcessingStage};
