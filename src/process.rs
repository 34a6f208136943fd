//! Invocation orchestrator.
//!
//! One call to [`Processor::process`] runs the stages strictly in order and
//! stops at the first failure:
//!
//! ```text
//! validate ──▶ fetch ──▶ open ──▶ extract ──▶ assemble
//! ```
//!
//! ## Why spawn_blocking?
//!
//! The PDF engine is synchronous native code. Opening and extraction run
//! together on a blocking-pool thread so Tokio worker threads never stall.
//! That thread owns the byte buffer and the document handle; both are
//! released when it returns, whatever the outcome.
//!
//! ## Deadline
//!
//! Every invocation has one deadline: the configured timeout, or the runtime's
//! own deadline minus a margin if that is earlier. The fetch and the blocking
//! task are both awaited against it.
//!
//! A blocking task cannot be aborted. When the await gives up, the task keeps
//! running until the extractor next looks at its cancel flag, which it does
//! before every page. The flag is raised as soon as the timeout fires, so the
//! thread, the byte buffer and the document handle are released at the next
//! page boundary instead of at the end of the document.
//!
//! ## Authentication
//!
//! With an `auth_secret_id` configured, [`Processor::handle_event`] checks the
//! event's bearer token before anything else and answers a mismatch with a
//! 403. [`Processor::process`] works on an already accepted payload and does
//! not check.

use crate::auth::{self, SecretSource, SecretsManagerSource};
use crate::config::{GraphicsMode, ServiceConfig};
use crate::engine::{PdfEngine, PdfiumEngine};
use crate::error::{ProcessingError, ServiceError, StageFailure};
use crate::output::{DocumentInfo, ExtractionResult, ResponseEnvelope};
use crate::pipeline::assemble::{self, FailureContext, Progress};
use crate::pipeline::extract::{self, ExtractOptions};
use crate::pipeline::fetch::{self, ObjectStore};
use crate::pipeline::open;
use crate::pipeline::request::{self, EventSource};
use crate::pipeline::s3::{self, S3Store};
use crate::taxonomy::ProcessingStage as S;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, info_span, warn, Instrument, Span};

/// Per-invocation facts supplied by the caller (usually the runtime loop).
#[derive(Debug, Clone, Default)]
pub struct InvocationContext {
    /// Lambda request id; echoed as `error_reference`.
    pub request_id: Option<String>,
    /// Hard deadline from the runtime, margin already subtracted.
    pub deadline: Option<Instant>,
}

/// Runs requests against one object store and one PDF engine.
pub struct Processor<St, E> {
    store: St,
    engine: Arc<E>,
    config: ServiceConfig,
    auth: Option<Arc<dyn SecretSource>>,
}

impl Processor<S3Store, PdfiumEngine> {
    /// The production wiring: S3 plus PDFium, and Secrets Manager when a
    /// token check is configured.
    pub async fn from_config(config: ServiceConfig) -> Self {
        let shared = s3::load_sdk_config(&config).await;
        let store = S3Store::from_shared(&shared, &config);
        let engine = PdfiumEngine::from_config(&config);
        let auth = SecretsManagerSource::from_shared(&shared, &config);
        let processor = Self::new(store, engine, config);
        match auth {
            Some(source) => {
                info!("Bearer token check enabled");
                processor.with_auth(source)
            }
            None => processor,
        }
    }
}

impl<St: ObjectStore, E: PdfEngine> Processor<St, E> {
    /// A processor that accepts every event.
    pub fn new(store: St, engine: E, config: ServiceConfig) -> Self {
        Self {
            store,
            engine: Arc::new(engine),
            config,
            auth: None,
        }
    }

    /// Require every event handled by [`Processor::handle_event`] to carry
    /// the access key `source` provides.
    pub fn with_auth(mut self, source: impl SecretSource + 'static) -> Self {
        self.auth = Some(Arc::new(source));
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Handle a raw invocation event and produce the raw response.
    ///
    /// API Gateway events get a proxy response; anything else gets the
    /// envelope itself. A rejected token gets a 403 proxy response either way.
    pub async fn handle_event(
        &self,
        event: Value,
        ctx: &InvocationContext,
    ) -> Result<Value, ServiceError> {
        if let Some(secret) = &self.auth {
            if let Err(e) = auth::verify(&event, secret.as_ref()).await {
                warn!(
                    request_id = ctx.request_id.as_deref().unwrap_or("-"),
                    "Authentication failed: {}", e
                );
                return Ok(assemble::auth_rejection());
            }
        }

        let (payload, source) = request::unwrap_event(event);
        let envelope = self.process(&payload, ctx).await;
        match source {
            EventSource::Direct => Ok(serde_json::to_value(&envelope)?),
            EventSource::Gateway => assemble::gateway_response(&envelope),
        }
    }

    /// Process one request payload. Never fails: every failure becomes a
    /// failure envelope.
    pub async fn process(&self, payload: &Value, ctx: &InvocationContext) -> ResponseEnvelope {
        let span = info_span!(
            "invocation",
            request_id = ctx.request_id.as_deref().unwrap_or("-"),
            s3_path = tracing::field::Empty,
        );
        self.process_inner(payload, ctx).instrument(span).await
    }

    async fn process_inner(&self, payload: &Value, ctx: &InvocationContext) -> ResponseEnvelope {
        let started = Instant::now();
        let deadline = self.deadline(ctx);
        let mut progress = Progress::default();

        match self.run(payload, deadline, &mut progress).await {
            Ok((info, result)) => {
                info!(
                    pages = info.page_count,
                    words = result.word_count(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Extraction complete"
                );
                assemble::success(info, result)
            }
            Err(failure) => {
                let c = failure.classify();
                warn!(
                    code = %c.code,
                    stage = %c.stage,
                    retryable = c.retryable,
                    fallback = c.fallback_recommended,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Invocation failed: {}",
                    failure.error
                );
                assemble::failure(
                    &failure,
                    &FailureContext {
                        service_name: &self.config.service_name,
                        provider: self.engine.name(),
                        progress,
                        request_id: ctx.request_id.as_deref(),
                    },
                )
            }
        }
    }

    /// The earlier of the configured timeout and the runtime deadline.
    fn deadline(&self, ctx: &InvocationContext) -> Instant {
        let configured = Instant::now() + Duration::from_secs(self.config.invocation_timeout_secs);
        match ctx.deadline {
            Some(runtime) => runtime.min(configured),
            None => configured,
        }
    }

    async fn run(
        &self,
        payload: &Value,
        deadline: Instant,
        progress: &mut Progress,
    ) -> Result<(DocumentInfo, ExtractionResult), StageFailure> {
        // ── Step 1: Validate ─────────────────────────────────────────────────
        let request = request::validate(payload).map_err(|e| e.at(S::RequestValidation))?;
        Span::current().record("s3_path", tracing::field::display(&request.document));
        info!(graphics_mode = %request.graphics_mode, "Request accepted");

        // ── Step 2: Fetch ────────────────────────────────────────────────────
        progress.fetched = true;
        let fetch_timeout = Duration::from_secs(self.config.s3_timeout_secs)
            .min(deadline.saturating_duration_since(Instant::now()));
        let bytes = fetch::fetch_document(&self.store, &request.document, fetch_timeout)
            .await
            .map_err(|e| e.at(S::S3Download))?;

        // ── Step 3: Open + extract ───────────────────────────────────────────
        self.open_and_extract(bytes, request.graphics_mode, deadline, progress)
            .await
    }

    async fn open_and_extract(
        &self,
        bytes: Vec<u8>,
        graphics_mode: GraphicsMode,
        deadline: Instant,
        progress: &mut Progress,
    ) -> Result<(DocumentInfo, ExtractionResult), StageFailure> {
        let extracting = Arc::new(AtomicBool::new(false));
        let cancelled = Arc::new(AtomicBool::new(false));
        let engine = Arc::clone(&self.engine);
        let task_flags = BlockingFlags {
            extracting: Arc::clone(&extracting),
            cancelled: Arc::clone(&cancelled),
        };
        let budget = self.config.memory_budget_bytes;

        let task = tokio::task::spawn_blocking(move || {
            open_and_extract_blocking(
                engine.as_ref(),
                &bytes,
                graphics_mode,
                deadline,
                budget,
                &task_flags,
            )
        });

        let remaining = deadline.saturating_duration_since(Instant::now());
        let outcome = tokio::time::timeout(remaining, task).await;

        progress.extracted = extracting.load(Ordering::SeqCst);
        let stage = if progress.extracted {
            S::ExtractPdf
        } else {
            S::OpenPdf
        };

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(ProcessingError::Internal(format!(
                "Extraction task panicked: {}",
                join_error
            ))
            .at(S::RequestProcessing)),
            Err(_) => {
                cancelled.store(true, Ordering::SeqCst);
                Err(ProcessingError::EngineTimeout {
                    detail: format!("no result within the invocation deadline ({stage})"),
                }
                .at(stage))
            }
        }
    }
}

/// Shared between the awaiting task and the blocking thread.
struct BlockingFlags {
    /// Set once the document is open and page extraction has begun.
    extracting: Arc<AtomicBool>,
    /// Set when the awaiting side has given up.
    cancelled: Arc<AtomicBool>,
}

/// Blocking half of the pipeline: byte checks, open, extract.
fn open_and_extract_blocking<E: PdfEngine>(
    engine: &E,
    bytes: &[u8],
    graphics_mode: GraphicsMode,
    deadline: Instant,
    memory_budget_bytes: u64,
    flags: &BlockingFlags,
) -> Result<(DocumentInfo, ExtractionResult), StageFailure> {
    open::check_bytes(bytes, memory_budget_bytes).map_err(|e| e.at(S::OpenPdf))?;
    if Instant::now() >= deadline {
        return Err(ProcessingError::EngineTimeout {
            detail: "deadline reached before the document was opened".into(),
        }
        .at(S::OpenPdf));
    }

    let file_size = bytes.len() as u64;
    let opts = ExtractOptions {
        graphics_mode,
        deadline: Some(deadline),
        cancelled: Some(flags.cancelled.as_ref()),
        memory_budget_bytes,
        file_size,
    };

    let extracted = engine
        .with_document(bytes, |doc| {
            let info = open::describe(doc, file_size);
            info!(pages = info.page_count, bytes = file_size, "Document opened");
            flags.extracting.store(true, Ordering::SeqCst);
            extract::extract_document(doc, &opts).map(|result| (info, result))
        })
        .map_err(|e| open::map_open_error(e).at(S::OpenPdf))?;

    extracted.map_err(|e| e.at(S::ExtractPdf))
}
