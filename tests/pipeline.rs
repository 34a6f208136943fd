//! Integration tests for the request pipeline.
//!
//! The object store and PDF engine are replaced by in-memory doubles, so these
//! run everywhere without S3 credentials or a native PDFium library.
//!
//! Run with:
//!   cargo test --test pipeline

mod common;

use common::{
    config, multi_page_doc, report_request, single_word_doc, store, FailingStore, MemoryStore,
    ScriptedEngine, PDF_BYTES,
};
use ocr_lambda::taxonomy::{ErrorCode, CATALOG};
use ocr_lambda::{
    AuthError, EngineError, FetchError, InvocationContext, ObjectStore, Processor,
    ResponseEnvelope, SecretSource, ServiceConfig,
};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::time::Duration;

// ── Helpers ──────────────────────────────────────────────────────────────────

async fn run_with<St: ObjectStore>(store: St, engine: ScriptedEngine, request: Value) -> Value {
    let processor = Processor::new(store, engine, config());
    let envelope = processor
        .process(&request, &InvocationContext::default())
        .await;
    serde_json::to_value(&envelope).unwrap()
}

async fn run(engine: ScriptedEngine, request: Value) -> Value {
    run_with(store(), engine, request).await
}

fn assert_failure(v: &Value, code: &str) {
    assert_eq!(v["success"], false, "expected failure, got {v}");
    assert_eq!(v["error_code"], code, "{v}");
    let error = v["error"].as_str().unwrap();
    assert!(
        error.starts_with(&format!("[{code}] ")),
        "error must start with the bracketed code: {error}"
    );
}

/// Catalog-level invariants every failure envelope must satisfy.
fn assert_failure_invariants(v: &Value) {
    let code: ErrorCode = v["error_code"].as_str().unwrap().parse().unwrap();
    let entry = code.entry();
    assert_eq!(v["is_timeout"], entry.is_timeout, "{v}");
    assert_eq!(
        v["fallback_to_external_ocr_recommended"],
        entry.fallback_recommended,
        "{v}"
    );
    assert_eq!(v["is_retryable"], entry.retryable, "{v}");
    assert_eq!(v["external_ocr_used"], false);
    assert_eq!(v["error_summary"], entry.summary);
    assert!(v.get("document_info").is_none());
}

// ── Validation ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_empty_request_is_missing_path() {
    let v = run(ScriptedEngine::opens(single_word_doc()), json!({})).await;
    assert_failure(&v, "OCR_LAMBDA_MISSING_S3_PATH");
    assert_eq!(v["was_sent_to_ocr"], false);
    assert_eq!(v["processed_with_pymupdf"], false);
    assert_eq!(v["processing_stage"], "request_validation");
    assert_eq!(v["error_origin"], "caller");
    assert_eq!(v["route_outcome"], "rejected_invalid_request");
    assert_failure_invariants(&v);
}

#[tokio::test]
async fn test_not_a_uri_is_invalid_path() {
    let v = run(
        ScriptedEngine::opens(single_word_doc()),
        json!({ "s3_path": "not-a-uri" }),
    )
    .await;
    assert_failure(&v, "OCR_LAMBDA_INVALID_S3_PATH");
    assert_eq!(v["was_sent_to_ocr"], false);
    assert_failure_invariants(&v);
}

#[tokio::test]
async fn test_unknown_graphics_mode() {
    let v = run(
        ScriptedEngine::opens(single_word_doc()),
        json!({ "s3_path": "s3://docs-bucket/inbox/report.pdf", "graphics_mode": "vector" }),
    )
    .await;
    assert_failure(&v, "OCR_LAMBDA_INVALID_GRAPHICS_MODE");
    assert_eq!(v["is_retryable"], false);
    assert_failure_invariants(&v);
}

// ── Fetch ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_key_is_object_not_found() {
    let v = run(
        ScriptedEngine::opens(single_word_doc()),
        json!({ "s3_path": "s3://docs-bucket/missing.pdf" }),
    )
    .await;
    assert_failure(&v, "OCR_LAMBDA_S3_OBJECT_NOT_FOUND");
    assert_eq!(v["is_retryable"], false);
    assert_eq!(v["was_sent_to_ocr"], true);
    assert_eq!(v["processed_with_pymupdf"], false);
    assert_eq!(v["error_origin"], "s3");
    assert_eq!(v["route_outcome"], "failed_before_extraction");
    assert_failure_invariants(&v);
}

#[tokio::test]
async fn test_missing_bucket_is_bucket_not_found() {
    let v = run(
        ScriptedEngine::opens(single_word_doc()),
        json!({ "s3_path": "s3://other-bucket/report.pdf" }),
    )
    .await;
    assert_failure(&v, "OCR_LAMBDA_S3_BUCKET_NOT_FOUND");
    assert_failure_invariants(&v);
}

#[tokio::test]
async fn test_store_failures_map_to_codes() {
    let cases = [
        (FetchError::AccessDenied("403".into()), "OCR_LAMBDA_S3_ACCESS_DENIED"),
        (FetchError::Timeout { secs: 60 }, "OCR_LAMBDA_S3_TIMEOUT"),
        (FetchError::Other("connection reset".into()), "OCR_LAMBDA_S3_DOWNLOAD_FAILED"),
    ];
    for (err, code) in cases {
        let v = run_with(
            FailingStore(err),
            ScriptedEngine::opens(single_word_doc()),
            report_request(),
        )
        .await;
        assert_failure(&v, code);
        assert_failure_invariants(&v);
    }
}

#[tokio::test]
async fn test_s3_timeout_recommends_fallback() {
    let v = run_with(
        FailingStore(FetchError::Timeout { secs: 60 }),
        ScriptedEngine::opens(single_word_doc()),
        report_request(),
    )
    .await;
    assert_eq!(v["is_timeout"], true);
    assert_eq!(v["is_retryable"], true);
    assert_eq!(v["fallback_to_external_ocr_recommended"], true);
}

// ── Open ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_zero_byte_object_is_pdf_empty() {
    let v = run(
        ScriptedEngine::opens(single_word_doc()),
        json!({ "s3_path": "s3://docs-bucket/empty.pdf" }),
    )
    .await;
    assert_failure(&v, "OCR_LAMBDA_PDF_EMPTY");
    assert_eq!(v["processing_stage"], "open_pdf");
    assert_eq!(v["processed_with_pymupdf"], false);
    assert_failure_invariants(&v);
}

#[tokio::test]
async fn test_open_failures_map_to_codes() {
    let cases = [
        (EngineError::Encrypted("PasswordError".into()), "OCR_LAMBDA_PDF_ENCRYPTED"),
        (EngineError::Corrupt("FormatError".into()), "OCR_LAMBDA_PDF_CORRUPT"),
        (EngineError::Failed("Unknown".into()), "OCR_LAMBDA_PDF_PARSE_FAILED"),
        (EngineError::Timeout("slow".into()), "OCR_LAMBDA_PYMUPDF_TIMEOUT"),
        (EngineError::MemoryExhausted("alloc".into()), "OCR_LAMBDA_PYMUPDF_MEMORY_LIMIT"),
        (EngineError::Unavailable("no libpdfium".into()), "OCR_LAMBDA_UNHANDLED_EXCEPTION"),
    ];
    for (err, code) in cases {
        let v = run(ScriptedEngine::fails(err), report_request()).await;
        assert_failure(&v, code);
        assert_eq!(v["processed_with_pymupdf"], false, "{v}");
        assert_failure_invariants(&v);
    }
}

#[tokio::test]
async fn test_encrypted_is_terminal() {
    let v = run(
        ScriptedEngine::fails(EngineError::Encrypted("PasswordError".into())),
        report_request(),
    )
    .await;
    assert_eq!(v["is_retryable"], false);
    assert_eq!(v["fallback_to_external_ocr_recommended"], false);
    assert_eq!(v["error_origin"], "pdf_engine");
}

#[tokio::test]
async fn test_document_over_budget_is_memory_limit() {
    let big = vec![b'%'; 17 * 1024 * 1024];
    let store = MemoryStore::default().with("docs-bucket", "big.pdf", &big);
    let processor = Processor::new(
        store,
        ScriptedEngine::opens(single_word_doc()),
        ServiceConfig::builder()
            .memory_budget_mb(16)
            .build()
            .unwrap(),
    );
    let envelope = processor
        .process(
            &json!({ "s3_path": "s3://docs-bucket/big.pdf" }),
            &InvocationContext::default(),
        )
        .await;
    let v = serde_json::to_value(&envelope).unwrap();
    assert_failure(&v, "OCR_LAMBDA_PYMUPDF_MEMORY_LIMIT");
    assert_eq!(v["processing_stage"], "open_pdf");
    assert_failure_invariants(&v);
}

// ── Extract ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_single_word_document() {
    let v = run(ScriptedEngine::opens(single_word_doc()), report_request()).await;
    assert_eq!(v["success"], true, "{v}");
    assert_eq!(v["word_count"], 1);
    let words = v["word_bounding_boxes"].as_array().unwrap();
    assert_eq!(words.len(), 1);
    assert_eq!(words[0]["text"], "Document");
    assert_eq!(words[0]["page"], 1);
    assert_eq!(v["document_info"]["page_count"], 1);
    assert_eq!(v["document_info"]["file_size"], PDF_BYTES.len());
    assert_eq!(v["document_info"]["title"], "Single");
    assert!(v["document_info"].get("author").is_none());
    assert!(v["markdown_text"]
        .as_str()
        .unwrap()
        .contains("## Page 1\n\nDocument"));

    let structured = v["structured_data"].as_array().unwrap();
    assert_eq!(structured.len(), 1);
    assert_eq!(structured[0]["text"], "Document");
    assert_eq!(structured[0]["tables"], json!([]));
}

#[tokio::test]
async fn test_word_boxes_are_consistent() {
    let processor = Processor::new(store(), ScriptedEngine::opens(multi_page_doc()), config());
    let envelope = processor
        .process(&report_request(), &InvocationContext::default())
        .await;
    let ResponseEnvelope::Success(ok) = envelope else {
        panic!("expected success");
    };

    assert_eq!(ok.word_count, ok.word_bounding_boxes.len());
    assert_eq!(ok.word_count, 5);
    assert_eq!(ok.document_info.page_count, 3);

    for w in &ok.word_bounding_boxes {
        let d = w.page_dimensions;
        assert_eq!(w.absolute_bbox.x0, w.bbox.x0 * d.width);
        assert_eq!(w.absolute_bbox.y0, w.bbox.y0 * d.height);
        assert_eq!(w.absolute_bbox.x1, w.bbox.x1 * d.width);
        assert_eq!(w.absolute_bbox.y1, w.bbox.y1 * d.height);
        assert!(w.bbox.x0 <= w.bbox.x1 && w.bbox.y0 <= w.bbox.y1);
        assert!(w.absolute_bbox.x0 <= w.absolute_bbox.x1);
        assert!(w.absolute_bbox.y0 <= w.absolute_bbox.y1);
        assert!((0.0..=1.0).contains(&w.bbox.x1) && (0.0..=1.0).contains(&w.bbox.y1));
    }

    // Reading order: page, then block/line/word as the engine sequenced them.
    let order: Vec<_> = ok
        .word_bounding_boxes
        .iter()
        .map(|w| (w.page, w.block_no, w.line_no, w.word_no))
        .collect();
    let mut sorted = order.clone();
    sorted.sort();
    assert_eq!(order, sorted);
    assert_eq!(ok.word_bounding_boxes[4].page, 3);

    let md = &ok.markdown_text;
    let p1 = md.find("## Page 1").unwrap();
    let p2 = md.find("## Page 2").unwrap();
    let p3 = md.find("## Page 3").unwrap();
    assert!(p1 < p2 && p2 < p3);
    assert!(md.contains("Quarterly report\nRevenue grew\n"));
}

#[tokio::test]
async fn test_bad_page_is_extraction_failure() {
    let mut doc = multi_page_doc();
    doc.pages[1] = Err(EngineError::Failed("content stream error".into()));
    let v = run(ScriptedEngine::opens(doc), report_request()).await;
    assert_failure(&v, "OCR_LAMBDA_PYMUPDF_EXTRACTION_FAILED");
    assert_eq!(v["processing_stage"], "extract_pdf");
    assert_eq!(v["processed_with_pymupdf"], true);
    assert_eq!(v["fallback_to_external_ocr_recommended"], true);
    assert_eq!(v["route_outcome"], "extraction_failed_fallback_recommended");
    assert!(v["error_detail"].as_str().unwrap().contains("page 2"));
    assert!(v.get("word_bounding_boxes").is_none());
    assert_failure_invariants(&v);
}

#[tokio::test]
async fn test_slow_extraction_times_out() {
    let mut doc = multi_page_doc();
    doc.page_delay = Some(Duration::from_millis(700));
    let processor = Processor::new(
        store(),
        ScriptedEngine::opens(doc),
        ServiceConfig::builder()
            .invocation_timeout_secs(1)
            .build()
            .unwrap(),
    );
    let envelope = processor
        .process(&report_request(), &InvocationContext::default())
        .await;
    let v = serde_json::to_value(&envelope).unwrap();
    assert_failure(&v, "OCR_LAMBDA_PYMUPDF_TIMEOUT");
    assert_eq!(v["is_timeout"], true);
    assert_eq!(v["processing_stage"], "extract_pdf");
    assert_eq!(v["processed_with_pymupdf"], true);
    assert_failure_invariants(&v);
}

#[tokio::test]
async fn test_abandoned_extraction_stops_loading_pages() {
    let mut doc = multi_page_doc();
    doc.pages = (0..10)
        .map(|i| Ok(vec![common::word("Line", 72.0, 72.0, 0, i)]))
        .collect();
    doc.page_delay = Some(Duration::from_millis(400));
    let loads = doc.loads.clone();
    let processor = Processor::new(
        store(),
        ScriptedEngine::opens(doc),
        ServiceConfig::builder()
            .invocation_timeout_secs(1)
            .build()
            .unwrap(),
    );

    let envelope = processor
        .process(&report_request(), &InvocationContext::default())
        .await;
    assert_eq!(
        envelope.failure().unwrap().error_code.as_str(),
        "OCR_LAMBDA_PYMUPDF_TIMEOUT"
    );

    // Long enough for every remaining page had the thread kept going.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let loaded = loads.load(Ordering::SeqCst);
    assert!(loaded <= 4, "blocking thread kept extracting: {loaded} pages");
}

#[tokio::test]
async fn test_engine_panic_is_unhandled() {
    let mut engine = ScriptedEngine::opens(single_word_doc());
    engine.panic_on_open = true;
    let v = run(engine, report_request()).await;
    assert_failure(&v, "OCR_LAMBDA_UNHANDLED_EXCEPTION");
    assert_eq!(v["processing_stage"], "request_processing");
    assert_eq!(v["is_retryable"], true);
    assert_eq!(v["fallback_to_external_ocr_recommended"], false);
    assert_eq!(v["error_origin"], "ocr_lambda");
    assert_failure_invariants(&v);
}

// ── Envelope ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_repeated_invocations_agree() {
    let processor = Processor::new(store(), ScriptedEngine::opens(multi_page_doc()), config());
    let ctx = InvocationContext::default();
    let a = processor.process(&report_request(), &ctx).await;
    let b = processor.process(&report_request(), &ctx).await;
    let (a, b) = (a.success().unwrap(), b.success().unwrap());
    assert_eq!(a.document_info, b.document_info);
    assert_eq!(a.word_count, b.word_count);
    assert_eq!(a.markdown_text, b.markdown_text);
}

#[tokio::test]
async fn test_failure_carries_service_and_request_id() {
    let processor = Processor::new(
        store(),
        ScriptedEngine::opens(single_word_doc()),
        ServiceConfig::builder()
            .service_name("pdf-extract")
            .build()
            .unwrap(),
    );
    let ctx = InvocationContext {
        request_id: Some("c0ffee".into()),
        deadline: None,
    };
    let envelope = processor
        .process(&json!({ "s3_path": "s3://docs-bucket/nope.pdf" }), &ctx)
        .await;
    let f = envelope.failure().unwrap();
    assert_eq!(f.ocr_service, "pdf-extract");
    assert_eq!(f.processing_provider, "scripted");
    assert_eq!(f.error_reference.as_deref(), Some("c0ffee"));
    assert_eq!(f.error_type, "NoSuchKey");
}

#[tokio::test]
async fn test_gateway_event_round_trip() {
    let processor = Processor::new(store(), ScriptedEngine::opens(single_word_doc()), config());
    let ctx = InvocationContext::default();

    let ok = processor
        .handle_event(
            json!({
                "httpMethod": "POST",
                "headers": {},
                "body": "{\"s3_path\": \"s3://docs-bucket/inbox/report.pdf\"}"
            }),
            &ctx,
        )
        .await
        .unwrap();
    assert_eq!(ok["statusCode"], 200);
    assert_eq!(ok["headers"]["Content-Type"], "application/json");
    let body: Value = serde_json::from_str(ok["body"].as_str().unwrap()).unwrap();
    assert_eq!(body["word_count"], 1);

    let bad = processor
        .handle_event(json!({ "headers": {}, "body": "{}" }), &ctx)
        .await
        .unwrap();
    assert_eq!(bad["statusCode"], 400);

    let missing = processor
        .handle_event(
            json!({ "headers": {}, "body": "{\"s3_path\": \"s3://docs-bucket/x.pdf\"}" }),
            &ctx,
        )
        .await
        .unwrap();
    assert_eq!(missing["statusCode"], 500);
}

#[tokio::test]
async fn test_direct_event_is_bare_envelope() {
    let processor = Processor::new(store(), ScriptedEngine::opens(single_word_doc()), config());
    let v = processor
        .handle_event(report_request(), &InvocationContext::default())
        .await
        .unwrap();
    assert_eq!(v["success"], true);
    assert!(v.get("statusCode").is_none());
}

// ── Authentication ───────────────────────────────────────────────────────────

/// Access key fixed at construction.
struct StaticKey(Result<&'static str, AuthError>);

#[async_trait::async_trait]
impl SecretSource for StaticKey {
    async fn access_key(&self) -> Result<String, AuthError> {
        self.0.clone().map(str::to_string)
    }
}

fn guarded(key: Result<&'static str, AuthError>) -> Processor<MemoryStore, ScriptedEngine> {
    Processor::new(store(), ScriptedEngine::opens(single_word_doc()), config())
        .with_auth(StaticKey(key))
}

fn gateway_event(authorization: Option<&str>, body: &str) -> Value {
    let headers = match authorization {
        Some(token) => json!({ "Authorization": token }),
        None => json!({}),
    };
    json!({ "httpMethod": "POST", "headers": headers, "body": body })
}

const REPORT_BODY: &str = "{\"s3_path\": \"s3://docs-bucket/inbox/report.pdf\"}";

fn assert_forbidden(v: &Value) {
    assert_eq!(v["statusCode"], 403, "{v}");
    let body: Value = serde_json::from_str(v["body"].as_str().unwrap()).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Authentication failed");
    assert_eq!(body["error_type"], "AuthenticationError");
}

#[tokio::test]
async fn test_gateway_event_without_token_is_forbidden() {
    let v = guarded(Ok("k-123"))
        .handle_event(gateway_event(None, REPORT_BODY), &InvocationContext::default())
        .await
        .unwrap();
    assert_forbidden(&v);
}

#[tokio::test]
async fn test_matching_bearer_token_is_processed() {
    let v = guarded(Ok("k-123"))
        .handle_event(
            gateway_event(Some("Bearer k-123"), REPORT_BODY),
            &InvocationContext::default(),
        )
        .await
        .unwrap();
    assert_eq!(v["statusCode"], 200, "{v}");
    let body: Value = serde_json::from_str(v["body"].as_str().unwrap()).unwrap();
    assert_eq!(body["word_count"], 1);
}

#[tokio::test]
async fn test_direct_event_token_field() {
    let processor = guarded(Ok("k-123"));
    let ctx = InvocationContext::default();

    let ok = processor
        .handle_event(
            json!({ "s3_path": "s3://docs-bucket/inbox/report.pdf", "authorization": "k-123" }),
            &ctx,
        )
        .await
        .unwrap();
    assert_eq!(ok["success"], true, "{ok}");

    let wrong = processor
        .handle_event(
            json!({ "s3_path": "s3://docs-bucket/inbox/report.pdf", "authorization": "k-999" }),
            &ctx,
        )
        .await
        .unwrap();
    assert_forbidden(&wrong);
}

#[tokio::test]
async fn test_token_is_checked_before_validation() {
    let v = guarded(Ok("k-123"))
        .handle_event(gateway_event(Some("Bearer nope"), "{}"), &InvocationContext::default())
        .await
        .unwrap();
    assert_forbidden(&v);
}

#[tokio::test]
async fn test_unreadable_secret_rejects_every_request() {
    let v = guarded(Err(AuthError::Secret("ResourceNotFoundException".into())))
        .handle_event(
            gateway_event(Some("Bearer k-123"), REPORT_BODY),
            &InvocationContext::default(),
        )
        .await
        .unwrap();
    assert_forbidden(&v);
}

#[tokio::test]
async fn test_tokens_are_ignored_without_auth() {
    assert_eq!(config().auth_secret_id, None);
    let processor = Processor::new(store(), ScriptedEngine::opens(single_word_doc()), config());
    let v = processor
        .handle_event(
            gateway_event(Some("Bearer anything"), REPORT_BODY),
            &InvocationContext::default(),
        )
        .await
        .unwrap();
    assert_eq!(v["statusCode"], 200);
}

#[test]
fn test_catalog_is_complete() {
    assert_eq!(CATALOG.len(), ErrorCode::ALL.len());
    let timeouts: Vec<_> = CATALOG
        .iter()
        .filter(|e| e.is_timeout)
        .map(|e| e.code.as_str())
        .collect();
    assert_eq!(
        timeouts,
        ["OCR_LAMBDA_S3_TIMEOUT", "OCR_LAMBDA_PYMUPDF_TIMEOUT"]
    );
}
