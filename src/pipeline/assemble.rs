//! Response assembly: success and failure envelopes, plus the API Gateway
//! proxy wrapper.

use crate::error::{ServiceError, StageFailure};
use crate::output::{
    DocumentInfo, ExtractionResult, FailureResponse, ResponseEnvelope, SuccessResponse,
};
use crate::taxonomy::ProcessingStage;
use serde_json::{json, Value};

/// How far an invocation got before it failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// The object store was called.
    pub fetched: bool,
    /// The content extractor was entered.
    pub extracted: bool,
}

/// Everything a failure envelope needs beyond the failure itself.
#[derive(Debug, Clone, Copy)]
pub struct FailureContext<'a> {
    pub service_name: &'a str,
    pub provider: &'a str,
    pub progress: Progress,
    pub request_id: Option<&'a str>,
}

pub fn success(info: DocumentInfo, result: ExtractionResult) -> ResponseEnvelope {
    let word_count = result.word_count();
    ResponseEnvelope::Success(SuccessResponse {
        success: true,
        document_info: info,
        markdown_text: result.markdown_text,
        word_bounding_boxes: result.word_bounding_boxes,
        word_count,
        structured_data: result.structured_data,
    })
}

pub fn failure(failure: &StageFailure, ctx: &FailureContext<'_>) -> ResponseEnvelope {
    let c = failure.classify();
    let sent = ctx.progress.fetched;
    let extracted = ctx.progress.extracted;

    ResponseEnvelope::Failure(Box::new(FailureResponse {
        success: false,
        error: format!("[{}] {}", c.code, c.summary()),
        error_type: c.legacy_type(),
        error_code: c.code,
        error_category: c.category,
        error_summary: c.summary(),
        error_origin: c.stage.origin(),
        is_timeout: c.is_timeout,
        processing_stage: c.stage,
        was_sent_to_ocr: sent,
        ocr_service: ctx.service_name.to_string(),
        processing_provider: ctx.provider.to_string(),
        processed_with_pymupdf: extracted,
        external_ocr_used: false,
        route_outcome: route_outcome(sent, extracted, c.fallback_recommended),
        fallback_to_external_ocr_recommended: c.fallback_recommended,
        is_retryable: c.retryable,
        error_reference: ctx.request_id.map(str::to_string),
        error_detail: Some(failure.error.to_string()),
    }))
}

/// Short label for log aggregation.
pub fn route_outcome(sent: bool, extracted: bool, fallback: bool) -> &'static str {
    match (sent, extracted, fallback) {
        (false, _, _) => "rejected_invalid_request",
        (true, false, _) => "failed_before_extraction",
        (true, true, true) => "extraction_failed_fallback_recommended",
        (true, true, false) => "extraction_failed",
    }
}

/// HTTP status for an API Gateway response.
pub fn status_code(envelope: &ResponseEnvelope) -> u16 {
    match envelope {
        ResponseEnvelope::Success(_) => 200,
        ResponseEnvelope::Failure(f)
            if f.processing_stage == ProcessingStage::RequestValidation =>
        {
            400
        }
        ResponseEnvelope::Failure(_) => 500,
    }
}

/// Wrap an envelope as an API Gateway proxy response.
pub fn gateway_response(envelope: &ResponseEnvelope) -> Result<Value, ServiceError> {
    Ok(json!({
        "statusCode": status_code(envelope),
        "headers": {
            "Content-Type": "application/json",
            "Access-Control-Allow-Origin": "*",
        },
        "body": serde_json::to_string(envelope)?,
    }))
}

/// Proxy response for a request whose bearer token was not accepted.
///
/// Sent for both event sources, before the payload is looked at, so it never
/// carries a taxonomy code.
pub fn auth_rejection() -> Value {
    let body = json!({
        "success": false,
        "error": "Authentication failed",
        "error_type": "AuthenticationError",
    });
    json!({
        "statusCode": 403,
        "headers": {
            "Content-Type": "application/json",
            "Access-Control-Allow-Origin": "*",
        },
        "body": body.to_string(),
    })
}
