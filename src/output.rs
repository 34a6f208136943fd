//! Response data model.
//!
//! These types are the JSON contract with the caller. Field names are wire
//! names; do not rename them.

use crate::taxonomy::{ErrorCategory, ErrorCode, ProcessingStage};
use serde::{Deserialize, Serialize};

/// Facts about an opened document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub page_count: usize,
    /// Size of the stored object in bytes.
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
}

/// Axis-aligned box, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageDimensions {
    pub width: f64,
    pub height: f64,
}

/// One word with its position on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordBoundingBox {
    /// 1-based page number.
    pub page: usize,
    pub text: String,
    /// Normalized to `[0, 1]` by page width and height.
    pub bbox: BoundingBox,
    /// `bbox` scaled back by `page_dimensions`.
    pub absolute_bbox: BoundingBox,
    pub page_dimensions: PageDimensions,
    pub block_no: u32,
    pub line_no: u32,
    pub word_no: u32,
}

/// A table found on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub rows: usize,
    pub cols: usize,
    /// `[x0, y0, x1, y1]` in page points, top-left origin.
    pub bbox: [f64; 4],
    /// Cell texts, header row first.
    pub data: Vec<Vec<String>>,
}

/// Per-page structure: detected tables plus the text outside them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageStructure {
    pub tables: Vec<TableData>,
    /// Non-table lines, newline-separated.
    pub text: String,
}

/// Output of a completed extraction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractionResult {
    pub markdown_text: String,
    /// Reading order: page, block, line, word.
    pub word_bounding_boxes: Vec<WordBoundingBox>,
    /// One entry per page, in page order.
    pub structured_data: Vec<PageStructure>,
}

impl ExtractionResult {
    pub fn word_count(&self) -> usize {
        self.word_bounding_boxes.len()
    }
}

// ── Envelope ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub document_info: DocumentInfo,
    pub markdown_text: String,
    pub word_bounding_boxes: Vec<WordBoundingBox>,
    pub word_count: usize,
    pub structured_data: Vec<PageStructure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureResponse {
    pub success: bool,
    /// `[<code>] <summary>`. Callers parse the bracketed prefix.
    pub error: String,
    /// Legacy failure family kept for older consumers.
    pub error_type: &'static str,
    pub error_code: ErrorCode,
    pub error_category: ErrorCategory,
    pub error_summary: &'static str,
    pub error_origin: &'static str,
    pub is_timeout: bool,
    pub processing_stage: ProcessingStage,
    pub was_sent_to_ocr: bool,
    pub ocr_service: String,
    pub processing_provider: String,
    pub processed_with_pymupdf: bool,
    pub external_ocr_used: bool,
    pub route_outcome: &'static str,
    pub fallback_to_external_ocr_recommended: bool,
    pub is_retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

/// What one invocation returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseEnvelope {
    Success(SuccessResponse),
    Failure(Box<FailureResponse>),
}

impl ResponseEnvelope {
    pub fn is_success(&self) -> bool {
        matches!(self, ResponseEnvelope::Success(_))
    }

    pub fn success(&self) -> Option<&SuccessResponse> {
        match self {
            ResponseEnvelope::Success(s) => Some(s),
            ResponseEnvelope::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureResponse> {
        match self {
            ResponseEnvelope::Failure(f) => Some(f),
            ResponseEnvelope::Success(_) => None,
        }
    }
}
