//! Content extraction: walk pages one at a time, producing page markdown,
//! word geometry and per-page structure.
//!
//! ## Why one page at a time?
//!
//! Each [`EnginePage`] is loaded, rendered to markdown, converted to output
//! word boxes and dropped before the next is loaded. Only the output grows
//! with page count, and that growth is charged against the memory budget
//! after every page.
//!
//! ## Stopping early
//!
//! The extractor runs on a blocking thread the async side cannot interrupt.
//! Before every page it checks the invocation deadline and the cancellation
//! flag the orchestrator raises when it stops waiting, so an abandoned run
//! releases the document at the next page boundary. Work done on earlier
//! pages is discarded on any failure.

use super::geometry;
use super::postprocess::clean_markdown;
use super::tables::{detect_tables, lines_of, Table};
use crate::config::GraphicsMode;
use crate::engine::{EngineDocument, EngineError, EnginePage};
use crate::error::ProcessingError;
use crate::output::{ExtractionResult, PageStructure, TableData};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::debug;

/// Rough serialized size of one word record, used for budget accounting.
const WORD_RECORD_BYTES: u64 = 256;

/// Knobs for one extraction run.
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions<'a> {
    pub graphics_mode: GraphicsMode,
    /// Stop before starting a page after this instant.
    pub deadline: Option<Instant>,
    /// Stop before starting a page once this is set.
    pub cancelled: Option<&'a AtomicBool>,
    pub memory_budget_bytes: u64,
    /// Size of the input document; counts against the budget.
    pub file_size: u64,
}

impl ExtractOptions<'_> {
    /// Why the next page must not be started, if it must not.
    fn stop_reason(&self, page_no: usize, page_count: usize) -> Option<ProcessingError> {
        if self.cancelled.is_some_and(|c| c.load(Ordering::SeqCst)) {
            return Some(ProcessingError::EngineTimeout {
                detail: format!("abandoned before page {} of {}", page_no, page_count),
            });
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ProcessingError::EngineTimeout {
                detail: format!("deadline reached before page {} of {}", page_no, page_count),
            }),
            _ => None,
        }
    }
}

/// One page rendered for output.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub markdown: String,
    pub structure: PageStructure,
}

impl RenderedPage {
    /// Approximate serialized size.
    fn size_bytes(&self) -> u64 {
        let cells: usize = self
            .structure
            .tables
            .iter()
            .flat_map(|t| t.data.iter().flatten())
            .map(String::len)
            .sum();
        (self.markdown.len() + self.structure.text.len() + cells) as u64
    }
}

/// Extract every page of `doc`.
pub fn extract_document(
    doc: &mut dyn EngineDocument,
    opts: &ExtractOptions<'_>,
) -> Result<ExtractionResult, ProcessingError> {
    let page_count = doc.page_count();
    let mut markdown = String::new();
    let mut words = Vec::new();
    let mut structured = Vec::with_capacity(page_count);
    let mut used = opts.file_size;

    for index in 0..page_count {
        let page_no = index + 1;
        if let Some(reason) = opts.stop_reason(page_no, page_count) {
            return Err(reason);
        }

        let page = doc
            .load_page(index)
            .map_err(|e| map_page_error(e, page_no))?;

        let rendered = render_page(&page, opts.graphics_mode);
        let page_words = geometry::page_words(&page);
        debug!(
            "Page {}/{}: {} words, {} tables, {} markdown bytes",
            page_no,
            page_count,
            page_words.len(),
            rendered.structure.tables.len(),
            rendered.markdown.len()
        );

        used += rendered.size_bytes() + page_words.len() as u64 * WORD_RECORD_BYTES;
        if used > opts.memory_budget_bytes {
            return Err(ProcessingError::MemoryLimit {
                detail: format!(
                    "output after page {} needs ~{} bytes, budget is {} bytes",
                    page_no, used, opts.memory_budget_bytes
                ),
            });
        }

        markdown.push_str(&rendered.markdown);
        structured.push(rendered.structure);
        words.extend(page_words);
    }

    Ok(ExtractionResult {
        markdown_text: clean_markdown(&markdown),
        word_bounding_boxes: words,
        structured_data: structured,
    })
}

/// Map an engine failure raised while reading page `page_no`.
fn map_page_error(e: EngineError, page_no: usize) -> ProcessingError {
    match e {
        EngineError::Timeout(detail) => ProcessingError::EngineTimeout { detail },
        EngineError::MemoryExhausted(detail) => ProcessingError::MemoryLimit { detail },
        EngineError::Unavailable(detail) => ProcessingError::Internal(detail),
        other => ProcessingError::ExtractionFailed {
            page: Some(page_no),
            detail: other.to_string(),
        },
    }
}

fn table_data(table: &Table) -> TableData {
    TableData {
        rows: table.rows.len(),
        cols: table.cols(),
        bbox: [table.bbox.x0, table.bbox.y0, table.bbox.x1, table.bbox.y1],
        data: table.rows.clone(),
    }
}

/// Markdown and structure for one page. The markdown starts with the page
/// marker, then the page's tables, then the remaining lines.
pub fn render_page(page: &EnginePage, mode: GraphicsMode) -> RenderedPage {
    let mut markdown = format!("\n## Page {}\n\n", page.index + 1);
    let lines = lines_of(&page.words);

    let tables: Vec<Table> = match mode {
        GraphicsMode::Tables => detect_tables(&lines),
        GraphicsMode::Text => Vec::new(),
    };
    for (k, table) in tables.iter().enumerate() {
        markdown.push_str(&format!("\n### Table {}\n\n", k + 1));
        markdown.push_str(&table.to_markdown());
        markdown.push('\n');
    }

    let mut text = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if tables.iter().any(|t| t.covers(i)) {
            continue;
        }
        let line = line.text();
        let line = line.trim();
        if !line.is_empty() {
            markdown.push_str(line);
            markdown.push('\n');
            text.push(line.to_string());
        }
    }

    RenderedPage {
        markdown,
        structure: PageStructure {
            tables: tables.iter().map(table_data).collect(),
            text: text.join("\n"),
        },
    }
}
