//! [`PdfEngine`] backed by PDFium via `pdfium-render`.
//!
//! ## Why bind per call?
//!
//! A `Pdfium` handle and every document borrowed from it are `!Send`, so they
//! cannot live in the shared processor. The engine keeps only the library
//! search paths; each invocation binds inside its `spawn_blocking` thread and
//! drops everything on return. Path resolution is cached by `pdfium-auto`, so
//! the per-call cost is a `dlopen` of an already-loaded library.
//!
//! ## Coordinates
//!
//! PDFium uses a bottom-left origin. Words leave this module with a top-left
//! origin (`y0 = height - top`, `y1 = height - bottom`).

use super::layout::{group_words, PositionedChar};
use super::{EngineDocument, EngineError, EnginePage, NativeRect, PdfEngine, RawMetadata};
use crate::config::ServiceConfig;
use pdfium_auto::SearchPaths;
use pdfium_render::prelude::*;
use tracing::debug;

/// PDFium-backed engine.
#[derive(Debug, Clone)]
pub struct PdfiumEngine {
    search: SearchPaths,
}

impl PdfiumEngine {
    pub fn new(search: SearchPaths) -> Self {
        Self { search }
    }

    /// Standard Lambda search order, with the configured overrides applied.
    pub fn from_config(config: &ServiceConfig) -> Self {
        let search = SearchPaths::from_env().with_download(config.allow_pdfium_download);
        let search = match &config.pdfium_library_path {
            Some(path) => search.with_explicit(path.clone()),
            None => search,
        };
        Self::new(search)
    }
}

impl Default for PdfiumEngine {
    fn default() -> Self {
        Self::new(SearchPaths::from_env())
    }
}

impl PdfEngine for PdfiumEngine {
    fn name(&self) -> &'static str {
        "pdfium"
    }

    fn with_document<R>(
        &self,
        bytes: &[u8],
        visit: impl FnOnce(&mut dyn EngineDocument) -> R,
    ) -> Result<R, EngineError> {
        let pdfium = pdfium_auto::bind_pdfium(&self.search)
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;

        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(map_load_error)?;

        let mut doc = PdfiumDocument { document };
        Ok(visit(&mut doc))
    }
}

/// Sort a PDFium load failure into the engine's failure kinds.
fn map_load_error(e: PdfiumError) -> EngineError {
    classify_load_error(format!("{:?}", e))
}

fn classify_load_error(detail: String) -> EngineError {
    if detail.contains("Password") || detail.contains("Security") {
        EngineError::Encrypted(detail)
    } else if detail.contains("Format") || detail.contains("File") {
        EngineError::Corrupt(detail)
    } else if detail.contains("Memory") {
        EngineError::MemoryExhausted(detail)
    } else {
        EngineError::Failed(detail)
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl EngineDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn metadata(&self) -> RawMetadata {
        let metadata = self.document.metadata();

        let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
            metadata.get(tag).and_then(|t| {
                let v = t.value().trim().to_string();
                if v.is_empty() {
                    None
                } else {
                    Some(v)
                }
            })
        };

        RawMetadata {
            title: get_meta(PdfDocumentMetadataTagType::Title),
            author: get_meta(PdfDocumentMetadataTagType::Author),
            subject: get_meta(PdfDocumentMetadataTagType::Subject),
            creator: get_meta(PdfDocumentMetadataTagType::Creator),
        }
    }

    fn load_page(&mut self, index: usize) -> Result<EnginePage, EngineError> {
        let page = self
            .document
            .pages()
            .get(index as u16)
            .map_err(|e| EngineError::Failed(format!("{:?}", e)))?;

        let width = page.width().value as f64;
        let height = page.height().value as f64;

        let text = page
            .text()
            .map_err(|e| EngineError::Failed(format!("{:?}", e)))?;

        let chars: Vec<PositionedChar> = text
            .chars()
            .iter()
            .filter_map(|c| {
                let ch = c.unicode_char()?;
                let rect = c.loose_bounds().ok().map(|r| NativeRect {
                    x0: r.left.value as f64,
                    y0: height - r.top.value as f64,
                    x1: r.right.value as f64,
                    y1: height - r.bottom.value as f64,
                });
                Some(PositionedChar::new(ch, rect))
            })
            .collect();

        let words = group_words(chars);
        debug!(
            "Page {}: {}x{} pt, {} words",
            index + 1,
            width,
            height,
            words.len()
        );

        Ok(EnginePage {
            index,
            width,
            height,
            words,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_errors_are_sorted_by_kind() {
        assert!(matches!(
            classify_load_error("PdfiumLibraryInternalError(PasswordError)".into()),
            EngineError::Encrypted(_)
        ));
        assert!(matches!(
            classify_load_error("PdfiumLibraryInternalError(SecurityError)".into()),
            EngineError::Encrypted(_)
        ));
        assert!(matches!(
            classify_load_error("PdfiumLibraryInternalError(FormatError)".into()),
            EngineError::Corrupt(_)
        ));
        assert!(matches!(
            classify_load_error("PdfiumLibraryInternalError(Unknown)".into()),
            EngineError::Failed(_)
        ));
    }

    #[test]
    fn engine_reports_its_name() {
        assert_eq!(PdfiumEngine::default().name(), "pdfium");
    }

    #[test]
    fn config_overrides_reach_search_paths() {
        let config = ServiceConfig::builder()
            .pdfium_library_path("/opt/custom/libpdfium.so")
            .allow_pdfium_download(true)
            .build()
            .unwrap();
        let engine = PdfiumEngine::from_config(&config);
        assert_eq!(
            engine.search.explicit.as_deref(),
            Some(std::path::Path::new("/opt/custom/libpdfium.so"))
        );
        assert!(engine.search.allow_download);
    }
}
