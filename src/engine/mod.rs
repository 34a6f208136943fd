//! The PDF engine boundary.
//!
//! The pipeline never talks to a native library directly. It sees a
//! [`PdfEngine`] that can open a byte buffer and lend out an
//! [`EngineDocument`] for the duration of a closure, plus a small owned page
//! model ([`EnginePage`]) that holds everything extraction needs.
//!
//! Pages are copied into owned data one at a time, so the native page handle
//! is released before the next page is loaded and peak memory does not grow
//! with page count.

pub mod layout;
pub mod pdfium;

use thiserror::Error;

pub use self::pdfium::PdfiumEngine;

/// A rectangle in engine-native units (PDF points), top-left origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NativeRect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl NativeRect {
    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn union(&self, other: &NativeRect) -> NativeRect {
        NativeRect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// One word as the engine sequences it.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineWord {
    pub text: String,
    pub rect: NativeRect,
    pub block_no: u32,
    pub line_no: u32,
    pub word_no: u32,
}

/// Owned content of a single page.
#[derive(Debug, Clone, PartialEq)]
pub struct EnginePage {
    /// 0-based page index.
    pub index: usize,
    pub width: f64,
    pub height: f64,
    /// Words in reading order (block, line, word).
    pub words: Vec<EngineWord>,
}

/// Document information strings as the engine reports them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
}

/// Failures reported by the engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("encrypted: {0}")]
    Encrypted(String),

    #[error("corrupt: {0}")]
    Corrupt(String),

    #[error("{0}")]
    Failed(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("out of memory: {0}")]
    MemoryExhausted(String),

    /// The engine itself could not be initialised (library missing, bind
    /// failure). Not a property of the document.
    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

/// An opened document.
pub trait EngineDocument {
    fn page_count(&self) -> usize;

    fn metadata(&self) -> RawMetadata;

    /// Load page `index` (0-based) and copy its content out.
    fn load_page(&mut self, index: usize) -> Result<EnginePage, EngineError>;
}

/// Something that can open PDF bytes.
///
/// Implementations are called from a blocking thread.
pub trait PdfEngine: Send + Sync + 'static {
    /// Short identifier reported as `processing_provider`.
    fn name(&self) -> &'static str;

    /// Open `bytes` and run `visit` against the document. The document and
    /// every engine resource behind it are released before this returns.
    ///
    /// `Err` means the document could not be opened; failures inside `visit`
    /// travel in `R`.
    fn with_document<R>(
        &self,
        bytes: &[u8],
        visit: impl FnOnce(&mut dyn EngineDocument) -> R,
    ) -> Result<R, EngineError>;
}
