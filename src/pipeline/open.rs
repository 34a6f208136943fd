//! Document opening: byte checks before the engine sees the buffer, engine
//! open-failure mapping, and the [`DocumentInfo`] read once the document is
//! open.

use crate::engine::{EngineDocument, EngineError};
use crate::error::ProcessingError;
use crate::output::DocumentInfo;

/// Reject buffers the engine should never be handed.
pub fn check_bytes(bytes: &[u8], memory_budget_bytes: u64) -> Result<(), ProcessingError> {
    if bytes.is_empty() {
        return Err(ProcessingError::EmptyDocument);
    }
    let size = bytes.len() as u64;
    if size > memory_budget_bytes {
        return Err(ProcessingError::MemoryLimit {
            detail: format!(
                "document is {} bytes, budget is {} bytes",
                size, memory_budget_bytes
            ),
        });
    }
    Ok(())
}

/// Map an engine failure raised while opening.
pub fn map_open_error(e: EngineError) -> ProcessingError {
    match e {
        EngineError::Encrypted(detail) => ProcessingError::Encrypted { detail },
        EngineError::Corrupt(detail) => ProcessingError::Corrupt { detail },
        EngineError::Failed(detail) => ProcessingError::ParseFailed { detail },
        EngineError::Timeout(detail) => ProcessingError::EngineTimeout { detail },
        EngineError::MemoryExhausted(detail) => ProcessingError::MemoryLimit { detail },
        EngineError::Unavailable(detail) => ProcessingError::Internal(detail),
    }
}

/// Read page count and information strings from an open document.
pub fn describe(doc: &dyn EngineDocument, file_size: u64) -> DocumentInfo {
    let meta = doc.metadata();
    DocumentInfo {
        page_count: doc.page_count(),
        file_size,
        title: meta.title,
        author: meta.author,
        subject: meta.subject,
        creator: meta.creator,
    }
}
