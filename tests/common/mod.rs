//! In-memory object store and scripted PDF engine shared by the integration
//! tests.

#![allow(dead_code)]

use ocr_lambda::engine::{EngineWord, NativeRect, RawMetadata};
use ocr_lambda::{
    DocumentReference, EngineDocument, EngineError, EnginePage, FetchError, ObjectStore,
    PdfEngine, ServiceConfig,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ── Test doubles ─────────────────────────────────────────────────────────────

/// Objects keyed by bucket, then key.
#[derive(Default)]
pub struct MemoryStore {
    buckets: HashMap<String, HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn with(mut self, bucket: &str, key: &str, bytes: &[u8]) -> Self {
        self.buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), bytes.to_vec());
        self
    }
}

impl ObjectStore for MemoryStore {
    async fn fetch(&self, doc: &DocumentReference) -> Result<Vec<u8>, FetchError> {
        let bucket = self
            .buckets
            .get(&doc.bucket)
            .ok_or(FetchError::BucketNotFound)?;
        bucket
            .get(&doc.key)
            .cloned()
            .ok_or(FetchError::ObjectNotFound)
    }
}

/// Always fails the same way.
pub struct FailingStore(pub FetchError);

impl ObjectStore for FailingStore {
    async fn fetch(&self, _doc: &DocumentReference) -> Result<Vec<u8>, FetchError> {
        Err(self.0.clone())
    }
}

#[derive(Clone)]
pub struct ScriptedDoc {
    pub metadata: RawMetadata,
    pub pages: Vec<Result<Vec<EngineWord>, EngineError>>,
    pub page_delay: Option<Duration>,
    /// Pages loaded so far, shared by every clone.
    pub loads: Arc<AtomicUsize>,
}

impl EngineDocument for ScriptedDoc {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn metadata(&self) -> RawMetadata {
        self.metadata.clone()
    }

    fn load_page(&mut self, index: usize) -> Result<EnginePage, EngineError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.page_delay {
            std::thread::sleep(delay);
        }
        let words = self.pages[index].clone()?;
        Ok(EnginePage {
            index,
            width: 612.0,
            height: 792.0,
            words,
        })
    }
}

/// Engine whose open outcome is fixed up front.
#[derive(Clone)]
pub struct ScriptedEngine {
    pub open: Result<ScriptedDoc, EngineError>,
    pub panic_on_open: bool,
}

impl ScriptedEngine {
    pub fn opens(doc: ScriptedDoc) -> Self {
        Self {
            open: Ok(doc),
            panic_on_open: false,
        }
    }

    pub fn fails(err: EngineError) -> Self {
        Self {
            open: Err(err),
            panic_on_open: false,
        }
    }
}

impl PdfEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn with_document<R>(
        &self,
        _bytes: &[u8],
        visit: impl FnOnce(&mut dyn EngineDocument) -> R,
    ) -> Result<R, EngineError> {
        if self.panic_on_open {
            panic!("engine crashed");
        }
        let mut doc = self.open.clone()?;
        Ok(visit(&mut doc))
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

pub fn word(text: &str, x0: f64, y0: f64, line_no: u32, word_no: u32) -> EngineWord {
    EngineWord {
        text: text.to_string(),
        rect: NativeRect {
            x0,
            y0,
            x1: x0 + text.len() as f64 * 6.0,
            y1: y0 + 12.0,
        },
        block_no: 0,
        line_no,
        word_no,
    }
}

pub fn single_word_doc() -> ScriptedDoc {
    ScriptedDoc {
        metadata: RawMetadata {
            title: Some("Single".into()),
            ..Default::default()
        },
        pages: vec![Ok(vec![word("Document", 72.0, 72.0, 0, 0)])],
        page_delay: None,
        loads: Arc::default(),
    }
}

pub fn multi_page_doc() -> ScriptedDoc {
    ScriptedDoc {
        metadata: RawMetadata::default(),
        pages: vec![
            Ok(vec![
                word("Quarterly", 72.0, 72.0, 0, 0),
                word("report", 130.0, 72.0, 0, 1),
                word("Revenue", 72.0, 90.0, 1, 0),
                word("grew", 118.0, 90.0, 1, 1),
            ]),
            Ok(vec![]),
            Ok(vec![word("Appendix", 72.0, 700.0, 0, 0)]),
        ],
        page_delay: None,
        loads: Arc::default(),
    }
}

pub const PDF_BYTES: &[u8] = b"%PDF-1.4 scripted";

pub fn config() -> ServiceConfig {
    ServiceConfig::builder().build().unwrap()
}

pub fn store() -> MemoryStore {
    MemoryStore::default()
        .with("docs-bucket", "inbox/report.pdf", PDF_BYTES)
        .with("docs-bucket", "empty.pdf", b"")
}

pub fn report_request() -> Value {
    json!({ "s3_path": "s3://docs-bucket/inbox/report.pdf" })
}
