//! Object fetch: resolve a [`DocumentReference`] to bytes.
//!
//! The store itself is a boundary; [`ObjectStore`] implementations report a
//! [`FetchError`] and this stage turns it into the matching
//! [`ProcessingError`]. The whole fetch is bounded by a timeout so a stalled
//! body stream surfaces as a timeout rather than eating the invocation
//! deadline.

use super::request::DocumentReference;
use crate::error::{FetchError, ProcessingError};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Something that can return the bytes of a stored object.
pub trait ObjectStore: Send + Sync {
    fn fetch(
        &self,
        doc: &DocumentReference,
    ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// Fetch `doc` from `store` within `timeout`.
pub async fn fetch_document<S: ObjectStore>(
    store: &S,
    doc: &DocumentReference,
    timeout: Duration,
) -> Result<Vec<u8>, ProcessingError> {
    let secs = timeout.as_secs();
    let bytes = match tokio::time::timeout(timeout, store.fetch(doc)).await {
        Ok(result) => result.map_err(|e| map_fetch_error(e, doc))?,
        Err(_) => return Err(ProcessingError::StoreTimeout { secs }),
    };
    info!("Fetched {} ({} bytes)", doc, bytes.len());
    Ok(bytes)
}

fn map_fetch_error(e: FetchError, doc: &DocumentReference) -> ProcessingError {
    match e {
        FetchError::ObjectNotFound => ProcessingError::ObjectNotFound {
            bucket: doc.bucket.clone(),
            key: doc.key.clone(),
        },
        FetchError::BucketNotFound => ProcessingError::BucketNotFound {
            bucket: doc.bucket.clone(),
        },
        FetchError::AccessDenied(detail) => ProcessingError::AccessDenied {
            bucket: doc.bucket.clone(),
            key: doc.key.clone(),
            detail,
        },
        FetchError::Timeout { secs } => ProcessingError::StoreTimeout { secs },
        FetchError::Other(detail) => ProcessingError::DownloadFailed { detail },
    }
}

// ── Local directory store ────────────────────────────────────────────────────

/// Serves `s3://bucket/key` from `<root>/bucket/key`.
///
/// Used by the CLI for offline runs and by tests.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `doc` under the root, or `None` when the key would escape it.
    fn object_path(&self, doc: &DocumentReference) -> Option<PathBuf> {
        let key = Path::new(&doc.key);
        let contained = key
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        contained.then(|| self.root.join(&doc.bucket).join(key))
    }
}

impl ObjectStore for DirectoryStore {
    async fn fetch(&self, doc: &DocumentReference) -> Result<Vec<u8>, FetchError> {
        let bucket_dir = self.root.join(&doc.bucket);
        match tokio::fs::metadata(&bucket_dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(FetchError::BucketNotFound),
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(FetchError::BucketNotFound),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Err(FetchError::AccessDenied(e.to_string()))
            }
            Err(e) => return Err(FetchError::Other(e.to_string())),
        }

        let path = self
            .object_path(doc)
            .ok_or_else(|| FetchError::AccessDenied("key escapes the bucket directory".into()))?;
        debug!("Reading {}", path.display());

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(FetchError::ObjectNotFound),
            // A directory in place of the object is a missing object.
            Err(_) if path.is_dir() => Err(FetchError::ObjectNotFound),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                Err(FetchError::AccessDenied(e.to_string()))
            }
            Err(e) => Err(FetchError::Other(e.to_string())),
        }
    }
}
