//! [`ObjectStore`] on Amazon S3 (or any S3-compatible endpoint).
//!
//! ## Missing bucket or missing key?
//!
//! `GetObject` reports both as a 404. The distinction is taken from the
//! service's structured error code first (`NoSuchKey`, `NoSuchBucket`,
//! `AccessDenied`), then from the HTTP status, and only then from the message
//! text. The string fallback exists for S3-compatible servers that answer
//! with a bare status.

use super::fetch::ObjectStore;
use super::request::DocumentReference;
use crate::config::ServiceConfig;
use crate::error::FetchError;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::Client;
use std::time::Duration;
use tracing::{debug, info};

/// S3 object store.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    timeout_secs: u64,
}

impl S3Store {
    pub fn new(client: Client, timeout_secs: u64) -> Self {
        Self {
            client,
            timeout_secs,
        }
    }

    /// Build a client from the SDK default chain plus the service overrides.
    pub async fn from_config(config: &ServiceConfig) -> Self {
        Self::from_shared(&load_sdk_config(config).await, config)
    }

    /// Build a client from an already loaded SDK configuration.
    pub fn from_shared(shared: &SdkConfig, config: &ServiceConfig) -> Self {
        let mut builder = aws_sdk_s3::config::Builder::from(shared);
        if let Some(endpoint) = &config.s3_endpoint {
            info!("Using custom S3 endpoint {}", endpoint);
            // Required for MinIO and other S3-compatible services
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self::new(Client::from_conf(builder.build()), config.s3_timeout_secs)
    }
}

/// SDK default chain with the service's region and operation timeout.
pub async fn load_sdk_config(config: &ServiceConfig) -> SdkConfig {
    let timeout = Duration::from_secs(config.s3_timeout_secs);
    let mut loader = aws_config::defaults(BehaviorVersion::latest()).timeout_config(
        TimeoutConfig::builder()
            .operation_timeout(timeout)
            .build(),
    );
    if let Some(region) = &config.s3_region {
        loader = loader.region(Region::new(region.clone()));
    }
    loader.load().await
}

impl ObjectStore for S3Store {
    async fn fetch(&self, doc: &DocumentReference) -> Result<Vec<u8>, FetchError> {
        debug!("GetObject {}", doc);
        let response = self
            .client
            .get_object()
            .bucket(&doc.bucket)
            .key(&doc.key)
            .send()
            .await
            .map_err(|e| self.map_sdk_error(e))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| FetchError::Other(format!("Failed to read object body: {}", e)))?;

        Ok(data.into_bytes().to_vec())
    }
}

impl S3Store {
    fn map_sdk_error(&self, err: SdkError<GetObjectError>) -> FetchError {
        match &err {
            SdkError::TimeoutError(_) => FetchError::Timeout {
                secs: self.timeout_secs,
            },
            SdkError::DispatchFailure(failure) if failure.is_timeout() => FetchError::Timeout {
                secs: self.timeout_secs,
            },
            _ => {
                let code = err.as_service_error().and_then(|e| e.code());
                let status = err.raw_response().map(|r| r.status().as_u16());
                classify_store_error(code, status, &DisplayErrorContext(&err).to_string())
            }
        }
    }
}

/// Decide what a failed `GetObject` means.
pub fn classify_store_error(code: Option<&str>, status: Option<u16>, message: &str) -> FetchError {
    match code {
        Some("NoSuchKey") | Some("NotFound") => return FetchError::ObjectNotFound,
        Some("NoSuchBucket") => return FetchError::BucketNotFound,
        Some("AccessDenied" | "Forbidden" | "AllAccessDisabled" | "InvalidAccessKeyId"
        | "SignatureDoesNotMatch" | "AccountProblem") => {
            return FetchError::AccessDenied(message.to_string())
        }
        _ => {}
    }

    match status {
        Some(404)
            if message.contains("NoSuchBucket") || message.contains("bucket does not exist") =>
        {
            FetchError::BucketNotFound
        }
        Some(404) => FetchError::ObjectNotFound,
        Some(403) => FetchError::AccessDenied(message.to_string()),
        _ if message.contains("NoSuchBucket") => FetchError::BucketNotFound,
        _ if message.contains("NoSuchKey") || message.contains("404") => {
            FetchError::ObjectNotFound
        }
        _ if message.contains("AccessDenied") || message.contains("403") => {
            FetchError::AccessDenied(message.to_string())
        }
        _ => FetchError::Other(message.to_string()),
    }
}
