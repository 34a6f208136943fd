//! Request validation.
//!
//! Accepts the raw invocation event as JSON. Two shapes arrive in practice:
//! the request object itself (direct invoke) and an API Gateway proxy event
//! carrying the request as a JSON string in `body`. [`unwrap_event`] tells
//! them apart; [`validate`] checks the request in a fixed order:
//!
//! 1. `s3_path` present and non-blank
//! 2. `graphics_mode`, if present, one of [`GraphicsMode`]
//! 3. `s3_path` parses as `s3://bucket/key`

use crate::config::GraphicsMode;
use crate::error::ProcessingError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;

static RE_S3_URI: Lazy<Regex> = Lazy::new(|| Regex::new(r"^s3://([^/]*)/(.*)$").unwrap());

/// S3 bucket naming rules (lowercase, digits, dots, hyphens; 3–63 chars).
static RE_BUCKET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").unwrap());

/// A validated pointer to a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentReference {
    pub bucket: String,
    pub key: String,
}

impl DocumentReference {
    /// Parse `s3://bucket/key`.
    pub fn parse(path: &str) -> Result<Self, ProcessingError> {
        let invalid = |reason: &str| ProcessingError::InvalidS3Path {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        let caps = RE_S3_URI
            .captures(path)
            .ok_or_else(|| invalid("expected s3://bucket/key"))?;
        let bucket = &caps[1];
        let key = &caps[2];

        if bucket.is_empty() {
            return Err(invalid("bucket is empty"));
        }
        if !RE_BUCKET.is_match(bucket) || bucket.contains("..") {
            return Err(invalid("bucket name is not a valid S3 bucket name"));
        }
        if key.is_empty() {
            return Err(invalid("key is empty"));
        }

        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

impl fmt::Display for DocumentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub document: DocumentReference,
    pub graphics_mode: GraphicsMode,
}

/// How the event reached the function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    /// The event is the request.
    Direct,
    /// API Gateway proxy event; the response must be wrapped.
    Gateway,
}

/// Separate the request payload from its transport wrapper.
///
/// A gateway body that is not a JSON object becomes an empty request, which
/// then fails validation as a missing `s3_path`.
pub fn unwrap_event(event: Value) -> (Value, EventSource) {
    let is_gateway = event.as_object().is_some_and(|obj| {
        obj.contains_key("body")
            && (obj.contains_key("httpMethod")
                || obj.contains_key("requestContext")
                || obj.contains_key("headers")
                || !obj.contains_key("s3_path"))
    });
    if !is_gateway {
        return (event, EventSource::Direct);
    }

    let body = match event {
        Value::Object(mut obj) => obj.remove("body").unwrap_or(Value::Null),
        _ => Value::Null,
    };
    let payload = match body {
        Value::String(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(v @ Value::Object(_)) => v,
            _ => Value::Object(Map::new()),
        },
        v @ Value::Object(_) => v,
        _ => Value::Object(Map::new()),
    };
    (payload, EventSource::Gateway)
}

/// Validate a request payload.
pub fn validate(payload: &Value) -> Result<ExtractionRequest, ProcessingError> {
    let s3_path = match payload.get("s3_path") {
        None | Some(Value::Null) => return Err(ProcessingError::MissingS3Path),
        Some(Value::String(s)) if s.trim().is_empty() => {
            return Err(ProcessingError::MissingS3Path)
        }
        Some(v) => v,
    };

    let graphics_mode = match payload.get("graphics_mode") {
        None | Some(Value::Null) => GraphicsMode::default(),
        Some(Value::String(s)) => {
            s.trim()
                .parse()
                .map_err(|value| ProcessingError::InvalidGraphicsMode {
                    value,
                    expected: GraphicsMode::expected(),
                })?
        }
        Some(other) => {
            return Err(ProcessingError::InvalidGraphicsMode {
                value: other.to_string(),
                expected: GraphicsMode::expected(),
            })
        }
    };

    let document = match s3_path {
        Value::String(s) => DocumentReference::parse(s.trim())?,
        other => {
            return Err(ProcessingError::InvalidS3Path {
                path: other.to_string(),
                reason: "s3_path must be a string".into(),
            })
        }
    };

    Ok(ExtractionRequest {
        document,
        graphics_mode,
    })
}
