//! AWS Lambda custom-runtime loop over the Runtime API.
//!
//! The protocol is three HTTP calls against `AWS_LAMBDA_RUNTIME_API`:
//!
//! * `GET  /2018-06-01/runtime/invocation/next` blocks until an event arrives
//!   and returns it with the request id and deadline in headers;
//! * `POST /2018-06-01/runtime/invocation/{id}/response` delivers the result;
//! * `POST /2018-06-01/runtime/init/error` (or `/invocation/{id}/error`)
//!   reports failures that are not part of the response contract.
//!
//! Every extraction outcome, including failures, is a normal response. The
//! error endpoints are only used when no envelope can be produced at all.

use crate::engine::PdfEngine;
use crate::error::ServiceError;
use crate::pipeline::fetch::ObjectStore;
use crate::process::{InvocationContext, Processor};
use serde_json::{json, Value};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};

const API_VERSION: &str = "2018-06-01";
const HEADER_REQUEST_ID: &str = "Lambda-Runtime-Aws-Request-Id";
const HEADER_DEADLINE_MS: &str = "Lambda-Runtime-Deadline-Ms";

/// One event handed out by the Runtime API.
#[derive(Debug, Clone)]
pub struct NextInvocation {
    pub request_id: String,
    /// Deadline in milliseconds since the Unix epoch.
    pub deadline_ms: Option<u64>,
    pub event: Value,
}

/// Client for the Lambda Runtime API.
#[derive(Debug, Clone)]
pub struct RuntimeClient {
    http: reqwest::Client,
    base: String,
}

impl RuntimeClient {
    /// `api` is the `host:port` from `AWS_LAMBDA_RUNTIME_API`.
    pub fn new(api: &str) -> Self {
        let api = api.trim_end_matches('/');
        let base = if api.starts_with("http://") || api.starts_with("https://") {
            format!("{}/{}/runtime", api, API_VERSION)
        } else {
            format!("http://{}/{}/runtime", api, API_VERSION)
        };
        Self {
            http: reqwest::Client::new(),
            base,
        }
    }

    pub fn from_env() -> Result<Self, ServiceError> {
        let api = std::env::var("AWS_LAMBDA_RUNTIME_API").map_err(|_| {
            ServiceError::InvalidConfig("AWS_LAMBDA_RUNTIME_API is not set".into())
        })?;
        Ok(Self::new(&api))
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// Block until the next event is available.
    pub async fn next_invocation(&self) -> Result<NextInvocation, ServiceError> {
        let url = format!("{}/invocation/next", self.base);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ServiceError::RuntimeApi(format!("GET {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::RuntimeApi(format!(
                "GET {} returned HTTP {}",
                url,
                response.status()
            )));
        }

        let headers = response.headers();
        let request_id = headers
            .get(HEADER_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                ServiceError::RuntimeApi(format!(
                    "next invocation has no {} header",
                    HEADER_REQUEST_ID
                ))
            })?;
        let deadline_ms = headers
            .get(HEADER_DEADLINE_MS)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let body = response
            .bytes()
            .await
            .map_err(|e| ServiceError::RuntimeApi(format!("reading event body: {}", e)))?;
        // A body that is not JSON is still a request; validation rejects it.
        let event = serde_json::from_slice(&body).unwrap_or(Value::Null);

        Ok(NextInvocation {
            request_id,
            deadline_ms,
            event,
        })
    }

    pub async fn post_response(&self, request_id: &str, body: &Value) -> Result<(), ServiceError> {
        let url = format!("{}/invocation/{}/response", self.base, request_id);
        self.post(&url, body).await
    }

    pub async fn post_invocation_error(
        &self,
        request_id: &str,
        err: &ServiceError,
    ) -> Result<(), ServiceError> {
        let url = format!("{}/invocation/{}/error", self.base, request_id);
        self.post(&url, &error_body(err)).await
    }

    pub async fn post_init_error(&self, err: &ServiceError) -> Result<(), ServiceError> {
        let url = format!("{}/init/error", self.base);
        self.post(&url, &error_body(err)).await
    }

    async fn post(&self, url: &str, body: &Value) -> Result<(), ServiceError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceError::RuntimeApi(format!("POST {}: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(ServiceError::RuntimeApi(format!(
                "POST {} returned HTTP {}",
                url,
                response.status()
            )));
        }
        Ok(())
    }
}

fn error_body(err: &ServiceError) -> Value {
    let error_type = match err {
        ServiceError::InvalidConfig(_) => "Runtime.InvalidConfig",
        ServiceError::RuntimeApi(_) => "Runtime.ApiError",
        ServiceError::Serialize(_) => "Runtime.SerializationError",
    };
    json!({ "errorMessage": err.to_string(), "errorType": error_type })
}

/// Convert the runtime's epoch deadline into a local [`Instant`], keeping
/// `margin` in reserve.
pub fn local_deadline(
    deadline_ms: Option<u64>,
    margin: Duration,
    now: SystemTime,
) -> Option<Instant> {
    let deadline_ms = deadline_ms?;
    let now_ms = now.duration_since(UNIX_EPOCH).ok()?.as_millis() as u64;
    let remaining =
        Duration::from_millis(deadline_ms.saturating_sub(now_ms)).saturating_sub(margin);
    Some(Instant::now() + remaining)
}

/// Serve invocations until the Runtime API stops handing them out.
///
/// Only a failed `next` call ends the loop. A response that cannot be posted
/// is logged and the loop moves on to the next event.
pub async fn run<St: ObjectStore, E: PdfEngine>(
    processor: &Processor<St, E>,
    client: &RuntimeClient,
) -> Result<(), ServiceError> {
    info!("Lambda runtime loop started ({})", client.base_url());

    loop {
        let next = client.next_invocation().await?;
        if let Err(e) = serve_invocation(processor, client, next).await {
            error!("Failed to deliver invocation result: {}", e);
        }
    }
}

/// Process one event and post its outcome.
pub async fn serve_invocation<St: ObjectStore, E: PdfEngine>(
    processor: &Processor<St, E>,
    client: &RuntimeClient,
    next: NextInvocation,
) -> Result<(), ServiceError> {
    debug!(request_id = %next.request_id, "Invocation received");
    let margin = Duration::from_millis(processor.config().deadline_margin_ms);
    let ctx = InvocationContext {
        request_id: Some(next.request_id.clone()),
        deadline: local_deadline(next.deadline_ms, margin, SystemTime::now()),
    };

    match processor.handle_event(next.event, &ctx).await {
        Ok(body) => client.post_response(&next.request_id, &body).await,
        Err(e) => {
            error!(request_id = %next.request_id, "Could not build a response: {}", e);
            if let Err(post_err) = client.post_invocation_error(&next.request_id, &e).await {
                warn!("Failed to report invocation error: {}", post_err);
            }
            Ok(())
        }
    }
}
