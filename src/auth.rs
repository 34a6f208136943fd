//! Optional bearer-token check.
//!
//! When `AUTH_SECRET_ID` is configured, every event must carry a token equal
//! to the `accessKey` field of that Secrets Manager secret. API Gateway events
//! carry it in the `Authorization` header; direct invocations may put it in a
//! top-level `authorization` field. A leading `Bearer ` is stripped.
//!
//! The check runs before the payload is unwrapped or validated. A rejected
//! event gets [`crate::pipeline::assemble::auth_rejection`], never a taxonomy
//! envelope.

use crate::config::ServiceConfig;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::Client;
use serde_json::Value;
use thiserror::Error;

/// Why a token was not accepted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthError {
    #[error("no authorization token on the request")]
    MissingToken,

    #[error("authorization token does not match")]
    Mismatch,

    #[error("access key unavailable: {0}")]
    Secret(String),
}

/// Where the expected access key comes from.
#[async_trait]
pub trait SecretSource: Send + Sync {
    async fn access_key(&self) -> Result<String, AuthError>;
}

/// Access key read from AWS Secrets Manager on every check.
#[derive(Debug, Clone)]
pub struct SecretsManagerSource {
    client: Client,
    secret_id: String,
}

impl SecretsManagerSource {
    pub fn new(client: Client, secret_id: impl Into<String>) -> Self {
        Self {
            client,
            secret_id: secret_id.into(),
        }
    }

    /// `None` when the service has no `auth_secret_id`.
    pub fn from_shared(shared: &SdkConfig, config: &ServiceConfig) -> Option<Self> {
        let secret_id = config.auth_secret_id.as_ref()?;
        Some(Self::new(Client::new(shared), secret_id.clone()))
    }
}

#[async_trait]
impl SecretSource for SecretsManagerSource {
    async fn access_key(&self) -> Result<String, AuthError> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(&self.secret_id)
            .send()
            .await
            .map_err(|e| AuthError::Secret(DisplayErrorContext(&e).to_string()))?;
        let raw = output
            .secret_string()
            .ok_or_else(|| AuthError::Secret(format!("{} has no string value", self.secret_id)))?;
        access_key_from_secret(raw)
    }
}

/// Pull `accessKey` out of a secret's JSON string.
pub fn access_key_from_secret(raw: &str) -> Result<String, AuthError> {
    let secret: Value = serde_json::from_str(raw)
        .map_err(|e| AuthError::Secret(format!("secret is not JSON: {}", e)))?;
    match secret.get("accessKey").and_then(Value::as_str) {
        Some(key) if !key.is_empty() => Ok(key.to_string()),
        _ => Err(AuthError::Secret("secret has no accessKey".into())),
    }
}

/// The token a raw event presents, if any.
pub fn bearer_token(event: &Value) -> Option<&str> {
    let raw = match event.get("headers") {
        Some(headers) => headers
            .get("Authorization")
            .or_else(|| headers.get("authorization"))?,
        None => event.get("authorization")?,
    };
    let raw = raw.as_str()?;
    Some(raw.strip_prefix("Bearer ").unwrap_or(raw))
}

/// Accept `event` only if its token equals the current access key.
pub async fn verify(event: &Value, source: &dyn SecretSource) -> Result<(), AuthError> {
    let token = bearer_token(event)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)?;
    let expected = source.access_key().await?;
    if same_token(token.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(AuthError::Mismatch)
    }
}

/// Length-then-content comparison that does not stop at the first difference.
fn same_token(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
