//! Service configuration.
//!
//! Everything the service can be tuned with lives in [`ServiceConfig`], built
//! either through [`ServiceConfig::builder()`] or from the Lambda environment
//! with [`ServiceConfig::from_env()`]. Both paths end in the same validation.
//!
//! | Env var | Field | Default |
//! |---|---|---|
//! | `OCR_LAMBDA_SERVICE_NAME` | `service_name` | `ocr-lambda` |
//! | `OCR_LAMBDA_TIMEOUT_SECS` | `invocation_timeout_secs` | 840 |
//! | `OCR_LAMBDA_DEADLINE_MARGIN_MS` | `deadline_margin_ms` | 2000 |
//! | `OCR_LAMBDA_S3_TIMEOUT_SECS` | `s3_timeout_secs` | 60 |
//! | `OCR_LAMBDA_MEMORY_BUDGET_MB` | `memory_budget_bytes` | 80 % of function memory or 2048 MB |
//! | `OCR_LAMBDA_S3_ENDPOINT` | `s3_endpoint` | none |
//! | `AWS_REGION` | `s3_region` | SDK default chain |
//! | `PDFIUM_LIB_PATH` | `pdfium_library_path` | resolved by `pdfium-auto` |
//! | `OCR_LAMBDA_PDFIUM_DOWNLOAD` | `allow_pdfium_download` | false |
//! | `AUTH_SECRET_ID` | `auth_secret_id` | none (no token check) |

use crate::error::ServiceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

const MIB: u64 = 1024 * 1024;

/// Smallest accepted memory budget.
pub const MIN_MEMORY_BUDGET_BYTES: u64 = 16 * MIB;

/// Runtime configuration for the extraction service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceConfig {
    /// Reported as `ocr_service` in failure envelopes. Default: `ocr-lambda`.
    pub service_name: String,

    /// Wall-clock budget for one invocation in seconds. Default: 840.
    ///
    /// When the runtime supplies a deadline, the earlier of the two wins.
    pub invocation_timeout_secs: u64,

    /// Time kept in reserve before the runtime deadline so a timeout envelope
    /// can still be posted. Default: 2000 ms.
    pub deadline_margin_ms: u64,

    /// Upper bound on one object download (request + body). Default: 60.
    pub s3_timeout_secs: u64,

    /// Input bytes plus accumulated output may not exceed this.
    pub memory_budget_bytes: u64,

    /// Custom S3 endpoint (MinIO, localstack). Enables path-style addressing.
    pub s3_endpoint: Option<String>,

    /// Region override. `None` uses the SDK's default provider chain.
    pub s3_region: Option<String>,

    /// Explicit PDFium library file or directory.
    pub pdfium_library_path: Option<PathBuf>,

    /// Let `pdfium-auto` download the library when it is not found locally.
    pub allow_pdfium_download: bool,

    /// Secrets Manager id holding the expected bearer token under
    /// `accessKey`. When unset, invocations are not authenticated.
    pub auth_secret_id: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: "ocr-lambda".to_string(),
            invocation_timeout_secs: 840,
            deadline_margin_ms: 2000,
            s3_timeout_secs: 60,
            memory_budget_bytes: 2048 * MIB,
            s3_endpoint: None,
            s3_region: None,
            pdfium_library_path: None,
            allow_pdfium_download: false,
            auth_secret_id: None,
        }
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ServiceError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup` (an environment stand-in).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ServiceError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut b = Self::builder();

        if let Some(name) = var("OCR_LAMBDA_SERVICE_NAME") {
            b = b.service_name(name);
        }
        if let Some(secs) = parse_var::<u64>(&var, "OCR_LAMBDA_TIMEOUT_SECS")? {
            b = b.invocation_timeout_secs(secs);
        }
        if let Some(ms) = parse_var::<u64>(&var, "OCR_LAMBDA_DEADLINE_MARGIN_MS")? {
            b = b.deadline_margin_ms(ms);
        }
        if let Some(secs) = parse_var::<u64>(&var, "OCR_LAMBDA_S3_TIMEOUT_SECS")? {
            b = b.s3_timeout_secs(secs);
        }

        match parse_var::<u64>(&var, "OCR_LAMBDA_MEMORY_BUDGET_MB")? {
            Some(mb) => b = b.memory_budget_mb(mb),
            None => {
                if let Some(fn_mb) = parse_var::<u64>(&var, "AWS_LAMBDA_FUNCTION_MEMORY_SIZE")? {
                    b = b.memory_budget_bytes(fn_mb * MIB / 10 * 8);
                }
            }
        }

        if let Some(endpoint) = var("OCR_LAMBDA_S3_ENDPOINT") {
            b = b.s3_endpoint(endpoint);
        }
        if let Some(region) = var("AWS_REGION") {
            b = b.s3_region(region);
        }
        if let Some(path) = var("PDFIUM_LIB_PATH") {
            b = b.pdfium_library_path(path);
        }
        if let Some(flag) = var("OCR_LAMBDA_PDFIUM_DOWNLOAD") {
            b = b.allow_pdfium_download(parse_flag("OCR_LAMBDA_PDFIUM_DOWNLOAD", &flag)?);
        }
        if let Some(secret_id) = var("AUTH_SECRET_ID") {
            b = b.auth_secret_id(secret_id);
        }

        b.build()
    }
}

fn parse_var<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ServiceError>
where
    T::Err: fmt::Display,
{
    var(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| {
                ServiceError::InvalidConfig(format!("{key}='{raw}' is not valid: {e}"))
            })
        })
        .transpose()
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, ServiceError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ServiceError::InvalidConfig(format!(
            "{key}='{raw}' is not a boolean"
        ))),
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.config.service_name = name.into();
        self
    }

    pub fn invocation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.invocation_timeout_secs = secs;
        self
    }

    pub fn deadline_margin_ms(mut self, ms: u64) -> Self {
        self.config.deadline_margin_ms = ms;
        self
    }

    pub fn s3_timeout_secs(mut self, secs: u64) -> Self {
        self.config.s3_timeout_secs = secs;
        self
    }

    pub fn memory_budget_bytes(mut self, bytes: u64) -> Self {
        self.config.memory_budget_bytes = bytes;
        self
    }

    pub fn memory_budget_mb(mut self, mb: u64) -> Self {
        self.config.memory_budget_bytes = mb.saturating_mul(MIB);
        self
    }

    pub fn s3_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.s3_endpoint = Some(endpoint.into());
        self
    }

    pub fn s3_region(mut self, region: impl Into<String>) -> Self {
        self.config.s3_region = Some(region.into());
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn allow_pdfium_download(mut self, allow: bool) -> Self {
        self.config.allow_pdfium_download = allow;
        self
    }

    pub fn auth_secret_id(mut self, secret_id: impl Into<String>) -> Self {
        self.config.auth_secret_id = Some(secret_id.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, ServiceError> {
        let c = &self.config;
        if c.service_name.trim().is_empty() {
            return Err(ServiceError::InvalidConfig(
                "Service name must not be empty".into(),
            ));
        }
        if c.invocation_timeout_secs == 0 || c.s3_timeout_secs == 0 {
            return Err(ServiceError::InvalidConfig(format!(
                "Timeouts must be ≥ 1s, got invocation={} s3={}",
                c.invocation_timeout_secs, c.s3_timeout_secs
            )));
        }
        if c.memory_budget_bytes < MIN_MEMORY_BUDGET_BYTES {
            return Err(ServiceError::InvalidConfig(format!(
                "Memory budget must be ≥ 16 MiB, got {} bytes",
                c.memory_budget_bytes
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How page content is rendered into markdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphicsMode {
    /// Detect text-aligned tables and emit them as GFM tables. (default)
    #[default]
    Tables,
    /// Plain text lines only.
    Text,
}

impl GraphicsMode {
    pub const ALL: [GraphicsMode; 2] = [GraphicsMode::Tables, GraphicsMode::Text];

    pub fn as_str(self) -> &'static str {
        match self {
            GraphicsMode::Tables => "tables",
            GraphicsMode::Text => "text",
        }
    }

    /// Comma-separated list of accepted values, for error messages.
    pub fn expected() -> String {
        Self::ALL
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for GraphicsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GraphicsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let c = ServiceConfig::builder().build().unwrap();
        assert_eq!(c, ServiceConfig::default());
        assert_eq!(c.service_name, "ocr-lambda");
        assert_eq!(c.memory_budget_bytes, 2048 * MIB);
    }

    #[test]
    fn builder_rejects_bad_values() {
        assert!(ServiceConfig::builder().service_name("  ").build().is_err());
        assert!(ServiceConfig::builder()
            .invocation_timeout_secs(0)
            .build()
            .is_err());
        assert!(ServiceConfig::builder().s3_timeout_secs(0).build().is_err());
        assert!(ServiceConfig::builder()
            .memory_budget_bytes(MIB)
            .build()
            .is_err());
    }

    #[test]
    fn env_overrides_defaults() {
        let c = ServiceConfig::from_lookup(lookup(&[
            ("OCR_LAMBDA_SERVICE_NAME", "pdf-extract"),
            ("OCR_LAMBDA_TIMEOUT_SECS", "30"),
            ("OCR_LAMBDA_S3_ENDPOINT", "http://localhost:9000"),
            ("OCR_LAMBDA_MEMORY_BUDGET_MB", "64"),
            ("OCR_LAMBDA_PDFIUM_DOWNLOAD", "true"),
        ]))
        .unwrap();
        assert_eq!(c.service_name, "pdf-extract");
        assert_eq!(c.invocation_timeout_secs, 30);
        assert_eq!(c.s3_endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(c.memory_budget_bytes, 64 * MIB);
        assert!(c.allow_pdfium_download);
        assert_eq!(c.auth_secret_id, None);
    }

    #[test]
    fn auth_secret_id_enables_token_check() {
        let c = ServiceConfig::from_lookup(lookup(&[("AUTH_SECRET_ID", "ocr/api-key")])).unwrap();
        assert_eq!(c.auth_secret_id.as_deref(), Some("ocr/api-key"));

        let blank = ServiceConfig::from_lookup(lookup(&[("AUTH_SECRET_ID", "  ")])).unwrap();
        assert_eq!(blank.auth_secret_id, None);
    }

    #[test]
    fn memory_budget_follows_function_size() {
        let c = ServiceConfig::from_lookup(lookup(&[("AWS_LAMBDA_FUNCTION_MEMORY_SIZE", "1000")]))
            .unwrap();
        assert_eq!(c.memory_budget_bytes, 1000 * MIB / 10 * 8);
    }

    #[test]
    fn unparsable_env_is_invalid_config() {
        let err = ServiceConfig::from_lookup(lookup(&[("OCR_LAMBDA_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidConfig(_)));
        assert!(err.to_string().contains("OCR_LAMBDA_TIMEOUT_SECS"));
    }

    #[test]
    fn graphics_mode_parsing() {
        assert_eq!("tables".parse::<GraphicsMode>(), Ok(GraphicsMode::Tables));
        assert_eq!("text".parse::<GraphicsMode>(), Ok(GraphicsMode::Text));
        assert!("vector".parse::<GraphicsMode>().is_err());
        assert_eq!(GraphicsMode::default(), GraphicsMode::Tables);
        assert_eq!(GraphicsMode::expected(), "tables, text");
    }
}
