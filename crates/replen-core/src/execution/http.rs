//! HTTP executor that forwards intents to a chain-execution service.
//!
//! Each attempt is a signed POST of the intent plus its execution context:
//! - HMAC-SHA256 payload signing so the service can verify the sender
//! - A stable idempotency key header across retries of the same intent
//! - Status classification: 2xx success, 409 already applied, 5xx transient,
//!   other 4xx permanent

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

use super::{ExecutionContext, ExecutionError, ExecutionReceipt, IntentExecutor};
use crate::error::{ReplenError, ReplenResult};
use crate::intent::Intent;

/// Header carrying the idempotency key.
pub const IDEMPOTENCY_HEADER: &str = "X-Replen-Idempotency-Key";
/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "X-Replen-Signature";
const ATTEMPT_HEADER: &str = "X-Replen-Attempt";

/// HTTP executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpExecutorConfig {
    /// Endpoint receiving execution requests
    pub endpoint: String,
    /// Secret for HMAC signing (optional but recommended)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

impl HttpExecutorConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            secret: None,
            timeout_secs: default_timeout(),
        }
    }

    /// Builder: set secret for signing
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Builder: set request timeout
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs.max(1);
        self
    }
}

#[derive(Serialize)]
struct ExecutionRequest<'a> {
    intent: &'a Intent,
    context: &'a ExecutionContext,
}

#[derive(Deserialize, Default)]
struct ExecutionResponse {
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    already_applied: bool,
}

enum StatusClass {
    Success,
    AlreadyApplied,
    Transient,
    Permanent,
}

fn classify_status(status: StatusCode) -> StatusClass {
    if status.is_success() {
        StatusClass::Success
    } else if status == StatusCode::CONFLICT {
        StatusClass::AlreadyApplied
    } else if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        StatusClass::Transient
    } else {
        StatusClass::Permanent
    }
}

/// Executor that POSTs intents to an external execution service.
#[derive(Clone)]
pub struct HttpExecutor {
    client: Client,
    config: HttpExecutorConfig,
}

impl HttpExecutor {
    /// Create a new HTTP executor
    pub fn new(config: HttpExecutorConfig) -> ReplenResult<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(ReplenError::Configuration(
                "HTTP executor requires an endpoint".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Get the executor config
    pub fn config(&self) -> &HttpExecutorConfig {
        &self.config
    }

    /// Sign payload with HMAC-SHA256
    fn sign_payload(&self, payload: &str) -> Option<String> {
        self.config
            .secret
            .as_deref()
            .map(|secret| compute_signature(payload, secret))
    }
}

#[async_trait]
impl IntentExecutor for HttpExecutor {
    async fn execute(
        &self,
        intent: &Intent,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionReceipt, ExecutionError> {
        let payload = serde_json::to_string(&ExecutionRequest {
            intent,
            context: ctx,
        })
        .map_err(|e| ExecutionError::Permanent(format!("Serialization error: {}", e)))?;

        let mut request = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json")
            .header(IDEMPOTENCY_HEADER, &ctx.idempotency_key)
            .header(ATTEMPT_HEADER, ctx.attempt.to_string());
        if let Some(signature) = self.sign_payload(&payload) {
            request = request.header(SIGNATURE_HEADER, signature);
        }

        let response = request
            .body(payload)
            .send()
            .await
            .map_err(|e| ExecutionError::Transient(format!("Network error: {}", e)))?;

        let status = response.status();
        debug!(intent_id = %intent.id, status = %status, "Execution service responded");

        match classify_status(status) {
            StatusClass::Success => {
                let body: ExecutionResponse = response.json().await.unwrap_or_default();
                Ok(ExecutionReceipt {
                    reference: body.reference,
                    already_applied: body.already_applied,
                })
            }
            StatusClass::AlreadyApplied => Ok(ExecutionReceipt {
                reference: None,
                already_applied: true,
            }),
            StatusClass::Transient => {
                Err(ExecutionError::Transient(format!("Server error: {}", status)))
            }
            StatusClass::Permanent => {
                let body = response.text().await.unwrap_or_default();
                Err(ExecutionError::Permanent(format!(
                    "Client error {}: {}",
                    status, body
                )))
            }
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

const SIGNATURE_PREFIX: &str = "sha256=";

fn compute_signature(payload: &str, secret: &str) -> String {
    // HMAC-SHA256 accepts keys of any length, so this never errors.
    let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(payload.as_bytes());
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}

/// Verify an execution request signature
///
/// Used by execution services to check a request came from replen. The
/// comparison runs in constant time inside `Mac::verify_slice`.
pub fn verify_signature(payload: &str, secret: &str, signature: &str) -> bool {
    let Some(digest) = signature
        .strip_prefix(SIGNATURE_PREFIX)
        .and_then(|hex_digest| hex::decode(hex_digest).ok())
    else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload.as_bytes());
    mac.verify_slice(&digest).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{Amount, IntentAction};
    use chrono::Utc;

    #[test]
    fn test_status_classification() {
        assert!(matches!(classify_status(StatusCode::OK), StatusClass::Success));
        assert!(matches!(classify_status(StatusCode::ACCEPTED), StatusClass::Success));
        assert!(matches!(
            classify_status(StatusCode::CONFLICT),
            StatusClass::AlreadyApplied
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY),
            StatusClass::Transient
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            StatusClass::Transient
        ));
        assert!(matches!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY),
            StatusClass::Permanent
        ));
    }

    #[test]
    fn test_signature_verification() {
        let secret = "chain-secret";
        let payload = r#"{"intent":{"id":"i1"}}"#;

        let executor = HttpExecutor::new(
            HttpExecutorConfig::new("http://localhost:9000/execute").with_secret(secret),
        )
        .unwrap();
        let signature = executor.sign_payload(payload).unwrap();

        assert!(signature.starts_with("sha256="));
        assert!(verify_signature(payload, secret, &signature));
        assert!(!verify_signature(payload, "wrong-secret", &signature));
        assert!(!verify_signature("tampered", secret, &signature));
    }

    #[test]
    fn test_malformed_signatures_are_rejected() {
        let secret = "chain-secret";
        let payload = r#"{"intent":{"id":"i1"}}"#;
        let signature = compute_signature(payload, secret);
        let digest = signature.trim_start_matches("sha256=");

        // Missing prefix, wrong prefix, non-hex, truncated, and empty input
        assert!(!verify_signature(payload, secret, digest));
        assert!(!verify_signature(payload, secret, &format!("sha1={}", digest)));
        assert!(!verify_signature(payload, secret, "sha256=not-hex"));
        assert!(!verify_signature(payload, secret, &signature[..signature.len() - 2]));
        assert!(!verify_signature(payload, secret, "sha256="));
        assert!(!verify_signature(payload, secret, ""));

        // Hex case does not matter once decoded
        let upper = format!("sha256={}", digest.to_uppercase());
        assert!(verify_signature(payload, secret, &upper));
    }

    #[test]
    fn test_unsigned_without_secret() {
        let executor =
            HttpExecutor::new(HttpExecutorConfig::new("http://localhost:9000/execute")).unwrap();
        assert!(executor.sign_payload("{}").is_none());
    }

    #[test]
    fn test_requires_endpoint() {
        assert!(HttpExecutor::new(HttpExecutorConfig::new(" ")).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transient() {
        let executor = HttpExecutor::new(
            HttpExecutorConfig::new("http://127.0.0.1:1/execute").with_timeout_secs(2),
        )
        .unwrap();
        let intent = Intent::new(
            "i1",
            IntentAction::Remove,
            "0xabc",
            "pool-1",
            Amount::from_minor_units(5),
            "0xsigner",
            Utc::now(),
        );
        let ctx = ExecutionContext::for_intent(&intent, Utc::now());

        let err = executor.execute(&intent, &ctx).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
