//! Execution collaborator contract.
//!
//! The scanner never performs an intent's effect itself. It hands each due
//! intent to an [`IntentExecutor`] supplied by the embedding application and
//! commits whatever the executor reports.
//!
//! Because a transient failure leaves the intent PENDING, the same intent can
//! reach the executor more than once. Every call carries an
//! [`ExecutionContext`] whose `idempotency_key` is stable across attempts, so
//! an executor can recognise an effect it already applied.

mod http;
mod logging;

pub use http::{
    verify_signature, HttpExecutor, HttpExecutorConfig, IDEMPOTENCY_HEADER, SIGNATURE_HEADER,
};
pub use logging::LoggingExecutor;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::intent::Intent;

/// Per-call metadata passed alongside the intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Stable for every attempt of the same intent ID
    pub idempotency_key: String,
    /// 1-based attempt number
    pub attempt: u32,
    /// When the dispatching scan began
    pub scan_started_at: DateTime<Utc>,
}

impl ExecutionContext {
    /// Context for the next attempt of `intent`.
    pub fn for_intent(intent: &Intent, scan_started_at: DateTime<Utc>) -> Self {
        Self {
            idempotency_key: intent.id.clone(),
            attempt: intent.attempts.saturating_add(1),
            scan_started_at,
        }
    }
}

/// What the executor reports on success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    /// External reference, e.g. a transaction hash
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// The effect had already been applied by an earlier attempt
    #[serde(default)]
    pub already_applied: bool,
}

impl ExecutionReceipt {
    /// Receipt carrying an external reference.
    pub fn with_reference(reference: impl Into<String>) -> Self {
        Self {
            reference: Some(reference.into()),
            already_applied: false,
        }
    }
}

/// Error returned by an executor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// Worth retrying on a later scan (network, 5xx, congestion)
    #[error("Transient error: {0}")]
    Transient(String),
    /// Will never succeed (rejected, 4xx)
    #[error("Permanent error: {0}")]
    Permanent(String),
    /// The call did not finish within the scanner's timeout
    #[error("Execution timed out after {0:?}")]
    Timeout(Duration),
    /// The executor cannot currently take work
    #[error("Executor unavailable: {0}")]
    Unavailable(String),
}

impl ExecutionError {
    /// Whether the intent should stay PENDING for another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Permanent(_))
    }
}

/// Capability that performs an intent's real-world effect.
///
/// Implementations must be safe to call concurrently for different intents
/// and must tolerate repeated calls for the same `idempotency_key`.
#[async_trait]
pub trait IntentExecutor: Send + Sync {
    /// Attempt the intent's effect.
    async fn execute(
        &self,
        intent: &Intent,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionReceipt, ExecutionError>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}
