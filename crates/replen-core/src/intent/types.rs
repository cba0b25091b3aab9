//! Intent types for deferred liquidity operations.
//!
//! This module defines the core types for the intent lifecycle:
//! - `Intent`: A recorded request for a future liquidity operation
//! - `IntentAction`: The operation to perform on the pool
//! - `IntentStatus`: Where the intent is in its lifecycle
//! - `IntentDraft`: What the request layer submits before insertion

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::Amount;
use crate::error::{ReplenError, ReplenResult};

/// Liquidity operation requested by an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentAction {
    /// Add liquidity to the pool
    Add,
    /// Remove liquidity from the pool
    Remove,
    /// Rebalance the position within the pool
    Rebalance,
}

/// Lifecycle status of an intent.
///
/// Transitions only ever leave `Pending`:
///
/// ```text
/// PENDING --(due & execute succeeds)--> EXECUTED
/// PENDING --(due & permanent failure)--> FAILED
/// PENDING --(explicit cancel)---------> CANCELLED
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum IntentStatus {
    /// Waiting for its execution time or for a successful attempt
    #[default]
    Pending,
    /// The collaborator applied the intent's effect
    Executed,
    /// The collaborator rejected the intent permanently
    Failed,
    /// Cancelled before execution
    Cancelled,
}

impl IntentStatus {
    /// Whether no further transition can leave this status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, IntentStatus::Pending)
    }

    /// Whether moving to `next` is a legal transition.
    pub fn can_transition_to(&self, next: IntentStatus) -> bool {
        matches!(self, IntentStatus::Pending) && next.is_terminal()
    }

    /// Whether an execution attempt was resolved for this status.
    ///
    /// Exactly these statuses carry an `executed_at` timestamp.
    pub fn is_resolved(&self) -> bool {
        matches!(self, IntentStatus::Executed | IntentStatus::Failed)
    }
}

/// A deferred liquidity operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    /// Unique identifier
    pub id: String,
    /// Operation to perform
    pub action: IntentAction,
    /// Account performing the operation
    pub address: String,
    /// Target pool
    pub pool_id: String,
    /// Quantity in minor units
    pub amount: Amount,
    /// Authorizing signer
    pub signed_by: String,
    /// Lifecycle status
    #[serde(default)]
    pub status: IntentStatus,
    /// When the intent was inserted
    pub created_at: DateTime<Utc>,
    /// Earliest time the intent may execute
    pub execute_at: DateTime<Utc>,
    /// When the execution attempt resolved (EXECUTED or FAILED only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    /// Number of committed execution attempts
    #[serde(default)]
    pub attempts: u32,
    /// Reason reported by the most recent unsuccessful attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Registry revision, bumped on every insert of this ID
    #[serde(default)]
    pub revision: u64,
}

impl Intent {
    /// Create a new pending intent.
    pub fn new(
        id: impl Into<String>,
        action: IntentAction,
        address: impl Into<String>,
        pool_id: impl Into<String>,
        amount: Amount,
        signed_by: impl Into<String>,
        execute_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            action,
            address: address.into(),
            pool_id: pool_id.into(),
            amount,
            signed_by: signed_by.into(),
            status: IntentStatus::Pending,
            created_at: Utc::now(),
            execute_at,
            executed_at: None,
            attempts: 0,
            last_error: None,
            revision: 0,
        }
    }

    /// Builder method to set the creation time.
    pub fn created_at(mut self, dt: DateTime<Utc>) -> Self {
        self.created_at = dt;
        self
    }

    /// Whether the intent is pending and its execution time has arrived.
    ///
    /// `execute_at == now` counts as due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == IntentStatus::Pending && self.execute_at <= now
    }

    /// Whether the intent has reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Intent as submitted by the request layer, before insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentDraft {
    /// Caller-assigned ID (generated when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub action: IntentAction,
    pub address: String,
    pub pool_id: String,
    pub amount: Amount,
    pub signed_by: String,
    pub execute_at: DateTime<Utc>,
}

impl IntentDraft {
    /// Check the draft is well-formed.
    ///
    /// The registry assumes well-formed input; this is the check the
    /// insertion layer runs before calling it.
    pub fn validate(&self) -> ReplenResult<()> {
        if let Some(id) = &self.id {
            if id.trim().is_empty() {
                return Err(ReplenError::missing_field("id"));
            }
        }
        if self.address.trim().is_empty() {
            return Err(ReplenError::missing_field("address"));
        }
        if self.pool_id.trim().is_empty() {
            return Err(ReplenError::missing_field("pool_id"));
        }
        if self.signed_by.trim().is_empty() {
            return Err(ReplenError::missing_field("signed_by"));
        }
        if self.amount.is_zero() {
            return Err(ReplenError::invalid_amount("Amount must be greater than zero"));
        }
        Ok(())
    }

    /// Turn the draft into a pending intent created at `now`.
    pub fn into_intent(self, now: DateTime<Utc>) -> Intent {
        let id = self.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        Intent::new(
            id,
            self.action,
            self.address,
            self.pool_id,
            self.amount,
            self.signed_by,
            self.execute_at,
        )
        .created_at(now)
    }
}
