//! Intent lifecycle events.
//!
//! Emitted by the registry for every state change it commits, in commit
//! order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::intent::IntentAction;

/// Intent lifecycle events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntentLifecycleEvent {
    /// Intent was inserted or replaced
    Inserted {
        intent_id: String,
        action: IntentAction,
        execute_at: DateTime<Utc>,
        /// Whether an intent with the same ID was overwritten
        replaced: bool,
        /// Revision assigned by this insert
        revision: u64,
        timestamp: DateTime<Utc>,
    },
    /// Execution succeeded
    Executed {
        intent_id: String,
        attempt: u32,
        timestamp: DateTime<Utc>,
    },
    /// Execution failed transiently; the intent stays pending
    RetryScheduled {
        intent_id: String,
        attempt: u32,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    /// Execution failed permanently
    Failed {
        intent_id: String,
        attempt: u32,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    /// Intent was cancelled before execution
    Cancelled {
        intent_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl IntentLifecycleEvent {
    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Inserted { .. } => "intent.inserted",
            Self::Executed { .. } => "intent.executed",
            Self::RetryScheduled { .. } => "intent.retry_scheduled",
            Self::Failed { .. } => "intent.failed",
            Self::Cancelled { .. } => "intent.cancelled",
        }
    }

    /// Get the intent ID this event relates to
    pub fn intent_id(&self) -> &str {
        match self {
            Self::Inserted { intent_id, .. }
            | Self::Executed { intent_id, .. }
            | Self::RetryScheduled { intent_id, .. }
            | Self::Failed { intent_id, .. }
            | Self::Cancelled { intent_id, .. } => intent_id,
        }
    }

    /// Whether this event moves the intent out of PENDING for good
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Self::Executed { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }

    /// Get the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Inserted { timestamp, .. }
            | Self::Executed { timestamp, .. }
            | Self::RetryScheduled { timestamp, .. }
            | Self::Failed { timestamp, .. }
            | Self::Cancelled { timestamp, .. } => *timestamp,
        }
    }
}
