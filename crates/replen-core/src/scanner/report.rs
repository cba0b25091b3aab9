//! Per-cycle scan summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::CommitOutcome;

/// What one scan cycle did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    /// When the cycle began
    pub started_at: DateTime<Utc>,
    /// When the cycle finished
    pub finished_at: DateTime<Utc>,
    /// Due intents found by the snapshot
    pub due: usize,
    /// Intents moved to EXECUTED
    pub executed: usize,
    /// Intents left PENDING after a transient failure
    pub retrying: usize,
    /// Intents moved to FAILED
    pub failed: usize,
    /// Commits that changed nothing (overwritten, cancelled, ...)
    pub ignored: usize,
    /// Due intents left alone because no executor is configured
    pub undispatched: usize,
    /// The cycle did not run because another one was in progress
    pub skipped: bool,
}

impl ScanReport {
    /// Empty report for a cycle starting at `started_at`.
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            due: 0,
            executed: 0,
            retrying: 0,
            failed: 0,
            ignored: 0,
            undispatched: 0,
            skipped: false,
        }
    }

    /// Report for a cycle that yielded to one already running.
    pub fn skipped(started_at: DateTime<Utc>) -> Self {
        Self {
            skipped: true,
            ..Self::new(started_at)
        }
    }

    /// Count one commit outcome.
    pub fn record(&mut self, outcome: CommitOutcome) {
        match outcome {
            CommitOutcome::Executed => self.executed += 1,
            CommitOutcome::Retrying => self.retrying += 1,
            CommitOutcome::Failed => self.failed += 1,
            CommitOutcome::Ignored(_) => self.ignored += 1,
        }
    }

    /// Whether every due intent reached EXECUTED.
    pub fn all_executed(&self) -> bool {
        !self.skipped && self.executed == self.due
    }

    /// Duration of the cycle in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
