//! Read-only executor status view.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::{IntentRegistry, RegistryStats};

/// Snapshot of the scanner's state for observability endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorStatus {
    /// Whether the scanner loop is running
    pub running: bool,
    /// Configured scan interval, rounded to the nearest second. A nonzero
    /// interval never reports 0.
    pub tick_interval_seconds: u64,
    /// Configured scan interval in milliseconds
    pub tick_interval_ms: u64,
    /// Due intents not yet executed
    pub pending_intents: usize,
    /// Executed intents
    pub executed_intents: usize,
    /// Start time of the last completed scan
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl From<&RegistryStats> for ExecutorStatus {
    fn from(stats: &RegistryStats) -> Self {
        Self {
            running: stats.running,
            tick_interval_seconds: whole_seconds(stats.tick_interval),
            tick_interval_ms: u64::try_from(stats.tick_interval.as_millis()).unwrap_or(u64::MAX),
            pending_intents: stats.pending_due,
            executed_intents: stats.executed,
            last_checked_at: stats.last_scan_at,
        }
    }
}

fn whole_seconds(interval: Duration) -> u64 {
    if interval.is_zero() {
        return 0;
    }
    let rounded = interval.saturating_add(Duration::from_millis(500)).as_secs();
    rounded.max(1)
}

/// Derives [`ExecutorStatus`] from registry state. Never mutates.
#[derive(Clone)]
pub struct StatusReporter {
    registry: Arc<IntentRegistry>,
}

impl StatusReporter {
    pub fn new(registry: Arc<IntentRegistry>) -> Self {
        Self { registry }
    }

    /// Current status.
    pub fn status(&self) -> ExecutorStatus {
        self.status_at(Utc::now())
    }

    /// Status with dueness evaluated at `now`.
    pub fn status_at(&self, now: DateTime<Utc>) -> ExecutorStatus {
        ExecutorStatus::from(&self.registry.stats(now))
    }

    /// Full registry statistics, including FAILED and CANCELLED counts.
    pub fn stats(&self) -> RegistryStats {
        self.registry.stats(Utc::now())
    }
}
