//! Aggregate registry statistics.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time aggregate over the registry, read under a single lock.
///
/// `pending_due + executed <= total` holds for every observation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    /// Intents in any status
    pub total: usize,
    /// PENDING intents, due or not
    pub pending: usize,
    /// PENDING intents whose execution time has arrived
    pub pending_due: usize,
    /// EXECUTED intents
    pub executed: usize,
    /// FAILED intents
    pub failed: usize,
    /// CANCELLED intents
    pub cancelled: usize,
    /// Whether the scanner loop is running
    pub running: bool,
    /// Configured scan interval
    pub tick_interval: Duration,
    /// Start time of the last completed scan
    pub last_scan_at: Option<DateTime<Utc>>,
}
