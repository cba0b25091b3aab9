//! Scanner configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ReplenError, ReplenResult};

/// Smallest accepted tick interval.
pub const MIN_TICK_INTERVAL_MS: u64 = 10;

/// Configuration for the readiness scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Interval between scan cycles in milliseconds (default: 5000)
    pub tick_interval_ms: u64,
    /// Timeout for a single collaborator call in milliseconds (default: 30000)
    pub execution_timeout_ms: u64,
    /// Maximum collaborator calls in flight per scan (default: 8)
    pub max_concurrency: usize,
    /// Unsuccessful attempts after which a transient failure becomes
    /// permanent (default: None = retry until success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    /// Whether to scan immediately on start (default: false)
    pub run_on_start: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 5_000,
            execution_timeout_ms: 30_000,
            max_concurrency: 8,
            max_attempts: None,
            run_on_start: false,
        }
    }
}

impl ScannerConfig {
    /// Create config with custom interval.
    pub fn with_interval(interval: Duration) -> Self {
        Self::default().tick_interval(interval)
    }

    /// Set the tick interval (clamped to the minimum).
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        let ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self.tick_interval_ms = ms.max(MIN_TICK_INTERVAL_MS);
        self
    }

    /// Set the per-call execution timeout.
    pub fn execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX).max(1);
        self
    }

    /// Set how many collaborator calls may run concurrently.
    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit.max(1);
        self
    }

    /// Cap the number of attempts per intent.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    /// Scan immediately when the loop starts.
    pub fn with_run_on_start(mut self) -> Self {
        self.run_on_start = true;
        self
    }

    /// Tick interval as a `Duration`.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(MIN_TICK_INTERVAL_MS))
    }

    /// Per-call timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.execution_timeout_ms.max(1))
    }

    /// Reject values that would stall or spin the scanner.
    pub fn validate(&self) -> ReplenResult<()> {
        if self.tick_interval_ms < MIN_TICK_INTERVAL_MS {
            return Err(ReplenError::Configuration(format!(
                "tick_interval_ms must be at least {}",
                MIN_TICK_INTERVAL_MS
            )));
        }
        if self.execution_timeout_ms == 0 {
            return Err(ReplenError::Configuration(
                "execution_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(ReplenError::Configuration(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.max_attempts == Some(0) {
            return Err(ReplenError::Configuration(
                "max_attempts must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}
