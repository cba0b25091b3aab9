//! Readiness scanner: periodic discovery and execution of due intents.
//!
//! One cycle:
//! 1. `take_ready(now)` snapshots due, still-pending intents
//! 2. each intent goes to the execution collaborator, outside the lock
//! 3. success commits EXECUTED, transient failure leaves PENDING for the
//!    next cycle, permanent failure commits FAILED
//! 4. `last_scan_at` advances to the cycle's start time

mod config;
mod readiness;
mod report;

pub use config::{ScannerConfig, MIN_TICK_INTERVAL_MS};
pub use readiness::ReadinessScanner;
pub use report::ScanReport;
