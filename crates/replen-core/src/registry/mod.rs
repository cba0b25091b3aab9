//! Concurrent intent registry.
//!
//! The registry is the only owner of intent state. Reads return copies and
//! writes replace whole values under one short lock, so it can be shared
//! freely between the request layer and the readiness scanner.

mod stats;
mod store;

pub use stats::RegistryStats;
pub use store::{AttemptOutcome, CommitOutcome, IgnoredReason, IntentRegistry};
