//! replen-core - Core library for replen.
//!
//! This crate provides the deferred intent registry, the readiness scanner
//! that executes intents once they fall due, and the status view over both.
//!
//! # Example
//!
//! ```ignore
//! use replen_core::{BackgroundRuntime, IntentDraft, ReplenConfig};
//!
//! let runtime = BackgroundRuntime::new(ReplenConfig::default())?;
//! runtime.start().await?;
//!
//! // Queue a liquidity addition for later
//! let intent = runtime.submit(draft)?;
//!
//! // Observe the scanner
//! let status = runtime.status();
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod execution;
pub mod intent;
pub mod registry;
pub mod runtime;
pub mod scanner;
pub mod status;

// Re-export commonly used types
pub use config::{ExecutorConfig, ExecutorKind, ReplenConfig, ServerConfig};
pub use error::{ErrorCode, ReplenError, ReplenResult};
pub use events::{EventBus, EventSubscriber, IntentLifecycleEvent};
pub use execution::{
    ExecutionContext, ExecutionError, ExecutionReceipt, HttpExecutor, HttpExecutorConfig,
    IntentExecutor, LoggingExecutor,
};
pub use intent::{Amount, Intent, IntentAction, IntentDraft, IntentStatus};
pub use registry::{AttemptOutcome, CommitOutcome, IgnoredReason, IntentRegistry, RegistryStats};
pub use runtime::BackgroundRuntime;
pub use scanner::{ReadinessScanner, ScanReport, ScannerConfig};
pub use status::{ExecutorStatus, StatusReporter};
