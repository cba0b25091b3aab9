//! Background runtime for the readiness scanner.
//!
//! Owns the registry, event bus, execution collaborator and scanner, and
//! gives them a single startup and graceful shutdown path.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::config::ReplenConfig;
use crate::error::ReplenResult;
use crate::events::{EventBus, EventSubscriber};
use crate::execution::IntentExecutor;
use crate::intent::{Intent, IntentDraft};
use crate::registry::IntentRegistry;
use crate::scanner::{ReadinessScanner, ScanReport};
use crate::status::{ExecutorStatus, StatusReporter};

/// Process-wide owner of the intent registry and its scanner.
///
/// Construct once at startup and hand clones of the `Arc`s it exposes to
/// the request layer.
///
/// # Example
///
/// ```ignore
/// use replen_core::{BackgroundRuntime, ReplenConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let runtime = BackgroundRuntime::new(ReplenConfig::from_env())?;
///
///     runtime.start().await?;
///
///     // ... application runs ...
///
///     runtime.shutdown().await?;
///     Ok(())
/// }
/// ```
pub struct BackgroundRuntime {
    registry: Arc<IntentRegistry>,
    scanner: Arc<ReadinessScanner>,
    status: StatusReporter,
    events: EventBus,
    config: ReplenConfig,
}

impl BackgroundRuntime {
    /// Create a runtime with the collaborator described by `config.executor`.
    ///
    /// The scanner is created but not started. Call `start()` to begin
    /// scanning.
    pub fn new(config: ReplenConfig) -> ReplenResult<Self> {
        config.validate()?;
        let executor = config.executor.build()?;
        Self::with_executor(config, executor)
    }

    /// Create a runtime with an explicit collaborator, ignoring
    /// `config.executor`.
    pub fn with_executor(
        config: ReplenConfig,
        executor: Option<Arc<dyn IntentExecutor>>,
    ) -> ReplenResult<Self> {
        config.scanner.validate()?;
        debug!(
            tick_interval_ms = config.scanner.tick_interval_ms,
            max_concurrency = config.scanner.max_concurrency,
            executor = executor.as_ref().map(|e| e.name()).unwrap_or("none"),
            "Creating BackgroundRuntime"
        );

        let events = EventBus::new();
        let registry = Arc::new(IntentRegistry::with_event_bus(events.clone()));

        let scanner = ReadinessScanner::new(registry.clone(), config.scanner.clone());
        scanner.set_executor(executor);

        Ok(Self {
            status: StatusReporter::new(registry.clone()),
            scanner: Arc::new(scanner),
            registry,
            events,
            config,
        })
    }

    /// Start the readiness scanner.
    pub async fn start(&self) -> ReplenResult<()> {
        self.scanner.start().await?;
        info!("Background runtime started");
        Ok(())
    }

    /// Stop the readiness scanner, draining any in-flight cycle.
    pub async fn shutdown(&self) -> ReplenResult<()> {
        debug!("Shutting down background runtime");
        self.scanner.shutdown().await?;
        info!("Background runtime stopped");
        Ok(())
    }

    /// Validate a draft and insert the resulting intent.
    ///
    /// Returns the stored intent, including its assigned ID.
    pub fn submit(&self, draft: IntentDraft) -> ReplenResult<Intent> {
        draft.validate()?;
        let intent = draft.into_intent(Utc::now());
        let id = intent.id.clone();
        self.registry.insert(intent);
        debug!(intent_id = %id, "Intent submitted");
        self.registry
            .get(&id)
            .ok_or_else(|| crate::error::ReplenError::not_found(id))
    }

    /// Run one scan cycle immediately, bypassing the interval.
    pub async fn scan_now(&self) -> ScanReport {
        self.scanner.tick().await
    }

    /// Current executor status.
    pub fn status(&self) -> ExecutorStatus {
        self.status.status()
    }

    /// Subscribe to intent lifecycle events.
    pub fn subscribe(&self) -> EventSubscriber {
        self.events.subscribe()
    }

    /// Subscribe to the lifecycle events of one intent.
    pub fn watch_intent(&self, intent_id: impl Into<String>) -> EventSubscriber {
        self.events.subscribe_intent(intent_id)
    }

    /// Get a reference to the registry.
    pub fn registry(&self) -> Arc<IntentRegistry> {
        self.registry.clone()
    }

    /// Get a reference to the scanner.
    pub fn scanner(&self) -> Arc<ReadinessScanner> {
        self.scanner.clone()
    }

    /// Get the status reporter.
    pub fn status_reporter(&self) -> StatusReporter {
        self.status.clone()
    }

    /// Get the runtime configuration.
    pub fn config(&self) -> &ReplenConfig {
        &self.config
    }
}
