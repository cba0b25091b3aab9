//! Periodic scan-and-dispatch loop.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use futures::{stream, FutureExt, StreamExt};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::{ScanReport, ScannerConfig};
use crate::error::{ReplenError, ReplenResult};
use crate::execution::{ExecutionContext, ExecutionError, ExecutionReceipt, IntentExecutor};
use crate::intent::Intent;
use crate::registry::{AttemptOutcome, CommitOutcome, IntentRegistry};

struct LoopControl {
    stop_tx: watch::Sender<bool>,
    trigger_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Finds due intents on a fixed interval and hands them to the executor.
///
/// Each cycle snapshots the due intents under the registry lock, releases
/// it, calls the executor for every intent (concurrently, bounded by
/// `max_concurrency`, each call under `execution_timeout_ms`), and commits
/// each outcome separately. A failure for one intent never affects the
/// others or later cycles.
///
/// Cycles never overlap: a tick that arrives while the previous cycle is
/// still dispatching is skipped, so a PENDING intent is never handed out
/// twice at the same time.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use replen_core::execution::LoggingExecutor;
/// use replen_core::registry::IntentRegistry;
/// use replen_core::scanner::{ReadinessScanner, ScannerConfig};
///
/// let registry = Arc::new(IntentRegistry::new());
/// let scanner = Arc::new(
///     ReadinessScanner::new(registry.clone(), ScannerConfig::default())
///         .with_executor(Arc::new(LoggingExecutor::new())),
/// );
///
/// scanner.start().await?;
/// // ... application runs ...
/// scanner.shutdown().await?;
/// ```
pub struct ReadinessScanner {
    registry: Arc<IntentRegistry>,
    executor: RwLock<Option<Arc<dyn IntentExecutor>>>,
    config: ScannerConfig,
    scan_guard: Mutex<()>,
    control: Mutex<Option<LoopControl>>,
}

impl ReadinessScanner {
    /// Create a scanner with no executor.
    ///
    /// Call `start()` to begin periodic scanning. The configured interval
    /// is published to the registry right away so status reads it before
    /// the loop starts.
    pub fn new(registry: Arc<IntentRegistry>, config: ScannerConfig) -> Self {
        registry.set_scanner_running(false, config.interval());
        Self {
            registry,
            executor: RwLock::new(None),
            config,
            scan_guard: Mutex::new(()),
            control: Mutex::new(None),
        }
    }

    /// Builder: set the execution collaborator.
    pub fn with_executor(self, executor: Arc<dyn IntentExecutor>) -> Self {
        self.set_executor(Some(executor));
        self
    }

    /// Replace (or remove) the execution collaborator.
    ///
    /// Takes effect from the next cycle.
    pub fn set_executor(&self, executor: Option<Arc<dyn IntentExecutor>>) {
        *self
            .executor
            .write()
            .unwrap_or_else(PoisonError::into_inner) = executor;
    }

    /// Whether an execution collaborator is configured.
    pub fn has_executor(&self) -> bool {
        self.current_executor().is_some()
    }

    fn current_executor(&self) -> Option<Arc<dyn IntentExecutor>> {
        self.executor
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Get the scanner configuration.
    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Get the registry this scanner drives.
    pub fn registry(&self) -> &Arc<IntentRegistry> {
        &self.registry
    }

    /// Start the background loop.
    ///
    /// Starting an already running scanner is a no-op.
    pub async fn start(self: &Arc<Self>) -> ReplenResult<()> {
        let mut control = self.control.lock().await;
        if control.is_some() {
            return Ok(());
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let (trigger_tx, trigger_rx) = mpsc::channel(1);

        self.registry
            .set_scanner_running(true, self.config.interval());

        let scanner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            scanner.run_loop(stop_rx, trigger_rx).await;
        });

        *control = Some(LoopControl {
            stop_tx,
            trigger_tx,
            handle,
        });

        info!(
            interval_ms = self.config.tick_interval_ms,
            executor = self
                .current_executor()
                .map(|e| e.name().to_string())
                .unwrap_or_else(|| "none".to_string()),
            "Readiness scanner started"
        );
        Ok(())
    }

    /// Stop the background loop.
    ///
    /// Waits for an in-flight cycle to finish its collaborator calls and
    /// commits before returning. Stopping a stopped scanner is a no-op.
    pub async fn shutdown(&self) -> ReplenResult<()> {
        let control = self.control.lock().await.take();
        let Some(control) = control else {
            return Ok(());
        };

        info!("Shutting down readiness scanner");
        let _ = control.stop_tx.send(true);
        drop(control.trigger_tx);
        let joined = control.handle.await;

        // Drain cycles started outside the loop through `tick`/`scan_at`.
        drop(self.scan_guard.lock().await);

        self.registry
            .set_scanner_running(false, self.config.interval());

        joined.map_err(|e| ReplenError::internal(format!("Scanner task failed: {}", e)))?;
        info!("Readiness scanner stopped");
        Ok(())
    }

    /// Check if the background loop is running.
    pub async fn is_running(&self) -> bool {
        self.control.lock().await.is_some()
    }

    /// Ask the running loop for an immediate cycle.
    ///
    /// Returns false when the loop is not running. Requests made while one
    /// is already queued are merged.
    pub async fn trigger_scan(&self) -> bool {
        match self.control.lock().await.as_ref() {
            Some(control) => match control.trigger_tx.try_send(()) {
                Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => true,
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            },
            None => false,
        }
    }

    async fn run_loop(
        self: Arc<Self>,
        mut stop_rx: watch::Receiver<bool>,
        mut trigger_rx: mpsc::Receiver<()>,
    ) {
        let period = self.config.interval();
        let first = if self.config.run_on_start {
            Instant::now()
        } else {
            Instant::now() + period
        };
        let mut ticker = interval_at(first, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = stop_rx.changed() => break,
                _ = ticker.tick() => {}
                Some(()) = trigger_rx.recv() => {
                    debug!("Manual scan triggered");
                }
            }

            let report = self.tick().await;
            if report.failed > 0 || report.retrying > 0 {
                debug!(
                    retrying = report.retrying,
                    failed = report.failed,
                    "Scan cycle finished with unsuccessful attempts"
                );
            }
        }

        debug!("Readiness scanner loop exited");
    }

    /// Run one cycle now.
    pub async fn tick(&self) -> ScanReport {
        self.scan_at(Utc::now()).await
    }

    /// Run one cycle treating `now` as the current time.
    ///
    /// `last_scan_at` is set to `now` whether or not anything was due.
    pub async fn scan_at(&self, now: DateTime<Utc>) -> ScanReport {
        let Ok(_guard) = self.scan_guard.try_lock() else {
            debug!("Previous scan still in progress, skipping tick");
            return ScanReport::skipped(now);
        };

        debug!(scan_started_at = %now, "Scanning for due intents");
        let ready = self.registry.take_ready(now);
        let mut report = ScanReport::new(now);
        report.due = ready.len();

        if !ready.is_empty() {
            match self.current_executor() {
                None => {
                    warn!(
                        due = ready.len(),
                        "No execution collaborator configured, leaving due intents pending"
                    );
                    report.undispatched = ready.len();
                }
                Some(executor) => {
                    let executor: &dyn IntentExecutor = executor.as_ref();
                    let outcomes: Vec<CommitOutcome> = stream::iter(ready)
                        .map(move |intent| self.process(executor, intent, now))
                        .buffer_unordered(self.config.max_concurrency.max(1))
                        .collect()
                        .await;
                    for outcome in outcomes {
                        report.record(outcome);
                    }
                }
            }
        }

        self.registry.record_scan(now);
        report.finished_at = Utc::now().max(now);

        debug!(
            due = report.due,
            executed = report.executed,
            retrying = report.retrying,
            failed = report.failed,
            ignored = report.ignored,
            duration_ms = report.duration_ms(),
            "Scan cycle complete"
        );
        report
    }

    async fn process(
        &self,
        executor: &dyn IntentExecutor,
        intent: Intent,
        scan_started_at: DateTime<Utc>,
    ) -> CommitOutcome {
        let ctx = ExecutionContext::for_intent(&intent, scan_started_at);
        let timeout = self.config.timeout();

        let call = AssertUnwindSafe(executor.execute(&intent, &ctx)).catch_unwind();
        let result = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ExecutionError::Transient("executor panicked".to_string())),
            Err(_) => Err(ExecutionError::Timeout(timeout)),
        };

        let outcome = self.attempt_outcome(&intent, &ctx, result);
        let resolved_at = Utc::now().max(scan_started_at);
        let committed =
            self.registry
                .commit_result(&intent.id, intent.revision, outcome, resolved_at);

        if let CommitOutcome::Ignored(reason) = committed {
            debug!(
                intent_id = %intent.id,
                reason = ?reason,
                "Intent changed during execution, result discarded"
            );
        }
        committed
    }

    fn attempt_outcome(
        &self,
        intent: &Intent,
        ctx: &ExecutionContext,
        result: Result<ExecutionReceipt, ExecutionError>,
    ) -> AttemptOutcome {
        match result {
            Ok(receipt) => {
                info!(
                    intent_id = %intent.id,
                    action = %intent.action,
                    amount = %intent.amount,
                    attempt = ctx.attempt,
                    reference = ?receipt.reference,
                    already_applied = receipt.already_applied,
                    "Intent executed"
                );
                AttemptOutcome::Succeeded
            }
            Err(err) if err.is_retryable() => match self.config.max_attempts {
                Some(max) if ctx.attempt >= max => {
                    error!(
                        intent_id = %intent.id,
                        attempt = ctx.attempt,
                        error = %err,
                        "Intent exhausted its execution attempts"
                    );
                    AttemptOutcome::Failed {
                        reason: format!("{} (gave up after {} attempts)", err, ctx.attempt),
                    }
                }
                _ => {
                    warn!(
                        intent_id = %intent.id,
                        attempt = ctx.attempt,
                        error = %err,
                        "Intent execution failed, retrying on a later scan"
                    );
                    AttemptOutcome::Retry {
                        reason: err.to_string(),
                    }
                }
            },
            Err(err) => {
                error!(
                    intent_id = %intent.id,
                    attempt = ctx.attempt,
                    error = %err,
                    "Intent execution failed permanently"
                );
                AttemptOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }
}
