//! Thread-safe in-memory intent registry.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use super::stats::RegistryStats;
use crate::error::{ReplenError, ReplenResult};
use crate::events::{EventBus, EventSubscriber, IntentLifecycleEvent};
use crate::intent::{Intent, IntentStatus};

/// Result of one execution attempt, as reported back to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The collaborator applied the effect.
    Succeeded,
    /// Transient failure; the intent stays pending and is retried.
    Retry { reason: String },
    /// Permanent failure; the intent is resolved as failed.
    Failed { reason: String },
}

/// What `commit_result` did with an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Intent transitioned to EXECUTED.
    Executed,
    /// Intent stays PENDING for a later scan.
    Retrying,
    /// Intent transitioned to FAILED.
    Failed,
    /// Nothing changed. See [`IgnoredReason`].
    Ignored(IgnoredReason),
}

/// Why a commit was a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredReason {
    /// The intent no longer exists.
    Missing,
    /// The intent was overwritten after it was taken.
    Replaced,
    /// The intent already left PENDING.
    AlreadyResolved,
}

#[derive(Debug)]
struct RegistryState {
    intents: HashMap<String, Intent>,
    next_revision: u64,
    scanner_running: bool,
    tick_interval: Duration,
    last_scan_at: Option<DateTime<Utc>>,
}

/// Authoritative in-memory set of intents.
///
/// Every operation takes one exclusive lock for as long as it needs to copy
/// or replace whole [`Intent`] values, and none of them hold it across an
/// await point or a collaborator call. Values handed out are copies, never
/// references into the map.
///
/// Lifecycle events are published before the lock is released. Publishing
/// never blocks, and it keeps the event stream in the same order as the
/// state changes: a subscriber sees an intent's events in revision order.
///
/// # Example
///
/// ```
/// use chrono::{Duration, Utc};
/// use replen_core::intent::{Amount, Intent, IntentAction};
/// use replen_core::registry::{AttemptOutcome, IntentRegistry};
///
/// let registry = IntentRegistry::new();
/// let now = Utc::now();
/// registry.insert(Intent::new(
///     "I1", IntentAction::Add, "0xabc", "pool-1",
///     Amount::from_minor_units(100), "0xsigner", now - Duration::seconds(1),
/// ));
///
/// let ready = registry.take_ready(now);
/// assert_eq!(ready.len(), 1);
/// registry.commit_result(&ready[0].id, ready[0].revision, AttemptOutcome::Succeeded, now);
/// assert!(registry.take_ready(now).is_empty());
/// ```
pub struct IntentRegistry {
    state: Mutex<RegistryState>,
    events: EventBus,
}

impl IntentRegistry {
    /// Create an empty registry with its own event bus.
    pub fn new() -> Self {
        Self::with_event_bus(EventBus::new())
    }

    /// Create an empty registry that emits on the given bus.
    pub fn with_event_bus(events: EventBus) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                intents: HashMap::new(),
                next_revision: 1,
                scanner_running: false,
                tick_interval: Duration::ZERO,
                last_scan_at: None,
            }),
            events,
        }
    }

    // Critical sections only ever replace whole values, so a poisoned lock
    // still guards a consistent map.
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store or replace the intent under its ID.
    ///
    /// Replacing gives the intent a new revision, so a scan that took the old
    /// value before the overwrite commits nothing.
    pub fn insert(&self, mut intent: Intent) {
        let mut state = self.lock();
        let revision = state.next_revision;
        state.next_revision += 1;
        intent.revision = revision;

        let event = IntentLifecycleEvent::Inserted {
            intent_id: intent.id.clone(),
            action: intent.action,
            execute_at: intent.execute_at,
            replaced: state.intents.contains_key(&intent.id),
            revision,
            timestamp: intent.created_at,
        };
        state.intents.insert(intent.id.clone(), intent);

        trace!(intent_id = %event.intent_id(), revision, "Intent inserted");
        self.events.emit(event);
    }

    /// Snapshot copy of every intent, in no particular order.
    pub fn get_all(&self) -> Vec<Intent> {
        self.lock().intents.values().cloned().collect()
    }

    /// Copy of a single intent.
    pub fn get(&self, id: &str) -> Option<Intent> {
        self.lock().intents.get(id).cloned()
    }

    /// Number of intents held, in any status.
    pub fn len(&self) -> usize {
        self.lock().intents.len()
    }

    /// Whether the registry holds no intents.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies of every PENDING intent with `execute_at <= now`.
    ///
    /// Nothing is marked in flight; the caller reports back through
    /// [`commit_result`](Self::commit_result). Results are ordered by
    /// `execute_at` for stable logs, but callers must not rely on it.
    pub fn take_ready(&self, now: DateTime<Utc>) -> Vec<Intent> {
        let mut ready: Vec<Intent> = {
            let state = self.lock();
            state
                .intents
                .values()
                .filter(|intent| intent.is_due(now))
                .cloned()
                .collect()
        };
        ready.sort_by(|a, b| a.execute_at.cmp(&b.execute_at).then_with(|| a.id.cmp(&b.id)));
        ready
    }

    /// Apply the outcome of an execution attempt.
    ///
    /// `revision` is the revision of the copy that was executed. The commit
    /// is a no-op when the intent is gone, was overwritten since, or already
    /// left PENDING, so committing twice never moves `executed_at`.
    pub fn commit_result(
        &self,
        id: &str,
        revision: u64,
        outcome: AttemptOutcome,
        now: DateTime<Utc>,
    ) -> CommitOutcome {
        let mut state = self.lock();
        let (committed, event) = {
            let Some(intent) = state.intents.get_mut(id) else {
                return CommitOutcome::Ignored(IgnoredReason::Missing);
            };
            if intent.revision != revision {
                return CommitOutcome::Ignored(IgnoredReason::Replaced);
            }
            if intent.status != IntentStatus::Pending {
                return CommitOutcome::Ignored(IgnoredReason::AlreadyResolved);
            }

            intent.attempts = intent.attempts.saturating_add(1);
            let attempt = intent.attempts;
            let resolved_at = now.max(intent.execute_at);

            match outcome {
                AttemptOutcome::Succeeded => {
                    intent.status = IntentStatus::Executed;
                    intent.executed_at = Some(resolved_at);
                    intent.last_error = None;
                    (
                        CommitOutcome::Executed,
                        IntentLifecycleEvent::Executed {
                            intent_id: id.to_string(),
                            attempt,
                            timestamp: resolved_at,
                        },
                    )
                }
                AttemptOutcome::Retry { reason } => {
                    intent.last_error = Some(reason.clone());
                    (
                        CommitOutcome::Retrying,
                        IntentLifecycleEvent::RetryScheduled {
                            intent_id: id.to_string(),
                            attempt,
                            reason,
                            timestamp: now,
                        },
                    )
                }
                AttemptOutcome::Failed { reason } => {
                    intent.status = IntentStatus::Failed;
                    intent.executed_at = Some(resolved_at);
                    intent.last_error = Some(reason.clone());
                    (
                        CommitOutcome::Failed,
                        IntentLifecycleEvent::Failed {
                            intent_id: id.to_string(),
                            attempt,
                            reason,
                            timestamp: resolved_at,
                        },
                    )
                }
            }
        };

        self.events.emit(event);
        drop(state);
        committed
    }

    /// Cancel a pending intent.
    ///
    /// Returns the cancelled copy. Terminal intents are rejected with
    /// [`ReplenError::InvalidTransition`].
    pub fn cancel(&self, id: &str, now: DateTime<Utc>) -> ReplenResult<Intent> {
        let mut state = self.lock();
        let intent = state
            .intents
            .get_mut(id)
            .ok_or_else(|| ReplenError::not_found(id))?;
        if !intent.status.can_transition_to(IntentStatus::Cancelled) {
            return Err(ReplenError::invalid_transition(
                id,
                intent.status,
                IntentStatus::Cancelled,
            ));
        }
        intent.status = IntentStatus::Cancelled;
        let cancelled = intent.clone();

        self.events.emit(IntentLifecycleEvent::Cancelled {
            intent_id: id.to_string(),
            timestamp: now,
        });
        drop(state);

        debug!(intent_id = %id, "Intent cancelled");
        Ok(cancelled)
    }

    /// Aggregate counts and scanner bookkeeping, read under one lock.
    pub fn stats(&self, now: DateTime<Utc>) -> RegistryStats {
        let state = self.lock();
        let mut stats = RegistryStats {
            total: state.intents.len(),
            running: state.scanner_running,
            tick_interval: state.tick_interval,
            last_scan_at: state.last_scan_at,
            ..RegistryStats::default()
        };

        for intent in state.intents.values() {
            match intent.status {
                IntentStatus::Pending => {
                    stats.pending += 1;
                    if intent.execute_at <= now {
                        stats.pending_due += 1;
                    }
                }
                IntentStatus::Executed => stats.executed += 1,
                IntentStatus::Failed => stats.failed += 1,
                IntentStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    /// Record whether the scanner loop is running and at what interval.
    pub fn set_scanner_running(&self, running: bool, tick_interval: Duration) {
        let mut state = self.lock();
        state.scanner_running = running;
        state.tick_interval = tick_interval;
    }

    /// Record the start time of the most recently completed scan.
    pub fn record_scan(&self, started_at: DateTime<Utc>) {
        let mut state = self.lock();
        // Overlapping callers may finish out of order.
        if state.last_scan_at.map_or(true, |last| started_at >= last) {
            state.last_scan_at = Some(started_at);
        }
    }

    /// Subscribe to lifecycle events emitted by this registry.
    pub fn subscribe(&self) -> EventSubscriber {
        self.events.subscribe()
    }

    /// The bus this registry emits on.
    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }
}

impl Default for IntentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{Amount, IntentAction};
    use chrono::Duration as ChronoDuration;

    fn intent(id: &str, execute_at: DateTime<Utc>) -> Intent {
        Intent::new(
            id,
            IntentAction::Add,
            "0xabc",
            "pool-1",
            Amount::from_minor_units(100),
            "0xsigner",
            execute_at,
        )
    }

    #[test]
    fn test_insert_and_get() {
        let registry = IntentRegistry::new();
        let now = Utc::now();
        registry.insert(intent("i1", now));

        let stored = registry.get("i1").unwrap();
        assert_eq!(stored.id, "i1");
        assert_eq!(stored.revision, 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_insert_overwrites_and_bumps_revision() {
        let registry = IntentRegistry::new();
        let now = Utc::now();
        registry.insert(intent("i1", now));
        let mut replacement = intent("i1", now);
        replacement.amount = Amount::from_minor_units(500);
        registry.insert(replacement);

        let stored = registry.get("i1").unwrap();
        assert_eq!(stored.amount.minor_units(), 500);
        assert_eq!(stored.revision, 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_all_returns_copies() {
        let registry = IntentRegistry::new();
        registry.insert(intent("i1", Utc::now()));

        let mut all = registry.get_all();
        all[0].status = IntentStatus::Executed;

        assert_eq!(registry.get("i1").unwrap().status, IntentStatus::Pending);
    }

    #[test]
    fn test_take_ready_filters_due_pending() {
        let registry = IntentRegistry::new();
        let now = Utc::now();
        registry.insert(intent("past", now - ChronoDuration::seconds(1)));
        registry.insert(intent("boundary", now));
        registry.insert(intent("future", now + ChronoDuration::hours(1)));
        registry.insert(intent("done", now - ChronoDuration::seconds(5)));
        let done = registry.get("done").unwrap();
        registry.commit_result("done", done.revision, AttemptOutcome::Succeeded, now);

        let ready: Vec<String> = registry.take_ready(now).into_iter().map(|i| i.id).collect();
        assert_eq!(ready, vec!["past".to_string(), "boundary".to_string()]);
    }

    #[test]
    fn test_take_ready_does_not_mark_in_flight() {
        let registry = IntentRegistry::new();
        let now = Utc::now();
        registry.insert(intent("i1", now));

        assert_eq!(registry.take_ready(now).len(), 1);
        assert_eq!(registry.take_ready(now).len(), 1);
        assert_eq!(registry.get("i1").unwrap().status, IntentStatus::Pending);
    }

    #[test]
    fn test_commit_success_sets_executed_at() {
        let registry = IntentRegistry::new();
        let now = Utc::now();
        let execute_at = now - ChronoDuration::seconds(1);
        registry.insert(intent("i1", execute_at));

        let taken = registry.take_ready(now).remove(0);
        let outcome = registry.commit_result("i1", taken.revision, AttemptOutcome::Succeeded, now);
        assert_eq!(outcome, CommitOutcome::Executed);

        let stored = registry.get("i1").unwrap();
        assert_eq!(stored.status, IntentStatus::Executed);
        assert_eq!(stored.attempts, 1);
        assert!(stored.executed_at.unwrap() >= execute_at);
    }

    #[test]
    fn test_commit_is_idempotent() {
        let registry = IntentRegistry::new();
        let now = Utc::now();
        registry.insert(intent("i1", now));
        let taken = registry.take_ready(now).remove(0);

        registry.commit_result("i1", taken.revision, AttemptOutcome::Succeeded, now);
        let first = registry.get("i1").unwrap();

        let later = now + ChronoDuration::minutes(5);
        let second = registry.commit_result("i1", taken.revision, AttemptOutcome::Succeeded, later);
        assert_eq!(second, CommitOutcome::Ignored(IgnoredReason::AlreadyResolved));

        let failed = registry.commit_result(
            "i1",
            taken.revision,
            AttemptOutcome::Failed {
                reason: "late".to_string(),
            },
            later,
        );
        assert_eq!(failed, CommitOutcome::Ignored(IgnoredReason::AlreadyResolved));
        assert_eq!(registry.get("i1").unwrap(), first);
    }

    #[test]
    fn test_commit_retry_keeps_pending() {
        let registry = IntentRegistry::new();
        let now = Utc::now();
        registry.insert(intent("i1", now));
        let taken = registry.take_ready(now).remove(0);

        let outcome = registry.commit_result(
            "i1",
            taken.revision,
            AttemptOutcome::Retry {
                reason: "rpc down".to_string(),
            },
            now,
        );
        assert_eq!(outcome, CommitOutcome::Retrying);

        let stored = registry.get("i1").unwrap();
        assert_eq!(stored.status, IntentStatus::Pending);
        assert!(stored.executed_at.is_none());
        assert_eq!(stored.attempts, 1);
        assert_eq!(stored.last_error.as_deref(), Some("rpc down"));
        assert_eq!(registry.take_ready(now).len(), 1);
    }

    #[test]
    fn test_commit_failed_is_terminal() {
        let registry = IntentRegistry::new();
        let now = Utc::now();
        registry.insert(intent("i1", now));
        let taken = registry.take_ready(now).remove(0);

        let outcome = registry.commit_result(
            "i1",
            taken.revision,
            AttemptOutcome::Failed {
                reason: "pool closed".to_string(),
            },
            now,
        );
        assert_eq!(outcome, CommitOutcome::Failed);

        let stored = registry.get("i1").unwrap();
        assert_eq!(stored.status, IntentStatus::Failed);
        assert!(stored.executed_at.is_some());
        assert!(registry.take_ready(now).is_empty());
    }

    #[test]
    fn test_commit_after_overwrite_is_noop() {
        let registry = IntentRegistry::new();
        let now = Utc::now();
        registry.insert(intent("i1", now));
        let taken = registry.take_ready(now).remove(0);

        registry.insert(intent("i1", now + ChronoDuration::hours(1)));

        let outcome = registry.commit_result("i1", taken.revision, AttemptOutcome::Succeeded, now);
        assert_eq!(outcome, CommitOutcome::Ignored(IgnoredReason::Replaced));
        assert_eq!(registry.get("i1").unwrap().status, IntentStatus::Pending);
    }

    #[test]
    fn test_commit_missing_is_noop() {
        let registry = IntentRegistry::new();
        let outcome = registry.commit_result("ghost", 1, AttemptOutcome::Succeeded, Utc::now());
        assert_eq!(outcome, CommitOutcome::Ignored(IgnoredReason::Missing));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cancel() {
        let registry = IntentRegistry::new();
        let now = Utc::now();
        registry.insert(intent("i1", now + ChronoDuration::hours(1)));

        let cancelled = registry.cancel("i1", now).unwrap();
        assert_eq!(cancelled.status, IntentStatus::Cancelled);
        assert!(cancelled.executed_at.is_none());

        assert!(matches!(
            registry.cancel("i1", now),
            Err(ReplenError::InvalidTransition { .. })
        ));
        assert!(matches!(
            registry.cancel("missing", now),
            Err(ReplenError::NotFound { .. })
        ));
    }

    #[test]
    fn test_cancelled_intent_is_never_ready() {
        let registry = IntentRegistry::new();
        let now = Utc::now();
        registry.insert(intent("i1", now - ChronoDuration::seconds(1)));
        let taken = registry.take_ready(now).remove(0);
        registry.cancel("i1", now).unwrap();

        assert!(registry.take_ready(now).is_empty());
        let outcome = registry.commit_result("i1", taken.revision, AttemptOutcome::Succeeded, now);
        assert_eq!(outcome, CommitOutcome::Ignored(IgnoredReason::AlreadyResolved));
        assert_eq!(registry.get("i1").unwrap().status, IntentStatus::Cancelled);
    }

    #[test]
    fn test_stats_counts() {
        let registry = IntentRegistry::new();
        let now = Utc::now();
        registry.insert(intent("due", now - ChronoDuration::seconds(1)));
        registry.insert(intent("later", now + ChronoDuration::hours(1)));
        registry.insert(intent("done", now - ChronoDuration::seconds(1)));
        registry.insert(intent("gone", now + ChronoDuration::hours(1)));
        let done = registry.get("done").unwrap();
        registry.commit_result("done", done.revision, AttemptOutcome::Succeeded, now);
        registry.cancel("gone", now).unwrap();
        registry.set_scanner_running(true, Duration::from_secs(5));
        registry.record_scan(now);

        let stats = registry.stats(now);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.pending_due, 1);
        assert_eq!(stats.executed, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.failed, 0);
        assert!(stats.running);
        assert_eq!(stats.tick_interval, Duration::from_secs(5));
        assert_eq!(stats.last_scan_at, Some(now));
        assert!(stats.pending_due + stats.executed <= stats.total);
    }

    #[test]
    fn test_record_scan_keeps_latest() {
        let registry = IntentRegistry::new();
        let now = Utc::now();
        registry.record_scan(now);
        registry.record_scan(now - ChronoDuration::seconds(10));
        assert_eq!(registry.stats(now).last_scan_at, Some(now));
    }

    #[tokio::test]
    async fn test_events_emitted() {
        let registry = IntentRegistry::new();
        let mut sub = registry.subscribe();
        let now = Utc::now();

        registry.insert(intent("i1", now));
        registry.insert(intent("i1", now));
        let taken = registry.take_ready(now).remove(0);
        registry.commit_result("i1", taken.revision, AttemptOutcome::Succeeded, now);

        match sub.recv().await.unwrap() {
            IntentLifecycleEvent::Inserted {
                replaced, revision, ..
            } => {
                assert!(!replaced);
                assert_eq!(revision, 1);
            }
            other => panic!("unexpected event {:?}", other),
        }
        match sub.recv().await.unwrap() {
            IntentLifecycleEvent::Inserted {
                replaced, revision, ..
            } => {
                assert!(replaced);
                assert_eq!(revision, taken.revision);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(sub.recv().await.unwrap().event_type(), "intent.executed");
    }
}
