//! Integration tests for the intent registry under concurrent access.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use chrono::{Duration as ChronoDuration, Utc};
use replen_core::{
    Amount, AttemptOutcome, CommitOutcome, EventBus, Intent, IntentAction, IntentLifecycleEvent,
    IntentRegistry, IntentStatus,
};

fn intent(id: String, offset_secs: i64) -> Intent {
    Intent::new(
        id,
        IntentAction::Rebalance,
        "0xabc",
        "pool-7",
        Amount::from_minor_units(1_000),
        "0xsigner",
        Utc::now() + ChronoDuration::seconds(offset_secs),
    )
}

#[test]
fn test_concurrent_inserts_are_all_visible() {
    let registry = Arc::new(IntentRegistry::new());

    let handles: Vec<_> = (0..8)
        .map(|writer| {
            let registry = registry.clone();
            thread::spawn(move || {
                for n in 0..250 {
                    registry.insert(intent(format!("w{}-{}", writer, n), -1));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(registry.len(), 2_000);
    assert_eq!(registry.take_ready(Utc::now()).len(), 2_000);
}

#[test]
fn test_stats_stay_consistent_while_committing() {
    let registry = Arc::new(IntentRegistry::new());
    for n in 0..500 {
        registry.insert(intent(format!("i{}", n), -1));
    }

    let committer = {
        let registry = registry.clone();
        thread::spawn(move || {
            for intent in registry.take_ready(Utc::now()) {
                registry.commit_result(
                    &intent.id,
                    intent.revision,
                    AttemptOutcome::Succeeded,
                    Utc::now(),
                );
            }
        })
    };

    let observer = {
        let registry = registry.clone();
        thread::spawn(move || {
            for _ in 0..200 {
                let stats = registry.stats(Utc::now());
                assert!(stats.pending_due + stats.executed <= stats.total);
                assert_eq!(stats.total, 500);
            }
        })
    };

    committer.join().unwrap();
    observer.join().unwrap();

    let stats = registry.stats(Utc::now());
    assert_eq!(stats.executed, 500);
    assert_eq!(stats.pending_due, 0);
}

#[test]
fn test_racing_commits_execute_exactly_once() {
    let registry = Arc::new(IntentRegistry::new());
    registry.insert(intent("contended".to_string(), -1));
    let snapshot = registry.take_ready(Utc::now()).remove(0);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            let snapshot = snapshot.clone();
            thread::spawn(move || {
                registry.commit_result(
                    &snapshot.id,
                    snapshot.revision,
                    AttemptOutcome::Succeeded,
                    Utc::now(),
                )
            })
        })
        .collect();

    let outcomes: Vec<CommitOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let executed = outcomes
        .iter()
        .filter(|o| **o == CommitOutcome::Executed)
        .count();

    assert_eq!(executed, 1);
    let stored = registry.get("contended").unwrap();
    assert_eq!(stored.status, IntentStatus::Executed);
    assert_eq!(stored.attempts, 1);
}

#[test]
fn test_cancel_races_with_commit() {
    let registry = Arc::new(IntentRegistry::new());
    registry.insert(intent("race".to_string(), -1));
    let snapshot = registry.take_ready(Utc::now()).remove(0);

    let cancel = {
        let registry = registry.clone();
        thread::spawn(move || registry.cancel("race", Utc::now()).is_ok())
    };
    let commit = {
        let registry = registry.clone();
        thread::spawn(move || {
            registry.commit_result(
                &snapshot.id,
                snapshot.revision,
                AttemptOutcome::Succeeded,
                Utc::now(),
            )
        })
    };

    let cancelled = cancel.join().unwrap();
    let committed = commit.join().unwrap();

    // Exactly one of the two transitions wins.
    let stored = registry.get("race").unwrap();
    if cancelled {
        assert_eq!(stored.status, IntentStatus::Cancelled);
        assert!(matches!(committed, CommitOutcome::Ignored(_)));
        assert!(stored.executed_at.is_none());
    } else {
        assert_eq!(stored.status, IntentStatus::Executed);
        assert_eq!(committed, CommitOutcome::Executed);
    }
}

#[test]
fn test_snapshots_never_show_torn_intents() {
    let registry = Arc::new(IntentRegistry::new());
    let done = Arc::new(AtomicBool::new(false));
    let ids: Vec<String> = (0..16).map(|n| format!("shared-{}", n)).collect();

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let registry = registry.clone();
            let ids = ids.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    for id in &ids {
                        registry.insert(intent(id.clone(), -1));
                    }
                }
            })
        })
        .collect();

    let committer = {
        let registry = registry.clone();
        let done = done.clone();
        thread::spawn(move || {
            while !done.load(Ordering::SeqCst) {
                for intent in registry.take_ready(Utc::now()) {
                    registry.commit_result(
                        &intent.id,
                        intent.revision,
                        AttemptOutcome::Succeeded,
                        Utc::now(),
                    );
                }
            }
        })
    };

    let reader = {
        let registry = registry.clone();
        let done = done.clone();
        thread::spawn(move || {
            let mut snapshots = 0;
            while !done.load(Ordering::SeqCst) || snapshots == 0 {
                for intent in registry.get_all() {
                    assert!(intent.revision > 0);
                    assert_eq!(intent.executed_at.is_some(), intent.status.is_resolved());
                    assert!(intent.status == IntentStatus::Pending || intent.attempts == 1);
                    if let Some(executed_at) = intent.executed_at {
                        assert!(executed_at >= intent.execute_at);
                    }
                }
                snapshots += 1;
            }
            snapshots
        })
    };

    for writer in writers {
        writer.join().unwrap();
    }
    done.store(true, Ordering::SeqCst);
    committer.join().unwrap();
    assert!(reader.join().unwrap() > 0);

    let all = registry.get_all();
    assert_eq!(all.len(), ids.len());
    assert!(all.iter().all(|i| ids.contains(&i.id)));
}

#[test]
fn test_concurrent_upserts_publish_in_revision_order() {
    let events = EventBus::new();
    let registry = Arc::new(IntentRegistry::with_event_bus(events.clone()));
    let mut watcher = events.subscribe_intent("upserted");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    registry.insert(intent("upserted".to_string(), 60));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut revisions = Vec::new();
    while let Some(event) = watcher.try_recv() {
        match event {
            IntentLifecycleEvent::Inserted {
                replaced, revision, ..
            } => {
                // Only the first insert found the slot empty
                assert_eq!(replaced, !revisions.is_empty());
                revisions.push(revision);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    assert_eq!(revisions.len(), 400);
    assert!(revisions.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(
        registry.get("upserted").unwrap().revision,
        *revisions.last().unwrap()
    );
}
