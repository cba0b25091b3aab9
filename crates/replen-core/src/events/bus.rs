//! Lifecycle event fan-out for intents.
//!
//! The registry publishes while it holds its lock, so every subscriber sees
//! one intent's events in revision order. Publishing never waits on a
//! subscriber; one that falls behind by more than the channel capacity loses
//! the oldest events.

use tokio::sync::broadcast;

use crate::events::IntentLifecycleEvent;

/// Events buffered per subscriber before it starts to lag
const DEFAULT_CAPACITY: usize = 1024;

/// Broadcasts [`IntentLifecycleEvent`]s from the registry to watchers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<IntentLifecycleEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Watch every intent. Only events published after this call are seen.
    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
            intent_id: None,
        }
    }

    /// Watch a single intent by ID.
    ///
    /// Events for other intents are discarded on receipt. Subscribe before
    /// submitting the intent to be sure of seeing its `Inserted` event.
    pub fn subscribe_intent(&self, intent_id: impl Into<String>) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
            intent_id: Some(intent_id.into()),
        }
    }

    /// Publish to all current watchers. Dropped if there are none.
    pub fn emit(&self, event: IntentLifecycleEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half of an [`EventBus`] subscription.
pub struct EventSubscriber {
    receiver: broadcast::Receiver<IntentLifecycleEvent>,
    intent_id: Option<String>,
}

impl EventSubscriber {
    /// The intent this subscriber is scoped to, if any.
    pub fn intent_id(&self) -> Option<&str> {
        self.intent_id.as_deref()
    }

    fn wants(&self, event: &IntentLifecycleEvent) -> bool {
        self.intent_id
            .as_deref()
            .map_or(true, |id| event.intent_id() == id)
    }

    /// Next matching event, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<IntentLifecycleEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        intent_id = self.intent_id.as_deref().unwrap_or("*"),
                        "Intent event subscriber lagged"
                    );
                }
            }
        }
    }

    /// Next matching event already buffered, without waiting.
    pub fn try_recv(&mut self) -> Option<IntentLifecycleEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Wait for the event that resolves the intent: executed, failed or
    /// cancelled. Retries and re-inserts are skipped.
    ///
    /// On an unscoped subscriber this returns the first resolution of any
    /// intent.
    pub async fn resolution(&mut self) -> Option<IntentLifecycleEvent> {
        while let Some(event) = self.recv().await {
            if event.is_resolution() {
                return Some(event);
            }
        }
        None
    }
}
