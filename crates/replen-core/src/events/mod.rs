//! Event system for intent lifecycle events
//!
//! This module provides:
//! - Event types for registry transitions (inserted, executed, failed, ...)
//! - Event bus for internal pub/sub

mod bus;
mod event;

pub use bus::{EventBus, EventSubscriber};
pub use event::IntentLifecycleEvent;
