//! Server state management.

use std::sync::Arc;

use replen_core::{BackgroundRuntime, IntentRegistry, ReadinessScanner, StatusReporter};

/// Shared application state.
///
/// Cheap to clone; every clone points at the same runtime.
#[derive(Clone)]
pub struct AppState {
    runtime: Arc<BackgroundRuntime>,
}

impl AppState {
    /// Create state around a constructed runtime.
    pub fn new(runtime: BackgroundRuntime) -> Self {
        Self::from_arc(Arc::new(runtime))
    }

    /// Create state around a shared runtime.
    pub fn from_arc(runtime: Arc<BackgroundRuntime>) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &Arc<BackgroundRuntime> {
        &self.runtime
    }

    pub fn registry(&self) -> Arc<IntentRegistry> {
        self.runtime.registry()
    }

    pub fn scanner(&self) -> Arc<ReadinessScanner> {
        self.runtime.scanner()
    }

    pub fn status_reporter(&self) -> StatusReporter {
        self.runtime.status_reporter()
    }
}
