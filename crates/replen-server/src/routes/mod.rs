//! Route definitions for the REST API.

mod executor;
mod health;
mod intents;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Intents
        .route("/intents", post(intents::create_intent))
        .route("/intents", get(intents::list_intents))
        .route("/intents/:id", get(intents::get_intent))
        .route("/intents/:id/cancel", post(intents::cancel_intent))
        // Executor
        .route("/executor/status", get(executor::executor_status))
        .route("/executor/scan", post(executor::trigger_scan))
        // Attach state
        .with_state(state)
}

pub use executor::*;
pub use health::*;
pub use intents::*;
