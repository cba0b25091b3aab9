//! replen-server - REST API server for replen.
//!
//! Accepts intents over HTTP, serves intent and executor status queries,
//! and runs the readiness scanner in the background.
//!
//! # Example
//!
//! ```ignore
//! use replen_core::{BackgroundRuntime, ReplenConfig};
//! use replen_server::{create_server, AppState};
//!
//! #[tokio::main]
//! async fn main() {
//!     let runtime = BackgroundRuntime::new(ReplenConfig::default()).unwrap();
//!     let state = AppState::new(runtime);
//!     let app = create_server(state);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{middleware as axum_middleware, Router};
use tower_http::trace::TraceLayer;

/// Create the server with all routes and middleware.
pub fn create_server(state: AppState) -> Router {
    routes::create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::cors_layer())
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
}
