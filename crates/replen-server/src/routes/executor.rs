//! Executor status and control endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::debug;

use crate::error::ApiResult;
use crate::state::AppState;
use replen_core::ExecutorStatus;

/// Executor status.
/// GET /executor/status
pub async fn executor_status(State(state): State<AppState>) -> ApiResult<Json<ExecutorStatus>> {
    Ok(Json(state.status_reporter().status()))
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    /// `triggered` when the running loop picked up the request,
    /// `scheduled` when a one-off scan was spawned instead.
    pub status: String,
}

/// Request an immediate scan.
/// POST /executor/scan
pub async fn trigger_scan(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<ScanResponse>)> {
    let scanner = state.scanner();

    let status = if scanner.trigger_scan().await {
        "triggered"
    } else {
        debug!("Scanner loop not running, spawning a one-off scan");
        tokio::spawn(async move {
            scanner.tick().await;
        });
        "scheduled"
    };

    Ok((
        StatusCode::ACCEPTED,
        Json(ScanResponse {
            status: status.to_string(),
        }),
    ))
}
