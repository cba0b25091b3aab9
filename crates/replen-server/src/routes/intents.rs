//! Intent submission and query endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use replen_core::{Intent, IntentDraft, IntentStatus};

/// Create an intent.
/// POST /intents
pub async fn create_intent(
    State(state): State<AppState>,
    Json(draft): Json<IntentDraft>,
) -> ApiResult<(StatusCode, Json<Intent>)> {
    let intent = state.runtime().submit(draft)?;

    info!(
        intent_id = %intent.id,
        action = %intent.action,
        pool_id = %intent.pool_id,
        execute_at = %intent.execute_at,
        "Intent accepted"
    );

    Ok((StatusCode::CREATED, Json(intent)))
}

/// Query parameters for listing intents.
#[derive(Debug, Deserialize)]
pub struct ListIntentsQuery {
    /// Only return intents in this status (e.g. `PENDING`).
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListIntentsResponse {
    pub results: Vec<Intent>,
    pub total: usize,
}

/// List intents, newest execution time last.
/// GET /intents
pub async fn list_intents(
    State(state): State<AppState>,
    Query(query): Query<ListIntentsQuery>,
) -> ApiResult<Json<ListIntentsResponse>> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            s.parse::<IntentStatus>()
                .map_err(|_| ApiError::bad_request(format!("Unknown intent status: {}", s)))
        })
        .transpose()?;

    let mut results: Vec<Intent> = state
        .registry()
        .get_all()
        .into_iter()
        .filter(|intent| status.map_or(true, |s| intent.status == s))
        .collect();
    results.sort_by(|a, b| {
        a.execute_at
            .cmp(&b.execute_at)
            .then_with(|| a.id.cmp(&b.id))
    });

    Ok(Json(ListIntentsResponse {
        total: results.len(),
        results,
    }))
}

/// Get a single intent.
/// GET /intents/:id
pub async fn get_intent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Intent>> {
    state
        .registry()
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Intent {} not found", id)))
}

/// Cancel a pending intent.
/// POST /intents/:id/cancel
pub async fn cancel_intent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Intent>> {
    let intent = state.registry().cancel(&id, Utc::now())?;
    info!(intent_id = %intent.id, "Intent cancelled");
    Ok(Json(intent))
}
