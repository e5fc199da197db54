//! Operator maintenance endpoints

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::services::reaper;
use crate::AppState;

/// POST /maintenance/reap request
#[derive(Debug, Deserialize)]
pub struct ReapRequest {
    /// Threshold in minutes; defaults to the configured stall threshold
    #[serde(default)]
    pub older_than_minutes: Option<i64>,
    /// Target one session regardless of age
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub dry_run: bool,
}

/// POST /maintenance/reap response
#[derive(Debug, Serialize)]
pub struct ReapResponse {
    pub matched: Vec<Uuid>,
    pub reaped: usize,
    pub dry_run: bool,
}

/// POST /maintenance/reap
///
/// Close out in-progress sessions with no activity past the threshold.
pub async fn reap_stalled(
    State(state): State<AppState>,
    Json(request): Json<ReapRequest>,
) -> ApiResult<Json<ReapResponse>> {
    let minutes = request
        .older_than_minutes
        .unwrap_or(state.config.stall_threshold_minutes);

    let report = reaper::reap(
        &state.db,
        &state.event_bus,
        chrono::Duration::minutes(minutes),
        request.session_id,
        request.dry_run,
    )
    .await?;

    Ok(Json(ReapResponse {
        matched: report.matched,
        reaped: report.reaped,
        dry_run: report.dry_run,
    }))
}

/// Build maintenance routes
pub fn maintenance_routes() -> Router<AppState> {
    Router::new().route("/maintenance/reap", post(reap_stalled))
}
