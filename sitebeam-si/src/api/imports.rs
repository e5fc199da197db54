//! Import API handlers
//!
//! Submit, status, detail, retry, and cleanup endpoints. Submission is
//! synchronous only up to the enqueue; batch processing happens in the
//! worker pool and is observed through the status endpoints.

use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{SessionStatus, SessionSummary, UploadSession};
use crate::services::rollback;
use crate::services::upload_intake::{self, UploadRequest};
use crate::AppState;

/// POST /imports request
#[derive(Debug, Deserialize)]
pub struct SubmitImportRequest {
    pub project_id: Uuid,
    #[serde(default)]
    pub zone_id: Option<Uuid>,
    pub actor_id: Uuid,
    /// Server-side path of the uploaded sheet
    pub source_path: String,
    #[serde(default)]
    pub batch_size: Option<u32>,
}

/// POST /imports response
#[derive(Debug, Serialize)]
pub struct SubmitImportResponse {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub total_rows: u32,
    pub batch_count: usize,
}

/// GET /imports/{id}/status response
#[derive(Debug, Serialize)]
pub struct ImportStatusResponse {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub percent: f64,
    pub message: String,
    pub summary: SessionSummary,
}

/// Cleanup/delete response
#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub session_id: Uuid,
    pub elements_removed: u64,
    pub jobs_removed: u64,
}

/// Retry response
#[derive(Debug, Serialize)]
pub struct RetryResponse {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub retried_batches: Vec<u32>,
}

async fn load_session(state: &AppState, session_id: Uuid) -> ApiResult<UploadSession> {
    crate::db::sessions::load_session(&state.db, session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Import session not found: {}", session_id)))
}

/// POST /imports
///
/// Accept an upload. Returns immediately with the session handle;
/// processing is asynchronous.
pub async fn submit_import(
    State(state): State<AppState>,
    Json(request): Json<SubmitImportRequest>,
) -> ApiResult<Json<SubmitImportResponse>> {
    let session = upload_intake::submit_upload(
        &state,
        UploadRequest {
            project_id: request.project_id,
            zone_id: request.zone_id,
            actor_id: request.actor_id,
            source_path: request.source_path,
            batch_size: request.batch_size,
        },
    )
    .await?;

    Ok(Json(SubmitImportResponse {
        session_id: session.session_id,
        status: session.status,
        total_rows: session.total_rows,
        batch_count: session.batches.len(),
    }))
}

/// GET /imports/{id}/status
///
/// Coarse progress: stage, percent, human-readable message.
pub async fn import_status(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<ImportStatusResponse>> {
    let session = load_session(&state, session_id).await?;

    Ok(Json(ImportStatusResponse {
        session_id: session.session_id,
        status: session.status,
        percent: session.percent_complete(),
        message: session.progress_message(),
        summary: session.summary.clone(),
    }))
}

/// GET /imports/{id}
///
/// Full session document including per-batch detail.
pub async fn import_detail(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<UploadSession>> {
    Ok(Json(load_session(&state, session_id).await?))
}

/// POST /imports/{id}/retry
pub async fn retry_all_failed(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<RetryResponse>> {
    let (session, retried_batches) =
        upload_intake::retry_batches(&state, session_id, None).await?;

    Ok(Json(RetryResponse {
        session_id,
        status: session.status,
        retried_batches,
    }))
}

/// POST /imports/{id}/batches/{n}/retry
pub async fn retry_one_batch(
    State(state): State<AppState>,
    Path((session_id, batch_number)): Path<(Uuid, u32)>,
) -> ApiResult<Json<RetryResponse>> {
    let (session, retried_batches) =
        upload_intake::retry_batches(&state, session_id, Some(batch_number)).await?;

    Ok(Json(RetryResponse {
        session_id,
        status: session.status,
        retried_batches,
    }))
}

/// POST /imports/{id}/cleanup
///
/// Delete failed-batch residue, keeping the session and its successful
/// batches.
pub async fn cleanup_failed(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<CleanupResponse>> {
    let mut session = load_session(&state, session_id).await?;
    let report =
        rollback::delete_failed_residue(&state.db, &state.view_cache, &mut session).await?;

    Ok(Json(CleanupResponse {
        session_id,
        elements_removed: report.elements_removed,
        jobs_removed: report.jobs_removed,
    }))
}

/// DELETE /imports/{id}/batches/{n}
pub async fn delete_batch(
    State(state): State<AppState>,
    Path((session_id, batch_number)): Path<(Uuid, u32)>,
) -> ApiResult<Json<CleanupResponse>> {
    let mut session = load_session(&state, session_id).await?;
    let report =
        rollback::delete_batch_data(&state.db, &state.view_cache, &mut session, batch_number)
            .await?;

    Ok(Json(CleanupResponse {
        session_id,
        elements_removed: report.elements_removed,
        jobs_removed: report.jobs_removed,
    }))
}

/// DELETE /imports/{id}
///
/// Cascading delete of everything the session created, plus the session
/// itself.
pub async fn delete_import(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<CleanupResponse>> {
    let session = load_session(&state, session_id).await?;
    let report = rollback::delete_session(&state.db, &state.view_cache, &session).await?;

    Ok(Json(CleanupResponse {
        session_id,
        elements_removed: report.elements_removed,
        jobs_removed: report.jobs_removed,
    }))
}

/// Build import routes
pub fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/imports", post(submit_import))
        .route("/imports/:session_id", get(import_detail).delete(delete_import))
        .route("/imports/:session_id/status", get(import_status))
        .route("/imports/:session_id/retry", post(retry_all_failed))
        .route("/imports/:session_id/cleanup", post(cleanup_failed))
        .route(
            "/imports/:session_id/batches/:batch_number/retry",
            post(retry_one_batch),
        )
        .route(
            "/imports/:session_id/batches/:batch_number",
            delete(delete_batch),
        )
}
