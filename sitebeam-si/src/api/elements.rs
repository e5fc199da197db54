//! Element read views
//!
//! List endpoint backed by the read-through view cache. Import writes
//! invalidate by project prefix, so a hit here is never older than the
//! last commit touching the project (within the TTL).

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::cache;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListElementsQuery {
    #[serde(default)]
    pub zone_id: Option<Uuid>,
}

/// GET /projects/{id}/elements
pub async fn list_elements(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<ListElementsQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let key = cache::elements_key(project_id, query.zone_id);

    if let Some(cached) = state.view_cache.get(&key).await {
        tracing::debug!(project_id = %project_id, "Element list served from cache");
        return Ok(Json(cached));
    }

    let elements = crate::db::elements::list_for_project(&state.db, project_id, query.zone_id)
        .await?;
    let value = serde_json::to_value(&elements)
        .map_err(|e| ApiError::Internal(format!("Failed to serialize elements: {}", e)))?;

    state.view_cache.put(key, value.clone()).await;

    Ok(Json(value))
}

/// Build element routes
pub fn element_routes() -> Router<AppState> {
    Router::new().route("/projects/:project_id/elements", get(list_elements))
}
