//! Upload intake
//!
//! Synchronous part of an import: resolve the owning project, parse the
//! sheet, check that anything at all validates, plan the session, and
//! enqueue its batches. Everything after the enqueue happens in the
//! worker pool.

use chrono::Utc;
use sitebeam_common::events::ImportEvent;
use uuid::Uuid;

use sitebeam_common::{Error, Result};

use crate::db;
use crate::models::{UploadSession, Zone};
use crate::services::row_transformer::transform_row;
use crate::services::sheet_reader;
use crate::AppState;

/// Submit parameters, already deserialized from the API layer
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub project_id: Uuid,
    pub zone_id: Option<Uuid>,
    pub actor_id: Uuid,
    pub source_path: String,
    pub batch_size: Option<u32>,
}

/// Accept an upload: fails before any session exists on parse errors or
/// when zero rows validate; otherwise persists the planned session and
/// enqueues every batch.
pub async fn submit_upload(state: &AppState, request: UploadRequest) -> Result<UploadSession> {
    let project = db::projects::load_project(&state.db, request.project_id).await?;
    let zone: Option<Zone> = match request.zone_id {
        Some(zone_id) => {
            let zone = db::projects::load_zone(&state.db, zone_id).await?;
            if zone.project_id != project.project_id {
                return Err(Error::InvalidInput(format!(
                    "Zone {} does not belong to project {}",
                    zone_id, project.project_id
                )));
            }
            Some(zone)
        }
        None => None,
    };

    let (meta, rows) =
        sheet_reader::read_sheet(std::path::Path::new(&request.source_path))?;

    let valid_rows = rows
        .iter()
        .filter(|row| transform_row(row, &project, zone.as_ref(), request.actor_id).is_ok())
        .count();
    if valid_rows == 0 {
        return Err(Error::Validation(format!(
            "No valid rows in {} ({} rows read)",
            meta.file_name, meta.row_count
        )));
    }

    let batch_size = request
        .batch_size
        .unwrap_or(state.config.default_batch_size);
    let mut session = UploadSession::plan(
        project.project_id,
        zone.map(|z| z.zone_id),
        request.actor_id,
        meta.file_name,
        meta.file_size,
        request.source_path,
        meta.row_count,
        batch_size,
    )?;

    db::sessions::save_session(&state.db, &mut session).await?;

    let batch_numbers: Vec<u32> = session.batches.iter().map(|b| b.batch_number).collect();
    db::queue::enqueue_batches(&state.db, session.session_id, &batch_numbers).await?;

    state
        .event_bus
        .emit(ImportEvent::SessionQueued {
            session_id: session.session_id,
            batch_count: batch_numbers.len(),
            timestamp: Utc::now(),
        })
        .ok();

    tracing::info!(
        session_id = %session.session_id,
        project_id = %session.project_id,
        total_rows = session.total_rows,
        batch_size = session.batch_size,
        batches = batch_numbers.len(),
        valid_rows,
        "Upload accepted and enqueued"
    );

    Ok(session)
}

/// Reset failed batches to pending and re-enqueue them
///
/// With `batch_number` set, retries that one batch; otherwise every
/// failed batch. Returns the session and the re-enqueued batch numbers.
pub async fn retry_batches(
    state: &AppState,
    session_id: Uuid,
    batch_number: Option<u32>,
) -> Result<(UploadSession, Vec<u32>)> {
    let mut session = db::sessions::load_session(&state.db, session_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Import session not found: {}", session_id)))?;

    let reset = match batch_number {
        Some(n) => {
            session.retry_batch(n)?;
            vec![n]
        }
        None => session.retry_all_failed(),
    };

    if reset.is_empty() {
        return Err(Error::State(format!(
            "Session {} has no failed batches to retry",
            session_id
        )));
    }

    db::sessions::save_session(&state.db, &mut session).await?;
    db::queue::enqueue_batches(&state.db, session_id, &reset).await?;

    tracing::info!(
        session_id = %session_id,
        batches = ?reset,
        "Failed batches re-enqueued"
    );

    Ok((session, reset))
}
