//! Rollback, integrity verification, and cleanup
//!
//! Compensation for total failure and for detected inconsistency: deletes
//! everything a session created, walks the cached counters back, and
//! invalidates the project's read views. Partial success is never rolled
//! back; failed batches only ever get retried or explicitly cleaned.

use sqlx::SqlitePool;
use uuid::Uuid;

use sitebeam_common::{Error, Result};

use crate::cache::{self, ViewCache};
use crate::db;
use crate::models::{BatchStatus, SessionStatus, UploadSession};

/// What a rollback or cleanup pass actually removed
#[derive(Debug, Clone, Copy, Default)]
pub struct RollbackReport {
    pub elements_removed: u64,
    pub jobs_removed: u64,
}

/// Delete the given elements and their jobs in one transaction, adjusting
/// the denormalized counters by the numbers actually removed.
async fn delete_created(
    pool: &SqlitePool,
    project_id: Uuid,
    zone_id: Option<Uuid>,
    element_ids: &[Uuid],
) -> Result<RollbackReport> {
    if element_ids.is_empty() {
        return Ok(RollbackReport::default());
    }

    let mut tx = pool.begin().await?;
    let jobs_removed = db::jobs::delete_by_element_ids(&mut *tx, element_ids).await?;
    let elements_removed = db::elements::delete_by_ids(&mut *tx, element_ids).await?;
    db::projects::adjust_counters(
        &mut *tx,
        project_id,
        zone_id,
        -(elements_removed as i64),
        -(jobs_removed as i64),
    )
    .await?;
    tx.commit().await?;

    Ok(RollbackReport {
        elements_removed,
        jobs_removed,
    })
}

/// Roll back everything the session created and mark it failed
///
/// Triggered automatically on total failure (zero created elements with
/// failed batches) and on integrity-check failure after completion.
pub async fn complete_rollback(
    pool: &SqlitePool,
    view_cache: &ViewCache,
    session: &mut UploadSession,
) -> Result<RollbackReport> {
    let element_ids: Vec<Uuid> = session
        .batches
        .iter()
        .flat_map(|b| b.element_ids.iter().copied())
        .collect();

    let report =
        delete_created(pool, session.project_id, session.zone_id, &element_ids).await?;

    session.status = SessionStatus::Failed;
    session.completed_at = Some(chrono::Utc::now());
    db::sessions::save_session(pool, session).await?;

    view_cache
        .invalidate_prefix(&cache::project_prefix(session.project_id))
        .await;

    tracing::warn!(
        session_id = %session.session_id,
        elements_removed = report.elements_removed,
        jobs_removed = report.jobs_removed,
        "Session rolled back"
    );

    Ok(report)
}

/// Recount persisted records against the session's claims
///
/// Defense against partial commits surviving infrastructure failure
/// despite transactional intent: every id recorded by a successful batch
/// must still be persisted, in exactly the claimed numbers.
pub async fn verify_integrity(pool: &SqlitePool, session: &UploadSession) -> Result<()> {
    let mut element_ids = Vec::new();
    let mut job_ids = Vec::new();
    for batch in &session.batches {
        if batch.status == BatchStatus::Success {
            element_ids.extend(batch.element_ids.iter().copied());
            job_ids.extend(batch.job_ids.iter().copied());
        }
    }

    let persisted_elements = db::elements::count_by_ids(pool, &element_ids).await?;
    let persisted_jobs = db::jobs::count_by_ids(pool, &job_ids).await?;

    let claimed_elements = session.summary.total_elements_created as u64;
    let claimed_jobs = session.summary.total_jobs_created as u64;

    if persisted_elements != claimed_elements || persisted_jobs != claimed_jobs {
        return Err(Error::Integrity(format!(
            "Session {} claims {} elements / {} jobs, found {} / {}",
            session.session_id, claimed_elements, claimed_jobs, persisted_elements, persisted_jobs
        )));
    }

    Ok(())
}

/// Delete one batch's created data and record the batch as cleaned
pub async fn delete_batch_data(
    pool: &SqlitePool,
    view_cache: &ViewCache,
    session: &mut UploadSession,
    batch_number: u32,
) -> Result<RollbackReport> {
    let element_ids = session.batch(batch_number)?.element_ids.clone();
    let report =
        delete_created(pool, session.project_id, session.zone_id, &element_ids).await?;

    session.apply_batch_outcome(
        batch_number,
        crate::models::BatchOutcome::Failure {
            error: "Batch data deleted by cleanup".to_string(),
            row_errors: Vec::new(),
        },
    )?;
    db::sessions::save_session(pool, session).await?;

    view_cache
        .invalidate_prefix(&cache::project_prefix(session.project_id))
        .await;

    Ok(report)
}

/// Delete residue of every failed batch, keeping the session
///
/// Failed batches abort atomically, so their created lists are normally
/// empty and this removes nothing; it exists for residue detected after
/// infrastructure failures.
pub async fn delete_failed_residue(
    pool: &SqlitePool,
    view_cache: &ViewCache,
    session: &mut UploadSession,
) -> Result<RollbackReport> {
    let element_ids: Vec<Uuid> = session
        .failed_batches()
        .iter()
        .flat_map(|b| b.element_ids.iter().copied())
        .collect();

    let report =
        delete_created(pool, session.project_id, session.zone_id, &element_ids).await?;

    for batch in session.batches.iter_mut() {
        if batch.status == BatchStatus::Failed {
            batch.element_ids = Vec::new();
            batch.job_ids = Vec::new();
        }
    }
    session.recompute();
    db::sessions::save_session(pool, session).await?;

    view_cache
        .invalidate_prefix(&cache::project_prefix(session.project_id))
        .await;

    Ok(report)
}

/// Cascading delete: everything the session created, its queue rows, the
/// session row, and the uploaded source file
pub async fn delete_session(
    pool: &SqlitePool,
    view_cache: &ViewCache,
    session: &UploadSession,
) -> Result<RollbackReport> {
    let element_ids: Vec<Uuid> = session
        .batches
        .iter()
        .flat_map(|b| b.element_ids.iter().copied())
        .collect();

    let report =
        delete_created(pool, session.project_id, session.zone_id, &element_ids).await?;

    db::queue::delete_for_session(pool, session.session_id).await?;
    db::sessions::delete_session_row(pool, session.session_id).await?;

    if let Err(e) = std::fs::remove_file(&session.source_path) {
        tracing::debug!(
            session_id = %session.session_id,
            source_path = %session.source_path,
            error = %e,
            "Source file already gone"
        );
    }

    view_cache
        .invalidate_prefix(&cache::project_prefix(session.project_id))
        .await;

    tracing::info!(
        session_id = %session.session_id,
        elements_removed = report.elements_removed,
        jobs_removed = report.jobs_removed,
        "Session deleted"
    );

    Ok(report)
}
