//! Batch transaction processor
//!
//! Runs one contiguous slice of rows through transform, duplicate check,
//! element persistence, and job generation inside a single transaction.
//! Either every surviving row of the batch commits, or none do.

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use sitebeam_common::Result;

use crate::db;
use crate::models::{
    BatchOutcome, Element, ElementStatus, Project, RowError, UploadSession, WorkflowCatalog, Zone,
};
use crate::services::row_transformer::transform_row;
use crate::services::sheet_reader::RawRow;

/// Process one batch of a session against the full parsed row set
///
/// Returns the batch outcome: `Success` commits the transaction with the
/// exact created-ID lists, `Failure` records a business failure after the
/// transaction is rolled back. Transient infrastructure errors propagate
/// as `Err` so the queue layer can retry the whole attempt with backoff.
///
/// Duplicate resolution: the lookup runs on the transaction's connection,
/// so it sees both rows committed by earlier batches and uncommitted
/// inserts from earlier rows of this batch. First occurrence in file
/// order wins; later duplicates are skipped, never overwritten.
pub async fn process_batch(
    pool: &SqlitePool,
    catalog: &WorkflowCatalog,
    session: &UploadSession,
    batch_number: u32,
    rows: &[RawRow],
    project: &Project,
    zone: Option<&Zone>,
    actor_id: Uuid,
) -> Result<BatchOutcome> {
    let batch = session.batch(batch_number)?;
    let start = (batch.start_row - 1) as usize;
    let end = (batch.end_row as usize).min(rows.len());
    let slice = &rows[start..end];

    let mut tx = pool.begin().await?;

    let mut element_ids = Vec::new();
    let mut job_ids = Vec::new();
    let mut duplicates_skipped = 0u32;
    let mut row_errors: Vec<RowError> = Vec::new();

    for row in slice {
        let payload = match transform_row(row, project, zone, actor_id) {
            Ok(payload) => payload,
            Err(row_error) => {
                tracing::debug!(
                    session_id = %session.session_id,
                    batch_number,
                    row = row_error.row,
                    reason = %row_error.reason,
                    "Row skipped by validation"
                );
                row_errors.push(row_error);
                continue;
            }
        };

        let existing = match db::elements::find_by_business_key(
            &mut *tx,
            payload.project_id,
            &payload.mark,
            &payload.level,
        )
        .await
        {
            Ok(existing) => existing,
            Err(err) => return abort(tx, batch_number, err, row_errors).await,
        };
        if existing.is_some() {
            duplicates_skipped += 1;
            continue;
        }

        let element = Element {
            element_id: Uuid::new_v4(),
            project_id: payload.project_id,
            zone_id: payload.zone_id,
            mark: payload.mark,
            level: payload.level,
            element_type: payload.element_type,
            material: payload.material,
            quantity: payload.quantity,
            weight_kg: payload.weight_kg,
            workflow: payload.workflow.clone(),
            status: ElementStatus::Planned,
            created_by: payload.created_by,
            created_at: Utc::now(),
        };

        if let Err(err) = db::elements::insert_element(&mut *tx, &element).await {
            return abort(tx, batch_number, err, row_errors).await;
        }
        element_ids.push(element.element_id);

        if let Some(workflow) = &payload.workflow {
            match crate::services::job_generator::generate_jobs(
                &mut *tx,
                catalog,
                element.element_id,
                workflow,
                actor_id,
            )
            .await
            {
                Ok(jobs) => job_ids.extend(jobs.into_iter().map(|j| j.job_id)),
                Err(err) => return abort(tx, batch_number, err, row_errors).await,
            }
        }
    }

    // Denormalized counters move with the same commit as the data.
    if let Err(err) = db::projects::adjust_counters(
        &mut *tx,
        project.project_id,
        zone.map(|z| z.zone_id),
        element_ids.len() as i64,
        job_ids.len() as i64,
    )
    .await
    {
        return abort(tx, batch_number, err, row_errors).await;
    }

    tx.commit().await?;

    tracing::info!(
        session_id = %session.session_id,
        batch_number,
        elements = element_ids.len(),
        jobs = job_ids.len(),
        duplicates_skipped,
        row_errors = row_errors.len(),
        "Batch committed"
    );

    Ok(BatchOutcome::Success {
        element_ids,
        job_ids,
        duplicates_skipped,
        row_errors,
    })
}

/// Roll back the batch transaction and map the error to an outcome
///
/// Transient lock contention propagates upward for a queue-level retry;
/// everything else records the batch as failed with no partial survivors.
async fn abort(
    tx: sqlx::Transaction<'_, sqlx::Sqlite>,
    batch_number: u32,
    err: sitebeam_common::Error,
    row_errors: Vec<RowError>,
) -> Result<BatchOutcome> {
    tx.rollback().await.ok();

    if err.is_transient() {
        return Err(err);
    }

    tracing::warn!(batch_number, error = %err, "Batch transaction aborted");
    Ok(BatchOutcome::Failure {
        error: err.to_string(),
        row_errors,
    })
}
