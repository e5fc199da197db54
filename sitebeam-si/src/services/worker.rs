//! Import worker pool
//!
//! Asynchronous workers pull (session, batch) units from the durable
//! queue and drive them to completion: process the batch, fold the
//! outcome into the session document, and run the terminal-state triggers
//! (rollback / integrity verification) once the last batch lands.

use chrono::Utc;
use sitebeam_common::events::ImportEvent;
use std::time::Duration;
use tokio::task::JoinHandle;

use sitebeam_common::Result;

use crate::cache;
use crate::db;
use crate::db::queue::QueueUnit;
use crate::models::{BatchOutcome, BatchStatus, UploadSession};
use crate::services::{batch_processor, rollback, sheet_reader};
use crate::AppState;

/// Spawn the configured number of worker tasks
pub fn spawn_workers(state: AppState) -> Vec<JoinHandle<()>> {
    (0..state.config.worker_count)
        .map(|worker_id| {
            let state = state.clone();
            tokio::spawn(async move {
                run_worker(state, worker_id).await;
            })
        })
        .collect()
}

/// Drain the queue on the current task: claim and process units until no
/// more are available. Backbone of the test suite; the serving path uses
/// the long-running workers instead.
pub async fn run_until_idle(state: &AppState) -> Result<usize> {
    let mut processed = 0;
    while let Some(unit) = db::queue::claim_next(&state.db).await? {
        process_unit(state, &unit).await?;
        processed += 1;
    }
    Ok(processed)
}

async fn run_worker(state: AppState, worker_id: usize) {
    tracing::info!(worker_id, "Import worker started");
    let poll_interval = Duration::from_millis(state.config.poll_interval_ms);

    loop {
        match db::queue::claim_next(&state.db).await {
            Ok(Some(unit)) => {
                if let Err(e) = process_unit(&state, &unit).await {
                    tracing::error!(
                        worker_id,
                        session_id = %unit.session_id,
                        batch_number = unit.batch_number,
                        error = %e,
                        "Batch unit processing failed"
                    );
                }
            }
            Ok(None) => tokio::time::sleep(poll_interval).await,
            Err(e) => {
                tracing::error!(worker_id, error = %e, "Queue claim failed");
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}

/// Drive one claimed unit to completion (commit or recorded failure)
async fn process_unit(state: &AppState, unit: &QueueUnit) -> Result<()> {
    let Some(mut session) = db::sessions::load_session(&state.db, unit.session_id).await? else {
        tracing::warn!(session_id = %unit.session_id, "Queue unit for deleted session, dropping");
        return db::queue::mark_done(&state.db, unit.queue_id).await;
    };

    // Stale deliveries (at-least-once queue) and reaped/cleaned sessions:
    // only a pending or processing batch may run.
    let batch_status = session.batch(unit.batch_number)?.status;
    if !matches!(batch_status, BatchStatus::Pending | BatchStatus::Processing) {
        tracing::debug!(
            session_id = %unit.session_id,
            batch_number = unit.batch_number,
            status = ?batch_status,
            "Skipping unit for already-settled batch"
        );
        return db::queue::mark_done(&state.db, unit.queue_id).await;
    }

    session.mark_processing(unit.batch_number)?;
    save_session(state, &mut session).await?;

    state
        .event_bus
        .emit(ImportEvent::BatchStarted {
            session_id: session.session_id,
            batch_number: unit.batch_number,
            timestamp: Utc::now(),
        })
        .ok();

    let outcome = attempt_batch(state, &session, unit.batch_number).await;

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(err) if err.is_transient() => {
            // Queue-level retry with backoff; the batch stays open.
            let requeued = db::queue::retry_unit(
                &state.db,
                unit,
                state.config.queue_max_attempts,
                state.config.queue_backoff_ms,
            )
            .await?;
            if requeued {
                tracing::warn!(
                    session_id = %session.session_id,
                    batch_number = unit.batch_number,
                    attempts = unit.attempts,
                    "Transient failure, unit requeued with backoff"
                );
                return Ok(());
            }
            BatchOutcome::Failure {
                error: format!(
                    "Database contention persisted across {} attempts",
                    unit.attempts
                ),
                row_errors: Vec::new(),
            }
        }
        Err(err) => BatchOutcome::Failure {
            error: err.to_string(),
            row_errors: Vec::new(),
        },
    };

    let success = matches!(outcome, BatchOutcome::Success { .. });
    let (elements_created, duplicates_skipped) = match &outcome {
        BatchOutcome::Success {
            element_ids,
            duplicates_skipped,
            ..
        } => (element_ids.len(), *duplicates_skipped as usize),
        BatchOutcome::Failure { .. } => (0, 0),
    };

    session.apply_batch_outcome(unit.batch_number, outcome)?;
    save_session(state, &mut session).await?;
    db::queue::mark_done(&state.db, unit.queue_id).await?;

    if success {
        state
            .view_cache
            .invalidate_prefix(&cache::project_prefix(session.project_id))
            .await;
    }

    state
        .event_bus
        .emit(ImportEvent::BatchFinished {
            session_id: session.session_id,
            batch_number: unit.batch_number,
            success,
            elements_created,
            duplicates_skipped,
            timestamp: Utc::now(),
        })
        .ok();

    if session.is_terminal() {
        finalize_session(state, &mut session).await?;
    }

    Ok(())
}

/// Parse the source sheet and run the batch processor
async fn attempt_batch(
    state: &AppState,
    session: &UploadSession,
    batch_number: u32,
) -> Result<BatchOutcome> {
    let project = db::projects::load_project(&state.db, session.project_id).await?;
    let zone = match session.zone_id {
        Some(zone_id) => Some(db::projects::load_zone(&state.db, zone_id).await?),
        None => None,
    };

    // Workers may run in a different process than the one that accepted
    // the upload, so the row set is re-read from the durable source file.
    let (_, rows) = match sheet_reader::read_sheet(std::path::Path::new(&session.source_path)) {
        Ok(parsed) => parsed,
        Err(e) => {
            return Ok(BatchOutcome::Failure {
                error: format!("Source file unreadable: {}", e),
                row_errors: Vec::new(),
            })
        }
    };

    batch_processor::process_batch(
        &state.db,
        &state.catalog,
        session,
        batch_number,
        &rows,
        &project,
        zone.as_ref(),
        session.created_by,
    )
    .await
}

/// Terminal-state bookkeeping: events, total-failure rollback, integrity
/// verification
async fn finalize_session(state: &AppState, session: &mut UploadSession) -> Result<()> {
    state
        .event_bus
        .emit(ImportEvent::SessionFinished {
            session_id: session.session_id,
            status: session.status.as_str().to_string(),
            timestamp: Utc::now(),
        })
        .ok();

    // Total failure: nothing was created and at least one batch failed.
    // A completed all-duplicates re-upload also creates zero elements but
    // has no failed batches, and is not rolled back.
    let total_failure = session.summary.total_elements_created == 0
        && session.summary.failed_batches > 0;

    if total_failure {
        let report = rollback::complete_rollback(&state.db, &state.view_cache, session).await?;
        emit_rollback(state, session, report);
        return Ok(());
    }

    match rollback::verify_integrity(&state.db, session).await {
        Ok(()) => {
            tracing::info!(
                session_id = %session.session_id,
                status = session.status.as_str(),
                "Session finished, integrity verified"
            );
            Ok(())
        }
        Err(err @ sitebeam_common::Error::Integrity(_)) => {
            tracing::error!(
                session_id = %session.session_id,
                error = %err,
                "Integrity verification failed, rolling back"
            );
            let report =
                rollback::complete_rollback(&state.db, &state.view_cache, session).await?;
            emit_rollback(state, session, report);
            Err(err)
        }
        Err(err) => Err(err),
    }
}

fn emit_rollback(state: &AppState, session: &UploadSession, report: rollback::RollbackReport) {
    state
        .event_bus
        .emit(ImportEvent::SessionRolledBack {
            session_id: session.session_id,
            elements_removed: report.elements_removed as usize,
            jobs_removed: report.jobs_removed as usize,
            timestamp: Utc::now(),
        })
        .ok();
}

async fn save_session(state: &AppState, session: &mut UploadSession) -> Result<()> {
    db::sessions::save_session_with_retry(&state.db, session, state.config.db_max_lock_wait_ms)
        .await
}
