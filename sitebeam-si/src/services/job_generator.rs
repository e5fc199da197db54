//! Workflow job generation
//!
//! Expands an element's workflow assignment into its ordered job set using
//! the step-template catalog. Runs on the batch transaction's connection:
//! the element and its jobs commit together or not at all.

use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

use sitebeam_common::Result;

use crate::db;
use crate::models::{Job, JobStatus, WorkflowCatalog};

/// Gap between consecutive sort orders, leaving room for manual insertion
/// without renumbering
pub const SORT_ORDER_SPACING: i64 = 10;

/// Create one job per catalog step for the element, inside the caller's
/// transaction
///
/// A workflow name with no catalog entry yields an empty list without
/// error. Inherited behavior: it may mask a data-entry mistake, so it is
/// logged, but whether it should hard-fail is an open product question.
pub async fn generate_jobs(
    conn: &mut SqliteConnection,
    catalog: &WorkflowCatalog,
    element_id: Uuid,
    workflow: &str,
    actor_id: Uuid,
) -> Result<Vec<Job>> {
    let steps = match catalog.steps(workflow) {
        Some(steps) => steps,
        None => {
            tracing::warn!(
                element_id = %element_id,
                workflow,
                "No step template for workflow, generating no jobs"
            );
            return Ok(Vec::new());
        }
    };

    let now = Utc::now();
    let mut jobs = Vec::with_capacity(steps.len());
    for (index, title) in steps.iter().enumerate() {
        let job = Job {
            job_id: Uuid::new_v4(),
            element_id,
            title: title.clone(),
            sort_order: (index as i64 + 1) * SORT_ORDER_SPACING,
            status: JobStatus::NotStarted,
            created_by: actor_id,
            created_at: now,
        };
        db::jobs::insert_job(conn, &job).await?;
        jobs.push(job);
    }

    Ok(jobs)
}
