//! Import session persistence
//!
//! The session document (batch list embedded as JSON) is upserted as a
//! whole, so readers always observe a consistent batch list + summary.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use sitebeam_common::{Error, Result};

use crate::models::{Batch, SessionStatus, SessionSummary, UploadSession};

fn parse_uuid(value: &str, field: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", field, e)))
}

fn parse_timestamp(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", field, e)))
        .map(|dt| dt.with_timezone(&Utc))
}

fn session_from_row(row: &SqliteRow) -> Result<UploadSession> {
    let session_id: String = row.get("session_id");
    let project_id: String = row.get("project_id");
    let zone_id: Option<String> = row.get("zone_id");
    let created_by: String = row.get("created_by");

    let batches: String = row.get("batches");
    let batches: Vec<Batch> = serde_json::from_str(&batches)
        .map_err(|e| Error::Internal(format!("Failed to deserialize batches: {}", e)))?;

    let summary: String = row.get("summary");
    let summary: SessionSummary = serde_json::from_str(&summary)
        .map_err(|e| Error::Internal(format!("Failed to deserialize summary: {}", e)))?;

    let status: String = row.get("status");
    let status = SessionStatus::parse(&status)?;

    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");
    let completed_at: Option<String> = row.get("completed_at");

    Ok(UploadSession {
        session_id: parse_uuid(&session_id, "session_id")?,
        project_id: parse_uuid(&project_id, "project_id")?,
        zone_id: zone_id
            .map(|z| parse_uuid(&z, "zone_id"))
            .transpose()?,
        file_name: row.get("file_name"),
        file_size: row.get::<i64, _>("file_size") as u64,
        source_path: row.get("source_path"),
        total_rows: row.get::<i64, _>("total_rows") as u32,
        batch_size: row.get::<i64, _>("batch_size") as u32,
        batches,
        summary,
        status,
        created_by: parse_uuid(&created_by, "created_by")?,
        created_at: parse_timestamp(&created_at, "created_at")?,
        updated_at: parse_timestamp(&updated_at, "updated_at")?,
        completed_at: completed_at
            .map(|s| parse_timestamp(&s, "completed_at"))
            .transpose()?,
    })
}

/// Owned bind values, prepared before any connection is acquired so the
/// upsert can be retried under lock contention.
#[derive(Clone)]
struct SaveParams {
    session_id: String,
    project_id: String,
    zone_id: Option<String>,
    file_name: String,
    file_size: i64,
    source_path: String,
    total_rows: i64,
    batch_size: i64,
    batches: String,
    summary: String,
    status: &'static str,
    created_by: String,
    created_at: String,
    updated_at: String,
    completed_at: Option<String>,
}

impl SaveParams {
    fn prepare(session: &UploadSession) -> Result<Self> {
        Ok(Self {
            session_id: session.session_id.to_string(),
            project_id: session.project_id.to_string(),
            zone_id: session.zone_id.map(|z| z.to_string()),
            file_name: session.file_name.clone(),
            file_size: session.file_size as i64,
            source_path: session.source_path.clone(),
            total_rows: session.total_rows as i64,
            batch_size: session.batch_size as i64,
            batches: serde_json::to_string(&session.batches)
                .map_err(|e| Error::Internal(format!("Failed to serialize batches: {}", e)))?,
            summary: serde_json::to_string(&session.summary)
                .map_err(|e| Error::Internal(format!("Failed to serialize summary: {}", e)))?,
            status: session.status.as_str(),
            created_by: session.created_by.to_string(),
            created_at: session.created_at.to_rfc3339(),
            updated_at: session.updated_at.to_rfc3339(),
            completed_at: session.completed_at.map(|dt| dt.to_rfc3339()),
        })
    }
}

async fn exec_save(pool: &SqlitePool, params: &SaveParams) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO import_sessions (
            session_id, project_id, zone_id, file_name, file_size, source_path,
            total_rows, batch_size, batches, summary, status,
            created_by, created_at, updated_at, completed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(session_id) DO UPDATE SET
            batches = excluded.batches,
            summary = excluded.summary,
            status = excluded.status,
            updated_at = excluded.updated_at,
            completed_at = excluded.completed_at
        "#,
    )
    .bind(&params.session_id)
    .bind(&params.project_id)
    .bind(&params.zone_id)
    .bind(&params.file_name)
    .bind(params.file_size)
    .bind(&params.source_path)
    .bind(params.total_rows)
    .bind(params.batch_size)
    .bind(&params.batches)
    .bind(&params.summary)
    .bind(params.status)
    .bind(&params.created_by)
    .bind(&params.created_at)
    .bind(&params.updated_at)
    .bind(&params.completed_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Upsert the whole session document, stamping updated_at
pub async fn save_session(pool: &SqlitePool, session: &mut UploadSession) -> Result<()> {
    session.updated_at = Utc::now();
    let params = SaveParams::prepare(session)?;
    exec_save(pool, &params).await
}

/// Like [`save_session`], retrying lock contention with backoff
///
/// Session-document saves race the other workers' batch transactions on
/// the same pool, so contention here is expected under load.
pub async fn save_session_with_retry(
    pool: &SqlitePool,
    session: &mut UploadSession,
    max_wait_ms: u64,
) -> Result<()> {
    session.updated_at = Utc::now();
    let params = SaveParams::prepare(session)?;
    crate::utils::retry_on_lock("save_session", max_wait_ms, || {
        let params = params.clone();
        async move { exec_save(pool, &params).await }
    })
    .await
}

/// Load one session document
pub async fn load_session(pool: &SqlitePool, session_id: Uuid) -> Result<Option<UploadSession>> {
    let row = sqlx::query("SELECT * FROM import_sessions WHERE session_id = ?")
        .bind(session_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(session_from_row).transpose()
}

/// In-progress sessions whose last update is older than the cutoff
pub async fn find_stalled(
    pool: &SqlitePool,
    cutoff: DateTime<Utc>,
) -> Result<Vec<UploadSession>> {
    let rows = sqlx::query(
        "SELECT * FROM import_sessions WHERE status = 'in_progress' AND updated_at < ? ORDER BY updated_at",
    )
    .bind(cutoff.to_rfc3339())
    .fetch_all(pool)
    .await?;

    rows.iter().map(session_from_row).collect()
}

/// Remove the session row itself (created data is handled by the caller)
pub async fn delete_session_row(pool: &SqlitePool, session_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM import_sessions WHERE session_id = ?")
        .bind(session_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}
