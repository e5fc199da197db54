//! Durable batch work queue
//!
//! One row per (session, batch) unit. Workers claim units with a single
//! UPDATE ... RETURNING, which SQLite serializes, so a unit is handed to
//! exactly one worker. The claim skips any session that already has a
//! running unit: batches of one session are never processed concurrently,
//! which keeps the session document single-writer.

use chrono::{Duration, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use sitebeam_common::{Error, Result};

/// One claimed (session, batch) unit
#[derive(Debug, Clone)]
pub struct QueueUnit {
    pub queue_id: i64,
    pub session_id: Uuid,
    pub batch_number: u32,
    /// Attempts including the current one
    pub attempts: u32,
}

/// Enqueue (or re-enqueue after a retry) the given batches of a session
///
/// Re-enqueueing resets the unit to queued and makes it immediately
/// available; the per-unit attempt counter starts over.
pub async fn enqueue_batches(
    pool: &SqlitePool,
    session_id: Uuid,
    batch_numbers: &[u32],
) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    for batch_number in batch_numbers {
        sqlx::query(
            r#"
            INSERT INTO import_queue (session_id, batch_number, state, attempts, available_at)
            VALUES (?, ?, 'queued', 0, ?)
            ON CONFLICT(session_id, batch_number) DO UPDATE SET
                state = 'queued',
                attempts = 0,
                available_at = excluded.available_at,
                claimed_at = NULL
            "#,
        )
        .bind(session_id.to_string())
        .bind(*batch_number as i64)
        .bind(&now)
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// Claim the next available unit, if any
///
/// Units are offered in enqueue order (batch-number order within a
/// session); sessions with a unit already running are skipped.
pub async fn claim_next(pool: &SqlitePool) -> Result<Option<QueueUnit>> {
    let now = Utc::now().to_rfc3339();
    let row = sqlx::query(
        r#"
        UPDATE import_queue
        SET state = 'running', claimed_at = ?, attempts = attempts + 1
        WHERE queue_id = (
            SELECT q.queue_id FROM import_queue q
            WHERE q.state = 'queued'
              AND q.available_at <= ?
              AND NOT EXISTS (
                  SELECT 1 FROM import_queue r
                  WHERE r.session_id = q.session_id AND r.state = 'running'
              )
            ORDER BY q.queue_id
            LIMIT 1
        )
        RETURNING queue_id, session_id, batch_number, attempts
        "#,
    )
    .bind(&now)
    .bind(&now)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let session_id: String = row.get("session_id");
            Ok(Some(QueueUnit {
                queue_id: row.get("queue_id"),
                session_id: Uuid::parse_str(&session_id)
                    .map_err(|e| Error::Internal(format!("Failed to parse session_id: {}", e)))?,
                batch_number: row.get::<i64, _>("batch_number") as u32,
                attempts: row.get::<i64, _>("attempts") as u32,
            }))
        }
        None => Ok(None),
    }
}

/// Mark a claimed unit finished (batch committed or recorded failed)
pub async fn mark_done(pool: &SqlitePool, queue_id: i64) -> Result<()> {
    sqlx::query("UPDATE import_queue SET state = 'done' WHERE queue_id = ?")
        .bind(queue_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Push a claimed unit back with exponential backoff after a transient
/// infrastructure failure. Returns false once attempts are exhausted, in
/// which case the unit is marked dead and the caller fails the batch.
pub async fn retry_unit(
    pool: &SqlitePool,
    unit: &QueueUnit,
    max_attempts: u32,
    base_backoff_ms: u64,
) -> Result<bool> {
    if unit.attempts >= max_attempts {
        sqlx::query("UPDATE import_queue SET state = 'dead' WHERE queue_id = ?")
            .bind(unit.queue_id)
            .execute(pool)
            .await?;
        return Ok(false);
    }

    // base * 2^(attempts-1), capped at one minute
    let backoff_ms = base_backoff_ms
        .saturating_mul(1u64 << (unit.attempts.saturating_sub(1)).min(16))
        .min(60_000);
    let available_at = Utc::now() + Duration::milliseconds(backoff_ms as i64);

    sqlx::query(
        "UPDATE import_queue SET state = 'queued', available_at = ? WHERE queue_id = ?",
    )
    .bind(available_at.to_rfc3339())
    .bind(unit.queue_id)
    .execute(pool)
    .await?;

    Ok(true)
}

/// Mark a session's outstanding units dead (used when reaping)
pub async fn kill_for_session(pool: &SqlitePool, session_id: Uuid) -> Result<()> {
    sqlx::query(
        "UPDATE import_queue SET state = 'dead' WHERE session_id = ? AND state IN ('queued', 'running')",
    )
    .bind(session_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Drop every queue row of a session (cascade delete)
pub async fn delete_for_session(pool: &SqlitePool, session_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM import_queue WHERE session_id = ?")
        .bind(session_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}
