//! Work job persistence

use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use sitebeam_common::Result;

use crate::models::Job;

const ID_CHUNK: usize = 500;

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

pub async fn insert_job(conn: &mut SqliteConnection, job: &Job) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO jobs (job_id, element_id, title, sort_order, status, created_by, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(job.job_id.to_string())
    .bind(job.element_id.to_string())
    .bind(&job.title)
    .bind(job.sort_order)
    .bind(job.status.as_str())
    .bind(job.created_by.to_string())
    .bind(job.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Delete every job referencing one of the given elements
pub async fn delete_by_element_ids(conn: &mut SqliteConnection, ids: &[Uuid]) -> Result<u64> {
    let mut deleted = 0;
    for chunk in ids.chunks(ID_CHUNK) {
        let sql = format!(
            "DELETE FROM jobs WHERE element_id IN ({})",
            placeholders(chunk.len())
        );
        let mut query = sqlx::query(&sql);
        for id in chunk {
            query = query.bind(id.to_string());
        }
        deleted += query.execute(&mut *conn).await?.rows_affected();
    }
    Ok(deleted)
}

/// How many of the given job ids are actually persisted
pub async fn count_by_ids(pool: &SqlitePool, ids: &[Uuid]) -> Result<u64> {
    let mut count = 0i64;
    for chunk in ids.chunks(ID_CHUNK) {
        let sql = format!(
            "SELECT COUNT(*) FROM jobs WHERE job_id IN ({})",
            placeholders(chunk.len())
        );
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for id in chunk {
            query = query.bind(id.to_string());
        }
        count += query.fetch_one(pool).await?;
    }
    Ok(count as u64)
}

/// Jobs for one element in workflow order (used by tests and read views)
pub async fn list_for_element(pool: &SqlitePool, element_id: Uuid) -> Result<Vec<(String, i64)>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT title, sort_order FROM jobs WHERE element_id = ? ORDER BY sort_order",
    )
    .bind(element_id.to_string())
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
