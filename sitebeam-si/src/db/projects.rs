//! Project and zone records, including the denormalized counters

use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use sitebeam_common::{Error, Result};

use crate::models::{Project, Zone};

pub async fn create_project(pool: &SqlitePool, name: &str) -> Result<Project> {
    let project = Project {
        project_id: Uuid::new_v4(),
        name: name.to_string(),
        element_count: 0,
        job_count: 0,
        created_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO projects (project_id, name, element_count, job_count, created_at) VALUES (?, ?, 0, 0, ?)",
    )
    .bind(project.project_id.to_string())
    .bind(&project.name)
    .bind(project.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(project)
}

pub async fn create_zone(pool: &SqlitePool, project_id: Uuid, name: &str) -> Result<Zone> {
    let zone = Zone {
        zone_id: Uuid::new_v4(),
        project_id,
        name: name.to_string(),
        element_count: 0,
        job_count: 0,
    };

    sqlx::query(
        "INSERT INTO zones (zone_id, project_id, name, element_count, job_count) VALUES (?, ?, ?, 0, 0)",
    )
    .bind(zone.zone_id.to_string())
    .bind(zone.project_id.to_string())
    .bind(&zone.name)
    .execute(pool)
    .await?;

    Ok(zone)
}

pub async fn load_project(pool: &SqlitePool, project_id: Uuid) -> Result<Project> {
    let row = sqlx::query("SELECT * FROM projects WHERE project_id = ?")
        .bind(project_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Project not found: {}", project_id)))?;

    let created_at: String = row.get("created_at");
    Ok(Project {
        project_id,
        name: row.get("name"),
        element_count: row.get("element_count"),
        job_count: row.get("job_count"),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| Error::Internal(format!("Failed to parse created_at: {}", e)))?
            .with_timezone(&Utc),
    })
}

pub async fn load_zone(pool: &SqlitePool, zone_id: Uuid) -> Result<Zone> {
    let row = sqlx::query("SELECT * FROM zones WHERE zone_id = ?")
        .bind(zone_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Zone not found: {}", zone_id)))?;

    let project_id: String = row.get("project_id");
    Ok(Zone {
        zone_id,
        project_id: Uuid::parse_str(&project_id)
            .map_err(|e| Error::Internal(format!("Failed to parse project_id: {}", e)))?,
        name: row.get("name"),
        element_count: row.get("element_count"),
        job_count: row.get("job_count"),
    })
}

/// Adjust the cached element/job counters on a project, and on the zone
/// when one is in scope. Deltas may be negative (rollback, cleanup).
pub async fn adjust_counters(
    conn: &mut SqliteConnection,
    project_id: Uuid,
    zone_id: Option<Uuid>,
    element_delta: i64,
    job_delta: i64,
) -> Result<()> {
    sqlx::query(
        "UPDATE projects SET element_count = element_count + ?, job_count = job_count + ? WHERE project_id = ?",
    )
    .bind(element_delta)
    .bind(job_delta)
    .bind(project_id.to_string())
    .execute(&mut *conn)
    .await?;

    if let Some(zone_id) = zone_id {
        sqlx::query(
            "UPDATE zones SET element_count = element_count + ?, job_count = job_count + ? WHERE zone_id = ?",
        )
        .bind(element_delta)
        .bind(job_delta)
        .bind(zone_id.to_string())
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}
