//! Element persistence
//!
//! Insert/lookup run on the batch transaction's connection so duplicate
//! checks see the current batch's uncommitted inserts. Deletes and counts
//! are chunked to stay under SQLite's bind-variable limit.

use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use sitebeam_common::Result;

use crate::models::Element;

/// Max ids per IN(...) clause
const ID_CHUNK: usize = 500;

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

pub async fn insert_element(conn: &mut SqliteConnection, element: &Element) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO elements (
            element_id, project_id, zone_id, mark, level, element_type,
            material, quantity, weight_kg, workflow, status, created_by, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(element.element_id.to_string())
    .bind(element.project_id.to_string())
    .bind(element.zone_id.map(|z| z.to_string()))
    .bind(&element.mark)
    .bind(&element.level)
    .bind(&element.element_type)
    .bind(&element.material)
    .bind(element.quantity)
    .bind(element.weight_kg)
    .bind(&element.workflow)
    .bind(element.status.as_str())
    .bind(element.created_by.to_string())
    .bind(element.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Duplicate check: element id for a business key already present in the
/// project, if any. Scoped to the project, not the zone.
pub async fn find_by_business_key(
    conn: &mut SqliteConnection,
    project_id: Uuid,
    mark: &str,
    level: &str,
) -> Result<Option<Uuid>> {
    let row = sqlx::query(
        "SELECT element_id FROM elements WHERE project_id = ? AND mark = ? AND level = ?",
    )
    .bind(project_id.to_string())
    .bind(mark)
    .bind(level)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => {
            let id: String = row.get("element_id");
            Ok(Some(Uuid::parse_str(&id).map_err(|e| {
                sitebeam_common::Error::Internal(format!("Failed to parse element_id: {}", e))
            })?))
        }
        None => Ok(None),
    }
}

pub async fn delete_by_ids(conn: &mut SqliteConnection, ids: &[Uuid]) -> Result<u64> {
    let mut deleted = 0;
    for chunk in ids.chunks(ID_CHUNK) {
        let sql = format!(
            "DELETE FROM elements WHERE element_id IN ({})",
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

/// How many of the given ids are actually persisted
pub async fn count_by_ids(pool: &SqlitePool, ids: &[Uuid]) -> Result<u64> {
    let mut count = 0i64;
    for chunk in ids.chunks(ID_CHUNK) {
        let sql = format!(
            "SELECT COUNT(*) FROM elements WHERE element_id IN ({})",
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

/// Elements of a project, optionally narrowed to one zone, in mark order
pub async fn list_for_project(
    pool: &SqlitePool,
    project_id: Uuid,
    zone_id: Option<Uuid>,
) -> Result<Vec<Element>> {
    let rows = match zone_id {
        Some(zone_id) => {
            sqlx::query("SELECT * FROM elements WHERE project_id = ? AND zone_id = ? ORDER BY mark, level")
                .bind(project_id.to_string())
                .bind(zone_id.to_string())
                .fetch_all(pool)
                .await?
        }
        None => {
            sqlx::query("SELECT * FROM elements WHERE project_id = ? ORDER BY mark, level")
                .bind(project_id.to_string())
                .fetch_all(pool)
                .await?
        }
    };

    rows.iter().map(element_from_row).collect()
}

fn element_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Element> {
    use chrono::{DateTime, Utc};
    use sitebeam_common::Error;

    use crate::models::ElementStatus;

    let element_id: String = row.get("element_id");
    let project_id: String = row.get("project_id");
    let zone_id: Option<String> = row.get("zone_id");
    let created_by: String = row.get("created_by");
    let created_at: String = row.get("created_at");

    let parse = |v: &str, f: &str| {
        Uuid::parse_str(v).map_err(|e| Error::Internal(format!("Failed to parse {}: {}", f, e)))
    };

    Ok(Element {
        element_id: parse(&element_id, "element_id")?,
        project_id: parse(&project_id, "project_id")?,
        zone_id: zone_id.map(|z| parse(&z, "zone_id")).transpose()?,
        mark: row.get("mark"),
        level: row.get("level"),
        element_type: row.get("element_type"),
        material: row.get("material"),
        quantity: row.get("quantity"),
        weight_kg: row.get("weight_kg"),
        workflow: row.get("workflow"),
        status: ElementStatus::Planned,
        created_by: parse(&created_by, "created_by")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| Error::Internal(format!("Failed to parse created_at: {}", e)))?
            .with_timezone(&Utc),
    })
}
