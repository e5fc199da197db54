//! Row validation and transformation
//!
//! Maps one raw spreadsheet row plus its import context into a validated
//! element payload, or a row error naming the row and reason. Pure
//! function: nothing here touches the database.

use uuid::Uuid;

use crate::models::workflow::{is_allowed_workflow, ALLOWED_WORKFLOWS};
use crate::models::{NewElement, Project, RowError, Zone};
use crate::services::sheet_reader::RawRow;

/// Blank or non-numeric numeric cells import as zero. Inherited behavior;
/// changing it needs a product decision because existing sheets rely on it.
fn coerce_i64(value: Option<&str>) -> i64 {
    value.and_then(|v| v.parse::<i64>().ok()).unwrap_or(0)
}

fn coerce_f64(value: Option<&str>) -> f64 {
    value.and_then(|v| v.parse::<f64>().ok()).unwrap_or(0.0)
}

/// Validate one raw row into an element payload
pub fn transform_row(
    row: &RawRow,
    project: &Project,
    zone: Option<&Zone>,
    actor_id: Uuid,
) -> Result<NewElement, RowError> {
    let mark = match row.get("mark") {
        Some(mark) => mark.to_string(),
        None => {
            return Err(RowError {
                row: row.row_number,
                reason: "Missing required field 'mark'".to_string(),
            })
        }
    };

    // Level defaults to a single unleveled bucket so the business key
    // (mark, level) stays total.
    let level = row.get("level").unwrap_or("-").to_string();

    let workflow = match row.get("workflow") {
        Some(name) => {
            let name = name.to_lowercase();
            if !is_allowed_workflow(&name) {
                return Err(RowError {
                    row: row.row_number,
                    reason: format!(
                        "Unknown workflow '{}', allowed values: {}",
                        name,
                        ALLOWED_WORKFLOWS.join(", ")
                    ),
                });
            }
            Some(name)
        }
        None => None,
    };

    Ok(NewElement {
        project_id: project.project_id,
        zone_id: zone.map(|z| z.zone_id),
        mark,
        level,
        element_type: row.get("type").unwrap_or("unspecified").to_string(),
        material: row.get("material").unwrap_or("unspecified").to_string(),
        quantity: coerce_i64(row.get("quantity")),
        weight_kg: coerce_f64(row.get("weight_kg")),
        workflow,
        created_by: actor_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    fn project() -> Project {
        Project {
            project_id: Uuid::new_v4(),
            name: "Riverside Depot".to_string(),
            element_count: 0,
            job_count: 0,
            created_at: Utc::now(),
        }
    }

    fn row(fields: &[(&str, &str)]) -> RawRow {
        let map: HashMap<String, String> = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RawRow::new(7, map)
    }

    #[test]
    fn valid_row_transforms() {
        let project = project();
        let raw = row(&[
            ("mark", "B-101"),
            ("level", "L2"),
            ("type", "beam"),
            ("material", "S355"),
            ("quantity", "4"),
            ("weight_kg", "812.5"),
            ("workflow", "fabrication"),
        ]);

        let element = transform_row(&raw, &project, None, Uuid::new_v4()).unwrap();
        assert_eq!(element.mark, "B-101");
        assert_eq!(element.level, "L2");
        assert_eq!(element.quantity, 4);
        assert_eq!(element.weight_kg, 812.5);
        assert_eq!(element.workflow.as_deref(), Some("fabrication"));
        assert_eq!(element.project_id, project.project_id);
    }

    #[test]
    fn missing_mark_is_a_row_error() {
        let err = transform_row(&row(&[("level", "L1")]), &project(), None, Uuid::new_v4())
            .unwrap_err();
        assert_eq!(err.row, 7);
        assert!(err.reason.contains("mark"));
    }

    #[test]
    fn unknown_workflow_lists_allowed_values() {
        let err = transform_row(
            &row(&[("mark", "B-1"), ("workflow", "teleportation")]),
            &project(),
            None,
            Uuid::new_v4(),
        )
        .unwrap_err();
        assert!(err.reason.contains("teleportation"));
        for name in ALLOWED_WORKFLOWS {
            assert!(err.reason.contains(name));
        }
    }

    #[test]
    fn numeric_fields_coerce_to_zero() {
        let element = transform_row(
            &row(&[("mark", "B-1"), ("quantity", "a few"), ("weight_kg", "")]),
            &project(),
            None,
            Uuid::new_v4(),
        )
        .unwrap();
        assert_eq!(element.quantity, 0);
        assert_eq!(element.weight_kg, 0.0);
    }

    #[test]
    fn workflow_is_optional() {
        let element =
            transform_row(&row(&[("mark", "B-1")]), &project(), None, Uuid::new_v4()).unwrap();
        assert!(element.workflow.is_none());
    }
}
