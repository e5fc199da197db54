//! Domain records created by the import pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Owning project with denormalized counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub project_id: Uuid,
    pub name: String,
    pub element_count: i64,
    pub job_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Optional sub-scope of a project (a building zone / work area)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub zone_id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub element_count: i64,
    pub job_count: i64,
}

/// Element status as imported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementStatus {
    Planned,
}

impl ElementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementStatus::Planned => "planned",
        }
    }
}

/// Validated element payload, ready to persist
///
/// The business key is (mark, level), unique within the owning project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewElement {
    pub project_id: Uuid,
    pub zone_id: Option<Uuid>,
    pub mark: String,
    pub level: String,
    pub element_type: String,
    pub material: String,
    pub quantity: i64,
    pub weight_kg: f64,
    pub workflow: Option<String>,
    pub created_by: Uuid,
}

/// Persisted element row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    pub element_id: Uuid,
    pub project_id: Uuid,
    pub zone_id: Option<Uuid>,
    pub mark: String,
    pub level: String,
    pub element_type: String,
    pub material: String,
    pub quantity: i64,
    pub weight_kg: f64,
    pub workflow: Option<String>,
    pub status: ElementStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Work job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    NotStarted,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::NotStarted => "not_started",
        }
    }
}

/// One generated workflow step for an element
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: Uuid,
    pub element_id: Uuid,
    pub title: String,
    /// Strictly increasing, spaced so steps can be inserted manually later
    /// without renumbering
    pub sort_order: i64,
    pub status: JobStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}
