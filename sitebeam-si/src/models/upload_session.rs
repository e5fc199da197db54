//! Upload session document
//!
//! One session describes one spreadsheet upload attempt: its batch plan,
//! per-batch outcomes, and the derived summary. The whole document is
//! persisted as a single row (batch list embedded as JSON) so that status
//! and summary are always read and written as one consistent unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sitebeam_common::{Error, Result};
use uuid::Uuid;

/// Overall session status, derived from batch statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    PartialSuccess,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::PartialSuccess => "partial_success",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "in_progress" => Ok(SessionStatus::InProgress),
            "completed" => Ok(SessionStatus::Completed),
            "partial_success" => Ok(SessionStatus::PartialSuccess),
            "failed" => Ok(SessionStatus::Failed),
            other => Err(Error::Internal(format!("Unknown session status: {}", other))),
        }
    }
}

/// Per-batch status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

/// One row that failed validation, recorded with its reason
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowError {
    pub row: u32,
    pub reason: String,
}

/// One contiguous slice of source rows, committed as one atomic unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub batch_number: u32,
    /// 1-indexed, inclusive
    pub start_row: u32,
    /// 1-indexed, inclusive
    pub end_row: u32,
    pub status: BatchStatus,
    pub element_ids: Vec<Uuid>,
    pub job_ids: Vec<Uuid>,
    pub duplicates_skipped: u32,
    pub row_errors: Vec<RowError>,
    pub error: Option<String>,
    pub retry_count: u32,
}

impl Batch {
    fn new(batch_number: u32, start_row: u32, end_row: u32) -> Self {
        Self {
            batch_number,
            start_row,
            end_row,
            status: BatchStatus::Pending,
            element_ids: Vec::new(),
            job_ids: Vec::new(),
            duplicates_skipped: 0,
            row_errors: Vec::new(),
            error: None,
            retry_count: 0,
        }
    }

    pub fn row_count(&self) -> u32 {
        self.end_row - self.start_row + 1
    }
}

/// Result of one batch attempt, applied by the worker
#[derive(Debug, Clone)]
pub enum BatchOutcome {
    Success {
        element_ids: Vec<Uuid>,
        job_ids: Vec<Uuid>,
        duplicates_skipped: u32,
        row_errors: Vec<RowError>,
    },
    Failure {
        error: String,
        row_errors: Vec<RowError>,
    },
}

/// Aggregate view over the batch list
///
/// Never mutated directly; always recomputed by folding over the batches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub successful_batches: u32,
    pub failed_batches: u32,
    pub pending_batches: u32,
    pub total_elements_created: u32,
    pub total_jobs_created: u32,
    pub duplicates_skipped: u32,
}

impl SessionSummary {
    /// Fold over the batch list. Order-independent, so it is safe to call
    /// after any batch completion order.
    pub fn fold(batches: &[Batch]) -> Self {
        let mut summary = SessionSummary::default();
        for batch in batches {
            match batch.status {
                BatchStatus::Success => summary.successful_batches += 1,
                BatchStatus::Failed => summary.failed_batches += 1,
                BatchStatus::Pending | BatchStatus::Processing => {
                    summary.pending_batches += 1
                }
            }
            summary.total_elements_created += batch.element_ids.len() as u32;
            summary.total_jobs_created += batch.job_ids.len() as u32;
            summary.duplicates_skipped += batch.duplicates_skipped;
        }
        summary
    }
}

/// Durable record describing one upload attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSession {
    pub session_id: Uuid,
    pub project_id: Uuid,
    pub zone_id: Option<Uuid>,
    pub file_name: String,
    pub file_size: u64,
    /// Server-side path of the source file; deleted with the session
    pub source_path: String,
    pub total_rows: u32,
    pub batch_size: u32,
    pub batches: Vec<Batch>,
    pub summary: SessionSummary,
    pub status: SessionStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl UploadSession {
    /// Create a session with its full batch plan
    ///
    /// Builds ceil(total_rows / batch_size) batches with contiguous
    /// 1-indexed inclusive ranges tiling [1, total_rows] exactly.
    pub fn plan(
        project_id: Uuid,
        zone_id: Option<Uuid>,
        created_by: Uuid,
        file_name: String,
        file_size: u64,
        source_path: String,
        total_rows: u32,
        batch_size: u32,
    ) -> Result<Self> {
        if total_rows == 0 {
            return Err(Error::InvalidInput("total_rows must be positive".into()));
        }
        if batch_size == 0 {
            return Err(Error::InvalidInput("batch_size must be positive".into()));
        }

        let batch_count = total_rows.div_ceil(batch_size);
        let mut batches = Vec::with_capacity(batch_count as usize);
        for n in 0..batch_count {
            let start_row = n * batch_size + 1;
            let end_row = ((n + 1) * batch_size).min(total_rows);
            batches.push(Batch::new(n + 1, start_row, end_row));
        }

        let summary = SessionSummary::fold(&batches);
        let now = Utc::now();
        Ok(Self {
            session_id: Uuid::new_v4(),
            project_id,
            zone_id,
            file_name,
            file_size,
            source_path,
            total_rows,
            batch_size,
            batches,
            summary,
            status: SessionStatus::InProgress,
            created_by,
            created_at: now,
            updated_at: now,
            completed_at: None,
        })
    }

    pub fn batch(&self, batch_number: u32) -> Result<&Batch> {
        self.batches
            .iter()
            .find(|b| b.batch_number == batch_number)
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "Batch {} not found in session {}",
                    batch_number, self.session_id
                ))
            })
    }

    fn batch_mut(&mut self, batch_number: u32) -> Result<&mut Batch> {
        let session_id = self.session_id;
        self.batches
            .iter_mut()
            .find(|b| b.batch_number == batch_number)
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "Batch {} not found in session {}",
                    batch_number, session_id
                ))
            })
    }

    /// Mark one batch as picked up by a worker
    pub fn mark_processing(&mut self, batch_number: u32) -> Result<()> {
        self.batch_mut(batch_number)?.status = BatchStatus::Processing;
        self.recompute();
        Ok(())
    }

    /// Apply the outcome of one batch attempt, then recompute the summary
    /// and the derived session status.
    pub fn apply_batch_outcome(&mut self, batch_number: u32, outcome: BatchOutcome) -> Result<()> {
        let batch = self.batch_mut(batch_number)?;
        match outcome {
            BatchOutcome::Success {
                element_ids,
                job_ids,
                duplicates_skipped,
                row_errors,
            } => {
                batch.status = BatchStatus::Success;
                batch.element_ids = element_ids;
                batch.job_ids = job_ids;
                batch.duplicates_skipped = duplicates_skipped;
                batch.row_errors = row_errors;
                batch.error = None;
            }
            BatchOutcome::Failure { error, row_errors } => {
                batch.status = BatchStatus::Failed;
                batch.element_ids = Vec::new();
                batch.job_ids = Vec::new();
                batch.duplicates_skipped = 0;
                batch.row_errors = row_errors;
                batch.error = Some(error);
            }
        }
        self.recompute();
        Ok(())
    }

    /// Recompute summary and derived status from the batch list
    ///
    /// Idempotent: calling it twice on the same batch list yields the same
    /// summary and status.
    pub fn recompute(&mut self) {
        self.summary = SessionSummary::fold(&self.batches);

        let any_open = self
            .batches
            .iter()
            .any(|b| matches!(b.status, BatchStatus::Pending | BatchStatus::Processing));
        let successes = self.summary.successful_batches;
        let failures = self.summary.failed_batches;

        self.status = if any_open {
            SessionStatus::InProgress
        } else if failures == 0 {
            SessionStatus::Completed
        } else if successes == 0 {
            SessionStatus::Failed
        } else {
            SessionStatus::PartialSuccess
        };

        if self.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    pub fn pending_batches(&self) -> Vec<&Batch> {
        self.batches
            .iter()
            .filter(|b| b.status == BatchStatus::Pending)
            .collect()
    }

    pub fn failed_batches(&self) -> Vec<&Batch> {
        self.batches
            .iter()
            .filter(|b| b.status == BatchStatus::Failed)
            .collect()
    }

    pub fn successful_batches(&self) -> Vec<&Batch> {
        self.batches
            .iter()
            .filter(|b| b.status == BatchStatus::Success)
            .collect()
    }

    /// Reset one failed batch to pending for another attempt
    ///
    /// failed → pending is the only legal retry edge; any other starting
    /// state is rejected.
    pub fn retry_batch(&mut self, batch_number: u32) -> Result<()> {
        let batch = self.batch_mut(batch_number)?;
        if batch.status != BatchStatus::Failed {
            return Err(Error::State(format!(
                "Batch {} is {:?}, only failed batches can be retried",
                batch_number, batch.status
            )));
        }
        batch.status = BatchStatus::Pending;
        batch.element_ids = Vec::new();
        batch.job_ids = Vec::new();
        batch.duplicates_skipped = 0;
        batch.row_errors = Vec::new();
        batch.error = None;
        batch.retry_count += 1;
        self.completed_at = None;
        self.recompute();
        Ok(())
    }

    /// Reset every failed batch to pending; returns the reset batch numbers
    pub fn retry_all_failed(&mut self) -> Vec<u32> {
        let failed: Vec<u32> = self
            .failed_batches()
            .iter()
            .map(|b| b.batch_number)
            .collect();
        for n in &failed {
            // Infallible: the numbers were just read from failed batches.
            let _ = self.retry_batch(*n);
        }
        failed
    }

    pub fn is_terminal(&self) -> bool {
        self.status != SessionStatus::InProgress
    }

    /// Fraction of batches that have reached a terminal status, as a percent
    pub fn percent_complete(&self) -> f64 {
        if self.batches.is_empty() {
            return 0.0;
        }
        let done = self.summary.successful_batches + self.summary.failed_batches;
        (done as f64 / self.batches.len() as f64) * 100.0
    }

    /// Short human-readable progress line for the status endpoint
    pub fn progress_message(&self) -> String {
        match self.status {
            SessionStatus::InProgress => format!(
                "Processing: {}/{} batches done, {} elements created",
                self.summary.successful_batches + self.summary.failed_batches,
                self.batches.len(),
                self.summary.total_elements_created,
            ),
            SessionStatus::Completed => format!(
                "Completed: {} elements created, {} duplicates skipped",
                self.summary.total_elements_created, self.summary.duplicates_skipped,
            ),
            SessionStatus::PartialSuccess => format!(
                "Partial success: {} of {} batches failed",
                self.summary.failed_batches,
                self.batches.len(),
            ),
            SessionStatus::Failed => "Import failed".to_string(),
        }
    }
}
