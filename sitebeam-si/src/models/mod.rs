//! Data models for sitebeam-si

pub mod element;
pub mod upload_session;
pub mod workflow;

pub use element::{Element, ElementStatus, Job, JobStatus, NewElement, Project, Zone};
pub use upload_session::{
    Batch, BatchOutcome, BatchStatus, RowError, SessionStatus, SessionSummary, UploadSession,
};
pub use workflow::{WorkflowCatalog, ALLOWED_WORKFLOWS};
