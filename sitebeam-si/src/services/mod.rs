//! Services for sitebeam-si

pub mod batch_processor;
pub mod job_generator;
pub mod reaper;
pub mod rollback;
pub mod row_transformer;
pub mod sheet_reader;
pub mod upload_intake;
pub mod worker;
