//! Shared types for sitebeam services
//!
//! Provides the common error type and the event bus used by all sitebeam
//! modules. Service-specific logic lives in the service crates.

pub mod error;
pub mod events;

pub use error::{Error, Result};
