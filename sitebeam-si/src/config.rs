//! Configuration resolution for sitebeam-si
//!
//! Priority: environment variables → TOML file → compiled defaults.

use serde::Deserialize;
use sitebeam_common::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::info;

fn default_bind_addr() -> String {
    "127.0.0.1:5731".to_string()
}
fn default_database_path() -> PathBuf {
    PathBuf::from("data/sitebeam.db")
}
fn default_workflows_path() -> PathBuf {
    PathBuf::from("config/workflows.toml")
}
fn default_batch_size() -> u32 {
    50
}
fn default_worker_count() -> usize {
    4
}
fn default_poll_interval_ms() -> u64 {
    250
}
fn default_queue_max_attempts() -> u32 {
    3
}
fn default_queue_backoff_ms() -> u64 {
    1000
}
fn default_db_max_lock_wait_ms() -> u64 {
    5000
}
fn default_stall_threshold_minutes() -> i64 {
    60
}
fn default_event_capacity() -> usize {
    100
}
fn default_cache_ttl_seconds() -> u64 {
    30
}

/// Service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_workflows_path")]
    pub workflows_path: PathBuf,
    /// Batch size used when a submit request does not name one
    #[serde(default = "default_batch_size")]
    pub default_batch_size: u32,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Attempts per queue unit before it is marked dead
    #[serde(default = "default_queue_max_attempts")]
    pub queue_max_attempts: u32,
    #[serde(default = "default_queue_backoff_ms")]
    pub queue_backoff_ms: u64,
    #[serde(default = "default_db_max_lock_wait_ms")]
    pub db_max_lock_wait_ms: u64,
    #[serde(default = "default_stall_threshold_minutes")]
    pub stall_threshold_minutes: i64,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        // Deserializing an empty table applies every serde default.
        toml::from_str("").expect("defaults are valid")
    }
}

impl ServiceConfig {
    /// Load configuration: TOML file (if present) with env overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| Error::Config(format!("Read config failed: {}", e)))?;
                let config: ServiceConfig = toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("Parse config failed: {}", e)))?;
                info!("Configuration loaded from {}", path.display());
                config
            }
            Some(path) => {
                info!("Config file {} not found, using defaults", path.display());
                ServiceConfig::default()
            }
            None => ServiceConfig::default(),
        };

        if let Ok(bind_addr) = std::env::var("SITEBEAM_SI_BIND_ADDR") {
            config.bind_addr = bind_addr;
        }
        if let Ok(db_path) = std::env::var("SITEBEAM_SI_DATABASE") {
            config.database_path = PathBuf::from(db_path);
        }
        if let Ok(workflows) = std::env::var("SITEBEAM_SI_WORKFLOWS") {
            config.workflows_path = PathBuf::from(workflows);
        }

        Ok(config)
    }
}
