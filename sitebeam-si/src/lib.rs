//! sitebeam-si library interface
//!
//! Exposes public APIs for integration testing

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

use sitebeam_common::events::EventBus;

use crate::cache::ViewCache;
use crate::config::ServiceConfig;
use crate::models::WorkflowCatalog;

/// Application state shared across handlers and workers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Workflow step-template catalog
    pub catalog: Arc<WorkflowCatalog>,
    /// Read-through cache for project list views
    pub view_cache: ViewCache,
    /// Service configuration
    pub config: Arc<ServiceConfig>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        catalog: WorkflowCatalog,
        config: ServiceConfig,
    ) -> Self {
        let view_cache = ViewCache::new(Duration::from_secs(config.cache_ttl_seconds));
        Self {
            db,
            event_bus,
            catalog: Arc::new(catalog),
            view_cache,
            config: Arc::new(config),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;
    use tower_http::{cors::CorsLayer, trace::TraceLayer};

    Router::new()
        .merge(api::import_routes())
        .merge(api::maintenance_routes())
        .merge(api::element_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
