//! sitebeam-si - Structural Import Service
//!
//! Imports spreadsheets of structural elements into a project, creating
//! elements and their generated workflow jobs batch by batch. Runs an
//! HTTP API for submission/status/cleanup plus a worker pool draining the
//! durable batch queue. The `reap` subcommand runs the stalled-session
//! reaper once and exits.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use sitebeam_common::events::EventBus;
use sitebeam_si::config::ServiceConfig;
use sitebeam_si::models::WorkflowCatalog;
use sitebeam_si::services::{reaper, worker};
use sitebeam_si::AppState;

#[derive(Parser)]
#[command(name = "sitebeam-si", version, about = "sitebeam structural import service")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, env = "SITEBEAM_SI_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Close out stalled in-progress sessions, then exit
    Reap {
        /// Threshold in minutes (defaults to the configured value)
        #[arg(long)]
        older_than_minutes: Option<i64>,
        /// Target one session regardless of age
        #[arg(long)]
        session: Option<Uuid>,
        /// Report matches without mutating
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    info!("Starting sitebeam-si (Structural Import) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::load(cli.config.as_deref())?;
    info!("Database: {}", config.database_path.display());

    let db_pool = sitebeam_si::db::init_database_pool(&config.database_path).await?;
    info!("Database connection established");

    let catalog = WorkflowCatalog::load(&config.workflows_path)?;
    let event_bus = EventBus::new(config.event_capacity);

    match cli.command {
        Some(Command::Reap {
            older_than_minutes,
            session,
            dry_run,
        }) => {
            let minutes = older_than_minutes.unwrap_or(config.stall_threshold_minutes);
            let report = reaper::reap(
                &db_pool,
                &event_bus,
                chrono::Duration::minutes(minutes),
                session,
                dry_run,
            )
            .await?;
            info!(
                matched = report.matched.len(),
                reaped = report.reaped,
                dry_run = report.dry_run,
                "Reaper pass finished"
            );
            return Ok(());
        }
        None => {}
    }

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(db_pool, event_bus, catalog, config);

    // Worker pool drains the durable batch queue
    let _workers = worker::spawn_workers(state.clone());
    info!("Worker pool started ({} workers)", state.config.worker_count);

    let app = sitebeam_si::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on http://{}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
