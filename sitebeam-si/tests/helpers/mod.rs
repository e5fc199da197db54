//! Shared test utilities
#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;

use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

use sitebeam_common::events::EventBus;
use sitebeam_si::config::ServiceConfig;
use sitebeam_si::models::{Project, WorkflowCatalog};
use sitebeam_si::AppState;

/// Test context: state plus the temp dir backing the database and any
/// source sheets. Keep it alive for the duration of the test.
pub struct TestContext {
    pub state: AppState,
    pub project: Project,
    pub actor_id: Uuid,
    pub temp_dir: TempDir,
}

/// Build an AppState over a temp-file database with one project seeded
pub async fn create_test_context() -> TestContext {
    let temp_dir = TempDir::new().expect("create temp dir");
    let db_path = temp_dir.path().join("test_sitebeam.db");

    let pool = sitebeam_si::db::init_database_pool(&db_path)
        .await
        .expect("init database");

    let project = sitebeam_si::db::projects::create_project(&pool, "Riverside Depot")
        .await
        .expect("create project");

    let state = AppState::new(
        pool,
        EventBus::new(64),
        WorkflowCatalog::builtin(),
        ServiceConfig::default(),
    );

    TestContext {
        state,
        project,
        actor_id: Uuid::new_v4(),
        temp_dir,
    }
}

pub fn pool(ctx: &TestContext) -> &SqlitePool {
    &ctx.state.db
}

/// Write a CSV sheet into the context's temp dir and return its path
pub fn write_sheet(ctx: &TestContext, name: &str, content: &str) -> PathBuf {
    let path = ctx.temp_dir.path().join(name);
    let mut file = std::fs::File::create(&path).expect("create sheet");
    file.write_all(content.as_bytes()).expect("write sheet");
    path
}

/// Build a CSV of `rows` elements with unique marks
///
/// `blank_mark_rows` lists 1-indexed data rows whose mark cell is left
/// empty (validation-level failures). `workflow_rows` lists rows assigned
/// the fabrication workflow.
pub fn element_sheet(rows: u32, blank_mark_rows: &[u32], workflow_rows: &[u32]) -> String {
    let mut csv = String::from("mark,level,type,material,quantity,weight_kg,workflow\n");
    for row in 1..=rows {
        let mark = if blank_mark_rows.contains(&row) {
            String::new()
        } else {
            format!("B-{:04}", row)
        };
        let workflow = if workflow_rows.contains(&row) {
            "fabrication"
        } else {
            ""
        };
        csv.push_str(&format!(
            "{},L{},beam,S355,{},{:.1},{}\n",
            mark,
            (row % 4) + 1,
            row,
            row as f64 * 1.5,
            workflow
        ));
    }
    csv
}
