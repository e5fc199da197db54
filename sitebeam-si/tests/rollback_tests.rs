//! Rollback and integrity engine tests

mod helpers;

use helpers::{create_test_context, element_sheet, pool, write_sheet, TestContext};

use sitebeam_common::Error;
use sitebeam_si::db;
use sitebeam_si::models::{SessionStatus, UploadSession};
use sitebeam_si::services::upload_intake::{self, UploadRequest};
use sitebeam_si::services::{rollback, worker};

async fn import_sheet(ctx: &TestContext, rows: u32, batch_size: u32) -> UploadSession {
    let sheet = element_sheet(rows, &[], &[1, 2]);
    let path = write_sheet(ctx, "elements.csv", &sheet);

    let session = upload_intake::submit_upload(
        &ctx.state,
        UploadRequest {
            project_id: ctx.project.project_id,
            zone_id: None,
            actor_id: ctx.actor_id,
            source_path: path.display().to_string(),
            batch_size: Some(batch_size),
        },
    )
    .await
    .unwrap();

    worker::run_until_idle(&ctx.state).await.unwrap();

    db::sessions::load_session(pool(ctx), session.session_id)
        .await
        .unwrap()
        .unwrap()
}

async fn element_count(ctx: &TestContext) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM elements")
        .fetch_one(pool(ctx))
        .await
        .unwrap()
}

async fn job_count(ctx: &TestContext) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
        .fetch_one(pool(ctx))
        .await
        .unwrap()
}

#[tokio::test]
async fn complete_rollback_removes_everything_and_decrements_counters() {
    let ctx = create_test_context().await;
    let mut session = import_sheet(&ctx, 30, 10).await;

    assert_eq!(element_count(&ctx).await, 30);
    assert_eq!(job_count(&ctx).await, 10);

    let report = rollback::complete_rollback(pool(&ctx), &ctx.state.view_cache, &mut session)
        .await
        .unwrap();
    assert_eq!(report.elements_removed, 30);
    assert_eq!(report.jobs_removed, 10);

    assert_eq!(element_count(&ctx).await, 0);
    assert_eq!(job_count(&ctx).await, 0);

    let project = db::projects::load_project(pool(&ctx), ctx.project.project_id)
        .await
        .unwrap();
    assert_eq!(project.element_count, 0);
    assert_eq!(project.job_count, 0);

    let session = db::sessions::load_session(pool(&ctx), session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.status, SessionStatus::Failed);
    assert!(session.completed_at.is_some());
}

#[tokio::test]
async fn integrity_check_detects_vanished_rows() {
    let ctx = create_test_context().await;
    let session = import_sheet(&ctx, 20, 10).await;

    rollback::verify_integrity(pool(&ctx), &session)
        .await
        .unwrap();

    // simulate a partial commit surviving an infrastructure failure
    let victim = session.batch(1).unwrap().element_ids[0];
    sqlx::query("DELETE FROM elements WHERE element_id = ?")
        .bind(victim.to_string())
        .execute(pool(&ctx))
        .await
        .unwrap();

    let result = rollback::verify_integrity(pool(&ctx), &session).await;
    assert!(matches!(result, Err(Error::Integrity(_))));
}

#[tokio::test]
async fn total_failure_rolls_the_session_back() {
    let ctx = create_test_context().await;
    let sheet = element_sheet(20, &[], &[]);
    let path = write_sheet(&ctx, "elements.csv", &sheet);

    let session = upload_intake::submit_upload(
        &ctx.state,
        UploadRequest {
            project_id: ctx.project.project_id,
            zone_id: None,
            actor_id: ctx.actor_id,
            source_path: path.display().to_string(),
            batch_size: Some(10),
        },
    )
    .await
    .unwrap();

    // every batch hits the missing table and fails
    sqlx::query("ALTER TABLE elements RENAME TO elements_hidden")
        .execute(pool(&ctx))
        .await
        .unwrap();

    worker::run_until_idle(&ctx.state).await.unwrap();

    sqlx::query("ALTER TABLE elements_hidden RENAME TO elements")
        .execute(pool(&ctx))
        .await
        .unwrap();

    let session = db::sessions::load_session(pool(&ctx), session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.status, SessionStatus::Failed);
    assert!(session.completed_at.is_some());
    assert_eq!(session.summary.failed_batches, 2);
    assert_eq!(session.summary.total_elements_created, 0);
    assert_eq!(element_count(&ctx).await, 0);
}

#[tokio::test]
async fn delete_batch_data_is_scoped_to_one_batch() {
    let ctx = create_test_context().await;
    let mut session = import_sheet(&ctx, 20, 10).await;

    let report =
        rollback::delete_batch_data(pool(&ctx), &ctx.state.view_cache, &mut session, 1)
            .await
            .unwrap();
    assert_eq!(report.elements_removed, 10);

    // batch 2's data is untouched
    assert_eq!(element_count(&ctx).await, 10);

    let session = db::sessions::load_session(pool(&ctx), session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.status, SessionStatus::PartialSuccess);
    assert!(session.batch(1).unwrap().element_ids.is_empty());

    let project = db::projects::load_project(pool(&ctx), ctx.project.project_id)
        .await
        .unwrap();
    assert_eq!(project.element_count, 10);
}

#[tokio::test]
async fn delete_session_cascades_completely() {
    let ctx = create_test_context().await;
    let session = import_sheet(&ctx, 20, 10).await;
    let source_path = session.source_path.clone();

    rollback::delete_session(pool(&ctx), &ctx.state.view_cache, &session)
        .await
        .unwrap();

    assert_eq!(element_count(&ctx).await, 0);
    assert_eq!(job_count(&ctx).await, 0);
    assert!(db::sessions::load_session(pool(&ctx), session.session_id)
        .await
        .unwrap()
        .is_none());

    let queue_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM import_queue WHERE session_id = ?")
        .bind(session.session_id.to_string())
        .fetch_one(pool(&ctx))
        .await
        .unwrap();
    assert_eq!(queue_rows, 0);

    assert!(!std::path::Path::new(&source_path).exists());
}

#[tokio::test]
async fn partial_success_keeps_successful_batches_queryable() {
    let ctx = create_test_context().await;
    let sheet = element_sheet(40, &[], &[25]);
    let path = write_sheet(&ctx, "elements.csv", &sheet);

    let session = upload_intake::submit_upload(
        &ctx.state,
        UploadRequest {
            project_id: ctx.project.project_id,
            zone_id: None,
            actor_id: ctx.actor_id,
            source_path: path.display().to_string(),
            batch_size: Some(20),
        },
    )
    .await
    .unwrap();

    sqlx::query("ALTER TABLE jobs RENAME TO jobs_hidden")
        .execute(pool(&ctx))
        .await
        .unwrap();
    worker::run_until_idle(&ctx.state).await.unwrap();
    sqlx::query("ALTER TABLE jobs_hidden RENAME TO jobs")
        .execute(pool(&ctx))
        .await
        .unwrap();

    let loaded = db::sessions::load_session(pool(&ctx), session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.status, SessionStatus::PartialSuccess);

    // left unretried, the successful batch's elements stay visible
    let elements = db::elements::list_for_project(pool(&ctx), ctx.project.project_id, None)
        .await
        .unwrap();
    assert_eq!(elements.len(), 20);
    let marks: Vec<&str> = elements.iter().map(|e| e.mark.as_str()).collect();
    assert!(marks.contains(&"B-0001"));
}

#[tokio::test]
async fn rollback_of_unknown_batch_is_not_found() {
    let ctx = create_test_context().await;
    let mut session = import_sheet(&ctx, 10, 10).await;

    let result =
        rollback::delete_batch_data(pool(&ctx), &ctx.state.view_cache, &mut session, 99).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}
