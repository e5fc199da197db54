//! HTTP API surface tests

mod helpers;

use helpers::{create_test_context, element_sheet, write_sheet};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::util::ServiceExt;
use uuid::Uuid;

use sitebeam_si::build_router;

#[tokio::test]
async fn health_endpoint_responds_ok() {
    let ctx = create_test_context().await;
    let app = build_router(ctx.state.clone());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn status_of_unknown_session_is_404() {
    let ctx = create_test_context().await;
    let app = build_router(ctx.state.clone());

    let uri = format!("/imports/{}/status", Uuid::new_v4());
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn submit_for_unknown_project_is_404() {
    let ctx = create_test_context().await;
    let app = build_router(ctx.state.clone());

    let body = serde_json::json!({
        "project_id": Uuid::new_v4(),
        "actor_id": Uuid::new_v4(),
        "source_path": "/nonexistent.csv",
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/imports")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn submit_accepts_a_valid_sheet() {
    let ctx = create_test_context().await;
    let app = build_router(ctx.state.clone());

    let sheet = element_sheet(10, &[], &[]);
    let path = write_sheet(&ctx, "api.csv", &sheet);

    let body = serde_json::json!({
        "project_id": ctx.project.project_id,
        "actor_id": ctx.actor_id,
        "source_path": path.display().to_string(),
        "batch_size": 5,
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/imports")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn retry_with_no_failed_batches_is_a_conflict() {
    let ctx = create_test_context().await;

    let sheet = element_sheet(10, &[], &[]);
    let path = write_sheet(&ctx, "retry.csv", &sheet);
    let session = sitebeam_si::services::upload_intake::submit_upload(
        &ctx.state,
        sitebeam_si::services::upload_intake::UploadRequest {
            project_id: ctx.project.project_id,
            zone_id: None,
            actor_id: ctx.actor_id,
            source_path: path.display().to_string(),
            batch_size: Some(10),
        },
    )
    .await
    .unwrap();
    sitebeam_si::services::worker::run_until_idle(&ctx.state)
        .await
        .unwrap();

    let app = build_router(ctx.state.clone());
    let uri = format!("/imports/{}/retry", session.session_id);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}
