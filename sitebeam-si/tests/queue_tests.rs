//! Durable work queue tests
//!
//! The claim query carries the per-session serialization contract: two
//! batches of one session must never be running at the same time.

mod helpers;

use helpers::{create_test_context, pool};

use sitebeam_si::db::queue;
use uuid::Uuid;

#[tokio::test]
async fn units_are_claimed_in_enqueue_order() {
    let ctx = create_test_context().await;
    let session = Uuid::new_v4();

    queue::enqueue_batches(pool(&ctx), session, &[1, 2, 3])
        .await
        .unwrap();

    let first = queue::claim_next(pool(&ctx)).await.unwrap().unwrap();
    assert_eq!(first.batch_number, 1);
    queue::mark_done(pool(&ctx), first.queue_id).await.unwrap();

    let second = queue::claim_next(pool(&ctx)).await.unwrap().unwrap();
    assert_eq!(second.batch_number, 2);
}

#[tokio::test]
async fn one_session_never_has_two_running_units() {
    let ctx = create_test_context().await;
    let session_a = Uuid::new_v4();
    let session_b = Uuid::new_v4();

    queue::enqueue_batches(pool(&ctx), session_a, &[1, 2])
        .await
        .unwrap();
    queue::enqueue_batches(pool(&ctx), session_b, &[1])
        .await
        .unwrap();

    let first = queue::claim_next(pool(&ctx)).await.unwrap().unwrap();
    assert_eq!((first.session_id, first.batch_number), (session_a, 1));

    // session A has a running unit, so its batch 2 is skipped in favor of
    // session B
    let second = queue::claim_next(pool(&ctx)).await.unwrap().unwrap();
    assert_eq!((second.session_id, second.batch_number), (session_b, 1));

    // nothing else is claimable while both sessions are running
    assert!(queue::claim_next(pool(&ctx)).await.unwrap().is_none());

    queue::mark_done(pool(&ctx), first.queue_id).await.unwrap();
    let third = queue::claim_next(pool(&ctx)).await.unwrap().unwrap();
    assert_eq!((third.session_id, third.batch_number), (session_a, 2));
}

#[tokio::test]
async fn retry_backoff_defers_availability_then_kills_the_unit() {
    let ctx = create_test_context().await;
    let session = Uuid::new_v4();

    queue::enqueue_batches(pool(&ctx), session, &[1]).await.unwrap();
    let unit = queue::claim_next(pool(&ctx)).await.unwrap().unwrap();
    assert_eq!(unit.attempts, 1);

    // first retry: requeued with a backoff in the future, so not claimable
    // right away
    let requeued = queue::retry_unit(pool(&ctx), &unit, 3, 60_000).await.unwrap();
    assert!(requeued);
    assert!(queue::claim_next(pool(&ctx)).await.unwrap().is_none());

    // attempts at the cap: the unit is marked dead
    let exhausted = queue::QueueUnit {
        attempts: 3,
        ..unit
    };
    let requeued = queue::retry_unit(pool(&ctx), &exhausted, 3, 60_000)
        .await
        .unwrap();
    assert!(!requeued);

    let state: String = sqlx::query_scalar("SELECT state FROM import_queue WHERE queue_id = ?")
        .bind(unit.queue_id)
        .fetch_one(pool(&ctx))
        .await
        .unwrap();
    assert_eq!(state, "dead");
}

#[tokio::test]
async fn reenqueue_resets_a_finished_unit() {
    let ctx = create_test_context().await;
    let session = Uuid::new_v4();

    queue::enqueue_batches(pool(&ctx), session, &[1]).await.unwrap();
    let unit = queue::claim_next(pool(&ctx)).await.unwrap().unwrap();
    queue::mark_done(pool(&ctx), unit.queue_id).await.unwrap();
    assert!(queue::claim_next(pool(&ctx)).await.unwrap().is_none());

    // retry path re-enqueues the same (session, batch) row
    queue::enqueue_batches(pool(&ctx), session, &[1]).await.unwrap();
    let again = queue::claim_next(pool(&ctx)).await.unwrap().unwrap();
    assert_eq!(again.queue_id, unit.queue_id);
    assert_eq!(again.attempts, 1);
}
