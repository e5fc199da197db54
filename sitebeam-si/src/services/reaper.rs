//! Stalled session reaper
//!
//! Maintenance pass that closes out abandoned in-progress sessions. A
//! session whose worker died keeps status in_progress forever; the reaper
//! fails it once its last update is older than the threshold. Committed
//! data from its successful batches is left in place.

use chrono::{Duration, Utc};
use sitebeam_common::events::{EventBus, ImportEvent};
use sqlx::SqlitePool;
use uuid::Uuid;

use sitebeam_common::Result;

use crate::db;
use crate::models::{SessionStatus, SessionSummary, UploadSession};

/// Outcome of one reaper pass
#[derive(Debug, Clone)]
pub struct ReapReport {
    pub matched: Vec<Uuid>,
    pub reaped: usize,
    pub dry_run: bool,
}

/// Find and close out stalled sessions
///
/// With `target` set, only that session is considered, regardless of age.
/// Dry-run reports matches without mutating anything.
pub async fn reap(
    pool: &SqlitePool,
    event_bus: &EventBus,
    older_than: Duration,
    target: Option<Uuid>,
    dry_run: bool,
) -> Result<ReapReport> {
    let candidates: Vec<UploadSession> = match target {
        Some(session_id) => db::sessions::load_session(pool, session_id)
            .await?
            .into_iter()
            .filter(|s| s.status == SessionStatus::InProgress)
            .collect(),
        None => db::sessions::find_stalled(pool, Utc::now() - older_than).await?,
    };

    let matched: Vec<Uuid> = candidates.iter().map(|s| s.session_id).collect();

    if dry_run {
        tracing::info!(matched = matched.len(), "Reaper dry run");
        return Ok(ReapReport {
            matched,
            reaped: 0,
            dry_run: true,
        });
    }

    let mut reaped = 0;
    for mut session in candidates {
        session.summary = SessionSummary::fold(&session.batches);
        session.status = SessionStatus::Failed;
        session.completed_at = Some(Utc::now());
        db::sessions::save_session(pool, &mut session).await?;

        // Outstanding queue units of a reaped session must not run later
        // and resurrect its status.
        db::queue::kill_for_session(pool, session.session_id).await?;

        event_bus
            .emit(ImportEvent::SessionReaped {
                session_id: session.session_id,
                timestamp: Utc::now(),
            })
            .ok();

        tracing::warn!(
            session_id = %session.session_id,
            updated_at = %session.updated_at,
            "Stalled session reaped"
        );
        reaped += 1;
    }

    Ok(ReapReport {
        matched,
        reaped,
        dry_run: false,
    })
}
