//! Event types for the sitebeam event system
//!
//! Provides shared event definitions and the EventBus used to broadcast
//! import progress to SSE subscribers and other in-process listeners.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Import pipeline events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ImportEvent {
    /// Upload accepted and its batch plan enqueued
    SessionQueued {
        session_id: Uuid,
        batch_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A worker picked up one batch
    BatchStarted {
        session_id: Uuid,
        batch_number: u32,
        timestamp: DateTime<Utc>,
    },

    /// One batch committed or aborted
    BatchFinished {
        session_id: Uuid,
        batch_number: u32,
        success: bool,
        elements_created: usize,
        duplicates_skipped: usize,
        timestamp: DateTime<Utc>,
    },

    /// Session reached a terminal status
    SessionFinished {
        session_id: Uuid,
        status: String,
        timestamp: DateTime<Utc>,
    },

    /// Session contents were rolled back
    SessionRolledBack {
        session_id: Uuid,
        elements_removed: usize,
        jobs_removed: usize,
        timestamp: DateTime<Utc>,
    },

    /// Stalled session closed out by the reaper
    SessionReaped {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
    },
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally, providing non-blocking publish,
/// multiple concurrent subscribers, and automatic cleanup when
/// subscribers drop. Slow subscribers observe lag, not backpressure.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ImportEvent>,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ImportEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns the subscriber count, or an error when nobody is listening.
    /// Emission failures are not fatal anywhere in the pipeline.
    pub fn emit(
        &self,
        event: ImportEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<ImportEvent>> {
        self.tx.send(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_emitted_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(ImportEvent::SessionReaped {
            session_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        })
        .unwrap();

        match rx.recv().await.unwrap() {
            ImportEvent::SessionReaped { .. } => {}
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn emit_without_subscribers_is_an_error() {
        let bus = EventBus::new(16);
        let result = bus.emit(ImportEvent::SessionReaped {
            session_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        });
        assert!(result.is_err());
    }
}
