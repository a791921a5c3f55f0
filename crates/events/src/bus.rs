//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` between the orchestrator, which
//! publishes task lifecycle events, and any number of observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slidesmith_core::job_events::{TASK_COMPLETED, TASK_FAILED, TASK_PARTIAL};
use slidesmith_core::types::DbId;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// TaskEvent
// ---------------------------------------------------------------------------

/// A lifecycle event of a background task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    /// Dot-separated event name, one of the `slidesmith_core::job_events`
    /// constants.
    pub event_type: String,

    pub task_id: DbId,

    /// Owning project, if any.
    pub project_id: Option<DbId>,

    /// Job kind name, e.g. `"generate_images"`.
    pub job_kind: Option<String>,

    /// Progress snapshot (and error message for failures).
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl TaskEvent {
    pub fn new(event_type: impl Into<String>, task_id: DbId) -> Self {
        Self {
            event_type: event_type.into(),
            task_id,
            project_id: None,
            job_kind: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_project(mut self, project_id: Option<DbId>) -> Self {
        self.project_id = project_id;
        self
    }

    pub fn with_job_kind(mut self, job_kind: impl Into<String>) -> Self {
        self.job_kind = Some(job_kind.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Whether this event reports a terminal task status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.event_type.as_str(),
            TASK_COMPLETED | TASK_PARTIAL | TASK_FAILED
        )
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use slidesmith_events::bus::{EventBus, TaskEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(TaskEvent::new("task.processing", 1));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<TaskEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest unconsumed events are dropped and
    /// slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Dropped when nobody
    /// listens.
    pub fn publish(&self, event: TaskEvent) {
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use slidesmith_core::job_events::{TASK_PROCESSING, TASK_PROGRESS};

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(
            TaskEvent::new(TASK_PROGRESS, 42)
                .with_project(Some(7))
                .with_job_kind("generate_images")
                .with_payload(serde_json::json!({"total": 6, "completed": 1, "failed": 0})),
        );

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, TASK_PROGRESS);
        assert_eq!(received.task_id, 42);
        assert_eq!(received.project_id, Some(7));
        assert_eq!(received.job_kind.as_deref(), Some("generate_images"));
        assert_eq!(received.payload["completed"], 1);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(TaskEvent::new(TASK_PROCESSING, 1));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(e1.task_id, e2.task_id);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(TaskEvent::new(TASK_FAILED, 3));
    }

    #[test]
    fn terminal_events() {
        assert!(TaskEvent::new(TASK_PARTIAL, 1).is_terminal());
        assert!(TaskEvent::new(TASK_COMPLETED, 1).is_terminal());
        assert!(!TaskEvent::new(TASK_PROGRESS, 1).is_terminal());
    }
}
