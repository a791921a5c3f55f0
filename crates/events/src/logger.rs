//! Event log subscriber.
//!
//! [`EventLogger`] subscribes to the [`EventBus`](crate::bus::EventBus) and
//! writes every task event as a structured tracing event. It exits when the
//! bus is dropped.

use tokio::sync::broadcast;

use crate::bus::TaskEvent;

/// Background service that logs task events.
pub struct EventLogger;

impl EventLogger {
    /// Run the logging loop until the channel closes.
    pub async fn run(mut receiver: broadcast::Receiver<TaskEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => Self::log(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event logger lagged, some events were not logged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, event logger shutting down");
                    break;
                }
            }
        }
    }

    fn log(event: &TaskEvent) {
        if event.is_terminal() {
            tracing::info!(
                event_type = %event.event_type,
                task_id = event.task_id,
                project_id = ?event.project_id,
                job_kind = ?event.job_kind,
                payload = %event.payload,
                "Task finished",
            );
        } else {
            tracing::debug!(
                event_type = %event.event_type,
                task_id = event.task_id,
                payload = %event.payload,
                "Task event",
            );
        }
    }
}
