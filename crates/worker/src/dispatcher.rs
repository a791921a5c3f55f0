//! Pending-task poller.
//!
//! Tasks are usually created by another process (the HTTP layer) and sit in
//! PENDING until this loop hands them to the [`TaskOrchestrator`]. The
//! orchestrator's PENDING → PROCESSING transition is conditional, so a task
//! picked up twice still runs once.

use std::sync::Arc;
use std::time::Duration;

use slidesmith_db::GenerationStore;
use slidesmith_pipeline::{PipelineError, TaskOrchestrator};
use tokio_util::sync::CancellationToken;

pub struct PendingTaskDispatcher {
    store: Arc<dyn GenerationStore>,
    orchestrator: TaskOrchestrator,
    poll_interval: Duration,
    batch_size: i64,
}

impl PendingTaskDispatcher {
    pub fn new(
        store: Arc<dyn GenerationStore>,
        orchestrator: TaskOrchestrator,
        poll_interval: Duration,
        batch_size: i64,
    ) -> Self {
        Self {
            store,
            orchestrator,
            poll_interval,
            batch_size,
        }
    }

    /// Run the dispatcher loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            batch_size = self.batch_size,
            "Task dispatcher started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Task dispatcher shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.try_dispatch().await {
                        tracing::error!(error = %e, "Dispatch cycle failed");
                    }
                }
            }
        }
    }

    /// One cycle: hand every pending task not already running here to the
    /// orchestrator. Returns how many were newly scheduled.
    pub async fn try_dispatch(&self) -> Result<usize, PipelineError> {
        let pending = self.store.list_pending_tasks(self.batch_size).await?;
        let mut scheduled = 0;
        for task in pending {
            let task_id = task.id;
            if self.orchestrator.dispatch(task).await {
                tracing::debug!(task_id, "Pending task scheduled");
                scheduled += 1;
            }
        }
        Ok(scheduled)
    }
}
