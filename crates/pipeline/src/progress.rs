//! Durable per-task progress reporting.
//!
//! Every unit completion goes through [`ProgressReporter`]: the counters are
//! mutated and persisted under one lock, so the stored snapshot never moves
//! backwards even when workers finish out of order.

use std::sync::Arc;

use slidesmith_core::job::JobKind;
use slidesmith_core::job_events::TASK_PROGRESS;
use slidesmith_core::progress::{ArtifactRef, ProgressDetail, TaskProgress, UnitFailure};
use slidesmith_core::types::DbId;
use slidesmith_db::GenerationStore;
use slidesmith_events::{EventBus, TaskEvent};
use tokio::sync::Mutex;

use crate::error::PipelineError;

pub struct ProgressReporter {
    task_id: DbId,
    project_id: Option<DbId>,
    job_kind: JobKind,
    store: Arc<dyn GenerationStore>,
    events: Arc<EventBus>,
    progress: Mutex<TaskProgress>,
}

impl ProgressReporter {
    pub fn new(
        task_id: DbId,
        project_id: Option<DbId>,
        job_kind: JobKind,
        store: Arc<dyn GenerationStore>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            task_id,
            project_id,
            job_kind,
            store,
            events,
            progress: Mutex::new(TaskProgress::default()),
        }
    }

    pub fn task_id(&self) -> DbId {
        self.task_id
    }

    /// Fix the unit count and persist the empty snapshot.
    pub async fn begin(&self, total: u32, detail: ProgressDetail) -> Result<(), PipelineError> {
        let mut progress = self.progress.lock().await;
        *progress = TaskProgress::new(total, detail);
        self.store
            .update_task_progress(self.task_id, &progress)
            .await?;
        tracing::debug!(task_id = self.task_id, total, "Progress initialised");
        Ok(())
    }

    pub async fn record_success(&self, artifact: Option<ArtifactRef>) {
        let mut progress = self.progress.lock().await;
        if let Err(e) = progress.record_success(artifact) {
            tracing::warn!(task_id = self.task_id, error = %e, "Dropped success report");
            return;
        }
        self.persist(&progress).await;
    }

    pub async fn record_failure(&self, failure: UnitFailure) {
        let mut progress = self.progress.lock().await;
        tracing::warn!(
            task_id = self.task_id,
            unit = %failure.unit,
            error = %failure.error,
            "Unit failed"
        );
        if let Err(e) = progress.record_failure(failure) {
            tracing::warn!(task_id = self.task_id, error = %e, "Dropped failure report");
            return;
        }
        self.persist(&progress).await;
    }

    /// Current in-memory snapshot.
    pub async fn snapshot(&self) -> TaskProgress {
        self.progress.lock().await.clone()
    }

    /// Write the snapshot and announce it. Called with the lock held.
    async fn persist(&self, progress: &TaskProgress) {
        if let Err(e) = self.store.update_task_progress(self.task_id, progress).await {
            tracing::error!(task_id = self.task_id, error = %e, "Failed to persist task progress");
        }

        let payload = serde_json::to_value(progress).unwrap_or_default();
        self.events.publish(
            TaskEvent::new(TASK_PROGRESS, self.task_id)
                .with_project(self.project_id)
                .with_job_kind(self.job_kind.as_str())
                .with_payload(payload),
        );
    }
}
