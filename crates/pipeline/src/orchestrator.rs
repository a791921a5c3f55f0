//! Task orchestration: PENDING → PROCESSING → terminal.
//!
//! [`TaskOrchestrator`] owns the top-level task pool. Each dispatched task
//! waits for one of `task_workers` slots, runs its job body and then writes
//! exactly one terminal status derived from the job kind's outcome policy.
//! Shutdown waits for in-flight tasks; running tasks are never cancelled.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use slidesmith_core::error::CoreError;
use slidesmith_core::job::{JobKind, ProjectMilestone, TerminalOutcome};
use slidesmith_core::job_events::{TASK_COMPLETED, TASK_FAILED, TASK_PARTIAL, TASK_PROCESSING};
use slidesmith_core::progress::TaskProgress;
use slidesmith_core::types::{DbId, Timestamp};
use slidesmith_db::models::status::{ProjectStatus, TaskStatus};
use slidesmith_db::models::task::{CreateTask, Task};
use slidesmith_events::TaskEvent;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::task::TaskTracker;

use crate::context::JobContext;
use crate::error::PipelineError;
use crate::jobs::{self, JobRequest};
use crate::progress::ProgressReporter;

/// Read model of a task for callers polling its state.
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    pub id: DbId,
    pub project_id: Option<DbId>,
    pub job_kind: String,
    pub status: Option<TaskStatus>,
    pub progress: TaskProgress,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            project_id: task.project_id,
            status: task.status(),
            job_kind: task.job_kind,
            progress: task.progress.0,
            error_message: task.error_message,
            created_at: task.created_at,
            updated_at: task.updated_at,
            completed_at: task.completed_at,
        }
    }
}

fn milestone_status(milestone: ProjectMilestone) -> ProjectStatus {
    match milestone {
        ProjectMilestone::DescriptionsGenerated => ProjectStatus::DescriptionsGenerated,
        ProjectMilestone::Completed => ProjectStatus::Completed,
    }
}

fn terminal_event(outcome: TerminalOutcome) -> &'static str {
    match outcome {
        TerminalOutcome::Completed => TASK_COMPLETED,
        TerminalOutcome::Partial => TASK_PARTIAL,
        TerminalOutcome::Failed => TASK_FAILED,
    }
}

/// Error message for a job whose units all failed without a job-level error.
fn unit_failure_message(progress: &TaskProgress) -> Option<String> {
    let detail = progress.detail.as_ref()?;
    let first = detail.failures().into_iter().next()?;
    Some(format!(
        "{} of {} units failed; first: {}: {}",
        progress.failed, progress.total, first.unit, first.error
    ))
}

/// Runs background tasks on a bounded pool.
#[derive(Clone)]
pub struct TaskOrchestrator {
    ctx: Arc<JobContext>,
    slots: Arc<Semaphore>,
    tracker: TaskTracker,
    /// Tasks dispatched in this process and not yet finished.
    active: Arc<Mutex<HashSet<DbId>>>,
}

impl TaskOrchestrator {
    pub fn new(ctx: Arc<JobContext>) -> Self {
        let slots = Arc::new(Semaphore::new(ctx.config.task_workers.max(1)));
        Self {
            ctx,
            slots,
            tracker: TaskTracker::new(),
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn context(&self) -> &Arc<JobContext> {
        &self.ctx
    }

    /// Create a PENDING task for `request` and schedule it.
    ///
    /// Returns as soon as the task row exists; unit work happens in the
    /// background.
    pub async fn submit_task(
        &self,
        project_id: Option<DbId>,
        request: JobRequest,
    ) -> Result<DbId, PipelineError> {
        request.validate()?;
        let job_kind = request.kind();
        let task = self
            .ctx
            .store
            .create_task(&CreateTask {
                project_id,
                job_kind,
                parameters: serde_json::to_value(&request)?,
            })
            .await?;

        tracing::info!(task_id = task.id, project_id, job_kind = %job_kind, "Task submitted");
        let task_id = task.id;
        self.dispatch(task).await;
        Ok(task_id)
    }

    /// Schedule an existing PENDING task. `false` if it is already running in
    /// this process.
    pub async fn dispatch(&self, task: Task) -> bool {
        if !self.active.lock().await.insert(task.id) {
            return false;
        }

        let ctx = Arc::clone(&self.ctx);
        let slots = Arc::clone(&self.slots);
        let active = Arc::clone(&self.active);
        self.tracker.spawn(async move {
            let task_id = task.id;
            // The semaphore is never closed.
            if let Ok(_permit) = slots.acquire_owned().await {
                run_task(ctx, task).await;
            }
            active.lock().await.remove(&task_id);
        });
        true
    }

    pub async fn get_task(&self, task_id: DbId) -> Result<Option<TaskView>, PipelineError> {
        Ok(self.ctx.store.find_task(task_id).await?.map(TaskView::from))
    }

    pub async fn is_task_active(&self, task_id: DbId) -> bool {
        self.active.lock().await.contains(&task_id)
    }

    pub async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }

    /// Stop accepting work and wait for every dispatched task to finish.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        tracing::info!("Task orchestrator drained");
    }
}

// ---------------------------------------------------------------------------
// Task execution
// ---------------------------------------------------------------------------

fn parse_request(task: &Task) -> Result<(JobKind, JobRequest), PipelineError> {
    let kind = task.kind()?;
    let request: JobRequest = serde_json::from_value(task.parameters.clone())?;
    if request.kind() != kind {
        return Err(CoreError::Validation(format!(
            "Task parameters describe '{}' but the task is '{kind}'",
            request.kind()
        ))
        .into());
    }
    request.validate()?;
    Ok((kind, request))
}

async fn run_task(ctx: Arc<JobContext>, task: Task) {
    let task_id = task.id;
    match ctx.store.mark_task_processing(task_id).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::debug!(task_id, "Task is no longer pending, skipping");
            return;
        }
        Err(e) => {
            tracing::error!(task_id, error = %e, "Failed to mark task processing");
            return;
        }
    }

    ctx.events.publish(
        TaskEvent::new(TASK_PROCESSING, task_id)
            .with_project(task.project_id)
            .with_job_kind(task.job_kind.as_str()),
    );
    tracing::info!(task_id, job_kind = %task.job_kind, "Task processing");

    let (kind, request) = match parse_request(&task) {
        Ok(parsed) => parsed,
        Err(e) => {
            finish(
                &ctx,
                &task,
                None,
                TerminalOutcome::Failed,
                Some(e.to_string()),
                TaskProgress::default(),
            )
            .await;
            return;
        }
    };

    let reporter = ProgressReporter::new(
        task_id,
        task.project_id,
        kind,
        Arc::clone(&ctx.store),
        Arc::clone(&ctx.events),
    );
    let result = jobs::run(Arc::clone(&ctx), &task, request, &reporter).await;
    let progress = reporter.snapshot().await;

    let (outcome, error_message) = match result {
        Ok(()) => {
            let outcome = kind
                .outcome_policy()
                .resolve(progress.completed, progress.failed);
            let message = match outcome {
                TerminalOutcome::Failed => unit_failure_message(&progress),
                _ => None,
            };
            (outcome, message)
        }
        Err(e) => (TerminalOutcome::Failed, Some(e.to_string())),
    };

    finish(&ctx, &task, Some(kind), outcome, error_message, progress).await;
}

/// Write the terminal status, advance the project on unambiguous success and
/// announce the outcome.
async fn finish(
    ctx: &JobContext,
    task: &Task,
    kind: Option<JobKind>,
    outcome: TerminalOutcome,
    error_message: Option<String>,
    progress: TaskProgress,
) {
    let task_id = task.id;
    let status = TaskStatus::from(outcome);
    match ctx
        .store
        .finish_task(task_id, status, error_message.as_deref(), &progress)
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(task_id, "Task was already terminal");
            return;
        }
        Err(e) => {
            tracing::error!(task_id, error = %e, "Failed to write terminal task status");
            return;
        }
    }

    let unambiguous = outcome == TerminalOutcome::Completed
        && progress.total > 0
        && progress.completed == progress.total
        && progress.failed == 0;
    if let (true, Some(project_id), Some(milestone)) = (
        unambiguous,
        task.project_id,
        kind.and_then(JobKind::project_milestone),
    ) {
        let project_status = milestone_status(milestone);
        match ctx.store.update_project_status(project_id, project_status).await {
            Ok(()) => tracing::debug!(task_id, project_id, ?project_status, "Project advanced"),
            Err(e) => tracing::warn!(task_id, project_id, error = %e, "Failed to advance project status"),
        }
    }

    match outcome {
        TerminalOutcome::Failed => tracing::error!(
            task_id,
            completed = progress.completed,
            failed = progress.failed,
            error = error_message.as_deref().unwrap_or("-"),
            "Task failed"
        ),
        _ => tracing::info!(
            task_id,
            outcome = ?outcome,
            completed = progress.completed,
            failed = progress.failed,
            total = progress.total,
            "Task finished"
        ),
    }

    ctx.events.publish(
        TaskEvent::new(terminal_event(outcome), task_id)
            .with_project(task.project_id)
            .with_job_kind(task.job_kind.as_str())
            .with_payload(serde_json::json!({
                "progress": progress,
                "error": error_message,
            })),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use slidesmith_core::progress::{ProgressDetail, UnitFailure};

    #[test]
    fn milestones_map_to_project_statuses() {
        assert_eq!(
            milestone_status(ProjectMilestone::DescriptionsGenerated),
            ProjectStatus::DescriptionsGenerated
        );
        assert_eq!(
            milestone_status(ProjectMilestone::Completed),
            ProjectStatus::Completed
        );
    }

    #[test]
    fn all_failed_message_names_first_failure() {
        let mut progress =
            TaskProgress::new(2, ProgressDetail::for_kind(JobKind::GenerateImages, None));
        for unit in ["page 1", "page 2"] {
            progress
                .record_failure(UnitFailure {
                    unit: unit.to_string(),
                    error: "quota exceeded".to_string(),
                })
                .unwrap();
        }
        assert_eq!(
            unit_failure_message(&progress).as_deref(),
            Some("2 of 2 units failed; first: page 1: quota exceeded")
        );
    }

    #[test]
    fn terminal_events_follow_outcome() {
        assert_eq!(terminal_event(TerminalOutcome::Partial), TASK_PARTIAL);
        assert_eq!(terminal_event(TerminalOutcome::Failed), TASK_FAILED);
    }
}
