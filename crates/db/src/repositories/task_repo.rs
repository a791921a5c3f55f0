//! Repository for the `tasks` table.
//!
//! Uses `TaskStatus` from `models::status` for all status transitions.

use slidesmith_core::progress::TaskProgress;
use slidesmith_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::status::TaskStatus;
use crate::models::task::{CreateTask, Task};

/// Column list for `tasks` queries.
const COLUMNS: &str = "\
    id, project_id, job_kind, status_id, parameters, progress, \
    error_message, created_at, updated_at, completed_at";

/// Provides CRUD and lifecycle operations for background tasks.
pub struct TaskRepo;

impl TaskRepo {
    /// Create a new pending task.
    pub async fn create(pool: &PgPool, input: &CreateTask) -> Result<Task, sqlx::Error> {
        let query = format!(
            "INSERT INTO tasks (project_id, job_kind, status_id, parameters, progress) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(input.project_id)
            .bind(input.job_kind.as_str())
            .bind(TaskStatus::Pending.id())
            .bind(&input.parameters)
            .bind(Json(TaskProgress::default()))
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Task>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tasks WHERE id = $1");
        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Oldest pending tasks first.
    pub async fn list_pending(pool: &PgPool, limit: i64) -> Result<Vec<Task>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tasks \
             WHERE status_id = $1 \
             ORDER BY created_at ASC, id ASC \
             LIMIT $2"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(TaskStatus::Pending.id())
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Move a task from PENDING to PROCESSING.
    ///
    /// Returns `false` if the task was not pending (already picked up or
    /// finished).
    pub async fn mark_processing(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE tasks SET status_id = $2 WHERE id = $1 AND status_id = $3")
            .bind(id)
            .bind(TaskStatus::Processing.id())
            .bind(TaskStatus::Pending.id())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Overwrite the progress snapshot of a processing task.
    pub async fn update_progress(
        pool: &PgPool,
        id: DbId,
        progress: &TaskProgress,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE tasks SET progress = $2 WHERE id = $1 AND status_id = $3")
            .bind(id)
            .bind(Json(progress))
            .bind(TaskStatus::Processing.id())
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Write the terminal status, final progress and error message.
    ///
    /// Returns `false` if the task was already terminal.
    pub async fn finish(
        pool: &PgPool,
        id: DbId,
        status: TaskStatus,
        error_message: Option<&str>,
        progress: &TaskProgress,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks \
             SET status_id = $2, error_message = $3, progress = $4, completed_at = NOW() \
             WHERE id = $1 AND status_id IN ($5, $6)",
        )
        .bind(id)
        .bind(status.id())
        .bind(error_message)
        .bind(Json(progress))
        .bind(TaskStatus::Pending.id())
        .bind(TaskStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
