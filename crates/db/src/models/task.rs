//! Background task entity and DTOs.

use serde::{Deserialize, Serialize};
use slidesmith_core::job::JobKind;
use slidesmith_core::progress::TaskProgress;
use slidesmith_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

use super::status::{StatusId, TaskStatus};

/// A row from the `tasks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Task {
    pub id: DbId,
    pub project_id: Option<DbId>,
    pub job_kind: String,
    pub status_id: StatusId,
    /// The serialized job request.
    pub parameters: serde_json::Value,
    pub progress: Json<TaskProgress>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl Task {
    pub fn status(&self) -> Option<TaskStatus> {
        TaskStatus::from_id(self.status_id)
    }

    pub fn kind(&self) -> Result<JobKind, slidesmith_core::error::CoreError> {
        self.job_kind.parse()
    }
}

/// DTO for creating a pending task.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTask {
    pub project_id: Option<DbId>,
    pub job_kind: JobKind,
    pub parameters: serde_json::Value,
}
