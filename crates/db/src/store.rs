//! The persistence seam of the pipeline.
//!
//! [`GenerationStore`] is everything the orchestrator and the jobs need from
//! the database. [`PgStore`] delegates to the repositories; the in-memory
//! implementation lives in [`crate::memory`].

use async_trait::async_trait;
use slidesmith_core::progress::TaskProgress;
use slidesmith_core::scope::ScopeKey;
use slidesmith_core::template::TemplateConfig;
use slidesmith_core::types::DbId;

use crate::error::StoreError;
use crate::models::artifact_version::{ArtifactVersion, NewArtifactVersion};
use crate::models::page::{CreatePage, Page, PageDescription};
use crate::models::project::{CreateProject, Project};
use crate::models::status::{PageStatus, ProjectStatus, TaskStatus};
use crate::models::task::{CreateTask, Task};
use crate::repositories::{ArtifactVersionRepo, PageRepo, ProjectRepo, TaskRepo};
use crate::DbPool;

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence operations used by the generation pipeline.
#[async_trait]
pub trait GenerationStore: Send + Sync {
    // -- Tasks --

    async fn create_task(&self, input: &CreateTask) -> StoreResult<Task>;
    async fn find_task(&self, id: DbId) -> StoreResult<Option<Task>>;
    async fn list_pending_tasks(&self, limit: i64) -> StoreResult<Vec<Task>>;
    /// PENDING → PROCESSING. `false` if the task was not pending.
    async fn mark_task_processing(&self, id: DbId) -> StoreResult<bool>;
    async fn update_task_progress(&self, id: DbId, progress: &TaskProgress) -> StoreResult<()>;
    /// Write the terminal status. `false` if the task was already terminal.
    async fn finish_task(
        &self,
        id: DbId,
        status: TaskStatus,
        error_message: Option<&str>,
        progress: &TaskProgress,
    ) -> StoreResult<bool>;

    // -- Projects --

    async fn create_project(&self, input: &CreateProject) -> StoreResult<Project>;
    async fn find_project(&self, id: DbId) -> StoreResult<Option<Project>>;
    async fn update_project_status(&self, id: DbId, status: ProjectStatus) -> StoreResult<()>;
    async fn update_template_config(&self, id: DbId, config: &TemplateConfig) -> StoreResult<()>;

    // -- Pages --

    async fn create_page(&self, input: &CreatePage) -> StoreResult<Page>;
    async fn find_page(&self, id: DbId) -> StoreResult<Option<Page>>;
    /// Pages of a project ordered by `order_index`, optionally filtered by id.
    async fn list_pages(&self, project_id: DbId, page_ids: Option<&[DbId]>)
        -> StoreResult<Vec<Page>>;
    async fn update_page_status(&self, id: DbId, status: PageStatus) -> StoreResult<()>;
    async fn save_page_description(
        &self,
        id: DbId,
        description: &PageDescription,
    ) -> StoreResult<()>;

    // -- Artifact versions --

    /// Highest version number in the scope, 0 when empty.
    async fn max_version(&self, scope: &ScopeKey) -> StoreResult<i32>;
    /// Atomically demote the current version, insert `input` as current and
    /// move the owner's pointer. Fails with [`StoreError::Conflict`] when the
    /// version number is not above the scope's maximum.
    async fn insert_current_version(&self, input: &NewArtifactVersion)
        -> StoreResult<ArtifactVersion>;
    /// Versions in the scope, newest first.
    async fn list_versions(&self, scope: &ScopeKey) -> StoreResult<Vec<ArtifactVersion>>;
    async fn find_current_version(&self, scope: &ScopeKey) -> StoreResult<Option<ArtifactVersion>>;
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

/// [`GenerationStore`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn require_row(updated: bool, entity: &'static str, id: DbId) -> StoreResult<()> {
    if updated {
        Ok(())
    } else {
        Err(StoreError::NotFound { entity, id })
    }
}

#[async_trait]
impl GenerationStore for PgStore {
    async fn create_task(&self, input: &CreateTask) -> StoreResult<Task> {
        Ok(TaskRepo::create(&self.pool, input).await?)
    }

    async fn find_task(&self, id: DbId) -> StoreResult<Option<Task>> {
        Ok(TaskRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_pending_tasks(&self, limit: i64) -> StoreResult<Vec<Task>> {
        Ok(TaskRepo::list_pending(&self.pool, limit).await?)
    }

    async fn mark_task_processing(&self, id: DbId) -> StoreResult<bool> {
        Ok(TaskRepo::mark_processing(&self.pool, id).await?)
    }

    async fn update_task_progress(&self, id: DbId, progress: &TaskProgress) -> StoreResult<()> {
        TaskRepo::update_progress(&self.pool, id, progress).await?;
        Ok(())
    }

    async fn finish_task(
        &self,
        id: DbId,
        status: TaskStatus,
        error_message: Option<&str>,
        progress: &TaskProgress,
    ) -> StoreResult<bool> {
        Ok(TaskRepo::finish(&self.pool, id, status, error_message, progress).await?)
    }

    async fn create_project(&self, input: &CreateProject) -> StoreResult<Project> {
        Ok(ProjectRepo::create(&self.pool, input).await?)
    }

    async fn find_project(&self, id: DbId) -> StoreResult<Option<Project>> {
        Ok(ProjectRepo::find_by_id(&self.pool, id).await?)
    }

    async fn update_project_status(&self, id: DbId, status: ProjectStatus) -> StoreResult<()> {
        let updated = ProjectRepo::update_status(&self.pool, id, status).await?;
        require_row(updated, "project", id)
    }

    async fn update_template_config(&self, id: DbId, config: &TemplateConfig) -> StoreResult<()> {
        let updated = ProjectRepo::update_template_config(&self.pool, id, config).await?;
        require_row(updated, "project", id)
    }

    async fn create_page(&self, input: &CreatePage) -> StoreResult<Page> {
        Ok(PageRepo::create(&self.pool, input).await?)
    }

    async fn find_page(&self, id: DbId) -> StoreResult<Option<Page>> {
        Ok(PageRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_pages(
        &self,
        project_id: DbId,
        page_ids: Option<&[DbId]>,
    ) -> StoreResult<Vec<Page>> {
        Ok(PageRepo::list_by_project(&self.pool, project_id, page_ids).await?)
    }

    async fn update_page_status(&self, id: DbId, status: PageStatus) -> StoreResult<()> {
        let updated = PageRepo::update_status(&self.pool, id, status).await?;
        require_row(updated, "page", id)
    }

    async fn save_page_description(
        &self,
        id: DbId,
        description: &PageDescription,
    ) -> StoreResult<()> {
        let updated = PageRepo::save_description(&self.pool, id, description).await?;
        require_row(updated, "page", id)
    }

    async fn max_version(&self, scope: &ScopeKey) -> StoreResult<i32> {
        Ok(ArtifactVersionRepo::max_version(&self.pool, scope).await?)
    }

    async fn insert_current_version(
        &self,
        input: &NewArtifactVersion,
    ) -> StoreResult<ArtifactVersion> {
        ArtifactVersionRepo::insert_current(&self.pool, input)
            .await?
            .ok_or_else(|| StoreError::Conflict {
                scope_key: input.scope.to_string(),
                detail: format!("version {} is not above the current maximum", input.version_number),
            })
    }

    async fn list_versions(&self, scope: &ScopeKey) -> StoreResult<Vec<ArtifactVersion>> {
        Ok(ArtifactVersionRepo::list_by_scope(&self.pool, scope).await?)
    }

    async fn find_current_version(&self, scope: &ScopeKey) -> StoreResult<Option<ArtifactVersion>> {
        Ok(ArtifactVersionRepo::find_current(&self.pool, scope).await?)
    }
}
