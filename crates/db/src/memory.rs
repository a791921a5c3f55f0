//! In-memory [`GenerationStore`] for tests and local runs.
//!
//! All state sits behind one mutex, so every trait method is atomic with
//! respect to every other. Ids come from one counter shared by all tables.

use std::collections::BTreeMap;
#[cfg(any(test, feature = "test-util"))]
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use slidesmith_core::progress::TaskProgress;
use slidesmith_core::scope::ScopeKey;
use slidesmith_core::template::TemplateConfig;
use slidesmith_core::types::DbId;
use sqlx::types::Json;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::models::artifact_version::{ArtifactOwner, ArtifactVersion, NewArtifactVersion};
use crate::models::page::{CreatePage, Page, PageDescription};
use crate::models::project::{CreateProject, Project};
use crate::models::status::{PageStatus, ProjectStatus, TaskStatus};
use crate::models::task::{CreateTask, Task};
use crate::store::{GenerationStore, StoreResult};

#[derive(Default)]
struct MemoryState {
    next_id: DbId,
    tasks: BTreeMap<DbId, Task>,
    projects: BTreeMap<DbId, Project>,
    pages: BTreeMap<DbId, Page>,
    versions: Vec<ArtifactVersion>,
}

impl MemoryState {
    fn allocate_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn max_version(&self, scope_key: &str) -> i32 {
        self.versions
            .iter()
            .filter(|v| v.scope_key == scope_key)
            .map(|v| v.version_number)
            .max()
            .unwrap_or(0)
    }
}

/// [`GenerationStore`] that keeps everything in process memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    #[cfg(any(test, feature = "test-util"))]
    fail_version_inserts: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `insert_current_version` fail with a database
    /// error, leaving state untouched.
    #[cfg(any(test, feature = "test-util"))]
    pub fn set_fail_version_inserts(&self, fail: bool) {
        self.fail_version_inserts.store(fail, Ordering::SeqCst);
    }

    /// Every stored version row, in insertion order.
    pub async fn all_versions(&self) -> Vec<ArtifactVersion> {
        self.state.lock().await.versions.clone()
    }
}

#[async_trait]
impl GenerationStore for MemoryStore {
    // -- Tasks --

    async fn create_task(&self, input: &CreateTask) -> StoreResult<Task> {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        let now = Utc::now();
        let task = Task {
            id,
            project_id: input.project_id,
            job_kind: input.job_kind.as_str().to_string(),
            status_id: TaskStatus::Pending.id(),
            parameters: input.parameters.clone(),
            progress: Json(TaskProgress::default()),
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        state.tasks.insert(id, task.clone());
        Ok(task)
    }

    async fn find_task(&self, id: DbId) -> StoreResult<Option<Task>> {
        Ok(self.state.lock().await.tasks.get(&id).cloned())
    }

    async fn list_pending_tasks(&self, limit: i64) -> StoreResult<Vec<Task>> {
        let state = self.state.lock().await;
        let mut pending: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| t.status_id == TaskStatus::Pending.id())
            .cloned()
            .collect();
        pending.sort_by_key(|t| (t.created_at, t.id));
        pending.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(pending)
    }

    async fn mark_task_processing(&self, id: DbId) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.tasks.get_mut(&id) {
            Some(task) if task.status_id == TaskStatus::Pending.id() => {
                task.status_id = TaskStatus::Processing.id();
                task.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_task_progress(&self, id: DbId, progress: &TaskProgress) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if let Some(task) = state.tasks.get_mut(&id) {
            if task.status_id == TaskStatus::Processing.id() {
                task.progress = Json(progress.clone());
                task.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn finish_task(
        &self,
        id: DbId,
        status: TaskStatus,
        error_message: Option<&str>,
        progress: &TaskProgress,
    ) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let Some(task) = state.tasks.get_mut(&id) else {
            return Ok(false);
        };
        if task.status().is_some_and(TaskStatus::is_terminal) {
            return Ok(false);
        }
        let now = Utc::now();
        task.status_id = status.id();
        task.error_message = error_message.map(str::to_string);
        task.progress = Json(progress.clone());
        task.updated_at = now;
        task.completed_at = Some(now);
        Ok(true)
    }

    // -- Projects --

    async fn create_project(&self, input: &CreateProject) -> StoreResult<Project> {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        let now = Utc::now();
        let project = Project {
            id,
            status_id: ProjectStatus::Draft.id(),
            outline_text: input.outline_text.clone(),
            extra_requirements: input.extra_requirements.clone(),
            template_style: input.template_style.clone(),
            template_config: Json(input.template_config.clone()),
            primary_artifact_path: None,
            created_at: now,
            updated_at: now,
        };
        state.projects.insert(id, project.clone());
        Ok(project)
    }

    async fn find_project(&self, id: DbId) -> StoreResult<Option<Project>> {
        Ok(self.state.lock().await.projects.get(&id).cloned())
    }

    async fn update_project_status(&self, id: DbId, status: ProjectStatus) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let project = state
            .projects
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "project", id })?;
        project.status_id = status.id();
        project.updated_at = Utc::now();
        Ok(())
    }

    async fn update_template_config(&self, id: DbId, config: &TemplateConfig) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let project = state
            .projects
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "project", id })?;
        project.template_config = Json(config.clone());
        project.updated_at = Utc::now();
        Ok(())
    }

    // -- Pages --

    async fn create_page(&self, input: &CreatePage) -> StoreResult<Page> {
        let mut state = self.state.lock().await;
        if !state.projects.contains_key(&input.project_id) {
            return Err(StoreError::NotFound {
                entity: "project",
                id: input.project_id,
            });
        }
        let id = state.allocate_id();
        let now = Utc::now();
        let page = Page {
            id,
            project_id: input.project_id,
            order_index: input.order_index,
            page_type: input.page_type.clone(),
            outline: Json(input.outline.clone()),
            description: None,
            generated_image_path: None,
            status_id: PageStatus::Draft.id(),
            created_at: now,
            updated_at: now,
        };
        state.pages.insert(id, page.clone());
        Ok(page)
    }

    async fn find_page(&self, id: DbId) -> StoreResult<Option<Page>> {
        Ok(self.state.lock().await.pages.get(&id).cloned())
    }

    async fn list_pages(
        &self,
        project_id: DbId,
        page_ids: Option<&[DbId]>,
    ) -> StoreResult<Vec<Page>> {
        let state = self.state.lock().await;
        let mut pages: Vec<Page> = state
            .pages
            .values()
            .filter(|p| p.project_id == project_id)
            .filter(|p| page_ids.map_or(true, |ids| ids.contains(&p.id)))
            .cloned()
            .collect();
        pages.sort_by_key(|p| (p.order_index, p.id));
        Ok(pages)
    }

    async fn update_page_status(&self, id: DbId, status: PageStatus) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let page = state
            .pages
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "page", id })?;
        page.status_id = status.id();
        page.updated_at = Utc::now();
        Ok(())
    }

    async fn save_page_description(
        &self,
        id: DbId,
        description: &PageDescription,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let page = state
            .pages
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "page", id })?;
        page.description = Some(Json(description.clone()));
        page.status_id = PageStatus::DescriptionGenerated.id();
        page.updated_at = Utc::now();
        Ok(())
    }

    // -- Artifact versions --

    async fn max_version(&self, scope: &ScopeKey) -> StoreResult<i32> {
        Ok(self.state.lock().await.max_version(&scope.to_string()))
    }

    async fn insert_current_version(
        &self,
        input: &NewArtifactVersion,
    ) -> StoreResult<ArtifactVersion> {
        #[cfg(any(test, feature = "test-util"))]
        if self.fail_version_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }

        let scope_key = input.scope.to_string();
        let mut state = self.state.lock().await;

        let max = state.max_version(&scope_key);
        if max >= input.version_number {
            return Err(StoreError::Conflict {
                scope_key,
                detail: format!(
                    "version {} is not above the current maximum {max}",
                    input.version_number
                ),
            });
        }

        // Validate the owner before touching anything.
        match input.owner {
            ArtifactOwner::Page(id) if !state.pages.contains_key(&id) => {
                return Err(StoreError::NotFound { entity: "page", id });
            }
            ArtifactOwner::Project(id) if !state.projects.contains_key(&id) => {
                return Err(StoreError::NotFound { entity: "project", id });
            }
            _ => {}
        }

        for version in state.versions.iter_mut().filter(|v| v.scope_key == scope_key) {
            version.is_current = false;
        }

        let id = state.allocate_id();
        let now = Utc::now();
        let version = ArtifactVersion {
            id,
            scope_key,
            version_number: input.version_number,
            is_current: true,
            artifact_path: input.artifact_path.clone(),
            source: input.source.as_str().to_string(),
            created_at: now,
        };
        state.versions.push(version.clone());

        match input.owner {
            ArtifactOwner::Page(page_id) => {
                if let Some(page) = state.pages.get_mut(&page_id) {
                    page.generated_image_path = Some(input.artifact_path.clone());
                    page.status_id = PageStatus::Completed.id();
                    page.updated_at = now;
                }
            }
            ArtifactOwner::Project(project_id) => {
                if let Some(project) = state.projects.get_mut(&project_id) {
                    project.primary_artifact_path = Some(input.artifact_path.clone());
                    project.updated_at = now;
                }
            }
            ArtifactOwner::Detached => {}
        }

        Ok(version)
    }

    async fn list_versions(&self, scope: &ScopeKey) -> StoreResult<Vec<ArtifactVersion>> {
        let scope_key = scope.to_string();
        let state = self.state.lock().await;
        let mut versions: Vec<ArtifactVersion> = state
            .versions
            .iter()
            .filter(|v| v.scope_key == scope_key)
            .cloned()
            .collect();
        versions.sort_by(|a, b| b.version_number.cmp(&a.version_number));
        Ok(versions)
    }

    async fn find_current_version(&self, scope: &ScopeKey) -> StoreResult<Option<ArtifactVersion>> {
        let scope_key = scope.to_string();
        let state = self.state.lock().await;
        Ok(state
            .versions
            .iter()
            .find(|v| v.scope_key == scope_key && v.is_current)
            .cloned())
    }
}
