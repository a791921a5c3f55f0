//! Repository for the `projects` table.

use slidesmith_core::template::TemplateConfig;
use slidesmith_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::project::{CreateProject, Project};
use crate::models::status::ProjectStatus;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, status_id, outline_text, extra_requirements, template_style, \
    template_config, primary_artifact_path, created_at, updated_at";

/// Provides CRUD operations for projects.
pub struct ProjectRepo;

impl ProjectRepo {
    pub async fn create(pool: &PgPool, input: &CreateProject) -> Result<Project, sqlx::Error> {
        let query = format!(
            "INSERT INTO projects \
                (status_id, outline_text, extra_requirements, template_style, template_config) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(ProjectStatus::Draft.id())
            .bind(&input.outline_text)
            .bind(&input.extra_requirements)
            .bind(&input.template_style)
            .bind(Json(&input.template_config))
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1");
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Returns `true` if a row was updated.
    pub async fn update_status(
        pool: &PgPool,
        id: DbId,
        status: ProjectStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE projects SET status_id = $2 WHERE id = $1")
            .bind(id)
            .bind(status.id())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the template configuration. Returns `true` if a row was updated.
    pub async fn update_template_config(
        pool: &PgPool,
        id: DbId,
        config: &TemplateConfig,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE projects SET template_config = $2 WHERE id = $1")
            .bind(id)
            .bind(Json(config))
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
