//! Repository for the `pages` table.

use slidesmith_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::page::{CreatePage, Page, PageDescription};
use crate::models::status::PageStatus;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, project_id, order_index, page_type, outline, description, \
    generated_image_path, status_id, created_at, updated_at";

/// Provides CRUD operations for pages.
pub struct PageRepo;

impl PageRepo {
    pub async fn create(pool: &PgPool, input: &CreatePage) -> Result<Page, sqlx::Error> {
        let query = format!(
            "INSERT INTO pages (project_id, order_index, page_type, outline, status_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Page>(&query)
            .bind(input.project_id)
            .bind(input.order_index)
            .bind(&input.page_type)
            .bind(Json(&input.outline))
            .bind(PageStatus::Draft.id())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Page>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM pages WHERE id = $1");
        sqlx::query_as::<_, Page>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Pages of a project in order. When `page_ids` is given, only those
    /// pages are returned.
    pub async fn list_by_project(
        pool: &PgPool,
        project_id: DbId,
        page_ids: Option<&[DbId]>,
    ) -> Result<Vec<Page>, sqlx::Error> {
        match page_ids {
            Some(ids) => {
                let query = format!(
                    "SELECT {COLUMNS} FROM pages \
                     WHERE project_id = $1 AND id = ANY($2) \
                     ORDER BY order_index ASC, id ASC"
                );
                sqlx::query_as::<_, Page>(&query)
                    .bind(project_id)
                    .bind(ids)
                    .fetch_all(pool)
                    .await
            }
            None => {
                let query = format!(
                    "SELECT {COLUMNS} FROM pages \
                     WHERE project_id = $1 \
                     ORDER BY order_index ASC, id ASC"
                );
                sqlx::query_as::<_, Page>(&query)
                    .bind(project_id)
                    .fetch_all(pool)
                    .await
            }
        }
    }

    /// Returns `true` if a row was updated.
    pub async fn update_status(
        pool: &PgPool,
        id: DbId,
        status: PageStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE pages SET status_id = $2 WHERE id = $1")
            .bind(id)
            .bind(status.id())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Store a generated description and mark the page `description_generated`.
    pub async fn save_description(
        pool: &PgPool,
        id: DbId,
        description: &PageDescription,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE pages SET description = $2, status_id = $3 WHERE id = $1")
            .bind(id)
            .bind(Json(description))
            .bind(PageStatus::DescriptionGenerated.id())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
