//! Repository for the `artifact_versions` table.

use slidesmith_core::scope::ScopeKey;
use sqlx::PgPool;

use crate::models::artifact_version::{ArtifactOwner, ArtifactVersion, NewArtifactVersion};
use crate::models::status::PageStatus;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str =
    "id, scope_key, version_number, is_current, artifact_path, source, created_at";

/// Provides version-management operations for generated artifacts.
pub struct ArtifactVersionRepo;

impl ArtifactVersionRepo {
    /// Highest version number in a scope, or 0 if the scope is empty.
    pub async fn max_version(pool: &PgPool, scope: &ScopeKey) -> Result<i32, sqlx::Error> {
        let row: (i32,) = sqlx::query_as(
            "SELECT COALESCE(MAX(version_number), 0) \
             FROM artifact_versions WHERE scope_key = $1",
        )
        .bind(scope.to_string())
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Insert `input` as the new current version of its scope and move the
    /// owner's latest-artifact pointer, all in one transaction.
    ///
    /// A transaction-scoped advisory lock on the scope key serializes writers
    /// across processes. Returns `None` without writing anything when the
    /// scope already holds a version at or above `input.version_number`.
    pub async fn insert_current(
        pool: &PgPool,
        input: &NewArtifactVersion,
    ) -> Result<Option<ArtifactVersion>, sqlx::Error> {
        let scope_key = input.scope.to_string();
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&scope_key)
            .execute(&mut *tx)
            .await?;

        let max: (i32,) = sqlx::query_as(
            "SELECT COALESCE(MAX(version_number), 0) \
             FROM artifact_versions WHERE scope_key = $1",
        )
        .bind(&scope_key)
        .fetch_one(&mut *tx)
        .await?;
        if max.0 >= input.version_number {
            tx.rollback().await?;
            return Ok(None);
        }

        // Demote the current version
        sqlx::query(
            "UPDATE artifact_versions SET is_current = false \
             WHERE scope_key = $1 AND is_current = true",
        )
        .bind(&scope_key)
        .execute(&mut *tx)
        .await?;

        // Insert the new version as current
        let query = format!(
            "INSERT INTO artifact_versions \
                (scope_key, version_number, is_current, artifact_path, source) \
             VALUES ($1, $2, true, $3, $4) \
             RETURNING {COLUMNS}"
        );
        let version = sqlx::query_as::<_, ArtifactVersion>(&query)
            .bind(&scope_key)
            .bind(input.version_number)
            .bind(&input.artifact_path)
            .bind(input.source.as_str())
            .fetch_one(&mut *tx)
            .await?;

        // Move the owner's pointer
        match input.owner {
            ArtifactOwner::Page(page_id) => {
                sqlx::query(
                    "UPDATE pages SET generated_image_path = $2, status_id = $3 WHERE id = $1",
                )
                .bind(page_id)
                .bind(&input.artifact_path)
                .bind(PageStatus::Completed.id())
                .execute(&mut *tx)
                .await?;
            }
            ArtifactOwner::Project(project_id) => {
                sqlx::query("UPDATE projects SET primary_artifact_path = $2 WHERE id = $1")
                    .bind(project_id)
                    .bind(&input.artifact_path)
                    .execute(&mut *tx)
                    .await?;
            }
            ArtifactOwner::Detached => {}
        }

        tx.commit().await?;
        Ok(Some(version))
    }

    /// All versions in a scope, newest first.
    pub async fn list_by_scope(
        pool: &PgPool,
        scope: &ScopeKey,
    ) -> Result<Vec<ArtifactVersion>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM artifact_versions \
             WHERE scope_key = $1 \
             ORDER BY version_number DESC"
        );
        sqlx::query_as::<_, ArtifactVersion>(&query)
            .bind(scope.to_string())
            .fetch_all(pool)
            .await
    }

    pub async fn find_current(
        pool: &PgPool,
        scope: &ScopeKey,
    ) -> Result<Option<ArtifactVersion>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM artifact_versions \
             WHERE scope_key = $1 AND is_current = true"
        );
        sqlx::query_as::<_, ArtifactVersion>(&query)
            .bind(scope.to_string())
            .fetch_optional(pool)
            .await
    }
}
