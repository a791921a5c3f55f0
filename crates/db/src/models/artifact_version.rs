//! Versioned artifact entity and DTOs.

use serde::Serialize;
use slidesmith_core::scope::ScopeKey;
use slidesmith_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `artifact_versions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ArtifactVersion {
    pub id: DbId,
    /// Canonical string form of a [`ScopeKey`].
    pub scope_key: String,
    pub version_number: i32,
    pub is_current: bool,
    pub artifact_path: String,
    pub source: String,
    pub created_at: Timestamp,
}

/// How an artifact was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactSource {
    Generated,
    Edited,
}

impl ArtifactSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactSource::Generated => "generated",
            ArtifactSource::Edited => "edited",
        }
    }
}

/// The entity whose latest-artifact pointer follows the current version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactOwner {
    /// Sets `pages.generated_image_path` and marks the page completed.
    Page(DbId),
    /// Sets `projects.primary_artifact_path`.
    Project(DbId),
    /// No entity pointer; the `is_current` row is the only pointer.
    Detached,
}

/// DTO for inserting a new current version.
#[derive(Debug, Clone)]
pub struct NewArtifactVersion {
    pub scope: ScopeKey,
    pub version_number: i32,
    pub artifact_path: String,
    pub source: ArtifactSource,
    pub owner: ArtifactOwner,
}
