//! Project entity and DTOs.

use serde::{Deserialize, Serialize};
use slidesmith_core::template::TemplateConfig;
use slidesmith_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

use super::status::{ProjectStatus, StatusId};

/// A row from the `projects` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: DbId,
    pub status_id: StatusId,
    pub outline_text: Option<String>,
    pub extra_requirements: Option<String>,
    /// Free-text style description used when the project has no template image.
    pub template_style: Option<String>,
    pub template_config: Json<TemplateConfig>,
    /// Latest project-level artifact (e.g. a single infographic).
    pub primary_artifact_path: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Project {
    pub fn status(&self) -> Option<ProjectStatus> {
        ProjectStatus::from_id(self.status_id)
    }
}

/// DTO for creating a project.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateProject {
    pub outline_text: Option<String>,
    pub extra_requirements: Option<String>,
    pub template_style: Option<String>,
    #[serde(default)]
    pub template_config: TemplateConfig,
}
