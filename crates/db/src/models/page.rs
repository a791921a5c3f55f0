//! Page (generation unit) entity and DTOs.

use serde::{Deserialize, Serialize};
use slidesmith_core::error::CoreError;
use slidesmith_core::page_type::{PageType, UnitTraits, PAGE_TYPE_AUTO};
use slidesmith_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

use super::status::{PageStatus, StatusId};

/// Outline content of a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageOutline {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub points: Vec<String>,
}

/// Generated description of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDescription {
    pub text: String,
    pub generated_at: Timestamp,
}

/// A row from the `pages` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Page {
    pub id: DbId,
    pub project_id: DbId,
    pub order_index: i32,
    /// Explicit page type or `auto`.
    pub page_type: String,
    pub outline: Json<PageOutline>,
    pub description: Option<Json<PageDescription>>,
    /// Latest generated image; mirrors the current version of the page scope.
    pub generated_image_path: Option<String>,
    pub status_id: StatusId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Page {
    pub fn status(&self) -> Option<PageStatus> {
        PageStatus::from_id(self.status_id)
    }

    pub fn title(&self) -> &str {
        &self.outline.title
    }

    pub fn description_text(&self) -> Option<&str> {
        self.description
            .as_ref()
            .map(|d| d.text.as_str())
            .filter(|t| !t.trim().is_empty())
    }

    /// Classifier input for this page at `position` within its job.
    pub fn traits(&self, position: usize) -> Result<UnitTraits<'_>, CoreError> {
        Ok(UnitTraits {
            position,
            explicit_type: PageType::parse_explicit(&self.page_type)?,
            title: self.title(),
        })
    }
}

/// DTO for creating a page.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePage {
    pub project_id: DbId,
    pub order_index: i32,
    #[serde(default = "default_page_type")]
    pub page_type: String,
    #[serde(default)]
    pub outline: PageOutline,
}

fn default_page_type() -> String {
    PAGE_TYPE_AUTO.to_string()
}
