//! Version scope keys.
//!
//! Every versioned artifact belongs to exactly one scope. Version numbers are
//! allocated per scope and at most one row per scope is current. The
//! canonical string form is what the database stores in
//! `artifact_versions.scope_key` and what the advisory lock hashes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

/// Infographic layout mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfographicMode {
    /// One project-level infographic.
    #[default]
    Single,
    /// One infographic per page.
    Series,
}

impl InfographicMode {
    pub fn as_str(self) -> &'static str {
        match self {
            InfographicMode::Single => "single",
            InfographicMode::Series => "series",
        }
    }
}

impl FromStr for InfographicMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(InfographicMode::Single),
            "series" => Ok(InfographicMode::Series),
            other => Err(CoreError::Validation(format!(
                "Invalid infographic mode '{other}'. Must be one of: single, series"
            ))),
        }
    }
}

/// Identifies one version sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ScopeKey {
    /// Slide image of one page.
    Page { page_id: DbId },
    /// Social-card carousel image at `index` within a project.
    Card { project_id: DbId, index: u32 },
    /// Infographic material, grouped by project, mode and (for series) page.
    Material {
        project_id: DbId,
        mode: InfographicMode,
        page_id: Option<DbId>,
    },
}

impl ScopeKey {
    /// Storage directory for blobs in this scope, relative to the storage root.
    pub fn blob_dir(&self) -> String {
        match self {
            ScopeKey::Page { page_id } => format!("pages/{page_id}"),
            ScopeKey::Card { project_id, index } => format!("projects/{project_id}/cards/{index}"),
            ScopeKey::Material {
                project_id,
                mode,
                page_id: Some(page_id),
            } => format!("projects/{project_id}/materials/{}/{page_id}", mode.as_str()),
            ScopeKey::Material {
                project_id,
                mode,
                page_id: None,
            } => format!("projects/{project_id}/materials/{}", mode.as_str()),
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKey::Page { page_id } => write!(f, "page:{page_id}"),
            ScopeKey::Card { project_id, index } => write!(f, "card:{project_id}:{index}"),
            ScopeKey::Material {
                project_id,
                mode,
                page_id,
            } => match page_id {
                Some(page_id) => write!(f, "material:{project_id}:{}:{page_id}", mode.as_str()),
                None => write!(f, "material:{project_id}:{}:-", mode.as_str()),
            },
        }
    }
}

impl FromStr for ScopeKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::Validation(format!("Invalid scope key '{s}'"));
        let id = |raw: &str| raw.parse::<DbId>().map_err(|_| invalid());

        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            ["page", page_id] => Ok(ScopeKey::Page {
                page_id: id(page_id)?,
            }),
            ["card", project_id, index] => Ok(ScopeKey::Card {
                project_id: id(project_id)?,
                index: index.parse().map_err(|_| invalid())?,
            }),
            ["material", project_id, mode, page_id] => Ok(ScopeKey::Material {
                project_id: id(project_id)?,
                mode: mode.parse().map_err(|_| invalid())?,
                page_id: if *page_id == "-" {
                    None
                } else {
                    Some(id(page_id)?)
                },
            }),
            _ => Err(invalid()),
        }
    }
}
