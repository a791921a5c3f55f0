//! Free-form material images and material edits.
//!
//! Materials share the infographic scopes: the project-level `single` slot
//! and one `series` slot per page. Generating from a caller prompt or editing
//! the current image both commit the next version of that slot.

use std::sync::Arc;

use slidesmith_core::progress::{ArtifactRef, ProgressDetail};
use slidesmith_core::scope::{InfographicMode, ScopeKey};
use slidesmith_core::types::DbId;
use slidesmith_db::models::artifact_version::ArtifactOwner;
use slidesmith_db::models::page::Page;
use slidesmith_db::models::project::Project;
use slidesmith_provider::{ImageEditRequest, ImageRequest};

use super::{base_template, load_project_page, locate_references, run_single};
use crate::context::JobContext;
use crate::error::PipelineError;
use crate::progress::ProgressReporter;
use crate::versioning::CommitMeta;

#[derive(Debug, Clone)]
pub struct MaterialOptions {
    pub aspect_ratio: String,
    pub resolution: String,
    pub use_template: bool,
    pub reference_paths: Vec<String>,
}

/// Version scope and pointer owner of a material slot.
///
/// The project-level slot moves the project's primary artifact; per-page
/// series slots are tracked by their version rows alone.
pub(crate) fn material_target(project_id: DbId, page_id: Option<DbId>) -> (ScopeKey, ArtifactOwner) {
    match page_id {
        None => (
            ScopeKey::Material {
                project_id,
                mode: InfographicMode::Single,
                page_id: None,
            },
            ArtifactOwner::Project(project_id),
        ),
        Some(page_id) => (
            ScopeKey::Material {
                project_id,
                mode: InfographicMode::Series,
                page_id: Some(page_id),
            },
            ArtifactOwner::Detached,
        ),
    }
}

fn unit_label(page_id: Option<DbId>) -> String {
    match page_id {
        Some(id) => format!("material page {id}"),
        None => "material".to_string(),
    }
}

/// The bound page of a series slot, checked against the project.
async fn bound_page(
    ctx: &JobContext,
    project: &Project,
    page_id: Option<DbId>,
) -> Result<Option<Page>, PipelineError> {
    match page_id {
        Some(id) => Ok(Some(load_project_page(ctx, project, id).await?)),
        None => Ok(None),
    }
}

fn committed_ref(page_id: Option<DbId>, path: String, version: i32) -> ArtifactRef {
    ArtifactRef {
        unit: unit_label(page_id),
        artifact_path: path,
        version_number: Some(version),
    }
}

pub async fn generate_material(
    ctx: Arc<JobContext>,
    project: &Project,
    page_id: Option<DbId>,
    prompt: &str,
    options: MaterialOptions,
    detail: ProgressDetail,
    reporter: &ProgressReporter,
) -> Result<(), PipelineError> {
    bound_page(&ctx, project, page_id).await?;
    reporter.begin(1, detail).await?;

    run_single(reporter, unit_label(page_id), async {
        let mut reference_paths = Vec::new();
        if options.use_template {
            if let Some(template) = base_template(&ctx, &project.template_config).await {
                reference_paths.push(ctx.storage.locate(&template)?);
            }
        }
        reference_paths.extend(locate_references(&ctx, &options.reference_paths));

        tracing::debug!(project_id = project.id, page_id, "Generating material image");
        let bytes = ctx
            .images
            .generate_image(&ImageRequest {
                prompt: prompt.to_string(),
                reference_paths,
                aspect_ratio: options.aspect_ratio.clone(),
                resolution: options.resolution.clone(),
            })
            .await?
            .ok_or_else(|| {
                PipelineError::EmptyResult("Failed to generate material image".to_string())
            })?;

        let (scope, owner) = material_target(project.id, page_id);
        let committed = ctx
            .versions
            .commit(&scope, &bytes, CommitMeta::generated(owner))
            .await?;
        Ok::<_, PipelineError>(Some(committed_ref(
            page_id,
            committed.artifact_path,
            committed.version_number,
        )))
    })
    .await
}

pub async fn edit_material(
    ctx: Arc<JobContext>,
    project: &Project,
    page_id: Option<DbId>,
    instruction: &str,
    options: MaterialOptions,
    detail: ProgressDetail,
    reporter: &ProgressReporter,
) -> Result<(), PipelineError> {
    let page = bound_page(&ctx, project, page_id).await?;
    let (scope, owner) = material_target(project.id, page_id);
    let current = ctx
        .versions
        .current(&scope)
        .await?
        .ok_or_else(|| PipelineError::precondition("Material has no image to edit"))?;
    reporter.begin(1, detail).await?;

    run_single(reporter, unit_label(page_id), async {
        let mut references = Vec::new();
        if options.use_template {
            if let Some(template) = base_template(&ctx, &project.template_config).await {
                references.push(ctx.storage.locate(&template)?);
            }
        }
        references.extend(locate_references(&ctx, &options.reference_paths));

        let description = page.as_ref().and_then(Page::description_text);
        let request = ImageEditRequest {
            prompt: ctx.prompts.image_edit(instruction, description),
            base_image_path: ctx.storage.locate(&current.artifact_path)?,
            reference_paths: references,
            aspect_ratio: options.aspect_ratio.clone(),
            resolution: options.resolution.clone(),
        };

        tracing::debug!(
            project_id = project.id,
            page_id,
            base_version = current.version_number,
            "Editing material image"
        );
        let bytes = ctx
            .images
            .edit_image(&request)
            .await?
            .ok_or_else(|| PipelineError::EmptyResult("Failed to edit material image".to_string()))?;

        let committed = ctx
            .versions
            .commit(&scope, &bytes, CommitMeta::edited(owner))
            .await?;
        Ok::<_, PipelineError>(Some(committed_ref(
            page_id,
            committed.artifact_path,
            committed.version_number,
        )))
    })
    .await
}
