//! Slide image generation and editing.
//!
//! Every unit follows the same path: re-load the page, classify it, resolve
//! its reference template, call the image provider, commit the result as the
//! next version of the page scope.

use std::sync::Arc;

use slidesmith_core::markdown::{extract_image_urls, merge_references, remove_markdown_images};
use slidesmith_core::progress::{ArtifactRef, ProgressDetail};
use slidesmith_core::scope::ScopeKey;
use slidesmith_core::types::DbId;
use slidesmith_db::models::artifact_version::ArtifactOwner;
use slidesmith_db::models::page::Page;
use slidesmith_db::models::project::Project;
use slidesmith_db::models::status::PageStatus;
use slidesmith_provider::{ImageEditRequest, ImageRequest};

use super::{
    fan_out_workers, load_page, load_project, load_project_page, load_unit_pages,
    locate_references, mark_page_failed, outline_text, refined_style, resolve_template,
    run_single, unit_total, DeckLayout,
};
use crate::context::JobContext;
use crate::error::PipelineError;
use crate::fan_out::{self, FanOutUnit, UnitSuccess};
use crate::progress::ProgressReporter;
use crate::prompts::PageImagePrompt;
use crate::versioning::CommitMeta;

/// Caller options shared by the image jobs.
#[derive(Debug, Clone)]
pub struct ImageJobOptions {
    pub aspect_ratio: String,
    pub resolution: String,
    pub use_template: bool,
    /// Caller-supplied reference images, ahead of description images.
    pub reference_paths: Vec<String>,
}

struct ImageJob {
    ctx: Arc<JobContext>,
    project_id: DbId,
    layout: DeckLayout,
    outline: String,
    options: ImageJobOptions,
}

fn unit_label(page_id: DbId) -> String {
    format!("page {page_id}")
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

pub async fn generate_images(
    ctx: Arc<JobContext>,
    project: &Project,
    page_ids: Option<Vec<DbId>>,
    max_workers: Option<usize>,
    options: ImageJobOptions,
    detail: ProgressDetail,
    reporter: &ProgressReporter,
) -> Result<(), PipelineError> {
    let pages = load_unit_pages(&ctx, project.id, page_ids.as_deref()).await?;
    let deck = ctx.store.list_pages(project.id, None).await?;
    reporter.begin(unit_total(pages.len())?, detail).await?;

    let workers = fan_out_workers(&ctx, max_workers, pages.len());
    let units: Vec<FanOutUnit<DbId>> = pages
        .iter()
        .map(|p| FanOutUnit::new(unit_label(p.id), p.id))
        .collect();

    let job = Arc::new(ImageJob {
        ctx: Arc::clone(&ctx),
        project_id: project.id,
        layout: DeckLayout::from_pages(&deck),
        outline: outline_text(project, &deck),
        options,
    });

    let summary = fan_out::run(units, workers, reporter, move |_, page_id| {
        let job = Arc::clone(&job);
        async move {
            match render_page(&job, page_id).await {
                Ok(artifact) => Ok(UnitSuccess::new(page_id).with_artifact(artifact)),
                Err(e) => {
                    mark_page_failed(&job.ctx, page_id).await;
                    Err(e)
                }
            }
        }
    })
    .await;

    tracing::info!(
        project_id = project.id,
        completed = summary.completed,
        failed = summary.failed,
        "Image generation finished"
    );
    Ok(())
}

pub async fn generate_page_image(
    ctx: Arc<JobContext>,
    project: &Project,
    page_id: DbId,
    options: ImageJobOptions,
    detail: ProgressDetail,
    reporter: &ProgressReporter,
) -> Result<(), PipelineError> {
    let page = load_project_page(&ctx, project, page_id).await?;
    let deck = ctx.store.list_pages(project.id, None).await?;
    reporter.begin(1, detail).await?;

    let job = ImageJob {
        ctx: Arc::clone(&ctx),
        project_id: project.id,
        layout: DeckLayout::from_pages(&deck),
        outline: outline_text(project, &deck),
        options,
    };

    run_single(reporter, unit_label(page.id), async {
        match render_page(&job, page.id).await {
            Ok(artifact) => Ok(Some(artifact)),
            Err(e) => {
                mark_page_failed(&ctx, page.id).await;
                Err(e)
            }
        }
    })
    .await
}

pub async fn edit_page_image(
    ctx: Arc<JobContext>,
    project: &Project,
    page_id: DbId,
    instruction: &str,
    options: ImageJobOptions,
    detail: ProgressDetail,
    reporter: &ProgressReporter,
) -> Result<(), PipelineError> {
    let page = load_project_page(&ctx, project, page_id).await?;
    let current_image = page
        .generated_image_path
        .clone()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| PipelineError::precondition("Page has no image to edit"))?;
    let deck = ctx.store.list_pages(project.id, None).await?;
    let layout = DeckLayout::from_pages(&deck);
    reporter.begin(1, detail).await?;

    let edit = PageEdit {
        page: &page,
        current_image: &current_image,
        instruction,
        layout: &layout,
        options: &options,
    };
    run_single(reporter, unit_label(page_id), async {
        match edit_page(&ctx, project, edit).await {
            Ok(artifact) => Ok(Some(artifact)),
            Err(e) => {
                mark_page_failed(&ctx, page_id).await;
                Err(e)
            }
        }
    })
    .await
}

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

struct PageEdit<'a> {
    page: &'a Page,
    current_image: &'a str,
    instruction: &'a str,
    layout: &'a DeckLayout,
    options: &'a ImageJobOptions,
}

async fn edit_page(
    ctx: &JobContext,
    project: &Project,
    edit: PageEdit<'_>,
) -> Result<ArtifactRef, PipelineError> {
    let page_id = edit.page.id;
    ctx.store
        .update_page_status(page_id, PageStatus::Generating)
        .await?;

    let page_type = edit.layout.classify(edit.page)?;
    let mut references = Vec::new();
    // The template is a style hint here; the base image carries the layout.
    if let Some(template) = resolve_template(ctx, &project.template_config, page_type).await {
        references.push(ctx.storage.locate(&template)?);
    }
    references.extend(locate_references(ctx, &edit.options.reference_paths));

    let prompt = ctx.prompts.image_edit(edit.instruction, edit.page.description_text());
    let request = ImageEditRequest {
        prompt,
        base_image_path: ctx.storage.locate(edit.current_image)?,
        reference_paths: references,
        aspect_ratio: edit.options.aspect_ratio.clone(),
        resolution: edit.options.resolution.clone(),
    };

    tracing::debug!(page_id, page_type = %page_type, "Editing page image");
    let bytes = ctx
        .images
        .edit_image(&request)
        .await?
        .ok_or_else(|| PipelineError::EmptyResult("Failed to edit image".to_string()))?;

    let committed = ctx
        .versions
        .commit(
            &ScopeKey::Page { page_id },
            &bytes,
            CommitMeta::edited(ArtifactOwner::Page(page_id)),
        )
        .await?;
    Ok(ArtifactRef {
        unit: unit_label(page_id),
        artifact_path: committed.artifact_path,
        version_number: Some(committed.version_number),
    })
}

async fn render_page(job: &ImageJob, page_id: DbId) -> Result<ArtifactRef, PipelineError> {
    let ctx = &job.ctx;
    let page = load_page(ctx, page_id).await?;
    let description = page
        .description_text()
        .ok_or_else(|| PipelineError::precondition("No description content for page"))?
        .to_string();

    ctx.store
        .update_page_status(page_id, PageStatus::Generating)
        .await?;

    // Re-read the project so a template swapped mid-job is picked up.
    let project = load_project(ctx, job.project_id).await?;
    let page_type = job.layout.classify(&page)?;

    let template = if job.options.use_template {
        resolve_template(ctx, &project.template_config, page_type).await
    } else {
        None
    };
    let style = match template {
        Some(_) => None,
        None => refined_style(ctx, &project).await,
    };

    let material = merge_references(&job.options.reference_paths, &extract_image_urls(&description));
    let mut reference_paths: Vec<String> = Vec::with_capacity(material.len() + 1);
    if let Some(template) = &template {
        reference_paths.push(ctx.storage.locate(template)?);
    }
    reference_paths.extend(locate_references(ctx, &material));

    let clean_description = remove_markdown_images(&description);
    let prompt = ctx.prompts.page_image(&PageImagePrompt {
        description: &clean_description,
        outline_text: &job.outline,
        section: page.title(),
        page_type,
        aspect_ratio: &job.options.aspect_ratio,
        has_template: template.is_some(),
        has_material_images: !material.is_empty(),
        extra_requirements: project.extra_requirements.as_deref(),
        style: style.as_deref(),
    });

    tracing::debug!(
        page_id,
        page_type = %page_type,
        template = template.as_deref().unwrap_or("-"),
        references = reference_paths.len(),
        "Generating page image"
    );
    let bytes = ctx
        .images
        .generate_image(&ImageRequest {
            prompt,
            reference_paths,
            aspect_ratio: job.options.aspect_ratio.clone(),
            resolution: job.options.resolution.clone(),
        })
        .await?
        .ok_or_else(|| PipelineError::EmptyResult("Failed to generate image".to_string()))?;

    let committed = ctx
        .versions
        .commit(
            &ScopeKey::Page { page_id },
            &bytes,
            CommitMeta::generated(ArtifactOwner::Page(page_id)),
        )
        .await?;

    Ok(ArtifactRef {
        unit: unit_label(page_id),
        artifact_path: committed.artifact_path,
        version_number: Some(committed.version_number),
    })
}
