//! Per-page-type template variant generation.
//!
//! Variants are derived from the project's primary template. They are not
//! versioned; the project's template config tracks the current variant per
//! type plus a capped history.

use std::sync::Arc;

use slidesmith_core::page_type::PageType;
use slidesmith_core::progress::{ArtifactRef, ProgressDetail};
use slidesmith_core::types::DbId;
use slidesmith_db::models::project::Project;
use slidesmith_provider::ImageRequest;

use super::{
    base_template, fan_out_workers, load_project, locate_references, run_single, unit_total,
};
use crate::context::JobContext;
use crate::error::PipelineError;
use crate::fan_out::{self, FanOutUnit, UnitSuccess};
use crate::progress::ProgressReporter;

#[derive(Debug, Clone)]
pub struct VariantOptions {
    pub aspect_ratio: String,
    pub resolution: String,
    /// Extra references after the base template.
    pub reference_paths: Vec<String>,
}

struct VariantJob {
    ctx: Arc<JobContext>,
    project_id: DbId,
    base_template: String,
    extra_requirements: Option<String>,
    options: VariantOptions,
}

fn templates_dir(project_id: DbId, page_type: PageType) -> String {
    format!("projects/{project_id}/templates/{page_type}")
}

fn lock_key(project_id: DbId) -> String {
    format!("template-config:{project_id}")
}

pub async fn generate_template_variants(
    ctx: Arc<JobContext>,
    project: &Project,
    page_types: Vec<PageType>,
    max_workers: Option<usize>,
    options: VariantOptions,
    detail: ProgressDetail,
    reporter: &ProgressReporter,
) -> Result<(), PipelineError> {
    let base = require_base_template(&ctx, project).await?;

    let mut types: Vec<PageType> = Vec::with_capacity(page_types.len());
    for page_type in page_types {
        if !types.contains(&page_type) {
            types.push(page_type);
        }
    }
    reporter.begin(unit_total(types.len())?, detail).await?;

    let workers = fan_out_workers(&ctx, max_workers, types.len());
    let units: Vec<FanOutUnit<PageType>> = types
        .iter()
        .map(|t| FanOutUnit::new(t.as_str(), *t))
        .collect();

    let job = Arc::new(VariantJob {
        ctx: Arc::clone(&ctx),
        project_id: project.id,
        base_template: base,
        extra_requirements: project.extra_requirements.clone(),
        options,
    });

    let summary = {
        let job = Arc::clone(&job);
        fan_out::run(units, workers, reporter, move |_, page_type| {
            let job = Arc::clone(&job);
            async move {
                let path = render_variant(&job, page_type).await?;
                let artifact = ArtifactRef {
                    unit: page_type.as_str().to_string(),
                    artifact_path: path.clone(),
                    version_number: None,
                };
                Ok::<_, PipelineError>(UnitSuccess::new((page_type, path)).with_artifact(artifact))
            }
        })
        .await
    };

    if !summary.results.is_empty() {
        let generated: Vec<(PageType, String)> =
            summary.results.into_iter().map(|(_, v)| v).collect();
        save_variants(&job, &generated).await?;
    }

    tracing::info!(
        project_id = project.id,
        completed = summary.completed,
        failed = summary.failed,
        "Template variant generation finished"
    );
    Ok(())
}

pub async fn generate_template_variant(
    ctx: Arc<JobContext>,
    project: &Project,
    page_type: PageType,
    options: VariantOptions,
    detail: ProgressDetail,
    reporter: &ProgressReporter,
) -> Result<(), PipelineError> {
    let base = require_base_template(&ctx, project).await?;
    reporter.begin(1, detail).await?;

    let job = VariantJob {
        ctx: Arc::clone(&ctx),
        project_id: project.id,
        base_template: base,
        extra_requirements: project.extra_requirements.clone(),
        options,
    };

    run_single(reporter, page_type.as_str().to_string(), async {
        let path = render_variant(&job, page_type).await?;
        save_variants(&job, &[(page_type, path.clone())]).await?;
        Ok::<_, PipelineError>(Some(ArtifactRef {
            unit: page_type.as_str().to_string(),
            artifact_path: path,
            version_number: None,
        }))
    })
    .await
}

async fn require_base_template(ctx: &JobContext, project: &Project) -> Result<String, PipelineError> {
    base_template(ctx, &project.template_config)
        .await
        .ok_or_else(|| PipelineError::precondition("No template image found for project"))
}

async fn render_variant(job: &VariantJob, page_type: PageType) -> Result<String, PipelineError> {
    let ctx = &job.ctx;
    let mut prompt = ctx.prompts.template_variant(page_type);
    if let Some(extra) = job
        .extra_requirements
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
    {
        prompt.push_str(&format!("\nExtra requirements (must be followed):\n{extra}\n"));
    }

    let mut reference_paths = vec![ctx.storage.locate(&job.base_template)?];
    reference_paths.extend(locate_references(ctx, &job.options.reference_paths));

    tracing::debug!(project_id = job.project_id, page_type = %page_type, "Generating template variant");
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

    ctx.storage
        .store_blob(&templates_dir(job.project_id, page_type), &bytes)
        .await
}

/// Write generated variants into the project's template config in one
/// read-modify-write cycle.
async fn save_variants(job: &VariantJob, generated: &[(PageType, String)]) -> Result<(), PipelineError> {
    let ctx = &job.ctx;
    let _guard = ctx.locks.lock(&lock_key(job.project_id)).await;

    let project = load_project(ctx, job.project_id).await?;
    let mut config = project.template_config.0.clone();
    for (page_type, path) in generated {
        config.set_variant(*page_type, path, ctx.config.template_history_limit);
    }
    ctx.store
        .update_template_config(job.project_id, &config)
        .await?;

    tracing::debug!(
        project_id = job.project_id,
        variants = generated.len(),
        "Saved template variants"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_blobs_are_grouped_by_type() {
        assert_eq!(
            templates_dir(4, PageType::Transition),
            "projects/4/templates/transition"
        );
    }
}
