//! Infographic material generation.
//!
//! Each unit first asks the text provider for a structural blueprint, then
//! renders that blueprint as a poster-style image. `single` mode produces one
//! infographic for the whole project; `series` mode produces one per page.

use std::sync::Arc;

use slidesmith_core::markdown::{extract_image_urls, merge_references, remove_markdown_images};
use slidesmith_core::progress::{ArtifactRef, ProgressDetail};
use slidesmith_core::scope::InfographicMode;
use slidesmith_core::types::DbId;
use slidesmith_db::models::page::Page;
use slidesmith_db::models::project::Project;
use slidesmith_provider::ImageRequest;

use super::materials::material_target;
use super::{
    base_template, fan_out_workers, load_page, load_unit_pages, locate_references, outline_text,
    refined_style, unit_total,
};
use crate::context::JobContext;
use crate::error::PipelineError;
use crate::fan_out::{self, FanOutUnit, UnitSuccess};
use crate::progress::ProgressReporter;
use crate::prompts::BlueprintPrompt;
use crate::versioning::CommitMeta;

#[derive(Debug, Clone)]
pub struct InfographicOptions {
    pub mode: InfographicMode,
    pub aspect_ratio: String,
    pub resolution: String,
    pub use_template: bool,
}

/// Project-level inputs shared by every unit.
struct InfographicJob {
    ctx: Arc<JobContext>,
    project_id: DbId,
    mode: InfographicMode,
    outline: String,
    template: Option<String>,
    style: Option<String>,
    extra_requirements: Option<String>,
    options: InfographicOptions,
}

#[derive(Debug, Clone)]
enum InfographicUnit {
    /// The whole project, with every page description as source text.
    Project { descriptions: String },
    Page { page_id: DbId },
}

/// Source text for a series page: its description, or its title and points.
pub fn page_source_text(page: &Page) -> String {
    if let Some(text) = page.description_text().filter(|t| !t.trim().is_empty()) {
        return text.to_string();
    }
    let mut lines: Vec<&str> = Vec::new();
    if !page.title().is_empty() {
        lines.push(page.title());
    }
    lines.extend(
        page.outline
            .points
            .iter()
            .map(String::as_str)
            .filter(|p| !p.trim().is_empty()),
    );
    lines.join("\n")
}

fn project_descriptions(pages: &[Page]) -> String {
    pages
        .iter()
        .enumerate()
        .filter_map(|(i, p)| {
            p.description_text()
                .filter(|t| !t.trim().is_empty())
                .map(|t| format!("Page {} - {}:\n{}", i + 1, p.title(), t))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub async fn generate_infographic(
    ctx: Arc<JobContext>,
    project: &Project,
    page_ids: Option<Vec<DbId>>,
    max_workers: Option<usize>,
    options: InfographicOptions,
    detail: ProgressDetail,
    reporter: &ProgressReporter,
) -> Result<(), PipelineError> {
    let mode = options.mode;
    let (units, outline) = match mode {
        InfographicMode::Single => {
            // A project without pages can still be summarised from its outline.
            let filter = page_ids.as_deref().filter(|ids| !ids.is_empty());
            let pages = ctx.store.list_pages(project.id, filter).await?;
            let unit = InfographicUnit::Project {
                descriptions: project_descriptions(&pages),
            };
            (
                vec![FanOutUnit::new("infographic", unit)],
                outline_text(project, &pages),
            )
        }
        InfographicMode::Series => {
            let pages = load_unit_pages(&ctx, project.id, page_ids.as_deref()).await?;
            let deck = ctx.store.list_pages(project.id, None).await?;
            let units: Vec<FanOutUnit<InfographicUnit>> = pages
                .iter()
                .map(|p| {
                    FanOutUnit::new(
                        format!("page {}", p.id),
                        InfographicUnit::Page { page_id: p.id },
                    )
                })
                .collect();
            (units, outline_text(project, &deck))
        }
    };
    reporter.begin(unit_total(units.len())?, detail).await?;

    let template = if options.use_template {
        base_template(&ctx, &project.template_config).await
    } else {
        None
    };
    let style = match template {
        Some(_) => None,
        None => refined_style(&ctx, project).await,
    };

    let workers = fan_out_workers(&ctx, max_workers, units.len());
    let job = Arc::new(InfographicJob {
        ctx: Arc::clone(&ctx),
        project_id: project.id,
        mode,
        outline,
        template,
        style,
        extra_requirements: project.extra_requirements.clone(),
        options,
    });

    let summary = fan_out::run(units, workers, reporter, move |_, unit: InfographicUnit| {
        let job = Arc::clone(&job);
        async move {
            let artifact = render_infographic(&job, unit).await?;
            Ok::<_, PipelineError>(UnitSuccess::new(()).with_artifact(artifact))
        }
    })
    .await;

    tracing::info!(
        project_id = project.id,
        mode = mode.as_str(),
        completed = summary.completed,
        failed = summary.failed,
        "Infographic generation finished"
    );
    Ok(())
}

async fn render_infographic(
    job: &InfographicJob,
    unit: InfographicUnit,
) -> Result<ArtifactRef, PipelineError> {
    let ctx = &job.ctx;

    let (source, page) = match unit {
        InfographicUnit::Project { descriptions } => (descriptions, None),
        InfographicUnit::Page { page_id } => {
            let page = load_page(ctx, page_id).await?;
            (page_source_text(&page), Some(page))
        }
    };
    let page_title = page.as_ref().map(|p| p.title()).filter(|t| !t.is_empty());

    let blueprint = ctx
        .text
        .generate_text(&ctx.prompts.infographic_blueprint(&BlueprintPrompt {
            mode: job.mode,
            outline_text: &job.outline,
            descriptions: &remove_markdown_images(&source),
            page_title,
            extra_requirements: job.extra_requirements.as_deref(),
            style: job.style.as_deref(),
        }))
        .await?;
    if blueprint.trim().is_empty() {
        return Err(PipelineError::EmptyResult(
            "Provider returned an empty infographic blueprint".to_string(),
        ));
    }

    let prompt = ctx.prompts.infographic_image(
        &blueprint,
        job.mode,
        page_title,
        &job.options.aspect_ratio,
        job.style.as_deref(),
    );

    let mut reference_paths = Vec::new();
    if let Some(template) = &job.template {
        reference_paths.push(ctx.storage.locate(template)?);
    }
    let material = merge_references(&[], &extract_image_urls(&source));
    reference_paths.extend(locate_references(ctx, &material));

    tracing::debug!(
        project_id = job.project_id,
        mode = job.mode.as_str(),
        page_id = page.as_ref().map(|p| p.id),
        "Generating infographic"
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
        .ok_or_else(|| {
            PipelineError::EmptyResult("Failed to generate infographic image".to_string())
        })?;

    let page_id = page.as_ref().map(|p| p.id);
    let (scope, owner) = material_target(job.project_id, page_id);
    let committed = ctx
        .versions
        .commit(&scope, &bytes, CommitMeta::generated(owner))
        .await?;

    Ok(ArtifactRef {
        unit: page_id.map_or_else(|| "infographic".to_string(), |id| format!("page {id}")),
        artifact_path: committed.artifact_path,
        version_number: Some(committed.version_number),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use slidesmith_db::models::page::{PageDescription, PageOutline};
    use slidesmith_db::models::status::PageStatus;
    use sqlx::types::Json;

    fn page(title: &str, points: &[&str], description: Option<&str>) -> Page {
        Page {
            id: 7,
            project_id: 1,
            order_index: 0,
            page_type: "auto".to_string(),
            outline: Json(PageOutline {
                title: title.to_string(),
                points: points.iter().map(|p| p.to_string()).collect(),
            }),
            description: description.map(|text| {
                Json(PageDescription {
                    text: text.to_string(),
                    generated_at: Utc::now(),
                })
            }),
            generated_image_path: None,
            status_id: PageStatus::Draft.id(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn series_source_prefers_description() {
        let p = page("Revenue", &["Q1", "Q2"], Some("Revenue grew 40%"));
        assert_eq!(page_source_text(&p), "Revenue grew 40%");
    }

    #[test]
    fn series_source_falls_back_to_outline() {
        let p = page("Revenue", &["Q1", " ", "Q2"], Some("   "));
        assert_eq!(page_source_text(&p), "Revenue\nQ1\nQ2");
    }

    #[test]
    fn project_source_skips_pages_without_descriptions() {
        let pages = vec![
            page("Intro", &[], Some("Hello")),
            page("Empty", &[], None),
            page("Close", &[], Some("Bye")),
        ];
        assert_eq!(
            project_descriptions(&pages),
            "Page 1 - Intro:\nHello\n\nPage 3 - Close:\nBye"
        );
    }
}
