//! Per-page description generation.

use std::sync::Arc;

use chrono::Utc;
use slidesmith_core::progress::ProgressDetail;
use slidesmith_core::types::DbId;
use slidesmith_db::models::page::PageDescription;
use slidesmith_db::models::project::Project;

use super::{
    fan_out_workers, load_page, load_unit_pages, mark_page_failed, outline_text, unit_total,
    DeckLayout,
};
use crate::context::JobContext;
use crate::error::PipelineError;
use crate::fan_out::{self, FanOutUnit, UnitSuccess};
use crate::progress::ProgressReporter;
use crate::prompts::DescriptionPrompt;

struct DescriptionJob {
    ctx: Arc<JobContext>,
    layout: DeckLayout,
    outline: String,
    extra_requirements: Option<String>,
}

pub async fn generate_descriptions(
    ctx: Arc<JobContext>,
    project: &Project,
    page_ids: Option<Vec<DbId>>,
    max_workers: Option<usize>,
    detail: ProgressDetail,
    reporter: &ProgressReporter,
) -> Result<(), PipelineError> {
    let pages = load_unit_pages(&ctx, project.id, page_ids.as_deref()).await?;
    let deck = ctx.store.list_pages(project.id, None).await?;
    reporter.begin(unit_total(pages.len())?, detail).await?;

    let workers = fan_out_workers(&ctx, max_workers, pages.len());
    let units: Vec<FanOutUnit<DbId>> = pages
        .iter()
        .map(|p| FanOutUnit::new(format!("page {}", p.id), p.id))
        .collect();

    let job = Arc::new(DescriptionJob {
        ctx: Arc::clone(&ctx),
        layout: DeckLayout::from_pages(&deck),
        outline: outline_text(project, &deck),
        extra_requirements: project.extra_requirements.clone(),
    });

    let summary = fan_out::run(units, workers, reporter, move |_, page_id| {
        let job = Arc::clone(&job);
        async move {
            match describe_page(&job, page_id).await {
                Ok(()) => Ok(UnitSuccess::new(page_id)),
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
        "Description generation finished"
    );
    Ok(())
}

async fn describe_page(job: &DescriptionJob, page_id: DbId) -> Result<(), PipelineError> {
    let ctx = &job.ctx;
    let page = load_page(ctx, page_id).await?;
    let page_type = job.layout.classify(&page)?;

    let prompt = ctx.prompts.description(&DescriptionPrompt {
        outline_text: &job.outline,
        title: page.title(),
        points: &page.outline.points,
        page_number: job.layout.position(&page) + 1,
        total_pages: job.layout.total(),
        page_type,
        extra_requirements: job.extra_requirements.as_deref(),
    });

    tracing::debug!(page_id, page_type = %page_type, "Generating description");
    let text = ctx.text.generate_text(&prompt).await?;
    if text.trim().is_empty() {
        return Err(PipelineError::EmptyResult(
            "Provider returned an empty description".to_string(),
        ));
    }

    ctx.store
        .save_page_description(
            page_id,
            &PageDescription {
                text,
                generated_at: Utc::now(),
            },
        )
        .await?;
    Ok(())
}
