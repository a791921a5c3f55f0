//! Social-card carousel generation.
//!
//! One card per page, in deck order. Cards use the deck's page roles, except
//! that section breaks render as ordinary content cards. An existing card can
//! be edited into its next version.

use std::sync::Arc;

use slidesmith_core::markdown::{extract_image_urls, remove_markdown_images};
use slidesmith_core::page_type::PageType;
use slidesmith_core::progress::{ArtifactRef, ProgressDetail};
use slidesmith_core::scope::ScopeKey;
use slidesmith_core::types::DbId;
use slidesmith_db::models::artifact_version::ArtifactOwner;
use slidesmith_db::models::page::Page;
use slidesmith_db::models::project::Project;
use slidesmith_provider::{ImageEditRequest, ImageRequest};

use super::{
    fan_out_workers, load_page, load_project, locate_references, refined_style,
    resolve_template, run_single, unit_total, DeckLayout,
};
use crate::context::JobContext;
use crate::error::PipelineError;
use crate::fan_out::{self, FanOutUnit, UnitSuccess};
use crate::progress::ProgressReporter;
use crate::prompts::CardPrompt;
use crate::versioning::CommitMeta;

/// Bullet lines taken from a description when the outline has none.
const MAX_FALLBACK_BULLETS: usize = 6;

#[derive(Debug, Clone)]
pub struct CardOptions {
    pub aspect_ratio: String,
    pub resolution: String,
    pub use_template: bool,
}

/// What to change on an existing card.
#[derive(Debug, Clone)]
pub struct CardEdit {
    pub index: u32,
    pub instruction: String,
    /// Extra reference images, after the resolved template.
    pub reference_paths: Vec<String>,
}

struct CardJob {
    ctx: Arc<JobContext>,
    project_id: DbId,
    layout: DeckLayout,
    options: CardOptions,
}

#[derive(Debug, Clone, Copy)]
struct CardUnit {
    index: u32,
    page_id: DbId,
}

/// Card role for a page role.
pub fn card_role(page_type: PageType) -> PageType {
    match page_type {
        PageType::Transition => PageType::Content,
        other => other,
    }
}

/// Outline points, or the first description lines when there are none.
fn card_bullets(page: &Page) -> Vec<String> {
    let points: Vec<String> = page
        .outline
        .points
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    if !points.is_empty() {
        return points;
    }
    let description = remove_markdown_images(page.description_text().unwrap_or(""));
    description
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(MAX_FALLBACK_BULLETS)
        .map(str::to_string)
        .collect()
}

fn unit_label(index: u32) -> String {
    format!("card {index}")
}

fn card_scope(project_id: DbId, index: u32) -> ScopeKey {
    ScopeKey::Card { project_id, index }
}

/// The deck page rendered as card `index`.
fn card_page(deck: &[Page], index: u32) -> Result<&Page, PipelineError> {
    usize::try_from(index)
        .ok()
        .and_then(|i| deck.get(i))
        .ok_or_else(|| PipelineError::precondition(format!("Card index {index} out of range")))
}

pub async fn generate_cards(
    ctx: Arc<JobContext>,
    project: &Project,
    page_ids: Option<Vec<DbId>>,
    max_workers: Option<usize>,
    options: CardOptions,
    detail: ProgressDetail,
    reporter: &ProgressReporter,
) -> Result<(), PipelineError> {
    let deck = ctx.store.list_pages(project.id, None).await?;
    let filter = page_ids.filter(|ids| !ids.is_empty());
    let mut units: Vec<FanOutUnit<CardUnit>> = Vec::new();
    for (position, page) in deck.iter().enumerate() {
        if filter.as_ref().is_some_and(|ids| !ids.contains(&page.id)) {
            continue;
        }
        let index = unit_total(position)?;
        units.push(FanOutUnit::new(
            unit_label(index),
            CardUnit {
                index,
                page_id: page.id,
            },
        ));
    }
    if units.is_empty() {
        return Err(PipelineError::precondition("No pages found for project"));
    }

    reporter.begin(unit_total(units.len())?, detail).await?;
    let workers = fan_out_workers(&ctx, max_workers, units.len());

    let job = Arc::new(CardJob {
        ctx: Arc::clone(&ctx),
        project_id: project.id,
        layout: DeckLayout::from_pages(&deck),
        options,
    });

    let summary = fan_out::run(units, workers, reporter, move |_, unit: CardUnit| {
        let job = Arc::clone(&job);
        async move {
            let artifact = render_card(&job, unit).await?;
            Ok::<_, PipelineError>(UnitSuccess::new(unit.index).with_artifact(artifact))
        }
    })
    .await;

    tracing::info!(
        project_id = project.id,
        completed = summary.completed,
        failed = summary.failed,
        "Card generation finished"
    );
    Ok(())
}

pub async fn generate_card(
    ctx: Arc<JobContext>,
    project: &Project,
    index: u32,
    options: CardOptions,
    detail: ProgressDetail,
    reporter: &ProgressReporter,
) -> Result<(), PipelineError> {
    let deck = ctx.store.list_pages(project.id, None).await?;
    let page_id = card_page(&deck, index)?.id;
    reporter.begin(1, detail).await?;

    let job = CardJob {
        ctx: Arc::clone(&ctx),
        project_id: project.id,
        layout: DeckLayout::from_pages(&deck),
        options,
    };

    run_single(reporter, unit_label(index), async {
        let artifact = render_card(&job, CardUnit { index, page_id }).await?;
        Ok::<_, PipelineError>(Some(artifact))
    })
    .await
}

/// Edit the current image of card `edit.index` into its next version.
pub async fn edit_card(
    ctx: Arc<JobContext>,
    project: &Project,
    edit: CardEdit,
    options: CardOptions,
    detail: ProgressDetail,
    reporter: &ProgressReporter,
) -> Result<(), PipelineError> {
    let CardEdit {
        index,
        instruction,
        reference_paths,
    } = edit;
    let deck = ctx.store.list_pages(project.id, None).await?;
    let page = card_page(&deck, index)?;
    let scope = card_scope(project.id, index);
    let current_image = match ctx.versions.current(&scope).await? {
        Some(version) => Some(version.artifact_path),
        None => page.generated_image_path.clone().filter(|p| !p.is_empty()),
    }
    .ok_or_else(|| PipelineError::precondition(format!("No current image for card {index}")))?;
    let layout = DeckLayout::from_pages(&deck);
    reporter.begin(1, detail).await?;

    run_single(reporter, unit_label(index), async {
        let page_type = layout.classify(page)?;
        let mut references = Vec::new();
        if options.use_template {
            if let Some(template) =
                resolve_template(&ctx, &project.template_config, page_type).await
            {
                references.push(ctx.storage.locate(&template)?);
            }
        }
        references.extend(locate_references(&ctx, &reference_paths));

        let request = ImageEditRequest {
            prompt: ctx.prompts.image_edit(&instruction, page.description_text()),
            base_image_path: ctx.storage.locate(&current_image)?,
            reference_paths: references,
            aspect_ratio: options.aspect_ratio.clone(),
            resolution: options.resolution.clone(),
        };

        tracing::debug!(index, page_id = page.id, "Editing card");
        let bytes = ctx
            .images
            .edit_image(&request)
            .await?
            .ok_or_else(|| PipelineError::EmptyResult("Failed to edit card image".to_string()))?;

        let committed = ctx
            .versions
            .commit(&scope, &bytes, CommitMeta::edited(ArtifactOwner::Page(page.id)))
            .await?;
        Ok::<_, PipelineError>(Some(ArtifactRef {
            unit: unit_label(index),
            artifact_path: committed.artifact_path,
            version_number: Some(committed.version_number),
        }))
    })
    .await
}

async fn render_card(job: &CardJob, unit: CardUnit) -> Result<ArtifactRef, PipelineError> {
    let ctx = &job.ctx;
    let page = load_page(ctx, unit.page_id).await?;
    let project = load_project(ctx, job.project_id).await?;

    let page_type = job.layout.classify(&page)?;
    let role = card_role(page_type);
    let bullets = card_bullets(&page);

    let template = if job.options.use_template {
        resolve_template(ctx, &project.template_config, page_type).await
    } else {
        None
    };
    let style = match template {
        Some(_) => None,
        None => refined_style(ctx, &project).await,
    };

    let mut reference_paths = Vec::new();
    if let Some(template) = &template {
        reference_paths.push(ctx.storage.locate(template)?);
    }
    if let Some(description) = page.description_text() {
        reference_paths.extend(locate_references(ctx, &extract_image_urls(description)));
    }

    let prompt = ctx.prompts.card_image(&CardPrompt {
        index: usize::try_from(unit.index).unwrap_or(usize::MAX),
        total: job.layout.total(),
        role,
        title: page.title(),
        bullets: &bullets,
        aspect_ratio: &job.options.aspect_ratio,
        has_template: template.is_some(),
        extra_requirements: project.extra_requirements.as_deref(),
        style: style.as_deref(),
    });

    tracing::debug!(index = unit.index, page_id = unit.page_id, role = %role, "Generating card");
    let bytes = ctx
        .images
        .generate_image(&ImageRequest {
            prompt,
            reference_paths,
            aspect_ratio: job.options.aspect_ratio.clone(),
            resolution: job.options.resolution.clone(),
        })
        .await?
        .ok_or_else(|| PipelineError::EmptyResult("Failed to generate card image".to_string()))?;

    let committed = ctx
        .versions
        .commit(
            &card_scope(job.project_id, unit.index),
            &bytes,
            CommitMeta::generated(ArtifactOwner::Page(unit.page_id)),
        )
        .await?;

    Ok(ArtifactRef {
        unit: unit_label(unit.index),
        artifact_path: committed.artifact_path,
        version_number: Some(committed.version_number),
    })
}
