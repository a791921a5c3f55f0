//! Job requests and the per-kind job bodies.
//!
//! A [`JobRequest`] is what a submitter stores in `tasks.parameters`. [`run`]
//! loads the owning project, then hands off to the job module for the
//! request's kind. Every job reports its units through the task's
//! [`ProgressReporter`]; the orchestrator turns the final counts into a
//! terminal status.

pub mod cards;
pub mod descriptions;
pub mod images;
pub mod infographic;
pub mod materials;
pub mod variants;

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use slidesmith_core::error::CoreError;
use slidesmith_core::job::{clamp_workers, JobKind};
use slidesmith_core::page_type::{classify, PageType};
use slidesmith_core::progress::{ArtifactRef, ProgressDetail, UnitFailure};
use slidesmith_core::scope::InfographicMode;
use slidesmith_core::template::{self, TemplateConfig};
use slidesmith_core::types::DbId;
use slidesmith_db::models::page::Page;
use slidesmith_db::models::project::Project;
use slidesmith_db::models::status::PageStatus;
use slidesmith_db::models::task::Task;

use crate::cache::StyleCache;
use crate::context::JobContext;
use crate::error::PipelineError;
use crate::progress::ProgressReporter;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_SLIDE_ASPECT_RATIO: &str = "16:9";
pub const DEFAULT_CARD_ASPECT_RATIO: &str = "3:4";
pub const DEFAULT_INFOGRAPHIC_ASPECT_RATIO: &str = "9:16";
pub const DEFAULT_RESOLUTION: &str = "2K";

const NO_PAGES: &str = "No pages found for project";

// ---------------------------------------------------------------------------
// JobRequest
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn all_page_types() -> Vec<PageType> {
    PageType::ALL.to_vec()
}

/// Parameters of a background job, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobRequest {
    GenerateDescriptions {
        #[serde(default)]
        max_workers: Option<usize>,
        #[serde(default)]
        page_ids: Option<Vec<DbId>>,
    },
    GenerateImages {
        #[serde(default)]
        max_workers: Option<usize>,
        #[serde(default)]
        page_ids: Option<Vec<DbId>>,
        #[serde(default)]
        aspect_ratio: Option<String>,
        #[serde(default)]
        resolution: Option<String>,
        #[serde(default = "default_true")]
        use_template: bool,
        /// Extra reference images applied to every page, ahead of the
        /// images embedded in each description.
        #[serde(default)]
        reference_paths: Vec<String>,
    },
    GeneratePageImage {
        page_id: DbId,
        #[serde(default)]
        aspect_ratio: Option<String>,
        #[serde(default)]
        resolution: Option<String>,
        #[serde(default = "default_true")]
        use_template: bool,
        #[serde(default)]
        reference_paths: Vec<String>,
    },
    EditPageImage {
        page_id: DbId,
        instruction: String,
        #[serde(default)]
        aspect_ratio: Option<String>,
        #[serde(default)]
        resolution: Option<String>,
        #[serde(default)]
        reference_paths: Vec<String>,
    },
    GenerateTemplateVariants {
        #[serde(default = "all_page_types")]
        page_types: Vec<PageType>,
        #[serde(default)]
        max_workers: Option<usize>,
        #[serde(default)]
        aspect_ratio: Option<String>,
        #[serde(default)]
        resolution: Option<String>,
    },
    GenerateTemplateVariant {
        page_type: PageType,
        #[serde(default)]
        aspect_ratio: Option<String>,
        #[serde(default)]
        resolution: Option<String>,
        #[serde(default)]
        reference_paths: Vec<String>,
    },
    GenerateCards {
        #[serde(default)]
        max_workers: Option<usize>,
        #[serde(default)]
        page_ids: Option<Vec<DbId>>,
        #[serde(default)]
        aspect_ratio: Option<String>,
        #[serde(default)]
        resolution: Option<String>,
        #[serde(default = "default_true")]
        use_template: bool,
    },
    GenerateCard {
        index: u32,
        #[serde(default)]
        aspect_ratio: Option<String>,
        #[serde(default)]
        resolution: Option<String>,
        #[serde(default = "default_true")]
        use_template: bool,
    },
    EditCard {
        index: u32,
        instruction: String,
        #[serde(default)]
        aspect_ratio: Option<String>,
        #[serde(default)]
        resolution: Option<String>,
        #[serde(default = "default_true")]
        use_template: bool,
        #[serde(default)]
        reference_paths: Vec<String>,
    },
    GenerateInfographic {
        #[serde(default)]
        mode: InfographicMode,
        #[serde(default)]
        max_workers: Option<usize>,
        #[serde(default)]
        page_ids: Option<Vec<DbId>>,
        #[serde(default)]
        aspect_ratio: Option<String>,
        #[serde(default)]
        resolution: Option<String>,
        #[serde(default = "default_true")]
        use_template: bool,
    },
    /// Render a caller prompt into a material slot: the project-level slot,
    /// or the per-page slot when `page_id` is set.
    GenerateMaterial {
        prompt: String,
        #[serde(default)]
        page_id: Option<DbId>,
        #[serde(default)]
        aspect_ratio: Option<String>,
        #[serde(default)]
        resolution: Option<String>,
        #[serde(default)]
        use_template: bool,
        #[serde(default)]
        reference_paths: Vec<String>,
    },
    EditMaterial {
        instruction: String,
        #[serde(default)]
        page_id: Option<DbId>,
        #[serde(default)]
        aspect_ratio: Option<String>,
        #[serde(default)]
        resolution: Option<String>,
        #[serde(default = "default_true")]
        use_template: bool,
        #[serde(default)]
        reference_paths: Vec<String>,
    },
}

impl JobRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            JobRequest::GenerateDescriptions { .. } => JobKind::GenerateDescriptions,
            JobRequest::GenerateImages { .. } => JobKind::GenerateImages,
            JobRequest::GeneratePageImage { .. } => JobKind::GeneratePageImage,
            JobRequest::EditPageImage { .. } => JobKind::EditPageImage,
            JobRequest::GenerateTemplateVariants { .. } => JobKind::GenerateTemplateVariants,
            JobRequest::GenerateTemplateVariant { .. } => JobKind::GenerateTemplateVariant,
            JobRequest::GenerateCards { .. } => JobKind::GenerateCards,
            JobRequest::GenerateCard { .. } => JobKind::GenerateCard,
            JobRequest::EditCard { .. } => JobKind::EditCard,
            JobRequest::GenerateInfographic { .. } => JobKind::GenerateInfographic,
            JobRequest::GenerateMaterial { .. } => JobKind::GenerateMaterial,
            JobRequest::EditMaterial { .. } => JobKind::EditMaterial,
        }
    }

    /// Empty progress detail for this request.
    pub fn progress_detail(&self) -> ProgressDetail {
        let mode = match self {
            JobRequest::GenerateInfographic { mode, .. } => Some(*mode),
            _ => None,
        };
        ProgressDetail::for_kind(self.kind(), mode)
    }

    /// Reject requests that can never succeed.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            JobRequest::EditPageImage { instruction, .. }
            | JobRequest::EditCard { instruction, .. }
            | JobRequest::EditMaterial { instruction, .. }
                if instruction.trim().is_empty() =>
            {
                Err(CoreError::Validation(
                    "Edit instruction must not be empty".to_string(),
                ))
            }
            JobRequest::GenerateMaterial { prompt, .. } if prompt.trim().is_empty() => Err(
                CoreError::Validation("Material prompt must not be empty".to_string()),
            ),
            JobRequest::GenerateTemplateVariants { page_types, .. } if page_types.is_empty() => {
                Err(CoreError::Validation(
                    "At least one page type is required".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Caller aspect ratio, or `default` when absent, blank or `auto`.
pub fn aspect_ratio_or(requested: Option<&str>, default: &str) -> String {
    match requested.map(str::trim) {
        Some(r) if !r.is_empty() && !r.eq_ignore_ascii_case("auto") => r.to_string(),
        _ => default.to_string(),
    }
}

pub fn resolution_or_default(requested: Option<&str>) -> String {
    match requested.map(str::trim) {
        Some(r) if !r.is_empty() => r.to_string(),
        _ => DEFAULT_RESOLUTION.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Run the job body for `request`. Unit failures are recorded in `reporter`;
/// an `Err` is a job-level failure.
pub async fn run(
    ctx: Arc<JobContext>,
    task: &Task,
    request: JobRequest,
    reporter: &ProgressReporter,
) -> Result<(), PipelineError> {
    let project_id = task
        .project_id
        .ok_or_else(|| PipelineError::precondition("Task has no owning project"))?;
    let project = load_project(&ctx, project_id).await?;
    let detail = request.progress_detail();

    match request {
        JobRequest::GenerateDescriptions {
            max_workers,
            page_ids,
        } => descriptions::generate_descriptions(ctx, &project, page_ids, max_workers, detail, reporter).await,
        JobRequest::GenerateImages {
            max_workers,
            page_ids,
            aspect_ratio,
            resolution,
            use_template,
            reference_paths,
        } => {
            let options = images::ImageJobOptions {
                aspect_ratio: aspect_ratio_or(aspect_ratio.as_deref(), DEFAULT_SLIDE_ASPECT_RATIO),
                resolution: resolution_or_default(resolution.as_deref()),
                use_template,
                reference_paths,
            };
            images::generate_images(ctx, &project, page_ids, max_workers, options, detail, reporter)
                .await
        }
        JobRequest::GeneratePageImage {
            page_id,
            aspect_ratio,
            resolution,
            use_template,
            reference_paths,
        } => {
            let options = images::ImageJobOptions {
                aspect_ratio: aspect_ratio_or(aspect_ratio.as_deref(), DEFAULT_SLIDE_ASPECT_RATIO),
                resolution: resolution_or_default(resolution.as_deref()),
                use_template,
                reference_paths,
            };
            images::generate_page_image(ctx, &project, page_id, options, detail, reporter).await
        }
        JobRequest::EditPageImage {
            page_id,
            instruction,
            aspect_ratio,
            resolution,
            reference_paths,
        } => {
            let options = images::ImageJobOptions {
                aspect_ratio: aspect_ratio_or(aspect_ratio.as_deref(), DEFAULT_SLIDE_ASPECT_RATIO),
                resolution: resolution_or_default(resolution.as_deref()),
                use_template: true,
                reference_paths,
            };
            images::edit_page_image(ctx, &project, page_id, &instruction, options, detail, reporter)
                .await
        }
        JobRequest::GenerateTemplateVariants {
            page_types,
            max_workers,
            aspect_ratio,
            resolution,
        } => {
            let options = variants::VariantOptions {
                aspect_ratio: aspect_ratio_or(aspect_ratio.as_deref(), DEFAULT_SLIDE_ASPECT_RATIO),
                resolution: resolution_or_default(resolution.as_deref()),
                reference_paths: Vec::new(),
            };
            variants::generate_template_variants(
                ctx,
                &project,
                page_types,
                max_workers,
                options,
                detail,
                reporter,
            )
            .await
        }
        JobRequest::GenerateTemplateVariant {
            page_type,
            aspect_ratio,
            resolution,
            reference_paths,
        } => {
            let options = variants::VariantOptions {
                aspect_ratio: aspect_ratio_or(aspect_ratio.as_deref(), DEFAULT_SLIDE_ASPECT_RATIO),
                resolution: resolution_or_default(resolution.as_deref()),
                reference_paths,
            };
            variants::generate_template_variant(ctx, &project, page_type, options, detail, reporter)
                .await
        }
        JobRequest::GenerateCards {
            max_workers,
            page_ids,
            aspect_ratio,
            resolution,
            use_template,
        } => {
            let options = cards::CardOptions {
                aspect_ratio: aspect_ratio_or(aspect_ratio.as_deref(), DEFAULT_CARD_ASPECT_RATIO),
                resolution: resolution_or_default(resolution.as_deref()),
                use_template,
            };
            cards::generate_cards(ctx, &project, page_ids, max_workers, options, detail, reporter)
                .await
        }
        JobRequest::GenerateCard {
            index,
            aspect_ratio,
            resolution,
            use_template,
        } => {
            let options = cards::CardOptions {
                aspect_ratio: aspect_ratio_or(aspect_ratio.as_deref(), DEFAULT_CARD_ASPECT_RATIO),
                resolution: resolution_or_default(resolution.as_deref()),
                use_template,
            };
            cards::generate_card(ctx, &project, index, options, detail, reporter).await
        }
        JobRequest::EditCard {
            index,
            instruction,
            aspect_ratio,
            resolution,
            use_template,
            reference_paths,
        } => {
            let options = cards::CardOptions {
                aspect_ratio: aspect_ratio_or(aspect_ratio.as_deref(), DEFAULT_CARD_ASPECT_RATIO),
                resolution: resolution_or_default(resolution.as_deref()),
                use_template,
            };
            let edit = cards::CardEdit {
                index,
                instruction,
                reference_paths,
            };
            cards::edit_card(ctx, &project, edit, options, detail, reporter).await
        }
        JobRequest::GenerateInfographic {
            mode,
            max_workers,
            page_ids,
            aspect_ratio,
            resolution,
            use_template,
        } => {
            let options = infographic::InfographicOptions {
                mode,
                aspect_ratio: aspect_ratio_or(
                    aspect_ratio.as_deref(),
                    DEFAULT_INFOGRAPHIC_ASPECT_RATIO,
                ),
                resolution: resolution_or_default(resolution.as_deref()),
                use_template,
            };
            infographic::generate_infographic(
                ctx,
                &project,
                page_ids,
                max_workers,
                options,
                detail,
                reporter,
            )
            .await
        }
        JobRequest::GenerateMaterial {
            prompt,
            page_id,
            aspect_ratio,
            resolution,
            use_template,
            reference_paths,
        } => {
            let options = materials::MaterialOptions {
                aspect_ratio: aspect_ratio_or(aspect_ratio.as_deref(), DEFAULT_SLIDE_ASPECT_RATIO),
                resolution: resolution_or_default(resolution.as_deref()),
                use_template,
                reference_paths,
            };
            materials::generate_material(ctx, &project, page_id, &prompt, options, detail, reporter)
                .await
        }
        JobRequest::EditMaterial {
            instruction,
            page_id,
            aspect_ratio,
            resolution,
            use_template,
            reference_paths,
        } => {
            let options = materials::MaterialOptions {
                aspect_ratio: aspect_ratio_or(
                    aspect_ratio.as_deref(),
                    DEFAULT_INFOGRAPHIC_ASPECT_RATIO,
                ),
                resolution: resolution_or_default(resolution.as_deref()),
                use_template,
                reference_paths,
            };
            materials::edit_material(
                ctx,
                &project,
                page_id,
                &instruction,
                options,
                detail,
                reporter,
            )
            .await
        }
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

pub(crate) async fn load_project(ctx: &JobContext, id: DbId) -> Result<Project, PipelineError> {
    ctx.store
        .find_project(id)
        .await?
        .ok_or_else(|| PipelineError::precondition(format!("Project {id} not found")))
}

pub(crate) async fn load_page(ctx: &JobContext, id: DbId) -> Result<Page, PipelineError> {
    ctx.store
        .find_page(id)
        .await?
        .ok_or_else(|| PipelineError::precondition(format!("Page {id} not found")))
}

/// A page that must belong to `project`.
pub(crate) async fn load_project_page(
    ctx: &JobContext,
    project: &Project,
    page_id: DbId,
) -> Result<Page, PipelineError> {
    let page = load_page(ctx, page_id).await?;
    if page.project_id != project.id {
        return Err(PipelineError::precondition(format!(
            "Page {page_id} does not belong to project {}",
            project.id
        )));
    }
    Ok(page)
}

/// Pages a fan-out job works on. An empty id filter means every page.
pub(crate) async fn load_unit_pages(
    ctx: &JobContext,
    project_id: DbId,
    page_ids: Option<&[DbId]>,
) -> Result<Vec<Page>, PipelineError> {
    let filter = page_ids.filter(|ids| !ids.is_empty());
    let pages = ctx.store.list_pages(project_id, filter).await?;
    if pages.is_empty() {
        return Err(PipelineError::precondition(NO_PAGES));
    }
    Ok(pages)
}

/// Run the one unit of a single-unit job and record its outcome. The unit's
/// error is also the job's error, so it lands in `tasks.error_message`.
pub(crate) async fn run_single<Fut>(
    reporter: &ProgressReporter,
    label: String,
    unit: Fut,
) -> Result<(), PipelineError>
where
    Fut: Future<Output = Result<Option<ArtifactRef>, PipelineError>>,
{
    match unit.await {
        Ok(artifact) => {
            reporter.record_success(artifact).await;
            Ok(())
        }
        Err(e) => {
            reporter
                .record_failure(UnitFailure {
                    unit: label,
                    error: e.to_string(),
                })
                .await;
            Err(e)
        }
    }
}

/// Provider-readable locations of material references. References that
/// resolve outside the storage root are skipped.
pub(crate) fn locate_references(ctx: &JobContext, references: &[String]) -> Vec<String> {
    references
        .iter()
        .filter_map(|reference| match ctx.storage.locate(reference) {
            Ok(location) => Some(location),
            Err(e) => {
                tracing::warn!(reference = %reference, error = %e, "Skipping reference image");
                None
            }
        })
        .collect()
}

/// Best-effort FAILED marker for a page whose unit failed.
pub(crate) async fn mark_page_failed(ctx: &JobContext, page_id: DbId) {
    if let Err(e) = ctx.store.update_page_status(page_id, PageStatus::Failed).await {
        tracing::warn!(page_id, error = %e, "Failed to mark page as failed");
    }
}

pub(crate) fn unit_total(count: usize) -> Result<u32, PipelineError> {
    u32::try_from(count).map_err(|_| PipelineError::Internal(format!("too many units: {count}")))
}

pub(crate) fn fan_out_workers(ctx: &JobContext, requested: Option<usize>, units: usize) -> usize {
    clamp_workers(requested, ctx.config.default_fan_out_workers, units)
}

/// Page positions within the whole deck, for classification.
///
/// Jobs may run on a subset of pages, but a page's role depends on where it
/// sits in the full project.
#[derive(Debug, Clone, Default)]
pub(crate) struct DeckLayout {
    positions: HashMap<DbId, usize>,
    total: usize,
}

impl DeckLayout {
    pub(crate) fn from_pages(pages: &[Page]) -> Self {
        Self {
            positions: pages.iter().enumerate().map(|(i, p)| (p.id, i)).collect(),
            total: pages.len(),
        }
    }

    pub(crate) fn total(&self) -> usize {
        self.total
    }

    pub(crate) fn position(&self, page: &Page) -> usize {
        self.positions
            .get(&page.id)
            .copied()
            .unwrap_or_else(|| usize::try_from(page.order_index).unwrap_or(0))
    }

    pub(crate) fn classify(&self, page: &Page) -> Result<PageType, PipelineError> {
        let traits = page.traits(self.position(page))?;
        Ok(classify(&traits, self.total))
    }
}

/// Project outline as prompt context: the stored outline text, or the page
/// titles as a numbered list.
pub(crate) fn outline_text(project: &Project, pages: &[Page]) -> String {
    match project.outline_text.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => pages
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{}. {}", i + 1, p.title()))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Stored template paths that exist, checked up front so the pure resolver
/// can run with a synchronous predicate.
async fn existing_templates(ctx: &JobContext, config: &TemplateConfig) -> HashSet<String> {
    let mut existing = HashSet::new();
    for path in config.variants.values().chain(config.base_path.iter()) {
        if !existing.contains(path) && ctx.storage.exists(path).await {
            existing.insert(path.clone());
        }
    }
    existing
}

/// Reference template for a unit of `unit_type`, as a stored path.
pub(crate) async fn resolve_template(
    ctx: &JobContext,
    config: &TemplateConfig,
    unit_type: PageType,
) -> Option<String> {
    let existing = existing_templates(ctx, config).await;
    template::resolve(config, unit_type, config.base_path.as_deref(), |p| {
        existing.contains(p)
    })
}

/// The project's primary template, if it exists in storage.
pub(crate) async fn base_template(ctx: &JobContext, config: &TemplateConfig) -> Option<String> {
    match config.base_path.as_deref().filter(|p| !p.is_empty()) {
        Some(path) if ctx.storage.exists(path).await => Some(path.to_string()),
        _ => None,
    }
}

/// Style guide for template-less generation.
///
/// The project's free-text style is refined once by the text provider and
/// cached. A refinement failure falls back to the raw text.
pub(crate) async fn refined_style(ctx: &JobContext, project: &Project) -> Option<String> {
    let style = project
        .template_style
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())?;
    let extra = project.extra_requirements.as_deref().unwrap_or("");
    let key = StyleCache::key(project.id, &[style, extra]);

    let refined = ctx
        .style_cache
        .get_or_try_insert_with(&key, || async {
            let prompt = ctx
                .prompts
                .style_refinement(style, project.extra_requirements.as_deref());
            ctx.text.generate_text(&prompt).await
        })
        .await;

    match refined {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!(project_id = project.id, error = %e, "Style refinement failed, using raw style");
            Some(style.to_string())
        }
    }
}
