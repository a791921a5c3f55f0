//! End-to-end job runs through the orchestrator.

mod common;

use assert_matches::assert_matches;
use common::{Harness, FAIL_MARKER};
use slidesmith_core::job_events::{TASK_PARTIAL, TASK_PROGRESS};
use slidesmith_core::page_type::PageType;
use slidesmith_core::progress::{ProgressDetail, TaskProgress};
use slidesmith_core::scope::{InfographicMode, ScopeKey};
use slidesmith_core::template::TemplateConfig;
use slidesmith_core::types::DbId;
use slidesmith_db::models::status::{PageStatus, ProjectStatus, TaskStatus};
use slidesmith_db::GenerationStore;
use slidesmith_pipeline::{BlobStorage, JobRequest};

fn images_request(max_workers: usize) -> JobRequest {
    JobRequest::GenerateImages {
        max_workers: Some(max_workers),
        page_ids: None,
        aspect_ratio: None,
        resolution: None,
        use_template: true,
        reference_paths: vec![],
    }
}

// ---------------------------------------------------------------------------
// Fan-out image generation
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_failing_page_of_six_is_partial() {
    let h = Harness::new();
    let project_id = h.project(TemplateConfig::default()).await;
    let mut pages = Vec::new();
    for n in 1..=6 {
        let title = if n == 3 {
            format!("Slide {n} {FAIL_MARKER}")
        } else {
            format!("Slide {n}")
        };
        pages.push(h.page(project_id, n - 1, &title).await);
    }

    let task_id = h
        .orchestrator
        .submit_task(Some(project_id), images_request(3))
        .await
        .unwrap();
    let view = h.wait(task_id).await;

    assert_eq!(view.status, Some(TaskStatus::Partial));
    assert_eq!(view.progress.total, 6);
    assert_eq!(view.progress.completed, 5);
    assert_eq!(view.progress.failed, 1);
    assert!(view.completed_at.is_some());
    assert!(h.images.peak() <= 3);

    for (i, page_id) in pages.iter().enumerate() {
        let current = h
            .ctx
            .versions
            .current(&ScopeKey::Page { page_id: *page_id })
            .await
            .unwrap();
        let page = h.store.find_page(*page_id).await.unwrap().unwrap();
        if i == 2 {
            assert!(current.is_none());
            assert_eq!(page.status(), Some(PageStatus::Failed));
        } else {
            assert_eq!(current.unwrap().version_number, 1);
            assert_eq!(page.status(), Some(PageStatus::Completed));
        }
    }

    let detail = view.progress.detail.unwrap();
    let failures = detail.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].unit, format!("page {}", pages[2]));
    assert_eq!(detail.artifacts().len(), 5);

    let project = h.store.find_project(project_id).await.unwrap().unwrap();
    assert_eq!(project.status(), Some(ProjectStatus::Draft));
}

#[tokio::test]
async fn progress_events_never_move_backwards() {
    let h = Harness::new();
    let project_id = h.project(TemplateConfig::default()).await;
    for n in 0..4 {
        let title = if n == 1 {
            format!("Slide {FAIL_MARKER}")
        } else {
            format!("Slide {n}")
        };
        h.page(project_id, n, &title).await;
    }
    let mut rx = h.events.subscribe();

    let task_id = h
        .orchestrator
        .submit_task(Some(project_id), images_request(2))
        .await
        .unwrap();

    let mut last_finished = 0;
    let mut snapshots = 0;
    loop {
        let event = rx.recv().await.unwrap();
        assert_eq!(event.task_id, task_id);
        if event.event_type == TASK_PROGRESS {
            let progress: TaskProgress = serde_json::from_value(event.payload.clone()).unwrap();
            assert!(progress.finished() >= last_finished);
            assert!(progress.finished() <= progress.total);
            last_finished = progress.finished();
            snapshots += 1;
        }
        if event.is_terminal() {
            assert_eq!(event.event_type, TASK_PARTIAL);
            break;
        }
    }
    assert_eq!(last_finished, 4);
    assert_eq!(snapshots, 4);
}

#[tokio::test]
async fn project_without_pages_fails_at_job_level() {
    let h = Harness::new();
    let project_id = h.project(TemplateConfig::default()).await;

    let task_id = h
        .orchestrator
        .submit_task(Some(project_id), images_request(4))
        .await
        .unwrap();
    let view = h.wait(task_id).await;

    assert_eq!(view.status, Some(TaskStatus::Failed));
    assert_eq!(view.error_message.as_deref(), Some("No pages found for project"));
    assert!(view.completed_at.is_some());
}

#[tokio::test]
async fn full_success_advances_project() {
    let h = Harness::new();
    let project_id = h.project(TemplateConfig::default()).await;
    for n in 0..3 {
        h.page(project_id, n, &format!("Slide {n}")).await;
    }

    let task_id = h
        .orchestrator
        .submit_task(Some(project_id), images_request(8))
        .await
        .unwrap();
    let view = h.wait(task_id).await;

    assert_eq!(view.status, Some(TaskStatus::Completed));
    let project = h.store.find_project(project_id).await.unwrap().unwrap();
    assert_eq!(project.status(), Some(ProjectStatus::Completed));
}

// ---------------------------------------------------------------------------
// Descriptions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn descriptions_mark_pages_and_project() {
    let h = Harness::new();
    let project_id = h.project(TemplateConfig::default()).await;
    let mut pages = Vec::new();
    for n in 0..3 {
        pages.push(h.draft_page(project_id, n, &format!("Slide {n}")).await);
    }

    let task_id = h
        .orchestrator
        .submit_task(
            Some(project_id),
            JobRequest::GenerateDescriptions {
                max_workers: None,
                page_ids: None,
            },
        )
        .await
        .unwrap();
    let view = h.wait(task_id).await;

    assert_eq!(view.status, Some(TaskStatus::Completed));
    for page_id in pages {
        let page = h.store.find_page(page_id).await.unwrap().unwrap();
        assert_eq!(page.status(), Some(PageStatus::DescriptionGenerated));
        assert_eq!(page.description_text(), Some("Generated text"));
    }
    let project = h.store.find_project(project_id).await.unwrap().unwrap();
    assert_eq!(project.status(), Some(ProjectStatus::DescriptionsGenerated));
}

// ---------------------------------------------------------------------------
// Single-page image and edit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn edit_requires_an_existing_image() {
    let h = Harness::new();
    let project_id = h.project(TemplateConfig::default()).await;
    let page_id = h.page(project_id, 0, "Opening").await;

    let task_id = h
        .orchestrator
        .submit_task(
            Some(project_id),
            JobRequest::EditPageImage {
                page_id,
                instruction: "Make the title larger".to_string(),
                aspect_ratio: None,
                resolution: None,
                reference_paths: vec![],
            },
        )
        .await
        .unwrap();
    let view = h.wait(task_id).await;

    assert_eq!(view.status, Some(TaskStatus::Failed));
    assert_eq!(view.error_message.as_deref(), Some("Page has no image to edit"));
    assert_eq!(h.images.edits(), 0);
}

#[tokio::test]
async fn edit_commits_next_version_of_page() {
    let h = Harness::new();
    let project_id = h.project(TemplateConfig::default()).await;
    let page_id = h.page(project_id, 0, "Opening").await;

    let generate = h
        .orchestrator
        .submit_task(
            Some(project_id),
            JobRequest::GeneratePageImage {
                page_id,
                aspect_ratio: None,
                resolution: None,
                use_template: true,
                reference_paths: vec![],
            },
        )
        .await
        .unwrap();
    assert_eq!(h.wait(generate).await.status, Some(TaskStatus::Completed));

    let edit = h
        .orchestrator
        .submit_task(
            Some(project_id),
            JobRequest::EditPageImage {
                page_id,
                instruction: "Use a darker background".to_string(),
                aspect_ratio: None,
                resolution: None,
                reference_paths: vec![],
            },
        )
        .await
        .unwrap();
    let view = h.wait(edit).await;
    assert_eq!(view.status, Some(TaskStatus::Completed));
    assert_matches!(
        view.progress.detail,
        Some(ProgressDetail::Single { artifact: Some(ref a), .. }) if a.version_number == Some(2)
    );

    let versions = h
        .ctx
        .versions
        .list_versions(&ScopeKey::Page { page_id })
        .await
        .unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].source, "edited");
    assert!(versions[0].is_current);
    assert_eq!(h.images.edits(), 1);

    let page = h.store.find_page(page_id).await.unwrap().unwrap();
    assert_eq!(page.status(), Some(PageStatus::Completed));
    assert_eq!(
        page.generated_image_path.as_deref(),
        Some(versions[0].artifact_path.as_str())
    );
}

async fn generate_page_image(h: &Harness, project_id: DbId, page_id: DbId) {
    let task_id = h
        .orchestrator
        .submit_task(
            Some(project_id),
            JobRequest::GeneratePageImage {
                page_id,
                aspect_ratio: None,
                resolution: None,
                use_template: true,
                reference_paths: vec![],
            },
        )
        .await
        .unwrap();
    assert_eq!(h.wait(task_id).await.status, Some(TaskStatus::Completed));
}

fn edit_request(page_id: DbId, instruction: &str) -> JobRequest {
    JobRequest::EditPageImage {
        page_id,
        instruction: instruction.to_string(),
        aspect_ratio: None,
        resolution: None,
        reference_paths: vec![],
    }
}

#[tokio::test]
async fn edit_marks_page_generating_while_running() {
    let h = Harness::new();
    let project_id = h.project(TemplateConfig::default()).await;
    let page_id = h.page(project_id, 0, "Opening").await;
    generate_page_image(&h, project_id, page_id).await;

    h.images.hold_edits();
    let edit = h
        .orchestrator
        .submit_task(Some(project_id), edit_request(page_id, "Add a chart"))
        .await
        .unwrap();
    h.wait_page_status(page_id, PageStatus::Generating).await;
    h.images.release_edits();

    assert_eq!(h.wait(edit).await.status, Some(TaskStatus::Completed));
    let page = h.store.find_page(page_id).await.unwrap().unwrap();
    assert_eq!(page.status(), Some(PageStatus::Completed));
}

#[tokio::test]
async fn failed_edit_marks_page_failed_and_keeps_version() {
    let h = Harness::new();
    let project_id = h.project(TemplateConfig::default()).await;
    let page_id = h.page(project_id, 0, "Opening").await;
    generate_page_image(&h, project_id, page_id).await;

    let edit = h
        .orchestrator
        .submit_task(
            Some(project_id),
            edit_request(page_id, &format!("Make it {FAIL_MARKER}")),
        )
        .await
        .unwrap();
    let view = h.wait(edit).await;
    assert_eq!(view.status, Some(TaskStatus::Failed));

    let page = h.store.find_page(page_id).await.unwrap().unwrap();
    assert_eq!(page.status(), Some(PageStatus::Failed));
    let current = h
        .ctx
        .versions
        .current(&ScopeKey::Page { page_id })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.version_number, 1);
}

#[tokio::test]
async fn references_outside_storage_root_are_skipped() {
    let h = Harness::new();
    let project_id = h.project(TemplateConfig::default()).await;
    let page_id = h
        .described_page(
            project_id,
            0,
            "Opening",
            "Body text\n![leak](../../etc/passwd)\n![also](/files/../../secrets.env)",
        )
        .await;

    let task_id = h
        .orchestrator
        .submit_task(
            Some(project_id),
            JobRequest::GeneratePageImage {
                page_id,
                aspect_ratio: None,
                resolution: None,
                use_template: true,
                reference_paths: vec!["../outside.png".to_string()],
            },
        )
        .await
        .unwrap();
    assert_eq!(h.wait(task_id).await.status, Some(TaskStatus::Completed));

    let root = h.dir.path().to_path_buf();
    for location in h.images.locations() {
        assert!(!location.contains(".."), "escaped reference {location}");
        assert!(std::path::Path::new(&location).starts_with(&root));
    }
    let current = h
        .ctx
        .versions
        .current(&ScopeKey::Page { page_id })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.version_number, 1);
}

// ---------------------------------------------------------------------------
// Template variants
// ---------------------------------------------------------------------------

#[tokio::test]
async fn variants_require_a_base_template() {
    let h = Harness::new();
    let project_id = h.project(TemplateConfig::default()).await;

    let task_id = h
        .orchestrator
        .submit_task(
            Some(project_id),
            JobRequest::GenerateTemplateVariants {
                page_types: PageType::ALL.to_vec(),
                max_workers: None,
                aspect_ratio: None,
                resolution: None,
            },
        )
        .await
        .unwrap();
    let view = h.wait(task_id).await;

    assert_eq!(view.status, Some(TaskStatus::Failed));
    assert_eq!(
        view.error_message.as_deref(),
        Some("No template image found for project")
    );
}

#[tokio::test]
async fn variants_are_saved_once_per_type() {
    let h = Harness::new();
    let base = h.template().await;
    let project_id = h
        .project(TemplateConfig {
            base_path: Some(base),
            ..TemplateConfig::default()
        })
        .await;

    let task_id = h
        .orchestrator
        .submit_task(
            Some(project_id),
            JobRequest::GenerateTemplateVariants {
                page_types: vec![PageType::Cover, PageType::Ending, PageType::Cover],
                max_workers: Some(2),
                aspect_ratio: None,
                resolution: None,
            },
        )
        .await
        .unwrap();
    let view = h.wait(task_id).await;

    assert_eq!(view.status, Some(TaskStatus::Completed));
    assert_eq!(view.progress.total, 2);

    let project = h.store.find_project(project_id).await.unwrap().unwrap();
    let config = &project.template_config.0;
    assert_eq!(config.variants.len(), 2);
    for page_type in [PageType::Cover, PageType::Ending] {
        let path = &config.variants[&page_type];
        assert!(h.storage.exists(path).await);
        assert_eq!(config.history[&page_type], vec![path.clone()]);
    }
}

// ---------------------------------------------------------------------------
// Cards and infographics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cards_complete_when_any_card_succeeds() {
    let h = Harness::new();
    let project_id = h.project(TemplateConfig::default()).await;
    for n in 0..4 {
        let title = if n == 2 {
            format!("Card {FAIL_MARKER}")
        } else {
            format!("Card {n}")
        };
        h.page(project_id, n, &title).await;
    }

    let task_id = h
        .orchestrator
        .submit_task(
            Some(project_id),
            JobRequest::GenerateCards {
                max_workers: None,
                page_ids: None,
                aspect_ratio: None,
                resolution: None,
                use_template: true,
            },
        )
        .await
        .unwrap();
    let view = h.wait(task_id).await;

    assert_eq!(view.status, Some(TaskStatus::Completed));
    assert_eq!(view.progress.completed, 3);
    assert_eq!(view.progress.failed, 1);

    let card = h
        .ctx
        .versions
        .current(&ScopeKey::Card { project_id, index: 0 })
        .await
        .unwrap();
    assert_eq!(card.unwrap().version_number, 1);
    let failed_card = h
        .ctx
        .versions
        .current(&ScopeKey::Card { project_id, index: 2 })
        .await
        .unwrap();
    assert!(failed_card.is_none());

    // A failure anywhere keeps the project where it was.
    let project = h.store.find_project(project_id).await.unwrap().unwrap();
    assert_eq!(project.status(), Some(ProjectStatus::Draft));
}

#[tokio::test]
async fn card_index_out_of_range_fails() {
    let h = Harness::new();
    let project_id = h.project(TemplateConfig::default()).await;
    h.page(project_id, 0, "Card 0").await;

    let task_id = h
        .orchestrator
        .submit_task(
            Some(project_id),
            JobRequest::GenerateCard {
                index: 5,
                aspect_ratio: None,
                resolution: None,
                use_template: true,
            },
        )
        .await
        .unwrap();
    let view = h.wait(task_id).await;

    assert_eq!(view.status, Some(TaskStatus::Failed));
    assert_eq!(view.error_message.as_deref(), Some("Card index 5 out of range"));
}

fn edit_card_request(index: u32) -> JobRequest {
    JobRequest::EditCard {
        index,
        instruction: "Swap the accent colour".to_string(),
        aspect_ratio: None,
        resolution: None,
        use_template: true,
        reference_paths: vec![],
    }
}

#[tokio::test]
async fn edit_card_requires_an_existing_image() {
    let h = Harness::new();
    let project_id = h.project(TemplateConfig::default()).await;
    h.page(project_id, 0, "Card 0").await;

    let task_id = h
        .orchestrator
        .submit_task(Some(project_id), edit_card_request(0))
        .await
        .unwrap();
    let view = h.wait(task_id).await;

    assert_eq!(view.status, Some(TaskStatus::Failed));
    assert_eq!(view.error_message.as_deref(), Some("No current image for card 0"));
    assert_eq!(h.images.edits(), 0);
}

#[tokio::test]
async fn edit_card_commits_next_card_version() {
    let h = Harness::new();
    let project_id = h.project(TemplateConfig::default()).await;
    let page_id = h.page(project_id, 0, "Card 0").await;

    let generate = h
        .orchestrator
        .submit_task(
            Some(project_id),
            JobRequest::GenerateCard {
                index: 0,
                aspect_ratio: None,
                resolution: None,
                use_template: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(h.wait(generate).await.status, Some(TaskStatus::Completed));

    let edit = h
        .orchestrator
        .submit_task(Some(project_id), edit_card_request(0))
        .await
        .unwrap();
    let view = h.wait(edit).await;
    assert_eq!(view.status, Some(TaskStatus::Completed));
    assert_eq!(h.images.edits(), 1);

    let versions = h
        .ctx
        .versions
        .list_versions(&ScopeKey::Card { project_id, index: 0 })
        .await
        .unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].version_number, 2);
    assert_eq!(versions[0].source, "edited");
    assert!(versions[0].is_current);

    let page = h.store.find_page(page_id).await.unwrap().unwrap();
    assert_eq!(
        page.generated_image_path.as_deref(),
        Some(versions[0].artifact_path.as_str())
    );
}

#[tokio::test]
async fn material_generate_then_edit_moves_project_pointer() {
    let h = Harness::new();
    let project_id = h.project(TemplateConfig::default()).await;
    let scope = ScopeKey::Material {
        project_id,
        mode: InfographicMode::Single,
        page_id: None,
    };

    let generate = h
        .orchestrator
        .submit_task(
            Some(project_id),
            JobRequest::GenerateMaterial {
                prompt: "A watercolour map of the harbour".to_string(),
                page_id: None,
                aspect_ratio: None,
                resolution: None,
                use_template: false,
                reference_paths: vec![],
            },
        )
        .await
        .unwrap();
    assert_eq!(h.wait(generate).await.status, Some(TaskStatus::Completed));

    let first = h.ctx.versions.current(&scope).await.unwrap().unwrap();
    assert_eq!(first.version_number, 1);
    let project = h.store.find_project(project_id).await.unwrap().unwrap();
    assert_eq!(
        project.primary_artifact_path.as_deref(),
        Some(first.artifact_path.as_str())
    );

    let edit = h
        .orchestrator
        .submit_task(
            Some(project_id),
            JobRequest::EditMaterial {
                instruction: "Add a compass rose".to_string(),
                page_id: None,
                aspect_ratio: None,
                resolution: None,
                use_template: true,
                reference_paths: vec![],
            },
        )
        .await
        .unwrap();
    let view = h.wait(edit).await;
    assert_eq!(view.status, Some(TaskStatus::Completed));
    assert_matches!(
        view.progress.detail,
        Some(ProgressDetail::Single { artifact: Some(ref a), .. }) if a.version_number == Some(2)
    );

    let second = h.ctx.versions.current(&scope).await.unwrap().unwrap();
    assert_eq!(second.version_number, 2);
    assert_eq!(second.source, "edited");
    let project = h.store.find_project(project_id).await.unwrap().unwrap();
    assert_eq!(
        project.primary_artifact_path.as_deref(),
        Some(second.artifact_path.as_str())
    );
}

#[tokio::test]
async fn material_edit_requires_an_existing_image() {
    let h = Harness::new();
    let project_id = h.project(TemplateConfig::default()).await;
    let page_id = h.page(project_id, 0, "Opening").await;

    let task_id = h
        .orchestrator
        .submit_task(
            Some(project_id),
            JobRequest::EditMaterial {
                instruction: "Brighter".to_string(),
                page_id: Some(page_id),
                aspect_ratio: None,
                resolution: None,
                use_template: true,
                reference_paths: vec![],
            },
        )
        .await
        .unwrap();
    let view = h.wait(task_id).await;

    assert_eq!(view.status, Some(TaskStatus::Failed));
    assert_eq!(view.error_message.as_deref(), Some("Material has no image to edit"));
    assert_eq!(h.images.edits(), 0);
}

#[tokio::test]
async fn page_material_leaves_project_pointer_alone() {
    let h = Harness::new();
    let project_id = h.project(TemplateConfig::default()).await;
    let page_id = h.page(project_id, 0, "Opening").await;

    let task_id = h
        .orchestrator
        .submit_task(
            Some(project_id),
            JobRequest::GenerateMaterial {
                prompt: "Icon set for the opening".to_string(),
                page_id: Some(page_id),
                aspect_ratio: None,
                resolution: None,
                use_template: false,
                reference_paths: vec![],
            },
        )
        .await
        .unwrap();
    assert_eq!(h.wait(task_id).await.status, Some(TaskStatus::Completed));

    let scope = ScopeKey::Material {
        project_id,
        mode: InfographicMode::Series,
        page_id: Some(page_id),
    };
    let current = h.ctx.versions.current(&scope).await.unwrap().unwrap();
    assert_eq!(current.version_number, 1);
    assert!(h.storage.exists(&current.artifact_path).await);

    let project = h.store.find_project(project_id).await.unwrap().unwrap();
    assert!(project.primary_artifact_path.is_none());
}

#[tokio::test]
async fn material_page_must_belong_to_project() {
    let h = Harness::new();
    let project_id = h.project(TemplateConfig::default()).await;
    let other_project = h.project(TemplateConfig::default()).await;
    let foreign_page = h.page(other_project, 0, "Elsewhere").await;

    let task_id = h
        .orchestrator
        .submit_task(
            Some(project_id),
            JobRequest::GenerateMaterial {
                prompt: "Anything".to_string(),
                page_id: Some(foreign_page),
                aspect_ratio: None,
                resolution: None,
                use_template: false,
                reference_paths: vec![],
            },
        )
        .await
        .unwrap();
    let view = h.wait(task_id).await;

    assert_eq!(view.status, Some(TaskStatus::Failed));
    assert_eq!(
        view.error_message.as_deref(),
        Some(format!("Page {foreign_page} does not belong to project {project_id}").as_str())
    );
    assert_eq!(h.images.calls(), 0);
}

#[tokio::test]
async fn single_infographic_sets_project_pointer() {
    let h = Harness::new();
    let project_id = h.project(TemplateConfig::default()).await;
    h.page(project_id, 0, "Opening").await;
    h.page(project_id, 1, "Details").await;

    let task_id = h
        .orchestrator
        .submit_task(
            Some(project_id),
            JobRequest::GenerateInfographic {
                mode: InfographicMode::Single,
                max_workers: None,
                page_ids: None,
                aspect_ratio: None,
                resolution: None,
                use_template: false,
            },
        )
        .await
        .unwrap();
    let view = h.wait(task_id).await;

    assert_eq!(view.status, Some(TaskStatus::Completed));
    assert_eq!(view.progress.total, 1);

    let scope = ScopeKey::Material {
        project_id,
        mode: InfographicMode::Single,
        page_id: None,
    };
    let current = h.ctx.versions.current(&scope).await.unwrap().unwrap();
    let project = h.store.find_project(project_id).await.unwrap().unwrap();
    assert_eq!(
        project.primary_artifact_path.as_deref(),
        Some(current.artifact_path.as_str())
    );
    assert_eq!(project.status(), Some(ProjectStatus::Completed));
}

#[tokio::test]
async fn series_infographic_versions_each_page() {
    let h = Harness::new();
    let project_id = h.project(TemplateConfig::default()).await;
    let first = h.page(project_id, 0, "Opening").await;
    let second = h.page(project_id, 1, "Details").await;

    let task_id = h
        .orchestrator
        .submit_task(
            Some(project_id),
            JobRequest::GenerateInfographic {
                mode: InfographicMode::Series,
                max_workers: Some(2),
                page_ids: None,
                aspect_ratio: None,
                resolution: None,
                use_template: false,
            },
        )
        .await
        .unwrap();
    let view = h.wait(task_id).await;
    assert_eq!(view.status, Some(TaskStatus::Completed));
    assert_eq!(view.progress.completed, 2);

    for page_id in [first, second] {
        let scope = ScopeKey::Material {
            project_id,
            mode: InfographicMode::Series,
            page_id: Some(page_id),
        };
        let current = h.ctx.versions.current(&scope).await.unwrap();
        assert_eq!(current.unwrap().version_number, 1);
        // Series material does not touch the slide image pointer.
        let page = h.store.find_page(page_id).await.unwrap().unwrap();
        assert!(page.generated_image_path.is_none());
    }
}
