//! Shared harness: in-memory store, temp-dir blob storage and stub providers.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use slidesmith_core::template::TemplateConfig;
use slidesmith_core::types::DbId;
use slidesmith_db::models::page::{CreatePage, PageDescription, PageOutline};
use slidesmith_db::models::project::CreateProject;
use slidesmith_db::models::status::{PageStatus, TaskStatus};
use slidesmith_db::{GenerationStore, MemoryStore};
use slidesmith_events::EventBus;
use slidesmith_pipeline::{
    BlobStorage, JobContext, LocalBlobStorage, PipelineConfig, TaskOrchestrator, TaskView,
};
use slidesmith_provider::{
    ImageEditRequest, ImageProvider, ImageRequest, ProviderError, TextProvider,
};
use tempfile::TempDir;
use tokio::sync::Notify;

/// Minimal payload that sniffs as PNG.
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDRstub";

/// Substring that makes the stub providers fail a request.
pub const FAIL_MARKER: &str = "FAILME";

// ---------------------------------------------------------------------------
// Stub providers
// ---------------------------------------------------------------------------

/// Image provider that sleeps briefly, tracks its concurrency peak and fails
/// any prompt containing [`FAIL_MARKER`]. Every reference location it is
/// handed is recorded.
#[derive(Default)]
pub struct StubImages {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
    edits: AtomicUsize,
    locations: Mutex<Vec<String>>,
    hold_edits: AtomicBool,
    release_edits: Notify,
}

impl StubImages {
    /// Every base image and reference location seen so far.
    pub fn locations(&self) -> Vec<String> {
        self.locations.lock().unwrap().clone()
    }

    /// Park edits until [`StubImages::release_edits`] is called.
    pub fn hold_edits(&self) {
        self.hold_edits.store(true, Ordering::SeqCst);
    }

    pub fn release_edits(&self) {
        self.hold_edits.store(false, Ordering::SeqCst);
        self.release_edits.notify_waiters();
        self.release_edits.notify_one();
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn edits(&self) -> usize {
        self.edits.load(Ordering::SeqCst)
    }

    async fn respond(&self, prompt: &str) -> Result<Option<Vec<u8>>, ProviderError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if prompt.contains(FAIL_MARKER) {
            return Err(ProviderError::ApiError {
                status: 500,
                body: "stub failure".to_string(),
            });
        }
        Ok(Some(PNG_BYTES.to_vec()))
    }
}

#[async_trait]
impl ImageProvider for StubImages {
    fn model(&self) -> &str {
        "stub-image"
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<Option<Vec<u8>>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.locations
            .lock()
            .unwrap()
            .extend(request.reference_paths.iter().cloned());
        self.respond(&request.prompt).await
    }

    async fn edit_image(&self, request: &ImageEditRequest) -> Result<Option<Vec<u8>>, ProviderError> {
        self.edits.fetch_add(1, Ordering::SeqCst);
        {
            let mut locations = self.locations.lock().unwrap();
            locations.push(request.base_image_path.clone());
            locations.extend(request.reference_paths.iter().cloned());
        }
        if self.hold_edits.load(Ordering::SeqCst) {
            self.release_edits.notified().await;
        }
        self.respond(&request.prompt).await
    }
}

/// Text provider that echoes a fixed answer and fails on [`FAIL_MARKER`].
#[derive(Default)]
pub struct StubText;

#[async_trait]
impl TextProvider for StubText {
    fn model(&self) -> &str {
        "stub-text"
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, ProviderError> {
        if prompt.contains(FAIL_MARKER) {
            return Err(ProviderError::InvalidResponse("stub failure".to_string()));
        }
        Ok("Generated text".to_string())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub storage: Arc<LocalBlobStorage>,
    pub images: Arc<StubImages>,
    pub events: Arc<EventBus>,
    pub ctx: Arc<JobContext>,
    pub orchestrator: TaskOrchestrator,
    pub dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_storage(|root| Arc::new(LocalBlobStorage::new(root)))
    }

    /// Build a harness whose context writes blobs through `wrap`.
    pub fn with_storage<F>(wrap: F) -> Self
    where
        F: FnOnce(std::path::PathBuf) -> Arc<dyn BlobStorage>,
    {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(LocalBlobStorage::new(dir.path()));
        let images = Arc::new(StubImages::default());
        let events = Arc::new(EventBus::default());
        let config = PipelineConfig {
            storage_root: dir.path().to_path_buf(),
            ..PipelineConfig::default()
        };
        let ctx = Arc::new(JobContext::new(
            config,
            store.clone(),
            wrap(dir.path().to_path_buf()),
            images.clone(),
            Arc::new(StubText),
            events.clone(),
        ));
        let orchestrator = TaskOrchestrator::new(Arc::clone(&ctx));
        Self {
            store,
            storage,
            images,
            events,
            ctx,
            orchestrator,
            dir,
        }
    }

    pub async fn project(&self, template_config: TemplateConfig) -> DbId {
        self.store
            .create_project(&CreateProject {
                outline_text: Some("A deck about pipelines".to_string()),
                template_config,
                ..CreateProject::default()
            })
            .await
            .unwrap()
            .id
    }

    /// Add a page with a description.
    pub async fn page(&self, project_id: DbId, order_index: i32, title: &str) -> DbId {
        let page = self.draft_page(project_id, order_index, title).await;
        self.store
            .save_page_description(
                page,
                &PageDescription {
                    text: format!("Body text of page {order_index}"),
                    generated_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        page
    }

    /// Add a page with an explicit description.
    pub async fn described_page(
        &self,
        project_id: DbId,
        order_index: i32,
        title: &str,
        description: &str,
    ) -> DbId {
        let page = self.draft_page(project_id, order_index, title).await;
        self.store
            .save_page_description(
                page,
                &PageDescription {
                    text: description.to_string(),
                    generated_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        page
    }

    /// Add a page with an outline only.
    pub async fn draft_page(&self, project_id: DbId, order_index: i32, title: &str) -> DbId {
        self.store
            .create_page(&CreatePage {
                project_id,
                order_index,
                page_type: "auto".to_string(),
                outline: PageOutline {
                    title: title.to_string(),
                    points: vec!["First point".to_string()],
                },
            })
            .await
            .unwrap()
            .id
    }

    /// Store a template image and return its path.
    pub async fn template(&self) -> String {
        self.storage.store_blob("templates", PNG_BYTES).await.unwrap()
    }

    /// Poll until the page reaches `status`.
    pub async fn wait_page_status(&self, page_id: DbId, status: PageStatus) {
        for _ in 0..500 {
            let page = self.store.find_page(page_id).await.unwrap().unwrap();
            if page.status() == Some(status) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("page {page_id} never reached {status:?}");
    }

    /// Poll until the task is terminal.
    pub async fn wait(&self, task_id: DbId) -> TaskView {
        for _ in 0..500 {
            let view = self.orchestrator.get_task(task_id).await.unwrap().unwrap();
            if view.status.is_some_and(TaskStatus::is_terminal) {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {task_id} did not finish");
    }
}
