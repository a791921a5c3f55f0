//! Shared handles every job runs against.

use std::sync::Arc;

use slidesmith_db::GenerationStore;
use slidesmith_events::EventBus;
use slidesmith_provider::{ImageProvider, TextProvider};

use crate::cache::StyleCache;
use crate::config::PipelineConfig;
use crate::prompts::{DefaultPrompts, PromptComposer};
use crate::storage::BlobStorage;
use crate::versioning::{KeyedLocks, VersionedArtifactStore};

pub struct JobContext {
    pub config: PipelineConfig,
    pub store: Arc<dyn GenerationStore>,
    pub storage: Arc<dyn BlobStorage>,
    pub versions: VersionedArtifactStore,
    /// Scope-key locks shared with `versions`; also guards template config
    /// read-modify-write cycles.
    pub locks: Arc<KeyedLocks>,
    pub images: Arc<dyn ImageProvider>,
    pub text: Arc<dyn TextProvider>,
    pub prompts: Arc<dyn PromptComposer>,
    pub style_cache: StyleCache,
    pub events: Arc<EventBus>,
}

impl JobContext {
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn GenerationStore>,
        storage: Arc<dyn BlobStorage>,
        images: Arc<dyn ImageProvider>,
        text: Arc<dyn TextProvider>,
        events: Arc<EventBus>,
    ) -> Self {
        let locks = Arc::new(KeyedLocks::new());
        let versions =
            VersionedArtifactStore::new(Arc::clone(&store), Arc::clone(&storage), Arc::clone(&locks));
        let style_cache = StyleCache::new(config.style_cache_ttl);
        Self {
            config,
            store,
            storage,
            versions,
            locks,
            images,
            text,
            prompts: Arc::new(DefaultPrompts),
            style_cache,
            events,
        }
    }

    /// Replace the prompt wording.
    pub fn with_prompts(mut self, prompts: Arc<dyn PromptComposer>) -> Self {
        self.prompts = prompts;
        self
    }
}
