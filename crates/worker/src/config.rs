use std::time::Duration;

use anyhow::Context;
use slidesmith_pipeline::config::env_number;
use slidesmith_pipeline::PipelineConfig;
use slidesmith_provider::ProviderSettings;

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    /// How often the dispatcher looks for pending tasks (default: 1s).
    pub poll_interval: Duration,
    /// Pending tasks fetched per poll (default: `16`).
    pub dispatch_batch: i64,
    pub provider: ProviderSettings,
    /// Model for descriptions, blueprints and style refinement.
    pub text_model: String,
    pub image_model: String,
    pub pipeline: PipelineConfig,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                     |
    /// |-----------------------------|-----------------------------|
    /// | `DATABASE_URL`              | required                    |
    /// | `DISPATCH_POLL_INTERVAL_MS` | `1000`                      |
    /// | `DISPATCH_BATCH_SIZE`       | `16`                        |
    /// | `PROVIDER_BASE_URL`         | `https://api.openai.com/v1` |
    /// | `PROVIDER_API_KEY`          | required                    |
    /// | `TEXT_MODEL`                | `gpt-4o-mini`               |
    /// | `IMAGE_MODEL`               | `gpt-image-1`               |
    ///
    /// Pipeline settings come from [`PipelineConfig::from_env`].
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let api_key =
            std::env::var("PROVIDER_API_KEY").context("PROVIDER_API_KEY must be set")?;
        let base_url = std::env::var("PROVIDER_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".into());

        let poll_interval =
            Duration::from_millis(env_number("DISPATCH_POLL_INTERVAL_MS", 1000u64).max(10));
        let dispatch_batch = env_number("DISPATCH_BATCH_SIZE", 16i64).max(1);

        let text_model = std::env::var("TEXT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        let image_model = std::env::var("IMAGE_MODEL").unwrap_or_else(|_| "gpt-image-1".into());

        Ok(Self {
            database_url,
            poll_interval,
            dispatch_batch,
            provider: ProviderSettings { base_url, api_key },
            text_model,
            image_model,
            pipeline: PipelineConfig::from_env(),
        })
    }
}
