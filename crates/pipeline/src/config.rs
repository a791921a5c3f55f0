use std::path::PathBuf;
use std::time::Duration;

use slidesmith_core::job::{DEFAULT_TASK_WORKERS, MAX_FAN_OUT_WORKERS, MIN_FAN_OUT_WORKERS};
use slidesmith_core::template::MAX_TEMPLATE_HISTORY;

/// Default per-task fan-out size when a request omits `max_workers`.
pub const DEFAULT_FAN_OUT_WORKERS: usize = 8;

/// Default TTL of refined style descriptions.
pub const DEFAULT_STYLE_CACHE_TTL_SECS: u64 = 900;

/// Pipeline configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root directory for stored blobs (default: `./uploads`).
    pub storage_root: PathBuf,
    /// Concurrently running tasks (default: `4`).
    pub task_workers: usize,
    /// Fan-out size when a request omits it (default: `8`).
    pub default_fan_out_workers: usize,
    /// Refined style cache TTL (default: 15 minutes).
    pub style_cache_ttl: Duration,
    /// Template variant history cap per page type (default: `10`).
    pub template_history_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("./uploads"),
            task_workers: DEFAULT_TASK_WORKERS,
            default_fan_out_workers: DEFAULT_FAN_OUT_WORKERS,
            style_cache_ttl: Duration::from_secs(DEFAULT_STYLE_CACHE_TTL_SECS),
            template_history_limit: MAX_TEMPLATE_HISTORY,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default     |
    /// |---------------------------|-------------|
    /// | `STORAGE_ROOT`            | `./uploads` |
    /// | `TASK_WORKERS`            | `4`         |
    /// | `DEFAULT_FAN_OUT_WORKERS` | `8`         |
    /// | `STYLE_CACHE_TTL_SECS`    | `900`       |
    /// | `TEMPLATE_HISTORY_LIMIT`  | `10`        |
    ///
    /// Unparseable numbers fall back to the default with a warning.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let storage_root = std::env::var("STORAGE_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage_root);

        let task_workers = env_number("TASK_WORKERS", defaults.task_workers).max(1);

        let default_fan_out_workers =
            env_number("DEFAULT_FAN_OUT_WORKERS", defaults.default_fan_out_workers)
                .clamp(MIN_FAN_OUT_WORKERS, MAX_FAN_OUT_WORKERS);

        let style_cache_ttl = Duration::from_secs(env_number(
            "STYLE_CACHE_TTL_SECS",
            DEFAULT_STYLE_CACHE_TTL_SECS,
        ));

        let template_history_limit =
            env_number("TEMPLATE_HISTORY_LIMIT", defaults.template_history_limit);

        Self {
            storage_root,
            task_workers,
            default_fan_out_workers,
            style_cache_ttl,
            template_history_limit,
        }
    }
}

/// Read a numeric environment variable, falling back to `default` when it is
/// unset or unparseable.
pub fn env_number<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(var = name, value = %raw, default = %default, "Invalid number, using default");
                default
            }
        },
        Err(_) => default,
    }
}
