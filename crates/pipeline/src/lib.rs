//! Background generation pipeline.
//!
//! - [`orchestrator`]: task lifecycle on a bounded pool.
//! - [`jobs`]: job requests and the per-kind job bodies.
//! - [`fan_out`]: bounded-concurrency execution of independent units.
//! - [`versioning`]: versioned artifact commits with an atomic current pointer.
//! - [`storage`]: blob storage behind the [`storage::BlobStorage`] trait.
//!
//! Jobs only ever see the [`context::JobContext`]; persistence, storage and
//! providers are all trait objects, so the whole pipeline runs against
//! `MemoryStore` and stub providers in tests.

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod fan_out;
pub mod jobs;
pub mod orchestrator;
pub mod progress;
pub mod prompts;
pub mod storage;
pub mod versioning;

pub use config::PipelineConfig;
pub use context::JobContext;
pub use error::PipelineError;
pub use jobs::JobRequest;
pub use orchestrator::{TaskOrchestrator, TaskView};
pub use storage::{BlobStorage, LocalBlobStorage};
