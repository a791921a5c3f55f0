//! Pure domain logic for the slidesmith generation pipeline.
//!
//! Nothing in this crate performs I/O. The classifier, template resolver,
//! scope keys, progress accounting and job-kind policies are shared by the
//! persistence layer (`slidesmith-db`) and the orchestrator
//! (`slidesmith-pipeline`).

pub mod error;
pub mod job;
pub mod job_events;
pub mod markdown;
pub mod page_type;
pub mod progress;
pub mod scope;
pub mod template;
pub mod types;
