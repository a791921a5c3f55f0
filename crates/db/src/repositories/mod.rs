//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod artifact_version_repo;
pub mod page_repo;
pub mod project_repo;
pub mod task_repo;

pub use artifact_version_repo::ArtifactVersionRepo;
pub use page_repo::PageRepo;
pub use project_repo::ProjectRepo;
pub use task_repo::TaskRepo;
