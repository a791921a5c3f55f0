//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A create DTO for inserts

pub mod artifact_version;
pub mod page;
pub mod project;
pub mod status;
pub mod task;
