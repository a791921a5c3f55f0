use slidesmith_core::error::CoreError;
use slidesmith_core::types::DbId;

/// Errors surfaced by a [`GenerationStore`](crate::store::GenerationStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// A version write lost a race or reused a version number.
    #[error("Version conflict on scope {scope_key}: {detail}")]
    Conflict { scope_key: String, detail: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}
