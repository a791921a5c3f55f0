use slidesmith_core::error::CoreError;
use slidesmith_db::StoreError;
use slidesmith_provider::ProviderError;

/// Errors raised while running a job or one of its units.
///
/// The `Display` text of an error that escapes a job is written verbatim to
/// `tasks.error_message`; a unit error becomes that unit's entry in the
/// progress detail.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Storage error at {path}: {source}")]
    Storage {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A required entity or input is missing. The message is user-facing.
    #[error("{0}")]
    Precondition(String),

    /// The provider answered without producing anything.
    #[error("{0}")]
    EmptyResult(String),

    #[error("Invalid job parameters: {0}")]
    InvalidParameters(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn precondition(message: impl Into<String>) -> Self {
        PipelineError::Precondition(message.into())
    }
}
