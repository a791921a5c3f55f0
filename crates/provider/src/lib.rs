//! Generation providers.
//!
//! - [`ImageProvider`] / [`TextProvider`]: the seams the pipeline calls.
//! - [`OpenAiClient`]: HTTP client for OpenAI-compatible endpoints.
//! - [`ProviderCache`]: one client per model name, built on first use.

pub mod cache;
pub mod openai;
pub mod provider;

pub use cache::{ProviderCache, ProviderSettings};
pub use openai::OpenAiClient;
pub use provider::{ImageEditRequest, ImageProvider, ImageRequest, ProviderError, TextProvider};
