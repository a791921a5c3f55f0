//! Provider traits and request types.
//!
//! Calls are slow and unreliable. The pipeline imposes no timeout and no
//! retry; a provider error fails only the unit that made the call.

use async_trait::async_trait;

/// Errors from a generation provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("Provider API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    /// The response was well-formed but unusable.
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Failed to decode image payload: {0}")]
    Decode(#[from] base64::DecodeError),

    /// A reference image could not be read.
    #[error("Failed to read reference image {path}: {source}")]
    Reference {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A text-to-image request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    /// Reference images: local file paths or `http(s)` URLs, in priority order.
    pub reference_paths: Vec<String>,
    /// e.g. `16:9`, `3:4`.
    pub aspect_ratio: String,
    /// e.g. `1K`, `2K`, `4K`.
    pub resolution: String,
}

/// An instruction-driven edit of an existing image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEditRequest {
    pub prompt: String,
    /// Local path of the image being edited.
    pub base_image_path: String,
    pub reference_paths: Vec<String>,
    pub aspect_ratio: String,
    pub resolution: String,
}

/// Produces images.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Model identifier used for this provider.
    fn model(&self) -> &str;

    /// Generate one image. `Ok(None)` means the provider answered but
    /// produced nothing.
    async fn generate_image(&self, request: &ImageRequest) -> Result<Option<Vec<u8>>, ProviderError>;

    /// Edit an existing image. `Ok(None)` as for [`generate_image`](Self::generate_image).
    async fn edit_image(&self, request: &ImageEditRequest) -> Result<Option<Vec<u8>>, ProviderError>;
}

/// Produces text.
#[async_trait]
pub trait TextProvider: Send + Sync {
    fn model(&self) -> &str;

    async fn generate_text(&self, prompt: &str) -> Result<String, ProviderError>;
}
