//! Client for OpenAI-compatible text and image endpoints.
//!
//! - text: `POST {base}/chat/completions`
//! - images without references: `POST {base}/images/generations`
//! - images with references, and edits: multipart `POST {base}/images/edits`
//!
//! Image payloads come back as `b64_json` (or, for some compatible servers,
//! a download URL).

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::provider::{ImageEditRequest, ImageProvider, ImageRequest, ProviderError, TextProvider};

/// HTTP client bound to one model.
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
    url: Option<String>,
}

impl OpenAiClient {
    /// Create a client reusing an existing [`reqwest::Client`] for
    /// connection pooling.
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    async fn post_images_edit(
        &self,
        prompt: &str,
        images: &[String],
        aspect_ratio: &str,
        resolution: &str,
    ) -> Result<Option<Vec<u8>>, ProviderError> {
        let mut form = Form::new()
            .text("model", self.model.clone())
            .text("prompt", prompt.to_string())
            .text("size", image_size(aspect_ratio))
            .text("quality", image_quality(resolution))
            .text("n", "1");

        for (i, path) in images.iter().enumerate() {
            let bytes = self.load_reference(path).await?;
            let part = Part::bytes(bytes)
                .file_name(format!("image_{i}.png"))
                .mime_str("image/png")?;
            form = form.part("image[]", part);
        }

        tracing::debug!(model = %self.model, images = images.len(), "Submitting image edit request");
        let response = self
            .client
            .post(format!("{}/images/edits", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let parsed: ImageResponse = Self::parse_response(response).await?;
        self.extract_image(parsed).await
    }

    /// Read a reference image from disk, or download it if it is a URL.
    async fn load_reference(&self, path: &str) -> Result<Vec<u8>, ProviderError> {
        if path.starts_with("http://") || path.starts_with("https://") {
            let response = self.client.get(path).send().await?;
            let response = Self::ensure_success(response).await?;
            return Ok(response.bytes().await?.to_vec());
        }
        tokio::fs::read(path)
            .await
            .map_err(|source| ProviderError::Reference {
                path: path.to_string(),
                source,
            })
    }

    async fn extract_image(&self, response: ImageResponse) -> Result<Option<Vec<u8>>, ProviderError> {
        let Some(datum) = response.data.into_iter().next() else {
            return Ok(None);
        };
        if let Some(b64) = datum.b64_json.filter(|s| !s.is_empty()) {
            return Ok(Some(STANDARD.decode(b64)?));
        }
        if let Some(url) = datum.url.filter(|s| !s.is_empty()) {
            let response = self.client.get(&url).send().await?;
            let response = Self::ensure_success(response).await?;
            return Ok(Some(response.bytes().await?.to_vec()));
        }
        Ok(None)
    }

    // ---- private helpers ----

    /// Return the response unchanged on success, or an
    /// [`ProviderError::ApiError`] carrying the status and body.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl TextProvider for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });

        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "Submitting text request");
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let parsed: ChatResponse = Self::parse_response(response).await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("empty completion".to_string()))
    }
}

#[async_trait]
impl ImageProvider for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<Option<Vec<u8>>, ProviderError> {
        if !request.reference_paths.is_empty() {
            return self
                .post_images_edit(
                    &request.prompt,
                    &request.reference_paths,
                    &request.aspect_ratio,
                    &request.resolution,
                )
                .await;
        }

        let body = serde_json::json!({
            "model": self.model,
            "prompt": request.prompt,
            "size": image_size(&request.aspect_ratio),
            "quality": image_quality(&request.resolution),
            "n": 1,
        });

        tracing::debug!(model = %self.model, "Submitting image generation request");
        let response = self
            .client
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let parsed: ImageResponse = Self::parse_response(response).await?;
        self.extract_image(parsed).await
    }

    async fn edit_image(&self, request: &ImageEditRequest) -> Result<Option<Vec<u8>>, ProviderError> {
        let mut images = Vec::with_capacity(request.reference_paths.len() + 1);
        images.push(request.base_image_path.clone());
        images.extend(request.reference_paths.iter().cloned());
        self.post_images_edit(
            &request.prompt,
            &images,
            &request.aspect_ratio,
            &request.resolution,
        )
        .await
    }
}

/// Output size for an aspect ratio such as `16:9`. Landscape, portrait and
/// square map onto the three sizes the image endpoint accepts.
pub fn image_size(aspect_ratio: &str) -> &'static str {
    let parsed = aspect_ratio
        .split_once(':')
        .and_then(|(w, h)| Some((w.trim().parse::<f64>().ok()?, h.trim().parse::<f64>().ok()?)));
    match parsed {
        Some((w, h)) if w > h => "1536x1024",
        Some((w, h)) if w < h => "1024x1536",
        _ => "1024x1024",
    }
}

/// Quality tier for a resolution label such as `2K`.
pub fn image_quality(resolution: &str) -> &'static str {
    match resolution.trim().to_ascii_uppercase().as_str() {
        "1K" => "low",
        "2K" => "medium",
        "4K" => "high",
        _ => "auto",
    }
}
