//! Blob storage for generated artifacts.
//!
//! Paths handed out by [`BlobStorage::store_blob`] are relative to the
//! storage root, use `/` separators, and are what the database stores.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::PipelineError;

/// URL prefix under which stored blobs are served; references carrying it
/// are mapped back onto the storage root.
pub const FILES_URL_PREFIX: &str = "/files/";

/// Where generated bytes go.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Persist `bytes` under the directory `key` and return the relative path.
    async fn store_blob(&self, key: &str, bytes: &[u8]) -> Result<String, PipelineError>;

    /// Whether a stored path exists.
    async fn exists(&self, path: &str) -> bool;

    /// Remove a stored blob. Missing blobs are not an error.
    async fn delete_blob(&self, path: &str) -> Result<(), PipelineError>;

    /// Location a provider can read: stored paths become absolute file paths,
    /// `http(s)` URLs pass through. References outside the storage root are
    /// rejected.
    fn locate(&self, reference: &str) -> Result<String, PipelineError>;
}

/// [`BlobStorage`] on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalBlobStorage {
    root: PathBuf,
}

impl LocalBlobStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a relative stored path. Rejects paths that escape
    /// the root.
    fn resolve(&self, relative: &str) -> Result<PathBuf, PipelineError> {
        let relative = Path::new(relative.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || relative.as_os_str().is_empty() {
            return Err(PipelineError::Storage {
                path: relative.display().to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "path must be relative to the storage root",
                ),
            });
        }
        Ok(self.root.join(relative))
    }
}

/// File extension for an image payload, sniffed from its header.
pub fn extension_for(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Png) => "png",
        Ok(image::ImageFormat::Jpeg) => "jpg",
        Ok(image::ImageFormat::WebP) => "webp",
        _ => "bin",
    }
}

#[async_trait]
impl BlobStorage for LocalBlobStorage {
    async fn store_blob(&self, key: &str, bytes: &[u8]) -> Result<String, PipelineError> {
        let file_name = format!("{}.{}", Uuid::now_v7().simple(), extension_for(bytes));
        let relative = format!("{}/{file_name}", key.trim_matches('/'));
        let absolute = self.resolve(&relative)?;

        if let Some(parent) = absolute.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| PipelineError::Storage {
                    path: relative.clone(),
                    source,
                })?;
        }
        tokio::fs::write(&absolute, bytes)
            .await
            .map_err(|source| PipelineError::Storage {
                path: relative.clone(),
                source,
            })?;

        tracing::debug!(path = %relative, bytes = bytes.len(), "Stored blob");
        Ok(relative)
    }

    async fn exists(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok(absolute) => tokio::fs::try_exists(absolute).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn delete_blob(&self, path: &str) -> Result<(), PipelineError> {
        let absolute = self.resolve(path)?;
        match tokio::fs::remove_file(&absolute).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PipelineError::Storage {
                path: path.to_string(),
                source,
            }),
        }
    }

    fn locate(&self, reference: &str) -> Result<String, PipelineError> {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return Ok(reference.to_string());
        }
        let relative = reference.strip_prefix(FILES_URL_PREFIX).unwrap_or(reference);
        Ok(self.resolve(relative)?.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Smallest valid PNG header.
    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn sniffs_png_extension() {
        assert_eq!(extension_for(PNG_MAGIC), "png");
        assert_eq!(extension_for(b"not an image"), "bin");
    }

    #[tokio::test]
    async fn store_exists_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalBlobStorage::new(dir.path());

        let path = storage.store_blob("pages/7", PNG_MAGIC).await.unwrap();
        assert!(path.starts_with("pages/7/"));
        assert!(path.ends_with(".png"));
        assert!(storage.exists(&path).await);

        storage.delete_blob(&path).await.unwrap();
        assert!(!storage.exists(&path).await);
        // Deleting twice is fine.
        storage.delete_blob(&path).await.unwrap();
    }

    #[tokio::test]
    async fn two_blobs_in_one_scope_get_distinct_paths() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalBlobStorage::new(dir.path());
        let a = storage.store_blob("pages/1", b"a").await.unwrap();
        let b = storage.store_blob("pages/1", b"b").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn escaping_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalBlobStorage::new(dir.path());
        let err = storage.store_blob("../outside", b"x").await.unwrap_err();
        assert!(matches!(err, PipelineError::Storage { .. }));
        assert!(!storage.exists("../etc/passwd").await);
    }

    #[test]
    fn locate_maps_served_urls_onto_root() {
        let storage = LocalBlobStorage::new("/srv/uploads");
        assert_eq!(
            storage.locate("/files/projects/1/a.png").unwrap(),
            "/srv/uploads/projects/1/a.png"
        );
        assert_eq!(
            storage.locate("pages/2/b.png").unwrap(),
            "/srv/uploads/pages/2/b.png"
        );
        assert_eq!(
            storage.locate("https://cdn.example.com/c.png").unwrap(),
            "https://cdn.example.com/c.png"
        );
    }

    #[test]
    fn locate_rejects_references_outside_root() {
        let storage = LocalBlobStorage::new("/srv/uploads");
        for reference in [
            "../../etc/passwd",
            "/files/../secrets.env",
            "pages/../../../etc/shadow",
            "/files/",
        ] {
            assert!(
                matches!(storage.locate(reference), Err(PipelineError::Storage { .. })),
                "{reference} should be rejected"
            );
        }
    }
}
