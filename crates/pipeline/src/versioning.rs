//! Versioned artifact commits.
//!
//! [`VersionedArtifactStore::commit`] turns generated bytes into the new
//! current version of a scope. Commits on the same scope key are serialized
//! in-process by [`KeyedLocks`]; the database insert is atomic on its own
//! (see `GenerationStore::insert_current_version`).

use std::collections::HashMap;
use std::sync::Arc;

use slidesmith_core::scope::ScopeKey;
use slidesmith_db::models::artifact_version::{
    ArtifactOwner, ArtifactSource, ArtifactVersion, NewArtifactVersion,
};
use slidesmith_db::GenerationStore;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::PipelineError;
use crate::storage::BlobStorage;

// ---------------------------------------------------------------------------
// KeyedLocks
// ---------------------------------------------------------------------------

/// One async mutex per string key, created on demand.
///
/// Entries nobody holds are dropped whenever a new key is inserted.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut locks = self.locks.lock().await;
            match locks.get(key) {
                Some(existing) => Arc::clone(existing),
                None => {
                    locks.retain(|_, lock| Arc::strong_count(lock) > 1);
                    let created = Arc::new(Mutex::new(()));
                    locks.insert(key.to_string(), Arc::clone(&created));
                    created
                }
            }
        };
        entry.lock_owned().await
    }

    /// Number of keys currently tracked.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

// ---------------------------------------------------------------------------
// VersionedArtifactStore
// ---------------------------------------------------------------------------

/// Provenance of a commit.
#[derive(Debug, Clone, Copy)]
pub struct CommitMeta {
    pub source: ArtifactSource,
    pub owner: ArtifactOwner,
}

impl CommitMeta {
    pub fn generated(owner: ArtifactOwner) -> Self {
        Self {
            source: ArtifactSource::Generated,
            owner,
        }
    }

    pub fn edited(owner: ArtifactOwner) -> Self {
        Self {
            source: ArtifactSource::Edited,
            owner,
        }
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedArtifact {
    pub artifact_path: String,
    pub version_number: i32,
}

/// Blob storage plus version rows, kept consistent with each other.
pub struct VersionedArtifactStore {
    store: Arc<dyn GenerationStore>,
    storage: Arc<dyn BlobStorage>,
    locks: Arc<KeyedLocks>,
}

impl VersionedArtifactStore {
    pub fn new(
        store: Arc<dyn GenerationStore>,
        storage: Arc<dyn BlobStorage>,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            store,
            storage,
            locks,
        }
    }

    /// Store `bytes` as the next current version of `scope`.
    ///
    /// 1. next = max(version) + 1 (1 for an empty scope)
    /// 2. write the blob; on failure nothing has changed
    /// 3. demote, insert and move the owner pointer in one store call
    /// 4. if that fails, delete the blob and report the store error
    pub async fn commit(
        &self,
        scope: &ScopeKey,
        bytes: &[u8],
        meta: CommitMeta,
    ) -> Result<CommittedArtifact, PipelineError> {
        let scope_key = scope.to_string();
        let _guard = self.locks.lock(&scope_key).await;

        let version_number = self.store.max_version(scope).await? + 1;
        let artifact_path = self.storage.store_blob(&scope.blob_dir(), bytes).await?;

        let input = NewArtifactVersion {
            scope: *scope,
            version_number,
            artifact_path: artifact_path.clone(),
            source: meta.source,
            owner: meta.owner,
        };

        if let Err(e) = self.store.insert_current_version(&input).await {
            if let Err(cleanup) = self.storage.delete_blob(&artifact_path).await {
                tracing::warn!(
                    scope_key = %scope_key,
                    path = %artifact_path,
                    error = %cleanup,
                    "Failed to remove blob after rejected version insert"
                );
            }
            return Err(e.into());
        }

        tracing::debug!(
            scope_key = %scope_key,
            version_number,
            path = %artifact_path,
            "Committed artifact version"
        );
        Ok(CommittedArtifact {
            artifact_path,
            version_number,
        })
    }

    /// All versions of a scope, newest first.
    pub async fn list_versions(&self, scope: &ScopeKey) -> Result<Vec<ArtifactVersion>, PipelineError> {
        Ok(self.store.list_versions(scope).await?)
    }

    pub async fn current(&self, scope: &ScopeKey) -> Result<Option<ArtifactVersion>, PipelineError> {
        Ok(self.store.find_current_version(scope).await?)
    }
}
