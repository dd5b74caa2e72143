//! On-disk content-addressed file store
//!
//! Reference FileStore module for local and development deployments.
//! Objects land under two-character fan-out directories derived from
//! their digest key, keeping any single directory small:
//! `<root>/ab/cd/abcd…`. Storing an existing key is a no-op.

use std::path::{Path, PathBuf};

use crate::types::{FileStore, StorageError};

pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn locate(&self, key: &str) -> PathBuf {
        if key.len() >= 4 {
            self.root.join(&key[0..2]).join(&key[2..4]).join(key)
        } else {
            self.root.join(key)
        }
    }

    fn uri_for(path: &Path) -> String {
        format!("file://{}", path.display())
    }
}

#[async_trait::async_trait]
impl FileStore for LocalFileStore {
    async fn store(
        &self,
        key: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<String, StorageError> {
        let path = self.locate(key);

        if tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StorageError(format!("stat {} failed: {}", path.display(), e)))?
        {
            tracing::debug!(key, "Object already stored, skipping write");
            return Ok(Self::uri_for(&path));
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError(format!("mkdir {} failed: {}", parent.display(), e)))?;
        }

        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StorageError(format!("write {} failed: {}", path.display(), e)))?;

        tracing::debug!(key, path = %path.display(), size_bytes = bytes.len(), "Stored object");
        Ok(Self::uri_for(&path))
    }

    async fn get_uri(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.locate(key);
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StorageError(format!("stat {} failed: {}", path.display(), e)))?;

        Ok(exists.then(|| Self::uri_for(&path)))
    }
}
