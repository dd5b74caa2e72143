//! Content-addressable file staging
//!
//! Every binary artifact (audio, thumbnail, transcript payload) passes
//! through here before reaching a FileStore. The SHA-256 digest of the
//! bytes is the candidate File id; if the store already coordinates
//! that digest the upload is skipped entirely, which is what keeps
//! repeated runs from duplicating re-derived artifacts.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::{self, File};
use crate::types::{Database, DatabaseError, FileStore, StorageError};

const HASH_CHUNK_SIZE: usize = 1024 * 1024;

/// Staging failure
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Computes stable identifiers for artifacts and hands them to the
/// FileStore, short-circuiting on content already coordinated
pub struct FileStaging {
    database: Arc<dyn Database>,
    file_store: Arc<dyn FileStore>,
}

impl FileStaging {
    pub fn new(database: Arc<dyn Database>, file_store: Arc<dyn FileStore>) -> Self {
        Self {
            database,
            file_store,
        }
    }

    /// Stage an artifact, returning its coordination record
    ///
    /// Identical bytes always yield the identical File record; only the
    /// first staging uploads anything.
    pub async fn stage(
        &self,
        bytes: &[u8],
        filename: &str,
        content_type: Option<&str>,
    ) -> Result<File, StageError> {
        let digest = digest_bytes(bytes);

        if let Some(existing) =
            models::find_entity_by_id::<File>(self.database.as_ref(), &digest).await?
        {
            tracing::debug!(
                digest = %digest,
                filename,
                "Content already staged, skipping upload"
            );
            return Ok(existing);
        }

        let content_type = content_type
            .map(str::to_string)
            .or_else(|| infer::get(bytes).map(|kind| kind.mime_type().to_string()))
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let uri = self
            .file_store
            .store(&digest, bytes, &content_type)
            .await?;

        let record = File::new(digest.clone(), uri, filename.to_string(), content_type);
        let stored = models::upsert_entity(self.database.as_ref(), &record).await?;

        tracing::info!(
            digest = %digest,
            filename,
            uri = %stored.uri,
            size_bytes = bytes.len(),
            "Staged new artifact"
        );

        Ok(stored)
    }
}

/// SHA-256 over the bytes, fed in 1 MiB chunks, as a lowercase hex
/// string
pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    for chunk in bytes.chunks(HASH_CHUNK_SIZE) {
        hasher.update(chunk);
    }
    format!("{:x}", hasher.finalize())
}
