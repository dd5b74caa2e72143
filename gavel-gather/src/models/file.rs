//! File coordination record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Collection, Entity};

/// Links a content identifier to its storage URI
///
/// The id IS the SHA-256 digest of the content, so identical bytes map
/// to the same record and re-uploading is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    /// Content digest (lowercase hex SHA-256)
    pub id: String,
    pub uri: String,
    pub filename: String,
    pub content_type: String,
    pub created: DateTime<Utc>,
}

impl File {
    pub fn new(digest: String, uri: String, filename: String, content_type: String) -> Self {
        Self {
            id: digest,
            uri,
            filename,
            content_type,
            created: Utc::now(),
        }
    }
}

impl Entity for File {
    const COLLECTION: Collection = Collection::File;

    fn id(&self) -> &str {
        &self.id
    }
}
