//! Opaque identifier helpers
//!
//! Every persisted entity is keyed by an opaque string id. Most entities
//! use a fresh UUIDv4; File records use their content digest instead.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Generate a new opaque entity id (UUIDv4, hyphenated lowercase)
pub fn generate() -> String {
    Uuid::new_v4().to_string()
}

/// Parse an id back into a UUID, for callers that need one
pub fn parse(s: &str) -> Result<Uuid, uuid::Error> {
    Uuid::parse_str(s)
}

/// SHA-256 digest of a byte sequence as a lowercase hex string.
///
/// Used both as the content-addressed File id and as the fallback
/// identity key for events whose source does not expose its own id.
pub fn content_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
