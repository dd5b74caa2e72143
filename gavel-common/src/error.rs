//! Shared error types for the gavel workspace

use thiserror::Error;

/// Result alias used across the gavel crates
pub type Result<T> = std::result::Result<T, Error>;

/// Failures shared by the pipeline crates: the reference document
/// store, local filesystem state, and configuration loading. Capability
/// modules carry their own error taxonomies at the contract boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// Document store backend failure
    #[error("Document store error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem failure while preparing local state
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file missing, unreadable, or invalid
    #[error("Configuration error: {0}")]
    Config(String),
}
