//! Pipeline services
//!
//! - `format_resolver` — selects the authoritative transcript format
//! - `file_staging` — content-addressed artifact staging
//! - `orchestrator` — drives one full gather cycle

pub mod file_staging;
pub mod format_resolver;
pub mod orchestrator;

pub use file_staging::{FileStaging, StageError};
pub use orchestrator::{GatherDeps, GatherOptions, Orchestrator};
