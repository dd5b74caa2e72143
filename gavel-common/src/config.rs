//! Configuration file resolution and loading
//!
//! Resolution priority for the pipeline configuration file:
//! 1. Explicit path handed in by the caller (highest priority)
//! 2. Environment variable
//! 3. Platform config directory (`<config dir>/gavel/<name>`)

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Resolve the configuration file path
pub fn resolve_config_path(
    explicit: Option<&str>,
    env_var_name: &str,
    default_file_name: &str,
) -> Result<PathBuf> {
    // Priority 1: explicit path
    if let Some(path) = explicit {
        return Ok(PathBuf::from(path));
    }

    // Priority 2: environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return Ok(PathBuf::from(path));
    }

    // Priority 3: platform config directory
    dirs::config_dir()
        .map(|d| d.join("gavel").join(default_file_name))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
}

/// Load and deserialize a TOML configuration file
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Get OS-dependent default data folder for gavel state (database, file store)
pub fn default_data_dir() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("gavel"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/gavel"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("gavel"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/gavel"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("gavel"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\gavel"))
    } else {
        PathBuf::from("./gavel_data")
    }
}
