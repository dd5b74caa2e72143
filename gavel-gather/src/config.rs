//! Pipeline configuration
//!
//! One immutable TOML document selects the capability modules and their
//! credentials, plus run behavior (time span, backfill, parallelism,
//! retry budgets). The loaded value is handed to the orchestrator at
//! construction and never mutated.

use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use serde::Deserialize;

use crate::services::GatherOptions;
use crate::types::TimeSpan;
use crate::utils::RetryPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct GatherConfig {
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub audio_splitter: SplitterConfig,
    #[serde(default)]
    pub sr_model: SrModelConfig,
    /// Optional caption-track model tried before the audio path
    #[serde(default)]
    pub caption_model: Option<SrModelConfig>,
    #[serde(default)]
    pub file_store: FileStoreConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Reprocess events even when no new signal is observed
    #[serde(default)]
    pub backfill: bool,
    /// Gather window ending now
    #[serde(default = "default_time_span_days")]
    pub time_span_days: i64,
    /// Candidates processed concurrently
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    #[serde(default = "default_media_retry_attempts")]
    pub media_retry_attempts: u32,
    #[serde(default = "default_transcription_retry_attempts")]
    pub transcription_retry_attempts: u32,
    #[serde(default = "default_merge_retry_attempts")]
    pub merge_retry_attempts: u32,
    /// Stop launching new candidates after this many seconds
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    pub module: String,
    /// Feed location for the `feed` module
    #[serde(default)]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SplitterConfig {
    #[serde(default = "default_splitter_module")]
    pub module: String,
    #[serde(default)]
    pub ffmpeg_path: Option<String>,
    /// Scratch directory for downloaded video and extracted audio
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SrModelConfig {
    #[serde(default = "default_sr_module")]
    pub module: String,
    /// Credential for hosted transcription backends; the in-tree
    /// caption module needs none
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileStoreConfig {
    #[serde(default = "default_file_store_module")]
    pub module: String,
    #[serde(default)]
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_module")]
    pub module: String,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl GatherConfig {
    pub fn load(path: &Path) -> gavel_common::Result<Self> {
        gavel_common::config::load_toml(path)
    }

    /// Orchestrator options derived from this configuration
    pub fn options(&self) -> GatherOptions {
        GatherOptions {
            backfill: self.backfill,
            max_in_flight: self.max_in_flight,
            scrape_retry: RetryPolicy::default(),
            media_retry_attempts: self.media_retry_attempts,
            transcription_retry_attempts: self.transcription_retry_attempts,
            merge_retry_attempts: self.merge_retry_attempts,
        }
    }

    /// The configured gather window, ending now
    pub fn span_ending_now(&self) -> TimeSpan {
        let end = Utc::now();
        TimeSpan::new(end - Duration::days(self.time_span_days.max(1)), end)
    }
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            module: default_splitter_module(),
            ffmpeg_path: None,
            work_dir: None,
        }
    }
}

impl Default for SrModelConfig {
    fn default() -> Self {
        Self {
            module: default_sr_module(),
            api_key: None,
        }
    }
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            module: default_file_store_module(),
            root: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            module: default_database_module(),
            path: None,
        }
    }
}

fn default_time_span_days() -> i64 {
    7
}

fn default_max_in_flight() -> usize {
    4
}

fn default_media_retry_attempts() -> u32 {
    2
}

fn default_transcription_retry_attempts() -> u32 {
    3
}

fn default_merge_retry_attempts() -> u32 {
    3
}

fn default_splitter_module() -> String {
    "ffmpeg".to_string()
}

fn default_sr_module() -> String {
    "webvtt".to_string()
}

fn default_file_store_module() -> String {
    "local".to_string()
}

fn default_database_module() -> String {
    "sqlite".to_string()
}
