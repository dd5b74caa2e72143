//! Reference capability modules and their factories
//!
//! Local/dev implementations of the capability contracts plus the
//! config-name to constructor mapping. Hosted backends (cloud document
//! stores, paid transcription) live in external crates that implement
//! the same contracts; unknown module names are configuration errors.

pub mod feed_scraper;
pub mod ffmpeg_splitter;
pub mod local_file_store;
pub mod sqlite_store;
pub mod webvtt_captions;

pub use feed_scraper::FeedScraper;
pub use ffmpeg_splitter::FfmpegAudioSplitter;
pub use local_file_store::LocalFileStore;
pub use sqlite_store::SqliteDatabase;
pub use webvtt_captions::WebVttModel;

use std::sync::Arc;

use gavel_common::{Error, Result};

use crate::config::{
    DatabaseConfig, FileStoreConfig, ScraperConfig, SplitterConfig, SrModelConfig,
};
use crate::types::{AudioSplitter, Database, EventScraper, FileStore, SpeechRecognitionModel};

pub async fn build_database(config: &DatabaseConfig) -> Result<Arc<dyn Database>> {
    match config.module.as_str() {
        "sqlite" => {
            let path = config
                .path
                .clone()
                .unwrap_or_else(|| gavel_common::config::default_data_dir().join("gavel.db"));
            Ok(Arc::new(SqliteDatabase::connect(&path).await?))
        }
        other => Err(Error::Config(format!("Unknown database module: {}", other))),
    }
}

pub fn build_file_store(config: &FileStoreConfig) -> Result<Arc<dyn FileStore>> {
    match config.module.as_str() {
        "local" => {
            let root = config
                .root
                .clone()
                .unwrap_or_else(|| gavel_common::config::default_data_dir().join("file_store"));
            Ok(Arc::new(LocalFileStore::new(root)))
        }
        other => Err(Error::Config(format!(
            "Unknown file store module: {}",
            other
        ))),
    }
}

pub fn build_scraper(config: &ScraperConfig) -> Result<Arc<dyn EventScraper>> {
    match config.module.as_str() {
        "feed" => {
            let uri = config.uri.clone().ok_or_else(|| {
                Error::Config("Scraper module `feed` requires `uri`".to_string())
            })?;
            Ok(Arc::new(FeedScraper::new(uri)))
        }
        other => Err(Error::Config(format!("Unknown scraper module: {}", other))),
    }
}

pub fn build_audio_splitter(config: &SplitterConfig) -> Result<Arc<dyn AudioSplitter>> {
    match config.module.as_str() {
        "ffmpeg" => Ok(Arc::new(FfmpegAudioSplitter::new(
            config.ffmpeg_path.clone(),
            config.work_dir.clone(),
        ))),
        other => Err(Error::Config(format!(
            "Unknown audio splitter module: {}",
            other
        ))),
    }
}

pub fn build_sr_model(config: &SrModelConfig) -> Result<Arc<dyn SpeechRecognitionModel>> {
    match config.module.as_str() {
        "webvtt" => Ok(Arc::new(WebVttModel::new())),
        other => Err(Error::Config(format!(
            "Unknown speech recognition module: {}",
            other
        ))),
    }
}
