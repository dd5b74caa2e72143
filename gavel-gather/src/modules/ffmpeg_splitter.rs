//! ffmpeg-backed audio splitter
//!
//! Shells out to `ffmpeg` to strip the audio track from a video into
//! 16 kHz mono PCM WAV, the rate speech-recognition backends expect.
//! Remote videos are copied to a scratch path first; all scratch files
//! are removed before returning. The tool's stdout/stderr ride along on
//! the artifact so the pipeline can persist them.

use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command;

use crate::types::{AudioArtifact, AudioSplitter, MediaExtractionError};

pub struct FfmpegAudioSplitter {
    ffmpeg_path: String,
    work_dir: PathBuf,
    http: reqwest::Client,
}

impl FfmpegAudioSplitter {
    pub fn new(ffmpeg_path: Option<String>, work_dir: Option<PathBuf>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .unwrap_or_default();

        Self {
            ffmpeg_path: ffmpeg_path.unwrap_or_else(|| "ffmpeg".to_string()),
            work_dir: work_dir.unwrap_or_else(std::env::temp_dir),
            http,
        }
    }

    /// Copy a remote video into the scratch directory
    async fn fetch_remote(
        &self,
        video_uri: &str,
        scratch_id: &str,
    ) -> Result<PathBuf, MediaExtractionError> {
        let response = self
            .http
            .get(video_uri)
            .send()
            .await
            .map_err(|e| MediaExtractionError(format!("video fetch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(MediaExtractionError(format!(
                "video fetch returned {} for {}",
                response.status(),
                video_uri
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| MediaExtractionError(format!("video read failed: {}", e)))?;

        let path = self.work_dir.join(format!(
            "tmp_{}_video.{}",
            scratch_id,
            uri_suffix(video_uri)
        ));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| MediaExtractionError(format!("scratch write failed: {}", e)))?;

        Ok(path)
    }
}

#[async_trait::async_trait]
impl AudioSplitter for FfmpegAudioSplitter {
    async fn split(&self, video_uri: &str) -> Result<AudioArtifact, MediaExtractionError> {
        let scratch_id = gavel_common::ids::generate();

        let (input_path, downloaded) = if is_remote(video_uri) {
            (self.fetch_remote(video_uri, &scratch_id).await?, true)
        } else {
            (local_input_path(video_uri), false)
        };

        let output_path = self.work_dir.join(format!("{}_audio.wav", scratch_id));

        tracing::debug!(video_uri, input = %input_path.display(), "Beginning audio separation");

        let result = Command::new(&self.ffmpeg_path)
            .arg("-i")
            .arg(&input_path)
            .args(["-f", "wav", "-acodec", "pcm_s16le", "-ac", "1", "-ar", "16000", "-y"])
            .arg(&output_path)
            .output()
            .await;

        if downloaded {
            remove_scratch(&input_path).await;
        }

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                return Err(MediaExtractionError(format!(
                    "failed to run {}: {}",
                    self.ffmpeg_path, err
                )));
            }
        };

        if !output.status.success() {
            remove_scratch(&output_path).await;
            let stderr_tail = String::from_utf8_lossy(&output.stderr)
                .lines()
                .rev()
                .take(4)
                .collect::<Vec<_>>()
                .join(" | ");
            return Err(MediaExtractionError(format!(
                "{} exited with {}: {}",
                self.ffmpeg_path, output.status, stderr_tail
            )));
        }

        let bytes = tokio::fs::read(&output_path)
            .await
            .map_err(|e| MediaExtractionError(format!("audio read failed: {}", e)))?;
        remove_scratch(&output_path).await;

        tracing::debug!(video_uri, audio_bytes = bytes.len(), "Completed audio separation");

        Ok(AudioArtifact {
            bytes,
            content_type: "audio/wav".to_string(),
            stdout_log: output.stdout,
            stderr_log: output.stderr,
        })
    }
}

fn is_remote(uri: &str) -> bool {
    uri.starts_with("http://") || uri.starts_with("https://")
}

/// Local path for a `file://` URI or plain path
fn local_input_path(uri: &str) -> PathBuf {
    PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri))
}

/// File suffix from a URI, defaulting to mp4 when none is recognizable
fn uri_suffix(uri: &str) -> String {
    uri.rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, suffix)| suffix)
        .filter(|suffix| !suffix.is_empty() && suffix.len() <= 4)
        .unwrap_or("mp4")
        .to_string()
}

async fn remove_scratch(path: &std::path::Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %err, "Failed to remove scratch file");
    }
}
