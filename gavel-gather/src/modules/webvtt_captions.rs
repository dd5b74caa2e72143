//! Caption-track speech recognition model
//!
//! Many municipal video providers publish WebVTT caption tracks for
//! their streams. When one exists it is already a high-confidence
//! transcript, so this model parses the cues into timestamped sentences
//! instead of paying for audio transcription. Cues are grouped into a
//! sentence whenever a cue's text ends with a sentence terminator;
//! trailing cues with no terminator flush as a final sentence.

use std::time::Duration;

use crate::models::transcript::{TranscriptFormat, TranscriptPayload, TranscriptUnit};
use crate::services::format_resolver;
use crate::types::{SpeechRecognitionModel, TranscriptionError, TranscriptionOutput};

/// Published captions are treated as ground truth
const CAPTION_CONFIDENCE: f64 = 1.0;

pub struct WebVttModel {
    http: reqwest::Client,
}

impl WebVttModel {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self { http }
    }

    async fn fetch(&self, uri: &str) -> Result<String, TranscriptionError> {
        if uri.starts_with("http://") || uri.starts_with("https://") {
            let response = self
                .http
                .get(uri)
                .send()
                .await
                .map_err(|e| TranscriptionError::Retryable(format!("caption fetch failed: {}", e)))?;

            if !response.status().is_success() {
                return Err(TranscriptionError::Retryable(format!(
                    "caption fetch returned {} for {}",
                    response.status(),
                    uri
                )));
            }

            response
                .text()
                .await
                .map_err(|e| TranscriptionError::Retryable(format!("caption read failed: {}", e)))
        } else {
            let path = uri.strip_prefix("file://").unwrap_or(uri);
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| TranscriptionError::Retryable(format!("caption read failed: {}", e)))
        }
    }
}

impl Default for WebVttModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SpeechRecognitionModel for WebVttModel {
    async fn transcribe(
        &self,
        uri: &str,
        _phrases: &[String],
    ) -> Result<TranscriptionOutput, TranscriptionError> {
        let content = self.fetch(uri).await?;
        let cues = parse_cues(&content).map_err(TranscriptionError::Retryable)?;
        let sentences = assemble_sentences(&cues);

        if sentences.is_empty() {
            return Err(TranscriptionError::Retryable(format!(
                "caption file at {} contained no cues",
                uri
            )));
        }

        let sentences_payload = TranscriptPayload::new(
            TranscriptFormat::TimestampedSentences,
            CAPTION_CONFIDENCE,
            sentences,
        );
        let raw_payload = format_resolver::synthesize_raw(&sentences_payload);

        tracing::info!(
            uri,
            sentences = sentences_payload.data.len(),
            "Parsed caption track into timestamped sentences"
        );

        Ok(TranscriptionOutput {
            payloads: vec![sentences_payload, raw_payload],
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Cue {
    start: f64,
    end: f64,
    text: String,
}

fn parse_cues(content: &str) -> Result<Vec<Cue>, String> {
    if !content.trim_start().starts_with("WEBVTT") {
        return Err("missing WEBVTT header".to_string());
    }

    let mut cues = Vec::new();
    let mut lines = content.lines().peekable();

    while let Some(line) = lines.next() {
        let Some((start_raw, end_raw)) = line.split_once("-->") else {
            continue;
        };

        // End timing may carry cue settings after the timestamp
        let start = parse_timestamp(start_raw.trim())?;
        let end_token = end_raw
            .trim()
            .split_whitespace()
            .next()
            .unwrap_or_default();
        let end = parse_timestamp(end_token)?;

        let mut text_lines = Vec::new();
        while let Some(text_line) = lines.peek() {
            if text_line.trim().is_empty() {
                break;
            }
            text_lines.push(lines.next().unwrap_or_default().trim().to_string());
        }

        if !text_lines.is_empty() {
            cues.push(Cue {
                start,
                end,
                text: text_lines.join(" "),
            });
        }
    }

    Ok(cues)
}

/// Parse `HH:MM:SS.mmm` or `MM:SS.mmm` into seconds
fn parse_timestamp(raw: &str) -> Result<f64, String> {
    let parts: Vec<&str> = raw.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (Some(*h), *m, *s),
        [m, s] => (None, *m, *s),
        _ => return Err(format!("unrecognizable timestamp: {}", raw)),
    };

    let hours: f64 = hours
        .map(|h| h.parse().map_err(|_| format!("bad hours in {}", raw)))
        .transpose()?
        .unwrap_or(0.0);
    let minutes: f64 = minutes
        .parse()
        .map_err(|_| format!("bad minutes in {}", raw))?;
    let seconds: f64 = seconds
        .parse()
        .map_err(|_| format!("bad seconds in {}", raw))?;

    Ok(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Group cues into sentences on terminating punctuation
fn assemble_sentences(cues: &[Cue]) -> Vec<TranscriptUnit> {
    let mut sentences = Vec::new();
    let mut pending: Vec<&str> = Vec::new();
    let mut sentence_start: Option<f64> = None;

    for cue in cues {
        sentence_start.get_or_insert(cue.start);
        pending.push(&cue.text);

        if ends_sentence(&cue.text) {
            sentences.push(TranscriptUnit {
                start_time: sentence_start.take().unwrap_or(cue.start),
                text: pending.join(" "),
                end_time: cue.end,
            });
            pending.clear();
        }
    }

    if !pending.is_empty() {
        if let Some(last) = cues.last() {
            sentences.push(TranscriptUnit {
                start_time: sentence_start.unwrap_or(last.start),
                text: pending.join(" "),
                end_time: last.end,
            });
        }
    }

    sentences
}

fn ends_sentence(text: &str) -> bool {
    matches!(text.trim_end().chars().last(), Some('.') | Some('?') | Some('!'))
}
