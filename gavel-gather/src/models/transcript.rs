//! Transcript entity and wire payload

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Collection, Entity};

/// Transcript representation, ordered by granularity and downstream
/// utility: `Raw < TimestampedWords < TimestampedSentences`
///
/// The derived ordering follows declaration order, which is what the
/// selection policy and the monotonicity guarantee rely on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum TranscriptFormat {
    /// One unit spanning the entire transcript; always derivable
    Raw,
    /// One unit per token
    TimestampedWords,
    /// One unit per sentence; enables speaker-turn and topic segmentation
    TimestampedSentences,
}

impl TranscriptFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptFormat::Raw => "raw",
            TranscriptFormat::TimestampedWords => "timestamped-words",
            TranscriptFormat::TimestampedSentences => "timestamped-sentences",
        }
    }

    /// Numeric rank used in logs and summaries
    pub fn rank(&self) -> u8 {
        *self as u8
    }
}

impl std::fmt::Display for TranscriptFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timed span of transcript text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptUnit {
    pub start_time: f64,
    pub text: String,
    pub end_time: f64,
}

/// Wire-level transcript payload consumed by downstream indexing
///
/// `{format, annotations, confidence, data}` — serialized verbatim as
/// the stored transcript artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptPayload {
    pub format: TranscriptFormat,
    #[serde(default)]
    pub annotations: Vec<serde_json::Value>,
    /// Overall confidence in `[0, 1]`
    pub confidence: f64,
    pub data: Vec<TranscriptUnit>,
}

impl TranscriptPayload {
    pub fn new(format: TranscriptFormat, confidence: f64, data: Vec<TranscriptUnit>) -> Self {
        Self {
            format,
            annotations: Vec::new(),
            confidence: confidence.clamp(0.0, 1.0),
            data,
        }
    }

    /// Serialize to the stored artifact bytes
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Full text, units joined in order
    pub fn full_text(&self) -> String {
        self.data
            .iter()
            .map(|u| u.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The single authoritative transcript record for an Event (1:1)
///
/// Stored with the owning `event_id` doubling as the document's
/// `external_source_id`, so the ordinary dedup index answers "the
/// transcript of event E". Superseded in place (same id) when a later
/// run yields a strictly higher-ranked format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub id: String,
    pub event_id: String,
    /// File record holding the serialized payload
    pub file_id: String,
    pub format: TranscriptFormat,
    pub confidence: f64,
    pub created: DateTime<Utc>,
}

impl Transcript {
    pub fn new(event_id: String, file_id: String, format: TranscriptFormat, confidence: f64) -> Self {
        Self {
            id: gavel_common::ids::generate(),
            event_id,
            file_id,
            format,
            confidence: confidence.clamp(0.0, 1.0),
            created: Utc::now(),
        }
    }
}

impl Entity for Transcript {
    const COLLECTION: Collection = Collection::Transcript;

    fn id(&self) -> &str {
        &self.id
    }

    fn external_source_id(&self) -> Option<&str> {
        Some(&self.event_id)
    }
}
