//! Capability contracts for the gather pipeline
//!
//! Defines the behavioral contracts the orchestrator is composed from:
//! - **EventScraper** — raw event discovery for a time span
//! - **AudioSplitter** — video to audio extraction
//! - **SpeechRecognitionModel** — audio or caption to transcript
//! - **FileStore** — content-addressed artifact storage
//! - **Database** — document store with merge-on-upsert
//!
//! Any concrete module satisfying a contract is interchangeable; modules
//! are injected into the orchestrator at construction, never looked up
//! globally. All contracts are object-safe so they can be held as
//! `Arc<dyn Trait>` behind city-specific configuration.

use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::transcript::TranscriptPayload;
use crate::models::Collection;

// ============================================================================
// Common Types
// ============================================================================

/// Half-open time span `[start, end)` requested from a scraper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSpan {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// True when `instant` falls inside `[start, end)`
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

/// Raw event descriptor produced by an [`EventScraper`]
///
/// Carries enough upstream fields to seed an Event and the stub entities
/// it references. Absent fields deserialize as `None`/empty so city
/// feeds can omit what they do not have.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEventDescriptor {
    /// Governing body name (e.g. "City Council")
    pub body: String,
    /// When the session occurred or is scheduled
    pub event_datetime: DateTime<Utc>,
    /// Upstream page this descriptor was scraped from
    pub source_uri: String,
    /// Upstream system's own identifier, when it exposes one
    #[serde(default)]
    pub external_source_id: Option<String>,
    #[serde(default)]
    pub video_uri: Option<String>,
    /// Pre-existing caption track for the video, when the source has one
    #[serde(default)]
    pub caption_uri: Option<String>,
    #[serde(default)]
    pub agenda_uri: Option<String>,
    #[serde(default)]
    pub minutes_uri: Option<String>,
    #[serde(default)]
    pub thumbnail_uri: Option<String>,
    #[serde(default)]
    pub minutes_items: Vec<RawMinutesItem>,
}

/// Raw agenda/minutes entry nested in a descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMinutesItem {
    pub name: String,
    #[serde(default)]
    pub external_source_id: Option<String>,
    /// Position within the agenda
    #[serde(default)]
    pub index: Option<i64>,
    /// Body's decision on the item, when minutes record one
    #[serde(default)]
    pub decision: Option<String>,
    #[serde(default)]
    pub matter: Option<RawMatter>,
    #[serde(default)]
    pub votes: Vec<RawVote>,
    #[serde(default)]
    pub attachments: Vec<RawAttachment>,
}

/// Raw legislative matter (bill, resolution, appointment)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMatter {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub external_source_id: Option<String>,
}

/// Raw individual vote on a minutes item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawVote {
    pub person: RawPerson,
    pub decision: String,
    #[serde(default)]
    pub external_source_id: Option<String>,
}

/// Raw person reference carried by a vote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPerson {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub external_source_id: Option<String>,
}

/// Raw document attached to a minutes item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAttachment {
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub external_source_id: Option<String>,
}

/// Audio artifact produced by an [`AudioSplitter`]
///
/// The extraction tool's stdout/stderr ride along so the orchestrator
/// can persist them next to the audio for later debugging.
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub stdout_log: Vec<u8>,
    pub stderr_log: Vec<u8>,
}

/// Transcription result from a [`SpeechRecognitionModel`]
///
/// A model returns every representation it produced; the format resolver
/// decides which one becomes authoritative.
#[derive(Debug, Clone, Default)]
pub struct TranscriptionOutput {
    pub payloads: Vec<TranscriptPayload>,
}

/// Lazy, finite sequence of raw descriptors
pub type DescriptorStream<'a> = BoxStream<'a, Result<RawEventDescriptor, ScrapeError>>;

// ============================================================================
// Errors
// ============================================================================

/// Scraper failure modes, both retryable with backoff
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Upstream source could not be reached
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// Upstream page structure no longer matches expectations
    #[error("Source format changed: {0}")]
    SourceFormatChanged(String),
}

/// Audio extraction failure (retryable once, then skip-with-record)
#[derive(Debug, Error)]
#[error("Media extraction failed: {0}")]
pub struct MediaExtractionError(pub String);

/// Transcription failure modes
#[derive(Debug, Error)]
pub enum TranscriptionError {
    /// Transient backend failure, safe to retry
    #[error("Transcription failed: {0}")]
    Retryable(String),

    /// Quota exhausted, fatal for the remainder of the run
    #[error("Transcription quota exceeded")]
    QuotaExceeded,
}

/// File store failure (retryable; must never leave a dangling reference)
#[derive(Debug, Error)]
#[error("Storage error: {0}")]
pub struct StorageError(pub String);

/// Document store failure modes
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Backend-level failure (connection, query, lock timeout)
    #[error("Database backend error: {0}")]
    Backend(String),

    /// Concurrent-modification conflict; retry the upsert with
    /// freshly re-read state
    #[error("Concurrent modification conflict: {0}")]
    MergeConflict(String),

    /// Document is missing required fields or is not an object
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

// ============================================================================
// Capability Contracts
// ============================================================================

/// Event discovery contract
///
/// Produces a lazy, finite sequence of raw event descriptors for a
/// requested time span. City-specific scraping logic lives behind this
/// contract and is out of scope for the pipeline itself.
#[async_trait::async_trait]
pub trait EventScraper: Send + Sync {
    /// Descriptors for every event observed within `span`
    async fn scrape(&self, span: TimeSpan) -> Result<DescriptorStream<'_>, ScrapeError>;

    /// Descriptor for one event identified by its source page,
    /// used to reprocess an event a scheduled run mishandled
    async fn scrape_single(
        &self,
        source_uri: &str,
        backfill: bool,
    ) -> Result<RawEventDescriptor, ScrapeError>;
}

/// Audio extraction contract
#[async_trait::async_trait]
pub trait AudioSplitter: Send + Sync {
    /// Produce an audio artifact from a video resource
    async fn split(&self, video_uri: &str) -> Result<AudioArtifact, MediaExtractionError>;
}

/// Transcription contract
///
/// Implementations may transcribe audio or return a pre-existing
/// high-confidence transcript verbatim (e.g. a caption track).
#[async_trait::async_trait]
pub trait SpeechRecognitionModel: Send + Sync {
    /// Transcribe the resource at `uri`
    ///
    /// `phrases` are recognition hints (agenda item names) that backends
    /// may use to bias decoding; backends without hint support ignore
    /// them.
    async fn transcribe(
        &self,
        uri: &str,
        phrases: &[String],
    ) -> Result<TranscriptionOutput, TranscriptionError>;
}

/// Content-addressed object storage contract
///
/// Keys are content digests, so storing the same bytes twice must be a
/// no-op that returns the existing object's URI.
#[async_trait::async_trait]
pub trait FileStore: Send + Sync {
    /// Store `bytes` under `key`, returning the stored object's URI
    async fn store(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// URI for a previously stored key, or `None` when absent
    async fn get_uri(&self, key: &str) -> Result<Option<String>, StorageError>;
}

/// Document store contract
///
/// Collections of JSON documents keyed by an opaque `id` field.
/// `upsert` applies the canonical merge rules (last-write-wins per
/// field, union for list-valued relations) and must be safe under
/// concurrent writers to different ids while serializing writers to the
/// same id.
#[async_trait::async_trait]
pub trait Database: Send + Sync {
    async fn find_by_id(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Value>, DatabaseError>;

    /// Look up the single document cross-referencing an upstream id
    async fn find_by_external_id(
        &self,
        collection: Collection,
        external_id: &str,
    ) -> Result<Option<Value>, DatabaseError>;

    /// Merge `doc` into the collection, returning the merged document
    async fn upsert(&self, collection: Collection, doc: Value) -> Result<Value, DatabaseError>;

    /// Every document in a collection
    async fn select_rows_as_list(
        &self,
        collection: Collection,
    ) -> Result<Vec<Value>, DatabaseError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_time_span_is_half_open() {
        let start = Utc.with_ymd_and_hms(2019, 6, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2019, 6, 8, 0, 0, 0).unwrap();
        let span = TimeSpan::new(start, end);

        assert!(span.contains(start));
        assert!(span.contains(end - chrono::Duration::seconds(1)));
        assert!(!span.contains(end));
    }

    #[test]
    fn test_descriptor_minimal_json_deserializes() {
        let descriptor: RawEventDescriptor = serde_json::from_str(
            r#"{
                "body": "City Council",
                "event_datetime": "2019-06-06T17:00:00Z",
                "source_uri": "https://example.gov/events/4053"
            }"#,
        )
        .unwrap();

        assert_eq!(descriptor.body, "City Council");
        assert!(descriptor.video_uri.is_none());
        assert!(descriptor.minutes_items.is_empty());
    }
}
