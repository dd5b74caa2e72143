//! Shared fixtures for pipeline integration tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::StreamExt;

use gavel_gather::models::{TranscriptFormat, TranscriptPayload, TranscriptUnit};
use gavel_gather::modules::{LocalFileStore, SqliteDatabase};
use gavel_gather::types::{
    AudioArtifact, AudioSplitter, DescriptorStream, EventScraper, MediaExtractionError,
    RawEventDescriptor, ScrapeError, SpeechRecognitionModel, TimeSpan, TranscriptionError,
    TranscriptionOutput,
};
use gavel_gather::{GatherDeps, GatherOptions, Orchestrator};

/// Scraper that replays a fixed descriptor list
pub struct ScriptedScraper {
    descriptors: Vec<RawEventDescriptor>,
}

impl ScriptedScraper {
    pub fn new(descriptors: Vec<RawEventDescriptor>) -> Self {
        Self { descriptors }
    }
}

#[async_trait::async_trait]
impl EventScraper for ScriptedScraper {
    async fn scrape(&self, _span: TimeSpan) -> Result<DescriptorStream<'_>, ScrapeError> {
        let items: Vec<Result<RawEventDescriptor, ScrapeError>> =
            self.descriptors.iter().cloned().map(Ok).collect();
        Ok(futures::stream::iter(items).boxed())
    }

    async fn scrape_single(
        &self,
        source_uri: &str,
        _backfill: bool,
    ) -> Result<RawEventDescriptor, ScrapeError> {
        self.descriptors
            .iter()
            .find(|d| d.source_uri == source_uri)
            .cloned()
            .ok_or_else(|| ScrapeError::SourceUnavailable(source_uri.to_string()))
    }
}

/// Splitter producing deterministic audio bytes per video URI
pub struct CountingSplitter {
    pub calls: AtomicUsize,
}

impl CountingSplitter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AudioSplitter for CountingSplitter {
    async fn split(&self, video_uri: &str) -> Result<AudioArtifact, MediaExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AudioArtifact {
            bytes: format!("audio::{}", video_uri).into_bytes(),
            content_type: "audio/wav".to_string(),
            stdout_log: b"frames=100".to_vec(),
            stderr_log: Vec::new(),
        })
    }
}

/// Model producing a fixed transcript format, optionally exhausting its
/// quota on the nth call
pub struct ScriptedSrModel {
    pub calls: AtomicUsize,
    format: TranscriptFormat,
    quota_on_call: Option<usize>,
}

impl ScriptedSrModel {
    pub fn producing(format: TranscriptFormat) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            format,
            quota_on_call: None,
        })
    }

    pub fn quota_on_call(format: TranscriptFormat, call: usize) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            format,
            quota_on_call: Some(call),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SpeechRecognitionModel for ScriptedSrModel {
    async fn transcribe(
        &self,
        _uri: &str,
        _phrases: &[String],
    ) -> Result<TranscriptionOutput, TranscriptionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.quota_on_call == Some(call) {
            return Err(TranscriptionError::QuotaExceeded);
        }

        Ok(TranscriptionOutput {
            payloads: vec![scripted_payload(self.format)],
        })
    }
}

/// Deterministic payload per format so identical work yields identical
/// artifact bytes
pub fn scripted_payload(format: TranscriptFormat) -> TranscriptPayload {
    let unit = |start: f64, text: &str, end: f64| TranscriptUnit {
        start_time: start,
        text: text.to_string(),
        end_time: end,
    };

    match format {
        TranscriptFormat::Raw => TranscriptPayload::new(
            format,
            0.8,
            vec![unit(0.0, "meeting called to order adjourned", 2.5)],
        ),
        TranscriptFormat::TimestampedWords => TranscriptPayload::new(
            format,
            0.85,
            vec![
                unit(0.0, "meeting", 0.5),
                unit(0.5, "called", 1.0),
                unit(1.0, "to", 1.2),
                unit(1.2, "order", 1.8),
            ],
        ),
        TranscriptFormat::TimestampedSentences => TranscriptPayload::new(
            format,
            0.9,
            vec![
                unit(0.0, "Meeting called to order.", 1.8),
                unit(1.8, "Adjourned.", 2.5),
            ],
        ),
    }
}

/// Descriptor fixture; `video` and `caption` default to none
pub fn descriptor(external_id: &str, video_uri: Option<&str>) -> RawEventDescriptor {
    serde_json::from_value(serde_json::json!({
        "body": "City Council",
        "event_datetime": "2019-06-06T17:00:00Z",
        "source_uri": format!("https://example.gov/events/{}", external_id),
        "external_source_id": external_id,
        "video_uri": video_uri,
    }))
    .unwrap()
}

/// Descriptor with one minutes item referencing a matter
pub fn descriptor_with_matter(
    external_id: &str,
    matter_name: &str,
    agenda_uri: &str,
) -> RawEventDescriptor {
    serde_json::from_value(serde_json::json!({
        "body": "City Council",
        "event_datetime": "2019-06-06T17:00:00Z",
        "source_uri": format!("https://example.gov/events/{}", external_id),
        "external_source_id": external_id,
        "agenda_uri": agenda_uri,
        "minutes_items": [
            {
                "name": format!("Consideration of {}", matter_name),
                "matter": {"name": matter_name},
                "votes": [
                    {"person": {"name": "M. Harrell"}, "decision": "Approve"}
                ]
            }
        ]
    }))
    .unwrap()
}

/// Everything a test needs to drive one pipeline over shared storage
pub struct TestPipeline {
    pub db: Arc<SqliteDatabase>,
    pub store_dir: tempfile::TempDir,
}

impl TestPipeline {
    pub async fn new() -> Self {
        Self {
            db: Arc::new(SqliteDatabase::connect_in_memory().await.unwrap()),
            store_dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Orchestrator over this pipeline's shared database and file store
    pub fn orchestrator(
        &self,
        descriptors: Vec<RawEventDescriptor>,
        splitter: Arc<CountingSplitter>,
        sr_model: Arc<ScriptedSrModel>,
    ) -> Orchestrator {
        self.orchestrator_with(descriptors, splitter, sr_model, None, GatherOptions::default())
    }

    pub fn orchestrator_with(
        &self,
        descriptors: Vec<RawEventDescriptor>,
        splitter: Arc<CountingSplitter>,
        sr_model: Arc<ScriptedSrModel>,
        caption_model: Option<Arc<dyn SpeechRecognitionModel>>,
        options: GatherOptions,
    ) -> Orchestrator {
        let deps = GatherDeps {
            scraper: Arc::new(ScriptedScraper::new(descriptors)),
            audio_splitter: splitter,
            sr_model,
            caption_model,
            file_store: Arc::new(LocalFileStore::new(self.store_dir.path().to_path_buf())),
            database: Arc::clone(&self.db) as Arc<dyn gavel_gather::types::Database>,
        };
        Orchestrator::new(deps, options)
    }

    /// Objects physically present in the file store
    pub fn stored_object_count(&self) -> usize {
        fn walk(dir: &std::path::Path, count: &mut usize) {
            let Ok(entries) = std::fs::read_dir(dir) else {
                return;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    walk(&path, count);
                } else {
                    *count += 1;
                }
            }
        }

        let mut count = 0;
        walk(self.store_dir.path(), &mut count);
        count
    }
}

/// Span covering all 2019 fixtures
pub fn test_span() -> TimeSpan {
    use chrono::TimeZone;
    TimeSpan::new(
        chrono::Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap(),
        chrono::Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
    )
}

/// Serial options make call-count assertions deterministic
pub fn serial_options() -> GatherOptions {
    GatherOptions {
        max_in_flight: 1,
        ..GatherOptions::default()
    }
}
