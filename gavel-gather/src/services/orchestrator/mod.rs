//! Gather pipeline orchestrator
//!
//! Drives one full gather cycle: discover candidate events, fetch or
//! derive media, transcribe, and merge the resulting entity graph into
//! the document store. Candidates are independent units of work
//! processed with bounded parallelism; one candidate's failure never
//! aborts the run.

mod candidate;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::models::{
    self, CandidateOutcome, Event, GatherRun, RunState, RunSummary,
};
use crate::services::file_staging::FileStaging;
use crate::types::{
    AudioSplitter, Database, EventScraper, FileStore, RawEventDescriptor, ScrapeError,
    SpeechRecognitionModel, TimeSpan,
};
use crate::utils::{retry_with_backoff, RetryPolicy};

/// Capability modules injected at construction
///
/// Any concrete module satisfying the contract is interchangeable; this
/// is the whole pluggability story — no inheritance, no global lookup.
pub struct GatherDeps {
    pub scraper: Arc<dyn EventScraper>,
    pub audio_splitter: Arc<dyn AudioSplitter>,
    pub sr_model: Arc<dyn SpeechRecognitionModel>,
    /// Optional caption-track model tried before the audio path
    pub caption_model: Option<Arc<dyn SpeechRecognitionModel>>,
    pub file_store: Arc<dyn FileStore>,
    pub database: Arc<dyn Database>,
}

/// Immutable run options
#[derive(Debug, Clone)]
pub struct GatherOptions {
    /// Reprocess events even when no new signal is observed
    pub backfill: bool,
    /// Candidates processed concurrently
    pub max_in_flight: usize,
    /// Scraper attempts before the run escalates
    pub scrape_retry: RetryPolicy,
    /// Media extraction attempts (retryable once, then skip-with-record)
    pub media_retry_attempts: u32,
    pub transcription_retry_attempts: u32,
    /// Whole-merge attempts; upsert is designed to be safely repeatable
    pub merge_retry_attempts: u32,
}

impl Default for GatherOptions {
    fn default() -> Self {
        Self {
            backfill: false,
            max_in_flight: 4,
            scrape_retry: RetryPolicy::new(3),
            media_retry_attempts: 2,
            transcription_retry_attempts: 3,
            merge_retry_attempts: 3,
        }
    }
}

/// Pipeline orchestrator
pub struct Orchestrator {
    scraper: Arc<dyn EventScraper>,
    audio_splitter: Arc<dyn AudioSplitter>,
    sr_model: Arc<dyn SpeechRecognitionModel>,
    caption_model: Option<Arc<dyn SpeechRecognitionModel>>,
    database: Arc<dyn Database>,
    staging: FileStaging,
    /// External resource copies (thumbnails)
    http: reqwest::Client,
    options: GatherOptions,
    /// Set once a model reports quota exhaustion; no further
    /// transcription attempts are made for the rest of the run
    quota_exhausted: AtomicBool,
}

impl Orchestrator {
    pub fn new(deps: GatherDeps, options: GatherOptions) -> Self {
        let staging = FileStaging::new(Arc::clone(&deps.database), Arc::clone(&deps.file_store));
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();

        Self {
            scraper: deps.scraper,
            audio_splitter: deps.audio_splitter,
            sr_model: deps.sr_model,
            caption_model: deps.caption_model,
            database: deps.database,
            staging,
            http,
            options,
            quota_exhausted: AtomicBool::new(false),
        }
    }

    /// Execute one full gather cycle over `span`
    ///
    /// Cancellation stops launching new candidates; in-flight candidates
    /// run to a terminal state. Returns the aggregate run summary, which
    /// is also persisted as a run document.
    pub async fn run(
        &self,
        span: TimeSpan,
        cancel_token: CancellationToken,
    ) -> anyhow::Result<RunSummary> {
        let mut run = GatherRun::new(span, self.options.backfill);
        models::upsert_entity(self.database.as_ref(), &run).await?;

        tracing::info!(
            run_id = %run.id,
            span_start = %span.start,
            span_end = %span.end,
            backfill = self.options.backfill,
            "Starting gather run"
        );

        let stream = match retry_with_backoff(
            "event scrape",
            self.options.scrape_retry,
            |_: &ScrapeError| true,
            || self.scraper.scrape(span),
        )
        .await
        {
            Ok(stream) => stream,
            Err(err) => {
                tracing::error!(run_id = %run.id, error = %err, "Event scrape failed, aborting run");
                run.transition_to(RunState::Failed);
                models::upsert_entity(self.database.as_ref(), &run).await?;
                return Err(err.into());
            }
        };

        let outcomes: Vec<CandidateOutcome> = stream
            .take_until(cancel_token.clone().cancelled_owned())
            .map(|item| self.dispatch(item))
            .buffer_unordered(self.options.max_in_flight.max(1))
            .collect()
            .await;

        for outcome in &outcomes {
            run.summary.record(outcome);
        }

        let final_state = if cancel_token.is_cancelled() {
            RunState::Cancelled
        } else {
            RunState::Completed
        };
        run.transition_to(final_state);
        models::upsert_entity(self.database.as_ref(), &run).await?;

        tracing::info!(
            run_id = %run.id,
            state = ?run.state,
            discovered = run.summary.discovered,
            skipped = run.summary.skipped,
            merged = run.summary.merged,
            failed = run.summary.failed,
            "Gather run finished"
        );
        for failure in &run.summary.failures {
            tracing::warn!(
                run_id = %run.id,
                key = %failure.key,
                reason = %failure.reason,
                "Candidate failed during run"
            );
        }

        Ok(run.summary)
    }

    /// Process one event identified by its source page, outside a
    /// scheduled run
    pub async fn process_single(&self, source_uri: &str) -> anyhow::Result<CandidateOutcome> {
        let descriptor = self
            .scraper
            .scrape_single(source_uri, self.options.backfill)
            .await?;
        Ok(self.process_candidate(descriptor).await)
    }

    /// Candidate with an existing Event record, by identity key
    pub(crate) async fn find_stored_event(
        &self,
        key: &str,
    ) -> Result<Option<Event>, crate::types::DatabaseError> {
        models::find_entity_by_external_id::<Event>(self.database.as_ref(), key).await
    }

    async fn dispatch(
        &self,
        item: Result<RawEventDescriptor, ScrapeError>,
    ) -> CandidateOutcome {
        match item {
            Ok(descriptor) => self.process_candidate(descriptor).await,
            Err(err) => {
                tracing::error!(error = %err, "Scraper yielded an unreadable descriptor");
                CandidateOutcome::Failed {
                    key: "scraper".to_string(),
                    reason: err.to_string(),
                }
            }
        }
    }

    pub(super) fn db(&self) -> &dyn Database {
        self.database.as_ref()
    }

    pub(super) fn quota_is_exhausted(&self) -> bool {
        self.quota_exhausted.load(Ordering::Relaxed)
    }

    pub(super) fn mark_quota_exhausted(&self) {
        self.quota_exhausted.store(true, Ordering::Relaxed);
    }
}
