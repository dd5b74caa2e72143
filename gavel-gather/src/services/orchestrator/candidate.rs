//! Per-candidate state machine
//!
//! Each discovered descriptor advances through
//! DISCOVERED → IDENTITY_RESOLVED → {SKIPPED | MEDIA_PENDING} →
//! TRANSCRIBED → MERGED → DONE. Errors are caught at this boundary,
//! recorded against the candidate, and never propagate to siblings.

use std::collections::HashMap;

use thiserror::Error;

use super::Orchestrator;
use crate::models::{
    self, event, Body, CandidateOutcome, CandidateState, Event, Matter, MinutesItem, Person,
    Transcript, Vote,
};
use crate::services::file_staging::StageError;
use crate::services::format_resolver::{self, ResolvedTranscript};
use crate::types::{
    DatabaseError, MediaExtractionError, RawEventDescriptor, TranscriptionError,
};
use crate::utils::{retry_with_backoff, RetryPolicy};

/// Error that terminates a candidate's state machine
#[derive(Debug, Error)]
pub enum CandidateError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Media(#[from] MediaExtractionError),

    #[error(transparent)]
    Transcription(#[from] TranscriptionError),
}

/// Stub entities resolved against the store for one descriptor
struct StubGraph {
    body: Body,
    matters: Vec<Matter>,
    minutes_items: Vec<MinutesItem>,
    persons: Vec<Person>,
    /// (person_id, minutes_item_id, decision, upstream vote id)
    vote_seeds: Vec<(String, String, String, Option<String>)>,
}

fn transition(key: &str, state: &mut CandidateState, next: CandidateState) {
    debug_assert!(state.can_transition_to(next), "{} -> {}", state, next);
    tracing::debug!(key, from = %state, to = %next, "Candidate state transition");
    *state = next;
}

impl Orchestrator {
    /// Advance one candidate to a terminal state, converting every
    /// failure into a recorded outcome
    pub(crate) async fn process_candidate(
        &self,
        descriptor: RawEventDescriptor,
    ) -> CandidateOutcome {
        let key = event::identity_key(&descriptor);
        match self.advance_candidate(&key, &descriptor).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(key = %key, error = %err, "Candidate processing failed");
                CandidateOutcome::Failed {
                    key,
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn advance_candidate(
        &self,
        key: &str,
        descriptor: &RawEventDescriptor,
    ) -> Result<CandidateOutcome, CandidateError> {
        let mut state = CandidateState::Discovered;
        tracing::debug!(
            key,
            body = %descriptor.body,
            event_datetime = %descriptor.event_datetime,
            "Discovered candidate"
        );

        let stored = self.find_stored_event(key).await?;
        transition(key, &mut state, CandidateState::IdentityResolved);

        if let Some(stored_event) = &stored {
            if !self.options.backfill && !event::has_new_signal(stored_event, descriptor) {
                transition(key, &mut state, CandidateState::Skipped);
                tracing::info!(
                    key,
                    event_id = %stored_event.id,
                    "Skipping event, no new signal"
                );
                return Ok(CandidateOutcome::Skipped {
                    key: key.to_string(),
                });
            }
        }

        let graph = self.resolve_stub_graph(descriptor).await?;

        let mut candidate = Event::from_descriptor(descriptor, graph.body.id.clone());
        if let Some(stored_event) = &stored {
            candidate.id = stored_event.id.clone();
            candidate.created = stored_event.created;
        }
        candidate.matter_ids = graph.matters.iter().map(|m| m.id.clone()).collect();
        candidate.minutes_item_ids = graph.minutes_items.iter().map(|m| m.id.clone()).collect();
        candidate.person_ids = graph.persons.iter().map(|p| p.id.clone()).collect();

        // Media stage: only events with video are transcribed; quota
        // exhaustion downgrades the rest of the run to metadata-only
        let mut transcription: Option<ResolvedTranscript> = None;
        let mut media_failure: Option<String> = None;

        if let Some(video_uri) = descriptor.video_uri.clone() {
            if self.quota_is_exhausted() {
                tracing::debug!(key, "Transcription quota exhausted, merging metadata only");
            } else {
                transition(key, &mut state, CandidateState::MediaPending);
                match self.obtain_transcript(key, &video_uri, descriptor).await {
                    Ok(resolved) => {
                        transition(key, &mut state, CandidateState::Transcribed);
                        transcription = Some(resolved);
                    }
                    Err(CandidateError::Transcription(TranscriptionError::QuotaExceeded)) => {
                        self.mark_quota_exhausted();
                        tracing::warn!(
                            key,
                            "Transcription quota exceeded, halting transcription for this run"
                        );
                        media_failure = Some(TranscriptionError::QuotaExceeded.to_string());
                    }
                    Err(CandidateError::Media(err)) => {
                        tracing::warn!(key, error = %err, "Media extraction failed, skip-with-record");
                        media_failure = Some(err.to_string());
                    }
                    Err(CandidateError::Transcription(err)) => {
                        tracing::warn!(key, error = %err, "Transcription failed, merging metadata only");
                        media_failure = Some(err.to_string());
                    }
                    Err(CandidateError::Stage(err)) => {
                        tracing::warn!(key, error = %err, "Audio staging failed, merging metadata only");
                        media_failure = Some(err.to_string());
                    }
                    Err(err @ CandidateError::Database(_)) => return Err(err),
                }
            }
        }

        self.merge_candidate(key, &candidate, &graph, transcription.as_ref(), descriptor)
            .await?;
        transition(key, &mut state, CandidateState::Merged);
        transition(key, &mut state, CandidateState::Done);

        match media_failure {
            Some(reason) => Ok(CandidateOutcome::Failed {
                key: key.to_string(),
                reason,
            }),
            None => Ok(CandidateOutcome::Merged {
                key: key.to_string(),
            }),
        }
    }

    /// Resolve descriptor stubs against the store, reusing existing ids
    /// so relation lists union instead of growing duplicates
    async fn resolve_stub_graph(
        &self,
        descriptor: &RawEventDescriptor,
    ) -> Result<StubGraph, CandidateError> {
        let db = self.db();

        let mut body = Body::from_name(&descriptor.body);
        if let Some(existing) = models::find_entity_by_external_id::<Body>(
            db,
            body.external_source_id.as_deref().unwrap_or_default(),
        )
        .await?
        {
            body.id = existing.id;
            body.created = existing.created;
        }

        let mut matters = Vec::new();
        let mut minutes_items = Vec::new();
        let mut persons_by_key: HashMap<String, Person> = HashMap::new();
        let mut vote_seeds = Vec::new();

        for raw_item in &descriptor.minutes_items {
            let matter_id = match &raw_item.matter {
                Some(raw_matter) => {
                    let mut matter = Matter::from_raw(raw_matter);
                    if let Some(existing) = models::find_entity_by_external_id::<Matter>(
                        db,
                        matter.external_source_id.as_deref().unwrap_or_default(),
                    )
                    .await?
                    {
                        matter.id = existing.id;
                        matter.created = existing.created;
                    }
                    let id = matter.id.clone();
                    matters.push(matter);
                    Some(id)
                }
                None => None,
            };

            let mut item = MinutesItem::from_raw(raw_item, matter_id);
            if let Some(existing) = models::find_entity_by_external_id::<MinutesItem>(
                db,
                item.external_source_id.as_deref().unwrap_or_default(),
            )
            .await?
            {
                item.id = existing.id;
                item.created = existing.created;
            }

            for raw_vote in &raw_item.votes {
                let mut person = Person::from_raw(&raw_vote.person);
                let person_key = person
                    .external_source_id
                    .clone()
                    .unwrap_or_default();
                if let Some(known) = persons_by_key.get(&person_key) {
                    person = known.clone();
                } else {
                    if let Some(existing) =
                        models::find_entity_by_external_id::<Person>(db, &person_key).await?
                    {
                        person.id = existing.id;
                        person.created = existing.created;
                    }
                    persons_by_key.insert(person_key, person.clone());
                }

                vote_seeds.push((
                    person.id.clone(),
                    item.id.clone(),
                    raw_vote.decision.clone(),
                    raw_vote.external_source_id.clone(),
                ));
            }

            minutes_items.push(item);
        }

        Ok(StubGraph {
            body,
            matters,
            minutes_items,
            persons: persons_by_key.into_values().collect(),
            vote_seeds,
        })
    }

    /// Obtain the resolved transcript for a video-bearing candidate
    ///
    /// Tries the caption model first when the source published a
    /// caption track, then falls back to audio extraction plus the
    /// primary model.
    async fn obtain_transcript(
        &self,
        key: &str,
        video_uri: &str,
        descriptor: &RawEventDescriptor,
    ) -> Result<ResolvedTranscript, CandidateError> {
        let phrases: Vec<String> = descriptor
            .minutes_items
            .iter()
            .map(|item| item.name.clone())
            .collect();

        if let (Some(caption_uri), Some(caption_model)) =
            (&descriptor.caption_uri, &self.caption_model)
        {
            match caption_model.transcribe(caption_uri, &phrases).await {
                Ok(output) => {
                    if let Some(resolved) = format_resolver::resolve(&output.payloads) {
                        tracing::info!(key, caption_uri = %caption_uri, "Using caption transcript");
                        return Ok(resolved);
                    }
                    tracing::warn!(key, "Caption model produced no payloads, falling back");
                }
                Err(TranscriptionError::QuotaExceeded) => {
                    return Err(TranscriptionError::QuotaExceeded.into());
                }
                Err(err) => {
                    tracing::warn!(
                        key,
                        error = %err,
                        "Caption transcription failed, falling back to audio"
                    );
                }
            }
        }

        let artifact = retry_with_backoff(
            "audio split",
            RetryPolicy::new(self.options.media_retry_attempts),
            |_: &MediaExtractionError| true,
            || self.audio_splitter.split(video_uri),
        )
        .await?;

        let audio_file = self
            .staging
            .stage(
                &artifact.bytes,
                &format!("{}_audio.wav", key),
                Some(&artifact.content_type),
            )
            .await?;
        if !artifact.stdout_log.is_empty() {
            self.staging
                .stage(
                    &artifact.stdout_log,
                    &format!("{}_audio.out", key),
                    Some("text/plain"),
                )
                .await?;
        }
        if !artifact.stderr_log.is_empty() {
            self.staging
                .stage(
                    &artifact.stderr_log,
                    &format!("{}_audio.err", key),
                    Some("text/plain"),
                )
                .await?;
        }

        let output = retry_with_backoff(
            "transcription",
            RetryPolicy::new(self.options.transcription_retry_attempts),
            |err: &TranscriptionError| matches!(err, TranscriptionError::Retryable(_)),
            || self.sr_model.transcribe(&audio_file.uri, &phrases),
        )
        .await?;

        format_resolver::resolve(&output.payloads)
            .ok_or_else(|| {
                TranscriptionError::Retryable("model returned no transcript payloads".to_string())
                    .into()
            })
    }

    /// Upsert the candidate's entity graph as one logical unit
    ///
    /// Artifacts are staged before any dependent document is written, so
    /// a storage failure can never leave a dangling reference. The whole
    /// merge is retried on conflict or transient failure; every step is
    /// safely repeatable.
    async fn merge_candidate(
        &self,
        key: &str,
        candidate: &Event,
        graph: &StubGraph,
        transcription: Option<&ResolvedTranscript>,
        descriptor: &RawEventDescriptor,
    ) -> Result<(), CandidateError> {
        let thumbnail_bytes = match &descriptor.thumbnail_uri {
            Some(uri) => self.fetch_thumbnail(key, uri).await,
            None => None,
        };

        let policy = RetryPolicy::new(self.options.merge_retry_attempts);
        retry_with_backoff(
            "entity merge",
            policy,
            |err: &CandidateError| {
                matches!(
                    err,
                    CandidateError::Database(
                        DatabaseError::MergeConflict(_) | DatabaseError::Backend(_)
                    ) | CandidateError::Stage(_)
                )
            },
            || async {
                let db = self.db();

                let mut event = candidate.clone();

                if let Some((bytes, uri)) = &thumbnail_bytes {
                    let filename = uri.rsplit('/').next().unwrap_or("thumbnail");
                    let file = self
                        .staging
                        .stage(bytes, &format!("{}_{}", key, filename), None)
                        .await?;
                    event.thumbnail_file_ids = vec![file.id];
                }

                let canonical_file = match transcription {
                    Some(resolved) => {
                        let bytes = resolved.canonical.to_json_bytes().map_err(|e| {
                            DatabaseError::InvalidDocument(format!(
                                "transcript payload serialize failed: {}",
                                e
                            ))
                        })?;
                        let file = self
                            .staging
                            .stage(
                                &bytes,
                                &format!(
                                    "{}_{}_transcript.json",
                                    key,
                                    resolved.canonical.format
                                ),
                                Some("application/json"),
                            )
                            .await?;

                        // Keep the raw rendition alongside for consumers
                        // that do not understand timestamped formats
                        if resolved.raw.format != resolved.canonical.format {
                            let raw_bytes = resolved.raw.to_json_bytes().map_err(|e| {
                                DatabaseError::InvalidDocument(format!(
                                    "raw payload serialize failed: {}",
                                    e
                                ))
                            })?;
                            self.staging
                                .stage(
                                    &raw_bytes,
                                    &format!("{}_raw_transcript.json", key),
                                    Some("application/json"),
                                )
                                .await?;
                        }
                        Some(file)
                    }
                    None => None,
                };

                models::upsert_entity(db, &graph.body).await?;
                for matter in &graph.matters {
                    models::upsert_entity(db, matter).await?;
                }
                for item in &graph.minutes_items {
                    models::upsert_entity(db, item).await?;
                }
                for person in &graph.persons {
                    models::upsert_entity(db, person).await?;
                }
                for (person_id, minutes_item_id, decision, upstream_id) in &graph.vote_seeds {
                    let vote = Vote::new(
                        person_id.clone(),
                        minutes_item_id.clone(),
                        event.id.clone(),
                        decision.clone(),
                        upstream_id.clone(),
                    );
                    self.upsert_vote(vote).await?;
                }

                event.updated = chrono::Utc::now();
                models::upsert_entity(db, &event).await?;

                if let (Some(resolved), Some(file)) = (transcription, &canonical_file) {
                    self.upsert_transcript(key, &event.id, resolved, &file.id)
                        .await?;
                }

                Ok(())
            },
        )
        .await
    }

    /// Votes dedup by upstream id (or positional fallback), so a
    /// re-observed vote updates in place instead of inserting
    async fn upsert_vote(&self, vote: Vote) -> Result<(), CandidateError> {
        let db = self.db();
        let mut vote = vote;
        if let Some(existing) = models::find_entity_by_external_id::<Vote>(
            db,
            vote.external_source_id.as_deref().unwrap_or_default(),
        )
        .await?
        {
            vote.id = existing.id;
            vote.created = existing.created;
        }
        models::upsert_entity(db, &vote).await?;
        Ok(())
    }

    /// Create or supersede the event's single authoritative transcript,
    /// honoring format monotonicity
    async fn upsert_transcript(
        &self,
        key: &str,
        event_id: &str,
        resolved: &ResolvedTranscript,
        file_id: &str,
    ) -> Result<(), CandidateError> {
        let db = self.db();
        let candidate_format = resolved.canonical.format;

        match models::find_entity_by_external_id::<Transcript>(db, event_id).await? {
            None => {
                let transcript = Transcript::new(
                    event_id.to_string(),
                    file_id.to_string(),
                    candidate_format,
                    resolved.canonical.confidence,
                );
                models::upsert_entity(db, &transcript).await?;
                tracing::info!(
                    key,
                    event_id,
                    format = %candidate_format,
                    "Created canonical transcript"
                );
            }
            Some(mut existing) => {
                if format_resolver::should_replace(existing.format, candidate_format) {
                    tracing::info!(
                        key,
                        event_id,
                        old_format = %existing.format,
                        new_format = %candidate_format,
                        "Superseding transcript with higher-fidelity format"
                    );
                    existing.file_id = file_id.to_string();
                    existing.format = candidate_format;
                    existing.confidence = resolved.canonical.confidence;
                    models::upsert_entity(db, &existing).await?;
                } else {
                    tracing::debug!(
                        key,
                        event_id,
                        stored_format = %existing.format,
                        candidate_format = %candidate_format,
                        "Keeping stored transcript, candidate does not outrank it"
                    );
                }
            }
        }

        Ok(())
    }

    async fn fetch_thumbnail(&self, key: &str, uri: &str) -> Option<(Vec<u8>, String)> {
        if !uri.starts_with("http://") && !uri.starts_with("https://") {
            return None;
        }
        match self.http.get(uri).send().await {
            Ok(response) if response.status().is_success() => match response.bytes().await {
                Ok(bytes) => Some((bytes.to_vec(), uri.to_string())),
                Err(err) => {
                    tracing::warn!(key, uri, error = %err, "Thumbnail read failed");
                    None
                }
            },
            Ok(response) => {
                tracing::warn!(key, uri, status = %response.status(), "Thumbnail fetch refused");
                None
            }
            Err(err) => {
                tracing::warn!(key, uri, error = %err, "Thumbnail fetch failed");
                None
            }
        }
    }
}
