//! Gather run state machine and summary
//!
//! A run progresses each discovered candidate through:
//! DISCOVERED → IDENTITY_RESOLVED → {SKIPPED | MEDIA_PENDING} →
//! TRANSCRIBED → MERGED → DONE, with FAILED reachable from any
//! non-terminal state. The run itself is persisted as a document so
//! operators can audit what each invocation did.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Collection, Entity};
use crate::types::TimeSpan;

/// Per-candidate processing state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateState {
    /// Descriptor received from the scraper
    Discovered,
    /// Looked up against the store by identity key
    IdentityResolved,
    /// Already stored with no new signal (terminal success)
    Skipped,
    /// New or updated source data with media to process
    MediaPending,
    /// Canonical transcript representation obtained
    Transcribed,
    /// Entity graph upserted into the store
    Merged,
    /// Terminal success
    Done,
    /// Terminal failure, reason recorded against the candidate
    Failed,
}

impl CandidateState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CandidateState::Skipped
                | CandidateState::Done
                | CandidateState::Failed
        )
    }

    /// Legal forward transitions of the candidate state machine
    pub fn can_transition_to(&self, next: CandidateState) -> bool {
        use CandidateState::*;
        match (self, next) {
            (_, Failed) => !self.is_terminal(),
            (Discovered, IdentityResolved) => true,
            (IdentityResolved, Skipped) => true,
            (IdentityResolved, MediaPending) => true,
            // Events without media merge straight from identity resolution
            (IdentityResolved, Merged) => true,
            // Bounded retry re-enters the media stage
            (MediaPending, MediaPending) => true,
            (MediaPending, Transcribed) => true,
            // Quota exhaustion downgrades to a metadata-only merge
            (MediaPending, Merged) => true,
            (Transcribed, Merged) => true,
            (Merged, Done) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for CandidateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CandidateState::Discovered => "DISCOVERED",
            CandidateState::IdentityResolved => "IDENTITY_RESOLVED",
            CandidateState::Skipped => "SKIPPED",
            CandidateState::MediaPending => "MEDIA_PENDING",
            CandidateState::Transcribed => "TRANSCRIBED",
            CandidateState::Merged => "MERGED",
            CandidateState::Done => "DONE",
            CandidateState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Terminal outcome of one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOutcome {
    Skipped { key: String },
    Merged { key: String },
    Failed { key: String, reason: String },
}

impl CandidateOutcome {
    pub fn key(&self) -> &str {
        match self {
            CandidateOutcome::Skipped { key }
            | CandidateOutcome::Merged { key }
            | CandidateOutcome::Failed { key, .. } => key,
        }
    }
}

/// One recorded candidate failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFailure {
    /// Candidate identity key
    pub key: String,
    pub reason: String,
}

/// Aggregate result of one pipeline invocation — the user-visible
/// outcome of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub discovered: usize,
    pub skipped: usize,
    pub merged: usize,
    pub failed: usize,
    pub failures: Vec<CandidateFailure>,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &CandidateOutcome) {
        self.discovered += 1;
        match outcome {
            CandidateOutcome::Skipped { .. } => self.skipped += 1,
            CandidateOutcome::Merged { .. } => self.merged += 1,
            CandidateOutcome::Failed { key, reason } => {
                self.failed += 1;
                self.failures.push(CandidateFailure {
                    key: key.clone(),
                    reason: reason.clone(),
                });
            }
        }
    }
}

/// Run-level state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Persisted gather run session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatherRun {
    pub id: String,
    pub state: RunState,
    pub span_start: DateTime<Utc>,
    pub span_end: DateTime<Utc>,
    pub backfill: bool,
    pub summary: RunSummary,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl GatherRun {
    pub fn new(span: TimeSpan, backfill: bool) -> Self {
        Self {
            id: gavel_common::ids::generate(),
            state: RunState::Running,
            span_start: span.start,
            span_end: span.end,
            backfill,
            summary: RunSummary::default(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to a new run state, stamping the end time on
    /// terminal states
    pub fn transition_to(&mut self, new_state: RunState) {
        self.state = new_state;
        match new_state {
            RunState::Completed | RunState::Cancelled | RunState::Failed => {
                self.ended_at = Some(Utc::now());
            }
            RunState::Running => {}
        }
    }
}

impl Entity for GatherRun {
    const COLLECTION: Collection = Collection::Run;

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(CandidateState::Skipped.is_terminal());
        assert!(CandidateState::Done.is_terminal());
        assert!(CandidateState::Failed.is_terminal());
        assert!(!CandidateState::MediaPending.is_terminal());
    }

    #[test]
    fn test_failure_reachable_from_any_non_terminal_state() {
        for state in [
            CandidateState::Discovered,
            CandidateState::IdentityResolved,
            CandidateState::MediaPending,
            CandidateState::Transcribed,
            CandidateState::Merged,
        ] {
            assert!(state.can_transition_to(CandidateState::Failed), "{}", state);
        }
        assert!(!CandidateState::Skipped.can_transition_to(CandidateState::Failed));
    }

    #[test]
    fn test_no_video_path_skips_media_stage() {
        assert!(CandidateState::IdentityResolved.can_transition_to(CandidateState::Merged));
        assert!(!CandidateState::Discovered.can_transition_to(CandidateState::Merged));
    }

    #[test]
    fn test_media_retry_reenters_media_pending() {
        assert!(CandidateState::MediaPending.can_transition_to(CandidateState::MediaPending));
    }

    #[test]
    fn test_summary_tallies_outcomes() {
        let mut summary = RunSummary::default();
        summary.record(&CandidateOutcome::Skipped { key: "a".into() });
        summary.record(&CandidateOutcome::Merged { key: "b".into() });
        summary.record(&CandidateOutcome::Failed {
            key: "c".into(),
            reason: "Transcription quota exceeded".into(),
        });

        assert_eq!(summary.discovered, 3);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.merged, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures[0].key, "c");
    }

    #[test]
    fn test_run_transition_stamps_end_time() {
        let span = TimeSpan::new(Utc::now() - chrono::Duration::days(7), Utc::now());
        let mut run = GatherRun::new(span, false);
        assert!(run.ended_at.is_none());

        run.transition_to(RunState::Completed);
        assert!(run.ended_at.is_some());
    }
}
