//! Canonical document model
//!
//! Every persisted entity serializes to a JSON document keyed by an
//! opaque string id and lives in one of the named collections below.
//! The orchestrator builds these as transient merge candidates; the
//! Database owns all persisted state.

pub mod civic;
pub mod event;
pub mod file;
pub mod gather_run;
pub mod merge;
pub mod transcript;

pub use civic::{Body, Matter, MinutesItem, MinutesItemType, Person, Role, Seat, Vote};
pub use event::Event;
pub use file::File;
pub use gather_run::{
    CandidateFailure, CandidateOutcome, CandidateState, GatherRun, RunState, RunSummary,
};
pub use transcript::{Transcript, TranscriptFormat, TranscriptPayload, TranscriptUnit};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::types::{Database, DatabaseError};

/// Named document collections in the shared store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Event,
    Body,
    Person,
    Matter,
    MinutesItem,
    MinutesItemType,
    Vote,
    Role,
    Seat,
    File,
    Transcript,
    Run,
}

impl Collection {
    pub const ALL: [Collection; 12] = [
        Collection::Event,
        Collection::Body,
        Collection::Person,
        Collection::Matter,
        Collection::MinutesItem,
        Collection::MinutesItemType,
        Collection::Vote,
        Collection::Role,
        Collection::Seat,
        Collection::File,
        Collection::Transcript,
        Collection::Run,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Event => "event",
            Collection::Body => "body",
            Collection::Person => "person",
            Collection::Matter => "matter",
            Collection::MinutesItem => "minutes_item",
            Collection::MinutesItemType => "minutes_item_type",
            Collection::Vote => "vote",
            Collection::Role => "role",
            Collection::Seat => "seat",
            Collection::File => "file",
            Collection::Transcript => "transcript",
            Collection::Run => "run",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An entity that round-trips through a document collection
pub trait Entity: Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    fn id(&self) -> &str;

    /// Upstream cross-reference used for deduplication, when present
    fn external_source_id(&self) -> Option<&str> {
        None
    }

    fn to_doc(&self) -> Result<Value, DatabaseError> {
        serde_json::to_value(self)
            .map_err(|e| DatabaseError::InvalidDocument(format!("serialize failed: {}", e)))
    }

    fn from_doc(doc: &Value) -> Result<Self, DatabaseError> {
        serde_json::from_value(doc.clone())
            .map_err(|e| DatabaseError::InvalidDocument(format!("deserialize failed: {}", e)))
    }
}

/// Typed lookup by document id
pub async fn find_entity_by_id<E: Entity>(
    db: &dyn Database,
    id: &str,
) -> Result<Option<E>, DatabaseError> {
    match db.find_by_id(E::COLLECTION, id).await? {
        Some(doc) => Ok(Some(E::from_doc(&doc)?)),
        None => Ok(None),
    }
}

/// Typed lookup by upstream cross-reference
pub async fn find_entity_by_external_id<E: Entity>(
    db: &dyn Database,
    external_id: &str,
) -> Result<Option<E>, DatabaseError> {
    match db.find_by_external_id(E::COLLECTION, external_id).await? {
        Some(doc) => Ok(Some(E::from_doc(&doc)?)),
        None => Ok(None),
    }
}

/// Typed upsert returning the merged entity
pub async fn upsert_entity<E: Entity>(db: &dyn Database, entity: &E) -> Result<E, DatabaseError> {
    let merged = db.upsert(E::COLLECTION, entity.to_doc()?).await?;
    E::from_doc(&merged)
}
