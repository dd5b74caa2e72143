//! Event entity and identity resolution

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Collection, Entity};
use crate::types::RawEventDescriptor;

/// One real occurrence of a governing body's session
///
/// Invariant: exactly one Event per real-world occurrence. Re-observing
/// the same source event updates the existing record; this core never
/// deletes events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub body_id: String,
    pub event_datetime: DateTime<Utc>,
    pub source_uri: String,
    /// Identity key cross-referencing the upstream system (its own id
    /// when exposed, otherwise a digest of the video/source URI)
    pub external_source_id: Option<String>,
    pub video_uri: Option<String>,
    pub caption_uri: Option<String>,
    pub agenda_uri: Option<String>,
    pub minutes_uri: Option<String>,
    pub thumbnail_file_ids: Vec<String>,
    /// Filled by downstream indexing, never by this core
    pub keyword_ids: Vec<String>,
    pub matter_ids: Vec<String>,
    pub minutes_item_ids: Vec<String>,
    pub person_ids: Vec<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Event {
    /// Build a fresh merge candidate from a scraped descriptor
    pub fn from_descriptor(descriptor: &RawEventDescriptor, body_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: gavel_common::ids::generate(),
            body_id,
            event_datetime: descriptor.event_datetime,
            source_uri: descriptor.source_uri.clone(),
            external_source_id: Some(identity_key(descriptor)),
            video_uri: descriptor.video_uri.clone(),
            caption_uri: descriptor.caption_uri.clone(),
            agenda_uri: descriptor.agenda_uri.clone(),
            minutes_uri: descriptor.minutes_uri.clone(),
            thumbnail_file_ids: Vec::new(),
            keyword_ids: Vec::new(),
            matter_ids: Vec::new(),
            minutes_item_ids: Vec::new(),
            person_ids: Vec::new(),
            created: now,
            updated: now,
        }
    }
}

impl Entity for Event {
    const COLLECTION: Collection = Collection::Event;

    fn id(&self) -> &str {
        &self.id
    }

    fn external_source_id(&self) -> Option<&str> {
        self.external_source_id.as_deref()
    }
}

/// Deduplication key for a descriptor
///
/// The upstream id when the source exposes one; otherwise the digest of
/// the video URI, then of the source URI. Stable across repeated scrapes
/// of the same event.
pub fn identity_key(descriptor: &RawEventDescriptor) -> String {
    if let Some(id) = &descriptor.external_source_id {
        return id.clone();
    }
    if let Some(video_uri) = &descriptor.video_uri {
        return gavel_common::ids::content_digest(video_uri.as_bytes());
    }
    gavel_common::ids::content_digest(descriptor.source_uri.as_bytes())
}

/// True when a re-observed descriptor carries anything worth
/// reprocessing: a video/agenda/minutes URI differing from the stored
/// event's. Unchanged or absent URIs are not a new signal.
pub fn has_new_signal(stored: &Event, descriptor: &RawEventDescriptor) -> bool {
    fn differs(incoming: &Option<String>, stored: &Option<String>) -> bool {
        matches!(incoming, Some(value) if stored.as_deref() != Some(value.as_str()))
    }

    differs(&descriptor.video_uri, &stored.video_uri)
        || differs(&descriptor.agenda_uri, &stored.agenda_uri)
        || differs(&descriptor.minutes_uri, &stored.minutes_uri)
}
