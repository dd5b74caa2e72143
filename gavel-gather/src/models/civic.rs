//! Secondary civic entities referenced from Event records
//!
//! This core only creates the minimal stubs needed to satisfy an
//! Event's relations; full enrichment (terms, seats, contact details,
//! chair history) is an external collaborator's responsibility.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Collection, Entity};
use crate::types::{RawMatter, RawMinutesItem, RawPerson};

fn now_pair() -> (DateTime<Utc>, DateTime<Utc>) {
    let now = Utc::now();
    (now, now)
}

/// Governing body (council, committee, board)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Body {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Bodies rarely carry an upstream id; the name is the dedup key
    pub external_source_id: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Body {
    pub fn from_name(name: &str) -> Self {
        let (created, updated) = now_pair();
        Self {
            id: gavel_common::ids::generate(),
            name: name.to_string(),
            description: None,
            external_source_id: Some(name.to_string()),
            created,
            updated,
        }
    }
}

impl Entity for Body {
    const COLLECTION: Collection = Collection::Body;

    fn id(&self) -> &str {
        &self.id
    }

    fn external_source_id(&self) -> Option<&str> {
        self.external_source_id.as_deref()
    }
}

/// Person participating in events (votes, roles)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub external_source_id: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Person {
    pub fn from_raw(raw: &RawPerson) -> Self {
        let (created, updated) = now_pair();
        Self {
            id: gavel_common::ids::generate(),
            name: raw.name.clone(),
            email: raw.email.clone(),
            phone: raw.phone.clone(),
            website: raw.website.clone(),
            external_source_id: Some(stub_identity(raw.external_source_id.as_deref(), &raw.name)),
            created,
            updated,
        }
    }
}

impl Entity for Person {
    const COLLECTION: Collection = Collection::Person;

    fn id(&self) -> &str {
        &self.id
    }

    fn external_source_id(&self) -> Option<&str> {
        self.external_source_id.as_deref()
    }
}

/// Legislative matter (bill, resolution, appointment)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Matter {
    pub id: String,
    pub name: String,
    pub title: Option<String>,
    pub external_source_id: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Matter {
    pub fn from_raw(raw: &RawMatter) -> Self {
        let (created, updated) = now_pair();
        Self {
            id: gavel_common::ids::generate(),
            name: raw.name.clone(),
            title: raw.title.clone(),
            external_source_id: Some(stub_identity(raw.external_source_id.as_deref(), &raw.name)),
            created,
            updated,
        }
    }
}

impl Entity for Matter {
    const COLLECTION: Collection = Collection::Matter;

    fn id(&self) -> &str {
        &self.id
    }

    fn external_source_id(&self) -> Option<&str> {
        self.external_source_id.as_deref()
    }
}

/// Agenda/minutes entry; may or may not reference a Matter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinutesItem {
    pub id: String,
    pub name: String,
    pub matter_id: Option<String>,
    /// Position within the agenda, when the source records one
    pub index: Option<i64>,
    /// Body's decision on the item, when minutes record one
    pub decision: Option<String>,
    /// Attached document URIs (agenda packets, amendments)
    pub attachment_uris: Vec<String>,
    pub external_source_id: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl MinutesItem {
    pub fn from_raw(raw: &RawMinutesItem, matter_id: Option<String>) -> Self {
        let (created, updated) = now_pair();
        Self {
            id: gavel_common::ids::generate(),
            name: raw.name.clone(),
            matter_id,
            index: raw.index,
            decision: raw.decision.clone(),
            attachment_uris: raw.attachments.iter().map(|a| a.uri.clone()).collect(),
            external_source_id: Some(stub_identity(raw.external_source_id.as_deref(), &raw.name)),
            created,
            updated,
        }
    }
}

impl Entity for MinutesItem {
    const COLLECTION: Collection = Collection::MinutesItem;

    fn id(&self) -> &str {
        &self.id
    }

    fn external_source_id(&self) -> Option<&str> {
        self.external_source_id.as_deref()
    }
}

/// Classification of minutes items (enriched externally)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinutesItemType {
    pub id: String,
    pub name: String,
    pub created: DateTime<Utc>,
}

impl Entity for MinutesItemType {
    const COLLECTION: Collection = Collection::MinutesItemType;

    fn id(&self) -> &str {
        &self.id
    }
}

/// One person's recorded vote on a minutes item at an event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub id: String,
    pub person_id: String,
    pub minutes_item_id: String,
    pub event_id: String,
    pub decision: String,
    pub external_source_id: Option<String>,
    pub created: DateTime<Utc>,
}

impl Vote {
    pub fn new(
        person_id: String,
        minutes_item_id: String,
        event_id: String,
        decision: String,
        external_source_id: Option<String>,
    ) -> Self {
        // A vote without an upstream id is identified by what it is:
        // one person's decision on one item at one event.
        let fallback = format!("{}:{}:{}", event_id, minutes_item_id, person_id);
        Self {
            id: gavel_common::ids::generate(),
            person_id,
            minutes_item_id,
            event_id,
            decision,
            external_source_id: Some(external_source_id.unwrap_or(fallback)),
            created: Utc::now(),
        }
    }
}

impl Entity for Vote {
    const COLLECTION: Collection = Collection::Vote;

    fn id(&self) -> &str {
        &self.id
    }

    fn external_source_id(&self) -> Option<&str> {
        self.external_source_id.as_deref()
    }
}

/// A person's function on a body over a term (enriched externally)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub person_id: Option<String>,
    pub body_id: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Entity for Role {
    const COLLECTION: Collection = Collection::Role;

    fn id(&self) -> &str {
        &self.id
    }
}

/// An electoral position a person can hold (enriched externally)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub id: String,
    pub name: String,
    pub person_id: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Entity for Seat {
    const COLLECTION: Collection = Collection::Seat;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Dedup key for stubs: the upstream id when present, otherwise a
/// name-derived key (names are the only stable handle some feeds give)
fn stub_identity(external_source_id: Option<&str>, name: &str) -> String {
    match external_source_id {
        Some(id) => id.to_string(),
        None => format!("name:{}", name),
    }
}
