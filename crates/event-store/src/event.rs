use std::collections::HashMap;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AggregateId, AggregateKey, Result, StoreError};

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Per-aggregate version: how many state transitions the aggregate has
/// undergone once this event is applied.
///
/// Versions start at 1 for the first event; 0 means "no events yet".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// The version of an aggregate with no events.
    pub fn initial() -> Self {
        Self(0)
    }

    /// The version carried by an aggregate's first event.
    pub fn first() -> Self {
        Self(1)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn previous(&self) -> Self {
        Self((self.0 - 1).max(0))
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Position of an event in the global log.
///
/// Sequences are assigned by the durable log at append time and are strictly
/// increasing across all aggregates. `Sequence(0)` means "not yet assigned"
/// and is also the natural starting bookmark for a consumer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Sequence(i64);

impl Sequence {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn unassigned() -> Self {
        Self(0)
    }

    pub fn is_assigned(&self) -> bool {
        self.0 > 0
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Sequence {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// String-keyed attribute map attached to events and snapshots.
///
/// The stores never interpret it; it is serialized to JSON at the storage
/// boundary and handed back unchanged.
pub type Metadata = HashMap<String, serde_json::Value>;

/// An immutable fact recorded against an aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub aggregate_type: String,
    pub aggregate_id: AggregateId,
    pub event_type: String,
    pub version: Version,

    /// Assigned by the log on append; any value set by the caller is ignored.
    #[serde(default)]
    pub sequence: Sequence,

    /// Opaque payload bytes.
    pub data: Vec<u8>,

    #[serde(default)]
    pub metadata: Metadata,

    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn builder() -> EventBuilder {
        EventBuilder::default()
    }

    /// Returns the `(aggregate_type, aggregate_id)` pair this event belongs to.
    pub fn key(&self) -> AggregateKey {
        AggregateKey::new(self.aggregate_type.clone(), self.aggregate_id.clone())
    }

    /// Returns true if the event belongs to the given aggregate.
    pub fn belongs_to(&self, key: &AggregateKey) -> bool {
        self.aggregate_type == key.aggregate_type && self.aggregate_id == key.aggregate_id
    }
}

/// Builder for [`Event`].
#[derive(Debug, Default)]
pub struct EventBuilder {
    id: Option<EventId>,
    aggregate_type: Option<String>,
    aggregate_id: Option<AggregateId>,
    event_type: Option<String>,
    version: Option<Version>,
    data: Vec<u8>,
    metadata: Metadata,
    created_at: Option<DateTime<Utc>>,
}

impl EventBuilder {
    /// Sets the event ID. If not set, a new ID will be generated.
    pub fn id(mut self, id: EventId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    pub fn aggregate_id(mut self, aggregate_id: impl Into<AggregateId>) -> Self {
        self.aggregate_id = Some(aggregate_id.into());
        self
    }

    /// Sets both halves of the aggregate identity.
    pub fn aggregate(self, key: &AggregateKey) -> Self {
        self.aggregate_type(key.aggregate_type.clone())
            .aggregate_id(key.aggregate_id.clone())
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Sets the raw payload bytes.
    pub fn data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }

    /// Sets the payload to the JSON encoding of `value`.
    pub fn json_data<T: Serialize>(mut self, value: &T) -> std::result::Result<Self, serde_json::Error> {
        self.data = serde_json::to_vec(value)?;
        Ok(self)
    }

    /// Adds a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Sets the creation timestamp. If not set, the current time will be used.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Builds the event, failing if a required field is missing or empty.
    pub fn build(self) -> Result<Event> {
        let aggregate_type = self
            .aggregate_type
            .filter(|t| !t.is_empty())
            .ok_or_else(|| StoreError::Validation("aggregate_type is required".into()))?;
        let aggregate_id = self
            .aggregate_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| StoreError::Validation("aggregate_id is required".into()))?;
        let event_type = self
            .event_type
            .filter(|t| !t.is_empty())
            .ok_or_else(|| StoreError::Validation("event_type is required".into()))?;
        let version = self
            .version
            .filter(|v| *v >= Version::first())
            .ok_or_else(|| StoreError::Validation("version must be at least 1".into()))?;

        Ok(Event {
            id: self.id.unwrap_or_default(),
            aggregate_type,
            aggregate_id,
            event_type,
            version,
            sequence: Sequence::unassigned(),
            data: self.data,
            metadata: self.metadata,
            // Postgres keeps microseconds; truncate so cached and stored copies compare equal.
            created_at: self
                .created_at
                .unwrap_or_else(Utc::now)
                .trunc_subsecs(6),
        })
    }
}
