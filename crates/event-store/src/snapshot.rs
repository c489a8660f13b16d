use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::{AggregateId, AggregateKey, Metadata, Version};

/// A snapshot of an aggregate's state at a specific version.
///
/// Snapshots are used to optimize aggregate reconstruction by providing
/// a starting point, avoiding the need to replay all events from the beginning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub aggregate_type: String,
    pub aggregate_id: AggregateId,

    /// The aggregate version this state reflects. Never ahead of the log.
    pub version: Version,

    /// The serialized aggregate state.
    pub data: Vec<u8>,

    #[serde(default)]
    pub metadata: Metadata,

    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    /// Creates a new snapshot.
    pub fn new(key: &AggregateKey, version: Version, data: impl Into<Vec<u8>>) -> Self {
        Self {
            aggregate_type: key.aggregate_type.clone(),
            aggregate_id: key.aggregate_id.clone(),
            version,
            data: data.into(),
            metadata: Metadata::new(),
            created_at: Utc::now().trunc_subsecs(6),
        }
    }

    /// Creates a snapshot from a serializable state.
    pub fn from_state<T: Serialize>(
        key: &AggregateKey,
        version: Version,
        state: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(key, version, serde_json::to_vec(state)?))
    }

    /// Adds a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Deserializes the snapshot state into a concrete type.
    pub fn to_state<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.data)
    }

    pub fn key(&self) -> AggregateKey {
        AggregateKey::new(self.aggregate_type.clone(), self.aggregate_id.clone())
    }
}
