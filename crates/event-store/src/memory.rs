use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    AggregateKey, Event, Projection, Result, Sequence, Snapshot, StoreError, Version,
    store::{
        EventLog, ProjectionStore, SnapshotStore, validate_events_for_append, validate_key,
    },
};

#[derive(Default)]
struct Log {
    events: Vec<Event>,
    last_sequence: i64,
}

impl Log {
    fn head_version(&self, key: &AggregateKey) -> Version {
        self.events
            .iter()
            .filter(|e| e.belongs_to(key))
            .map(|e| e.version)
            .max()
            .unwrap_or(Version::initial())
    }
}

/// In-memory implementation of every store trait, for testing.
///
/// This implementation keeps everything in memory and follows the same
/// contracts as the PostgreSQL implementation: sequences are assigned under
/// the same write lock that inserts, batches are validated in full before
/// anything is written, and snapshots/projections follow the same upsert
/// rules. Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    log: Arc<RwLock<Log>>,
    snapshots: Arc<RwLock<HashMap<AggregateKey, Snapshot>>>,
    projections: Arc<RwLock<HashMap<Uuid, Projection>>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.log.read().await.events.len()
    }

    /// Clears all events, snapshots and projections. Sequences keep counting.
    pub async fn clear(&self) {
        self.log.write().await.events.clear();
        self.snapshots.write().await.clear();
        self.projections.write().await.clear();
    }
}

#[async_trait]
impl EventLog for InMemoryEventStore {
    async fn append(&self, events: Vec<Event>) -> Result<()> {
        let first_versions = validate_events_for_append(&events)?;

        let mut log = self.log.write().await;

        for (key, first) in &first_versions {
            let actual = log.head_version(key);
            if actual.next() != *first {
                return Err(StoreError::ConcurrencyConflict {
                    aggregate: key.clone(),
                    expected: first.previous(),
                    actual,
                });
            }
        }
        if let Some(existing) = events
            .iter()
            .find(|new| log.events.iter().any(|e| e.id == new.id))
        {
            return Err(StoreError::DuplicateEvent(existing.id));
        }

        // Everything checked; from here on the batch cannot fail halfway.
        for mut event in events {
            log.last_sequence += 1;
            event.sequence = Sequence::new(log.last_sequence);
            log.events.push(event);
        }

        Ok(())
    }

    async fn get_by_aggregate(&self, key: &AggregateKey) -> Result<Vec<Event>> {
        validate_key(key)?;
        let log = self.log.read().await;
        Ok(log
            .events
            .iter()
            .filter(|e| e.belongs_to(key))
            .cloned()
            .collect())
    }

    async fn get_by_aggregate_from_version(
        &self,
        key: &AggregateKey,
        from_version: Version,
    ) -> Result<Vec<Event>> {
        validate_key(key)?;
        let log = self.log.read().await;
        Ok(log
            .events
            .iter()
            .filter(|e| e.belongs_to(key) && e.version >= from_version)
            .cloned()
            .collect())
    }

    async fn get_by_type(&self, event_type: &str) -> Result<Vec<Event>> {
        let log = self.log.read().await;
        Ok(log
            .events
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect())
    }

    async fn get_after(&self, sequence: Sequence) -> Result<Vec<Event>> {
        let log = self.log.read().await;
        Ok(log
            .events
            .iter()
            .filter(|e| e.sequence > sequence)
            .cloned()
            .collect())
    }

    async fn get_aggregate_version(&self, key: &AggregateKey) -> Result<Option<Version>> {
        validate_key(key)?;
        let log = self.log.read().await;
        Ok(log
            .events
            .iter()
            .filter(|e| e.belongs_to(key))
            .map(|e| e.version)
            .max())
    }
}

#[async_trait]
impl SnapshotStore for InMemoryEventStore {
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        let key = snapshot.key();
        validate_key(&key)?;
        if snapshot.version < Version::first() {
            return Err(StoreError::Validation(
                "snapshot version must be at least 1".to_string(),
            ));
        }

        let head = self.log.read().await.head_version(&key);
        if snapshot.version > head {
            return Err(StoreError::Validation(format!(
                "snapshot version {} is ahead of aggregate {key} at version {head}",
                snapshot.version
            )));
        }

        let mut snapshots = self.snapshots.write().await;
        match snapshots.get(&key) {
            Some(stored) if stored.version > snapshot.version => {
                tracing::debug!(aggregate = %key, "ignoring snapshot older than the stored one");
            }
            _ => {
                snapshots.insert(key, snapshot);
            }
        }
        Ok(())
    }

    async fn find_latest_snapshot(&self, key: &AggregateKey) -> Result<Option<Snapshot>> {
        validate_key(key)?;
        Ok(self.snapshots.read().await.get(key).cloned())
    }
}

#[async_trait]
impl ProjectionStore for InMemoryEventStore {
    async fn save_projection(&self, projection: &Projection) -> Result<()> {
        if projection.projection_type.is_empty() {
            return Err(StoreError::Validation(
                "projection type must not be empty".to_string(),
            ));
        }

        let mut projections = self.projections.write().await;
        if let Some(stored) = projections.get(&projection.id)
            && stored.last_processed_sequence > projection.last_processed_sequence
        {
            return Err(StoreError::CheckpointRegression {
                projection_type: stored.projection_type.clone(),
                current: stored.last_processed_sequence,
                attempted: projection.last_processed_sequence,
            });
        }

        let mut record = projection.clone();
        match projections.get(&projection.id) {
            // The identity of an existing projection is fixed at creation.
            Some(stored) => record.projection_type = stored.projection_type.clone(),
            None => {
                if projections
                    .values()
                    .any(|p| p.projection_type == projection.projection_type)
                {
                    return Err(StoreError::Validation(format!(
                        "projection type {} already belongs to another projection",
                        projection.projection_type
                    )));
                }
            }
        }

        projections.insert(record.id, record);
        Ok(())
    }

    async fn get_projection(&self, projection_type: &str) -> Result<Projection> {
        if projection_type.is_empty() {
            return Err(StoreError::Validation(
                "projection type must not be empty".to_string(),
            ));
        }

        let mut projections = self.projections.write().await;
        if let Some(existing) = projections
            .values()
            .find(|p| p.projection_type == projection_type)
        {
            return Ok(existing.clone());
        }

        let fresh = Projection::new(projection_type);
        projections.insert(fresh.id, fresh.clone());
        Ok(fresh)
    }

    async fn update_projection_status(&self, projection_id: Uuid, status: &str) -> Result<()> {
        let mut projections = self.projections.write().await;
        let projection = projections
            .get_mut(&projection_id)
            .ok_or_else(|| StoreError::ProjectionNotFound(projection_id.to_string()))?;

        projection.status = status.to_string();
        projection.updated_at = Utc::now().trunc_subsecs(6);
        Ok(())
    }
}
