use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{AggregateKey, Event, Projection, Result, Sequence, Snapshot, StoreError, Version};

/// Durable, append-only, globally ordered log of events.
///
/// All implementations must be thread-safe (Send + Sync). Every read returns
/// events ascending by [`Sequence`].
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Appends events to the log.
    ///
    /// The batch is written atomically: either every event becomes visible or
    /// none does. Sequences are assigned by the log; whatever the caller put
    /// in `Event::sequence` is ignored. Per aggregate, the batch must continue
    /// the stored history (`head + 1`, `head + 2`, ...) or the append fails
    /// with `ConcurrencyConflict`.
    async fn append(&self, events: Vec<Event>) -> Result<()>;

    /// Retrieves the full history of an aggregate. Empty if it has none.
    async fn get_by_aggregate(&self, key: &AggregateKey) -> Result<Vec<Event>>;

    /// Retrieves an aggregate's events starting at `from_version` (inclusive).
    ///
    /// Useful when replaying from a snapshot.
    async fn get_by_aggregate_from_version(
        &self,
        key: &AggregateKey,
        from_version: Version,
    ) -> Result<Vec<Event>>;

    /// Retrieves every event of the given type across all aggregates.
    async fn get_by_type(&self, event_type: &str) -> Result<Vec<Event>>;

    /// Retrieves every event with a sequence strictly greater than `sequence`.
    async fn get_after(&self, sequence: Sequence) -> Result<Vec<Event>>;

    /// Gets the current version of an aggregate.
    ///
    /// Returns None if the aggregate has no events.
    async fn get_aggregate_version(&self, key: &AggregateKey) -> Result<Option<Version>>;
}

/// Latest materialized state per aggregate.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Saves a snapshot, replacing the stored one for the same aggregate
    /// unless the stored one has a higher version.
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()>;

    /// Retrieves the latest snapshot, or None if there is none yet.
    async fn find_latest_snapshot(&self, key: &AggregateKey) -> Result<Option<Snapshot>>;

    /// Retrieves the latest snapshot, reporting absence as
    /// [`StoreError::SnapshotNotFound`].
    async fn get_latest_snapshot(&self, key: &AggregateKey) -> Result<Snapshot> {
        self.find_latest_snapshot(key)
            .await?
            .ok_or_else(|| StoreError::SnapshotNotFound(key.clone()))
    }
}

/// Consumer bookmarks over the global event sequence.
#[async_trait]
pub trait ProjectionStore: Send + Sync {
    /// Inserts or updates a projection by id.
    ///
    /// Fails with `CheckpointRegression` if the stored checkpoint is ahead of
    /// `projection.last_processed_sequence`.
    async fn save_projection(&self, projection: &Projection) -> Result<()>;

    /// Returns the projection with the given identity, creating a fresh one
    /// (sequence 0, status `active`) on first access. Concurrent first
    /// callers all observe the same record.
    async fn get_projection(&self, projection_type: &str) -> Result<Projection>;

    /// Updates status and timestamp only.
    async fn update_projection_status(&self, projection_id: Uuid, status: &str) -> Result<()>;
}

/// Extension trait providing convenience methods for event logs.
#[async_trait]
pub trait EventLogExt: EventLog {
    /// Appends a single event.
    async fn append_event(&self, event: Event) -> Result<()> {
        self.append(vec![event]).await
    }

    /// Checks if an aggregate exists (has any events).
    async fn aggregate_exists(&self, key: &AggregateKey) -> Result<bool> {
        Ok(self.get_aggregate_version(key).await?.is_some())
    }
}

// Blanket implementation for all EventLog implementations
impl<T: EventLog + ?Sized> EventLogExt for T {}

/// Loads an aggregate's events, starting from its snapshot if there is one.
///
/// Returns the snapshot (if any) and the events after it.
pub async fn load_aggregate<L, S>(
    log: &L,
    snapshots: &S,
    key: &AggregateKey,
) -> Result<(Option<Snapshot>, Vec<Event>)>
where
    L: EventLog + ?Sized,
    S: SnapshotStore + ?Sized,
{
    match snapshots.find_latest_snapshot(key).await? {
        Some(snapshot) => {
            let events = log
                .get_by_aggregate_from_version(key, snapshot.version.next())
                .await?;
            Ok((Some(snapshot), events))
        }
        None => Ok((None, log.get_by_aggregate(key).await?)),
    }
}

/// Rejects keys with an empty type or id.
pub fn validate_key(key: &AggregateKey) -> Result<()> {
    if key.is_incomplete() {
        return Err(StoreError::Validation(format!(
            "aggregate type and id must not be empty (got {key})"
        )));
    }
    Ok(())
}

/// Validates a batch before it reaches storage and returns, per aggregate,
/// the first version the batch writes.
///
/// A valid batch is non-empty, every event carries complete identifiers and a
/// version of at least 1, event ids are unique, and the versions written to
/// each aggregate are contiguous in batch order.
pub fn validate_events_for_append(events: &[Event]) -> Result<BTreeMap<AggregateKey, Version>> {
    if events.is_empty() {
        return Err(StoreError::Validation(
            "Cannot append empty event list".to_string(),
        ));
    }

    let mut ids = HashSet::with_capacity(events.len());
    let mut first_versions: BTreeMap<AggregateKey, Version> = BTreeMap::new();
    let mut last_versions: BTreeMap<AggregateKey, Version> = BTreeMap::new();

    for event in events {
        let key = event.key();
        validate_key(&key)?;
        if event.event_type.is_empty() {
            return Err(StoreError::Validation(format!(
                "event {} has an empty event type",
                event.id
            )));
        }
        if event.version < Version::first() {
            return Err(StoreError::Validation(format!(
                "event {} has version {}, versions start at 1",
                event.id, event.version
            )));
        }
        if !ids.insert(event.id) {
            return Err(StoreError::DuplicateEvent(event.id));
        }

        if let Some(last) = last_versions.get(&key)
            && event.version != last.next()
        {
            return Err(StoreError::Validation(format!(
                "Event versions must be sequential for {key}. Expected {}, got {}",
                last.next(),
                event.version
            )));
        }
        last_versions.insert(key.clone(), event.version);
        first_versions.entry(key).or_insert(event.version);
    }

    Ok(first_versions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(aggregate_id: &str, version: i64) -> Event {
        Event::builder()
            .aggregate_type("Order")
            .aggregate_id(aggregate_id)
            .event_type("OrderCreated")
            .version(Version::new(version))
            .build()
            .unwrap()
    }

    #[test]
    fn empty_batch_rejected() {
        assert!(matches!(
            validate_events_for_append(&[]),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn first_versions_reported_per_aggregate() {
        let events = vec![event("A1", 3), event("B1", 1), event("A1", 4)];
        let firsts = validate_events_for_append(&events).unwrap();

        assert_eq!(firsts.len(), 2);
        assert_eq!(firsts[&AggregateKey::new("Order", "A1")], Version::new(3));
        assert_eq!(firsts[&AggregateKey::new("Order", "B1")], Version::new(1));
    }

    #[test]
    fn gaps_within_an_aggregate_rejected() {
        let events = vec![event("A1", 1), event("A1", 3)];
        assert!(matches!(
            validate_events_for_append(&events),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let first = event("A1", 1);
        let mut second = event("A1", 2);
        second.id = first.id;
        assert!(matches!(
            validate_events_for_append(&[first, second]),
            Err(StoreError::DuplicateEvent(_))
        ));
    }

    #[test]
    fn hand_built_event_with_empty_identifiers_rejected() {
        let mut bad = event("A1", 1);
        bad.aggregate_type.clear();
        assert!(matches!(
            validate_events_for_append(&[bad]),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn validate_key_rejects_incomplete_keys() {
        assert!(validate_key(&AggregateKey::new("Order", "")).is_err());
        assert!(validate_key(&AggregateKey::new("Order", "A1")).is_ok());
    }
}
