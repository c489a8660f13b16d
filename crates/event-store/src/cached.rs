//! Cache-aside wrapper around an [`EventLog`].
//!
//! Aggregate histories are cached under [`event_stream_key`] as the JSON
//! encoding of the ordered event list. Reads try the cache first and fall
//! back to the durable log; appends write through to the log and then
//! invalidate the affected keys. Cache faults never reach the caller: a
//! failing cache only costs a durable read.
//!
//! # Stale repopulation
//!
//! A reader that misses, reads the log, and is then overtaken by an append
//! (write plus invalidation) will still populate the cache with the history
//! it read. That entry stays stale until the next append to the same
//! aggregate invalidates it again or the TTL expires. Event histories are
//! append-only, so a stale entry is always a prefix of the true history.

use std::collections::BTreeSet;

use async_trait::async_trait;
use cache::{Cache, CacheError};

use crate::{
    AggregateKey, Event, Result, Sequence, Version,
    store::{EventLog, validate_key},
};

/// Renders the cache key holding an aggregate's history.
pub fn event_stream_key(key: &AggregateKey) -> String {
    format!("events:{}:{}", key.aggregate_type, key.aggregate_id)
}

/// Event log decorator that caches per-aggregate histories.
#[derive(Clone)]
pub struct CachedEventStore<L, C> {
    log: L,
    cache: C,
}

impl<L: EventLog, C: Cache> CachedEventStore<L, C> {
    pub fn new(log: L, cache: C) -> Self {
        Self { log, cache }
    }

    /// The wrapped durable log.
    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Looks up a cached history. Every fault, including an entry that no
    /// longer decodes, is reported as `None` so the caller reads through.
    ///
    /// Distinct aggregates can render the same cache key when an identifier
    /// contains `:`, so a hit only counts if every event belongs to `key`.
    async fn cached_history(&self, key: &AggregateKey, cache_key: &str) -> Option<Vec<Event>> {
        match self.cache.get(cache_key).await {
            Ok(bytes) => match serde_json::from_slice::<Vec<Event>>(&bytes) {
                Ok(events) if events.iter().all(|e| e.belongs_to(key)) => {
                    metrics::counter!("event_store_cache_hits_total").increment(1);
                    Some(events)
                }
                Ok(_) => {
                    tracing::warn!(key = cache_key, "cache entry holds another aggregate's history");
                    metrics::counter!("event_store_cache_errors_total", "operation" => "foreign")
                        .increment(1);
                    None
                }
                Err(e) => {
                    tracing::warn!(key = cache_key, error = %e, "discarding undecodable cache entry");
                    metrics::counter!("event_store_cache_errors_total", "operation" => "decode")
                        .increment(1);
                    None
                }
            },
            Err(CacheError::Miss) => {
                metrics::counter!("event_store_cache_misses_total").increment(1);
                None
            }
            Err(e) => {
                tracing::warn!(key = cache_key, error = %e, "cache read failed, using event log");
                metrics::counter!("event_store_cache_errors_total", "operation" => "get")
                    .increment(1);
                None
            }
        }
    }

    async fn populate(&self, cache_key: &str, events: &[Event]) {
        let bytes = match serde_json::to_vec(events) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key = cache_key, error = %e, "failed to encode history for cache");
                return;
            }
        };

        if let Err(e) = self.cache.set(cache_key, &bytes).await {
            tracing::warn!(key = cache_key, error = %e, "failed to populate cache");
            metrics::counter!("event_store_cache_errors_total", "operation" => "set").increment(1);
        }
    }
}

#[async_trait]
impl<L: EventLog, C: Cache> EventLog for CachedEventStore<L, C> {
    #[tracing::instrument(skip(self, events), fields(count = events.len()))]
    async fn append(&self, events: Vec<Event>) -> Result<()> {
        let keys: Vec<String> = events
            .iter()
            .map(|e| event_stream_key(&e.key()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        self.log.append(events).await?;

        if let Err(e) = self.cache.delete_many(&keys).await {
            tracing::warn!(?keys, error = %e, "failed to invalidate cached histories");
            metrics::counter!("event_store_cache_errors_total", "operation" => "delete")
                .increment(1);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, key), fields(aggregate = %key))]
    async fn get_by_aggregate(&self, key: &AggregateKey) -> Result<Vec<Event>> {
        validate_key(key)?;
        let cache_key = event_stream_key(key);

        if let Some(events) = self.cached_history(key, &cache_key).await {
            return Ok(events);
        }

        let events = self.log.get_by_aggregate(key).await?;
        self.populate(&cache_key, &events).await;
        Ok(events)
    }

    async fn get_by_aggregate_from_version(
        &self,
        key: &AggregateKey,
        from_version: Version,
    ) -> Result<Vec<Event>> {
        let mut events = self.get_by_aggregate(key).await?;
        events.retain(|e| e.version >= from_version);
        Ok(events)
    }

    async fn get_by_type(&self, event_type: &str) -> Result<Vec<Event>> {
        self.log.get_by_type(event_type).await
    }

    async fn get_after(&self, sequence: Sequence) -> Result<Vec<Event>> {
        self.log.get_after(sequence).await
    }

    async fn get_aggregate_version(&self, key: &AggregateKey) -> Result<Option<Version>> {
        self.log.get_aggregate_version(key).await
    }
}
