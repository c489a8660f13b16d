use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::head_version;
use crate::{
    AggregateId, AggregateKey, Event, EventId, Metadata, Result, Sequence, StoreError, Version,
    store::{EventLog, validate_events_for_append, validate_key},
};

const SELECT_EVENTS: &str = r#"
    SELECT event_id, aggregate_type, aggregate_id, event_type,
           event_version, sequence_number, data, metadata, created_at
    FROM events
"#;

/// PostgreSQL-backed event log.
#[derive(Clone)]
pub struct PostgresEventLog {
    pool: PgPool,
}

impl PostgresEventLog {
    /// Creates a new PostgreSQL event log.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_event(row: PgRow) -> Result<Event> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: Metadata = serde_json::from_value(metadata_json)?;

        Ok(Event {
            id: EventId::from_uuid(row.try_get::<Uuid, _>("event_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            aggregate_id: AggregateId::new(row.try_get::<String, _>("aggregate_id")?),
            event_type: row.try_get("event_type")?,
            version: Version::new(row.try_get("event_version")?),
            sequence: Sequence::new(row.try_get("sequence_number")?),
            data: row.try_get("data")?,
            metadata,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl EventLog for PostgresEventLog {
    #[tracing::instrument(skip(self, events), fields(count = events.len()))]
    async fn append(&self, events: Vec<Event>) -> Result<()> {
        let first_versions = validate_events_for_append(&events)?;

        let mut tx = self.pool.begin().await?;

        // Check every touched aggregate continues from its stored head. Two
        // writers passing this check at once still collide on the unique
        // (aggregate_type, aggregate_id, event_version) constraint below.
        for (key, first) in &first_versions {
            let actual = head_version(&mut tx, key).await?;
            if actual.next() != *first {
                return Err(StoreError::ConcurrencyConflict {
                    aggregate: key.clone(),
                    expected: first.previous(),
                    actual,
                });
            }
        }

        let mut last_sequence = Sequence::unassigned();
        for event in &events {
            let metadata_json = serde_json::to_value(&event.metadata)?;

            let sequence: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO events (
                    event_id, aggregate_type, aggregate_id, event_type,
                    event_version, data, metadata, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING sequence_number
                "#,
            )
            .bind(event.id.as_uuid())
            .bind(&event.aggregate_type)
            .bind(event.aggregate_id.as_str())
            .bind(&event.event_type)
            .bind(event.version.as_i64())
            .bind(&event.data)
            .bind(metadata_json)
            .bind(event.created_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e {
                    match db_err.constraint() {
                        Some("events_aggregate_version_unique") => {
                            return StoreError::ConcurrencyConflict {
                                aggregate: event.key(),
                                expected: event.version.previous(),
                                actual: event.version,
                            };
                        }
                        Some("events_pkey") => return StoreError::DuplicateEvent(event.id),
                        _ => {}
                    }
                }
                StoreError::Database(e)
            })?;

            last_sequence = Sequence::new(sequence);
        }

        tx.commit().await?;

        metrics::counter!("event_store_events_appended_total").increment(events.len() as u64);
        tracing::debug!(%last_sequence, "events appended");
        Ok(())
    }

    async fn get_by_aggregate(&self, key: &AggregateKey) -> Result<Vec<Event>> {
        validate_key(key)?;
        let rows = sqlx::query(&format!(
            "{SELECT_EVENTS} WHERE aggregate_type = $1 AND aggregate_id = $2 ORDER BY sequence_number ASC"
        ))
        .bind(&key.aggregate_type)
        .bind(key.aggregate_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn get_by_aggregate_from_version(
        &self,
        key: &AggregateKey,
        from_version: Version,
    ) -> Result<Vec<Event>> {
        validate_key(key)?;
        let rows = sqlx::query(&format!(
            "{SELECT_EVENTS} WHERE aggregate_type = $1 AND aggregate_id = $2 AND event_version >= $3 \
             ORDER BY sequence_number ASC"
        ))
        .bind(&key.aggregate_type)
        .bind(key.aggregate_id.as_str())
        .bind(from_version.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn get_by_type(&self, event_type: &str) -> Result<Vec<Event>> {
        let rows = sqlx::query(&format!(
            "{SELECT_EVENTS} WHERE event_type = $1 ORDER BY sequence_number ASC"
        ))
        .bind(event_type)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn get_after(&self, sequence: Sequence) -> Result<Vec<Event>> {
        let rows = sqlx::query(&format!(
            "{SELECT_EVENTS} WHERE sequence_number > $1 ORDER BY sequence_number ASC"
        ))
        .bind(sequence.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn get_aggregate_version(&self, key: &AggregateKey) -> Result<Option<Version>> {
        validate_key(key)?;
        let version: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(event_version) FROM events WHERE aggregate_type = $1 AND aggregate_id = $2",
        )
        .bind(&key.aggregate_type)
        .bind(key.aggregate_id.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(version.map(Version::new))
    }
}
