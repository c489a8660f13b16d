use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use super::head_version;
use crate::{
    AggregateId, AggregateKey, Metadata, Result, Snapshot, StoreError, Version,
    store::{SnapshotStore, validate_key},
};

/// PostgreSQL-backed snapshot store: one row per aggregate.
#[derive(Clone)]
pub struct PostgresSnapshotStore {
    pool: PgPool,
}

impl PostgresSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_snapshot(row: PgRow) -> Result<Snapshot> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: Metadata = serde_json::from_value(metadata_json)?;

        Ok(Snapshot {
            aggregate_type: row.try_get("aggregate_type")?,
            aggregate_id: AggregateId::new(row.try_get::<String, _>("aggregate_id")?),
            version: Version::new(row.try_get("version")?),
            data: row.try_get("data")?,
            metadata,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl SnapshotStore for PostgresSnapshotStore {
    #[tracing::instrument(skip(self, snapshot), fields(aggregate = %snapshot.key(), version = %snapshot.version))]
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        let key = snapshot.key();
        validate_key(&key)?;
        if snapshot.version < Version::first() {
            return Err(StoreError::Validation(
                "snapshot version must be at least 1".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let head = head_version(&mut tx, &key).await?;
        if snapshot.version > head {
            return Err(StoreError::Validation(format!(
                "snapshot version {} is ahead of aggregate {key} at version {head}",
                snapshot.version
            )));
        }

        let metadata_json = serde_json::to_value(&snapshot.metadata)?;
        let result = sqlx::query(
            r#"
            INSERT INTO snapshots (aggregate_type, aggregate_id, version, data, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (aggregate_type, aggregate_id) DO UPDATE SET
                version = EXCLUDED.version,
                data = EXCLUDED.data,
                metadata = EXCLUDED.metadata,
                created_at = EXCLUDED.created_at
            WHERE snapshots.version <= EXCLUDED.version
            "#,
        )
        .bind(&snapshot.aggregate_type)
        .bind(snapshot.aggregate_id.as_str())
        .bind(snapshot.version.as_i64())
        .bind(&snapshot.data)
        .bind(metadata_json)
        .bind(snapshot.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if result.rows_affected() == 0 {
            tracing::debug!("ignoring snapshot older than the stored one");
        }
        Ok(())
    }

    async fn find_latest_snapshot(&self, key: &AggregateKey) -> Result<Option<Snapshot>> {
        validate_key(key)?;
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT aggregate_type, aggregate_id, version, data, metadata, created_at
            FROM snapshots
            WHERE aggregate_type = $1 AND aggregate_id = $2
            "#,
        )
        .bind(&key.aggregate_type)
        .bind(key.aggregate_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_snapshot).transpose()
    }
}
