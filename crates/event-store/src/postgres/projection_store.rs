use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{Projection, Result, Sequence, StoreError, store::ProjectionStore};

const SELECT_PROJECTION: &str = r#"
    SELECT projection_id, projection_type, last_processed_event, status, updated_at
    FROM projections
"#;

/// PostgreSQL-backed projection checkpoint store.
#[derive(Clone)]
pub struct PostgresProjectionStore {
    pool: PgPool,
}

impl PostgresProjectionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_projection(row: PgRow) -> Result<Projection> {
        Ok(Projection {
            id: row.try_get("projection_id")?,
            projection_type: row.try_get("projection_type")?,
            last_processed_sequence: Sequence::new(row.try_get("last_processed_event")?),
            status: row.try_get("status")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn find_by_type(&self, projection_type: &str) -> Result<Option<Projection>> {
        let row = sqlx::query(&format!("{SELECT_PROJECTION} WHERE projection_type = $1"))
            .bind(projection_type)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_projection).transpose()
    }
}

#[async_trait]
impl ProjectionStore for PostgresProjectionStore {
    #[tracing::instrument(skip(self, projection), fields(projection_type = %projection.projection_type))]
    async fn save_projection(&self, projection: &Projection) -> Result<()> {
        if projection.projection_type.is_empty() {
            return Err(StoreError::Validation(
                "projection type must not be empty".to_string(),
            ));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO projections (
                projection_id, projection_type, last_processed_event, status, updated_at
            )
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (projection_id) DO UPDATE SET
                last_processed_event = EXCLUDED.last_processed_event,
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at
            WHERE projections.last_processed_event <= EXCLUDED.last_processed_event
            "#,
        )
        .bind(projection.id)
        .bind(&projection.projection_type)
        .bind(projection.last_processed_sequence.as_i64())
        .bind(&projection.status)
        .bind(projection.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("projections_projection_type_key")
            {
                return StoreError::Validation(format!(
                    "projection type {} already belongs to another projection",
                    projection.projection_type
                ));
            }
            StoreError::Database(e)
        })?;

        if result.rows_affected() == 0 {
            let current: i64 = sqlx::query_scalar(
                "SELECT last_processed_event FROM projections WHERE projection_id = $1",
            )
            .bind(projection.id)
            .fetch_one(&self.pool)
            .await?;

            return Err(StoreError::CheckpointRegression {
                projection_type: projection.projection_type.clone(),
                current: Sequence::new(current),
                attempted: projection.last_processed_sequence,
            });
        }

        Ok(())
    }

    async fn get_projection(&self, projection_type: &str) -> Result<Projection> {
        if projection_type.is_empty() {
            return Err(StoreError::Validation(
                "projection type must not be empty".to_string(),
            ));
        }

        if let Some(existing) = self.find_by_type(projection_type).await? {
            return Ok(existing);
        }

        // Racing first callers: one insert wins, the rest are no-ops, and
        // everyone reads back the winner.
        let fresh = Projection::new(projection_type);
        sqlx::query(
            r#"
            INSERT INTO projections (
                projection_id, projection_type, last_processed_event, status, updated_at
            )
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (projection_type) DO NOTHING
            "#,
        )
        .bind(fresh.id)
        .bind(&fresh.projection_type)
        .bind(fresh.last_processed_sequence.as_i64())
        .bind(&fresh.status)
        .bind(fresh.updated_at)
        .execute(&self.pool)
        .await?;

        self.find_by_type(projection_type)
            .await?
            .ok_or_else(|| StoreError::ProjectionNotFound(projection_type.to_string()))
    }

    async fn update_projection_status(&self, projection_id: Uuid, status: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE projections SET status = $1, updated_at = $2 WHERE projection_id = $3",
        )
        .bind(status)
        .bind(Utc::now().trunc_subsecs(6))
        .bind(projection_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ProjectionNotFound(projection_id.to_string()));
        }
        Ok(())
    }
}
