//! PostgreSQL-backed stores.
//!
//! All three stores share one [`PgPool`]; clone the pool into each of them.
//! Cancellation is future drop: a transaction dropped before commit is
//! rolled back by sqlx, so an aborted append leaves nothing visible.

mod event_log;
mod projection_store;
mod snapshot_store;

pub use event_log::PostgresEventLog;
pub use projection_store::PostgresProjectionStore;
pub use snapshot_store::PostgresSnapshotStore;

use sqlx::{PgPool, Postgres, Transaction};

use crate::{AggregateKey, Result, Version};

/// Applies the bundled schema migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

/// Highest stored event version of an aggregate, read inside `tx`.
async fn head_version(tx: &mut Transaction<'_, Postgres>, key: &AggregateKey) -> Result<Version> {
    let head: Option<i64> = sqlx::query_scalar(
        "SELECT MAX(event_version) FROM events WHERE aggregate_type = $1 AND aggregate_id = $2",
    )
    .bind(&key.aggregate_type)
    .bind(key.aggregate_id.as_str())
    .fetch_one(&mut **tx)
    .await?;

    Ok(Version::new(head.unwrap_or(0)))
}
