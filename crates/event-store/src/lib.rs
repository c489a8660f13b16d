//! Durable event storage with a cache-aside read path.
//!
//! - [`EventLog`]: append-only, globally sequenced log of [`Event`]s
//! - [`SnapshotStore`]: latest materialized state per aggregate
//! - [`ProjectionStore`]: consumer checkpoints over the global sequence
//! - [`CachedEventStore`]: an [`EventLog`] that caches aggregate histories
//!
//! Every trait has a PostgreSQL implementation and an in-memory one.

pub mod cached;
pub mod config;
pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod projection;
pub mod snapshot;
pub mod store;

pub use common::{AggregateId, AggregateKey};
pub use error::{Result, StoreError};
pub use event::{Event, EventBuilder, EventId, Metadata, Sequence, Version};
pub use snapshot::Snapshot;
pub use projection::Projection;
pub use store::{EventLog, EventLogExt, ProjectionStore, SnapshotStore, load_aggregate};
pub use memory::InMemoryEventStore;
pub use postgres::{
    PostgresEventLog, PostgresProjectionStore, PostgresSnapshotStore, run_migrations,
};
pub use cached::{CachedEventStore, event_stream_key};
pub use config::DatabaseConfig;
