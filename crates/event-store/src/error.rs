use thiserror::Error;

use crate::{AggregateKey, EventId, Sequence, Version};

/// Errors that can occur when interacting with the event store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The request was rejected before any I/O: empty batch, empty
    /// identifiers, non-contiguous versions.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The batch does not continue the aggregate's history: another writer
    /// got there first, or the caller's view of the aggregate is stale.
    #[error(
        "Concurrency conflict for aggregate {aggregate}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate: AggregateKey,
        expected: Version,
        actual: Version,
    },

    /// An event with this id has already been appended.
    #[error("Duplicate event: {0}")]
    DuplicateEvent(EventId),

    /// No snapshot has been saved for the aggregate yet.
    #[error("snapshot not found for aggregate {0}")]
    SnapshotNotFound(AggregateKey),

    /// No projection exists with the given identity.
    #[error("projection not found: {0}")]
    ProjectionNotFound(String),

    /// A projection checkpoint would move backwards.
    #[error(
        "Checkpoint regression for projection {projection_type}: stored {current}, attempted {attempted}"
    )]
    CheckpointRegression {
        projection_type: String,
        current: Sequence,
        attempted: Sequence,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true for "nothing there yet" conditions, as opposed to a
    /// failing store.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::SnapshotNotFound(_) | StoreError::ProjectionNotFound(_)
        )
    }
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
