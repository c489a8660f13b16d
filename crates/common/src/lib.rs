//! Identifiers shared across the event-store workspace.

pub mod types;

pub use types::{AggregateId, AggregateKey};
