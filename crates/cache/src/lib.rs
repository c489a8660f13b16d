//! Cache port for the event store's read path.
//!
//! The [`Cache`] trait is the only surface the event store depends on; any
//! conforming backend is interchangeable:
//! - [`RedisCache`]: pooled Redis client, the production backend
//! - [`InMemoryCache`]: process-local map with TTL, for tests and single-node setups
//!
//! Keys are validated here, independent of the backend: empty keys are
//! rejected with [`CacheError::InvalidKey`].

pub mod cache;
pub mod config;
pub mod error;
pub mod key;
pub mod memory;
pub mod redis;

pub use cache::Cache;
pub use config::CacheConfig;
pub use error::{CacheError, CacheResult};
pub use memory::InMemoryCache;
pub use redis::RedisCache;
