use std::collections::HashMap;

use async_trait::async_trait;

use crate::CacheResult;

/// Capability set the event store needs from a cache.
///
/// Implementations must reject empty keys with [`CacheError::InvalidKey`]
/// before doing any I/O, and must report absent keys from [`Cache::get`] as
/// [`CacheError::Miss`] rather than a generic failure.
///
/// [`CacheError::InvalidKey`]: crate::CacheError::InvalidKey
/// [`CacheError::Miss`]: crate::CacheError::Miss
#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetches the value stored under `key`.
    async fn get(&self, key: &str) -> CacheResult<Vec<u8>>;

    /// Stores `value` under `key` with the backend's configured TTL.
    async fn set(&self, key: &str, value: &[u8]) -> CacheResult<()>;

    /// Removes `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Fetches several keys at once. Absent keys are left out of the result.
    async fn get_many(&self, keys: &[String]) -> CacheResult<HashMap<String, Vec<u8>>>;

    /// Stores several entries at once.
    async fn set_many(&self, entries: &HashMap<String, Vec<u8>>) -> CacheResult<()>;

    /// Removes several keys at once.
    async fn delete_many(&self, keys: &[String]) -> CacheResult<()>;

    /// Verifies the backend is reachable.
    async fn health_check(&self) -> CacheResult<()>;
}
