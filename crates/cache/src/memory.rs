use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::key::{validate_key, validate_keys};
use crate::{Cache, CacheError, CacheResult};

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Process-local cache with a uniform TTL.
///
/// Behaves like [`RedisCache`](crate::RedisCache) from the caller's point of
/// view: same key validation, same miss signal, same TTL semantics. Clones
/// share the same storage.
#[derive(Clone)]
pub struct InMemoryCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    ttl: Duration,
}

impl InMemoryCache {
    /// Creates an empty cache with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Returns the number of live entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.is_live(now))
            .count()
    }

    /// Returns true if no live entries are stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops every entry, as if the cache had been flushed.
    pub async fn flush(&self) {
        self.entries.write().await.clear();
    }

    fn entry(&self, value: Vec<u8>) -> Entry {
        Entry {
            value,
            expires_at: Instant::now() + self.ttl,
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(24 * 60 * 60))
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        validate_key(key)?;
        let now = Instant::now();
        self.entries
            .read()
            .await
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone())
            .ok_or(CacheError::Miss)
    }

    async fn set(&self, key: &str, value: &[u8]) -> CacheResult<()> {
        validate_key(key)?;
        let entry = self.entry(value.to_vec());
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        validate_key(key)?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn get_many(&self, keys: &[String]) -> CacheResult<HashMap<String, Vec<u8>>> {
        validate_keys(keys.iter().map(String::as_str))?;
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| {
                entries
                    .get(key)
                    .filter(|e| e.is_live(now))
                    .map(|e| (key.clone(), e.value.clone()))
            })
            .collect())
    }

    async fn set_many(&self, entries: &HashMap<String, Vec<u8>>) -> CacheResult<()> {
        validate_keys(entries.keys().map(String::as_str))?;
        let mut store = self.entries.write().await;
        for (key, value) in entries {
            store.insert(key.clone(), self.entry(value.clone()));
        }
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> CacheResult<()> {
        validate_keys(keys.iter().map(String::as_str))?;
        let mut store = self.entries.write().await;
        for key in keys {
            store.remove(key);
        }
        Ok(())
    }

    async fn health_check(&self) -> CacheResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_missing_key_is_miss() {
        let cache = InMemoryCache::default();
        assert!(matches!(cache.get("absent").await, Err(CacheError::Miss)));
    }

    #[tokio::test]
    async fn set_then_get() {
        let cache = InMemoryCache::default();
        cache.set("k", b"value").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), b"value");
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let cache = InMemoryCache::default();
        cache.set("k", b"value").await.unwrap();
        cache.delete("k").await.unwrap();
        assert!(cache.get("k").await.unwrap_err().is_miss());

        // deleting again is fine
        cache.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn empty_keys_rejected_everywhere() {
        let cache = InMemoryCache::default();
        assert!(matches!(cache.get("").await, Err(CacheError::InvalidKey)));
        assert!(matches!(cache.set("", b"v").await, Err(CacheError::InvalidKey)));
        assert!(matches!(cache.delete("").await, Err(CacheError::InvalidKey)));

        let keys = vec!["ok".to_string(), String::new()];
        assert!(matches!(
            cache.get_many(&keys).await,
            Err(CacheError::InvalidKey)
        ));
        assert!(matches!(
            cache.delete_many(&keys).await,
            Err(CacheError::InvalidKey)
        ));

        let mut entries = HashMap::new();
        entries.insert("ok".to_string(), b"1".to_vec());
        entries.insert(String::new(), b"2".to_vec());
        assert!(matches!(
            cache.set_many(&entries).await,
            Err(CacheError::InvalidKey)
        ));
        // the valid half of a rejected batch was not written
        assert!(cache.get("ok").await.unwrap_err().is_miss());
    }

    #[tokio::test]
    async fn batch_operations() {
        let cache = InMemoryCache::default();
        let mut entries = HashMap::new();
        entries.insert("a".to_string(), b"1".to_vec());
        entries.insert("b".to_string(), b"2".to_vec());
        cache.set_many(&entries).await.unwrap();

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let found = cache.get_many(&keys).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found["a"], b"1");
        assert!(!found.contains_key("c"));

        cache.delete_many(&keys[..2]).await.unwrap();
        assert!(cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = InMemoryCache::new(Duration::from_secs(10));
        cache.set("k", b"v").await.unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(cache.get("k").await.is_ok());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("k").await.unwrap_err().is_miss());
    }

    #[tokio::test]
    async fn flush_clears_everything() {
        let cache = InMemoryCache::default();
        cache.set("a", b"1").await.unwrap();
        cache.flush().await;
        assert_eq!(cache.len().await, 0);
    }
}
