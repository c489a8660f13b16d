//! Redis integration tests
//!
//! These tests use a shared Redis container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p cache --test redis_integration -- --test-threads=1
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cache::{Cache, CacheConfig, CacheError, RedisCache};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Redis>,
    host: String,
    port: u16,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Redis::default().start().await.unwrap();
            let host = container.get_host().await.unwrap().to_string();
            let port = container.get_host_port_ipv4(6379).await.unwrap();

            Arc::new(ContainerInfo {
                container,
                host,
                port,
            })
        })
        .await
        .clone()
}

async fn config_for(db: i64, ttl: Duration) -> CacheConfig {
    let info = get_container_info().await;
    CacheConfig {
        host: info.host.clone(),
        port: info.port,
        db,
        pool_size: 4,
        min_idle_conns: 1,
        ttl,
        ..CacheConfig::default()
    }
}

/// Each test gets its own logical database, flushed before use.
async fn get_test_cache(db: i64) -> RedisCache {
    let cache = RedisCache::connect(&config_for(db, Duration::from_secs(60)).await)
        .await
        .unwrap();
    let keys: Vec<String> = (0..16).map(|i| format!("k{i}")).collect();
    cache.delete_many(&keys).await.unwrap();
    cache
}

#[tokio::test]
async fn health_check_succeeds() {
    let cache = get_test_cache(1).await;
    cache.health_check().await.unwrap();
}

#[tokio::test]
async fn get_missing_key_is_miss() {
    let cache = get_test_cache(2).await;
    let err = cache.get("k0").await.unwrap_err();
    assert!(matches!(err, CacheError::Miss));
}

#[tokio::test]
async fn set_get_delete_roundtrip() {
    let cache = get_test_cache(3).await;

    cache.set("k1", b"{\"orderId\":\"123\"}").await.unwrap();
    assert_eq!(cache.get("k1").await.unwrap(), b"{\"orderId\":\"123\"}");

    cache.delete("k1").await.unwrap();
    assert!(cache.get("k1").await.unwrap_err().is_miss());
}

#[tokio::test]
async fn empty_key_rejected_before_io() {
    let cache = get_test_cache(4).await;
    assert!(matches!(cache.get("").await, Err(CacheError::InvalidKey)));
    assert!(matches!(
        cache.set("", b"v").await,
        Err(CacheError::InvalidKey)
    ));
    assert!(matches!(
        cache.delete_many(&["k1".to_string(), String::new()]).await,
        Err(CacheError::InvalidKey)
    ));
}

#[tokio::test]
async fn batch_operations_use_pipeline() {
    let cache = get_test_cache(5).await;

    let mut entries = HashMap::new();
    entries.insert("k2".to_string(), b"two".to_vec());
    entries.insert("k3".to_string(), b"three".to_vec());
    cache.set_many(&entries).await.unwrap();

    let keys = vec!["k2".to_string(), "k3".to_string(), "k4".to_string()];
    let found = cache.get_many(&keys).await.unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found["k3"], b"three");

    cache.delete_many(&keys).await.unwrap();
    assert!(cache.get_many(&keys).await.unwrap().is_empty());
}

#[tokio::test]
async fn entries_expire_with_configured_ttl() {
    let cache = RedisCache::connect(&config_for(6, Duration::from_millis(200)).await)
        .await
        .unwrap();

    cache.set("k5", b"short-lived").await.unwrap();
    assert!(cache.get("k5").await.is_ok());

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(cache.get("k5").await.unwrap_err().is_miss());
}

#[tokio::test]
async fn connect_fails_for_unreachable_server() {
    let config = CacheConfig {
        host: "127.0.0.1".to_string(),
        port: 1,
        dial_timeout: Duration::from_millis(200),
        max_retries: 0,
        ..CacheConfig::default()
    };
    assert!(RedisCache::connect(&config).await.is_err());
}
