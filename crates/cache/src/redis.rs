//! Redis-backed cache.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::RedisConnectionManager;
use bb8_redis::bb8::Pool;
use bb8_redis::redis::{self, Cmd, FromRedisValue, Pipeline};

use crate::key::{validate_key, validate_keys};
use crate::{Cache, CacheConfig, CacheError, CacheResult};

/// A single command or a pipeline, so retries can re-send either.
enum Request<'a> {
    Single(&'a Cmd),
    Batch(&'a Pipeline),
}

/// Cache backed by a pooled Redis client.
///
/// The pool is built once from a [`CacheConfig`] and shared by cloning;
/// every command runs under the configured read or write timeout and is
/// retried up to `max_retries` times on connection-level failures.
#[derive(Clone)]
pub struct RedisCache {
    pool: Pool<RedisConnectionManager>,
    ttl: Duration,
    read_timeout: Duration,
    write_timeout: Duration,
    max_retries: u32,
}

impl RedisCache {
    /// Connects to Redis and verifies the connection with a `PING`.
    #[tracing::instrument(skip(config), fields(host = %config.host, port = config.port, db = config.db))]
    pub async fn connect(config: &CacheConfig) -> CacheResult<Self> {
        let manager = RedisConnectionManager::new(config.connection_url())?;
        let pool = Pool::builder()
            .max_size(config.pool_size.max(1))
            .min_idle(Some(config.min_idle_conns.min(config.pool_size)))
            .connection_timeout(config.dial_timeout)
            .build(manager)
            .await?;

        let cache = Self {
            pool,
            ttl: config.ttl,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            max_retries: config.max_retries,
        };
        cache.health_check().await?;

        tracing::info!("connected to redis");
        Ok(cache)
    }

    /// Returns the TTL applied to stored entries.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn ttl_millis(&self) -> u64 {
        u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX).max(1)
    }

    async fn execute<T: FromRedisValue>(
        &self,
        op: &'static str,
        budget: Duration,
        request: Request<'_>,
    ) -> CacheResult<T> {
        let mut attempt = 0;
        loop {
            match self.execute_once(op, budget, &request).await {
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::debug!(op, attempt, error = %err, "retrying cache command");
                }
                result => return result,
            }
        }
    }

    async fn execute_once<T: FromRedisValue>(
        &self,
        op: &'static str,
        budget: Duration,
        request: &Request<'_>,
    ) -> CacheResult<T> {
        let mut conn = self.pool.get().await?;
        let outcome = match request {
            Request::Single(cmd) => tokio::time::timeout(budget, cmd.query_async(&mut *conn)).await,
            Request::Batch(pipe) => tokio::time::timeout(budget, pipe.query_async(&mut *conn)).await,
        };

        match outcome {
            Ok(result) => Ok(result?),
            Err(_) => Err(CacheError::Timeout(op)),
        }
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        validate_key(key)?;

        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        let value: Option<Vec<u8>> = self
            .execute("get", self.read_timeout, Request::Single(&cmd))
            .await?;

        value.ok_or(CacheError::Miss)
    }

    async fn set(&self, key: &str, value: &[u8]) -> CacheResult<()> {
        validate_key(key)?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("PX").arg(self.ttl_millis());
        self.execute("set", self.write_timeout, Request::Single(&cmd))
            .await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        validate_key(key)?;

        let mut cmd = redis::cmd("DEL");
        cmd.arg(key);
        let _removed: i64 = self
            .execute("delete", self.write_timeout, Request::Single(&cmd))
            .await?;
        Ok(())
    }

    async fn get_many(&self, keys: &[String]) -> CacheResult<HashMap<String, Vec<u8>>> {
        validate_keys(keys.iter().map(String::as_str))?;
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let mut cmd = redis::cmd("MGET");
        cmd.arg(keys);
        let values: Vec<Option<Vec<u8>>> = self
            .execute("get_many", self.read_timeout, Request::Single(&cmd))
            .await?;

        Ok(keys
            .iter()
            .zip(values)
            .filter_map(|(key, value)| value.map(|v| (key.clone(), v)))
            .collect())
    }

    async fn set_many(&self, entries: &HashMap<String, Vec<u8>>) -> CacheResult<()> {
        validate_keys(entries.keys().map(String::as_str))?;
        if entries.is_empty() {
            return Ok(());
        }

        let ttl = self.ttl_millis();
        let mut pipe = redis::pipe();
        for (key, value) in entries {
            pipe.cmd("SET")
                .arg(key)
                .arg(value.as_slice())
                .arg("PX")
                .arg(ttl)
                .ignore();
        }
        self.execute("set_many", self.write_timeout, Request::Batch(&pipe))
            .await
    }

    async fn delete_many(&self, keys: &[String]) -> CacheResult<()> {
        validate_keys(keys.iter().map(String::as_str))?;
        if keys.is_empty() {
            return Ok(());
        }

        let mut cmd = redis::cmd("DEL");
        cmd.arg(keys);
        let _removed: i64 = self
            .execute("delete_many", self.write_timeout, Request::Single(&cmd))
            .await?;
        Ok(())
    }

    async fn health_check(&self) -> CacheResult<()> {
        let cmd = redis::cmd("PING");
        let _pong: String = self
            .execute("health_check", self.read_timeout, Request::Single(&cmd))
            .await?;
        Ok(())
    }
}
