//! Cache connection settings loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

/// Redis connection and pooling settings.
///
/// Reads from environment variables:
/// - `REDIS_HOST` (default: `"localhost"`)
/// - `REDIS_PORT` (default: `6379`)
/// - `REDIS_PASSWORD` (default: none)
/// - `REDIS_DB` logical database index (default: `0`)
/// - `REDIS_POOL_SIZE` (default: `10`)
/// - `REDIS_MIN_IDLE_CONNS` (default: `5`)
/// - `REDIS_DIAL_TIMEOUT_MS` (default: `5000`)
/// - `REDIS_READ_TIMEOUT_MS` (default: `3000`)
/// - `REDIS_WRITE_TIMEOUT_MS` (default: `3000`)
/// - `REDIS_MAX_RETRIES` (default: `3`)
/// - `REDIS_TTL_SECS` TTL applied to every stored entry (default: 24h)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
    pub pool_size: u32,
    pub min_idle_conns: u32,
    pub dial_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub max_retries: u32,
    pub ttl: Duration,
}

impl CacheConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("REDIS_HOST").unwrap_or(defaults.host),
            port: env_or("REDIS_PORT", defaults.port),
            password: std::env::var("REDIS_PASSWORD")
                .ok()
                .filter(|p| !p.is_empty()),
            db: env_or("REDIS_DB", defaults.db),
            pool_size: env_or("REDIS_POOL_SIZE", defaults.pool_size),
            min_idle_conns: env_or("REDIS_MIN_IDLE_CONNS", defaults.min_idle_conns),
            dial_timeout: env_millis("REDIS_DIAL_TIMEOUT_MS", defaults.dial_timeout),
            read_timeout: env_millis("REDIS_READ_TIMEOUT_MS", defaults.read_timeout),
            write_timeout: env_millis("REDIS_WRITE_TIMEOUT_MS", defaults.write_timeout),
            max_retries: env_or("REDIS_MAX_RETRIES", defaults.max_retries),
            ttl: std::env::var("REDIS_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.ttl),
        }
    }

    /// Returns the `redis://` URL for this configuration. The password is
    /// percent-encoded.
    pub fn connection_url(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                urlencoding::encode(password),
                self.host,
                self.port,
                self.db
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            db: 0,
            pool_size: 10,
            min_idle_conns: 5,
            dial_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(3),
            write_timeout: Duration::from_secs(3),
            max_retries: 3,
            ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_millis(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 6379);
        assert_eq!(config.db, 0);
        assert_eq!(config.pool_size, 10);
        assert_eq!(config.min_idle_conns, 5);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.ttl, Duration::from_secs(86_400));
    }

    #[test]
    fn test_url_without_password() {
        let config = CacheConfig::default();
        assert_eq!(config.connection_url(), "redis://localhost:6379/0");
    }

    #[test]
    fn test_url_with_password_and_db() {
        let config = CacheConfig {
            password: Some("secret".to_string()),
            db: 2,
            ..CacheConfig::default()
        };
        assert_eq!(config.connection_url(), "redis://:secret@localhost:6379/2");
    }

    #[test]
    fn test_url_escapes_reserved_password_characters() {
        let config = CacheConfig {
            password: Some("p@ss:w/rd".to_string()),
            ..CacheConfig::default()
        };
        assert_eq!(
            config.connection_url(),
            "redis://:p%40ss%3Aw%2Frd@localhost:6379/0"
        );
    }
}
