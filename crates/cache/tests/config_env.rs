//! Environment-driven configuration. Serialized because the process
//! environment is shared between test threads.

use std::time::Duration;

use cache::CacheConfig;
use serial_test::serial;

const VARS: [&str; 5] = [
    "REDIS_HOST",
    "REDIS_PORT",
    "REDIS_PASSWORD",
    "REDIS_TTL_SECS",
    "REDIS_READ_TIMEOUT_MS",
];

fn clear_env() {
    for var in VARS {
        // SAFETY: serialized with #[serial]; no other thread reads the environment.
        unsafe { std::env::remove_var(var) };
    }
}

#[test]
#[serial]
fn from_env_uses_defaults_when_unset() {
    clear_env();
    assert_eq!(CacheConfig::from_env(), CacheConfig::default());
}

#[test]
#[serial]
fn from_env_reads_overrides() {
    clear_env();
    // SAFETY: serialized with #[serial].
    unsafe {
        std::env::set_var("REDIS_HOST", "cache.internal");
        std::env::set_var("REDIS_PORT", "6380");
        std::env::set_var("REDIS_PASSWORD", "hunter2");
        std::env::set_var("REDIS_TTL_SECS", "60");
        std::env::set_var("REDIS_READ_TIMEOUT_MS", "250");
    }

    let config = CacheConfig::from_env();
    assert_eq!(config.host, "cache.internal");
    assert_eq!(config.port, 6380);
    assert_eq!(config.password.as_deref(), Some("hunter2"));
    assert_eq!(config.ttl, Duration::from_secs(60));
    assert_eq!(config.read_timeout, Duration::from_millis(250));
    assert_eq!(config.connection_url(), "redis://:hunter2@cache.internal:6380/0");

    clear_env();
}

#[test]
#[serial]
fn from_env_ignores_unparseable_values() {
    clear_env();
    // SAFETY: serialized with #[serial].
    unsafe { std::env::set_var("REDIS_PORT", "not-a-port") };

    assert_eq!(CacheConfig::from_env().port, 6379);

    clear_env();
}
