use bb8_redis::bb8::RunError;
use bb8_redis::redis::RedisError;
use thiserror::Error;

/// Errors that can occur when talking to a cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The key is not present (or has expired).
    #[error("cache miss")]
    Miss,

    /// The key is not acceptable to the cache (empty).
    #[error("invalid cache key")]
    InvalidKey,

    /// The backend returned an error or the connection failed.
    #[error("cache connection error: {0}")]
    Connection(#[from] RedisError),

    /// The connection pool could not hand out a connection.
    #[error("cache pool error: {0}")]
    Pool(String),

    /// A command did not complete within its configured timeout.
    #[error("cache operation timed out: {0}")]
    Timeout(&'static str),
}

impl CacheError {
    /// Returns true for the explicit miss signal.
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::Miss)
    }

    /// Returns true if retrying the same command may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            CacheError::Connection(err) => {
                err.is_io_error()
                    || err.is_timeout()
                    || err.is_connection_dropped()
                    || err.is_connection_refusal()
            }
            CacheError::Timeout(_) | CacheError::Pool(_) => true,
            CacheError::Miss | CacheError::InvalidKey => false,
        }
    }
}

impl From<RunError<RedisError>> for CacheError {
    fn from(err: RunError<RedisError>) -> Self {
        match err {
            RunError::User(err) => CacheError::Connection(err),
            RunError::TimedOut => CacheError::Pool("timed out waiting for a connection".into()),
        }
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;
