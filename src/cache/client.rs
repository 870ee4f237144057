// KV cache client.
// Dispatches to Redis, the in-process store, or a disabled no-op, swallowing every failure.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, IntoConnectionInfo, RedisResult};
use serde::{Serialize, de::DeserializeOwned};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::config::{BackendKind, CacheConfig};
use super::store::MemoryStore;
use super::CacheError;

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// No such key, or the cache is unavailable.
    Missing,
    /// The key exists without an expiry.
    Persistent,
    /// The key expires after the given duration.
    Expires(Duration),
}

impl KeyTtl {
    /// Interpret a Redis TTL reply (-2 missing, -1 no expiry).
    pub fn from_redis(secs: i64) -> Self {
        match secs {
            -1 => KeyTtl::Persistent,
            secs if secs >= 0 => KeyTtl::Expires(Duration::from_secs(secs.unsigned_abs())),
            _ => KeyTtl::Missing,
        }
    }

    /// Redis-style seconds: -2 missing, -1 no expiry, otherwise remaining seconds.
    pub fn as_secs(&self) -> i64 {
        match self {
            KeyTtl::Missing => -2,
            KeyTtl::Persistent => -1,
            KeyTtl::Expires(remaining) => i64::try_from(remaining.as_secs()).unwrap_or(i64::MAX),
        }
    }

    /// Remaining lifetime, if the key expires.
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            KeyTtl::Expires(remaining) => Some(*remaining),
            _ => None,
        }
    }
}

/// Redis connection with a per-operation deadline.
#[derive(Clone)]
pub struct RedisCache {
    conn: MultiplexedConnection,
    op_timeout: Duration,
}

impl RedisCache {
    /// Connect and verify the server answers PING.
    async fn connect(url: &str, config: &CacheConfig) -> Result<Self, CacheError> {
        let mut info = url.into_connection_info()?;
        if let Some(password) = &config.password {
            info.redis.password = Some(password.clone());
        }

        let client = redis::Client::open(info)?;
        let mut conn = timeout(
            config.connect_timeout,
            client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| CacheError::Timeout(config.connect_timeout))??;

        let _: String = timeout(
            config.connect_timeout,
            redis::cmd("PING").query_async(&mut conn),
        )
        .await
        .map_err(|_| CacheError::Timeout(config.connect_timeout))??;

        Ok(Self {
            conn,
            op_timeout: config.op_timeout,
        })
    }

    /// Run one command under the operation timeout.
    async fn run<T>(&self, op: impl Future<Output = RedisResult<T>>) -> Result<T, CacheError> {
        timeout(self.op_timeout, op)
            .await
            .map_err(|_| CacheError::Timeout(self.op_timeout))?
            .map_err(CacheError::from)
    }
}

/// Best-effort KV cache.
///
/// Every operation returns a safe default (`None`, `false`, `0`, no-op) when the
/// cache is disabled or the backend fails. Clones share the same backend, so the
/// client is built once at startup and handed to whoever needs it.
#[derive(Clone)]
pub enum CacheClient {
    Redis(RedisCache),
    Memory(MemoryStore),
    Disabled,
}

impl fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CacheClient")
            .field(&self.backend_name())
            .finish()
    }
}

impl CacheClient {
    /// Connect to the configured backend, falling back to `Disabled` on any failure.
    pub async fn connect(config: &CacheConfig) -> Self {
        match config.backend() {
            BackendKind::Disabled => {
                info!("KV cache disabled by configuration");
                CacheClient::Disabled
            }
            BackendKind::Memory => {
                info!("Using in-process KV cache");
                CacheClient::Memory(MemoryStore::new())
            }
            BackendKind::Redis(url) => match RedisCache::connect(url, config).await {
                Ok(redis) => {
                    info!("Successfully connected to Redis");
                    CacheClient::Redis(redis)
                }
                Err(err) => {
                    error!(error = %err, "Failed to connect to Redis");
                    warn!("Cache will operate in fallback mode (no caching)");
                    CacheClient::Disabled
                }
            },
        }
    }

    /// Release this handle. The connection closes once every clone is gone.
    pub async fn disconnect(self) {
        match self {
            CacheClient::Redis(_) => info!("Disconnected from Redis"),
            CacheClient::Memory(_) => debug!("Released in-process KV cache"),
            CacheClient::Disabled => {}
        }
    }

    /// Whether a backend is active.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, CacheClient::Disabled)
    }

    /// Short backend name for status output.
    pub fn backend_name(&self) -> &'static str {
        match self {
            CacheClient::Redis(_) => "redis",
            CacheClient::Memory(_) => "memory",
            CacheClient::Disabled => "disabled",
        }
    }

    /// Read and decode a JSON value.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw: Result<Option<String>, CacheError> = match self {
            CacheClient::Redis(redis) => {
                let mut conn = redis.conn.clone();
                redis.run(conn.get(key)).await
            }
            CacheClient::Memory(store) => Ok(store.get(key).await),
            CacheClient::Disabled => return None,
        };

        match raw {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(err) => {
                    error!(key, error = %err, "Failed to decode cached value");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                error!(key, error = %err, "Error getting cache key");
                None
            }
        }
    }

    /// Encode a value as JSON and store it with an expiry.
    ///
    /// A zero `ttl` stores nothing. Sub-second TTLs round up to one second on Redis.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) {
        if !self.is_enabled() {
            return;
        }
        if ttl.is_zero() {
            debug!(key, "Skipping cache write with zero TTL");
            return;
        }

        let serialized = match serde_json::to_string(value) {
            Ok(serialized) => serialized,
            Err(err) => {
                error!(key, error = %err, "Failed to encode cache value");
                return;
            }
        };

        let result: Result<(), CacheError> = match self {
            CacheClient::Redis(redis) => {
                let mut conn = redis.conn.clone();
                redis
                    .run(
                        redis::cmd("SETEX")
                            .arg(key)
                            .arg(ttl.as_secs().max(1))
                            .arg(&serialized)
                            .query_async(&mut conn),
                    )
                    .await
            }
            CacheClient::Memory(store) => {
                store.set_ex(key, serialized, ttl).await;
                Ok(())
            }
            CacheClient::Disabled => return,
        };

        match result {
            Ok(()) => debug!(key, ttl_secs = ttl.as_secs(), "Cached key"),
            Err(err) => error!(key, error = %err, "Error setting cache key"),
        }
    }

    /// Remove a key. Missing keys are fine.
    pub async fn delete(&self, key: &str) {
        let result: Result<(), CacheError> = match self {
            CacheClient::Redis(redis) => {
                let mut conn = redis.conn.clone();
                redis.run(conn.del::<_, i64>(key)).await.map(|_| ())
            }
            CacheClient::Memory(store) => {
                store.delete(key).await;
                Ok(())
            }
            CacheClient::Disabled => return,
        };

        match result {
            Ok(()) => debug!(key, "Deleted cache key"),
            Err(err) => error!(key, error = %err, "Error deleting cache key"),
        }
    }

    /// Check whether a key exists.
    pub async fn exists(&self, key: &str) -> bool {
        let result: Result<bool, CacheError> = match self {
            CacheClient::Redis(redis) => {
                let mut conn = redis.conn.clone();
                redis.run(conn.exists(key)).await
            }
            CacheClient::Memory(store) => Ok(store.exists(key).await),
            CacheClient::Disabled => return false,
        };

        result.unwrap_or_else(|err| {
            error!(key, error = %err, "Error checking cache key");
            false
        })
    }

    /// Remaining lifetime of a key. `Missing` when disabled or on error.
    pub async fn ttl(&self, key: &str) -> KeyTtl {
        let result: Result<KeyTtl, CacheError> = match self {
            CacheClient::Redis(redis) => {
                let mut conn = redis.conn.clone();
                redis
                    .run(conn.ttl::<_, i64>(key))
                    .await
                    .map(KeyTtl::from_redis)
            }
            CacheClient::Memory(store) => Ok(store.ttl(key).await),
            CacheClient::Disabled => return KeyTtl::Missing,
        };

        result.unwrap_or_else(|err| {
            error!(key, error = %err, "Error getting TTL for key");
            KeyTtl::Missing
        })
    }

    /// Atomically add `amount` to a counter and return the new value.
    ///
    /// Returns 0 when disabled or on error, which is indistinguishable from a
    /// counter that really is zero.
    pub async fn increment(&self, key: &str, amount: i64) -> i64 {
        let result: Result<i64, CacheError> = match self {
            CacheClient::Redis(redis) => {
                let mut conn = redis.conn.clone();
                redis.run(conn.incr(key, amount)).await
            }
            CacheClient::Memory(store) => store.incr_by(key, amount).await,
            CacheClient::Disabled => return 0,
        };

        result.unwrap_or_else(|err| {
            error!(key, error = %err, "Error incrementing cache key");
            0
        })
    }

    /// Set a new expiry on an existing key.
    pub async fn expire(&self, key: &str, ttl: Duration) {
        let result: Result<bool, CacheError> = match self {
            CacheClient::Redis(redis) => {
                let mut conn = redis.conn.clone();
                redis
                    .run(
                        redis::cmd("EXPIRE")
                            .arg(key)
                            .arg(ttl.as_secs().max(1))
                            .query_async(&mut conn),
                    )
                    .await
            }
            CacheClient::Memory(store) => Ok(store.expire(key, ttl).await),
            CacheClient::Disabled => return,
        };

        match result {
            Ok(applied) => debug!(key, applied, "Set expiry for key"),
            Err(err) => error!(key, error = %err, "Error setting expiry for key"),
        }
    }
}
