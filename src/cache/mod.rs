// KV cache module.
// Best-effort caching over Redis or an in-process store that degrades to a no-op.

pub mod client;
pub mod config;
pub mod store;

use std::time::Duration;

use thiserror::Error;

pub use client::{CacheClient, KeyTtl};
pub use config::{BackendKind, CacheConfig, MEMORY_URL};
pub use store::MemoryStore;

/// Failures inside the cache backends. Logged by the client, never returned to callers.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("value at {0} is not an integer")]
    NotAnInteger(String),

    #[error("increment of {0} would overflow")]
    Overflow(String),
}
