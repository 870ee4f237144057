// KV cache configuration.
// Selects the backend from the configured URL and bounds connect/operation time.

use std::time::Duration;

/// URL scheme selecting the in-process store instead of Redis.
pub const MEMORY_URL: &str = "memory://";

/// Settings for the KV cache backend.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Backend URL. `None` disables caching; `memory://` selects the in-process store.
    pub url: Option<String>,
    /// Password applied on top of the URL credentials.
    pub password: Option<String>,
    /// Upper bound for connecting and the startup PING.
    pub connect_timeout: Duration,
    /// Upper bound for each individual cache operation.
    pub op_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: None,
            password: None,
            connect_timeout: Duration::from_secs(5),
            op_timeout: Duration::from_secs(2),
        }
    }
}

/// Which backend a configuration asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind<'a> {
    Redis(&'a str),
    Memory,
    Disabled,
}

impl CacheConfig {
    /// Configuration for a Redis backend at `url`.
    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Configuration for the in-process store.
    pub fn memory() -> Self {
        Self::redis(MEMORY_URL)
    }

    /// Resolve the backend named by the URL.
    pub fn backend(&self) -> BackendKind<'_> {
        match self.url.as_deref() {
            None => BackendKind::Disabled,
            Some(url) if url.starts_with(MEMORY_URL) => BackendKind::Memory,
            Some(url) => BackendKind::Redis(url),
        }
    }
}
