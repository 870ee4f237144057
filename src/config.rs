// Application configuration.
// Reads environment variables into the settings for storage, the KV cache, and GitHub.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::github::{DEFAULT_API_BASE, GitHubConfig};
use crate::repos::SyncSettings;

const DEFAULT_DATABASE_URL: &str = "sqlite://repocache.db";
const DEFAULT_REDIS_URL: &str = "redis://localhost:6379/0";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Durable storage URL (SQLite)
    pub database_url: String,
    /// Maximum database connections in pool
    pub database_max_connections: u32,
    /// KV cache backend settings
    pub cache: CacheConfig,
    /// GitHub API client settings
    pub github: GitHubConfig,
    /// Tracked account and the two cache windows
    pub sync: SyncSettings,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = non_empty(&lookup, "DATABASE_URL")
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let database_max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5u32)?;
        if database_max_connections == 0 {
            return Err(ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"));
        }

        // An explicitly empty REDIS_URL turns the KV layer off.
        let redis_url = match lookup("REDIS_URL") {
            None => Some(DEFAULT_REDIS_URL.to_string()),
            Some(value) => {
                let value = value.trim();
                if value.is_empty()
                    || value.eq_ignore_ascii_case("disabled")
                    || value.eq_ignore_ascii_case("none")
                {
                    None
                } else {
                    Some(value.to_string())
                }
            }
        };

        let cache = CacheConfig {
            url: redis_url,
            password: non_empty(&lookup, "REDIS_PASSWORD"),
            connect_timeout: Duration::from_secs(parse_or(
                &lookup,
                "REDIS_CONNECT_TIMEOUT_SECS",
                5u64,
            )?),
            op_timeout: Duration::from_secs(parse_or(&lookup, "REDIS_OP_TIMEOUT_SECS", 2u64)?),
        };

        let github = GitHubConfig {
            api_base: non_empty(&lookup, "GITHUB_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            token: non_empty(&lookup, "GITHUB_API_TOKEN"),
            timeout: Duration::from_secs(parse_or(&lookup, "GITHUB_TIMEOUT_SECS", 30u64)?),
        };

        let account = non_empty(&lookup, "GITHUB_USERNAME")
            .ok_or(ConfigError::MissingEnvVar("GITHUB_USERNAME"))?;
        let cache_hours = parse_or(&lookup, "GITHUB_CACHE_HOURS", 24u32)?;
        let response_secs = parse_or(
            &lookup,
            "GITHUB_RESPONSE_CACHE_SECS",
            u64::from(cache_hours) * 3600,
        )?;

        Ok(Self {
            database_url,
            database_max_connections,
            cache,
            github,
            sync: SyncSettings {
                account,
                freshness_window: chrono::Duration::hours(i64::from(cache_hours)),
                response_ttl: Duration::from_secs(response_secs),
            },
        })
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match non_empty(lookup, key) {
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue(key)),
        None => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[("GITHUB_USERNAME", "octocat")])).unwrap();

        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.cache.url.as_deref(), Some(DEFAULT_REDIS_URL));
        assert!(config.cache.password.is_none());
        assert_eq!(config.github.api_base, DEFAULT_API_BASE);
        assert_eq!(config.github.timeout, Duration::from_secs(30));
        assert!(config.github.token.is_none());
        assert_eq!(config.sync.account, "octocat");
        assert_eq!(config.sync.freshness_window, chrono::Duration::hours(24));
        assert_eq!(config.sync.response_ttl, Duration::from_secs(24 * 3600));
    }

    #[test]
    fn test_missing_username() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar("GITHUB_USERNAME")));

        let err = Config::from_lookup(lookup_from(&[("GITHUB_USERNAME", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar("GITHUB_USERNAME")));
    }

    #[test]
    fn test_invalid_numbers() {
        let err = Config::from_lookup(lookup_from(&[
            ("GITHUB_USERNAME", "octocat"),
            ("GITHUB_CACHE_HOURS", "-3"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue("GITHUB_CACHE_HOURS")));

        let err = Config::from_lookup(lookup_from(&[
            ("GITHUB_USERNAME", "octocat"),
            ("DATABASE_MAX_CONNECTIONS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS")
        ));
    }

    #[test]
    fn test_windows_are_independent() {
        let config = Config::from_lookup(lookup_from(&[
            ("GITHUB_USERNAME", "octocat"),
            ("GITHUB_CACHE_HOURS", "6"),
            ("GITHUB_RESPONSE_CACHE_SECS", "600"),
        ]))
        .unwrap();

        assert_eq!(config.sync.freshness_window, chrono::Duration::hours(6));
        assert_eq!(config.sync.response_ttl, Duration::from_secs(600));
    }

    #[test]
    fn test_response_ttl_follows_cache_hours() {
        let config = Config::from_lookup(lookup_from(&[
            ("GITHUB_USERNAME", "octocat"),
            ("GITHUB_CACHE_HOURS", "2"),
        ]))
        .unwrap();

        assert_eq!(config.sync.response_ttl, Duration::from_secs(7200));
    }

    #[test]
    fn test_redis_can_be_disabled() {
        for value in ["", "disabled", "NONE"] {
            let config = Config::from_lookup(lookup_from(&[
                ("GITHUB_USERNAME", "octocat"),
                ("REDIS_URL", value),
            ]))
            .unwrap();
            assert!(config.cache.url.is_none(), "REDIS_URL={value:?}");
        }
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("GITHUB_USERNAME", "octocat"),
            ("GITHUB_API_TOKEN", "ghp_secret"),
            ("GITHUB_API_URL", "http://localhost:9999/"),
            ("REDIS_URL", "memory://"),
            ("REDIS_PASSWORD", "hunter2"),
            ("DATABASE_URL", "sqlite::memory:"),
        ]))
        .unwrap();

        assert_eq!(config.github.token.as_deref(), Some("ghp_secret"));
        assert_eq!(config.github.api_base, "http://localhost:9999");
        assert_eq!(config.cache.url.as_deref(), Some("memory://"));
        assert_eq!(config.cache.password.as_deref(), Some("hunter2"));
        assert_eq!(config.database_url, "sqlite::memory:");
    }
}
