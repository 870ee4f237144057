// Repository cache manager.
// Decides freshness, fetches from GitHub through the KV layer, and reconciles the durable snapshot.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::CacheClient;
use crate::config::Config;
use crate::error::{RepoCacheError, Result};
use crate::github::{GitHubClient, MAX_PER_PAGE};

use super::record::{RepoRecord, normalize};
use super::store::{CachedRepository, RepoStore};

/// Default number of repositories returned by a listing.
pub const DEFAULT_LIST_LIMIT: u32 = 20;
/// Upper bound on a listing.
pub const MAX_LIST_LIMIT: u32 = 50;

/// The tracked account and the two independent cache windows.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// GitHub account whose repositories are cached.
    pub account: String,
    /// How long the durable snapshot counts as fresh.
    pub freshness_window: chrono::Duration,
    /// How long a raw GitHub response lives in the KV cache.
    pub response_ttl: Duration,
}

impl SyncSettings {
    /// Settings with 24 hour windows on both layers.
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            freshness_window: chrono::Duration::hours(24),
            response_ttl: Duration::from_secs(24 * 3600),
        }
    }
}

/// Parameters for [`RepoCacheManager::list_repositories`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ListQuery {
    pub limit: Option<u32>,
    pub featured_only: bool,
    pub force_refresh: bool,
}

impl ListQuery {
    /// Requested limit, defaulted and clamped to `1..=MAX_LIST_LIMIT`.
    pub fn effective_limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub processed_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatus {
    pub valid: bool,
    pub age_hours: Option<f64>,
    pub exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClearReport {
    pub deleted_count: u64,
}

/// State of the KV response cache for the tracked account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseCacheStatus {
    pub backend: &'static str,
    pub cached: bool,
    pub count: usize,
    pub expires_in_secs: u64,
    pub cache_hours: i64,
    /// Successful upstream fetches recorded by the KV counter.
    pub upstream_fetches: i64,
}

/// Whether a snapshot written at `latest` is still fresh at `now`.
///
/// The boundary itself counts as expired.
pub fn is_fresh(latest: DateTime<Utc>, window: chrono::Duration, now: DateTime<Utc>) -> bool {
    match latest.checked_add_signed(window) {
        Some(expiry) => now < expiry,
        None => true,
    }
}

/// Two-layer repository cache for one GitHub account.
#[derive(Debug)]
pub struct RepoCacheManager {
    github: GitHubClient,
    store: RepoStore,
    cache: CacheClient,
    settings: SyncSettings,
}

impl RepoCacheManager {
    pub fn new(
        github: GitHubClient,
        store: RepoStore,
        cache: CacheClient,
        settings: SyncSettings,
    ) -> Self {
        Self {
            github,
            store,
            cache,
            settings,
        }
    }

    /// Build every collaborator from configuration and run migrations.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let github = GitHubClient::new(&config.github)?;
        let store = RepoStore::connect(&config.database_url, config.database_max_connections).await?;
        store.migrate().await?;
        let cache = CacheClient::connect(&config.cache).await;

        Ok(Self::new(github, store, cache, config.sync.clone()))
    }

    pub fn store(&self) -> &RepoStore {
        &self.store
    }

    pub fn cache(&self) -> &CacheClient {
        &self.cache
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Release the database pool and the KV handle.
    pub async fn shutdown(self) {
        self.store.close().await;
        self.cache.disconnect().await;
    }

    fn response_key(&self) -> String {
        format!("github_repos_{}", self.settings.account)
    }

    fn fetch_counter_key(&self) -> String {
        format!("github_fetches_{}", self.settings.account)
    }

    /// Whether the durable snapshot is younger than `window`.
    pub async fn is_cache_valid(&self, window: chrono::Duration) -> Result<bool> {
        let latest = self.store.latest_cached_at().await?;
        Ok(latest.is_some_and(|latest| is_fresh(latest, window, Utc::now())))
    }

    /// Time since the newest durable write.
    pub async fn cache_age(&self) -> Result<Option<chrono::Duration>> {
        let latest = self.store.latest_cached_at().await?;
        Ok(latest.map(|latest| Utc::now() - latest))
    }

    /// Repositories for the tracked account, from the KV cache unless forced.
    ///
    /// A cached empty list is treated as a miss on purpose: an empty entry and a
    /// missing one mean the same thing, so an account with no repositories asks
    /// GitHub again on every call. Upstream errors propagate.
    pub async fn fetch_repositories(&self, force_refresh: bool) -> Result<Vec<RepoRecord>> {
        let key = self.response_key();

        if !force_refresh {
            if let Some(records) = self.cache.get::<Vec<RepoRecord>>(&key).await {
                if !records.is_empty() {
                    debug!(count = records.len(), "Using cached GitHub response");
                    return Ok(records);
                }
            }
        }

        info!(account = %self.settings.account, "Fetching repositories from GitHub");
        let repos = self
            .github
            .list_user_repos(&self.settings.account, MAX_PER_PAGE)
            .await?;
        self.cache.increment(&self.fetch_counter_key(), 1).await;

        let records = normalize(repos);
        self.cache
            .set(&key, &records, self.settings.response_ttl)
            .await;

        info!(count = records.len(), "Fetched repositories from GitHub");
        Ok(records)
    }

    /// Upsert records into the durable snapshot, stamping them with the current time.
    pub async fn reconcile_repositories(&self, records: &[RepoRecord]) -> Result<usize> {
        self.store.upsert_all(records, Utc::now()).await
    }

    async fn refresh(&self, force_refresh: bool) -> Result<usize> {
        let records = self.fetch_repositories(force_refresh).await?;
        self.reconcile_repositories(&records).await
    }

    /// List repositories from the durable snapshot, refreshing it first when stale or forced.
    ///
    /// Upstream failures are logged and the existing snapshot served; they are
    /// returned only when there is nothing stored yet.
    pub async fn list_repositories(&self, query: ListQuery) -> Result<Vec<CachedRepository>> {
        let needs_refresh = query.force_refresh
            || !self.is_cache_valid(self.settings.freshness_window).await?;

        if needs_refresh {
            if let Err(err) = self.refresh(query.force_refresh).await {
                if !err.is_upstream() {
                    return Err(err);
                }
                let stored = self.store.count().await?;
                if stored == 0 {
                    return Err(err);
                }
                warn!(error = %err, stored, "Refresh failed, serving cached repositories");
            }
        }

        self.store
            .list(query.featured_only, query.effective_limit())
            .await
    }

    /// Force a fetch from GitHub and reconcile it into the durable snapshot.
    pub async fn sync_repositories(&self) -> Result<SyncReport> {
        let records = self.fetch_repositories(true).await?;
        if records.is_empty() {
            return Err(RepoCacheError::NoRepositories(self.settings.account.clone()));
        }

        let processed_count = self.reconcile_repositories(&records).await?;
        info!(processed_count, "Synced repositories");
        Ok(SyncReport { processed_count })
    }

    /// Freshness and age of the durable snapshot.
    pub async fn cache_status(&self) -> Result<CacheStatus> {
        let now = Utc::now();
        let status = match self.store.latest_cached_at().await? {
            Some(latest) => CacheStatus {
                valid: is_fresh(latest, self.settings.freshness_window, now),
                age_hours: Some((now - latest).num_milliseconds() as f64 / 3_600_000.0),
                exists: true,
            },
            None => CacheStatus {
                valid: false,
                age_hours: None,
                exists: false,
            },
        };
        Ok(status)
    }

    /// Delete the durable snapshot. The KV response cache is left alone.
    pub async fn clear_cache(&self) -> Result<ClearReport> {
        let deleted_count = self.store.clear().await?;
        info!(deleted_count, "Cleared cached repositories");
        Ok(ClearReport { deleted_count })
    }

    /// Drop the cached GitHub response for the tracked account.
    pub async fn clear_response_cache(&self) {
        self.cache.delete(&self.response_key()).await;
        info!("GitHub response cache cleared");
    }

    /// What the KV layer currently holds for the tracked account.
    pub async fn response_cache_status(&self) -> ResponseCacheStatus {
        let key = self.response_key();
        let cached = self.cache.get::<Vec<RepoRecord>>(&key).await;
        let ttl = self.cache.ttl(&key).await;
        let upstream_fetches = self
            .cache
            .get::<i64>(&self.fetch_counter_key())
            .await
            .unwrap_or(0);

        ResponseCacheStatus {
            backend: self.cache.backend_name(),
            cached: cached.is_some(),
            count: cached.map_or(0, |records| records.len()),
            expires_in_secs: ttl.remaining().map_or(0, |remaining| remaining.as_secs()),
            cache_hours: self.settings.freshness_window.num_hours(),
            upstream_fetches,
        }
    }

    /// One repository from the durable snapshot.
    pub async fn find_repository(&self, name: &str) -> Result<Option<CachedRepository>> {
        self.store.find_by_name(name).await
    }

    /// One repository straight from GitHub. Nothing is stored.
    pub async fn fetch_repository_details(&self, name: &str) -> Result<RepoRecord> {
        let repo = self.github.get_repo(&self.settings.account, name).await?;
        Ok(RepoRecord::from(repo))
    }
}
