// Durable repository snapshot in SQLite.
// Upserts by repo_name, serves ordered reads, and reports the freshness marker.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::types::Json;
use tracing::{debug, info};

use crate::error::Result;

use super::record::RepoRecord;

const UPSERT_SQL: &str = r#"
    INSERT INTO github_repos (
        repo_name, full_name, description, url, homepage, stars, forks, watchers,
        language, topics, last_updated, is_featured, cached_at
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
    ON CONFLICT (repo_name) DO UPDATE SET
        full_name = excluded.full_name,
        description = excluded.description,
        url = excluded.url,
        homepage = excluded.homepage,
        stars = excluded.stars,
        forks = excluded.forks,
        watchers = excluded.watchers,
        language = excluded.language,
        topics = excluded.topics,
        last_updated = excluded.last_updated,
        is_featured = excluded.is_featured,
        cached_at = excluded.cached_at
"#;

/// A row of the durable snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct CachedRepository {
    pub id: i64,
    pub repo_name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub url: String,
    pub homepage: Option<String>,
    pub stars: i64,
    pub forks: i64,
    pub watchers: i64,
    pub language: Option<String>,
    #[sqlx(json)]
    pub topics: Vec<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub is_featured: bool,
    /// When this row was last written locally.
    pub cached_at: DateTime<Utc>,
}

/// SQLite-backed repository snapshot.
#[derive(Debug, Clone)]
pub struct RepoStore {
    pool: SqlitePool,
}

impl RepoStore {
    /// Open (creating if needed) the database at `url`.
    ///
    /// In-memory databases live in a single connection that is never recycled.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        let pool = if is_memory_url(url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(max_connections)
                .connect_with(options)
                .await?
        };

        info!("Database connection pool established");
        Ok(Self { pool })
    }

    /// Fresh, migrated in-memory store.
    pub async fn in_memory() -> Result<Self> {
        let store = Self::connect("sqlite::memory:", 1).await?;
        store.migrate().await?;
        Ok(store)
    }

    /// Apply the embedded migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        debug!("Database migrations completed");
        Ok(())
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Insert or update every record in one transaction, stamping `cached_at`.
    ///
    /// Either the whole batch is applied or none of it is.
    pub async fn upsert_all(&self, records: &[RepoRecord], cached_at: DateTime<Utc>) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        for record in records {
            sqlx::query(UPSERT_SQL)
                .bind(record.repo_name.as_str())
                .bind(record.full_name.as_str())
                .bind(record.description.as_deref())
                .bind(record.url.as_str())
                .bind(record.homepage.as_deref())
                .bind(record.stars)
                .bind(record.forks)
                .bind(record.watchers)
                .bind(record.language.as_deref())
                .bind(Json(&record.topics))
                .bind(record.last_updated)
                .bind(record.is_featured)
                .bind(cached_at)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(count = records.len(), "Upserted repositories");
        Ok(records.len())
    }

    /// Look up one repository by name.
    pub async fn find_by_name(&self, repo_name: &str) -> Result<Option<CachedRepository>> {
        let repo = sqlx::query_as::<_, CachedRepository>(
            "SELECT * FROM github_repos WHERE repo_name = ?1",
        )
        .bind(repo_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(repo)
    }

    /// Repositories ordered by stars then recency, optionally featured only.
    pub async fn list(&self, featured_only: bool, limit: u32) -> Result<Vec<CachedRepository>> {
        let repos = sqlx::query_as::<_, CachedRepository>(
            r#"
            SELECT * FROM github_repos
            WHERE (?1 = 0 OR is_featured = 1)
            ORDER BY stars DESC, last_updated DESC, repo_name ASC
            LIMIT ?2
            "#,
        )
        .bind(featured_only)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(repos)
    }

    /// Number of stored repositories.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM github_repos")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Most recent `cached_at`, or `None` when the store is empty.
    pub async fn latest_cached_at(&self) -> Result<Option<DateTime<Utc>>> {
        let latest: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT cached_at FROM github_repos ORDER BY cached_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(latest)
    }

    /// Delete every row, returning how many there were.
    pub async fn clear(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM github_repos")
            .fetch_one(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM github_repos")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(count.unsigned_abs())
    }
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn record(name: &str, stars: i64) -> RepoRecord {
        RepoRecord {
            repo_name: name.to_string(),
            full_name: format!("octocat/{}", name),
            description: Some(format!("{} description", name)),
            url: format!("https://github.com/octocat/{}", name),
            homepage: None,
            stars,
            forks: 1,
            watchers: stars,
            language: Some("Rust".to_string()),
            topics: vec!["portfolio".to_string(), "rust".to_string()],
            last_updated: Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()),
            is_featured: stars >= 5,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_find() {
        let store = RepoStore::in_memory().await.unwrap();
        let now = Utc::now();

        let count = store
            .upsert_all(&[record("alpha", 7), record("beta", 2)], now)
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(store.count().await.unwrap(), 2);

        let alpha = store.find_by_name("alpha").await.unwrap().unwrap();
        assert_eq!(alpha.stars, 7);
        assert_eq!(alpha.topics, vec!["portfolio", "rust"]);
        assert!(alpha.is_featured);
        assert_eq!(alpha.cached_at, now);

        assert!(store.find_by_name("gamma").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_updates_in_place() {
        let store = RepoStore::in_memory().await.unwrap();
        let first = Utc::now() - chrono::Duration::hours(2);
        let second = Utc::now();

        store.upsert_all(&[record("alpha", 1)], first).await.unwrap();
        let original = store.find_by_name("alpha").await.unwrap().unwrap();

        let mut changed = record("alpha", 42);
        changed.description = None;
        changed.topics = vec![];
        store.upsert_all(&[changed], second).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let updated = store.find_by_name("alpha").await.unwrap().unwrap();
        assert_eq!(updated.id, original.id);
        assert_eq!(updated.stars, 42);
        assert!(updated.description.is_none());
        assert!(updated.topics.is_empty());
        assert_eq!(updated.cached_at, second);
    }

    #[tokio::test]
    async fn test_duplicate_names_in_one_batch() {
        let store = RepoStore::in_memory().await.unwrap();

        store
            .upsert_all(&[record("alpha", 1), record("alpha", 9)], Utc::now())
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.find_by_name("alpha").await.unwrap().unwrap().stars, 9);
    }

    #[tokio::test]
    async fn test_failed_row_rolls_back_batch() {
        let store = RepoStore::in_memory().await.unwrap();
        store.upsert_all(&[record("a", 1)], Utc::now()).await.unwrap();

        sqlx::query(
            r#"
            CREATE TRIGGER reject_bad BEFORE INSERT ON github_repos
            WHEN NEW.repo_name = 'bad'
            BEGIN
                SELECT RAISE(ABORT, 'rejected');
            END
            "#,
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let result = store
            .upsert_all(&[record("a", 9), record("bad", 2), record("c", 3)], Utc::now())
            .await;
        assert!(result.is_err());

        // Nothing from the failed batch is visible
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.find_by_name("a").await.unwrap().unwrap().stars, 1);
        assert!(store.find_by_name("c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_batch_on_empty_store() {
        let store = RepoStore::in_memory().await.unwrap();
        sqlx::query(
            "CREATE TRIGGER reject_bad BEFORE INSERT ON github_repos \
             WHEN NEW.repo_name = 'bad' BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let result = store
            .upsert_all(&[record("a", 1), record("bad", 2), record("c", 3)], Utc::now())
            .await;
        assert!(result.is_err());
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.latest_cached_at().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_order_filter_and_limit() {
        let store = RepoStore::in_memory().await.unwrap();

        let mut older = record("older", 10);
        older.last_updated = Some(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        let mut undated = record("undated", 10);
        undated.last_updated = None;

        store
            .upsert_all(
                &[record("small", 1), older, record("newer", 10), undated, record("mid", 6)],
                Utc::now(),
            )
            .await
            .unwrap();

        let names: Vec<String> = store
            .list(false, 50)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.repo_name)
            .collect();
        assert_eq!(names, vec!["newer", "older", "undated", "mid", "small"]);

        let featured = store.list(true, 50).await.unwrap();
        assert_eq!(featured.len(), 4);
        assert!(featured.iter().all(|r| r.is_featured));

        assert_eq!(store.list(false, 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_latest_cached_at() {
        let store = RepoStore::in_memory().await.unwrap();
        assert!(store.latest_cached_at().await.unwrap().is_none());

        let old = Utc::now() - chrono::Duration::hours(30);
        let recent = Utc::now() - chrono::Duration::minutes(5);
        store.upsert_all(&[record("old", 1)], old).await.unwrap();
        store.upsert_all(&[record("recent", 1)], recent).await.unwrap();

        assert_eq!(store.latest_cached_at().await.unwrap(), Some(recent));
    }

    #[tokio::test]
    async fn test_clear_returns_count() {
        let store = RepoStore::in_memory().await.unwrap();
        store
            .upsert_all(&[record("a", 1), record("b", 2), record("c", 3)], Utc::now())
            .await
            .unwrap();

        assert_eq!(store.clear().await.unwrap(), 3);
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.latest_cached_at().await.unwrap().is_none());
        assert_eq!(store.clear().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let temp_dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", temp_dir.path().join("repos.db").display());

        let store = RepoStore::connect(&url, 2).await.unwrap();
        store.migrate().await.unwrap();
        store.upsert_all(&[record("kept", 5)], Utc::now()).await.unwrap();
        store.close().await;

        let reopened = RepoStore::connect(&url, 2).await.unwrap();
        reopened.migrate().await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        assert!(reopened.find_by_name("kept").await.unwrap().is_some());
    }
}
