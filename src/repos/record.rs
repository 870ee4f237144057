// Normalized repository records.
// Converts GitHub payloads into the shape stored in both cache layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::github::Repository;

/// Star count at which a repository becomes featured on its own.
pub const FEATURED_MIN_STARS: i64 = 5;

/// A repository in the shape the portfolio serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoRecord {
    pub repo_name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub url: String,
    pub homepage: Option<String>,
    pub stars: i64,
    pub forks: i64,
    pub watchers: i64,
    pub language: Option<String>,
    pub topics: Vec<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub is_featured: bool,
}

impl From<Repository> for RepoRecord {
    fn from(repo: Repository) -> Self {
        // Any homepage value counts, including the "" GitHub sends once one is cleared.
        let is_featured = is_featured(repo.stargazers_count, repo.homepage.as_deref());

        Self {
            repo_name: repo.name,
            full_name: repo.full_name,
            description: repo.description,
            url: repo.html_url,
            homepage: repo.homepage,
            stars: repo.stargazers_count,
            forks: repo.forks_count,
            watchers: repo.watchers_count,
            language: repo.language,
            topics: repo.topics,
            last_updated: repo.updated_at,
            is_featured,
        }
    }
}

/// Featured repositories have enough stars or a homepage.
pub fn is_featured(stars: i64, homepage: Option<&str>) -> bool {
    stars >= FEATURED_MIN_STARS || homepage.is_some()
}

/// Normalize upstream repositories and order them by stars, most first.
pub fn normalize(repos: Vec<Repository>) -> Vec<RepoRecord> {
    let mut records: Vec<RepoRecord> = repos.into_iter().map(RepoRecord::from).collect();
    records.sort_by(|a, b| b.stars.cmp(&a.stars));
    records
}
