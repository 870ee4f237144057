// GitHub API response types.
// Defines the subset of the REST payloads the repository cache consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// GitHub repository as listed by `/users/{user}/repos`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: String,
    pub homepage: Option<String>,
    #[serde(default)]
    pub stargazers_count: i64,
    #[serde(default)]
    pub forks_count: i64,
    #[serde(default)]
    pub watchers_count: i64,
    pub language: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Rate limit information from response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: u64,
    pub remaining: u64,
    pub reset: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_repository() {
        let json = r#"{
            "id": 1296269,
            "name": "Hello-World",
            "full_name": "octocat/Hello-World",
            "description": "This your first repo!",
            "html_url": "https://github.com/octocat/Hello-World",
            "homepage": "https://github.com",
            "stargazers_count": 80,
            "forks_count": 9,
            "watchers_count": 80,
            "language": "Rust",
            "topics": ["octocat", "api"],
            "updated_at": "2011-01-26T19:14:43Z",
            "private": false
        }"#;

        let repo: Repository = serde_json::from_str(json).unwrap();
        assert_eq!(repo.name, "Hello-World");
        assert_eq!(repo.stargazers_count, 80);
        assert_eq!(repo.topics, vec!["octocat", "api"]);
        assert_eq!(
            repo.updated_at.unwrap().to_rfc3339(),
            "2011-01-26T19:14:43+00:00"
        );
    }

    #[test]
    fn test_deserialize_sparse_repository() {
        let json = r#"{
            "name": "bare",
            "full_name": "octocat/bare",
            "description": null,
            "html_url": "https://github.com/octocat/bare",
            "homepage": null,
            "language": null,
            "updated_at": null
        }"#;

        let repo: Repository = serde_json::from_str(json).unwrap();
        assert!(repo.description.is_none());
        assert!(repo.homepage.is_none());
        assert_eq!(repo.stargazers_count, 0);
        assert!(repo.topics.is_empty());
        assert!(repo.updated_at.is_none());
    }
}
