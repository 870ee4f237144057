// Error types for repocache.
// Covers GitHub API failures, durable storage errors, and configuration problems.

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum RepoCacheError {
    #[error("GitHub API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("GitHub authentication failed: invalid or expired token")]
    Unauthorized,

    #[error("GitHub resource not found: {0}")]
    NotFound(String),

    #[error("GitHub rate limit exceeded, resets at {reset_at}")]
    RateLimited { reset_at: String },

    #[error("GitHub API returned HTTP {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("No repositories found for GitHub account {0}")]
    NoRepositories(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Other(String),
}

impl RepoCacheError {
    /// Whether the error means the GitHub API could not be used.
    ///
    /// Read paths may swallow these when a durable snapshot already exists.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            RepoCacheError::Api(_)
                | RepoCacheError::Unauthorized
                | RepoCacheError::NotFound(_)
                | RepoCacheError::RateLimited { .. }
                | RepoCacheError::UpstreamStatus { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RepoCacheError>;
