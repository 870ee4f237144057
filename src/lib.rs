// repocache library.
// GitHub repository cache with a durable SQLite snapshot and a best-effort KV response cache.

pub mod cache;
pub mod config;
pub mod error;
pub mod github;
pub mod repos;

pub use cache::{CacheClient, CacheConfig};
pub use config::Config;
pub use error::{RepoCacheError, Result};
pub use github::{GitHubClient, GitHubConfig};
pub use repos::{ListQuery, RepoCacheManager, RepoStore, SyncSettings};
