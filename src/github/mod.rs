// GitHub API module.
// Provides the client and types for reading repositories from the GitHub REST API.

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::{DEFAULT_API_BASE, GitHubClient, GitHubConfig};
pub use endpoints::MAX_PER_PAGE;
pub use types::*;
