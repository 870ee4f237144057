// GitHub API endpoint functions.
// Typed methods for the repository endpoints the cache reads.

use crate::error::Result;

use super::client::GitHubClient;
use super::types::Repository;

/// Maximum page size the GitHub API accepts.
pub const MAX_PER_PAGE: u32 = 100;

impl GitHubClient {
    /// Get repositories owned by a user, most recently updated first.
    ///
    /// Only the first page is requested.
    pub async fn list_user_repos(&self, username: &str, per_page: u32) -> Result<Vec<Repository>> {
        let per_page = per_page.clamp(1, MAX_PER_PAGE).to_string();
        let params = [
            ("sort", "updated"),
            ("direction", "desc"),
            ("type", "owner"),
            ("per_page", per_page.as_str()),
        ];
        let response = self
            .get_with_params(&format!("/users/{}/repos", username), &params)
            .await?;
        let repos: Vec<Repository> = response.json().await?;
        Ok(repos)
    }

    /// Get a specific repository.
    pub async fn get_repo(&self, owner: &str, repo: &str) -> Result<Repository> {
        let response = self.get(&format!("/repos/{}/{}", owner, repo)).await?;
        let repository: Repository = response.json().await?;
        Ok(repository)
    }
}
