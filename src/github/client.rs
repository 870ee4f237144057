// GitHub API HTTP client.
// Handles authentication, timeouts, rate limit tracking, and status mapping.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use reqwest::{
    Client, Response, StatusCode,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT},
};
use tracing::debug;

use crate::error::{RepoCacheError, Result};

use super::types::RateLimit;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Settings for the GitHub API client.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// API root, without a trailing slash.
    pub api_base: String,
    /// Optional personal access token.
    pub token: Option<String>,
    /// Upper bound for a whole request.
    pub timeout: Duration,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// GitHub API client with optional authentication and rate limit tracking.
#[derive(Debug)]
pub struct GitHubClient {
    client: Client,
    api_base: String,
    rate_limit: Mutex<RateLimit>,
}

impl GitHubClient {
    /// Create a new GitHub client.
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();

        if let Some(token) = &config.token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| RepoCacheError::Other(e.to_string()))?,
            );
        }
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("repocache"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(RepoCacheError::Api)?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            rate_limit: Mutex::new(RateLimit::default()),
        })
    }

    /// Get the rate limit reported by the last response.
    pub fn rate_limit(&self) -> RateLimit {
        self.rate_limit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Make a GET request to the GitHub API.
    pub async fn get(&self, endpoint: &str) -> Result<Response> {
        let url = format!("{}{}", self.api_base, endpoint);
        debug!(%url, "GitHub GET");
        let response = self.client.get(&url).send().await?;

        self.update_rate_limit(&response);
        check_response(response).await
    }

    /// Make a GET request with query parameters.
    pub async fn get_with_params<T: serde::Serialize + ?Sized>(
        &self,
        endpoint: &str,
        params: &T,
    ) -> Result<Response> {
        let url = format!("{}{}", self.api_base, endpoint);
        debug!(%url, "GitHub GET");
        let response = self.client.get(&url).query(params).send().await?;

        self.update_rate_limit(&response);
        check_response(response).await
    }

    /// Update rate limit from response headers.
    fn update_rate_limit(&self, response: &Response) {
        let mut rate_limit = self
            .rate_limit
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(limit) = header_u64(response, "x-ratelimit-limit") {
            rate_limit.limit = limit;
        }
        if let Some(remaining) = header_u64(response, "x-ratelimit-remaining") {
            rate_limit.remaining = remaining;
        }
        if let Some(reset) = header_u64(response, "x-ratelimit-reset") {
            rate_limit.reset = reset;
        }
    }
}

fn header_u64(response: &Response, name: &str) -> Option<u64> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Check response status and convert errors.
async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED => Err(RepoCacheError::Unauthorized),
        StatusCode::NOT_FOUND => Err(RepoCacheError::NotFound(response.url().to_string())),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
            if status == StatusCode::TOO_MANY_REQUESTS
                || header_u64(&response, "x-ratelimit-remaining") == Some(0) =>
        {
            let reset_at = header_u64(&response, "x-ratelimit-reset")
                .and_then(|reset| i64::try_from(reset).ok())
                .and_then(|reset| chrono::DateTime::from_timestamp(reset, 0))
                .map(|dt| dt.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "unknown".to_string());
            Err(RepoCacheError::RateLimited { reset_at })
        }
        status => Err(RepoCacheError::UpstreamStatus {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        }),
    }
}
