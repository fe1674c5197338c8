use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::{Config, DEFAULT_API_URL};
use crate::error::{ApiError, Error, Result};
use crate::github::api::{GitHubApi, RepoListOptions};
use crate::github::rate_limit::{RateLimitSnapshot, RateLimitTracker};
use crate::models::{CommitActivity, Contributor, LanguageBreakdown, Profile, Repository};

pub struct GitHubClient {
    client: Client,
    rate_limits: RateLimitTracker,
    base_url: Url,
}

#[derive(Deserialize)]
struct RateLimitResponse {
    rate: Option<RateLimitSnapshot>,
    resources: Option<RateLimitResources>,
}

#[derive(Deserialize)]
struct RateLimitResources {
    core: Option<RateLimitSnapshot>,
}

impl GitHubClient {
    pub fn new(token: Option<&str>) -> Result<Self> {
        Self::with_base_url(token, DEFAULT_API_URL)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_base_url(config.github_token.as_deref(), &config.api_url)
    }

    pub fn with_base_url(token: Option<&str>, base_url: &str) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        } else {
            tracing::debug!("No GitHub token configured, requests are unauthenticated");
        }
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            header::HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static("profile-insights/0.1"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = Url::parse(base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| Error::Config(format!("Invalid GitHub API URL: {}", base_url)))?;

        Ok(Self {
            client,
            rate_limits: RateLimitTracker::new(),
            base_url,
        })
    }

    pub fn rate_limits(&self) -> &RateLimitTracker {
        &self.rate_limits
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Appends `segments` to the base URL, percent-encoding each one so a
    /// handle or repository name can never change the endpoint.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Sends a GET and maps any non-2xx response to an `ApiError`. Rate-limit
    /// headers are recorded for every response received.
    async fn get(&self, url: Url) -> Result<Response> {
        tracing::debug!("GET {}", url);

        let response = self.client.get(url).send().await.map_err(|e| Error::Transport {
            message: e.to_string(),
        })?;
        self.rate_limits.update_from_headers(response.headers());

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.get(url).await?;
        Ok(response.json().await?)
    }

    async fn api_error(response: Response) -> Error {
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<serde_json::Value>(&text).ok();
        let generic = || format!("GitHub API request failed with status {}", status.as_u16());

        let message = match &body {
            Some(json) => json
                .get("message")
                .and_then(|m| m.as_str())
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .unwrap_or_else(generic),
            None => status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(generic),
        };

        tracing::debug!("GitHub API error {}: {}", status, message);
        Error::Api(ApiError {
            message,
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn get_user(&self, handle: &str) -> Result<Profile> {
        tracing::info!("Fetching user: {}", handle);
        self.get_json(self.endpoint(&["users", handle])).await
    }

    async fn list_repos(&self, handle: &str, options: &RepoListOptions) -> Result<Vec<Repository>> {
        tracing::info!("Fetching repositories for: {} (page {})", handle, options.page);
        let mut url = self.endpoint(&["users", handle, "repos"]);
        url.set_query(Some(&options.to_query()));
        self.get_json(url).await
    }

    async fn get_repo(&self, handle: &str, repo: &str) -> Result<Repository> {
        self.get_json(self.endpoint(&["repos", handle, repo])).await
    }

    async fn get_repo_languages(&self, handle: &str, repo: &str) -> Result<LanguageBreakdown> {
        tracing::debug!("Fetching languages for: {}/{}", handle, repo);
        self.get_json(self.endpoint(&["repos", handle, repo, "languages"]))
            .await
    }

    async fn get_commit_activity(&self, handle: &str, repo: &str) -> Result<Vec<CommitActivity>> {
        tracing::debug!("Fetching commit activity for: {}/{}", handle, repo);
        let response = self
            .get(self.endpoint(&["repos", handle, repo, "stats", "commit_activity"]))
            .await?;

        // 202 means GitHub is still computing the statistics.
        if response.status() == StatusCode::ACCEPTED {
            tracing::debug!("Commit activity for {}/{} not computed yet", handle, repo);
            return Ok(Vec::new());
        }

        let text = response.text().await?;
        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(value @ serde_json::Value::Array(_)) => Ok(serde_json::from_value(value)?),
            _ => Ok(Vec::new()),
        }
    }

    async fn get_contributors(&self, handle: &str, repo: &str) -> Result<Vec<Contributor>> {
        let response = self
            .get(self.endpoint(&["repos", handle, repo, "contributors"]))
            .await?;

        // Empty repositories answer 204 with no body.
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        Ok(response.json().await?)
    }

    async fn get_rate_limit(&self) -> Result<RateLimitSnapshot> {
        let response: RateLimitResponse = self.get_json(self.endpoint(&["rate_limit"])).await?;
        response
            .rate
            .or_else(|| response.resources.and_then(|r| r.core))
            .ok_or_else(|| Error::Parse("rate_limit response has no core quota".to_string()))
    }
}
