use std::env;
use std::time::Duration;

use crate::cache::{QueryPolicy, ResourceKind};
use crate::error::{Error, Result};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub github_token: Option<String>,
    pub api_url: String,
    pub profile_stale_secs: u64,
    pub repos_stale_secs: u64,
    pub retry: u32,
    pub retry_delay_ms: u64,
    pub top_languages: usize,
    pub top_repositories: usize,
    pub include_forks: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Unauthenticated requests are allowed, just with a lower rate ceiling.
        let github_token = env::var("GITHUB_TOKEN").ok().filter(|t| !t.trim().is_empty());

        let api_url = env::var("GITHUB_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "GITHUB_API_URL must be an http(s) URL, got {}",
                api_url
            )));
        }

        let profile_stale_secs = parse_var("PROFILE_STALE_SECS").unwrap_or(300);
        let repos_stale_secs = parse_var("REPOS_STALE_SECS").unwrap_or(60);
        let retry = parse_var("QUERY_RETRY").unwrap_or(2);
        let retry_delay_ms = parse_var("RETRY_DELAY_MS").unwrap_or(1000);
        let top_languages = parse_var("TOP_LANGUAGES").unwrap_or(8);
        let top_repositories = parse_var("TOP_REPOSITORIES").unwrap_or(5);

        let include_forks = env::var("INCLUDE_FORKS")
            .ok()
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        Ok(Self {
            github_token,
            api_url: api_url.trim_end_matches('/').to_string(),
            profile_stale_secs,
            repos_stale_secs,
            retry,
            retry_delay_ms,
            top_languages,
            top_repositories,
            include_forks,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Per-resource query policies used by the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub profile: QueryPolicy,
    pub repos: QueryPolicy,
    pub repo_resources: QueryPolicy,
    pub rate_limit: QueryPolicy,
}

impl CacheConfig {
    pub fn policy_for(&self, kind: ResourceKind) -> &QueryPolicy {
        match kind {
            ResourceKind::User => &self.profile,
            ResourceKind::Repos => &self.repos,
            ResourceKind::RateLimit => &self.rate_limit,
            ResourceKind::Repo
            | ResourceKind::Languages
            | ResourceKind::CommitActivity
            | ResourceKind::Contributors => &self.repo_resources,
        }
    }

    /// No staleness window and no backoff delay; handy for tests.
    pub fn immediate(retry: u32) -> Self {
        let policy = QueryPolicy {
            stale_time: None,
            retry,
            retry_delay: Duration::ZERO,
            max_retry_delay: Duration::ZERO,
        };
        Self {
            profile: policy.clone(),
            repos: policy.clone(),
            repo_resources: policy.clone(),
            rate_limit: policy,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        let base = QueryPolicy::default();
        Self {
            profile: QueryPolicy {
                stale_time: Some(Duration::from_secs(5 * 60)),
                ..base.clone()
            },
            repos: QueryPolicy {
                stale_time: Some(Duration::from_secs(60)),
                ..base.clone()
            },
            repo_resources: base.clone(),
            rate_limit: base,
        }
    }
}

impl From<&Config> for CacheConfig {
    fn from(config: &Config) -> Self {
        let base = QueryPolicy {
            retry: config.retry,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            ..QueryPolicy::default()
        };
        let stale = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));

        Self {
            profile: QueryPolicy {
                stale_time: stale(config.profile_stale_secs),
                ..base.clone()
            },
            repos: QueryPolicy {
                stale_time: stale(config.repos_stale_secs),
                ..base.clone()
            },
            repo_resources: base.clone(),
            rate_limit: base,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AggregateConfig {
    pub top_languages: usize,
    pub top_repositories: usize,
    pub include_forks: bool,
    pub fetch_all_pages: bool,
    pub show_progress: bool,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            top_languages: 8,
            top_repositories: 5,
            include_forks: true,
            fetch_all_pages: false,
            show_progress: false,
        }
    }
}

impl From<&Config> for AggregateConfig {
    fn from(config: &Config) -> Self {
        Self {
            top_languages: config.top_languages,
            top_repositories: config.top_repositories,
            include_forks: config.include_forks,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policies() {
        let config = CacheConfig::default();
        assert_eq!(
            config.policy_for(ResourceKind::User).stale_time,
            Some(Duration::from_secs(300))
        );
        assert_eq!(config.policy_for(ResourceKind::Languages).stale_time, None);
        assert_eq!(config.policy_for(ResourceKind::CommitActivity).retry, 2);
    }

    #[test]
    fn test_zero_stale_secs_disables_window() {
        let config = Config {
            github_token: None,
            api_url: DEFAULT_API_URL.to_string(),
            profile_stale_secs: 0,
            repos_stale_secs: 30,
            retry: 1,
            retry_delay_ms: 10,
            top_languages: 8,
            top_repositories: 5,
            include_forks: true,
        };
        let cache = CacheConfig::from(&config);
        assert_eq!(cache.profile.stale_time, None);
        assert_eq!(cache.repos.stale_time, Some(Duration::from_secs(30)));
        assert_eq!(cache.repo_resources.retry, 1);
        assert_eq!(cache.repo_resources.retry_delay, Duration::from_millis(10));
    }
}
