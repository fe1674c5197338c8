use std::fmt;

use async_trait::async_trait;

use crate::error::Result;
use crate::github::rate_limit::RateLimitSnapshot;
use crate::models::{CommitActivity, Contributor, LanguageBreakdown, Profile, Repository};

/// The read-only GitHub REST surface the rest of the crate depends on.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    async fn get_user(&self, handle: &str) -> Result<Profile>;
    async fn list_repos(&self, handle: &str, options: &RepoListOptions) -> Result<Vec<Repository>>;
    async fn get_repo(&self, handle: &str, repo: &str) -> Result<Repository>;
    async fn get_repo_languages(&self, handle: &str, repo: &str) -> Result<LanguageBreakdown>;
    async fn get_commit_activity(&self, handle: &str, repo: &str) -> Result<Vec<CommitActivity>>;
    async fn get_contributors(&self, handle: &str, repo: &str) -> Result<Vec<Contributor>>;
    async fn get_rate_limit(&self) -> Result<RateLimitSnapshot>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoSort {
    Created,
    Updated,
    Pushed,
    FullName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoType {
    All,
    Owner,
    Member,
}

impl fmt::Display for RepoSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RepoSort::Created => "created",
            RepoSort::Updated => "updated",
            RepoSort::Pushed => "pushed",
            RepoSort::FullName => "full_name",
        })
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        })
    }
}

impl fmt::Display for RepoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RepoType::All => "all",
            RepoType::Owner => "owner",
            RepoType::Member => "member",
        })
    }
}

/// Query parameters for `GET /users/{handle}/repos`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoListOptions {
    pub per_page: u32,
    pub page: u32,
    pub sort: RepoSort,
    pub direction: SortDirection,
    pub repo_type: RepoType,
}

impl Default for RepoListOptions {
    fn default() -> Self {
        Self {
            per_page: 100,
            page: 1,
            sort: RepoSort::Updated,
            direction: SortDirection::Desc,
            repo_type: RepoType::Owner,
        }
    }
}

impl RepoListOptions {
    pub fn page(page: u32) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    pub fn to_query(&self) -> String {
        format!(
            "per_page={}&page={}&sort={}&direction={}&type={}",
            self.per_page, self.page, self.sort, self.direction, self.repo_type
        )
    }

    /// Parameter tuple used as part of a cache key.
    pub fn cache_params(&self) -> Vec<String> {
        vec![
            self.per_page.to_string(),
            self.page.to_string(),
            self.sort.to_string(),
            self.direction.to_string(),
            self.repo_type.to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_query() {
        assert_eq!(
            RepoListOptions::default().to_query(),
            "per_page=100&page=1&sort=updated&direction=desc&type=owner"
        );
    }

    #[test]
    fn test_custom_query() {
        let options = RepoListOptions {
            per_page: 30,
            page: 3,
            sort: RepoSort::FullName,
            direction: SortDirection::Asc,
            repo_type: RepoType::All,
        };
        assert_eq!(
            options.to_query(),
            "per_page=30&page=3&sort=full_name&direction=asc&type=all"
        );
    }
}
