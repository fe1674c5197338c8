//! In-memory `GitHubApi` used by unit tests across the crate.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;

use crate::error::{ApiError, Error, Result};
use crate::github::api::{GitHubApi, RepoListOptions};
use crate::github::rate_limit::RateLimitSnapshot;
use crate::models::{
    CommitActivity, Contributor, LanguageBreakdown, Profile, Repository, RepositoryOwner,
};

pub fn profile(login: &str) -> Profile {
    Profile {
        login: login.to_string(),
        id: 1,
        name: None,
        html_url: format!("https://github.com/{}", login),
        avatar_url: String::new(),
        bio: None,
        company: None,
        blog: None,
        location: None,
        email: None,
        twitter_username: None,
        public_repos: 0,
        public_gists: 0,
        followers: 0,
        following: 0,
        created_at: None,
        updated_at: None,
    }
}

pub fn repo(owner: &str, name: &str) -> Repository {
    Repository {
        id: 0,
        name: name.to_string(),
        full_name: format!("{}/{}", owner, name),
        owner: RepositoryOwner {
            login: owner.to_string(),
        },
        html_url: String::new(),
        description: None,
        language: None,
        stargazers_count: 0,
        forks_count: 0,
        open_issues_count: 0,
        watchers_count: 0,
        fork: false,
        archived: false,
        topics: Vec::new(),
        license: None,
        created_at: None,
        updated_at: None,
        pushed_at: None,
    }
}

pub fn scored_repo(owner: &str, name: &str, stars: u32, forks: u32, issues: u32) -> Repository {
    Repository {
        stargazers_count: stars,
        forks_count: forks,
        open_issues_count: issues,
        watchers_count: stars,
        ..repo(owner, name)
    }
}

pub fn api_error(status: u16, message: &str) -> Error {
    Error::Api(ApiError {
        message: message.to_string(),
        status,
        headers: HeaderMap::new(),
        body: None,
    })
}

/// Every request is identified by a string key such as `user:octocat`,
/// `repos:octocat`, `languages:octocat/A` or `activity:octocat/A`.
#[derive(Default)]
pub struct FakeGitHub {
    users: HashMap<String, Profile>,
    repos: HashMap<String, Vec<Repository>>,
    languages: HashMap<String, LanguageBreakdown>,
    activity: HashMap<String, Vec<CommitActivity>>,
    contributors: HashMap<String, Vec<Contributor>>,
    delays: HashMap<String, Duration>,
    failures: Mutex<HashMap<String, (u32, Error)>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FakeGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, handle: &str) -> Self {
        self.users.insert(handle.to_string(), profile(handle));
        self
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.users.insert(profile.login.clone(), profile);
        self
    }

    pub fn with_repos(mut self, handle: &str, repos: Vec<Repository>) -> Self {
        self.repos.insert(handle.to_string(), repos);
        self
    }

    pub fn with_repo_count(self, handle: &str, count: usize) -> Self {
        let repos = (0..count).map(|i| repo(handle, &format!("repo-{}", i))).collect();
        self.with_repos(handle, repos)
    }

    pub fn with_languages(mut self, handle: &str, repo: &str, entries: &[(&str, u64)]) -> Self {
        self.languages.insert(
            format!("{}/{}", handle, repo),
            entries.iter().map(|(l, b)| (*l, *b)).collect(),
        );
        self
    }

    pub fn with_activity(mut self, handle: &str, repo: &str, weeks: Vec<CommitActivity>) -> Self {
        self.activity.insert(format!("{}/{}", handle, repo), weeks);
        self
    }

    pub fn with_contributors(mut self, handle: &str, repo: &str, logins: &[&str]) -> Self {
        let contributors = logins
            .iter()
            .map(|login| Contributor {
                login: login.to_string(),
                contributions: 1,
                avatar_url: String::new(),
                html_url: String::new(),
            })
            .collect();
        self.contributors.insert(format!("{}/{}", handle, repo), contributors);
        self
    }

    pub fn with_delay(mut self, key: &str, delay: Duration) -> Self {
        self.delays.insert(key.to_string(), delay);
        self
    }

    /// Fails the next `times` requests for `key` with `error`.
    pub fn failing(self, key: &str, times: u32, error: Error) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(key.to_string(), (times, error));
        self
    }

    pub fn always_failing(self, key: &str, error: Error) -> Self {
        self.failing(key, u32::MAX, error)
    }

    pub fn calls(&self, key: &str) -> usize {
        self.calls.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    async fn enter(&self, key: &str) -> Result<()> {
        *self.calls.lock().unwrap().entry(key.to_string()).or_insert(0) += 1;

        if let Some(delay) = self.delays.get(key) {
            tokio::time::sleep(*delay).await;
        }

        let mut failures = self.failures.lock().unwrap();
        if let Some((remaining, error)) = failures.get_mut(key) {
            if *remaining > 0 {
                *remaining = remaining.saturating_sub(1);
                return Err(error.clone());
            }
        }
        Ok(())
    }
}

fn not_found() -> Error {
    api_error(404, "Not Found")
}

#[async_trait]
impl GitHubApi for FakeGitHub {
    async fn get_user(&self, handle: &str) -> Result<Profile> {
        self.enter(&format!("user:{}", handle)).await?;
        self.users.get(handle).cloned().ok_or_else(not_found)
    }

    async fn list_repos(&self, handle: &str, options: &RepoListOptions) -> Result<Vec<Repository>> {
        self.enter(&format!("repos:{}", handle)).await?;
        let repos = self.repos.get(handle).ok_or_else(not_found)?;
        let per_page = options.per_page as usize;
        let start = (options.page.saturating_sub(1) as usize) * per_page;
        Ok(repos.iter().skip(start).take(per_page).cloned().collect())
    }

    async fn get_repo(&self, handle: &str, repo: &str) -> Result<Repository> {
        self.enter(&format!("repo:{}/{}", handle, repo)).await?;
        self.repos
            .get(handle)
            .and_then(|repos| repos.iter().find(|r| r.name == repo))
            .cloned()
            .ok_or_else(not_found)
    }

    async fn get_repo_languages(&self, handle: &str, repo: &str) -> Result<LanguageBreakdown> {
        let key = format!("{}/{}", handle, repo);
        self.enter(&format!("languages:{}", key)).await?;
        Ok(self.languages.get(&key).cloned().unwrap_or_default())
    }

    async fn get_commit_activity(&self, handle: &str, repo: &str) -> Result<Vec<CommitActivity>> {
        let key = format!("{}/{}", handle, repo);
        self.enter(&format!("activity:{}", key)).await?;
        Ok(self.activity.get(&key).cloned().unwrap_or_default())
    }

    async fn get_contributors(&self, handle: &str, repo: &str) -> Result<Vec<Contributor>> {
        let key = format!("{}/{}", handle, repo);
        self.enter(&format!("contributors:{}", key)).await?;
        Ok(self.contributors.get(&key).cloned().unwrap_or_default())
    }

    async fn get_rate_limit(&self) -> Result<RateLimitSnapshot> {
        self.enter("rate_limit").await?;
        Ok(RateLimitSnapshot {
            limit: 60,
            remaining: 59,
            reset: 0,
            used: 1,
        })
    }
}
