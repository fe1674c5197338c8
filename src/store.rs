use std::future::Future;
use std::sync::Arc;

use crate::cache::{CacheKey, QueryCache, QuerySnapshot, ResourceKind};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::github::{GitHubApi, RateLimitSnapshot, RepoListOptions, RepoPaginator};
use crate::models::{CommitActivity, Contributor, LanguageBreakdown, Profile, Repository};

/// Per-resource queries over a `GitHubApi`, all going through one
/// `QueryCache`.
#[derive(Clone)]
pub struct ProfileStore {
    api: Arc<dyn GitHubApi>,
    cache: QueryCache,
    config: CacheConfig,
    fetch_all_pages: bool,
}

impl ProfileStore {
    pub fn new(api: impl GitHubApi + 'static, config: CacheConfig) -> Self {
        Self::with_cache(Arc::new(api), QueryCache::new(), config)
    }

    pub fn with_cache(api: Arc<dyn GitHubApi>, cache: QueryCache, config: CacheConfig) -> Self {
        Self {
            api,
            cache,
            config,
            fetch_all_pages: false,
        }
    }

    /// Makes `repos` follow every page instead of only the first.
    pub fn fetch_all_pages(mut self, enabled: bool) -> Self {
        self.fetch_all_pages = enabled;
        self
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn api(&self) -> &Arc<dyn GitHubApi> {
        &self.api
    }

    async fn query<T, F, Fut>(&self, key: CacheKey, load: F) -> QuerySnapshot<T>
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<dyn GitHubApi>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let policy = self.config.policy_for(key.kind()).clone();
        let api = Arc::clone(&self.api);
        self.cache
            .resolve(key, &policy, move || load(Arc::clone(&api)))
            .await
    }

    pub async fn profile(&self, handle: &str) -> QuerySnapshot<Profile> {
        let h = handle.to_string();
        self.query(CacheKey::user(handle), move |api| {
            let h = h.clone();
            async move { api.get_user(&h).await }
        })
        .await
    }

    /// Key of the request `repos` makes. A single first page shares its
    /// entry with `repos_page` for the default options; walking every page
    /// is a different request and gets its own entry.
    fn repos_key(&self, handle: &str) -> CacheKey {
        if self.fetch_all_pages {
            CacheKey::new(ResourceKind::Repos, [handle, "all"])
        } else {
            page_key(handle, &RepoListOptions::default())
        }
    }

    /// The handle's repositories in the order the API returned them.
    pub async fn repos(&self, handle: &str) -> QuerySnapshot<Vec<Repository>> {
        let h = handle.to_string();
        let all_pages = self.fetch_all_pages;
        self.query(self.repos_key(handle), move |api| {
            let h = h.clone();
            async move {
                let options = RepoListOptions::default();
                if all_pages {
                    RepoPaginator::new(api.as_ref()).fetch_all(&h, &options).await
                } else {
                    api.list_repos(&h, &options).await
                }
            }
        })
        .await
    }

    /// A single page of repositories; paging further is up to the caller.
    pub async fn repos_page(&self, handle: &str, options: &RepoListOptions) -> QuerySnapshot<Vec<Repository>> {
        let key = page_key(handle, options);
        let h = handle.to_string();
        let options = options.clone();
        self.query(key, move |api| {
            let h = h.clone();
            let options = options.clone();
            async move { api.list_repos(&h, &options).await }
        })
        .await
    }

    pub async fn repo(&self, handle: &str, repo: &str) -> QuerySnapshot<Repository> {
        let (h, r) = (handle.to_string(), repo.to_string());
        self.query(CacheKey::repo(handle, repo), move |api| {
            let (h, r) = (h.clone(), r.clone());
            async move { api.get_repo(&h, &r).await }
        })
        .await
    }

    pub async fn languages(&self, handle: &str, repo: &str) -> QuerySnapshot<LanguageBreakdown> {
        let (h, r) = (handle.to_string(), repo.to_string());
        self.query(CacheKey::languages(handle, repo), move |api| {
            let (h, r) = (h.clone(), r.clone());
            async move { api.get_repo_languages(&h, &r).await }
        })
        .await
    }

    pub async fn commit_activity(&self, handle: &str, repo: &str) -> QuerySnapshot<Vec<CommitActivity>> {
        let (h, r) = (handle.to_string(), repo.to_string());
        self.query(CacheKey::commit_activity(handle, repo), move |api| {
            let (h, r) = (h.clone(), r.clone());
            async move { api.get_commit_activity(&h, &r).await }
        })
        .await
    }

    pub async fn contributors(&self, handle: &str, repo: &str) -> QuerySnapshot<Vec<Contributor>> {
        let (h, r) = (handle.to_string(), repo.to_string());
        self.query(CacheKey::contributors(handle, repo), move |api| {
            let (h, r) = (h.clone(), r.clone());
            async move { api.get_contributors(&h, &r).await }
        })
        .await
    }

    pub async fn rate_limit(&self) -> QuerySnapshot<RateLimitSnapshot> {
        self.query(CacheKey::rate_limit(), |api| async move { api.get_rate_limit().await })
            .await
    }

    pub fn peek_profile(&self, handle: &str) -> QuerySnapshot<Profile> {
        self.cache.snapshot(&CacheKey::user(handle))
    }

    pub fn peek_repos(&self, handle: &str) -> QuerySnapshot<Vec<Repository>> {
        self.cache.snapshot(&self.repos_key(handle))
    }

    pub fn peek_languages(&self, handle: &str, repo: &str) -> QuerySnapshot<LanguageBreakdown> {
        self.cache.snapshot(&CacheKey::languages(handle, repo))
    }

    pub fn peek_commit_activity(&self, handle: &str, repo: &str) -> QuerySnapshot<Vec<CommitActivity>> {
        self.cache.snapshot(&CacheKey::commit_activity(handle, repo))
    }

    /// Marks everything cached for `handle` stale.
    pub fn invalidate_handle(&self, handle: &str) {
        self.cache.invalidate_where(|key| key.handle() == Some(handle));
    }
}

fn page_key(handle: &str, options: &RepoListOptions) -> CacheKey {
    CacheKey::new(
        ResourceKind::Repos,
        std::iter::once(handle.to_string()).chain(options.cache_params()),
    )
}
