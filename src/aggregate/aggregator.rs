use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};

use crate::aggregate::reduce::{rank_activity, reduce_languages, sum_weekly_activity};
use crate::cache::{CacheKey, QuerySnapshot, QueryStatus};
use crate::config::AggregateConfig;
use crate::error::Error;
use crate::models::{
    ActivityRanking, CommitActivity, LanguageBreakdown, LanguageDistribution, Repository,
    WeeklyActivity,
};
use crate::store::ProfileStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateStatus {
    Idle,
    Loading,
    Ready,
    Error,
}

/// State of a derived, profile-wide view.
#[derive(Debug)]
pub struct AggregateSnapshot<T> {
    pub status: AggregateStatus,
    pub data: Option<Arc<T>>,
    pub error: Option<Error>,
}

impl<T> AggregateSnapshot<T> {
    fn idle() -> Self {
        Self {
            status: AggregateStatus::Idle,
            data: None,
            error: None,
        }
    }

    fn loading() -> Self {
        Self {
            status: AggregateStatus::Loading,
            data: None,
            error: None,
        }
    }

    fn ready(data: Arc<T>) -> Self {
        Self {
            status: AggregateStatus::Ready,
            data: Some(data),
            error: None,
        }
    }

    fn failed(error: Error) -> Self {
        Self {
            status: AggregateStatus::Error,
            data: None,
            error: Some(error),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == AggregateStatus::Ready
    }

    pub fn is_loading(&self) -> bool {
        self.status == AggregateStatus::Loading
    }

    pub fn is_error(&self) -> bool {
        self.status == AggregateStatus::Error
    }
}

/// A derived value together with the exact inputs it was computed from.
/// Holding the input `Arc`s keeps pointer comparison sound.
struct Memo<I, O> {
    repos: Arc<Vec<Repository>>,
    inputs: Vec<Option<Arc<I>>>,
    value: Arc<O>,
    last_used: u64,
}

impl<I, O> Memo<I, O> {
    fn matches(&self, repos: &Arc<Vec<Repository>>, inputs: &[Option<Arc<I>>]) -> bool {
        Arc::ptr_eq(&self.repos, repos)
            && self.inputs.len() == inputs.len()
            && self.inputs.iter().zip(inputs).all(|(a, b)| match (a, b) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            })
    }
}

type MemoTable<I, O> = Mutex<HashMap<String, Memo<I, O>>>;

/// Handles remembered per derived view before the least recently used is dropped.
const MEMO_CAPACITY: usize = 64;

/// Fans out per-repository requests for a handle and reduces the results
/// into profile-wide views.
pub struct Aggregator {
    store: ProfileStore,
    config: AggregateConfig,
    languages: MemoTable<LanguageBreakdown, LanguageDistribution>,
    weekly: MemoTable<Vec<CommitActivity>, WeeklyActivity>,
    rankings: MemoTable<(), ActivityRanking>,
}

impl Aggregator {
    pub fn new(store: ProfileStore, config: AggregateConfig) -> Self {
        Self {
            store,
            config,
            languages: Mutex::default(),
            weekly: Mutex::default(),
            rankings: Mutex::default(),
        }
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    pub fn config(&self) -> &AggregateConfig {
        &self.config
    }

    /// Language byte totals across every repository of `handle`.
    ///
    /// Fails with the repository-list error if that fetch fails, or with
    /// `Error::Aggregate` wrapping the first failed breakdown (in repository
    /// order). No partial distribution is ever returned.
    pub async fn aggregate_languages(&self, handle: &str) -> AggregateSnapshot<LanguageDistribution> {
        let repos = match self.resolve_repos(handle).await {
            Ok(Some(repos)) => repos,
            Ok(None) => return AggregateSnapshot::idle(),
            Err(error) => return AggregateSnapshot::failed(error),
        };
        let considered = self.considered(&repos);

        tracing::info!("Fetching languages for {} repositories of {}", considered.len(), handle);
        let breakdowns = match self
            .fan_out(&considered, "languages", |name| self.store.languages(handle, name))
            .await
        {
            Ok(breakdowns) => breakdowns,
            Err(error) => return AggregateSnapshot::failed(error),
        };

        AggregateSnapshot::ready(self.language_distribution(handle, &repos, breakdowns))
    }

    /// Weekly commit totals summed over every repository of `handle`.
    pub async fn aggregate_commit_activity(&self, handle: &str) -> AggregateSnapshot<WeeklyActivity> {
        let repos = match self.resolve_repos(handle).await {
            Ok(Some(repos)) => repos,
            Ok(None) => return AggregateSnapshot::idle(),
            Err(error) => return AggregateSnapshot::failed(error),
        };
        let considered = self.considered(&repos);

        tracing::info!("Fetching commit activity for {} repositories of {}", considered.len(), handle);
        let series = match self
            .fan_out(&considered, "commit activity", |name| self.store.commit_activity(handle, name))
            .await
        {
            Ok(series) => series,
            Err(error) => return AggregateSnapshot::failed(error),
        };

        let value = memoize(&self.weekly, handle, &repos, series, |series| {
            sum_weekly_activity(series.iter().flatten().map(|s| &**s))
        });
        AggregateSnapshot::ready(value)
    }

    /// The most active repositories of `handle` by stars + forks + issues.
    pub async fn activity_ranking(&self, handle: &str) -> AggregateSnapshot<ActivityRanking> {
        match self.resolve_repos(handle).await {
            Ok(Some(repos)) => AggregateSnapshot::ready(self.ranking(handle, &repos)),
            Ok(None) => AggregateSnapshot::idle(),
            Err(error) => AggregateSnapshot::failed(error),
        }
    }

    /// Derives the language view from whatever is cached right now, without
    /// issuing requests.
    pub fn peek_languages(&self, handle: &str) -> AggregateSnapshot<LanguageDistribution> {
        let repos = match self.peek_repos(handle) {
            Ok(repos) => repos,
            Err(snapshot) => return snapshot,
        };

        let considered = self.considered(&repos);
        let mut loading = false;
        let mut first_error = None;
        let mut breakdowns = Vec::with_capacity(considered.len());

        for repo in &considered {
            let key = CacheKey::languages(handle, &repo.name);
            let snapshot = self.store.peek_languages(handle, &repo.name);
            match snapshot.status {
                QueryStatus::Pending => loading = true,
                QueryStatus::Idle if key.is_complete() => loading = true,
                QueryStatus::Failed if first_error.is_none() => first_error = snapshot.error,
                _ => {}
            }
            breakdowns.push(snapshot.data);
        }

        if loading {
            return AggregateSnapshot::loading();
        }
        if let Some(error) = first_error {
            return AggregateSnapshot::failed(Error::Aggregate(Box::new(error)));
        }
        AggregateSnapshot::ready(self.language_distribution(handle, &repos, breakdowns))
    }

    pub fn peek_activity_ranking(&self, handle: &str) -> AggregateSnapshot<ActivityRanking> {
        match self.peek_repos(handle) {
            Ok(repos) => AggregateSnapshot::ready(self.ranking(handle, &repos)),
            Err(snapshot) => snapshot,
        }
    }

    /// Marks everything cached for `handle` stale and forgets its derived
    /// views.
    pub fn invalidate(&self, handle: &str) {
        self.store.invalidate_handle(handle);
        lock(&self.languages).remove(handle);
        lock(&self.weekly).remove(handle);
        lock(&self.rankings).remove(handle);
    }

    async fn resolve_repos(&self, handle: &str) -> Result<Option<Arc<Vec<Repository>>>, Error> {
        let snapshot = self.store.repos(handle).await;
        match snapshot.result() {
            Some(Ok(repos)) => Ok(Some(repos)),
            Some(Err(error)) => Err(error),
            None => Ok(None),
        }
    }

    fn peek_repos<T>(&self, handle: &str) -> Result<Arc<Vec<Repository>>, AggregateSnapshot<T>> {
        let snapshot = self.store.peek_repos(handle);
        match (snapshot.status, snapshot.data, snapshot.error) {
            (QueryStatus::Resolved, Some(repos), _) => Ok(repos),
            (QueryStatus::Pending, _, _) => Err(AggregateSnapshot::loading()),
            (QueryStatus::Failed, _, Some(error)) => Err(AggregateSnapshot::failed(error)),
            _ => Err(AggregateSnapshot::idle()),
        }
    }

    fn considered(&self, repos: &[Repository]) -> Vec<Repository> {
        repos
            .iter()
            .filter(|r| self.config.include_forks || !r.fork)
            .cloned()
            .collect()
    }

    /// Launches one sub-resolution per repository, waits for all of them,
    /// and returns their values in repository order. The first failure in
    /// that order fails the whole set.
    async fn fan_out<'a, T, F, Fut>(
        &self,
        repos: &'a [Repository],
        label: &str,
        fetch: F,
    ) -> Result<Vec<Option<Arc<T>>>, Error>
    where
        F: Fn(&'a str) -> Fut,
        Fut: Future<Output = QuerySnapshot<T>> + 'a,
    {
        let pb = self.progress_bar(repos.len(), label);

        let requests = repos.iter().map(|repo| {
            let request = fetch(&repo.name);
            let pb = pb.clone();
            async move {
                let snapshot = request.await;
                pb.inc(1);
                snapshot
            }
        });
        let snapshots = join_all(requests).await;
        pb.finish_and_clear();

        let mut values = Vec::with_capacity(snapshots.len());
        for (repo, snapshot) in repos.iter().zip(snapshots) {
            match snapshot.status {
                QueryStatus::Failed => {
                    let error = snapshot.error.unwrap_or_else(|| Error::Transport {
                        message: format!("{} for {} failed", label, repo.full_name),
                    });
                    tracing::warn!("Fetching {} for {} failed: {}", label, repo.full_name, error);
                    return Err(Error::Aggregate(Box::new(error)));
                }
                // Idle sub-requests (unknown repository name) contribute nothing.
                _ => values.push(snapshot.data),
            }
        }
        Ok(values)
    }

    fn progress_bar(&self, len: usize, label: &str) -> ProgressBar {
        if !self.config.show_progress || len == 0 {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.set_message(label.to_string());
        pb
    }

    fn language_distribution(
        &self,
        handle: &str,
        repos: &Arc<Vec<Repository>>,
        breakdowns: Vec<Option<Arc<LanguageBreakdown>>>,
    ) -> Arc<LanguageDistribution> {
        let top_n = self.config.top_languages;
        memoize(&self.languages, handle, repos, breakdowns, |breakdowns| {
            let empty = LanguageBreakdown::new();
            reduce_languages(
                breakdowns.iter().map(|b| b.as_deref().unwrap_or(&empty)),
                top_n,
            )
        })
    }

    fn ranking(&self, handle: &str, repos: &Arc<Vec<Repository>>) -> Arc<ActivityRanking> {
        let considered = self.considered(repos);
        memoize(&self.rankings, handle, repos, Vec::new(), |_| {
            rank_activity(&considered, self.config.top_repositories)
        })
    }
}

fn lock<I, O>(table: &MemoTable<I, O>) -> std::sync::MutexGuard<'_, HashMap<String, Memo<I, O>>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Returns the memoised value for `handle` when it was computed from the
/// same inputs, otherwise recomputes and stores it.
fn memoize<I, O>(
    table: &MemoTable<I, O>,
    handle: &str,
    repos: &Arc<Vec<Repository>>,
    inputs: Vec<Option<Arc<I>>>,
    compute: impl FnOnce(&[Option<Arc<I>>]) -> O,
) -> Arc<O> {
    let mut table = lock(table);
    let tick = table.values().map(|m| m.last_used).max().unwrap_or(0) + 1;
    if let Some(memo) = table.get_mut(handle) {
        if memo.matches(repos, &inputs) {
            tracing::debug!("Reusing derived view for {}", handle);
            memo.last_used = tick;
            return Arc::clone(&memo.value);
        }
    }

    if table.len() >= MEMO_CAPACITY && !table.contains_key(handle) {
        let oldest = table
            .iter()
            .min_by_key(|(_, memo)| memo.last_used)
            .map(|(key, _)| key.clone());
        if let Some(oldest) = oldest {
            tracing::debug!("Dropping derived view for {}", oldest);
            table.remove(&oldest);
        }
    }

    let value = Arc::new(compute(&inputs));
    table.insert(
        handle.to_string(),
        Memo {
            repos: Arc::clone(repos),
            inputs,
            value: Arc::clone(&value),
            last_used: tick,
        },
    );
    value
}
