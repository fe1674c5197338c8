pub mod api;
pub mod client;
pub mod rate_limit;
pub mod paginator;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{GitHubApi, RepoListOptions, RepoSort, RepoType, SortDirection};
pub use client::GitHubClient;
pub use rate_limit::{RateLimitSnapshot, RateLimitTracker};
pub use paginator::RepoPaginator;
