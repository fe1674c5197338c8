pub mod config;
pub mod error;
pub mod models;
pub mod github;
pub mod cache;
pub mod store;
pub mod aggregate;
pub mod report;

pub use config::{AggregateConfig, CacheConfig, Config};
pub use error::{Error, Result};
pub use github::{GitHubApi, GitHubClient};
pub use cache::{CacheKey, QueryCache, QuerySnapshot, QueryStatus};
pub use store::ProfileStore;
pub use aggregate::{AggregateSnapshot, AggregateStatus, Aggregator};
pub use report::{ProfileStats, ResumeSummary};
