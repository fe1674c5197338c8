use std::time::{Duration, Instant};

use backon::ExponentialBuilder;

/// Freshness and retry settings for one kind of resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPolicy {
    /// How long a resolved value is served without refetching. `None`
    /// means every new access refetches (in-flight requests are still
    /// shared).
    pub stale_time: Option<Duration>,
    /// Extra attempts after the first failure.
    pub retry: u32,
    pub retry_delay: Duration,
    pub max_retry_delay: Duration,
}

impl Default for QueryPolicy {
    fn default() -> Self {
        Self {
            stale_time: None,
            retry: 2,
            retry_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(30),
        }
    }
}

impl QueryPolicy {
    pub fn is_fresh(&self, fetched_at: Instant) -> bool {
        self.stale_time
            .is_some_and(|stale_time| fetched_at.elapsed() < stale_time)
    }

    pub(crate) fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.retry_delay)
            .with_max_delay(self.max_retry_delay.max(self.retry_delay))
            .with_factor(2.0)
            .with_max_times(self.retry as usize)
    }
}
