use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use futures::future::{BoxFuture, Shared};

use crate::cache::key::CacheKey;
use crate::cache::policy::QueryPolicy;
use crate::error::{Error, Result};

pub(crate) type AnyValue = Arc<dyn Any + Send + Sync>;
pub(crate) type InFlight = Shared<BoxFuture<'static, Result<AnyValue>>>;

/// `Idle -> Pending -> {Resolved, Failed}`. Leaving a terminal state takes a
/// new access after staleness or invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Idle,
    Pending,
    Resolved,
    Failed,
}

pub(crate) struct CacheEntry {
    pub status: QueryStatus,
    pub value: Option<AnyValue>,
    pub error: Option<Error>,
    pub fetched_at: Option<Instant>,
    pub in_flight: Option<InFlight>,
    pub retry_count: u32,
    /// Generation of the fetch currently allowed to settle this entry.
    pub generation: u64,
    /// Generation of the fetch that produced `value`.
    pub version: u64,
    pub invalidated: bool,
    /// Generation that was in flight when the entry was last invalidated.
    pub invalidated_during: u64,
}

impl CacheEntry {
    pub fn new() -> Self {
        Self {
            status: QueryStatus::Idle,
            value: None,
            error: None,
            fetched_at: None,
            in_flight: None,
            retry_count: 0,
            generation: 0,
            version: 0,
            invalidated: false,
            invalidated_during: 0,
        }
    }

    /// Marks the entry stale. A fetch already in flight still settles, but
    /// its value does not count as fresh.
    pub fn mark_stale(&mut self) {
        self.invalidated = true;
        if self.in_flight.is_some() {
            self.invalidated_during = self.generation;
        }
    }

    pub fn is_fresh(&self, policy: &QueryPolicy) -> bool {
        self.status == QueryStatus::Resolved
            && !self.invalidated
            && self.fetched_at.is_some_and(|t| policy.is_fresh(t))
    }

    pub fn snapshot<T: Send + Sync + 'static>(&self, key: &CacheKey) -> QuerySnapshot<T> {
        let data = self.value.clone().map(|v| v.downcast::<T>());
        match data {
            Some(Err(_)) => QuerySnapshot {
                status: QueryStatus::Failed,
                data: None,
                error: Some(Error::CacheType(key.clone())),
            },
            Some(Ok(data)) => QuerySnapshot {
                status: self.status,
                data: Some(data),
                error: self.error.clone(),
            },
            None => QuerySnapshot {
                status: self.status,
                data: None,
                error: self.error.clone(),
            },
        }
    }
}

/// What a consumer sees for one query: `{data, isLoading, error}`.
///
/// While a refetch is pending or after a failed refetch, `data` still holds
/// the last successfully fetched value.
pub struct QuerySnapshot<T> {
    pub status: QueryStatus,
    pub data: Option<Arc<T>>,
    pub error: Option<Error>,
}

impl<T> QuerySnapshot<T> {
    pub fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
        }
    }

    pub fn resolved(data: Arc<T>) -> Self {
        Self {
            status: QueryStatus::Resolved,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: Error) -> Self {
        Self {
            status: QueryStatus::Failed,
            data: None,
            error: Some(error),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Pending
    }

    pub fn is_idle(&self) -> bool {
        self.status == QueryStatus::Idle
    }

    pub fn is_resolved(&self) -> bool {
        self.status == QueryStatus::Resolved
    }

    pub fn is_failed(&self) -> bool {
        self.status == QueryStatus::Failed
    }

    /// `Some` once the query reached a terminal state.
    pub fn result(&self) -> Option<Result<Arc<T>>> {
        match (self.status, &self.data, &self.error) {
            (QueryStatus::Resolved, Some(data), _) => Some(Ok(Arc::clone(data))),
            (QueryStatus::Failed, _, Some(error)) => Some(Err(error.clone())),
            _ => None,
        }
    }
}

impl<T> Clone for QuerySnapshot<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for QuerySnapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySnapshot")
            .field("status", &self.status)
            .field("data", &self.data)
            .field("error", &self.error)
            .finish()
    }
}
