use std::sync::{Arc, Mutex, PoisonError};

use chrono::DateTime;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

/// Below this many remaining requests a warning is emitted.
pub const LOW_WATER_MARK: u32 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub limit: u32,
    pub remaining: u32,
    /// Unix seconds at which the quota resets.
    pub reset: i64,
    pub used: u32,
}

impl RateLimitSnapshot {
    /// Reads the `X-RateLimit-*` headers. Returns `None` when the response
    /// carries no rate-limit information at all; individual missing values
    /// read as zero.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        if !headers.contains_key("x-ratelimit-limit") && !headers.contains_key("x-ratelimit-remaining") {
            return None;
        }

        Some(Self {
            limit: header_value(headers, "x-ratelimit-limit").unwrap_or(0),
            remaining: header_value(headers, "x-ratelimit-remaining").unwrap_or(0),
            reset: header_value(headers, "x-ratelimit-reset").unwrap_or(0),
            used: header_value(headers, "x-ratelimit-used").unwrap_or(0),
        })
    }

    pub fn is_low(&self) -> bool {
        self.remaining < LOW_WATER_MARK
    }

    pub fn reset_display(&self) -> String {
        DateTime::from_timestamp(self.reset, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| self.reset.to_string())
    }
}

fn header_value<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Latest rate-limit telemetry seen by a client. Observes only; never
/// delays a request.
#[derive(Debug, Clone, Default)]
pub struct RateLimitTracker {
    latest: Arc<Mutex<Option<RateLimitSnapshot>>>,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_from_headers(&self, headers: &HeaderMap) {
        let Some(snapshot) = RateLimitSnapshot::from_headers(headers) else {
            return;
        };

        if snapshot.is_low() {
            tracing::warn!(
                remaining = snapshot.remaining,
                limit = snapshot.limit,
                reset_timestamp = snapshot.reset,
                "GitHub API rate limit warning: {}/{} remaining. Resets at {}",
                snapshot.remaining,
                snapshot.limit,
                snapshot.reset_display()
            );
        }

        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }

    pub fn latest(&self) -> Option<RateLimitSnapshot> {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
