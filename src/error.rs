use reqwest::header::HeaderMap;
use thiserror::Error;

use crate::cache::CacheKey;

/// A non-success HTTP response from the GitHub API.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub message: String,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (status {})", self.message, self.status)
    }
}

// Cloneable so that every caller attached to a shared in-flight request
// receives the same terminal error.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("Network error: {message}")]
    Transport { message: String },

    #[error("GitHub API error: {0}")]
    Api(ApiError),

    #[error("Aggregation failed: {0}")]
    Aggregate(Box<Error>),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("Cached value for {0} has an unexpected type")]
    CacheType(CacheKey),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// HTTP status of the failure; `0` when no response was received.
    pub fn status(&self) -> u16 {
        match self {
            Error::Api(api) => api.status,
            Error::Aggregate(inner) => inner.status(),
            _ => 0,
        }
    }

    /// The user-facing message, without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Error::Transport { message } => message,
            Error::Api(api) => &api.message,
            Error::Aggregate(inner) => inner.message(),
            Error::Parse(msg) | Error::Config(msg) | Error::InvalidHeader(msg) => msg,
            Error::CacheType(_) => "cached value has an unexpected type",
        }
    }

    /// The error a failed aggregate was caused by, or `self`.
    pub fn root(&self) -> &Error {
        match self {
            Error::Aggregate(inner) => inner.root(),
            other => other,
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Error::Config(_) | Error::InvalidHeader(_) | Error::CacheType(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Error::Parse(err.to_string())
        } else {
            Error::Transport {
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

impl From<reqwest::header::InvalidHeaderValue> for Error {
    fn from(err: reqwest::header::InvalidHeaderValue) -> Self {
        Error::InvalidHeader(err.to_string())
    }
}
