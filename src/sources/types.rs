use crate::podcasts::{Episode, PlatformStats};
use serde::{Deserialize, Serialize};

/// Error types for source fetching, distinguishing retryable from terminal
/// failures
#[derive(Debug, Clone)]
pub enum FetchError {
    /// Transient failures (5xx, timeout, connection error) — worth retrying
    Retryable(String),
    /// Permanent failures (4xx, parse error, URL not supported) — do not retry
    Terminal(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Retryable(msg) => write!(f, "retryable: {msg}"),
            FetchError::Terminal(msg) => write!(f, "terminal: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl FetchError {
    /// 5xx and 429 are worth a later retry, everything else is permanent.
    pub fn from_status(status: reqwest::StatusCode, context: &str) -> Self {
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            FetchError::Retryable(format!("{context}: upstream returned {status}"))
        } else {
            FetchError::Terminal(format!("{context}: upstream returned {status}"))
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            FetchError::Retryable(err.to_string())
        } else {
            FetchError::Terminal(err.to_string())
        }
    }
}

/// What a platform API reports about a show/video, mapped onto our record
/// fields. Absent counters stay zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub stats: PlatformStats,
    #[serde(default)]
    pub episodes: Vec<Episode>,
}
