//! Fetch error classification.

use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Why a weather fetch failed.
///
/// The provider never retries; callers choose a backoff from `class()`.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited by weather provider")]
    RateLimited,

    #[error("Weather provider returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse weather response: {0}")]
    Parse(String),

    #[error("No weather data for {0}")]
    NoData(String),
}

impl ProviderError {
    /// Short label used in logs and metrics.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::RateLimited => "rate_limited",
            Self::Api { .. } => "api",
            Self::Parse(_) => "parse",
            Self::NoData(_) => "no_data",
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
