//! Backfill configuration loaded from an optional YAML file.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use enrich_common::{BackfillKind, DEFAULT_DEADLINE_MS};
use weather_provider::open_meteo::DEFAULT_BASE_URL;
use weather_provider::OpenMeteoConfig;

use crate::throttle::ThrottlePolicy;

/// Runtime tuning for the driver and provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackfillConfig {
    /// Delay after every successful provider call
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    /// Delay after a failed provider call
    #[serde(default = "default_failure_backoff_ms")]
    pub failure_backoff_ms: u64,
    /// Delay after a rate-limited provider call
    #[serde(default = "default_rate_limit_backoff_ms")]
    pub rate_limit_backoff_ms: u64,
    /// Writes per bulk write
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_deadline_ms")]
    pub default_deadline_ms: u64,
    #[serde(default = "default_point_max_units")]
    pub point_max_units: u32,
    #[serde(default = "default_hourly_max_units")]
    pub hourly_max_units: u32,
    /// History records fetched per page by the point kind
    #[serde(default = "default_history_page_size")]
    pub history_page_size: u32,
    #[serde(default)]
    pub provider: ProviderSettings,
}

fn default_throttle_ms() -> u64 {
    250
}

fn default_failure_backoff_ms() -> u64 {
    2000
}

fn default_rate_limit_backoff_ms() -> u64 {
    5000
}

fn default_batch_size() -> usize {
    50
}

fn default_deadline_ms() -> u64 {
    DEFAULT_DEADLINE_MS
}

fn default_point_max_units() -> u32 {
    BackfillKind::WeatherPoint.default_max_units()
}

fn default_hourly_max_units() -> u32 {
    BackfillKind::HourlyCloud.default_max_units()
}

fn default_history_page_size() -> u32 {
    200
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            throttle_ms: default_throttle_ms(),
            failure_backoff_ms: default_failure_backoff_ms(),
            rate_limit_backoff_ms: default_rate_limit_backoff_ms(),
            batch_size: default_batch_size(),
            default_deadline_ms: default_deadline_ms(),
            point_max_units: default_point_max_units(),
            hourly_max_units: default_hourly_max_units(),
            history_page_size: default_history_page_size(),
            provider: ProviderSettings::default(),
        }
    }
}

/// Weather provider connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_user_agent() -> String {
    format!("enrich-backfill/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl BackfillConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: BackfillConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        debug!(path = %path.display(), "Loaded backfill config");
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "Backfill config not found, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Unit limit applied when a request does not set one.
    pub fn max_units_for(&self, kind: BackfillKind) -> u32 {
        match kind {
            BackfillKind::WeatherPoint => self.point_max_units,
            BackfillKind::HourlyCloud | BackfillKind::HourlyIrradiance => self.hourly_max_units,
        }
    }

    pub fn throttle(&self) -> ThrottlePolicy {
        ThrottlePolicy {
            throttle: Duration::from_millis(self.throttle_ms),
            failure_backoff: Duration::from_millis(self.failure_backoff_ms),
            rate_limit_backoff: Duration::from_millis(self.rate_limit_backoff_ms),
        }
    }

    pub fn provider_config(&self) -> OpenMeteoConfig {
        OpenMeteoConfig {
            base_url: self.provider.base_url.clone(),
            request_timeout: Duration::from_secs(self.provider.request_timeout_secs),
            user_agent: self.provider.user_agent.clone(),
        }
    }
}
