//! Invocation contract: what a caller sends and what a run reports back.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EnrichError;

/// Default wall-clock budget per invocation.
pub const DEFAULT_DEADLINE_MS: u64 = 20_000;

/// Which enrichment a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackfillKind {
    /// Attach one weather sample to each history record
    WeatherPoint,
    /// One hourly cloud/temperature record per system and day
    HourlyCloud,
    /// One hourly irradiance record per system and day
    HourlyIrradiance,
}

impl BackfillKind {
    pub const ALL: [BackfillKind; 3] = [
        BackfillKind::WeatherPoint,
        BackfillKind::HourlyCloud,
        BackfillKind::HourlyIrradiance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WeatherPoint => "weather-point",
            Self::HourlyCloud => "hourly-cloud",
            Self::HourlyIrradiance => "hourly-irradiance",
        }
    }

    /// Unit limit used when the caller does not pass one.
    pub fn default_max_units(&self) -> u32 {
        match self {
            Self::WeatherPoint => 50,
            Self::HourlyCloud | Self::HourlyIrradiance => 10,
        }
    }

    /// Hourly kinds walk calendar days, the point kind walks history records.
    pub fn is_hourly(&self) -> bool {
        !matches!(self, Self::WeatherPoint)
    }
}

impl fmt::Display for BackfillKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackfillKind {
    type Err = EnrichError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weather-point" | "weather" | "point" => Ok(Self::WeatherPoint),
            "hourly-cloud" | "hourly-weather" | "cloud" => Ok(Self::HourlyCloud),
            "hourly-irradiance" | "irradiance" | "solar" => Ok(Self::HourlyIrradiance),
            other => Err(EnrichError::InvalidParameter {
                param: "kind".to_string(),
                message: format!(
                    "'{}' is not one of weather-point, hourly-cloud, hourly-irradiance",
                    other
                ),
            }),
        }
    }
}

/// Parameters of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillRequest {
    pub kind: BackfillKind,
    #[serde(default)]
    pub max_units: Option<u32>,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

impl BackfillRequest {
    pub fn new(kind: BackfillKind) -> Self {
        Self {
            kind,
            max_units: None,
            deadline_ms: None,
        }
    }

    pub fn with_max_units(mut self, max_units: u32) -> Self {
        self.max_units = Some(max_units);
        self
    }

    pub fn with_deadline_ms(mut self, deadline_ms: u64) -> Self {
        self.deadline_ms = Some(deadline_ms);
        self
    }

    /// Resolve the run budget, falling back to the kind's defaults.
    pub fn budget(&self) -> Budget {
        self.budget_with(self.kind.default_max_units(), DEFAULT_DEADLINE_MS)
    }

    /// Resolve the run budget against explicit defaults.
    ///
    /// A unit limit of zero is raised to one so every run can make progress.
    pub fn budget_with(&self, default_max_units: u32, default_deadline_ms: u64) -> Budget {
        Budget {
            max_units: self.max_units.unwrap_or(default_max_units).max(1),
            deadline: Duration::from_millis(self.deadline_ms.unwrap_or(default_deadline_ms)),
        }
    }
}

/// Resolved limits for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub max_units: u32,
    pub deadline: Duration,
}

/// Progress report returned by every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillSummary {
    pub success: bool,
    pub kind: BackfillKind,
    /// Units that reached the fetch/compute stage
    pub processed: u64,
    pub written: u64,
    pub errors: u64,
    /// Units skipped because they were already done or had no daylight
    pub skipped: u64,
    pub completed: bool,
    pub message: String,
    pub elapsed_ms: u64,
}
