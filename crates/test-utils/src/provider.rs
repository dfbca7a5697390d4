//! Deterministic weather provider for driver tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use enrich_common::WeatherSample;
use weather_provider::{nearest_sample, ProviderError, ProviderResult, WeatherProvider};

use crate::fixtures::hourly_samples;

/// Failure to inject for a scripted date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedFailure {
    Network,
    RateLimited,
    Server,
    NoData,
}

impl ScriptedFailure {
    fn to_error(self, date: NaiveDate) -> ProviderError {
        match self {
            Self::Network => ProviderError::Network("connection reset".to_string()),
            Self::RateLimited => ProviderError::RateLimited,
            Self::Server => ProviderError::Api {
                status: 503,
                body: "upstream unavailable".to_string(),
            },
            Self::NoData => ProviderError::NoData(date.to_string()),
        }
    }
}

/// Serves `hourly_samples` for every request, fails on chosen dates and
/// records what was asked for.
pub struct ScriptedProvider {
    cloud_cover_percent: Option<f64>,
    delay: Option<Duration>,
    failures: Mutex<HashMap<NaiveDate, ScriptedFailure>>,
    requested: Mutex<Vec<NaiveDate>>,
    hourly_calls: AtomicUsize,
    point_calls: AtomicUsize,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            cloud_cover_percent: Some(25.0),
            delay: None,
            failures: Mutex::new(HashMap::new()),
            requested: Mutex::new(Vec::new()),
            hourly_calls: AtomicUsize::new(0),
            point_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_cloud_cover(mut self, cloud_cover_percent: Option<f64>) -> Self {
        self.cloud_cover_percent = cloud_cover_percent;
        self
    }

    /// Sleep this long inside every call (tokio time, so it can be paused).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_on(&self, date: NaiveDate, failure: ScriptedFailure) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(date, failure);
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.clear();
        }
    }

    pub fn hourly_calls(&self) -> usize {
        self.hourly_calls.load(Ordering::SeqCst)
    }

    pub fn point_calls(&self) -> usize {
        self.point_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.hourly_calls() + self.point_calls()
    }

    /// Dates requested so far, in call order.
    pub fn requested_dates(&self) -> Vec<NaiveDate> {
        self.requested
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    async fn respond(&self, date: NaiveDate) -> ProviderResult<Vec<WeatherSample>> {
        if let Ok(mut requested) = self.requested.lock() {
            requested.push(date);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self
            .failures
            .lock()
            .ok()
            .and_then(|f| f.get(&date).copied());
        match failure {
            Some(failure) => Err(failure.to_error(date)),
            None => Ok(hourly_samples(date, self.cloud_cover_percent)),
        }
    }
}

#[async_trait]
impl WeatherProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch_hourly(
        &self,
        _latitude: f64,
        _longitude: f64,
        date: NaiveDate,
    ) -> ProviderResult<Vec<WeatherSample>> {
        self.hourly_calls.fetch_add(1, Ordering::SeqCst);
        self.respond(date).await
    }

    async fn fetch_point(
        &self,
        _latitude: f64,
        _longitude: f64,
        timestamp: DateTime<Utc>,
    ) -> ProviderResult<WeatherSample> {
        self.point_calls.fetch_add(1, Ordering::SeqCst);
        let samples = self.respond(timestamp.date_naive()).await?;
        nearest_sample(samples, timestamp)
            .ok_or_else(|| ProviderError::NoData(timestamp.to_rfc3339()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_scripted_failure_and_counts() {
        let provider = ScriptedProvider::new();
        let d1 = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        provider.fail_on(d2, ScriptedFailure::RateLimited);

        assert_eq!(assert_ok!(provider.fetch_hourly(0.0, 0.0, d1).await).len(), 24);
        assert!(assert_err!(provider.fetch_hourly(0.0, 0.0, d2).await).is_rate_limited());

        provider.clear_failures();
        assert_ok!(provider.fetch_hourly(0.0, 0.0, d2).await);
        assert_eq!(provider.hourly_calls(), 3);
        assert_eq!(provider.requested_dates(), vec![d1, d2, d2]);
    }
}
