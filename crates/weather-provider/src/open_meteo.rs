//! Open-Meteo historical archive client.
//!
//! Requests one UTC day of hourly observations per call:
//! `GET {base}/v1/archive?latitude=..&longitude=..&start_date=D&end_date=D
//! &hourly=temperature_2m,relative_humidity_2m,cloud_cover,weather_code,wind_speed_10m
//! &timezone=UTC`

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument};

use enrich_common::WeatherSample;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::WeatherProvider;
use crate::wmo;

pub const DEFAULT_BASE_URL: &str = "https://archive-api.open-meteo.com";

const HOURLY_VARIABLES: &str =
    "temperature_2m,relative_humidity_2m,cloud_cover,weather_code,wind_speed_10m";

/// Longest error body kept in `ProviderError::Api`.
const MAX_ERROR_BODY: usize = 256;

/// Connection settings for [`OpenMeteoClient`].
#[derive(Debug, Clone)]
pub struct OpenMeteoConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for OpenMeteoConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(15),
            user_agent: format!("enrich-backfill/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Weather provider backed by the Open-Meteo archive API.
pub struct OpenMeteoClient {
    client: Client,
    archive_url: String,
}

impl OpenMeteoClient {
    pub fn new(config: OpenMeteoConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(config.user_agent)
            .build()?;

        Ok(Self {
            client,
            archive_url: format!("{}/v1/archive", config.base_url.trim_end_matches('/')),
        })
    }

    pub fn archive_url(&self) -> &str {
        &self.archive_url
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoClient {
    fn name(&self) -> &str {
        "open-meteo"
    }

    #[instrument(skip(self))]
    async fn fetch_hourly(
        &self,
        latitude: f64,
        longitude: f64,
        date: NaiveDate,
    ) -> ProviderResult<Vec<WeatherSample>> {
        let day = date.to_string();
        let response = self
            .client
            .get(&self.archive_url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("start_date", day.clone()),
                ("end_date", day),
                ("hourly", HOURLY_VARIABLES.to_string()),
                ("timezone", "UTC".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(floor_char_boundary(&body, MAX_ERROR_BODY));
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let samples = parse_hourly(&body, date)?;
        debug!(samples = samples.len(), "Fetched hourly weather");
        Ok(samples)
    }

    /// Only the timestamp's own UTC day is requested, so 23:50 resolves to
    /// 23:00 rather than the next day's 00:00.
    async fn fetch_point(
        &self,
        latitude: f64,
        longitude: f64,
        timestamp: DateTime<Utc>,
    ) -> ProviderResult<WeatherSample> {
        let samples = self
            .fetch_hourly(latitude, longitude, timestamp.date_naive())
            .await?;
        nearest_sample(samples, timestamp)
            .ok_or_else(|| ProviderError::NoData(timestamp.to_rfc3339()))
    }
}

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    hourly: Option<HourlySeries>,
}

#[derive(Debug, Deserialize)]
struct HourlySeries {
    time: Vec<String>,
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    relative_humidity_2m: Vec<Option<f64>>,
    #[serde(default)]
    cloud_cover: Vec<Option<f64>>,
    #[serde(default)]
    weather_code: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m: Vec<Option<f64>>,
}

fn value_at(series: &[Option<f64>], index: usize) -> Option<f64> {
    series.get(index).copied().flatten()
}

/// Parse an archive response body into the samples that fall on `date`.
///
/// Rows where every variable is null are dropped. A day with no remaining
/// rows is `NoData`, so it is fetched again on a later run.
pub fn parse_hourly(body: &str, date: NaiveDate) -> ProviderResult<Vec<WeatherSample>> {
    let response: ArchiveResponse = serde_json::from_str(body)?;
    let series = response
        .hourly
        .ok_or_else(|| ProviderError::Parse("response has no hourly block".to_string()))?;

    let mut samples = Vec::with_capacity(series.time.len());
    for (i, time) in series.time.iter().enumerate() {
        let naive = NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M")
            .map_err(|e| ProviderError::Parse(format!("bad time '{}': {}", time, e)))?;
        if naive.date() != date {
            continue;
        }

        let weather_code = value_at(&series.weather_code, i)
            .filter(|c| *c >= 0.0 && *c <= u16::MAX as f64)
            .map(|c| c as u16);
        let sample = WeatherSample {
            hour: naive.hour(),
            timestamp: naive.and_utc(),
            temperature_c: value_at(&series.temperature_2m, i),
            cloud_cover_percent: value_at(&series.cloud_cover, i),
            relative_humidity: value_at(&series.relative_humidity_2m, i),
            wind_speed_kmh: value_at(&series.wind_speed_10m, i),
            weather_code,
            condition: weather_code.map(|c| wmo::condition(c).to_string()),
        };

        if has_values(&sample) {
            samples.push(sample);
        }
    }

    if samples.is_empty() {
        return Err(ProviderError::NoData(date.to_string()));
    }
    samples.sort_by_key(|s| s.hour);
    Ok(samples)
}

fn has_values(sample: &WeatherSample) -> bool {
    sample.temperature_c.is_some()
        || sample.cloud_cover_percent.is_some()
        || sample.relative_humidity.is_some()
        || sample.wind_speed_kmh.is_some()
        || sample.weather_code.is_some()
}

/// Sample whose timestamp is closest to `timestamp`; the earlier one wins ties.
pub fn nearest_sample(
    samples: Vec<WeatherSample>,
    timestamp: DateTime<Utc>,
) -> Option<WeatherSample> {
    samples
        .into_iter()
        .min_by_key(|s| ((s.timestamp - timestamp).num_seconds().abs(), s.timestamp))
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}
