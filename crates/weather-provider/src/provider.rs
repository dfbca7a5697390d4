use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use enrich_common::WeatherSample;

use crate::error::ProviderResult;

/// Source of historical weather observations.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Name stored as the `source` of hourly records.
    fn name(&self) -> &str;

    /// All hourly samples for a UTC date, ordered by hour.
    async fn fetch_hourly(
        &self,
        latitude: f64,
        longitude: f64,
        date: NaiveDate,
    ) -> ProviderResult<Vec<WeatherSample>>;

    /// The sample closest to `timestamp`, taken from that timestamp's UTC day.
    async fn fetch_point(
        &self,
        latitude: f64,
        longitude: f64,
        timestamp: DateTime<Utc>,
    ) -> ProviderResult<WeatherSample>;
}
