//! Document store interface consumed by the backfill.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use enrich_common::{
    EnrichResult, HistoryRecord, HourlySolarIrradianceRecord, HourlyWeatherRecord, System,
    WeatherSample,
};

/// Enrichment collections keyed by (system, date).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    HourlyWeather,
    HourlyIrradiance,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HourlyWeather => "hourly_weather",
            Self::HourlyIrradiance => "hourly_irradiance",
        }
    }
}

/// Keyset position for paging history records in (timestamp, id) order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryCursor {
    pub timestamp: DateTime<Utc>,
    pub id: String,
}

impl HistoryCursor {
    pub fn after(record: &HistoryRecord) -> Self {
        Self {
            timestamp: record.timestamp,
            id: record.id.clone(),
        }
    }
}

/// One pending enrichment write.
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichmentWrite {
    HourlyWeather(HourlyWeatherRecord),
    HourlyIrradiance(HourlySolarIrradianceRecord),
    /// Attach a weather sample to a history record that has none
    PointWeather {
        record_id: String,
        sample: WeatherSample,
    },
}

impl EnrichmentWrite {
    /// Identifier used in logs and failure reports.
    pub fn key(&self) -> String {
        match self {
            Self::HourlyWeather(r) => format!("hourly_weather/{}/{}", r.system_id, r.date),
            Self::HourlyIrradiance(r) => format!("hourly_irradiance/{}/{}", r.system_id, r.date),
            Self::PointWeather { record_id, .. } => format!("history/{}", record_id),
        }
    }
}

/// A write that did not persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    pub key: String,
    pub error: String,
}

/// Outcome of one unordered bulk write.
///
/// A write whose key already existed counts as written: the key is
/// persisted either way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkWriteResult {
    pub written: usize,
    pub failed: Vec<WriteFailure>,
}

/// Collection counts for status displays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub systems: u64,
    pub systems_with_coordinates: u64,
    pub history_records: u64,
    pub history_with_weather: u64,
    pub hourly_weather_records: u64,
    pub hourly_irradiance_records: u64,
}

/// Query/aggregate/insert/bulk-write interface over the four collections.
///
/// Errors from any method mean the store is unreachable or broken;
/// per-record failures inside `bulk_write` are reported in its result.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Cheap round trip used to fail fast before a run.
    async fn ping(&self) -> EnrichResult<()>;

    /// Systems with both latitude and longitude set, ordered by id.
    async fn systems_with_coordinates(&self) -> EnrichResult<Vec<System>>;

    /// Earliest and latest history timestamp for a system.
    async fn history_range(
        &self,
        system_id: &str,
    ) -> EnrichResult<Option<(DateTime<Utc>, DateTime<Utc>)>>;

    /// History records without weather, ordered by (timestamp, id), strictly
    /// after `after` when given.
    async fn history_missing_weather(
        &self,
        system_id: &str,
        after: Option<&HistoryCursor>,
        limit: u32,
    ) -> EnrichResult<Vec<HistoryRecord>>;

    /// Whether an enrichment record exists for the key.
    async fn exists(
        &self,
        collection: Collection,
        system_id: &str,
        date: NaiveDate,
    ) -> EnrichResult<bool>;

    async fn hourly_weather(
        &self,
        system_id: &str,
        date: NaiveDate,
    ) -> EnrichResult<Option<HourlyWeatherRecord>>;

    async fn hourly_irradiance(
        &self,
        system_id: &str,
        date: NaiveDate,
    ) -> EnrichResult<Option<HourlySolarIrradianceRecord>>;

    /// Apply writes independently; one failure does not stop the others.
    async fn bulk_write(&self, writes: Vec<EnrichmentWrite>) -> EnrichResult<BulkWriteResult>;

    async fn stats(&self) -> EnrichResult<StoreStats>;

    /// Insert or replace a system (ingestion side and fixtures).
    async fn put_system(&self, system: &System) -> EnrichResult<()>;

    /// Insert or replace a history record (ingestion side and fixtures).
    async fn put_history(&self, record: &HistoryRecord) -> EnrichResult<()>;
}
