//! In-memory document store for tests and dry runs.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use enrich_common::{
    EnrichError, EnrichResult, HistoryRecord, HourlySolarIrradianceRecord, HourlyWeatherRecord,
    System, WeatherSample,
};

use crate::store::{
    BulkWriteResult, Collection, DocumentStore, EnrichmentWrite, HistoryCursor, StoreStats,
    WriteFailure,
};

type DayKey = (String, NaiveDate);

/// Store that keeps every collection in ordered maps.
///
/// Failure injection:
/// - `reject_writes_for` makes writes with a given key fail inside `bulk_write`
/// - `set_unavailable` makes every call return a database error
#[derive(Default)]
pub struct InMemoryStore {
    systems: RwLock<BTreeMap<String, System>>,
    history: RwLock<BTreeMap<String, HistoryRecord>>,
    hourly_weather: RwLock<BTreeMap<DayKey, HourlyWeatherRecord>>,
    hourly_irradiance: RwLock<BTreeMap<DayKey, HourlySolarIrradianceRecord>>,
    rejected_keys: RwLock<HashSet<String>>,
    unavailable: AtomicBool,
    bulk_writes: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail writes whose `EnrichmentWrite::key` equals `key`.
    pub async fn reject_writes_for(&self, key: impl Into<String>) {
        self.rejected_keys.write().await.insert(key.into());
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `bulk_write` calls made so far.
    pub fn bulk_write_calls(&self) -> usize {
        self.bulk_writes.load(Ordering::SeqCst)
    }

    pub async fn history_record(&self, id: &str) -> Option<HistoryRecord> {
        self.history.read().await.get(id).cloned()
    }

    fn check_available(&self) -> EnrichResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(EnrichError::DatabaseError(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    async fn apply(&self, write: EnrichmentWrite) -> Result<(), String> {
        match write {
            EnrichmentWrite::HourlyWeather(record) => {
                let key = (record.system_id.clone(), record.date);
                self.hourly_weather
                    .write()
                    .await
                    .entry(key)
                    .or_insert(record);
                Ok(())
            }
            EnrichmentWrite::HourlyIrradiance(record) => {
                let key = (record.system_id.clone(), record.date);
                self.hourly_irradiance
                    .write()
                    .await
                    .entry(key)
                    .or_insert(record);
                Ok(())
            }
            EnrichmentWrite::PointWeather { record_id, sample } => {
                let mut history = self.history.write().await;
                let record = history
                    .get_mut(&record_id)
                    .ok_or_else(|| "history record not found".to_string())?;
                attach(record, sample);
                Ok(())
            }
        }
    }
}

fn attach(record: &mut HistoryRecord, sample: WeatherSample) {
    if record.weather.is_none() {
        record.weather = Some(sample);
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn ping(&self) -> EnrichResult<()> {
        self.check_available()
    }

    async fn systems_with_coordinates(&self) -> EnrichResult<Vec<System>> {
        self.check_available()?;
        Ok(self
            .systems
            .read()
            .await
            .values()
            .filter(|s| s.coordinates().is_some())
            .cloned()
            .collect())
    }

    async fn history_range(
        &self,
        system_id: &str,
    ) -> EnrichResult<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        self.check_available()?;
        let history = self.history.read().await;
        let mut timestamps = history
            .values()
            .filter(|r| r.system_id == system_id)
            .map(|r| r.timestamp);

        let first = match timestamps.next() {
            Some(ts) => ts,
            None => return Ok(None),
        };
        let (min, max) = timestamps.fold((first, first), |(min, max), ts| {
            (min.min(ts), max.max(ts))
        });
        Ok(Some((min, max)))
    }

    async fn history_missing_weather(
        &self,
        system_id: &str,
        after: Option<&HistoryCursor>,
        limit: u32,
    ) -> EnrichResult<Vec<HistoryRecord>> {
        self.check_available()?;
        let history = self.history.read().await;
        let mut records: Vec<HistoryRecord> = history
            .values()
            .filter(|r| r.system_id == system_id && r.weather.is_none())
            .filter(|r| match after {
                Some(c) => (r.timestamp, r.id.as_str()) > (c.timestamp, c.id.as_str()),
                None => true,
            })
            .cloned()
            .collect();

        records.sort_by(|a, b| (a.timestamp, &a.id).cmp(&(b.timestamp, &b.id)));
        records.truncate(limit as usize);
        Ok(records)
    }

    async fn exists(
        &self,
        collection: Collection,
        system_id: &str,
        date: NaiveDate,
    ) -> EnrichResult<bool> {
        self.check_available()?;
        let key = (system_id.to_string(), date);
        Ok(match collection {
            Collection::HourlyWeather => self.hourly_weather.read().await.contains_key(&key),
            Collection::HourlyIrradiance => {
                self.hourly_irradiance.read().await.contains_key(&key)
            }
        })
    }

    async fn hourly_weather(
        &self,
        system_id: &str,
        date: NaiveDate,
    ) -> EnrichResult<Option<HourlyWeatherRecord>> {
        self.check_available()?;
        let key = (system_id.to_string(), date);
        Ok(self.hourly_weather.read().await.get(&key).cloned())
    }

    async fn hourly_irradiance(
        &self,
        system_id: &str,
        date: NaiveDate,
    ) -> EnrichResult<Option<HourlySolarIrradianceRecord>> {
        self.check_available()?;
        let key = (system_id.to_string(), date);
        Ok(self.hourly_irradiance.read().await.get(&key).cloned())
    }

    async fn bulk_write(&self, writes: Vec<EnrichmentWrite>) -> EnrichResult<BulkWriteResult> {
        self.check_available()?;
        self.bulk_writes.fetch_add(1, Ordering::SeqCst);

        let rejected = self.rejected_keys.read().await.clone();
        let mut result = BulkWriteResult::default();

        for write in writes {
            let key = write.key();
            if rejected.contains(&key) {
                result.failed.push(WriteFailure {
                    key,
                    error: "write rejected".to_string(),
                });
                continue;
            }
            match self.apply(write).await {
                Ok(()) => result.written += 1,
                Err(error) => result.failed.push(WriteFailure { key, error }),
            }
        }

        Ok(result)
    }

    async fn stats(&self) -> EnrichResult<StoreStats> {
        self.check_available()?;
        let systems = self.systems.read().await;
        let history = self.history.read().await;
        Ok(StoreStats {
            systems: systems.len() as u64,
            systems_with_coordinates: systems
                .values()
                .filter(|s| s.coordinates().is_some())
                .count() as u64,
            history_records: history.len() as u64,
            history_with_weather: history.values().filter(|r| r.weather.is_some()).count()
                as u64,
            hourly_weather_records: self.hourly_weather.read().await.len() as u64,
            hourly_irradiance_records: self.hourly_irradiance.read().await.len() as u64,
        })
    }

    async fn put_system(&self, system: &System) -> EnrichResult<()> {
        self.check_available()?;
        self.systems
            .write()
            .await
            .insert(system.id.clone(), system.clone());
        Ok(())
    }

    async fn put_history(&self, record: &HistoryRecord) -> EnrichResult<()> {
        self.check_available()?;
        self.history
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: &str, hour: u32) -> HistoryRecord {
        HistoryRecord {
            id: id.to_string(),
            system_id: "sys".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap(),
            weather: None,
        }
    }

    fn weather_record(date: NaiveDate) -> HourlyWeatherRecord {
        HourlyWeatherRecord {
            system_id: "sys".to_string(),
            date,
            daylight_hours: vec![],
            hourly_data: vec![],
            source: "test".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_paging_orders_by_timestamp_then_id() {
        let store = InMemoryStore::new();
        store.put_history(&record("b", 10)).await.unwrap();
        store.put_history(&record("a", 10)).await.unwrap();
        store.put_history(&record("c", 9)).await.unwrap();

        let page = store.history_missing_weather("sys", None, 2).await.unwrap();
        let ids: Vec<_> = page.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);

        let cursor = HistoryCursor::after(&page[1]);
        let next = store
            .history_missing_weather("sys", Some(&cursor), 2)
            .await
            .unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].id, "b");
    }

    #[tokio::test]
    async fn test_rejected_key_fails_only_that_write() {
        let store = InMemoryStore::new();
        let d1 = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        store.reject_writes_for("hourly_weather/sys/2024-06-01").await;

        let result = store
            .bulk_write(vec![
                EnrichmentWrite::HourlyWeather(weather_record(d1)),
                EnrichmentWrite::HourlyWeather(weather_record(d2)),
            ])
            .await
            .unwrap();

        assert_eq!(result.written, 1);
        assert_eq!(result.failed.len(), 1);
        assert!(!store.exists(Collection::HourlyWeather, "sys", d1).await.unwrap());
        assert!(store.exists(Collection::HourlyWeather, "sys", d2).await.unwrap());
    }

    #[tokio::test]
    async fn test_unavailable_store_errors() {
        let store = InMemoryStore::new();
        store.set_unavailable(true);
        let err = store.ping().await.unwrap_err();
        assert!(err.is_environment_failure());
        store.set_unavailable(false);
        assert!(store.ping().await.is_ok());
    }
}
