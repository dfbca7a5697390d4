//! Fixture builders for backfill tests.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use enrich_common::{time::at_hour, EnrichResult, HistoryRecord, System, WeatherSample};
use storage::DocumentStore;

/// Latitude/longitude of the reference site used across driver tests.
pub const DENVER: (f64, f64) = (39.0, -105.0);

/// A system with coordinates and no altitude.
pub fn system_at(id: &str, latitude: f64, longitude: f64) -> System {
    System {
        id: id.to_string(),
        name: format!("Test system {}", id),
        latitude: Some(latitude),
        longitude: Some(longitude),
        altitude: None,
    }
}

/// A system the backfill must ignore.
pub fn system_without_coordinates(id: &str) -> System {
    System {
        id: id.to_string(),
        name: format!("Test system {}", id),
        latitude: None,
        longitude: Some(-105.0),
        altitude: None,
    }
}

/// Midnight UTC on the given day.
pub fn utc_date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// `per_day` evenly spaced records on each of `days` consecutive days
/// starting at `start`, all without weather.
///
/// Ids are `{system_id}-h{index:04}`, so id order matches time order.
pub fn history_span(
    system_id: &str,
    start: DateTime<Utc>,
    days: u32,
    per_day: u32,
) -> Vec<HistoryRecord> {
    let per_day = per_day.max(1);
    let step_minutes = (24 * 60 / per_day) as i64;
    let mut records = Vec::with_capacity((days * per_day) as usize);

    for day in 0..days {
        for slot in 0..per_day {
            let index = day * per_day + slot;
            records.push(HistoryRecord {
                id: format!("{}-h{:04}", system_id, index),
                system_id: system_id.to_string(),
                timestamp: start
                    + Duration::days(day as i64)
                    + Duration::minutes(step_minutes * slot as i64),
                weather: None,
            });
        }
    }
    records
}

/// Twenty-four hourly samples for `date` with a constant cloud cover.
pub fn hourly_samples(date: NaiveDate, cloud_cover_percent: Option<f64>) -> Vec<WeatherSample> {
    (0..24)
        .map(|hour| WeatherSample {
            hour,
            timestamp: at_hour(date, hour, 0),
            temperature_c: Some(10.0 + hour as f64 * 0.5),
            cloud_cover_percent,
            relative_humidity: Some(50.0),
            wind_speed_kmh: Some(8.0),
            weather_code: Some(if cloud_cover_percent.unwrap_or(0.0) > 80.0 { 3 } else { 1 }),
            condition: None,
        })
        .collect()
}

/// Insert a system and its history into a store.
pub async fn seed(
    store: &dyn DocumentStore,
    system: &System,
    history: &[HistoryRecord],
) -> EnrichResult<()> {
    store.put_system(system).await?;
    for record in history {
        store.put_history(record).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_span_covers_days() {
        let records = history_span("sys", utc_date(2024, 6, 1), 3, 4);
        assert_eq!(records.len(), 12);
        assert_eq!(records[0].timestamp, utc_date(2024, 6, 1));
        assert_eq!(
            records[11].timestamp,
            Utc.with_ymd_and_hms(2024, 6, 3, 18, 0, 0).unwrap()
        );
        assert!(records.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn test_hourly_samples_full_day() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let samples = hourly_samples(date, Some(40.0));
        assert_eq!(samples.len(), 24);
        assert_eq!(samples[23].hour, 23);
        assert!(samples.iter().all(|s| s.cloud_cover_percent == Some(40.0)));
    }
}
