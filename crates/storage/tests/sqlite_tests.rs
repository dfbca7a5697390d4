//! File-backed SQLite store behavior.

use chrono::{NaiveDate, TimeZone, Utc};
use enrich_common::{HourlyIrradiance, HourlySolarIrradianceRecord, System};
use storage::{Collection, DocumentStore, EnrichmentWrite, SqliteStore};
use tempfile::TempDir;

fn irradiance_record(date: NaiveDate) -> HourlySolarIrradianceRecord {
    HourlySolarIrradianceRecord {
        system_id: "sys-1".to_string(),
        date,
        hours: vec![HourlyIrradiance {
            hour: 18,
            solar_altitude: 70.0,
            solar_azimuth: 180.0,
            clear_sky_global: 950.0,
            clear_sky_direct_horizontal: 860.0,
            clear_sky_diffuse: 90.0,
            actual_global: 700.0,
            actual_direct_horizontal: 600.0,
            actual_diffuse: 100.0,
            cloud_factor: 0.75,
            air_mass: Some(1.0625),
            cloud_cover_percent: Some(30.0),
            cloud_data_available: true,
        }],
        cloud_data_available: true,
        created_at: Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("enrich.db");
    let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

    {
        let store = SqliteStore::open(&path).await.unwrap();
        store
            .put_system(&System {
                id: "sys-1".to_string(),
                name: "Cabin".to_string(),
                latitude: Some(39.0),
                longitude: Some(-105.0),
                altitude: Some(1600.0),
            })
            .await
            .unwrap();
        let result = store
            .bulk_write(vec![EnrichmentWrite::HourlyIrradiance(irradiance_record(
                date,
            ))])
            .await
            .unwrap();
        assert_eq!(result.written, 1);
    }

    let store = SqliteStore::open(&path).await.unwrap();
    assert!(store
        .exists(Collection::HourlyIrradiance, "sys-1", date)
        .await
        .unwrap());
    assert!(!store
        .exists(Collection::HourlyWeather, "sys-1", date)
        .await
        .unwrap());

    let loaded = store.hourly_irradiance("sys-1", date).await.unwrap().unwrap();
    assert_eq!(loaded, irradiance_record(date));
    assert_eq!(loaded.daily_insolation(), 700.0);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.systems_with_coordinates, 1);
    assert_eq!(stats.hourly_irradiance_records, 1);
}

#[tokio::test]
async fn test_migrate_is_repeatable() {
    let store = SqliteStore::open_memory().await.unwrap();
    store.migrate().await.unwrap();
    store.ping().await.unwrap();
}
