//! Documents read and written by the backfill.
//!
//! `System` and `HistoryRecord` are owned by the ingestion side and are only
//! read here, except for the point-weather attachment on a history record.
//! The two hourly record types are created once per (system, date) and never
//! updated; their presence marks the day as done.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A battery system installed at a geographic location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct System {
    pub id: String,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Site altitude in meters above sea level
    #[serde(default)]
    pub altitude: Option<f64>,
}

impl System {
    /// Location of the system, if both coordinates are set.
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
                altitude_m: self.altitude.unwrap_or(0.0),
            }),
            _ => None,
        }
    }
}

/// Resolved location used by the solar and weather lookups.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: f64,
}

/// One captured telemetry snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: String,
    pub system_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub weather: Option<WeatherSample>,
}

/// A single weather observation, either the point attachment on a history
/// record or one hour of an hourly record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSample {
    /// UTC hour of day (0-23)
    pub hour: u32,
    pub timestamp: DateTime<Utc>,
    pub temperature_c: Option<f64>,
    pub cloud_cover_percent: Option<f64>,
    pub relative_humidity: Option<f64>,
    pub wind_speed_kmh: Option<f64>,
    /// WMO weather interpretation code
    pub weather_code: Option<u16>,
    pub condition: Option<String>,
}

/// Hourly cloud/temperature samples for one system and UTC date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyWeatherRecord {
    pub system_id: String,
    pub date: NaiveDate,
    pub daylight_hours: Vec<u32>,
    pub hourly_data: Vec<WeatherSample>,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

/// Computed irradiance for one daylight hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyIrradiance {
    pub hour: u32,
    /// Degrees above the horizon
    pub solar_altitude: f64,
    /// Degrees clockwise from north
    pub solar_azimuth: f64,
    pub clear_sky_global: f64,
    pub clear_sky_direct_horizontal: f64,
    pub clear_sky_diffuse: f64,
    pub actual_global: f64,
    pub actual_direct_horizontal: f64,
    pub actual_diffuse: f64,
    pub cloud_factor: f64,
    pub air_mass: Option<f64>,
    pub cloud_cover_percent: Option<f64>,
    pub cloud_data_available: bool,
}

/// Per-hour irradiance for one system and UTC date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlySolarIrradianceRecord {
    pub system_id: String,
    pub date: NaiveDate,
    pub hours: Vec<HourlyIrradiance>,
    /// True when at least one hour was adjusted with observed cloud cover
    pub cloud_data_available: bool,
    pub created_at: DateTime<Utc>,
}

impl HourlySolarIrradianceRecord {
    /// Sum of hourly cloud-adjusted global irradiance, in Wh/m².
    pub fn daily_insolation(&self) -> f64 {
        self.hours.iter().map(|h| h.actual_global).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn system(lat: Option<f64>, lon: Option<f64>) -> System {
        System {
            id: "sys-1".to_string(),
            name: "Cabin".to_string(),
            latitude: lat,
            longitude: lon,
            altitude: None,
        }
    }

    #[test]
    fn test_coordinates_require_both() {
        assert!(system(Some(39.0), None).coordinates().is_none());
        assert!(system(None, Some(-105.0)).coordinates().is_none());

        let coords = system(Some(39.0), Some(-105.0)).coordinates().unwrap();
        assert_eq!(coords.latitude, 39.0);
        assert_eq!(coords.altitude_m, 0.0);
    }

    #[test]
    fn test_history_record_json_shape() {
        let record = HistoryRecord {
            id: "h1".to_string(),
            system_id: "sys-1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            weather: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["systemId"], "sys-1");
        assert!(json["weather"].is_null());
    }

    #[test]
    fn test_hourly_weather_json_shape() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        let record = HourlyWeatherRecord {
            system_id: "sys-1".to_string(),
            date: ts.date_naive(),
            daylight_hours: vec![10],
            hourly_data: vec![WeatherSample {
                hour: 10,
                timestamp: ts,
                temperature_c: Some(21.0),
                cloud_cover_percent: Some(40.0),
                relative_humidity: None,
                wind_speed_kmh: None,
                weather_code: Some(2),
                condition: Some("Partly cloudy".to_string()),
            }],
            source: "test".to_string(),
            created_at: ts,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["daylightHours"][0], 10);
        assert_eq!(json["hourlyData"][0]["cloudCoverPercent"], 40.0);
        assert_eq!(json["hourlyData"][0]["condition"], "Partly cloudy");
    }
}
