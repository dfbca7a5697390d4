//! Daylight hours and solar noon for a UTC calendar date.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

use crate::position::{equation_of_time, solar_position};

/// UTC hours of `date` during which the sun is above the horizon.
///
/// Each hour is sampled at its midpoint, so an hour counts when the sun is
/// up for most of it.
pub fn daylight_hours(date: NaiveDate, latitude: f64, longitude: f64) -> Vec<u32> {
    (0..24)
        .filter(|&hour| {
            let ts = mid_hour(date, hour);
            solar_position(ts, latitude, longitude).is_sun_up()
        })
        .collect()
}

/// Midpoint of a UTC hour on `date`.
pub fn mid_hour(date: NaiveDate, hour: u32) -> DateTime<Utc> {
    midnight(date) + Duration::hours(hour as i64) + Duration::minutes(30)
}

/// UTC instant of local solar noon on `date` at `longitude`.
pub fn solar_noon(date: NaiveDate, longitude: f64) -> DateTime<Utc> {
    let eot = equation_of_time(date.ordinal());
    let noon_hours = 12.0 - (4.0 * longitude + eot) / 60.0;
    midnight(date) + Duration::milliseconds((noon_hours * 3_600_000.0).round() as i64)
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_solar_noon_greenwich_near_utc_noon() {
        let noon = solar_noon(date(2024, 3, 20), 0.0);
        assert_eq!(noon.hour(), 12);
        assert!(noon.minute() >= 5 && noon.minute() <= 10, "minute {}", noon.minute());
    }

    #[test]
    fn test_solar_noon_shifts_with_longitude() {
        let denver = solar_noon(date(2024, 6, 21), -105.0);
        assert_eq!(denver.hour(), 19);
    }

    #[test]
    fn test_mid_summer_arctic_is_all_day() {
        assert_eq!(daylight_hours(date(2024, 6, 21), 78.2, 15.6).len(), 24);
    }

    #[test]
    fn test_daylight_hours_sorted_and_unique() {
        let hours = daylight_hours(date(2024, 6, 1), 39.0, -105.0);
        assert!(!hours.is_empty());
        assert!(hours.windows(2).all(|w| w[0] < w[1]));
        assert!(hours.iter().all(|&h| h < 24));
    }
}
