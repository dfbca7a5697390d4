//! Physical sanity checks for the solar geometry engine.

use chrono::{NaiveDate, TimeZone, Utc};
use solar_geometry::{compute_irradiance, daylight_hours, solar_noon, solar_position};
use test_utils::assert_approx_eq;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_equator_equinox_noon_is_overhead() {
    let noon = solar_noon(date(2024, 3, 20), 0.0);
    let pos = solar_position(noon, 0.0, 0.0);
    assert!(pos.altitude > 89.0, "altitude {}", pos.altitude);
    assert_approx_eq!(pos.hour_angle, 0.0, 0.5);
}

#[test]
fn test_equator_equinox_has_twelve_daylight_hours() {
    let hours = daylight_hours(date(2024, 3, 20), 0.0, 0.0);
    assert!(
        (11..=13).contains(&hours.len()),
        "expected about 12 daylight hours, got {:?}",
        hours
    );
    assert_eq!(hours.first(), Some(&6));
    assert_eq!(hours.last(), Some(&17));
}

#[test]
fn test_polar_night_has_no_daylight() {
    // Longyearbyen in December
    assert!(daylight_hours(date(2024, 12, 21), 78.2, 15.6).is_empty());
    // Southern polar night mirrors it in June
    assert!(daylight_hours(date(2024, 6, 21), -80.0, 0.0).is_empty());
}

#[test]
fn test_longitude_shifts_daylight_window() {
    let greenwich = daylight_hours(date(2024, 3, 20), 0.0, 0.0);
    let denver = daylight_hours(date(2024, 3, 20), 0.0, -105.0);
    assert_eq!(greenwich.len(), denver.len());
    // Local morning starts at 13 UTC; hour 0 is the previous local evening
    assert!(denver.contains(&13) && !denver.contains(&12));
    assert!(denver.contains(&0));
}

#[test]
fn test_actual_global_non_increasing_with_cloud_cover() {
    let ts = Utc.with_ymd_and_hms(2024, 6, 1, 18, 30, 0).unwrap();
    let mut previous = f64::INFINITY;
    for cover in (0..=100).step_by(5) {
        let irr = compute_irradiance(ts, 39.0, -105.0, Some(cover as f64), 1600.0);
        assert!(
            irr.actual.global <= previous + 1e-9,
            "global rose at {}% cloud cover",
            cover
        );
        assert!(irr.actual.global > 0.0);
        previous = irr.actual.global;
    }
}

#[test]
fn test_components_are_consistent() {
    let ts = Utc.with_ymd_and_hms(2024, 9, 10, 17, 0, 0).unwrap();
    for cover in [None, Some(0.0), Some(35.0), Some(80.0), Some(100.0)] {
        let irr = compute_irradiance(ts, 45.0, -93.0, cover, 250.0);
        let a = irr.actual;
        assert!(a.direct_horizontal >= 0.0 && a.diffuse >= 0.0);
        assert_approx_eq!(a.direct_horizontal + a.diffuse, a.global, 1e-6);
        assert!(a.global <= irr.clear_sky.global + 1e-9);
    }
}

#[test]
fn test_output_serializes_camel_case() {
    let ts = Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap();
    let irr = compute_irradiance(ts, 39.0, -105.0, Some(50.0), 0.0);
    let json = serde_json::to_value(irr).unwrap();
    assert_eq!(json["isSunUp"], true);
    assert!(json["clearSky"]["airMass"].is_number());
    assert!(json["actual"]["cloudFactor"].is_number());
}
