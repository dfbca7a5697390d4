//! Sun position from UTC time and geographic location.
//!
//! Uses Cooper's declination and the Spencer equation of time. Accuracy is
//! a fraction of a degree, which is well inside what hourly irradiance
//! estimates need.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Axial tilt used by Cooper's declination formula, in degrees.
pub const EARTH_AXIAL_TILT: f64 = 23.45;

/// Hour angle advances 15 degrees per hour.
pub const DEGREES_PER_HOUR: f64 = 15.0;

/// Sun position at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolarPosition {
    pub day_of_year: u32,
    /// Solar declination in degrees
    pub declination: f64,
    /// Equation of time in minutes
    pub equation_of_time: f64,
    /// Local solar time in hours [0, 24)
    pub local_solar_time: f64,
    /// Hour angle in degrees [-180, 180), negative before solar noon
    pub hour_angle: f64,
    /// Zenith angle in degrees
    pub zenith: f64,
    /// Altitude above the horizon in degrees
    pub altitude: f64,
    /// Azimuth in degrees clockwise from north [0, 360)
    pub azimuth: f64,
}

impl SolarPosition {
    pub fn is_sun_up(&self) -> bool {
        self.altitude > 0.0
    }
}

/// Compute the sun position for a UTC instant at the given location.
pub fn solar_position(timestamp: DateTime<Utc>, latitude: f64, longitude: f64) -> SolarPosition {
    let n = timestamp.ordinal();
    let utc_hours = timestamp.hour() as f64
        + timestamp.minute() as f64 / 60.0
        + timestamp.second() as f64 / 3600.0;

    let declination = solar_declination(n);
    let eot = equation_of_time(n);
    let lst = (utc_hours + (4.0 * longitude + eot) / 60.0).rem_euclid(24.0);
    let ha = hour_angle(lst);

    let zenith = zenith_angle(latitude, declination, ha);
    let altitude = 90.0 - zenith;
    let azimuth = azimuth(latitude, declination, ha);

    SolarPosition {
        day_of_year: n,
        declination,
        equation_of_time: eot,
        local_solar_time: lst,
        hour_angle: ha,
        zenith,
        altitude,
        azimuth,
    }
}

/// Declination in degrees for day-of-year `n`.
pub fn solar_declination(n: u32) -> f64 {
    EARTH_AXIAL_TILT * (360.0 * (284 + n) as f64 / 365.0).to_radians().sin()
}

/// Equation of time in minutes for day-of-year `n`.
pub fn equation_of_time(n: u32) -> f64 {
    let b = (360.0 * (n as f64 - 1.0) / 365.0).to_radians();
    229.18
        * (0.000075 + 0.001868 * b.cos()
            - 0.032077 * b.sin()
            - 0.014615 * (2.0 * b).cos()
            - 0.040849 * (2.0 * b).sin())
}

/// Hour angle in degrees for a local solar time in hours, wrapped to [-180, 180).
pub fn hour_angle(local_solar_time: f64) -> f64 {
    (DEGREES_PER_HOUR * (local_solar_time - 12.0) + 180.0).rem_euclid(360.0) - 180.0
}

fn zenith_angle(latitude: f64, declination: f64, hour_angle: f64) -> f64 {
    let lat = latitude.to_radians();
    let dec = declination.to_radians();
    let ha = hour_angle.to_radians();
    let cos_zenith = lat.sin() * dec.sin() + lat.cos() * dec.cos() * ha.cos();
    cos_zenith.clamp(-1.0, 1.0).acos().to_degrees()
}

fn azimuth(latitude: f64, declination: f64, hour_angle: f64) -> f64 {
    let lat = latitude.to_radians();
    let dec = declination.to_radians();
    let ha = hour_angle.to_radians();
    let sin_az = -dec.cos() * ha.sin();
    let cos_az = dec.sin() * lat.cos() - dec.cos() * lat.sin() * ha.cos();
    sin_az.atan2(cos_az).to_degrees().rem_euclid(360.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_utils::assert_approx_eq;

    #[test]
    fn test_declination_extremes() {
        // Near the June solstice (day 172) and December solstice (day 355)
        assert_approx_eq!(solar_declination(172), 23.45, 0.1);
        assert_approx_eq!(solar_declination(355), -23.45, 0.1);
    }

    #[test]
    fn test_equation_of_time_range() {
        for n in 1..=365 {
            let eot = equation_of_time(n);
            assert!(eot > -15.0 && eot < 17.0, "day {} eot {}", n, eot);
        }
    }

    #[test]
    fn test_hour_angle_wraps() {
        assert_eq!(hour_angle(12.0), 0.0);
        assert_eq!(hour_angle(6.0), -90.0);
        assert_eq!(hour_angle(18.0), 90.0);
        assert_eq!(hour_angle(0.0), -180.0);
    }

    #[test]
    fn test_morning_sun_is_east() {
        // Denver, summer morning (14:00 UTC is 08:00 MDT)
        let ts = Utc.with_ymd_and_hms(2024, 6, 21, 14, 0, 0).unwrap();
        let pos = solar_position(ts, 39.74, -104.99);
        assert!(pos.is_sun_up());
        assert!(pos.azimuth > 45.0 && pos.azimuth < 120.0, "azimuth {}", pos.azimuth);
        assert!(pos.hour_angle < 0.0);
    }

    #[test]
    fn test_midnight_sun_is_down() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 21, 0, 0, 0).unwrap();
        let pos = solar_position(ts, 0.0, 0.0);
        assert!(!pos.is_sun_up());
        assert!(pos.altitude < -60.0);
    }
}
