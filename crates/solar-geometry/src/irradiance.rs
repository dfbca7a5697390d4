//! Clear-sky and cloud-adjusted irradiance.
//!
//! Clear sky:
//! - Extraterrestrial irradiance corrected for Earth-Sun distance
//! - Kasten-Young relative air mass
//! - Meinel direct-normal attenuation with the Laue altitude term
//! - Diffuse taken as 10% of direct horizontal
//!
//! Clouds use the Kasten-Czeplak factor `1 - 0.75 C^3.4`, which keeps a
//! quarter of clear-sky global irradiance under full overcast.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::position::{solar_position, SolarPosition};
use crate::SOLAR_CONSTANT;

/// Fraction of direct horizontal irradiance added as diffuse skylight.
const DIFFUSE_FRACTION: f64 = 0.1;

/// Laue altitude coefficient (per km).
const LAUE_COEFFICIENT: f64 = 0.14;

/// Clear-sky irradiance components in W/m².
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearSky {
    pub global: f64,
    pub direct_horizontal: f64,
    pub diffuse: f64,
    /// `None` while the sun is below the horizon
    pub air_mass: Option<f64>,
}

impl ClearSky {
    const DARK: ClearSky = ClearSky {
        global: 0.0,
        direct_horizontal: 0.0,
        diffuse: 0.0,
        air_mass: None,
    };
}

/// Cloud-adjusted irradiance components in W/m².
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActualIrradiance {
    pub global: f64,
    pub direct_horizontal: f64,
    pub diffuse: f64,
    pub cloud_factor: f64,
}

/// Full result of [`compute_irradiance`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Irradiance {
    pub is_sun_up: bool,
    pub solar_altitude: f64,
    pub solar_azimuth: f64,
    pub clear_sky: ClearSky,
    pub actual: ActualIrradiance,
}

/// Compute sun position and irradiance at one instant.
///
/// # Arguments
/// * `timestamp` - UTC instant
/// * `latitude`, `longitude` - Site location in degrees
/// * `cloud_cover_percent` - Observed cloud cover (0-100), `None` if unknown
/// * `altitude_m` - Site altitude in meters above sea level
pub fn compute_irradiance(
    timestamp: DateTime<Utc>,
    latitude: f64,
    longitude: f64,
    cloud_cover_percent: Option<f64>,
    altitude_m: f64,
) -> Irradiance {
    let position = solar_position(timestamp, latitude, longitude);
    let clear = clear_sky(&position, altitude_m);
    let cover = cloud_fraction(cloud_cover_percent);
    let factor = cloud_factor(cloud_cover_percent);

    let actual = match cover {
        Some(c) => {
            let global = clear.global * factor;
            let direct_horizontal = clear.direct_horizontal * (1.0 - c);
            ActualIrradiance {
                global,
                direct_horizontal,
                diffuse: (global - direct_horizontal).max(0.0),
                cloud_factor: factor,
            }
        }
        None => ActualIrradiance {
            global: clear.global,
            direct_horizontal: clear.direct_horizontal,
            diffuse: clear.diffuse,
            cloud_factor: factor,
        },
    };

    Irradiance {
        is_sun_up: position.is_sun_up(),
        solar_altitude: position.altitude,
        solar_azimuth: position.azimuth,
        clear_sky: clear,
        actual,
    }
}

/// Clear-sky irradiance for an already computed sun position.
pub fn clear_sky(position: &SolarPosition, altitude_m: f64) -> ClearSky {
    if !position.is_sun_up() {
        return ClearSky::DARK;
    }

    let am = air_mass(position.zenith);
    let h_km = (altitude_m / 1000.0).max(0.0);
    let i0 = extraterrestrial(position.day_of_year);
    let attenuation = 0.7_f64.powf(am.powf(0.678));
    let dni = i0 * ((1.0 - LAUE_COEFFICIENT * h_km) * attenuation + LAUE_COEFFICIENT * h_km);

    let direct_horizontal = dni * position.altitude.to_radians().sin();
    let diffuse = DIFFUSE_FRACTION * direct_horizontal;

    ClearSky {
        global: direct_horizontal + diffuse,
        direct_horizontal,
        diffuse,
        air_mass: Some(am),
    }
}

/// Multiplicative attenuation of global irradiance from cloud cover.
///
/// 1.0 for clear or unknown skies, falling to 0.25 at full overcast.
pub fn cloud_factor(cloud_cover_percent: Option<f64>) -> f64 {
    match cloud_fraction(cloud_cover_percent) {
        Some(c) => 1.0 - 0.75 * c.powf(3.4),
        None => 1.0,
    }
}

fn cloud_fraction(cloud_cover_percent: Option<f64>) -> Option<f64> {
    cloud_cover_percent
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 100.0) / 100.0)
}

/// Kasten-Young (1989) relative air mass for a zenith angle in degrees.
pub fn air_mass(zenith_deg: f64) -> f64 {
    let z = zenith_deg.clamp(0.0, 90.0);
    1.0 / (z.to_radians().cos() + 0.50572 * (96.07995 - z).powf(-1.6364))
}

/// Extraterrestrial normal irradiance for day-of-year `n`.
pub fn extraterrestrial(n: u32) -> f64 {
    SOLAR_CONSTANT * (1.0 + 0.033 * (360.0 * n as f64 / 365.0).to_radians().cos())
}
