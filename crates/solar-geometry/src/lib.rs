//! Solar geometry and irradiance.
//!
//! Implements sun position and a clear-sky irradiance model from scratch
//! without external dependencies. All functions are pure: the same
//! timestamp and location always produce the same output.

pub mod daylight;
pub mod irradiance;
pub mod position;

pub use daylight::{daylight_hours, mid_hour, solar_noon};
pub use irradiance::{
    clear_sky, cloud_factor, compute_irradiance, ActualIrradiance, ClearSky, Irradiance,
};
pub use position::{solar_position, SolarPosition};

/// Solar constant in W/m².
pub const SOLAR_CONSTANT: f64 = 1361.0;
