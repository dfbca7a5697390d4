//! Historical weather fetch adapter.
//!
//! The `WeatherProvider` trait is what the backfill driver calls; the
//! Open-Meteo archive client is the production implementation. Providers
//! classify failures but never retry.

pub mod error;
pub mod open_meteo;
pub mod provider;
pub mod wmo;

pub use error::{ProviderError, ProviderResult};
pub use open_meteo::{nearest_sample, parse_hourly, OpenMeteoClient, OpenMeteoConfig};
pub use provider::WeatherProvider;
