//! Common types shared by the enrichment backfill crates and services.

pub mod error;
pub mod model;
pub mod request;
pub mod time;

pub use error::{EnrichError, EnrichResult};
pub use model::{
    Coordinates, HistoryRecord, HourlyIrradiance, HourlySolarIrradianceRecord,
    HourlyWeatherRecord, System, WeatherSample,
};
pub use request::{BackfillKind, BackfillRequest, BackfillSummary, Budget, DEFAULT_DEADLINE_MS};
pub use time::{DayRange, Days};
