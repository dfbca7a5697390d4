//! Shared test utilities for the enrichment backfill workspace.
//!
//! This crate provides:
//! - Fixture builders for systems, history and weather samples
//! - `ScriptedProvider`, a deterministic `WeatherProvider`
//! - Store seeding helpers
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../../crates/test-utils" }
//! ```

pub mod fixtures;
pub mod provider;

pub use fixtures::*;
pub use provider::{ScriptedFailure, ScriptedProvider};

/// Asserts two floats are within a tolerance, `1e-9` when none is given.
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(record.daily_insolation(), 700.0);
/// assert_approx_eq!(air_mass(0.0), 1.0, 0.01);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($actual:expr, $expected:expr) => {
        $crate::assert_approx_eq!($actual, $expected, 1e-9)
    };
    ($actual:expr, $expected:expr, $tolerance:expr) => {{
        let (actual, expected, tolerance): (f64, f64, f64) =
            ($actual as f64, $expected as f64, $tolerance as f64);
        assert!(
            (actual - expected).abs() <= tolerance,
            "{} = {} is not within {} of {}",
            stringify!($actual),
            actual,
            tolerance,
            expected
        );
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_approx_eq_accepts_values_within_tolerance() {
        assert_approx_eq!(0.1 + 0.2, 0.3);
        assert_approx_eq!(99.6, 100.0, 0.5);
    }

    #[test]
    #[should_panic(expected = "is not within 0.001 of 1")]
    fn test_approx_eq_reports_expression() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }
}
