//! Six-station manufacturing line simulation.
//!
//! Items arrive at random intervals and pass through six stations: stations 1 to 3 in
//! sequence, then stations 4 and 5 in whichever order they become available, and finally
//! station 6. Each station has a raw-material bin replenished by a shared pool of restock
//! devices, and breaks down from time to time. The whole line is built on top of the
//! [`simkern`] kernel; see [`Factory`] for the entry point and [`FactoryReport`] for the
//! aggregated views of a finished run.

#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::default_trait_access)]

use std::time::Duration;

mod config;
pub use config::{
    ArrivalConfig, Config, ConfigError, RestockConfig, StationConfig, MAX_HOURS, NUM_STATIONS,
};

mod station;
pub use station::{Station, StationId, StationStatus, StatusRecord};

mod pipeline;

mod factory;
pub use factory::Factory;

mod report;
pub use report::{
    write_history, FactoryReport, HistoryRow, Period, ReportCache, StationReport,
    StatusPartition, TrendPoint,
};

/// One simulated hour.
pub const HOUR: Duration = Duration::from_secs(3600);
/// One simulated day.
pub const DAY: Duration = Duration::from_secs(24 * 3600);
/// One simulated week.
pub const WEEK: Duration = Duration::from_secs(7 * 24 * 3600);
/// One simulated month, which is always 30 days long.
pub const MONTH: Duration = Duration::from_secs(30 * 24 * 3600);
/// One simulated quarter, which is always 90 days long.
pub const QUARTER: Duration = Duration::from_secs(90 * 24 * 3600);
/// One simulated year, which is always 365 days long.
pub const YEAR: Duration = Duration::from_secs(365 * 24 * 3600);

/// Longest duration of a single sample, ten times [`MAX_HOURS`].
pub(crate) const MAX_SAMPLE: Duration = Duration::from_secs(10_000_000 * 3600);

/// Converts a sampled number of seconds to a duration, clamped to `[0, MAX_SAMPLE]`.
/// `NaN` becomes zero.
pub(crate) fn clamped_secs(secs: f64) -> Duration {
    if secs > 0.0 {
        Duration::try_from_secs_f64(secs).map_or(MAX_SAMPLE, |d| d.min(MAX_SAMPLE))
    } else {
        Duration::default()
    }
}

/// Converts a duration to fractional hours.
#[must_use]
pub fn as_hours(duration: Duration) -> f64 {
    duration.as_secs_f64() / HOUR.as_secs_f64()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clamped_secs() {
        assert_eq!(clamped_secs(-3.0), Duration::default());
        assert_eq!(clamped_secs(0.0), Duration::default());
        assert_eq!(clamped_secs(1.5), Duration::from_millis(1500));
        assert_eq!(clamped_secs(f64::NAN), Duration::default());
        assert_eq!(clamped_secs(1e30), MAX_SAMPLE);
        assert_eq!(clamped_secs(f64::INFINITY), MAX_SAMPLE);
        assert_eq!(clamped_secs(4e10), MAX_SAMPLE);
    }

    #[test]
    fn test_as_hours() {
        assert!((as_hours(HOUR) - 1.0).abs() < f64::EPSILON);
        assert!((as_hours(DAY) - 24.0).abs() < f64::EPSILON);
        assert!((as_hours(Duration::from_secs(1800)) - 0.5).abs() < f64::EPSILON);
    }
}
