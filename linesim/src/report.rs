//! Aggregated views of a finished run.

use std::collections::HashMap;
use std::io;
use std::iter;
use std::time::Duration;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    as_hours, Config, ConfigError, Factory, StationId, StationStatus, StatusRecord, DAY, MONTH,
    QUARTER, WEEK, YEAR,
};

/// The time window a report covers. It always ends at the current simulation time.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Period {
    /// Last day.
    Day,
    /// Last week.
    Week,
    /// Last 30 days.
    Month,
    /// Last 90 days.
    Quarter,
    /// Last 365 days.
    Year,
    /// The entire run.
    All,
}

impl Default for Period {
    fn default() -> Self {
        Self::All
    }
}

impl Period {
    /// Length of the window, or `None` for the entire run.
    #[must_use]
    pub fn length(self) -> Option<Duration> {
        match self {
            Self::Day => Some(DAY),
            Self::Week => Some(WEEK),
            Self::Month => Some(MONTH),
            Self::Quarter => Some(QUARTER),
            Self::Year => Some(YEAR),
            Self::All => None,
        }
    }

    /// Window `(start, end)` ending at `now`. The start is never before the start of the run.
    #[must_use]
    pub fn window(self, now: Duration) -> (Duration, Duration) {
        let start = self
            .length()
            .and_then(|length| now.checked_sub(length))
            .unwrap_or_default();
        (start, now)
    }
}

/// Fraction of time spent in each status.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct StatusPartition {
    /// Fraction of time operational.
    #[serde(rename = "Operational")]
    pub operational: f64,
    /// Fraction of time down.
    #[serde(rename = "Down")]
    pub down: f64,
    /// Fraction of time waiting for restock.
    #[serde(rename = "Waiting for restock")]
    pub waiting_for_restock: f64,
}

impl StatusPartition {
    /// The fraction for the given status.
    #[must_use]
    pub fn get(&self, status: StationStatus) -> f64 {
        match status {
            StationStatus::Operational => self.operational,
            StationStatus::Down => self.down,
            StationStatus::WaitingForRestock => self.waiting_for_restock,
        }
    }

    fn get_mut(&mut self, status: StationStatus) -> &mut f64 {
        match status {
            StationStatus::Operational => &mut self.operational,
            StationStatus::Down => &mut self.down,
            StationStatus::WaitingForRestock => &mut self.waiting_for_restock,
        }
    }

    fn scaled(self, factor: f64) -> Self {
        Self {
            operational: self.operational * factor,
            down: self.down * factor,
            waiting_for_restock: self.waiting_for_restock * factor,
        }
    }
}

/// Seconds spent in each status within `[start, end]`.
///
/// Each record holds until the next one, and the last record holds until `end`. The record in
/// effect at `start` counts from `start`, even if it was recorded before it.
fn status_times(history: &[StatusRecord], start: Duration, end: Duration) -> StatusPartition {
    let mut times = StatusPartition::default();
    let until = history.iter().skip(1).map(|r| r.time).chain(iter::once(end));
    for (record, until) in history.iter().zip(until) {
        let from = record.time.max(start);
        let to = until.min(end);
        if to > from {
            *times.get_mut(record.status) += (to - from).as_secs_f64();
        }
    }
    times
}

/// A point of the production trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    /// When a station started processing an item or came back into operation, in hours.
    pub time_hours: f64,
    /// The station that recorded the event.
    pub station_id: StationId,
    /// Number of such events so far in the window.
    pub cumulative_production: usize,
}

/// Per-station part of the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationReport {
    /// Station ID.
    pub station_id: StationId,
    /// Fraction of the window the station was operational.
    pub occupancy: f64,
    /// Average time items waited for the station, in hours, over the entire run.
    /// Items do not wait for the first station, so it is always `None` there.
    pub average_wait_hours: Option<f64>,
    /// Number of breakdowns over the entire run.
    pub num_breakdowns: usize,
    /// Fraction of the window spent in each status.
    pub partition: StatusPartition,
}

/// Aggregated view of a factory run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactoryReport {
    /// The period this report covers.
    pub period: Period,
    /// Start of the window in hours.
    pub window_start_hours: f64,
    /// End of the window in hours.
    pub window_end_hours: f64,
    /// Items produced over the entire run.
    pub total_production: usize,
    /// Faulty items over the entire run.
    pub faulty_products: usize,
    /// Produced items per hour of the window.
    pub production_rate: f64,
    /// Cumulative count of operational records in the window.
    pub production_trend: Vec<TrendPoint>,
    /// Station details in the order of the line.
    pub stations: Vec<StationReport>,
}

impl FactoryReport {
    /// Computes the report for the window of `period` ending at the current time.
    ///
    /// For [`Period::All`], occupancy and status partition come from the station counters:
    /// busy time, downtime, and restocking time. Otherwise, they are computed from the status
    /// history within the window.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(factory: &Factory, period: Period) -> Self {
        let (start, end) = period.window(factory.time());
        let window = (end - start).as_secs_f64();
        let ratio = |secs: f64| if window > 0.0 { secs / window } else { 0.0 };
        let stations = factory
            .stations()
            .iter()
            .map(|station| {
                let partition = match period {
                    Period::All => StatusPartition {
                        operational: ratio(station.busy_time().as_secs_f64()),
                        down: ratio(station.total_downtime().as_secs_f64()),
                        waiting_for_restock: ratio(station.restocking_time().as_secs_f64()),
                    },
                    _ => {
                        let times = status_times(station.status_history(), start, end);
                        times.scaled(ratio(1.0))
                    }
                };
                let average_wait_hours = if usize::from(station.id()) == 1 {
                    None
                } else if station.num_waits() == 0 {
                    Some(0.0)
                } else {
                    Some(as_hours(station.total_waiting_time()) / station.num_waits() as f64)
                };
                StationReport {
                    station_id: station.id(),
                    occupancy: partition.operational,
                    average_wait_hours,
                    num_breakdowns: station.num_breakdowns(),
                    partition,
                }
            })
            .collect();
        let production_trend = factory
            .stations()
            .iter()
            .flat_map(|station| {
                station
                    .status_history()
                    .iter()
                    .filter(|r| r.status == StationStatus::Operational)
                    .filter(|r| r.time >= start && r.time <= end)
                    .map(move |r| (r.time, station.id()))
            })
            .sorted_by_key(|&(time, id)| (time, id))
            .enumerate()
            .map(|(idx, (time, station_id))| TrendPoint {
                time_hours: as_hours(time),
                station_id,
                cumulative_production: idx + 1,
            })
            .collect();
        let hours = as_hours(end - start);
        Self {
            period,
            window_start_hours: as_hours(start),
            window_end_hours: as_hours(end),
            total_production: factory.total_produced(),
            faulty_products: factory.faulty_products(),
            production_rate: if hours > 0.0 {
                factory.total_produced() as f64 / hours
            } else {
                0.0
            },
            production_trend,
            stations,
        }
    }
}

/// Runs the factory once on first use and keeps the finished run along with the reports
/// computed from it, until invalidated.
///
/// # Example
///
/// ```
/// # use linesim::{Config, Period, ReportCache};
/// # fn main() -> Result<(), linesim::ConfigError> {
/// let config = Config {
///     duration_days: 3.0,
///     ..Config::default()
/// };
/// let mut cache = ReportCache::new(config);
/// assert!(!cache.is_cached(Period::Day));
/// let total = cache.get(Period::Day)?.total_production;
/// assert!(cache.is_cached(Period::Day));
/// assert_eq!(cache.get(Period::All)?.total_production, total);
/// cache.invalidate();
/// assert!(!cache.is_cached(Period::Day));
/// # Ok(())
/// # }
/// ```
pub struct ReportCache {
    config: Config,
    factory: Option<Factory>,
    reports: HashMap<Period, FactoryReport>,
}

impl ReportCache {
    /// Creates an empty cache. Nothing runs until a report is requested.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            factory: None,
            reports: HashMap::new(),
        }
    }

    /// The finished factory run, running it first if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid.
    pub fn factory(&mut self) -> Result<&Factory, ConfigError> {
        let factory = match self.factory.take() {
            Some(factory) => factory,
            None => {
                let mut factory = Factory::new(self.config.clone())?;
                factory.run(self.config.duration());
                factory
            }
        };
        Ok(self.factory.get_or_insert(factory))
    }

    /// The report for `period`, computed on first request.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid.
    pub fn get(&mut self, period: Period) -> Result<&FactoryReport, ConfigError> {
        if !self.reports.contains_key(&period) {
            let report = FactoryReport::new(self.factory()?, period);
            self.reports.insert(period, report);
        }
        Ok(&self.reports[&period])
    }

    /// Whether the report for `period` is cached.
    #[must_use]
    pub fn is_cached(&self, period: Period) -> bool {
        self.reports.contains_key(&period)
    }

    /// Drops the finished run and all reports.
    pub fn invalidate(&mut self) {
        log::debug!("Invalidating report cache");
        self.factory = None;
        self.reports.clear();
    }

    /// Runs the factory again and recomputes the report for `period`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid.
    pub fn refresh(&mut self, period: Period) -> Result<&FactoryReport, ConfigError> {
        self.invalidate();
        self.get(period)
    }
}

/// A status record of one station, as exported to CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    /// Time of the record in seconds.
    pub time_secs: f64,
    /// Station that recorded the status.
    pub station_id: StationId,
    /// Recorded status.
    pub status: StationStatus,
}

/// Writes the status history of all stations as CSV, ordered by time and then by station.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_history<W: io::Write>(factory: &Factory, writer: W) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);
    let records = factory
        .stations()
        .iter()
        .flat_map(|station| {
            station
                .status_history()
                .iter()
                .map(move |record| (station.id(), record))
        })
        .sorted_by_key(|(id, record)| (record.time, *id));
    for (station_id, record) in records {
        writer.serialize(HistoryRow {
            time_secs: record.time.as_secs_f64(),
            station_id,
            status: record.status,
        })?;
    }
    writer.flush()?;
    Ok(())
}
