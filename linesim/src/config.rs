//! Everything related to setting up the factory from configuration files.

use std::io::{Cursor, Read};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{DAY, HOUR};

/// Number of stations in the line.
pub const NUM_STATIONS: usize = 6;

/// Failure probabilities of the reference stations.
const FAIL_PROBS: [f64; NUM_STATIONS] = [0.02, 0.01, 0.05, 0.15, 0.07, 0.06];

/// Longest time, in hours, that any duration in the config may describe (about 114 years).
pub const MAX_HOURS: f64 = 1_000_000.0;

const MINUTE_IN_HOURS: f64 = 1.0 / 60.0;
const SECOND_IN_HOURS: f64 = 1.0 / 3600.0;

/// Errors raised when the configuration cannot be used to build a factory.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// The line must have exactly [`NUM_STATIONS`] stations.
    #[error("expected 6 stations but found {0}")]
    StationCount(usize),
    /// Value is not a probability.
    #[error("{name} must be within [0, 1] but is {value}")]
    Probability {
        /// Name of the offending field.
        name: String,
        /// Offending value.
        value: f64,
    },
    /// Value must be positive and finite.
    #[error("{name} must be positive and finite but is {value}")]
    NotPositive {
        /// Name of the offending field.
        name: String,
        /// Offending value.
        value: f64,
    },
    /// Value must be non-negative and finite.
    #[error("{name} must be non-negative and finite but is {value}")]
    Negative {
        /// Name of the offending field.
        name: String,
        /// Offending value.
        value: f64,
    },
    /// Time value is longer than [`MAX_HOURS`].
    #[error("{name} is {value}, which exceeds the limit of 1000000 hours")]
    TooLong {
        /// Name of the offending field.
        name: String,
        /// Offending value, in the units of the field.
        value: f64,
    },
    /// Count or capacity is zero.
    #[error("{0} must be positive")]
    Zero(&'static str),
    /// Normal distribution could not be constructed.
    #[error("invalid normal distribution: {0}")]
    Normal(#[from] rand_distr::NormalError),
    /// Exponential distribution could not be constructed.
    #[error("invalid exponential distribution: {0}")]
    Exp(#[from] rand_distr::ExpError),
    /// Bernoulli distribution could not be constructed.
    #[error("invalid Bernoulli distribution: {0}")]
    Bernoulli(#[from] rand_distr::BernoulliError),
}

/// Describes the normal distribution of intervals between arriving items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrivalConfig {
    /// Mean interval in hours.
    pub mean_hours: f64,
    /// Standard deviation in hours.
    pub std_hours: f64,
    /// If set, no more items arrive after this many.
    pub limit: Option<usize>,
}

impl Default for ArrivalConfig {
    fn default() -> Self {
        Self {
            mean_hours: 3.0,
            std_hours: 0.5,
            limit: None,
        }
    }
}

/// Restocking of the station bins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestockConfig {
    /// Number of restock devices shared by all stations.
    pub devices: usize,
    /// Mean restock time in hours.
    pub mean_hours: f64,
    /// Standard deviation of the restock time in hours.
    pub std_hours: f64,
    /// How often a station checks its bin level.
    pub check_interval_hours: f64,
    /// A bin is restocked once its level falls below this value.
    pub threshold: u64,
    /// Units added to the bin by a single restock.
    pub quantity: u64,
    /// Units in each bin at the start of the simulation.
    pub initial_level: u64,
}

impl Default for RestockConfig {
    fn default() -> Self {
        Self {
            devices: 3,
            mean_hours: 2.0,
            std_hours: 1.0,
            check_interval_hours: 1.0,
            threshold: 5,
            quantity: 25,
            initial_level: 25,
        }
    }
}

/// Parameters of a single station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Probability of a breakdown at each inspection.
    pub fail_prob: f64,
    /// Mean processing time of one item in hours.
    pub processing_mean_hours: f64,
    /// Standard deviation of the processing time in seconds.
    pub processing_std_secs: f64,
    /// Mean repair time in hours.
    pub repair_mean_hours: f64,
}

impl StationConfig {
    /// Reference station with the given failure probability.
    #[must_use]
    pub fn with_fail_prob(fail_prob: f64) -> Self {
        Self {
            fail_prob,
            ..Self::default()
        }
    }

    /// Mean processing time.
    #[must_use]
    pub fn processing_mean(&self) -> Duration {
        HOUR.mul_f64(self.processing_mean_hours)
    }

    /// Mean repair time.
    #[must_use]
    pub fn repair_mean(&self) -> Duration {
        HOUR.mul_f64(self.repair_mean_hours)
    }
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            fail_prob: 0.0,
            processing_mean_hours: 4.0,
            processing_std_secs: 1.0,
            repair_mean_hours: 3.0,
        }
    }
}

/// Factory configuration, typically loaded from a YAML file.
///
/// Every field has a default, and the defaults describe the reference factory: six stations
/// with failure probabilities `[0.02, 0.01, 0.05, 0.15, 0.07, 0.06]`, three restock devices,
/// and one item arriving roughly every three hours for a year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Random seed.
    pub seed: u64,
    /// Simulated duration in days.
    pub duration_days: f64,
    /// Item arrivals.
    pub arrival: ArrivalConfig,
    /// Bin restocking.
    pub restock: RestockConfig,
    /// Each station is inspected for a breakdown after this many processed items.
    pub inspection_interval: usize,
    /// How often an item waiting for a broken station checks whether it was repaired.
    pub repair_poll_minutes: f64,
    /// Probability that a finished item is faulty.
    pub faulty_prob: f64,
    /// Station parameters, in the order of the line.
    pub stations: Vec<StationConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: 0,
            duration_days: 365.0,
            arrival: ArrivalConfig::default(),
            restock: RestockConfig::default(),
            inspection_interval: 5,
            repair_poll_minutes: 6.0,
            faulty_prob: 0.05,
            stations: FAIL_PROBS
                .iter()
                .map(|&p| StationConfig::with_fail_prob(p))
                .collect(),
        }
    }
}

fn probability(name: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Probability {
            name: name.to_string(),
            value,
        })
    }
}

fn positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive {
            name: name.to_string(),
            value,
        })
    }
}

fn non_negative(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative {
            name: name.to_string(),
            value,
        })
    }
}

fn at_most_max_hours(name: &str, value: f64, unit_hours: f64) -> Result<(), ConfigError> {
    if value * unit_hours <= MAX_HOURS {
        Ok(())
    } else {
        Err(ConfigError::TooLong {
            name: name.to_string(),
            value,
        })
    }
}

/// Checks a mean or an interval expressed in units of `unit_hours`.
fn time_value(name: &str, value: f64, unit_hours: f64) -> Result<(), ConfigError> {
    positive(name, value)?;
    at_most_max_hours(name, value, unit_hours)
}

/// Checks a standard deviation expressed in units of `unit_hours`.
fn time_deviation(name: &str, value: f64, unit_hours: f64) -> Result<(), ConfigError> {
    non_negative(name, value)?;
    at_most_max_hours(name, value, unit_hours)
}

impl Config {
    /// Loads config from YAML. Missing fields take their default values.
    ///
    /// # Example
    ///
    /// ```
    /// # use linesim::Config;
    /// # fn main() -> Result<(), linesim::ConfigError> {
    /// let input = r#"
    /// seed: 17
    /// duration_days: 30
    /// arrival:
    ///     mean_hours: 2.5
    /// restock:
    ///     devices: 2"#;
    /// let config = Config::from_yaml(std::io::Cursor::new(input))?;
    /// assert_eq!(config.seed, 17);
    /// assert_eq!(config.arrival.mean_hours, 2.5);
    /// assert_eq!(config.arrival.std_hours, 0.5);
    /// assert_eq!(config.restock.devices, 2);
    /// assert_eq!(config.stations.len(), 6);
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be parsed or fails [`Config::validate`].
    pub fn from_yaml<R: Read>(reader: R) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the configuration describes a valid factory.
    ///
    /// # Errors
    ///
    /// Returns an error if any of these are true:
    /// - there are not exactly [`NUM_STATIONS`] stations,
    /// - any count or capacity is zero,
    /// - any probability is outside of `[0, 1]`,
    /// - any mean or interval is not positive and finite,
    /// - any standard deviation is negative or infinite, or
    /// - any time value is longer than [`MAX_HOURS`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stations.len() != NUM_STATIONS {
            return Err(ConfigError::StationCount(self.stations.len()));
        }
        if self.restock.devices == 0 {
            return Err(ConfigError::Zero("restock.devices"));
        }
        if self.restock.quantity == 0 {
            return Err(ConfigError::Zero("restock.quantity"));
        }
        if self.inspection_interval == 0 {
            return Err(ConfigError::Zero("inspection_interval"));
        }
        time_value("duration_days", self.duration_days, 24.0)?;
        time_value(
            "repair_poll_minutes",
            self.repair_poll_minutes,
            MINUTE_IN_HOURS,
        )?;
        probability("faulty_prob", self.faulty_prob)?;
        time_value("arrival.mean_hours", self.arrival.mean_hours, 1.0)?;
        time_deviation("arrival.std_hours", self.arrival.std_hours, 1.0)?;
        time_value("restock.mean_hours", self.restock.mean_hours, 1.0)?;
        time_deviation("restock.std_hours", self.restock.std_hours, 1.0)?;
        time_value(
            "restock.check_interval_hours",
            self.restock.check_interval_hours,
            1.0,
        )?;
        for (idx, station) in self.stations.iter().enumerate() {
            let field = |name: &str| format!("stations[{}].{}", idx, name);
            probability(&field("fail_prob"), station.fail_prob)?;
            time_value(
                &field("processing_mean_hours"),
                station.processing_mean_hours,
                1.0,
            )?;
            time_deviation(
                &field("processing_std_secs"),
                station.processing_std_secs,
                SECOND_IN_HOURS,
            )?;
            time_value(&field("repair_mean_hours"), station.repair_mean_hours, 1.0)?;
        }
        Ok(())
    }

    /// Simulated duration of the run.
    #[must_use]
    pub fn duration(&self) -> Duration {
        DAY.mul_f64(self.duration_days)
    }

    /// How often a station checks its bin.
    #[must_use]
    pub fn restock_check_interval(&self) -> Duration {
        HOUR.mul_f64(self.restock.check_interval_hours)
    }

    /// How often an item checks whether a broken station was repaired.
    #[must_use]
    pub fn repair_poll_interval(&self) -> Duration {
        Duration::from_secs(60).mul_f64(self.repair_poll_minutes)
    }
}

impl FromStr for Config {
    type Err = ConfigError;
    fn from_str(config: &str) -> Result<Self, Self::Err> {
        Config::from_yaml(Cursor::new(config))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_is_reference_factory() -> Result<(), ConfigError> {
        let config = Config::default();
        config.validate()?;
        let fail_probs: Vec<_> = config.stations.iter().map(|s| s.fail_prob).collect();
        assert_eq!(fail_probs, FAIL_PROBS.to_vec());
        assert_eq!(config.duration(), crate::YEAR);
        assert_eq!(config.restock_check_interval(), HOUR);
        assert_eq!(config.repair_poll_interval(), Duration::from_secs(360));
        assert_eq!(config.stations[0].processing_mean(), HOUR * 4);
        assert_eq!(config.stations[0].repair_mean(), HOUR * 3);
        Ok(())
    }

    #[test]
    fn test_config() -> Result<(), ConfigError> {
        let input = r#"
seed: 3
duration_days: 7
inspection_interval: 2
faulty_prob: 0.1
arrival:
    mean_hours: 1
    std_hours: 0.25
    limit: 10
restock:
    threshold: 3
    initial_level: 4
stations:
    - fail_prob: 0.1
    - fail_prob: 0.2
    - fail_prob: 0.3
      repair_mean_hours: 1
    - fail_prob: 0.4
    - fail_prob: 0.5
    - fail_prob: 1.0
      processing_mean_hours: 2"#;
        let config: Config = input.parse()?;
        assert_eq!(config.seed, 3);
        assert_eq!(config.duration(), DAY * 7);
        assert_eq!(config.inspection_interval, 2);
        assert_eq!(config.arrival.limit, Some(10));
        assert_eq!(config.restock.threshold, 3);
        assert_eq!(config.restock.initial_level, 4);
        assert_eq!(config.restock.quantity, 25);
        assert_eq!(config.stations[2].repair_mean(), HOUR);
        assert_eq!(config.stations[5].processing_mean(), HOUR * 2);
        assert_eq!(config.stations[5].fail_prob, 1.0);
        Ok(())
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            "arrival: [1, 2".parse::<Config>(),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_wrong_station_count() {
        let mut config = Config::default();
        config.stations.pop();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::StationCount(5))
        ));
    }

    #[rstest(
        station,
        value,
        case(0, 1.5),
        case(3, -0.1),
        case(5, f64::NAN)
    )]
    fn test_invalid_fail_prob(station: usize, value: f64) {
        let mut config = Config::default();
        config.stations[station].fail_prob = value;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Probability { .. })
        ));
    }

    #[test]
    fn test_not_positive() {
        let invalid: Vec<fn(&mut Config)> = vec![
            |c| c.arrival.mean_hours = 0.0,
            |c| c.restock.mean_hours = -2.0,
            |c| c.stations[1].repair_mean_hours = f64::INFINITY,
            |c| c.duration_days = 0.0,
        ];
        for modify in invalid {
            let mut config = Config::default();
            modify(&mut config);
            assert!(matches!(
                config.validate(),
                Err(ConfigError::NotPositive { .. })
            ));
        }
    }

    #[test]
    fn test_negative_std() {
        let mut config = Config::default();
        config.stations[0].processing_std_secs = -1.0;
        match config.validate() {
            Err(ConfigError::Negative { name, .. }) => {
                assert_eq!(name, "stations[0].processing_std_secs");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_zero_devices() {
        let mut config = Config::default();
        config.restock.devices = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Zero("restock.devices"))
        ));
    }

    #[rstest(
        field,
        case("arrival.mean_hours"),
        case("stations[0].processing_mean_hours"),
        case("stations[4].processing_std_secs"),
        case("duration_days")
    )]
    fn test_too_long(field: &str) {
        let mut config = Config::default();
        match field {
            "arrival.mean_hours" => config.arrival.mean_hours = 1e16,
            "stations[0].processing_mean_hours" => {
                config.stations[0].processing_mean_hours = 1e16;
            }
            "stations[4].processing_std_secs" => {
                config.stations[4].processing_std_secs = 1e16;
            }
            _ => config.duration_days = MAX_HOURS,
        }
        match config.validate() {
            Err(ConfigError::TooLong { name, .. }) => assert_eq!(name, field),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_longest_valid_times() -> Result<(), ConfigError> {
        let mut config = Config::default();
        config.duration_days = 36_500.0;
        config.arrival.mean_hours = MAX_HOURS;
        config.arrival.std_hours = MAX_HOURS;
        config.restock.check_interval_hours = MAX_HOURS;
        config.validate()?;
        assert_eq!(config.duration(), DAY * 36_500);
        assert_eq!(config.restock_check_interval(), HOUR * 1_000_000);
        Ok(())
    }
}
