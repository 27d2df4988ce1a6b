use std::time::Duration;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Bernoulli, Distribution, Normal};
use simkern::{ClockRef, Context, Key, RequestId, Resource, ResourceId, Simulation};

use crate::pipeline::Arrivals;
use crate::station::RestockMonitor;
use crate::{clamped_secs, Config, ConfigError, Station, StationId, HOUR};

/// Fixed parameters of the line, copied out of the config.
pub(crate) struct LineParams {
    pub(crate) restock_check_interval: Duration,
    pub(crate) restock_threshold: u64,
    pub(crate) restock_quantity: u64,
    pub(crate) repair_poll: Duration,
    pub(crate) inspection_interval: usize,
    pub(crate) arrival_limit: Option<usize>,
}

/// Everything the processes share: stations, counters, and the random generator.
pub(crate) struct Line {
    pub(crate) stations: Vec<Station>,
    pub(crate) restock_devices: ResourceId,
    pub(crate) params: LineParams,
    pub(crate) total_produced: usize,
    pub(crate) faulty_products: usize,
    pub(crate) items_started: usize,
    pub(crate) items_completed: usize,
    pub(crate) total_wait_time: Duration,
    pub(crate) num_waits: usize,
    rng: ChaCha8Rng,
    arrival: Normal<f64>,
    restock: Normal<f64>,
    faulty: Bernoulli,
}

impl Line {
    /// Interval until the next arrival, in absolute value.
    pub(crate) fn sample_arrival(&mut self) -> Duration {
        clamped_secs(self.arrival.sample(&mut self.rng).abs() * HOUR.as_secs_f64())
    }

    pub(crate) fn sample_restock(&mut self) -> Duration {
        clamped_secs(self.restock.sample(&mut self.rng) * HOUR.as_secs_f64())
    }

    pub(crate) fn sample_faulty(&mut self) -> bool {
        self.faulty.sample(&mut self.rng)
    }

    pub(crate) fn sample_processing(&mut self, station: usize) -> Duration {
        self.stations[station].sample_processing(&mut self.rng)
    }

    pub(crate) fn sample_repair(&mut self, station: usize) -> Duration {
        self.stations[station].sample_repair(&mut self.rng)
    }

    pub(crate) fn inspect(&mut self, station: usize) -> bool {
        let interval = self.params.inspection_interval;
        self.stations[station].inspect(&mut self.rng, interval)
    }

    pub(crate) fn record_wait(&mut self, station: usize, wait: Duration) {
        self.stations[station].add_wait(wait);
        self.total_wait_time += wait;
        self.num_waits += 1;
    }
}

pub(crate) fn line<'a>(ctx: &'a Context<'_>, key: Key<Line>) -> &'a Line {
    ctx.state().get(key).expect("Line not found in state")
}

pub(crate) fn line_mut<'a>(ctx: &'a mut Context<'_>, key: Key<Line>) -> &'a mut Line {
    ctx.state_mut().get_mut(key).expect("Line not found in state")
}

/// The manufacturing line together with the simulation that drives it.
///
/// # Example
///
/// ```
/// # use linesim::{Config, Factory, DAY};
/// # fn main() -> Result<(), linesim::ConfigError> {
/// let mut factory = Factory::new(Config::default())?;
/// factory.run(DAY * 7);
/// assert_eq!(factory.time(), DAY * 7);
/// assert!(factory.items_started() > 0);
/// assert!(factory.total_produced() + factory.faulty_products() <= factory.items_started());
/// # Ok(())
/// # }
/// ```
pub struct Factory {
    simulation: Simulation,
    line: Key<Line>,
    config: Config,
}

impl Factory {
    /// Validates the config and sets up the line: one restock monitor for each station, and
    /// the arrival process. Nothing happens until the factory runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid. See [`Config::validate`].
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut simulation = Simulation::default();
        let restock_devices = simulation.add_resource(config.restock.devices);
        let stations = config
            .stations
            .iter()
            .enumerate()
            .map(|(idx, station)| {
                let resource = simulation.add_resource(1);
                let bin = simulation.add_container(config.restock.initial_level);
                Station::new(StationId::from(idx + 1), station, resource, bin)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let line = Line {
            stations,
            restock_devices,
            params: LineParams {
                restock_check_interval: config.restock_check_interval(),
                restock_threshold: config.restock.threshold,
                restock_quantity: config.restock.quantity,
                repair_poll: config.repair_poll_interval(),
                inspection_interval: config.inspection_interval,
                arrival_limit: config.arrival.limit,
            },
            total_produced: 0,
            faulty_products: 0,
            items_started: 0,
            items_completed: 0,
            total_wait_time: Duration::default(),
            num_waits: 0,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            arrival: Normal::new(config.arrival.mean_hours, config.arrival.std_hours)?,
            restock: Normal::new(config.restock.mean_hours, config.restock.std_hours)?,
            faulty: Bernoulli::new(config.faulty_prob)?,
        };
        let num_stations = line.stations.len();
        let line = simulation.state.insert(line);
        for station in 0..num_stations {
            simulation.spawn(RestockMonitor::new(line, station));
        }
        simulation.spawn(Arrivals::new(line));
        log::info!(
            "Factory set up with {} stations and seed {}",
            num_stations,
            config.seed
        );
        Ok(Self {
            simulation,
            line,
            config,
        })
    }

    fn line(&self) -> &Line {
        self.simulation
            .state
            .get(self.line)
            .expect("Line not found in state")
    }

    /// Runs the simulation for `duration` from the current time. Pipelines still in progress
    /// at the end are left where they are.
    ///
    /// Returns the simulation time at the end of the run.
    pub fn run(&mut self, duration: Duration) -> Duration {
        let limit = self.time() + duration;
        self.run_until(limit)
    }

    /// Runs the simulation until the given absolute time.
    pub fn run_until(&mut self, limit: Duration) -> Duration {
        log::info!("Running factory until {:?}", limit);
        let time = self.simulation.run_until(limit);
        log::info!(
            "Factory stopped at {:?}: {} produced, {} faulty",
            time,
            self.total_produced(),
            self.faulty_products()
        );
        time
    }

    /// Processes the next event. Returns `false` if there were no events left.
    pub fn step(&mut self) -> bool {
        self.simulation.step()
    }

    /// Current simulation time.
    #[must_use]
    pub fn time(&self) -> Duration {
        self.simulation.time()
    }

    /// Reference to the simulation clock.
    #[must_use]
    pub fn clock(&self) -> ClockRef {
        self.simulation.clock()
    }

    /// Time of the next event, if any.
    #[must_use]
    pub fn peek_time(&self) -> Option<Duration> {
        self.simulation.peek_time()
    }

    /// Number of events processed so far.
    #[must_use]
    pub fn events_processed(&self) -> u64 {
        self.simulation.events_processed()
    }

    /// The config the factory was built with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// All stations in the order of the line.
    #[must_use]
    pub fn stations(&self) -> &[Station] {
        &self.line().stations
    }

    /// Station with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if there is no such station.
    #[must_use]
    pub fn station(&self, id: StationId) -> &Station {
        let idx = usize::from(id)
            .checked_sub(1)
            .expect("station IDs start at 1");
        &self.line().stations[idx]
    }

    /// Current level of the bin of a station.
    #[must_use]
    pub fn bin_level(&self, id: StationId) -> u64 {
        self.simulation.container(self.station(id).bin()).level()
    }

    /// The pool of restock devices.
    #[must_use]
    pub fn restock_devices(&self) -> &Resource<RequestId> {
        self.simulation.resource(self.line().restock_devices)
    }

    /// Number of items that passed all stations and were not faulty.
    #[must_use]
    pub fn total_produced(&self) -> usize {
        self.line().total_produced
    }

    /// Number of items that passed all stations but were faulty.
    #[must_use]
    pub fn faulty_products(&self) -> usize {
        self.line().faulty_products
    }

    /// Number of items that entered the line.
    #[must_use]
    pub fn items_started(&self) -> usize {
        self.line().items_started
    }

    /// Number of items that passed all stations.
    #[must_use]
    pub fn items_completed(&self) -> usize {
        self.line().items_completed
    }

    /// Total time items waited for stations 2 to 6.
    #[must_use]
    pub fn total_wait_time(&self) -> Duration {
        self.line().total_wait_time
    }

    /// Number of waits accounted in [`Factory::total_wait_time`].
    #[must_use]
    pub fn num_waits(&self) -> usize {
        self.line().num_waits
    }
}
