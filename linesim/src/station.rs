use std::time::Duration;

use derive_more::{Display, From, Into};
use rand::Rng;
use rand_distr::{Bernoulli, Distribution, Exp, Normal};
use serde::{Deserialize, Serialize};
use simkern::{ContainerId, Context, Key, Process, Request, ResourceId, Suspend};

use crate::factory::{line, line_mut, Line};
use crate::{clamped_secs, ConfigError, StationConfig};

/// Station ID. Stations are numbered from 1 in the order of the line.
#[derive(
    From,
    Into,
    Debug,
    PartialEq,
    PartialOrd,
    Eq,
    Ord,
    Serialize,
    Deserialize,
    Copy,
    Clone,
    Hash,
    Display,
)]
pub struct StationId(usize);

/// Current status of a station.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum StationStatus {
    /// Ready to process, or processing, items.
    Operational,
    /// Broken down and being repaired.
    Down,
    /// The bin is running low and waits for a restock device.
    #[strum(serialize = "Waiting for restock")]
    #[serde(rename = "Waiting for restock")]
    WaitingForRestock,
}

/// An entry in the status history of a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusRecord {
    /// When the status was set.
    pub time: Duration,
    /// The status that was set.
    pub status: StationStatus,
}

/// A single station of the line, along with everything recorded about it during the run.
pub struct Station {
    id: StationId,
    resource: ResourceId,
    bin: ContainerId,
    fail_prob: f64,
    processing: Normal<f64>,
    repair: Exp<f64>,
    failure: Bernoulli,
    status: StationStatus,
    history: Vec<StatusRecord>,
    broken: bool,
    count_since_check: usize,
    busy_time: Duration,
    total_downtime: Duration,
    restocking_time: Duration,
    total_waiting_time: Duration,
    num_waits: usize,
    num_breakdowns: usize,
    items_processed: usize,
}

impl Station {
    /// Creates an operational station. The initial status is recorded at time zero.
    pub(crate) fn new(
        id: StationId,
        config: &StationConfig,
        resource: ResourceId,
        bin: ContainerId,
    ) -> Result<Self, ConfigError> {
        let mut station = Self {
            id,
            resource,
            bin,
            fail_prob: config.fail_prob,
            processing: Normal::new(
                config.processing_mean().as_secs_f64(),
                config.processing_std_secs,
            )?,
            repair: Exp::new(1.0 / config.repair_mean().as_secs_f64())?,
            failure: Bernoulli::new(config.fail_prob)?,
            status: StationStatus::Operational,
            history: Vec::new(),
            broken: false,
            count_since_check: 0,
            busy_time: Duration::default(),
            total_downtime: Duration::default(),
            restocking_time: Duration::default(),
            total_waiting_time: Duration::default(),
            num_waits: 0,
            num_breakdowns: 0,
            items_processed: 0,
        };
        station.record(Duration::default(), StationStatus::Operational);
        Ok(station)
    }

    /// Appends a new status record, even if the status does not change.
    pub(crate) fn record(&mut self, time: Duration, status: StationStatus) {
        log::debug!("[{:?}] Station {}: {}", time, self.id, status);
        self.status = status;
        self.history.push(StatusRecord { time, status });
    }

    pub(crate) fn sample_processing<R: Rng>(&self, rng: &mut R) -> Duration {
        clamped_secs(self.processing.sample(rng))
    }

    pub(crate) fn sample_repair<R: Rng>(&self, rng: &mut R) -> Duration {
        clamped_secs(self.repair.sample(rng))
    }

    /// Counts a processed item, and every `interval` items checks whether the station breaks.
    pub(crate) fn inspect<R: Rng>(&mut self, rng: &mut R, interval: usize) -> bool {
        self.items_processed += 1;
        self.count_since_check += 1;
        if self.count_since_check >= interval {
            self.count_since_check = 0;
            self.failure.sample(rng)
        } else {
            false
        }
    }

    pub(crate) fn add_wait(&mut self, wait: Duration) {
        self.total_waiting_time += wait;
        self.num_waits += 1;
    }

    /// Station ID.
    #[must_use]
    pub fn id(&self) -> StationId {
        self.id
    }

    /// The resource that admits one item at a time.
    #[must_use]
    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    /// The raw-material bin.
    #[must_use]
    pub fn bin(&self) -> ContainerId {
        self.bin
    }

    /// Probability of a breakdown at each inspection.
    #[must_use]
    pub fn fail_prob(&self) -> f64 {
        self.fail_prob
    }

    /// The most recently recorded status.
    #[must_use]
    pub fn status(&self) -> StationStatus {
        self.status
    }

    /// All status records, in the order they were recorded.
    #[must_use]
    pub fn status_history(&self) -> &[StatusRecord] {
        &self.history
    }

    /// Whether the station is currently being repaired.
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Total time spent processing items.
    #[must_use]
    pub fn busy_time(&self) -> Duration {
        self.busy_time
    }

    /// Total time spent on repairs.
    #[must_use]
    pub fn total_downtime(&self) -> Duration {
        self.total_downtime
    }

    /// Total time a restock device spent restocking the bin.
    #[must_use]
    pub fn restocking_time(&self) -> Duration {
        self.restocking_time
    }

    /// Total time items waited for this station.
    #[must_use]
    pub fn total_waiting_time(&self) -> Duration {
        self.total_waiting_time
    }

    /// Number of waits accounted in [`Station::total_waiting_time`].
    #[must_use]
    pub fn num_waits(&self) -> usize {
        self.num_waits
    }

    /// Number of breakdowns so far.
    #[must_use]
    pub fn num_breakdowns(&self) -> usize {
        self.num_breakdowns
    }

    /// Number of items fully processed.
    #[must_use]
    pub fn items_processed(&self) -> usize {
        self.items_processed
    }
}

#[derive(Debug, Clone, Copy)]
enum RestockStage {
    Check,
    Acquiring(Request),
    Restocking { device: Request, started: Duration },
}

/// Background process that keeps the bin of one station stocked.
///
/// Every check interval, it compares the bin level with the threshold. Once the level falls
/// below, it waits for one of the shared restock devices, restocks the bin, and checks again
/// right away.
pub(crate) struct RestockMonitor {
    line: Key<Line>,
    station: usize,
    stage: RestockStage,
}

impl RestockMonitor {
    pub(crate) fn new(line: Key<Line>, station: usize) -> Self {
        Self {
            line,
            station,
            stage: RestockStage::Check,
        }
    }
}

impl Process for RestockMonitor {
    fn resume(&mut self, ctx: &mut Context<'_>) -> Suspend {
        loop {
            match self.stage {
                RestockStage::Check => {
                    let state = line(ctx, self.line);
                    let bin = state.stations[self.station].bin();
                    let threshold = state.params.restock_threshold;
                    let interval = state.params.restock_check_interval;
                    let devices = state.restock_devices;
                    if ctx.level(bin) >= threshold {
                        return Suspend::Wait(ctx.timeout(interval));
                    }
                    let time = ctx.time();
                    line_mut(ctx, self.line).stations[self.station]
                        .record(time, StationStatus::WaitingForRestock);
                    let device = ctx.request(devices);
                    self.stage = RestockStage::Acquiring(device);
                    return Suspend::Wait(device.signal());
                }
                RestockStage::Acquiring(device) => {
                    let delay = line_mut(ctx, self.line).sample_restock();
                    self.stage = RestockStage::Restocking {
                        device,
                        started: ctx.time(),
                    };
                    return Suspend::Wait(ctx.timeout(delay));
                }
                RestockStage::Restocking { device, started } => {
                    let time = ctx.time();
                    let state = line_mut(ctx, self.line);
                    let quantity = state.params.restock_quantity;
                    let station = &mut state.stations[self.station];
                    station.restocking_time += time - started;
                    let bin = station.bin();
                    ctx.put(bin, quantity);
                    ctx.release(device);
                    line_mut(ctx, self.line).stations[self.station]
                        .record(time, StationStatus::Operational);
                    self.stage = RestockStage::Check;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum VisitStage {
    Start,
    Queued(Request),
    CheckRepaired(Request),
    Fetching(Request),
    Working { request: Request, started: Duration },
    Repairing { request: Request, since: Duration },
}

/// A single item passing through one station: wait for the station, take a unit from the
/// bin, process the item, and possibly break down and get repaired before leaving.
///
/// The station is held for the whole visit, including the repair.
pub(crate) struct StationVisit {
    line: Key<Line>,
    station: usize,
    requested_at: Duration,
    stage: VisitStage,
}

impl StationVisit {
    /// A visit that requests the station once it starts.
    pub(crate) fn new(line: Key<Line>, station: usize) -> Self {
        Self {
            line,
            station,
            requested_at: Duration::default(),
            stage: VisitStage::Start,
        }
    }

    /// A visit using a request made earlier, at `requested_at`.
    pub(crate) fn with_request(
        line: Key<Line>,
        station: usize,
        request: Request,
        requested_at: Duration,
    ) -> Self {
        Self {
            line,
            station,
            requested_at,
            stage: VisitStage::Queued(request),
        }
    }
}

impl Process for StationVisit {
    fn resume(&mut self, ctx: &mut Context<'_>) -> Suspend {
        loop {
            match self.stage {
                VisitStage::Start => {
                    let resource = line(ctx, self.line).stations[self.station].resource();
                    let request = ctx.request(resource);
                    self.requested_at = ctx.time();
                    self.stage = VisitStage::Queued(request);
                    return Suspend::Wait(request.signal());
                }
                VisitStage::Queued(request) => {
                    let granted = match ctx.triggered_at(request.signal()) {
                        Some(time) => time,
                        None => return Suspend::Wait(request.signal()),
                    };
                    if self.station > 0 {
                        let wait = granted - self.requested_at;
                        line_mut(ctx, self.line).record_wait(self.station, wait);
                    }
                    self.stage = VisitStage::CheckRepaired(request);
                }
                VisitStage::CheckRepaired(request) => {
                    let state = line(ctx, self.line);
                    let station = &state.stations[self.station];
                    if station.is_broken() {
                        let poll = state.params.repair_poll;
                        return Suspend::Wait(ctx.timeout(poll));
                    }
                    let bin = station.bin();
                    self.stage = VisitStage::Fetching(request);
                    return Suspend::Wait(ctx.get(bin, 1));
                }
                VisitStage::Fetching(request) => {
                    let time = ctx.time();
                    let state = line_mut(ctx, self.line);
                    state.stations[self.station].record(time, StationStatus::Operational);
                    let processing = state.sample_processing(self.station);
                    self.stage = VisitStage::Working {
                        request,
                        started: time,
                    };
                    return Suspend::Wait(ctx.timeout(processing));
                }
                VisitStage::Working { request, started } => {
                    let time = ctx.time();
                    let state = line_mut(ctx, self.line);
                    state.stations[self.station].busy_time += time - started;
                    if state.inspect(self.station) {
                        let station = &mut state.stations[self.station];
                        station.broken = true;
                        station.num_breakdowns += 1;
                        station.record(time, StationStatus::Down);
                        let repair = state.sample_repair(self.station);
                        self.stage = VisitStage::Repairing {
                            request,
                            since: time,
                        };
                        return Suspend::Wait(ctx.timeout(repair));
                    }
                    ctx.release(request);
                    return Suspend::Exit;
                }
                VisitStage::Repairing { request, since } => {
                    let time = ctx.time();
                    let station = &mut line_mut(ctx, self.line).stations[self.station];
                    station.broken = false;
                    station.total_downtime += time - since;
                    station.record(time, StationStatus::Operational);
                    ctx.release(request);
                    return Suspend::Exit;
                }
            }
        }
    }
}
