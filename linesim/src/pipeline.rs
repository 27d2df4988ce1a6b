//! Processes moving items along the line.

use std::time::Duration;

use simkern::{Context, Key, Process, Request, Suspend};

use crate::factory::{line, line_mut, Line};
use crate::station::StationVisit;

/// Index of the last station visited in sequence before the race.
const LAST_SERIAL: usize = 2;
/// Indices of the two stations raced against each other.
const RACED: (usize, usize) = (3, 4);
/// Index of the final station.
const FINAL: usize = 5;

/// Spawns a new [`Pipeline`] after each arrival interval, until the arrival limit, if any.
pub(crate) struct Arrivals {
    line: Key<Line>,
    sleeping: bool,
}

impl Arrivals {
    pub(crate) fn new(line: Key<Line>) -> Self {
        Self {
            line,
            sleeping: false,
        }
    }
}

impl Process for Arrivals {
    fn resume(&mut self, ctx: &mut Context<'_>) -> Suspend {
        let time = ctx.time();
        let state = line_mut(ctx, self.line);
        if self.sleeping {
            state.items_started += 1;
            let item = state.items_started;
            log::debug!("[{:?}] Item {} arrived", time, item);
            ctx.spawn(Pipeline::new(self.line, item));
        }
        let state = line_mut(ctx, self.line);
        if state
            .params
            .arrival_limit
            .map_or(false, |limit| state.items_started >= limit)
        {
            log::info!("[{:?}] No more arrivals", time);
            return Suspend::Exit;
        }
        let interval = state.sample_arrival();
        self.sleeping = true;
        Suspend::Wait(ctx.timeout(interval))
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Start,
    Serial(usize),
    Racing {
        first: Request,
        second: Request,
        requested_at: Duration,
    },
    Forked {
        next: usize,
        request: Request,
        requested_at: Duration,
    },
    Final,
    Done,
}

/// The journey of one item through all stations.
///
/// Stations 1 to 3 are visited in sequence. Then stations 4 and 5 are requested at the same
/// time, and the item goes first to the one granted first and then to the other; both requests
/// are always used and released. Station 6 is last. A finished item is either produced or
/// faulty.
pub(crate) struct Pipeline {
    line: Key<Line>,
    item: usize,
    stage: Stage,
}

impl Pipeline {
    pub(crate) fn new(line: Key<Line>, item: usize) -> Self {
        Self {
            line,
            item,
            stage: Stage::Start,
        }
    }

    fn visit(&self, ctx: &mut Context<'_>, station: usize) -> Suspend {
        let handle = ctx.spawn(StationVisit::new(self.line, station));
        Suspend::Wait(handle.exit())
    }
}

impl Process for Pipeline {
    fn resume(&mut self, ctx: &mut Context<'_>) -> Suspend {
        match self.stage {
            Stage::Start => {
                self.stage = Stage::Serial(0);
                self.visit(ctx, 0)
            }
            Stage::Serial(station) if station < LAST_SERIAL => {
                self.stage = Stage::Serial(station + 1);
                self.visit(ctx, station + 1)
            }
            Stage::Serial(_) => {
                let (first, second) = {
                    let stations = &line(ctx, self.line).stations;
                    (stations[RACED.0].resource(), stations[RACED.1].resource())
                };
                let first = ctx.request(first);
                let second = ctx.request(second);
                self.stage = Stage::Racing {
                    first,
                    second,
                    requested_at: ctx.time(),
                };
                Suspend::FirstOf(vec![first.signal(), second.signal()])
            }
            Stage::Racing {
                first,
                second,
                requested_at,
            } => {
                let ((now, now_request), (next, next_request)) =
                    if ctx.is_triggered(first.signal()) {
                        ((RACED.0, first), (RACED.1, second))
                    } else {
                        ((RACED.1, second), (RACED.0, first))
                    };
                log::trace!(
                    "[{:?}] Item {} goes to station {} first",
                    ctx.time(),
                    self.item,
                    now + 1
                );
                self.stage = Stage::Forked {
                    next,
                    request: next_request,
                    requested_at,
                };
                let handle = ctx.spawn(StationVisit::with_request(
                    self.line,
                    now,
                    now_request,
                    requested_at,
                ));
                Suspend::Wait(handle.exit())
            }
            Stage::Forked {
                next,
                request,
                requested_at,
            } => {
                self.stage = Stage::Final;
                let handle = ctx.spawn(StationVisit::with_request(
                    self.line,
                    next,
                    request,
                    requested_at,
                ));
                Suspend::Wait(handle.exit())
            }
            Stage::Final => {
                self.stage = Stage::Done;
                self.visit(ctx, FINAL)
            }
            Stage::Done => {
                let time = ctx.time();
                let state = line_mut(ctx, self.line);
                state.items_completed += 1;
                if state.sample_faulty() {
                    state.faulty_products += 1;
                    log::debug!("[{:?}] Item {} is faulty", time, self.item);
                } else {
                    state.total_produced += 1;
                    log::debug!("[{:?}] Item {} produced", time, self.item);
                }
                Suspend::Exit
            }
        }
    }
}
