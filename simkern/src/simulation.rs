use std::time::Duration;

use crate::kernel::Kernel;
use crate::scheduler::Action;
use crate::{
    ClockRef, Container, ContainerId, Context, Process, ProcessHandle, ProcessId, ProcessState,
    Request, RequestId, RequestStatus, Resource, ResourceId, Signal, SignalStatus, State, Suspend,
};

/// The main simulation object.
///
/// It owns the kernel (scheduler, signals, processes, resources, containers) and the domain
/// [`State`]. The simulation is driven by popping events in time order; each event either
/// triggers a signal or resumes a process.
///
/// # Examples
///
/// ```
/// # use simkern::{from_fn, Simulation, Suspend};
/// # use std::time::Duration;
/// let mut sim = Simulation::default();
/// let machine = sim.add_resource(1);
/// for _ in 0..3 {
///     let mut request = None;
///     sim.spawn(from_fn(move |ctx| match request {
///         None => {
///             let req = ctx.request(machine);
///             request = Some(req);
///             Suspend::Wait(req.signal())
///         }
///         Some(req) if ctx.request_status(req) == simkern::RequestStatus::Granted => {
///             ctx.release(req);
///             Suspend::Wait(ctx.timeout(Duration::from_secs(10)))
///         }
///         Some(_) => Suspend::Exit,
///     }));
/// }
/// sim.run();
/// assert_eq!(sim.resource(machine).users(), 0);
/// ```
#[derive(Default)]
pub struct Simulation {
    /// Domain state shared by the processes.
    pub state: State,
    kernel: Kernel,
    events_processed: u64,
}

impl Simulation {
    /// Registers a new resource with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn add_resource(&mut self, capacity: usize) -> ResourceId {
        self.kernel.add_resource(capacity)
    }

    /// Registers a new container with the given initial level.
    pub fn add_container(&mut self, level: u64) -> ContainerId {
        self.kernel.add_container(level)
    }

    /// Spawns a process that starts at the current simulation time.
    pub fn spawn<P: Process + 'static>(&mut self, process: P) -> ProcessHandle {
        self.kernel.spawn(Box::new(process))
    }

    /// Current simulation time.
    #[must_use]
    pub fn time(&self) -> Duration {
        self.kernel.time()
    }

    /// Returns a structure with immutable access to the simulation time.
    #[must_use]
    pub fn clock(&self) -> ClockRef {
        self.kernel.scheduler.clock()
    }

    /// Time of the next event, or `None` if there is nothing left to do.
    #[must_use]
    pub fn peek_time(&self) -> Option<Duration> {
        self.kernel.scheduler.peek_time()
    }

    /// Number of events waiting in the scheduler.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.kernel.scheduler.len()
    }

    /// Number of events processed so far.
    #[must_use]
    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// Number of signals created so far.
    ///
    /// Every timeout, request, container operation, and spawned process creates one signal,
    /// and signals are never reclaimed, so that their IDs stay valid for [`Self::signal_status`].
    /// The same holds for processes and requests. Memory use is thus linear in the number of
    /// such operations during the run, with a small fixed size per entry: a triggered signal
    /// keeps no waiters, and a finished process no longer keeps its continuation.
    #[must_use]
    pub fn num_signals(&self) -> usize {
        self.kernel.num_signals()
    }

    /// Processes the next event. Returns `false` if there were no events left.
    pub fn step(&mut self) -> bool {
        match self.kernel.scheduler.pop() {
            Some(entry) => {
                self.events_processed += 1;
                match entry.action() {
                    Action::Trigger(signal) => self.kernel.trigger(signal),
                    Action::Resume { process, epoch } => self.resume(process, epoch),
                }
                true
            }
            None => false,
        }
    }

    /// Runs until there are no more events, or the next event is due at or after `limit`.
    /// In the latter case, the clock is moved to `limit`; the remaining events are left
    /// unprocessed, and the processes waiting for them are never resumed.
    ///
    /// Returns the simulation time at the end of the run.
    pub fn run_until(&mut self, limit: Duration) -> Duration {
        log::debug!("Running simulation until {:?}", limit);
        while let Some(time) = self.peek_time() {
            if time >= limit {
                self.kernel.scheduler.advance_to(limit);
                break;
            }
            self.step();
        }
        log::debug!(
            "Simulation stopped at {:?} after {} events",
            self.time(),
            self.events_processed
        );
        self.time()
    }

    /// Runs until there are no more events.
    pub fn run(&mut self) -> Duration {
        while self.step() {}
        self.time()
    }

    fn resume(&mut self, id: ProcessId, epoch: u64) {
        let slot = &mut self.kernel.processes[usize::from(id)];
        if slot.epoch != epoch || slot.state == ProcessState::Done {
            return;
        }
        slot.epoch += 1;
        slot.state = ProcessState::Runnable;
        let mut process = slot
            .process
            .take()
            .expect("a process cannot be resumed while it is running");
        let suspend = {
            let mut ctx = Context::new(id, &mut self.kernel, &mut self.state);
            process.resume(&mut ctx)
        };
        if suspend != Suspend::Exit {
            self.kernel.processes[usize::from(id)].process = Some(process);
        }
        self.kernel.suspend(id, suspend);
    }

    /// Scheduling state of a process.
    ///
    /// # Panics
    ///
    /// Panics if the process does not exist.
    #[must_use]
    pub fn process_state(&self, id: ProcessId) -> ProcessState {
        self.kernel
            .processes
            .get(usize::from(id))
            .expect("invalid process ID")
            .state
    }

    /// Inspects a resource.
    #[must_use]
    pub fn resource(&self, id: ResourceId) -> &Resource<RequestId> {
        self.kernel.resource(id)
    }

    /// Inspects a container.
    #[must_use]
    pub fn container(&self, id: ContainerId) -> &Container<Signal> {
        self.kernel.container(id)
    }

    /// Status of a signal.
    #[must_use]
    pub fn signal_status(&self, signal: Signal) -> SignalStatus {
        self.kernel.signal_status(signal)
    }

    /// Status of a resource request.
    #[must_use]
    pub fn request_status(&self, request: Request) -> RequestStatus {
        self.kernel.request_status(request)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::from_fn;

    use std::cell::RefCell;
    use std::rc::Rc;

    use rstest::{fixture, rstest};

    type Log = Rc<RefCell<Vec<(Duration, &'static str)>>>;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[fixture]
    fn log() -> Log {
        Rc::new(RefCell::new(Vec::new()))
    }

    /// Requests `resource`, holds it for `hold`, and releases it. Logs the time of the grant.
    fn holder(
        resource: ResourceId,
        hold: Duration,
        name: &'static str,
        log: &Log,
    ) -> impl Process {
        let log = Rc::clone(log);
        let mut step = 0;
        let mut request = None;
        from_fn(move |ctx| {
            step += 1;
            match step {
                1 => {
                    let req = ctx.request(resource);
                    request = Some(req);
                    Suspend::Wait(req.signal())
                }
                2 => {
                    log.borrow_mut().push((ctx.time(), name));
                    Suspend::Wait(ctx.timeout(hold))
                }
                _ => {
                    ctx.release(request.expect("request is made in the first step"));
                    Suspend::Exit
                }
            }
        })
    }

    #[rstest]
    fn test_timeouts_advance_clock(log: Log) {
        let mut sim = Simulation::default();
        for (delay, name) in &[(5, "five"), (1, "one"), (3, "three"), (1, "one again")] {
            let log = Rc::clone(&log);
            let mut started = false;
            let (delay, name) = (*delay, *name);
            sim.spawn(from_fn(move |ctx| {
                if started {
                    log.borrow_mut().push((ctx.time(), name));
                    Suspend::Exit
                } else {
                    started = true;
                    Suspend::Wait(ctx.timeout(secs(delay)))
                }
            }));
        }
        assert_eq!(sim.run(), secs(5));
        assert_eq!(
            *log.borrow(),
            vec![
                (secs(1), "one"),
                (secs(1), "one again"),
                (secs(3), "three"),
                (secs(5), "five"),
            ]
        );
    }

    #[rstest]
    fn test_resource_fifo(log: Log) {
        let mut sim = Simulation::default();
        let resource = sim.add_resource(1);
        sim.spawn(holder(resource, secs(10), "A", &log));
        sim.spawn(holder(resource, secs(10), "B", &log));
        sim.spawn(holder(resource, secs(10), "C", &log));
        sim.run();
        assert_eq!(
            *log.borrow(),
            vec![(secs(0), "A"), (secs(10), "B"), (secs(20), "C")]
        );
        assert_eq!(sim.resource(resource).users(), 0);
    }

    #[rstest]
    fn test_resource_capacity(log: Log) {
        let mut sim = Simulation::default();
        let resource = sim.add_resource(2);
        for name in &["A", "B", "C", "D", "E"] {
            sim.spawn(holder(resource, secs(4), *name, &log));
        }
        sim.run_until(secs(1));
        assert_eq!(sim.resource(resource).users(), 2);
        assert_eq!(sim.resource(resource).queue_len(), 3);
        sim.run();
        let times: Vec<_> = log.borrow().iter().map(|(t, _)| *t).collect();
        assert_eq!(times, vec![secs(0), secs(0), secs(4), secs(4), secs(8)]);
    }

    #[rstest]
    fn test_first_of_keeps_other_request(log: Log) {
        let mut sim = Simulation::default();
        let first = sim.add_resource(1);
        let second = sim.add_resource(1);
        sim.spawn(holder(first, secs(7), "blocker", &log));

        let race_log = Rc::clone(&log);
        let mut step = 0;
        let mut requests = None;
        let racer = sim.spawn(from_fn(move |ctx| {
            step += 1;
            match step {
                1 => {
                    let a = ctx.request(first);
                    let b = ctx.request(second);
                    requests = Some((a, b));
                    Suspend::FirstOf(vec![a.signal(), b.signal()])
                }
                2 => {
                    let (a, b) = requests.unwrap();
                    assert_eq!(ctx.request_status(a), RequestStatus::Pending);
                    assert_eq!(ctx.request_status(b), RequestStatus::Granted);
                    race_log.borrow_mut().push((ctx.time(), "second first"));
                    ctx.release(b);
                    Suspend::Wait(a.signal())
                }
                _ => {
                    let (a, _) = requests.unwrap();
                    race_log.borrow_mut().push((ctx.time(), "then first"));
                    ctx.release(a);
                    Suspend::Exit
                }
            }
        }));
        sim.run();
        assert_eq!(
            *log.borrow(),
            vec![
                (secs(0), "blocker"),
                (secs(0), "second first"),
                (secs(7), "then first"),
            ]
        );
        assert_eq!(sim.process_state(racer.id()), ProcessState::Done);
        assert_eq!(sim.resource(first).users(), 0);
        assert_eq!(sim.resource(second).users(), 0);
    }

    #[rstest]
    fn test_container_head_of_line(log: Log) {
        let mut sim = Simulation::default();
        let bin = sim.add_container(3);
        for (amount, name) in &[(5, "large"), (1, "small")] {
            let log = Rc::clone(&log);
            let (amount, name) = (*amount, *name);
            let mut waiting = false;
            sim.spawn(from_fn(move |ctx| {
                if waiting {
                    log.borrow_mut().push((ctx.time(), name));
                    Suspend::Exit
                } else {
                    waiting = true;
                    Suspend::Wait(ctx.get(bin, amount))
                }
            }));
        }
        let mut step = 0;
        sim.spawn(from_fn(move |ctx| {
            step += 1;
            match step {
                1 => Suspend::Wait(ctx.timeout(secs(2))),
                2 => {
                    let put = ctx.put(bin, 1);
                    assert!(ctx.is_triggered(put));
                    Suspend::Wait(ctx.timeout(secs(2)))
                }
                3 => Suspend::Wait(ctx.put(bin, 1)),
                _ => Suspend::Exit,
            }
        }));
        sim.run_until(secs(3));
        assert!(log.borrow().is_empty());
        assert_eq!(sim.container(bin).level(), 4);
        sim.run();
        assert_eq!(*log.borrow(), vec![(secs(4), "large")]);
        assert_eq!(sim.container(bin).level(), 0);
        assert_eq!(sim.container(bin).waiting(), 1);
    }

    #[rstest]
    fn test_join(log: Log) {
        let mut sim = Simulation::default();
        let parent_log = Rc::clone(&log);
        let mut child = None;
        sim.spawn(from_fn(move |ctx| match child {
            None => {
                let child_log = Rc::clone(&parent_log);
                let mut slept = false;
                let handle = ctx.spawn(from_fn(move |ctx| {
                    if slept {
                        child_log.borrow_mut().push((ctx.time(), "child"));
                        Suspend::Exit
                    } else {
                        slept = true;
                        Suspend::Wait(ctx.timeout(secs(4)))
                    }
                }));
                child = Some(handle);
                Suspend::Wait(handle.exit())
            }
            Some(_) => {
                parent_log.borrow_mut().push((ctx.time(), "parent"));
                Suspend::Exit
            }
        }));
        sim.run();
        assert_eq!(*log.borrow(), vec![(secs(4), "child"), (secs(4), "parent")]);
    }

    #[rstest]
    fn test_cutoff_abandons_holders(log: Log) {
        let mut sim = Simulation::default();
        let resource = sim.add_resource(1);
        let first = sim.spawn(holder(resource, secs(100), "A", &log));
        let second = sim.spawn(holder(resource, secs(100), "B", &log));
        assert_eq!(sim.run_until(secs(50)), secs(50));
        assert_eq!(sim.time(), secs(50));
        assert_eq!(sim.process_state(first.id()), ProcessState::Waiting);
        assert_eq!(sim.process_state(second.id()), ProcessState::Waiting);
        assert_eq!(sim.resource(resource).users(), 1);
        assert_eq!(sim.resource(resource).queue_len(), 1);
        assert_eq!(sim.pending_events(), 1);
    }

    #[test]
    fn test_event_at_limit_not_processed() {
        let mut sim = Simulation::default();
        let mut fired = false;
        let signal = {
            let handle = sim.spawn(from_fn(move |ctx| {
                if fired {
                    Suspend::Exit
                } else {
                    fired = true;
                    Suspend::Wait(ctx.timeout(secs(10)))
                }
            }));
            handle.exit()
        };
        sim.run_until(secs(10));
        assert_eq!(sim.signal_status(signal), SignalStatus::Pending);
        sim.run();
        assert_eq!(sim.signal_status(signal), SignalStatus::Triggered(secs(10)));
    }

    #[test]
    fn test_withdraw_pending_request() {
        let mut sim = Simulation::default();
        let resource = sim.add_resource(1);
        let mut step = 0;
        let mut requests = None;
        sim.spawn(from_fn(move |ctx| {
            step += 1;
            if step == 1 {
                let held = ctx.request(resource);
                let queued = ctx.request(resource);
                assert_eq!(ctx.request_status(queued), RequestStatus::Pending);
                ctx.release(queued);
                assert_eq!(ctx.request_status(queued), RequestStatus::Released);
                requests = Some(held);
                Suspend::Wait(held.signal())
            } else {
                ctx.release(requests.unwrap());
                Suspend::Exit
            }
        }));
        sim.run();
        assert_eq!(sim.resource(resource).users(), 0);
        assert_eq!(sim.resource(resource).queue_len(), 0);
    }

    #[rstest]
    fn test_tables_grow_with_operations(log: Log) {
        let mut sim = Simulation::default();
        let resource = sim.add_resource(1);
        let mut remaining = 3;
        let ticker = sim.spawn(from_fn(move |ctx| {
            if remaining == 0 {
                return Suspend::Exit;
            }
            remaining -= 1;
            Suspend::Wait(ctx.timeout(secs(1)))
        }));
        sim.spawn(holder(resource, secs(2), "A", &log));
        // One exit signal per process, three timeouts, and one request with one timeout.
        sim.run();
        assert_eq!(sim.num_signals(), 7);
        assert_eq!(sim.process_state(ticker.id()), ProcessState::Done);
        assert_eq!(
            sim.signal_status(ticker.exit()),
            SignalStatus::Triggered(secs(3))
        );
    }
}
