use std::time::Duration;

use crate::kernel::Kernel;
use crate::{
    ContainerId, Process, ProcessHandle, ProcessId, Request, RequestStatus, ResourceId, Signal,
    SignalStatus, State,
};

/// Everything a process can touch while it runs: the clock, the kernel primitives, and the
/// domain state.
///
/// Operations that may have to wait return a [`Signal`]; the process decides whether to
/// suspend on it right away, race it against other signals, or keep it for later.
pub struct Context<'a> {
    process: ProcessId,
    kernel: &'a mut Kernel,
    state: &'a mut State,
}

impl<'a> Context<'a> {
    pub(crate) fn new(process: ProcessId, kernel: &'a mut Kernel, state: &'a mut State) -> Self {
        Self {
            process,
            kernel,
            state,
        }
    }

    /// The ID of the running process.
    #[must_use]
    pub fn process_id(&self) -> ProcessId {
        self.process
    }

    /// Current simulation time.
    #[must_use]
    pub fn time(&self) -> Duration {
        self.kernel.time()
    }

    /// Domain state of the simulation.
    #[must_use]
    pub fn state(&self) -> &State {
        self.state
    }

    /// Mutable domain state of the simulation.
    #[must_use]
    pub fn state_mut(&mut self) -> &mut State {
        self.state
    }

    /// Returns a signal that triggers after `delay`.
    pub fn timeout(&mut self, delay: Duration) -> Signal {
        self.kernel.timeout(delay)
    }

    /// Requests a unit of `resource`. The returned request is granted when its signal triggers,
    /// which can be right away.
    pub fn request(&mut self, resource: ResourceId) -> Request {
        self.kernel.request(resource)
    }

    /// Releases a granted request, or withdraws a pending one.
    ///
    /// # Panics
    ///
    /// Panics if the request has already been released.
    pub fn release(&mut self, request: Request) {
        self.kernel.release(request);
    }

    /// Current status of a request.
    #[must_use]
    pub fn request_status(&self, request: Request) -> RequestStatus {
        self.kernel.request_status(request)
    }

    /// Takes `amount` out of the container; the signal triggers once it has been taken.
    pub fn get(&mut self, container: ContainerId, amount: u64) -> Signal {
        self.kernel.get(container, amount)
    }

    /// Puts `amount` into the container. Containers are unbounded, so the signal is already
    /// triggered when returned.
    pub fn put(&mut self, container: ContainerId, amount: u64) -> Signal {
        self.kernel.put(container, amount)
    }

    /// Current level of the container.
    #[must_use]
    pub fn level(&self, container: ContainerId) -> u64 {
        self.kernel.level(container)
    }

    /// Spawns a new process that will start running at the current instant, after the
    /// currently running one suspends.
    pub fn spawn<P: Process + 'static>(&mut self, process: P) -> ProcessHandle {
        self.kernel.spawn(Box::new(process))
    }

    /// Status of a signal.
    #[must_use]
    pub fn signal_status(&self, signal: Signal) -> SignalStatus {
        self.kernel.signal_status(signal)
    }

    /// Whether the signal has been triggered.
    #[must_use]
    pub fn is_triggered(&self, signal: Signal) -> bool {
        self.triggered_at(signal).is_some()
    }

    /// The time at which the signal was triggered, if it was.
    #[must_use]
    pub fn triggered_at(&self, signal: Signal) -> Option<Duration> {
        match self.signal_status(signal) {
            SignalStatus::Triggered(time) => Some(time),
            SignalStatus::Pending => None,
        }
    }
}
