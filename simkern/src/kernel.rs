use std::time::Duration;

use crate::scheduler::Action;
use crate::signal::Signals;
use crate::{
    Container, ContainerId, Process, ProcessHandle, ProcessId, ProcessState, Request, RequestId,
    RequestStatus, Resource, ResourceId, Scheduler, Signal, SignalStatus, Suspend,
};

pub(crate) struct ProcessSlot {
    pub(crate) process: Option<Box<dyn Process>>,
    pub(crate) state: ProcessState,
    pub(crate) epoch: u64,
    pub(crate) exit: Signal,
}

struct RequestSlot {
    resource: ResourceId,
    status: RequestStatus,
    signal: Signal,
}

/// Bookkeeping of all kernel objects: events, signals, processes, resources, and containers.
#[derive(Default)]
pub(crate) struct Kernel {
    pub(crate) scheduler: Scheduler,
    signals: Signals,
    pub(crate) processes: Vec<ProcessSlot>,
    resources: Vec<Resource<RequestId>>,
    requests: Vec<RequestSlot>,
    containers: Vec<Container<Signal>>,
}

impl Kernel {
    pub(crate) fn time(&self) -> Duration {
        self.scheduler.time()
    }

    pub(crate) fn add_resource(&mut self, capacity: usize) -> ResourceId {
        self.resources.push(Resource::new(capacity));
        ResourceId(self.resources.len() - 1)
    }

    pub(crate) fn add_container(&mut self, level: u64) -> ContainerId {
        self.containers.push(Container::new(level));
        ContainerId(self.containers.len() - 1)
    }

    pub(crate) fn resource(&self, id: ResourceId) -> &Resource<RequestId> {
        self.resources.get(id.0).expect("invalid resource ID")
    }

    fn resource_mut(&mut self, id: ResourceId) -> &mut Resource<RequestId> {
        self.resources.get_mut(id.0).expect("invalid resource ID")
    }

    pub(crate) fn container(&self, id: ContainerId) -> &Container<Signal> {
        self.containers.get(id.0).expect("invalid container ID")
    }

    fn container_mut(&mut self, id: ContainerId) -> &mut Container<Signal> {
        self.containers.get_mut(id.0).expect("invalid container ID")
    }

    pub(crate) fn signal_status(&self, signal: Signal) -> SignalStatus {
        self.signals.status(signal)
    }

    pub(crate) fn num_signals(&self) -> usize {
        self.signals.len()
    }

    /// Triggers the signal and schedules all its waiters to resume at the current instant.
    pub(crate) fn trigger(&mut self, signal: Signal) {
        let time = self.time();
        for (process, epoch) in self.signals.trigger(signal, time) {
            self.scheduler
                .schedule_immediately(Action::Resume { process, epoch });
        }
    }

    pub(crate) fn timeout(&mut self, delay: Duration) -> Signal {
        let signal = self.signals.create();
        self.scheduler.schedule(delay, Action::Trigger(signal));
        signal
    }

    pub(crate) fn spawn(&mut self, process: Box<dyn Process>) -> ProcessHandle {
        let exit = self.signals.create();
        let id = ProcessId(self.processes.len());
        self.processes.push(ProcessSlot {
            process: Some(process),
            state: ProcessState::Runnable,
            epoch: 0,
            exit,
        });
        self.scheduler.schedule_immediately(Action::Resume {
            process: id,
            epoch: 0,
        });
        log::trace!("[{:?}] Spawned process {}", self.time(), id);
        ProcessHandle { id, exit }
    }

    pub(crate) fn request(&mut self, resource: ResourceId) -> Request {
        let id = RequestId(self.requests.len());
        let signal = self.signals.create();
        self.requests.push(RequestSlot {
            resource,
            status: RequestStatus::Pending,
            signal,
        });
        if self.resource_mut(resource).request(id) {
            self.grant(id);
        }
        Request {
            id,
            resource,
            signal,
        }
    }

    fn request_slot_mut(&mut self, id: RequestId) -> &mut RequestSlot {
        self.requests.get_mut(id.0).expect("invalid request ID")
    }

    fn grant(&mut self, id: RequestId) {
        let slot = self.request_slot_mut(id);
        slot.status = RequestStatus::Granted;
        let signal = slot.signal;
        self.trigger(signal);
    }

    pub(crate) fn request_status(&self, request: Request) -> RequestStatus {
        self.requests
            .get(request.id.0)
            .expect("invalid request ID")
            .status
    }

    pub(crate) fn release(&mut self, request: Request) {
        let slot = self.request_slot_mut(request.id);
        let resource = slot.resource;
        let status = std::mem::replace(&mut slot.status, RequestStatus::Released);
        match status {
            RequestStatus::Granted => {
                if let Some(next) = self.resource_mut(resource).release() {
                    self.grant(next);
                }
            }
            RequestStatus::Pending => {
                self.resource_mut(resource).withdraw(&request.id);
            }
            RequestStatus::Released => panic!("request {:?} released twice", request.id),
        }
    }

    pub(crate) fn get(&mut self, container: ContainerId, amount: u64) -> Signal {
        let signal = self.signals.create();
        if self.container_mut(container).get(signal, amount) {
            self.trigger(signal);
        }
        signal
    }

    pub(crate) fn put(&mut self, container: ContainerId, amount: u64) -> Signal {
        let signal = self.signals.create();
        self.trigger(signal);
        for satisfied in self.container_mut(container).put(amount) {
            self.trigger(satisfied);
        }
        signal
    }

    pub(crate) fn level(&self, container: ContainerId) -> u64 {
        self.container(container).level()
    }

    /// Records how the process suspended, registering it with the signals it waits for.
    pub(crate) fn suspend(&mut self, id: ProcessId, suspend: Suspend) {
        match suspend {
            Suspend::Wait(signal) => self.wait_any(id, &[signal]),
            Suspend::FirstOf(signals) => self.wait_any(id, &signals),
            Suspend::Exit => {
                let slot = &mut self.processes[id.0];
                slot.state = ProcessState::Done;
                slot.process = None;
                let exit = slot.exit;
                log::trace!("[{:?}] Process {} exited", self.time(), id);
                self.trigger(exit);
            }
        }
    }

    fn wait_any(&mut self, id: ProcessId, signals: &[Signal]) {
        let slot = &mut self.processes[id.0];
        slot.state = ProcessState::Waiting;
        let epoch = slot.epoch;
        if signals.is_empty() || signals.iter().any(|&s| self.signals.is_triggered(s)) {
            self.scheduler.schedule_immediately(Action::Resume { process: id, epoch });
        } else {
            for &signal in signals {
                self.signals.wait(signal, id, epoch);
            }
        }
    }
}
