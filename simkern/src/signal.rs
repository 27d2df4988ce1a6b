use std::time::Duration;

use crate::ProcessId;

/// A one-shot condition a process can suspend on.
///
/// Signals are created by the kernel when a process asks for a timeout, a resource, a container
/// operation, or spawns another process (the signal of process exit). Once triggered, a signal
/// stays triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signal(pub(crate) usize);

/// State of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalStatus {
    /// Not triggered yet.
    Pending,
    /// Triggered at the given time.
    Triggered(Duration),
}

#[derive(Debug)]
struct Slot {
    status: SignalStatus,
    waiters: Vec<(ProcessId, u64)>,
}

/// All signals created throughout a simulation. Slots are never reclaimed; triggering one
/// drops its waiters.
#[derive(Debug, Default)]
pub(crate) struct Signals {
    slots: Vec<Slot>,
}

impl Signals {
    pub(crate) fn create(&mut self) -> Signal {
        self.slots.push(Slot {
            status: SignalStatus::Pending,
            waiters: Vec::new(),
        });
        Signal(self.slots.len() - 1)
    }

    fn slot(&self, signal: Signal) -> &Slot {
        self.slots.get(signal.0).expect("invalid signal")
    }

    pub(crate) fn status(&self, signal: Signal) -> SignalStatus {
        self.slot(signal).status
    }

    pub(crate) fn is_triggered(&self, signal: Signal) -> bool {
        matches!(self.status(signal), SignalStatus::Triggered(_))
    }

    /// Registers a process waiting at `epoch` for the signal.
    pub(crate) fn wait(&mut self, signal: Signal, process: ProcessId, epoch: u64) {
        self.slots
            .get_mut(signal.0)
            .expect("invalid signal")
            .waiters
            .push((process, epoch));
    }

    /// Marks the signal as triggered and returns the waiters to wake, in registration order.
    ///
    /// # Panics
    ///
    /// Panics if the signal has already been triggered.
    pub(crate) fn trigger(&mut self, signal: Signal, time: Duration) -> Vec<(ProcessId, u64)> {
        let slot = self.slots.get_mut(signal.0).expect("invalid signal");
        assert_eq!(
            slot.status,
            SignalStatus::Pending,
            "signal {:?} triggered twice",
            signal
        );
        slot.status = SignalStatus::Triggered(time);
        std::mem::take(&mut slot.waiters)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}
