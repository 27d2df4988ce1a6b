use std::cell::Cell;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::rc::Rc;
use std::time::Duration;

use crate::{Clock, ProcessId, Signal};

/// What happens when an event comes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Triggers a pending signal, e.g., the end of a timeout.
    Trigger(Signal),
    /// Resumes a process, as long as it is still waiting at the given wake epoch.
    /// Wake-ups carrying an outdated epoch are ignored.
    Resume {
        /// Process to resume.
        process: ProcessId,
        /// Epoch at which the process suspended.
        epoch: u64,
    },
}

/// Entry type stored in the scheduler, including the action, the time when it is supposed to
/// occur, and its sequence number.
///
/// Entries are ordered by time, and then by sequence number, which is the order of insertion.
/// This makes the order of processing fully deterministic.
#[derive(Debug, Clone, Copy)]
pub struct EventEntry {
    time: Duration,
    sequence: u64,
    action: Action,
}

impl EventEntry {
    /// Time at which the event is due.
    #[must_use]
    pub fn time(&self) -> Duration {
        self.time
    }

    /// Insertion order of the event, used to break ties.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The action to perform.
    #[must_use]
    pub fn action(&self) -> Action {
        self.action
    }
}

impl PartialEq for EventEntry {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.sequence == other.sequence
    }
}

impl Eq for EventEntry {}

impl PartialOrd for EventEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

/// Trait implemented by objects maintaining the current simulation time.
pub trait Time {
    /// Return the current simulation time.
    fn time(&self) -> Duration;
}

/// This struct has only immutable access to the simulation clock exposed.
#[derive(Debug, Clone)]
pub struct ClockRef {
    clock: Clock,
}

impl From<Clock> for ClockRef {
    fn from(clock: Clock) -> Self {
        Self { clock }
    }
}

impl ClockRef {
    /// Return the current simulation time.
    #[must_use]
    pub fn time(&self) -> Duration {
        self.clock.get()
    }
}

impl Time for ClockRef {
    fn time(&self) -> Duration {
        self.clock.get()
    }
}

/// Scheduler is used to keep the current time and information about the upcoming events.
pub struct Scheduler {
    events: BinaryHeap<Reverse<EventEntry>>,
    clock: Clock,
    next_sequence: u64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            events: BinaryHeap::new(),
            clock: Rc::new(Cell::new(Duration::default())),
            next_sequence: 0,
        }
    }
}

impl Time for Scheduler {
    fn time(&self) -> Duration {
        self.clock.get()
    }
}

impl Scheduler {
    /// Schedules `action` to be performed at `self.time() + delay`.
    pub fn schedule(&mut self, delay: Duration, action: Action) {
        let time = self.time() + delay;
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.events.push(Reverse(EventEntry {
            time,
            sequence,
            action,
        }));
    }

    /// Schedules `action` to be performed at `self.time()`, after all events already
    /// scheduled for this instant.
    pub fn schedule_immediately(&mut self, action: Action) {
        self.schedule(Duration::default(), action);
    }

    /// Returns the current simulation time.
    #[must_use]
    pub fn time(&self) -> Duration {
        self.clock.get()
    }

    /// Returns a structure with immutable access to the simulation time.
    #[must_use]
    pub fn clock(&self) -> ClockRef {
        ClockRef {
            clock: Rc::clone(&self.clock),
        }
    }

    /// Time of the next scheduled event, or `None` if the queue is empty.
    #[must_use]
    pub fn peek_time(&self) -> Option<Duration> {
        self.events.peek().map(|Reverse(entry)| entry.time)
    }

    /// Returns the number of events in the queue.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Answers whether the event queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Moves the clock forward to `time`. Moving it backwards is a no-op.
    pub(crate) fn advance_to(&mut self, time: Duration) {
        if time > self.clock.get() {
            self.clock.replace(time);
        }
    }

    /// Removes and returns the next scheduled event or `None` if none are left.
    /// The clock is advanced to the time of the returned event.
    pub fn pop(&mut self) -> Option<EventEntry> {
        self.events.pop().map(|Reverse(entry)| {
            self.advance_to(entry.time);
            entry
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn resume(process: usize) -> Action {
        Action::Resume {
            process: ProcessId::from(process),
            epoch: 0,
        }
    }

    #[test]
    fn test_event_entry_cmp() {
        let make_entry = |secs, sequence| EventEntry {
            time: Duration::from_secs(secs),
            sequence,
            action: resume(0),
        };
        assert_eq!(make_entry(1, 0), make_entry(1, 0));
        assert_eq!(make_entry(0, 5).cmp(&make_entry(1, 0)), Ordering::Less);
        assert_eq!(make_entry(2, 0).cmp(&make_entry(1, 5)), Ordering::Greater);
        assert_eq!(make_entry(1, 3).cmp(&make_entry(1, 4)), Ordering::Less);
    }

    #[test]
    fn test_scheduler() {
        let mut scheduler = Scheduler::default();
        assert_eq!(scheduler.time(), Duration::new(0, 0));
        assert!(scheduler.is_empty());

        scheduler.schedule(Duration::from_secs(1), resume(0));
        scheduler.schedule(Duration::from_secs(0), resume(1));
        scheduler.schedule(Duration::from_secs(2), resume(2));
        assert_eq!(scheduler.len(), 3);
        assert_eq!(scheduler.peek_time(), Some(Duration::from_secs(0)));

        let entry = scheduler.pop().unwrap();
        assert_eq!(entry.action(), resume(1));
        assert_eq!(entry.time(), Duration::from_secs(0));
        assert_eq!(scheduler.time(), Duration::from_secs(0));

        let entry = scheduler.pop().unwrap();
        assert_eq!(entry.action(), resume(0));
        assert_eq!(scheduler.time(), Duration::from_secs(1));

        let entry = scheduler.pop().unwrap();
        assert_eq!(entry.action(), resume(2));
        assert_eq!(scheduler.time(), Duration::from_secs(2));

        assert!(scheduler.pop().is_none());
        assert_eq!(scheduler.time(), Duration::from_secs(2));
    }

    #[test]
    fn test_ties_follow_insertion_order() {
        let mut scheduler = Scheduler::default();
        for process in 0..10 {
            scheduler.schedule(Duration::from_secs(5), resume(process));
        }
        scheduler.schedule_immediately(resume(99));
        assert_eq!(scheduler.pop().unwrap().action(), resume(99));
        for process in 0..10 {
            let entry = scheduler.pop().unwrap();
            assert_eq!(entry.action(), resume(process));
            assert_eq!(entry.sequence(), process as u64);
        }
    }

    #[test]
    fn test_clock_ref() {
        let mut scheduler = Scheduler::default();
        let clock = scheduler.clock();
        scheduler.schedule(Duration::from_millis(1500), resume(0));
        assert_eq!(clock.time(), Duration::default());
        scheduler.pop();
        assert_eq!(clock.time(), Duration::from_millis(1500));
    }
}
