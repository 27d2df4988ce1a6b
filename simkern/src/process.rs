use std::fmt;

use crate::{Context, Signal};

/// Identifies a simulation process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(pub(crate) usize);

impl From<usize> for ProcessId {
    fn from(id: usize) -> Self {
        Self(id)
    }
}

impl From<ProcessId> for usize {
    fn from(id: ProcessId) -> Self {
        id.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scheduling state of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Scheduled to be resumed at the current or a future instant.
    Runnable,
    /// Suspended until one of its signals triggers.
    Waiting,
    /// Returned [`Suspend::Exit`]; will never be resumed again.
    Done,
}

/// Tells the kernel why a process gives the control back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suspend {
    /// Resume once the signal triggers.
    Wait(Signal),
    /// Resume once any of the signals triggers.
    ///
    /// The remaining signals stay outstanding: a resource request that was not the first
    /// to be granted is still in the queue, and must eventually be released by the process.
    FirstOf(Vec<Signal>),
    /// The process has finished.
    Exit,
}

/// A process is a state machine that runs between suspension points.
///
/// Each call to [`resume`](Process::resume) executes the process up to the next point at
/// which it must wait, and returns what it waits for. All the effects on the simulation
/// go through the context.
pub trait Process {
    /// Runs the process until the next suspension point.
    fn resume(&mut self, ctx: &mut Context<'_>) -> Suspend;
}

/// Handle to a spawned process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle {
    pub(crate) id: ProcessId,
    pub(crate) exit: Signal,
}

impl ProcessHandle {
    /// The ID of the process.
    #[must_use]
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// Signal triggered when the process exits. Waiting on it joins the process.
    #[must_use]
    pub fn exit(&self) -> Signal {
        self.exit
    }
}

/// Process that calls a closure on every resumption. See [`from_fn`].
pub struct FromFn<F>(F);

/// Creates a process from a closure, which is handy for short, scripted processes.
///
/// # Examples
///
/// ```
/// # use simkern::{from_fn, Simulation, Suspend};
/// # use std::time::Duration;
/// let mut sim = Simulation::default();
/// let mut started = false;
/// sim.spawn(from_fn(move |ctx| {
///     if started {
///         Suspend::Exit
///     } else {
///         started = true;
///         Suspend::Wait(ctx.timeout(Duration::from_secs(3)))
///     }
/// }));
/// sim.run();
/// assert_eq!(sim.time(), Duration::from_secs(3));
/// ```
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: FnMut(&mut Context<'_>) -> Suspend,
{
    FromFn(f)
}

impl<F> Process for FromFn<F>
where
    F: FnMut(&mut Context<'_>) -> Suspend,
{
    fn resume(&mut self, ctx: &mut Context<'_>) -> Suspend {
        (self.0)(ctx)
    }
}
