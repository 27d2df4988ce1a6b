#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::default_trait_access)]

//! This is a general purpose, process-oriented discrete-event simulation kernel. It provides
//! the mechanisms such as: scheduler, processes, resources, containers, and state.
//!
//! A [`Process`] is a state machine that runs until it has to wait, and then returns a
//! [`Suspend`] describing the [`Signal`]s it waits for. Signals are triggered by timeouts,
//! [`Resource`] grants, [`Container`] operations, and process exits. All execution happens on a
//! single thread; the virtual clock moves only when the next event is popped from the
//! [`Scheduler`].

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

/// Simulation clock.
pub type Clock = Rc<Cell<Duration>>;

pub use container::{Container, ContainerId};
pub use context::Context;
pub use process::{from_fn, FromFn, Process, ProcessHandle, ProcessId, ProcessState, Suspend};
pub use resource::{Request, RequestId, RequestStatus, Resource, ResourceId};
pub use scheduler::{Action, ClockRef, EventEntry, Scheduler, Time};
pub use signal::{Signal, SignalStatus};
pub use simulation::Simulation;
pub use state::{Key, State};

mod container;
mod context;
mod kernel;
mod process;
mod resource;
mod scheduler;
mod signal;
mod simulation;
mod state;
