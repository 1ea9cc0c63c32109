#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::default_trait_access)]

//! This is a general purpose discrete-event simulation kernel that provides the mechanisms such
//! as: scheduler, state, queues, components, and the simulation driver tying them together.
//!
//! Time is virtual: it only moves forward when the next event is taken off the scheduler.
//! Events scheduled for the same time are processed in the order they were scheduled.
//!
//! # Examples
//!
//! ```
//! # use std::time::Duration;
//! # use evsim::{Component, ComponentId, Key, Scheduler, Simulation, State};
//! #[derive(Debug)]
//! struct Tick;
//!
//! struct Counter {
//!     ticks: Key<usize>,
//! }
//!
//! impl Component for Counter {
//!     type Event = Tick;
//!     fn process_event(
//!         &mut self,
//!         self_id: ComponentId<Tick>,
//!         _: &Tick,
//!         scheduler: &mut Scheduler,
//!         state: &mut State,
//!     ) {
//!         *state.get_mut(self.ticks).unwrap() += 1;
//!         scheduler.schedule(Duration::from_secs(1), self_id, Tick);
//!     }
//! }
//!
//! let mut sim = Simulation::default();
//! let ticks = sim.state.insert(0_usize);
//! let counter = sim.add_component(Counter { ticks });
//! sim.schedule(Duration::default(), counter, Tick);
//! sim.run_until(Duration::from_millis(2500));
//! assert_eq!(sim.state.get(ticks), Some(&3));
//! assert_eq!(sim.scheduler.time(), Duration::from_millis(2500));
//! ```

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

/// Simulation clock.
pub type Clock = Rc<Cell<Duration>>;

pub use component::{Component, ComponentId, Components};
pub use queue::Queue;
pub use scheduler::{ClockRef, EventEntry, EventEntryTyped, EventHandle, ScheduleError, Scheduler};
pub use simulation::Simulation;
pub use state::{Key, QueueId, State};

mod component;
mod queue;
mod scheduler;
mod simulation;
mod state;
