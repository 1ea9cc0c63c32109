use std::fmt;
use std::time::Duration;

use crate::{
    Component, ComponentId, Components, EventHandle, Key, QueueId, ScheduleError, Scheduler,
    State,
};

/// The main simulation object.
///
/// It owns everything a single run needs, so any number of independent simulations can exist
/// in the same process.
pub struct Simulation {
    /// Current state of the simulation meant to be mutated by the components.
    pub state: State,
    /// Schedules events and maintains the clock.
    pub scheduler: Scheduler,
    components: Components,
}

impl Default for Simulation {
    fn default() -> Self {
        let state = State::default();
        let components = Components::new(&state);
        Self {
            state,
            scheduler: Scheduler::default(),
            components,
        }
    }
}

impl Simulation {
    /// Adds a new component.
    #[must_use]
    pub fn add_component<C: Component + 'static>(&mut self, component: C) -> ComponentId<C::Event> {
        self.components.add_component(component)
    }

    /// Adds a new unbounded queue.
    #[must_use]
    pub fn add_queue<V: 'static>(&mut self) -> QueueId<V> {
        self.state.new_queue()
    }

    /// Adds a new bounded queue.
    #[must_use]
    pub fn add_bounded_queue<V: 'static>(&mut self, capacity: usize) -> QueueId<V> {
        self.state.new_bounded_queue(capacity)
    }

    /// Inserts a value into the simulation state.
    #[must_use = "Discarding key results in leaking inserted value"]
    pub fn insert<V: 'static>(&mut self, value: V) -> Key<V> {
        self.state.insert(value)
    }

    /// Schedules a new event to be executed after `delay` in component `component`.
    pub fn schedule<E: fmt::Debug + 'static>(
        &mut self,
        delay: Duration,
        component: ComponentId<E>,
        event: E,
    ) -> EventHandle {
        self.scheduler.schedule(delay, component, event)
    }

    /// Schedules a new event to be executed after `delay` seconds in component `component`.
    ///
    /// # Errors
    ///
    /// See [`Scheduler::schedule_secs`].
    pub fn schedule_secs<E: fmt::Debug + 'static>(
        &mut self,
        delay: f64,
        component: ComponentId<E>,
        event: E,
    ) -> Result<EventHandle, ScheduleError> {
        self.scheduler.schedule_secs(delay, component, event)
    }

    /// Cancels a previously scheduled event. See [`Scheduler::cancel`].
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        self.scheduler.cancel(handle)
    }

    /// Performs one step of the simulation. Returns `true` if there was in fact an event
    /// available to process, and `false` instead, which signifies that the simulation
    /// ended.
    pub fn step(&mut self) -> bool {
        self.step_before(Duration::MAX)
    }

    fn step_before(&mut self, deadline: Duration) -> bool {
        if let Some(entry) = self.scheduler.pop_before(deadline) {
            self.components
                .process(&entry, &mut self.scheduler, &mut self.state);
            true
        } else {
            false
        }
    }

    /// Runs until there are no more events scheduled before `time`, and returns the number of
    /// processed events. Any events left on the scheduler are discarded and the clock is set
    /// to `time`.
    pub fn run_until(&mut self, time: Duration) -> usize {
        self.run_until_with(time, |_| {})
    }

    /// Same as [`Simulation::run_until`] but calls `on_step` with the current time after each
    /// processed event.
    pub fn run_until_with<F>(&mut self, time: Duration, mut on_step: F) -> usize
    where
        F: FnMut(Duration),
    {
        let mut steps = 0;
        while self.step_before(time) {
            steps += 1;
            on_step(self.scheduler.time());
        }
        self.scheduler.discard_until(time);
        steps
    }

    /// Runs until there are no more events on the scheduler. Returns the number of processed
    /// events. Note that a component that reschedules itself indefinitely will make this
    /// function loop forever.
    pub fn run(&mut self) -> usize {
        let mut steps = 0;
        while self.step() {
            steps += 1;
        }
        steps
    }
}
