use std::fmt;
use std::marker::PhantomData;

use crate::{EventEntry, Scheduler, State};

/// Identifies a simulation component.
///
/// The ID is generic over the type of events the component accepts, so that scheduling an event
/// of the wrong type for a component is a compile error.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ComponentId<E> {
    pub(crate) id: usize,
    pub(crate) state_hash: u64,
    _marker: PhantomData<E>,
}

impl<E> Clone for ComponentId<E> {
    fn clone(&self) -> Self {
        Self::new(self.id, self.state_hash)
    }
}
impl<E> Copy for ComponentId<E> {}

impl<E> ComponentId<E> {
    pub(crate) fn new(id: usize, state_hash: u64) -> Self {
        Self {
            id,
            state_hash,
            _marker: PhantomData,
        }
    }
}

/// Interface of a simulation component.
///
/// A component reacts to events addressed to it. All state changes of a running simulation
/// happen inside [`Component::process_event`], which has mutable access to the scheduler, to
/// schedule future events, and to the shared state.
pub trait Component {
    /// Type of events processed by the component.
    type Event: fmt::Debug + 'static;

    /// Processes `event`. `self_id` is the ID under which this component was registered.
    fn process_event(
        &mut self,
        self_id: ComponentId<Self::Event>,
        event: &Self::Event,
        scheduler: &mut Scheduler,
        state: &mut State,
    );
}

/// Type-erased component, which recovers the event type from an [`EventEntry`].
trait ProcessEventEntry {
    fn process_event_entry(
        &mut self,
        entry: &EventEntry,
        scheduler: &mut Scheduler,
        state: &mut State,
    );
}

impl<C: Component> ProcessEventEntry for C {
    fn process_event_entry(
        &mut self,
        entry: &EventEntry,
        scheduler: &mut Scheduler,
        state: &mut State,
    ) {
        let entry = entry
            .downcast::<C::Event>()
            .expect("event type must match the component it was scheduled for");
        log::trace!("[{:?}] [event] {:?}", entry.time, entry.event);
        self.process_event(entry.component_id, entry.event, scheduler, state);
    }
}

/// Container holding all registered components.
pub struct Components {
    components: Vec<Box<dyn ProcessEventEntry>>,
    state_hash: u64,
}

impl Components {
    /// Creates an empty container bound to `state`.
    #[must_use]
    pub fn new(state: &State) -> Self {
        Self {
            components: Vec::new(),
            state_hash: state.state_hash,
        }
    }

    /// Registers a new component and returns its ID.
    #[must_use]
    pub fn add_component<C: Component + 'static>(&mut self, component: C) -> ComponentId<C::Event> {
        let id = self.components.len();
        self.components.push(Box::new(component));
        ComponentId::new(id, self.state_hash)
    }

    /// Returns the number of registered components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Checks if there are no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Passes the event to the component it was scheduled for.
    ///
    /// # Panics
    ///
    /// Panics if the entry was scheduled with a component ID issued by a different container.
    pub fn process(&mut self, entry: &EventEntry, scheduler: &mut Scheduler, state: &mut State) {
        let component = self
            .components
            .get_mut(entry.component_idx())
            .expect("Invalid component ID");
        component.process_event_entry(entry, scheduler, state);
    }
}
