use std::any::{Any, TypeId};
use std::cell::Cell;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::{Clock, ComponentId};

/// Returned when an event cannot be put on the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ScheduleError {
    /// The delay is negative, not a number, or too large to be represented.
    #[error("invalid schedule: delay of {delay}s is not a non-negative finite time")]
    InvalidSchedule {
        /// The rejected delay in seconds.
        delay: f64,
    },
}

/// Entry type stored in the scheduler, including the event value, component ID, and the time when
/// it is supposed to occur.
///
/// Entries are ordered by time and then by sequence number, so that the entry scheduled first
/// among those with equal times compares as the greatest and is popped first from the max-heap.
#[derive(Debug)]
pub struct EventEntry {
    time: Reverse<Duration>,
    sequence: Reverse<u64>,
    component: usize,
    inner: Box<dyn Any>,
    event_type: TypeId,
    state_hash: u64,
}

impl EventEntry {
    /// Views the entry as one carrying an event of type `E`, or `None` if the event has another
    /// type.
    #[must_use]
    pub fn downcast<E: fmt::Debug + 'static>(&self) -> Option<EventEntryTyped<'_, E>> {
        if self.event_type != TypeId::of::<E>() {
            return None;
        }
        let event = self.inner.downcast_ref::<E>()?;
        Some(EventEntryTyped {
            time: self.time.0,
            sequence: self.sequence.0,
            component_id: ComponentId::new(self.component, self.state_hash),
            component_idx: self.component,
            event,
        })
    }

    /// The time at which the event occurs.
    #[must_use]
    pub fn time(&self) -> Duration {
        self.time.0
    }

    /// Index of the component that handles the event.
    #[must_use]
    pub fn component_idx(&self) -> usize {
        self.component
    }

    fn key(&self) -> (Reverse<Duration>, Reverse<u64>) {
        (self.time, self.sequence)
    }
}

impl PartialEq for EventEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
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
        self.key().cmp(&other.key())
    }
}

/// Typed view of an [`EventEntry`], obtained with [`EventEntry::downcast`].
#[derive(Debug)]
pub struct EventEntryTyped<'e, E: fmt::Debug> {
    /// Time of the event.
    pub time: Duration,
    /// Tie-breaking sequence number, increasing with every scheduled event.
    pub sequence: u64,
    /// The component handling the event.
    pub component_id: ComponentId<E>,
    /// Raw index of the component.
    pub component_idx: usize,
    /// The event value.
    pub event: &'e E,
}

/// Identifies a scheduled event so that it can be cancelled before it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventHandle {
    sequence: u64,
    time: Duration,
}

impl EventHandle {
    /// The time at which the event was scheduled to occur.
    #[must_use]
    pub fn time(&self) -> Duration {
        self.time
    }
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

/// Scheduler is used to keep the current time and information about the upcoming events.
pub struct Scheduler {
    events: BinaryHeap<EventEntry>,
    pending: HashSet<u64>,
    next_sequence: u64,
    clock: Clock,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            events: BinaryHeap::new(),
            pending: HashSet::new(),
            next_sequence: 0,
            clock: Rc::new(Cell::new(Duration::default())),
        }
    }
}

impl Scheduler {
    /// Schedules `event` to be executed for `component` at `self.time() + delay`.
    pub fn schedule<E: fmt::Debug + 'static>(
        &mut self,
        delay: Duration,
        component: ComponentId<E>,
        event: E,
    ) -> EventHandle {
        let time = self.time() + delay;
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.pending.insert(sequence);
        self.events.push(EventEntry {
            time: Reverse(time),
            sequence: Reverse(sequence),
            component: component.id,
            inner: Box::new(event),
            event_type: TypeId::of::<E>(),
            state_hash: component.state_hash,
        });
        EventHandle { sequence, time }
    }

    /// Schedules `event` to be executed for `component` after `delay` seconds.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidSchedule`] if `delay` is negative, NaN, or does not fit
    /// in a [`Duration`]. Nothing is scheduled in that case.
    pub fn schedule_secs<E: fmt::Debug + 'static>(
        &mut self,
        delay: f64,
        component: ComponentId<E>,
        event: E,
    ) -> Result<EventHandle, ScheduleError> {
        let invalid = ScheduleError::InvalidSchedule { delay };
        let delay = Duration::try_from_secs_f64(delay).map_err(|_| invalid)?;
        self.time().checked_add(delay).ok_or(invalid)?;
        Ok(self.schedule(delay, component, event))
    }

    /// Schedules `event` to be executed for `component` at `self.time()`.
    pub fn schedule_immediately<E: fmt::Debug + 'static>(
        &mut self,
        component: ComponentId<E>,
        event: E,
    ) -> EventHandle {
        self.schedule(Duration::default(), component, event)
    }

    /// Cancels a scheduled event. Returns `true` if the event was still pending.
    ///
    /// Cancelling an event that has already been processed, discarded, or cancelled is a no-op.
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        self.pending.remove(&handle.sequence)
    }

    /// Checks if the event identified by `handle` is still waiting to be processed.
    #[must_use]
    pub fn is_pending(&self, handle: EventHandle) -> bool {
        self.pending.contains(&handle.sequence)
    }

    /// Returns the current simulation time.
    #[must_use]
    pub fn time(&self) -> Duration {
        self.clock.get()
    }

    /// Alias of [`Scheduler::time`].
    #[must_use]
    pub fn now(&self) -> Duration {
        self.time()
    }

    /// Returns a structure with immutable access to the simulation time.
    #[must_use]
    pub fn clock(&self) -> ClockRef {
        ClockRef {
            clock: Rc::clone(&self.clock),
        }
    }

    /// Returns the number of pending (scheduled and not cancelled) events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Answers whether there are no pending events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Removes and returns the next scheduled event or `None` if none are left.
    pub fn pop(&mut self) -> Option<EventEntry> {
        self.pop_before(Duration::MAX)
    }

    /// Removes and returns the next scheduled event if it occurs strictly before `deadline`.
    /// Cancelled events are skipped. The clock is moved to the time of the returned event.
    pub fn pop_before(&mut self, deadline: Duration) -> Option<EventEntry> {
        loop {
            if self.events.peek()?.time() >= deadline {
                return None;
            }
            let entry = self.events.pop()?;
            if self.pending.remove(&entry.sequence.0) {
                self.clock.replace(entry.time());
                return Some(entry);
            }
        }
    }

    /// Drops all remaining events, and moves the clock forward to `time` unless it is
    /// already past it.
    pub fn discard_until(&mut self, time: Duration) {
        let discarded = self.pending.len();
        self.events.clear();
        self.pending.clear();
        if self.time() < time {
            self.clock.replace(time);
        }
        if discarded > 0 {
            log::debug!("[{:?}] Discarded {} pending events", time, discarded);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn make_entry(secs: u64, sequence: u64) -> EventEntry {
        EventEntry {
            time: Reverse(Duration::from_secs(secs)),
            sequence: Reverse(sequence),
            component: 2,
            event_type: TypeId::of::<String>(),
            state_hash: 17,
            inner: Box::new(String::from("inner")),
        }
    }

    #[test]
    fn test_event_entry_downcast() {
        let entry = make_entry(1, 0);
        assert!(entry.downcast::<String>().is_some());
        assert!(entry.downcast::<i32>().is_none());
    }

    #[test]
    fn test_event_entry_cmp() {
        assert_eq!(make_entry(1, 0), make_entry(1, 0));
        assert_eq!(make_entry(0, 0).cmp(&make_entry(1, 0)), Ordering::Greater);
        assert_eq!(make_entry(2, 0).cmp(&make_entry(1, 0)), Ordering::Less);
        assert_eq!(make_entry(1, 0).cmp(&make_entry(1, 1)), Ordering::Greater);
        assert_eq!(make_entry(1, 5).cmp(&make_entry(2, 0)), Ordering::Greater);
    }

    #[derive(Debug, Clone, Eq, PartialEq)]
    struct Beacon(u32);
    #[derive(Debug, Clone, Eq, PartialEq)]
    struct Data;

    #[test]
    fn test_scheduler() {
        let mut scheduler = Scheduler::default();
        assert!(scheduler.is_empty());
        assert_eq!(scheduler.now(), Duration::default());

        let ap = ComponentId::<Beacon>::new(0, 17);
        let sta = ComponentId::<Data>::new(1, 17);
        scheduler.schedule(Duration::from_millis(300), ap, Beacon(3));
        scheduler.schedule(Duration::from_millis(100), ap, Beacon(1));
        scheduler.schedule(Duration::from_millis(200), sta, Data);
        assert_eq!(scheduler.len(), 3);

        let first = scheduler.pop().unwrap();
        let first = first.downcast::<Beacon>().unwrap();
        assert_eq!(first.event, &Beacon(1));
        assert_eq!(first.component_id, ap);
        assert_eq!(first.component_idx, 0);
        assert_eq!(scheduler.time(), Duration::from_millis(100));

        // Scheduling is relative to the current time.
        scheduler.schedule(Duration::from_millis(50), sta, Data);

        let second = scheduler.pop().unwrap();
        assert!(second.downcast::<Beacon>().is_none());
        assert_eq!(second.time(), Duration::from_millis(150));
        assert_eq!(second.component_idx(), 1);

        let times: Vec<_> = std::iter::from_fn(|| scheduler.pop().map(|e| e.time())).collect();
        assert_eq!(
            times,
            vec![Duration::from_millis(200), Duration::from_millis(300)]
        );
        assert_eq!(scheduler.time(), Duration::from_millis(300));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_equal_times_are_fifo() {
        let mut scheduler = Scheduler::default();
        let component = ComponentId::<&str>::new(0, 17);
        for name in &["A", "B", "C", "D"] {
            scheduler.schedule(Duration::from_millis(5), component, *name);
        }
        let order: Vec<&str> = std::iter::from_fn(|| scheduler.pop())
            .map(|e| *e.downcast::<&str>().unwrap().event)
            .collect();
        assert_eq!(order, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_negative_delay_rejected() {
        let mut scheduler = Scheduler::default();
        let component = ComponentId::<Data>::new(0, 17);
        scheduler.schedule(Duration::from_secs(1), component, Data);
        assert_eq!(
            scheduler.schedule_secs(-1.0, component, Data),
            Err(ScheduleError::InvalidSchedule { delay: -1.0 })
        );
        assert!(scheduler.schedule_secs(f64::NAN, component, Data).is_err());
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.events.len(), 1);
        let handle = scheduler.schedule_secs(0.5, component, Data).unwrap();
        assert_eq!(handle.time(), Duration::from_millis(500));
    }

    #[test]
    fn test_delay_past_end_of_time_rejected() {
        let mut scheduler = Scheduler::default();
        let component = ComponentId::<Data>::new(0, 17);
        scheduler.schedule(Duration::from_secs(u64::MAX / 2), component, Data);
        scheduler.pop();
        let delay = 1e19;
        assert!(Duration::try_from_secs_f64(delay).is_ok());
        assert_eq!(
            scheduler.schedule_secs(delay, component, Data),
            Err(ScheduleError::InvalidSchedule { delay })
        );
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_cancel() {
        let mut scheduler = Scheduler::default();
        let component = ComponentId::<u32>::new(0, 17);
        let first = scheduler.schedule(Duration::from_secs(1), component, 1);
        let second = scheduler.schedule(Duration::from_secs(2), component, 2);
        assert!(scheduler.cancel(first));
        assert!(!scheduler.cancel(first));
        assert!(!scheduler.is_pending(first));
        assert_eq!(scheduler.len(), 1);

        let entry = scheduler.pop().unwrap();
        assert_eq!(entry.downcast::<u32>().unwrap().event, &2);
        assert_eq!(scheduler.time(), Duration::from_secs(2));
        assert!(!scheduler.cancel(second));
        assert!(scheduler.pop().is_none());
    }

    #[test]
    fn test_pop_before_skips_cancelled_head() {
        let mut scheduler = Scheduler::default();
        let component = ComponentId::<u32>::new(0, 17);
        let head = scheduler.schedule(Duration::from_secs(1), component, 1);
        scheduler.schedule(Duration::from_secs(3), component, 3);
        scheduler.cancel(head);
        assert!(scheduler.pop_before(Duration::from_secs(2)).is_none());
        assert_eq!(scheduler.time(), Duration::default());
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_discard_until() {
        let mut scheduler = Scheduler::default();
        let component = ComponentId::<u32>::new(0, 17);
        let handle = scheduler.schedule(Duration::from_secs(5), component, 1);
        scheduler.discard_until(Duration::from_secs(3));
        assert!(scheduler.is_empty());
        assert!(!scheduler.cancel(handle));
        assert_eq!(scheduler.time(), Duration::from_secs(3));
        assert!(scheduler.pop().is_none());
    }

    #[test]
    fn test_clock_ref() {
        let mut scheduler = Scheduler::default();
        let clock = scheduler.clock();
        let component = ComponentId::<u32>::new(0, 17);
        scheduler.schedule(Duration::from_micros(20), component, 1);
        assert_eq!(clock.time(), Duration::default());
        scheduler.pop();
        assert_eq!(clock.time(), Duration::from_micros(20));
    }
}
