use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use rand::RngCore;

use crate::Queue;

/// Typed handle to a value stored in a [`State`].
///
/// Keys are only issued by [`State::insert`], and each key remembers which state issued it.
/// Using a key with another state is a bug and panics:
///
/// ```should_panic
/// # use evsim::State;
/// let mut issuer = State::default();
/// let other = State::default();
/// let key = issuer.insert(7_u8);
/// other.get(key);
/// ```
///
/// The type parameter ties the key to the type of the stored value, so the value cannot be read
/// back as anything else:
///
/// ```compile_fail
/// # use evsim::State;
/// let mut state = State::default();
/// let key = state.insert(7_u8);
/// let _: Option<&String> = state.get(key);
/// ```
pub struct Key<V> {
    slot: usize,
    state_hash: u64,
    _marker: PhantomData<fn() -> V>,
}

impl<V> Clone for Key<V> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<V> Copy for Key<V> {}

impl<V> PartialEq for Key<V> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot && self.state_hash == other.state_hash
    }
}
impl<V> Eq for Key<V> {}

impl<V> fmt::Debug for Key<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.slot)
    }
}

/// Typed handle to a [`Queue`] stored in a [`State`].
///
/// Queues live in the same store as other values but cannot be removed.
pub struct QueueId<V>(Key<Queue<V>>);

impl<V> Clone for QueueId<V> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<V> Copy for QueueId<V> {}

impl<V> PartialEq for QueueId<V> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl<V> Eq for QueueId<V> {}

impl<V> fmt::Debug for QueueId<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueueId({})", self.0.slot)
    }
}

/// Values shared between components: counters, registries, queues.
///
/// Each value occupies its own slot; slots are never reused within a state.
pub struct State {
    slots: Vec<Option<Box<dyn Any>>>,
    pub(crate) state_hash: u64,
}

impl Default for State {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            state_hash: rand::thread_rng().next_u64(),
        }
    }
}

impl State {
    fn check<V>(&self, key: Key<V>) {
        assert_eq!(
            key.state_hash, self.state_hash,
            "key {:?} was issued by a different state",
            key
        );
    }

    /// Stores `value` and returns its key.
    #[must_use = "Discarding key results in leaking inserted value"]
    pub fn insert<V: 'static>(&mut self, value: V) -> Key<V> {
        self.slots.push(Some(Box::new(value)));
        Key {
            slot: self.slots.len() - 1,
            state_hash: self.state_hash,
            _marker: PhantomData,
        }
    }

    /// Takes the value out of the state. Returns `None` if it was already removed.
    pub fn remove<V: 'static>(&mut self, key: Key<V>) -> Option<V> {
        self.check(key);
        let value = self.slots.get_mut(key.slot)?.take()?;
        value.downcast::<V>().ok().map(|value| *value)
    }

    /// Shared access to a stored value.
    #[must_use]
    pub fn get<V: 'static>(&self, key: Key<V>) -> Option<&V> {
        self.check(key);
        self.slots.get(key.slot)?.as_ref()?.downcast_ref()
    }

    /// Exclusive access to a stored value.
    #[must_use]
    pub fn get_mut<V: 'static>(&mut self, key: Key<V>) -> Option<&mut V> {
        self.check(key);
        self.slots.get_mut(key.slot)?.as_mut()?.downcast_mut()
    }

    /// Adds an empty queue without a size limit.
    pub fn new_queue<V: 'static>(&mut self) -> QueueId<V> {
        QueueId(self.insert(Queue::unbounded()))
    }

    /// Adds an empty queue holding at most `capacity` elements.
    pub fn new_bounded_queue<V: 'static>(&mut self, capacity: usize) -> QueueId<V> {
        QueueId(self.insert(Queue::bounded(capacity)))
    }

    fn queue<V: 'static>(&self, queue: QueueId<V>) -> &Queue<V> {
        self.get(queue.0).expect("queues are never removed")
    }

    fn queue_mut<V: 'static>(&mut self, queue: QueueId<V>) -> &mut Queue<V> {
        self.get_mut(queue.0).expect("queues are never removed")
    }

    /// Appends `value` to `queue`.
    ///
    /// # Errors
    ///
    /// Returns `value` back if the queue is full.
    pub fn send<V: 'static>(&mut self, queue: QueueId<V>, value: V) -> Result<(), V> {
        self.queue_mut(queue).push_back(value)
    }

    /// Takes the oldest value out of `queue`.
    pub fn recv<V: 'static>(&mut self, queue: QueueId<V>) -> Option<V> {
        self.queue_mut(queue).pop_front()
    }

    /// The oldest value in `queue`, left in place.
    #[must_use]
    pub fn peek<V: 'static>(&self, queue: QueueId<V>) -> Option<&V> {
        self.queue(queue).front()
    }

    /// Number of values waiting in `queue`.
    #[must_use]
    pub fn len<V: 'static>(&self, queue: QueueId<V>) -> usize {
        self.queue(queue).len()
    }

    /// Checks if `queue` would reject the next value.
    #[must_use]
    pub fn is_full<V: 'static>(&self, queue: QueueId<V>) -> bool {
        self.queue(queue).is_full()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_values() {
        let mut state = State::default();
        let number = state.insert(1_u32);
        let names = state.insert(vec![String::from("ap")]);

        assert_eq!(state.get(number), Some(&1));
        *state.get_mut(number).unwrap() += 1;
        state.get_mut(names).unwrap().push(String::from("sta"));

        assert_eq!(state.remove(number), Some(2));
        assert_eq!(state.remove(number), None);
        assert_eq!(state.get(number), None);
        assert_eq!(
            state.get(names).map(Vec::len),
            Some(2),
            "removing one value leaves others in place"
        );
    }

    #[test]
    #[should_panic(expected = "different state")]
    fn test_foreign_key() {
        let mut issuer = State::default();
        let other = State::default();
        let key = issuer.insert(1);
        let _ = other.get(key);
    }

    #[test]
    fn test_bounded_queue() {
        let mut state = State::default();
        let queue = state.new_bounded_queue(2);
        assert_eq!(state.peek(queue), None);

        assert_eq!(state.send(queue, 'a'), Ok(()));
        assert_eq!(state.send(queue, 'b'), Ok(()));
        assert!(state.is_full(queue));
        assert_eq!(state.send(queue, 'c'), Err('c'));

        assert_eq!(state.peek(queue), Some(&'a'));
        assert_eq!(state.recv(queue), Some('a'));
        assert_eq!(state.recv(queue), Some('b'));
        assert_eq!(state.recv(queue), None);
    }

    #[test]
    fn test_queues_are_independent() {
        let mut state = State::default();
        let first = state.new_queue::<u32>();
        let second = state.new_queue::<u32>();
        for n in 0..1000 {
            assert!(state.send(first, n).is_ok());
        }
        assert!(!state.is_full(first));
        assert_eq!(state.len(first), 1000);
        assert_eq!(state.len(second), 0);
        assert_ne!(first, second);
    }
}
