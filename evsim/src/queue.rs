use std::collections::VecDeque;

/// FIFO queue with an optional limit on the number of elements.
///
/// Pushing into a full queue fails and hands the element back to the caller, who decides what
/// a drop means.
///
/// ```
/// # use evsim::Queue;
/// let mut queue = Queue::bounded(1);
/// assert_eq!(queue.push_back('a'), Ok(()));
/// assert_eq!(queue.push_back('b'), Err('b'));
/// assert_eq!(queue.front(), Some(&'a'));
/// assert!(queue.is_full());
/// ```
#[derive(Debug, Clone)]
pub struct Queue<T> {
    elements: VecDeque<T>,
    limit: Option<usize>,
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<T> Queue<T> {
    /// Creates a queue that never rejects elements.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            elements: VecDeque::new(),
            limit: None,
        }
    }

    /// Creates a queue holding at most `limit` elements.
    #[must_use]
    pub fn bounded(limit: usize) -> Self {
        Self {
            elements: VecDeque::with_capacity(limit.min(1024)),
            limit: Some(limit),
        }
    }

    /// Appends `value` at the back.
    ///
    /// # Errors
    ///
    /// Returns `value` back if the queue is full.
    pub fn push_back(&mut self, value: T) -> Result<(), T> {
        if self.is_full() {
            return Err(value);
        }
        self.elements.push_back(value);
        Ok(())
    }

    /// Removes the oldest element.
    pub fn pop_front(&mut self) -> Option<T> {
        self.elements.pop_front()
    }

    /// The oldest element, if any.
    #[must_use]
    pub fn front(&self) -> Option<&T> {
        self.elements.front()
    }

    /// Number of queued elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Checks if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Checks if the next push would be rejected.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.limit.map_or(false, |limit| self.elements.len() >= limit)
    }

    /// Maximum number of elements, or `None` for an unbounded queue.
    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_zero_limit_rejects_everything() {
        let mut queue = Queue::bounded(0);
        assert!(queue.is_full());
        assert_eq!(queue.push_back(1), Err(1));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_order_after_rejection() {
        let mut queue = Queue::bounded(2);
        for n in 0..4 {
            let _ = queue.push_back(n);
        }
        assert_eq!(queue.pop_front(), Some(0));
        assert_eq!(queue.push_back(4), Ok(()));
        assert_eq!(queue.pop_front(), Some(1));
        assert_eq!(queue.pop_front(), Some(4));
        assert_eq!(queue.pop_front(), None);
        assert_eq!(queue.limit(), Some(2));
        assert_eq!(Queue::<u8>::default().limit(), None);
    }
}
