//! Bounded FIFO history of recorded samples.

use std::collections::VecDeque;

/// Ordered buffer holding at most `capacity` items. Appending to a full
/// buffer evicts the oldest entry, so the newest `capacity` items always
/// remain in arrival order.
#[derive(Debug, Clone)]
pub struct HistoryBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> HistoryBuffer<T> {
    /// Default capacity for both telemetry histories.
    pub const DEFAULT_CAPACITY: usize = 100;

    /// A zero capacity is bumped to 1.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }
}

impl<T: Clone> HistoryBuffer<T> {
    /// The last `min(limit, len)` items, oldest first. `None` returns everything.
    pub fn list(&self, limit: Option<usize>) -> Vec<T> {
        let n = limit.map_or(self.items.len(), |l| l.min(self.items.len()));
        self.items.iter().skip(self.items.len() - n).cloned().collect()
    }
}

impl<T> Default for HistoryBuffer<T> {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}
