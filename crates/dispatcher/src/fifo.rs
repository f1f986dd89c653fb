//! FIFO buffer with deferred compaction
//!
//! Dequeue empties a slot in place and advances a head index instead of
//! shifting the remaining items. The dead prefix is dropped in one pass once
//! the slot vector is both large and mostly dead, so memory stays bounded
//! without paying O(n) on every dequeue.

use std::fmt;

/// Slot count above which compaction is considered
const COMPACT_MIN_SLOTS: usize = 50;

/// Dead-slot share above which compaction runs
const COMPACT_DEAD_RATIO: f64 = 0.25;

/// Unbounded, strictly ordered queue
pub struct FifoBuffer<T> {
    slots: Vec<Option<T>>,
    head: usize,
}

impl<T> fmt::Debug for FifoBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FifoBuffer")
            .field("len", &self.len())
            .field("slots", &self.slots.len())
            .field("head", &self.head)
            .finish()
    }
}

impl<T> Default for FifoBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FifoBuffer<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            head: 0,
        }
    }

    /// Append an item (amortized O(1))
    #[inline]
    pub fn enqueue(&mut self, item: T) {
        self.slots.push(Some(item));
    }

    /// Remove and return the oldest remaining item
    pub fn dequeue(&mut self) -> Option<T> {
        let item = self.slots.get_mut(self.head)?.take();
        self.head += 1;

        if self.head == self.slots.len() {
            // Fully drained: reuse the allocation from the start.
            self.slots.clear();
            self.head = 0;
        } else if self.should_compact() {
            self.slots.drain(..self.head);
            self.head = 0;
        }

        item
    }

    /// Oldest remaining item, without removing it
    pub fn peek(&self) -> Option<&T> {
        self.slots.get(self.head).and_then(Option::as_ref)
    }

    /// Number of live items
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len() - self.head
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of physical slots, live and dead
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn should_compact(&self) -> bool {
        self.slots.len() > COMPACT_MIN_SLOTS
            && self.head as f64 > self.slots.len() as f64 * COMPACT_DEAD_RATIO
    }
}

impl<T> Iterator for FifoBuffer<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.dequeue()
    }
}
