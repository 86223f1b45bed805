//! Shared FIFO pool
//!
//! Mutex-guarded queue used for both the identifier pool (fetcher drains,
//! orchestrator requeues) and the result buffer awaiting persistence.

use rand::seq::SliceRandom;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Thread-safe FIFO queue with random reordering
#[derive(Debug, Default)]
pub struct Pool<T> {
    values: Mutex<VecDeque<T>>,
}

impl<T> Pool<T> {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(VecDeque::new()),
        }
    }

    /// Create a pool seeded with `items` in order
    pub fn from_items(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            values: Mutex::new(items.into_iter().collect()),
        }
    }

    /// Append items at the tail
    pub fn put(&self, items: impl IntoIterator<Item = T>) {
        self.lock().extend(items);
    }

    /// Remove up to `count` items from the head, in insertion order
    ///
    /// Never waits for more items; returns fewer when the pool is smaller.
    pub fn take(&self, count: usize) -> Vec<T> {
        let mut values = self.lock();
        let end = count.min(values.len());
        values.drain(..end).collect()
    }

    /// Remove every item
    pub fn drain(&self) -> Vec<T> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Uniformly shuffle the pool in place
    pub fn shuffle(&self) {
        let mut values = self.lock();
        values.make_contiguous().shuffle(&mut rand::thread_rng());
    }

    /// Clone of the current contents, head first
    pub fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.lock().iter().cloned().collect()
    }

    // A panic while holding the lock cannot leave the deque half-mutated
    // (every operation is a single std call), so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
