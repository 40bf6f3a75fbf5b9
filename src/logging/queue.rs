//! Unbounded thread-safe FIFO between log producers and the worker
//!
//! Producers never block beyond the brief lock around a push. The consumer
//! can block until an item arrives, optionally with a timeout.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Unbounded multi-producer FIFO queue
#[derive(Debug)]
pub struct MessageQueue<T> {
    items: Mutex<VecDeque<T>>,
    available: Condvar,
}

impl<T> MessageQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    /// Push an item and wake one waiting consumer
    pub fn enqueue(&self, item: T) {
        self.lock().push_back(item);
        self.available.notify_one();
    }

    /// Remove the oldest item, blocking until one is available
    pub fn dequeue(&self) -> T {
        let mut items = self.lock();
        loop {
            if let Some(item) = items.pop_front() {
                return item;
            }
            items = self
                .available
                .wait(items)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Remove the oldest item, waiting at most `timeout`
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut items = self.lock();
        loop {
            if let Some(item) = items.pop_front() {
                return Some(item);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            items = match self.available.wait_timeout(items, remaining) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Remove the oldest item without waiting
    pub fn try_dequeue(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Drop every pending item
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Snapshot of the number of pending items
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panicking producer must not take logging down with it
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T> Default for MessageQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
