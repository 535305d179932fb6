//! A counting semaphore gating concurrent connections, built on a condition
//! variable over a mutex-protected counter rather than `tokio::sync::Semaphore`,
//! so that `max == 0` can be given the "unlimited" meaning the spec calls for
//! instead of `tokio::sync::Semaphore`'s panic on a zero permit count.

use std::sync::{Condvar, Mutex};

pub struct ConnectionSemaphore {
    max: usize,
    count: Mutex<usize>,
    available: Condvar,
}

impl ConnectionSemaphore {
    /// `max == 0` means unlimited: `acquire` never blocks.
    pub fn new(max: usize) -> Self {
        Self {
            max,
            count: Mutex::new(0),
            available: Condvar::new(),
        }
    }

    /// Blocks the calling thread until a slot is free, then takes it.
    pub fn acquire(&self) {
        if self.max == 0 {
            return;
        }
        let mut count = self.count.lock().unwrap();
        while *count >= self.max {
            count = self.available.wait(count).unwrap();
        }
        *count += 1;
    }

    /// Releases a previously-acquired slot.
    pub fn release(&self) {
        if self.max == 0 {
            return;
        }
        let mut count = self.count.lock().unwrap();
        *count = count.saturating_sub(1);
        self.available.notify_one();
    }

    pub fn in_use(&self) -> usize {
        *self.count.lock().unwrap()
    }
}
