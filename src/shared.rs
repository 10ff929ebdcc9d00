//! Shared-state primitives for the worker threads.
//!
//! Workers publish into single-slot `Latest` cells (newest value wins, no
//! queueing) and poll a cooperative `StopFlag` once per loop iteration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Single-slot "latest value" cell.
///
/// One writer replaces the slot atomically, readers clone the newest
/// snapshot. The generation counter lets a reader detect that a new value
/// arrived without consuming anything.
pub struct Latest<T> {
    slot: Mutex<(Option<T>, u64)>,
}

impl<T: Clone> Latest<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new((None, 0)),
        }
    }

    /// Replace the slot with a new value.
    pub fn publish(&self, value: T) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.0 = Some(value);
        slot.1 += 1;
    }

    /// Latest value and its generation (0 = nothing published yet).
    pub fn peek(&self) -> (Option<T>, u64) {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        (slot.0.clone(), slot.1)
    }
}

impl<T: Clone> Default for Latest<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cooperative shutdown flag shared by all worker loops.
#[derive(Clone)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep for `dur`, waking early if the flag is raised.
    /// Returns true if the flag was raised during the wait.
    pub fn sleep(&self, dur: Duration) -> bool {
        let deadline = Instant::now() + dur;
        loop {
            if self.is_raised() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep((deadline - now).min(Duration::from_millis(100)));
        }
    }
}

impl Default for StopFlag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_starts_empty() {
        let cell: Latest<u32> = Latest::new();
        assert_eq!(cell.peek(), (None, 0));
    }

    #[test]
    fn latest_keeps_newest_and_bumps_generation() {
        let cell = Latest::new();
        cell.publish(1);
        cell.publish(2);
        let (value, generation) = cell.peek();
        assert_eq!(value, Some(2));
        assert_eq!(generation, 2);
        // Peeking does not consume.
        assert_eq!(cell.peek(), (Some(2), 2));
    }

    #[test]
    fn stop_flag_interrupts_sleep() {
        let stop = StopFlag::new();
        stop.raise();
        let start = Instant::now();
        assert!(stop.sleep(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
