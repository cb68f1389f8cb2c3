//! Sleep abstraction for polling external processes.
//!
//! `ProcessRunner` polls a running child between timeout checks; tests swap
//! in `MockSleeper` so the poll loop does not actually wait.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Trait for sleeping between polls.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Real sleeper that uses `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealSleeper;

impl Sleeper for RealSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Mock sleeper that returns immediately and counts calls.
#[derive(Debug, Default)]
pub struct MockSleeper {
    calls: AtomicUsize,
}

impl MockSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Sleeper for MockSleeper {
    fn sleep(&self, _duration: Duration) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}
