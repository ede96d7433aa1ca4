//! Nullable clock: deterministic time for testing.

use std::sync::atomic::{AtomicU32, Ordering};
use windex_types::Timestamp;

/// A deterministic clock for testing.
///
/// Time only advances when you tell it to.
pub struct NullClock {
    current: AtomicU32,
}

impl NullClock {
    pub fn new(initial_secs: u32) -> Self {
        Self {
            current: AtomicU32::new(initial_secs),
        }
    }

    /// Get the current time.
    pub fn now(&self) -> Timestamp {
        Timestamp::new(self.current.load(Ordering::SeqCst))
    }

    /// Advance time by a number of seconds.
    pub fn advance(&self, secs: u32) {
        self.current.fetch_add(secs, Ordering::SeqCst);
    }

    /// Set the time to a specific value.
    pub fn set(&self, secs: u32) {
        self.current.store(secs, Ordering::SeqCst);
    }
}
