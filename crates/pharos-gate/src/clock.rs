//! Time source abstraction
//!
//! Every wait in the gate is measured against a monotonic clock read through
//! this trait. Production code uses [`SystemClock`]; tests drive
//! [`crate::mocks::ManualClock`] by hand.

use std::time::Instant;

/// Monotonic time source consulted on every signal and timer fire.
pub trait Clock: Send + Sync {
    /// Current monotonic time.
    fn now(&self) -> Instant;
}

/// Clock backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_never_goes_backwards() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
