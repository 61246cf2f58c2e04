//! Lamport logical clock
//!
//! A process-wide counter implementing Lamport's happened-before rule.
//! The aggregation server advances it once per request it handles, and
//! producers stamp their own clock value into each record they send.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonically increasing logical clock, safe to share across tasks.
#[derive(Debug, Default)]
pub struct LamportClock {
    value: AtomicU64,
}

impl LamportClock {
    /// Create a clock starting at zero
    pub fn new() -> Self {
        Self::with_value(0)
    }

    /// Create a clock starting at the given value
    pub fn with_value(value: u64) -> Self {
        Self {
            value: AtomicU64::new(value),
        }
    }

    /// Advance the clock for a local event, returning the new value
    pub fn tick(&self) -> u64 {
        self.advance(|current| current.saturating_add(1))
    }

    /// Merge a received timestamp: `max(current, received) + 1`
    pub fn update(&self, received: u64) -> u64 {
        self.advance(|current| current.max(received).saturating_add(1))
    }

    /// Read the current value without advancing
    pub fn read(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }

    /// Force the clock to a value (test fixtures and maintenance only)
    pub fn reset(&self, value: u64) {
        self.value.store(value, Ordering::SeqCst);
    }

    fn advance(&self, step: impl Fn(u64) -> u64) -> u64 {
        let previous = self
            .value
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| Some(step(current)))
            .unwrap_or_else(|current| current);
        step(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_initial_value_is_zero() {
        let clock = LamportClock::new();
        assert_eq!(clock.read(), 0);
    }

    #[test]
    fn test_tick_increments_by_one() {
        let clock = LamportClock::with_value(41);
        assert_eq!(clock.tick(), 42);
        assert_eq!(clock.read(), 42);
    }

    #[test]
    fn test_update_with_higher_value() {
        let clock = LamportClock::new();
        clock.update(5);
        assert_eq!(clock.read(), 6);
    }

    #[test]
    fn test_update_with_lower_value() {
        let clock = LamportClock::new();
        clock.tick();
        clock.update(0);
        // max(1, 0) + 1
        assert_eq!(clock.read(), 2);
    }

    #[test]
    fn test_update_then_tick() {
        let clock = LamportClock::new();
        assert_eq!(clock.update(5), 6);
        assert_eq!(clock.tick(), 7);
    }

    #[test]
    fn test_reset() {
        let clock = LamportClock::with_value(100);
        clock.reset(3);
        assert_eq!(clock.read(), 3);
    }

    #[test]
    fn test_saturates_instead_of_wrapping() {
        let clock = LamportClock::with_value(u64::MAX);
        clock.tick();
        clock.update(u64::MAX);
        assert_eq!(clock.read(), u64::MAX);
    }

    #[test]
    fn test_never_decreases() {
        let clock = LamportClock::new();
        let mut last = clock.read();
        for received in [10, 3, 0, 25, 24, 7] {
            clock.update(received);
            assert!(clock.read() > last.max(received));
            last = clock.read();
            clock.tick();
            assert_eq!(clock.read(), last + 1);
            last = clock.read();
        }
    }

    #[test]
    fn test_concurrent_ticks_are_not_lost() {
        let clock = Arc::new(LamportClock::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let clock = Arc::clone(&clock);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        clock.tick();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(clock.read(), 8000);
    }

    #[test]
    fn test_concurrent_updates_dominate_all_received() {
        let clock = Arc::new(LamportClock::new());
        let handles: Vec<_> = (0..4u64)
            .map(|worker| {
                let clock = Arc::clone(&clock);
                thread::spawn(move || {
                    for i in 0..500u64 {
                        clock.update(worker * 1000 + i);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        // Highest received value was 3499
        assert!(clock.read() >= 3500);
    }
}
