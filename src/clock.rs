use std::sync::RwLock;
use std::time::{Duration, SystemTime};

/// A simulated time source: a fixed base plus an offset that only grows when
/// `advance` is called. Wall-clock passage never moves it, which keeps TTL
/// expiration fully deterministic in tests.
pub struct Clock {
    base: SystemTime,
    offset: RwLock<Duration>,
}

impl Clock {
    /// Creates a clock seeded with the provided base time.
    pub fn new(base: SystemTime) -> Clock {
        Clock {
            base,
            offset: RwLock::new(Duration::ZERO),
        }
    }

    /// Returns the current simulated time (`base + offset`).
    pub fn now(&self) -> SystemTime {
        self.base + *self.offset.read().unwrap()
    }

    /// Moves the simulated clock forward and returns the updated time. Safe
    /// to call concurrently with `now` and with itself.
    pub fn advance(&self, d: Duration) -> SystemTime {
        let mut offset = self.offset.write().unwrap();
        *offset += d;
        self.base + *offset
    }

    /// Returns the immutable base time the clock was seeded with.
    pub fn base(&self) -> SystemTime {
        self.base
    }
}
