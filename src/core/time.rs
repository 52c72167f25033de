//! Clock abstraction for testable time-dependent logic
//!
//! Components that make decisions from elapsed time (interaction expiry,
//! stats ticks) read the current instant through [`Clock`] so tests can
//! drive time by hand instead of sleeping.

#[cfg(test)]
use std::sync::{Arc, Mutex};
#[cfg(test)]
use std::time::Duration;
use std::time::SystemTime;
use tokio::time::Instant;

/// Abstraction over time for testable time-dependent logic
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current monotonic time (for measuring intervals)
    fn now(&self) -> Instant;

    /// Current wall-clock time (for timestamps on emitted records)
    fn system_time(&self) -> SystemTime;
}

/// Production clock backed by the tokio timer
///
/// Uses `tokio::time::Instant`, so paused-time tests also control it.
#[derive(Debug, Default, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Manually advanced clock for deterministic tests
#[derive(Debug, Clone)]
#[cfg(test)]
pub struct MockClock {
    current_instant: Arc<Mutex<Instant>>,
    current_system_time: Arc<Mutex<SystemTime>>,
}

#[cfg(test)]
impl MockClock {
    pub fn new() -> Self {
        Self {
            current_instant: Arc::new(Mutex::new(Instant::now())),
            current_system_time: Arc::new(Mutex::new(SystemTime::now())),
        }
    }

    /// Advance both monotonic and wall-clock time by the given duration
    pub fn advance(&self, duration: Duration) {
        *self.current_instant.lock().unwrap() += duration;
        *self.current_system_time.lock().unwrap() += duration;
    }
}

#[cfg(test)]
impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self.current_instant.lock().unwrap()
    }

    fn system_time(&self) -> SystemTime {
        *self.current_system_time.lock().unwrap()
    }
}
