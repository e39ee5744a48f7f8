//! Time source for freshness checks
//!
//! The cache never reads `Utc::now()` directly; all "now" decisions go
//! through the [`Clock`] trait so tests can cross TTL boundaries
//! without sleeping.

use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// Source of "now" for TTL checks
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests
///
/// Share it with the cache via `Arc` and call [`advance`](Self::advance)
/// to move time forward for both.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, delta: std::time::Duration) {
        let delta = chrono::Duration::from_std(delta).expect("advance delta out of range");
        let mut now = self.now.lock().unwrap();
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
