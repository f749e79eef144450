//! Time source used for TTL bookkeeping.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use time::OffsetDateTime;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::clock";

pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Wall-clock time in UTC.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Manually advanced clock for expiry tests and simulations.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<OffsetDateTime>>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Arc::new(RwLock::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = rw_write(&self.now, SOURCE, "advance");
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(OffsetDateTime::UNIX_EPOCH)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *rw_read(&self.now, SOURCE, "now")
    }
}
