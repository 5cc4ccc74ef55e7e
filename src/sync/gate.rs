//! Rate-limited shared timestamp used to pair color and depth frames.
//!
//! The color processor requests timestamps; the depth processor only peeks
//! at the last one issued. The two may run on different threads.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use super::clock::{Clock, Timestamp};

/// Stored value meaning nothing has been issued yet
const NONE_ISSUED: u64 = 0;

pub struct TimestampGate {
    clock: Arc<dyn Clock>,
    interval: Duration,
    last_issued: AtomicU64,
}

impl TimestampGate {
    pub fn new(clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            clock,
            interval,
            last_issued: AtomicU64::new(NONE_ISSUED),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Issue a fresh timestamp if at least one interval has passed since the
    /// previous issue. Otherwise returns `None` and leaves the gate as is.
    pub fn request_timestamp(&self) -> Option<Timestamp> {
        let now = self.clock.now().as_micros();
        if now == NONE_ISSUED {
            return None;
        }
        let interval = self.interval.as_micros() as u64;

        let mut last = self.last_issued.load(Ordering::Acquire);
        loop {
            if last != NONE_ISSUED && (now <= last || now - last < interval) {
                trace!(now, last, "timestamp denied");
                return None;
            }
            match self.last_issued.compare_exchange_weak(
                last,
                now,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(Timestamp::from_micros(now)),
                Err(current) => last = current,
            }
        }
    }

    /// Last issued timestamp, without side effects
    pub fn peek_last_timestamp(&self) -> Option<Timestamp> {
        match self.last_issued.load(Ordering::Acquire) {
            NONE_ISSUED => None,
            micros => Some(Timestamp::from_micros(micros)),
        }
    }
}
