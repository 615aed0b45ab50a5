use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::DEFAULT_HEAVY_INTERVAL_MS;

const NEVER: u64 = u64::MAX;

/// Cooldown gate shared by every route in the heavy class.
///
/// Holds one timestamp: when the last heavy request was admitted. A request arriving sooner
/// than `interval` after it is refused and the timestamp is left alone; otherwise the
/// timestamp advances with a compare-and-swap. The limiter never blocks and never holds.
#[derive(Debug)]
pub struct RateLimiter {
    epoch: Instant,
    last_served_ns: AtomicU64,
    interval: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_HEAVY_INTERVAL_MS))
    }
}

impl RateLimiter {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            epoch: Instant::now(),
            last_served_ns: AtomicU64::new(NEVER),
            interval,
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn offset(&self, at: Instant) -> u64 {
        u64::try_from(at.saturating_duration_since(self.epoch).as_nanos()).unwrap_or(NEVER - 1)
    }

    /// Admit a heavy request now.
    pub fn try_admit(&self) -> bool {
        self.try_admit_at(Instant::now())
    }

    /// Admit a heavy request arriving at `now`.
    pub fn try_admit_at(&self, now: Instant) -> bool {
        let now_ns = self.offset(now);
        let interval_ns = u64::try_from(self.interval.as_nanos()).unwrap_or(NEVER);
        let mut last = self.last_served_ns.load(Ordering::Acquire);
        loop {
            if last != NEVER && now_ns.saturating_sub(last) < interval_ns {
                debug!(
                    since_last_ms = Duration::from_nanos(now_ns.saturating_sub(last)).as_millis() as u64,
                    interval_ms = self.interval.as_millis() as u64,
                    "L1: heavy request refused"
                );
                return false;
            }
            match self.last_served_ns.compare_exchange_weak(
                last,
                now_ns,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(current) => last = current,
            }
        }
    }

    /// When the last heavy request was admitted.
    #[must_use]
    pub fn last_served(&self) -> Option<Instant> {
        match self.last_served_ns.load(Ordering::Acquire) {
            NEVER => None,
            ns => Some(self.epoch + Duration::from_nanos(ns)),
        }
    }
}
