use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Process-wide mutual exclusion for one named expensive operation.
///
/// `held` is flipped with a single compare-exchange; `last_release_ns` records when the last
/// holder finished, measured from the state's creation.
#[derive(Debug)]
pub struct GuardState {
    held: AtomicBool,
    last_release_ns: AtomicU64,
    cooldown: Duration,
    epoch: Instant,
}

impl GuardState {
    #[must_use]
    pub fn new(cooldown: Duration) -> Self {
        Self {
            held: AtomicBool::new(false),
            last_release_ns: AtomicU64::new(0),
            cooldown,
            epoch: Instant::now(),
        }
    }

    fn since_epoch(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    /// Try to become the single holder. Never blocks.
    pub fn try_acquire(&self) -> bool {
        if !self.cooldown.is_zero() {
            let last = self.last_release_ns.load(Ordering::Acquire);
            if last != 0 {
                let elapsed = self.since_epoch().saturating_sub(last);
                if elapsed < u64::try_from(self.cooldown.as_nanos()).unwrap_or(u64::MAX) {
                    return false;
                }
            }
        }
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Record the release time and clear the flag.
    pub fn release(&self) {
        self.last_release_ns
            .store(self.since_epoch().max(1), Ordering::Release);
        self.held.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// Time since the last release, `None` if never released.
    #[must_use]
    pub fn since_last_release(&self) -> Option<Duration> {
        match self.last_release_ns.load(Ordering::Acquire) {
            0 => None,
            last => Some(Duration::from_nanos(self.since_epoch().saturating_sub(last))),
        }
    }
}

/// RAII holder of a named guard; dropping it releases the guard, including during unwinding.
#[derive(Debug)]
pub struct GuardHandle {
    name: &'static str,
    state: Arc<GuardState>,
}

impl GuardHandle {
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for GuardHandle {
    fn drop(&mut self) {
        self.state.release();
        if std::thread::panicking() {
            warn!(guard = self.name, "G3: guard released during unwind");
        } else {
            debug!(guard = self.name, "G2: guard released");
        }
    }
}

/// All named guards of the process.
#[derive(Debug, Default)]
pub struct GuardRegistry {
    guards: DashMap<&'static str, Arc<GuardState>>,
    cooldowns: DashMap<String, Duration>,
}

impl GuardRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure a cooldown for `name`, applied to states created afterwards.
    pub fn set_cooldown(&self, name: &str, cooldown: Duration) {
        self.cooldowns.insert(name.to_string(), cooldown);
    }

    fn state(&self, name: &'static str) -> Arc<GuardState> {
        let entry = self.guards.entry(name).or_insert_with(|| {
            let cooldown = self
                .cooldowns
                .get(name)
                .map(|c| *c)
                .unwrap_or(Duration::ZERO);
            Arc::new(GuardState::new(cooldown))
        });
        Arc::clone(entry.value())
    }

    /// Try to take the named guard. `None` means someone else holds it.
    #[must_use]
    pub fn try_acquire(&self, name: &'static str) -> Option<GuardHandle> {
        let state = self.state(name);
        if state.try_acquire() {
            debug!(guard = name, "G1: guard acquired");
            Some(GuardHandle { name, state })
        } else {
            debug!(guard = name, "G1: guard busy");
            None
        }
    }

    #[must_use]
    pub fn is_held(&self, name: &str) -> bool {
        self.guards.get(name).is_some_and(|s| s.is_held())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_holder() {
        let reg = GuardRegistry::new();
        let first = reg.try_acquire("nodeinfo").unwrap();
        assert!(reg.try_acquire("nodeinfo").is_none());
        assert!(reg.try_acquire("vcard").is_some());
        drop(first);
        assert!(reg.try_acquire("nodeinfo").is_some());
    }

    #[test]
    fn test_release_on_panic() {
        let reg = Arc::new(GuardRegistry::new());
        let r = Arc::clone(&reg);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _g = r.try_acquire("webfinger").unwrap();
            panic!("handler blew up");
        }));
        assert!(result.is_err());
        assert!(!reg.is_held("webfinger"));
    }

    #[test]
    fn test_cooldown() {
        let reg = GuardRegistry::new();
        reg.set_cooldown("masto_api", Duration::from_secs(60));
        drop(reg.try_acquire("masto_api").unwrap());
        assert!(reg.try_acquire("masto_api").is_none());
    }

    #[test]
    fn test_state_release_timestamp() {
        let state = GuardState::new(Duration::ZERO);
        assert!(state.since_last_release().is_none());
        assert!(state.try_acquire());
        assert!(!state.try_acquire());
        state.release();
        assert!(state.since_last_release().is_some());
        assert!(state.try_acquire());
    }

    #[test]
    fn test_concurrent_acquire_has_one_winner() {
        let reg = Arc::new(GuardRegistry::new());
        let barrier = Arc::new(std::sync::Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = Arc::clone(&reg);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    let held = reg.try_acquire("followers_sync");
                    let won = held.is_some();
                    barrier.wait();
                    won
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|w| *w)
            .count();
        assert_eq!(winners, 1);
    }
}
