use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cache::{CacheStore, MemoryCacheStore, ResponseCache};
use crate::config::{LimitConfig, PathConfig};
use crate::guard::{GuardRegistry, RateLimiter};
use crate::static_files::StaticFiles;

/// Mutable process-wide state behind the dispatcher: singleton guards, the heavy-route
/// limiter and the file cache. Everything in here is atomics or internally locked, so one
/// instance is shared by every connection.
pub struct DispatchState {
    pub guards: GuardRegistry,
    pub limiter: RateLimiter,
    pub cache: ResponseCache,
}

impl DispatchState {
    pub fn new(guards: GuardRegistry, limiter: RateLimiter, cache: ResponseCache) -> Self {
        Self {
            guards,
            limiter,
            cache,
        }
    }

    /// State for the configured limits and file roots.
    #[must_use]
    pub fn from_config(limits: &LimitConfig, paths: &PathConfig) -> Self {
        let guards = GuardRegistry::new();
        for (name, ms) in &limits.guard_cooldowns_ms {
            debug!(guard = %name, cooldown_ms = ms, "guard cooldown configured");
            guards.set_cooldown(name, Duration::from_millis(*ms));
        }
        let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new(limits.media_cache_entries));
        let cache = ResponseCache::new(
            store,
            paths.asset_dir.clone().map(StaticFiles::new),
            paths.media_dir.clone().map(StaticFiles::new),
        );
        Self::new(guards, RateLimiter::new(limits.heavy_interval()), cache)
    }
}

impl Default for DispatchState {
    fn default() -> Self {
        Self::from_config(&LimitConfig::default(), &PathConfig::default())
    }
}
