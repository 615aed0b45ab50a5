use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use super::CacheStore;

/// Watch a file root and evict cache entries for files that change or disappear.
///
/// Keep the returned watcher alive for as long as eviction should happen.
pub fn watch_asset_root<P: AsRef<Path>>(
    root: P,
    store: Arc<dyn CacheStore>,
) -> notify::Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                if matches!(
                    event.kind,
                    EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                ) {
                    for path in &event.paths {
                        if store.evict(path) {
                            debug!(path = %path.display(), "C4: cache entry evicted");
                        }
                    }
                }
            }
            Err(e) => warn!(error = %e, "asset watch error"),
        },
        Config::default(),
    )?;
    watcher.watch(root.as_ref(), RecursiveMode::Recursive)?;
    Ok(watcher)
}
