//! # Response Cache
//!
//! Conditional GET support and an in-memory byte cache for files served straight from disk.
//!
//! ## Entry Classes
//!
//! - **Static** (icons, fonts, favicon, emoji, robots.txt, theme exports): read once, hashed
//!   for a strong ETag, kept for the life of the process unless the watcher sees the file
//!   change.
//! - **Media** (avatars, attachments): never hashed. `Last-Modified` comes from the file's
//!   mtime and each hit is revalidated against it. Entries live in a bounded LRU.
//!
//! Dynamic responses are not stored; the dispatcher only asks [`conditional`] for an ETag
//! over the final body.

pub mod conditional;
mod store;
mod watch;

pub use conditional::{etag_for, http_date, parse_http_date, Conditional};
pub use store::{CacheClass, CacheEntry, CacheStore, MemoryCacheStore};
pub use watch::watch_asset_root;

use std::fs;
use std::io;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{DispatchError, DispatchResult, NotFoundCode};
use crate::static_files::StaticFiles;

/// Outcome of a cache lookup: either the full entry or a bodiless 304 carrying its
/// validators.
#[derive(Debug, Clone)]
pub enum CacheOutcome {
    Fresh(CacheEntry),
    NotModified(CacheEntry),
}

impl CacheOutcome {
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            CacheOutcome::Fresh(_) => 200,
            CacheOutcome::NotModified(_) => 304,
        }
    }

    #[must_use]
    pub fn entry(&self) -> &CacheEntry {
        match self {
            CacheOutcome::Fresh(e) | CacheOutcome::NotModified(e) => e,
        }
    }
}

/// Serves asset and media files through a [`CacheStore`].
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    assets: Option<StaticFiles>,
    media: Option<StaticFiles>,
}

impl ResponseCache {
    pub fn new(
        store: Arc<dyn CacheStore>,
        assets: Option<StaticFiles>,
        media: Option<StaticFiles>,
    ) -> Self {
        Self { store, assets, media }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    fn root(&self, class: CacheClass) -> DispatchResult<&StaticFiles> {
        match class {
            CacheClass::Static => self.assets.as_ref(),
            CacheClass::Media => self.media.as_ref(),
        }
        .ok_or(DispatchError::not_found(NotFoundCode::NoDocument))
    }

    /// Serve a file under the root for `class`.
    ///
    /// # Errors
    ///
    /// `NotFound` when the root is not configured, the path escapes it, or the file is
    /// missing or unreadable.
    pub fn serve(
        &self,
        class: CacheClass,
        rel: &str,
        cond: &Conditional<'_>,
    ) -> DispatchResult<CacheOutcome> {
        let root = self.root(class)?;
        let (path, meta) = root.stat(rel).map_err(|e| {
            debug!(file = %rel, error = %e, "C1: file not served");
            DispatchError::not_found(NotFoundCode::NoDocument)
        })?;
        let modified = meta.modified().map_err(|e| io_not_found(rel, &e))?;

        let cached = self.store.get(&path).filter(|entry| match class {
            CacheClass::Static => true,
            CacheClass::Media => entry.last_modified == modified,
        });

        let entry = match cached {
            Some(entry) => {
                debug!(file = %rel, class = ?class, "C2: cache hit");
                entry
            }
            None => {
                let bytes = fs::read(&path).map_err(|e| io_not_found(rel, &e))?;
                let etag = match class {
                    CacheClass::Static => etag_for(&bytes),
                    CacheClass::Media => conditional::weak_etag(meta.len(), modified),
                };
                let entry = CacheEntry {
                    etag,
                    last_modified: modified,
                    mime: StaticFiles::content_type(&path),
                    bytes: Arc::from(bytes),
                };
                debug!(file = %rel, class = ?class, bytes = entry.bytes.len(), "C3: cache fill");
                self.store.put(path, class, entry.clone());
                entry
            }
        };

        if cond.is_not_modified(&entry.etag, Some(entry.last_modified)) {
            Ok(CacheOutcome::NotModified(entry))
        } else {
            Ok(CacheOutcome::Fresh(entry))
        }
    }
}

fn io_not_found(rel: &str, e: &io::Error) -> DispatchError {
    warn!(file = %rel, error = %e, "C1: file could not be read");
    DispatchError::not_found(NotFoundCode::NoDocument)
}
