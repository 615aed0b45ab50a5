use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::SystemTime;

use crate::config::DEFAULT_MEDIA_CACHE_ENTRIES;

/// Which retention policy an entry falls under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheClass {
    /// Kept for the process lifetime
    Static,
    /// Bounded LRU, revalidated by mtime
    Media,
}

/// A cached file body and its validators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub etag: String,
    pub last_modified: SystemTime,
    pub mime: &'static str,
    pub bytes: Arc<[u8]>,
}

/// Storage behind the response cache, keyed by resolved filesystem path.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &Path) -> Option<CacheEntry>;
    fn put(&self, key: PathBuf, class: CacheClass, entry: CacheEntry);
    /// Drop an entry; true if one was present.
    fn evict(&self, key: &Path) -> bool;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local store: an unbounded map for static entries and an LRU for media.
#[derive(Debug)]
pub struct MemoryCacheStore {
    statics: RwLock<HashMap<PathBuf, CacheEntry>>,
    media: Mutex<LruCache<PathBuf, CacheEntry>>,
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_MEDIA_CACHE_ENTRIES)
    }
}

impl MemoryCacheStore {
    /// Store holding at most `media_entries` media bodies (minimum one).
    #[must_use]
    pub fn new(media_entries: usize) -> Self {
        let cap = NonZeroUsize::new(media_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            statics: RwLock::new(HashMap::new()),
            media: Mutex::new(LruCache::new(cap)),
        }
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &Path) -> Option<CacheEntry> {
        if let Some(entry) = self
            .statics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Some(entry.clone());
        }
        self.media
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn put(&self, key: PathBuf, class: CacheClass, entry: CacheEntry) {
        match class {
            CacheClass::Static => {
                self.statics
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(key, entry);
            }
            CacheClass::Media => {
                self.media
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .put(key, entry);
            }
        }
    }

    fn evict(&self, key: &Path) -> bool {
        let a = self
            .statics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some();
        let b = self
            .media
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop(key)
            .is_some();
        a || b
    }

    fn len(&self) -> usize {
        self.statics.read().unwrap_or_else(PoisonError::into_inner).len()
            + self.media.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
