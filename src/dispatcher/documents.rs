use std::fs;
use tracing::debug;

use crate::static_files::StaticFiles;

/// Stored federation documents, addressed by request path (`/users/alice/statuses/1`).
pub trait RawDocumentStore: Send + Sync {
    fn exists(&self, path: &str) -> bool;
    fn load(&self, path: &str) -> Option<Vec<u8>>;
}

/// Documents laid out as `<root><path>.json`.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: StaticFiles,
}

impl FsDocumentStore {
    pub fn new(root: StaticFiles) -> Self {
        Self { root }
    }

    fn file_name(path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.ends_with(".json") {
            path.to_string()
        } else {
            format!("{path}.json")
        }
    }
}

impl RawDocumentStore for FsDocumentStore {
    fn exists(&self, path: &str) -> bool {
        self.root.stat(&Self::file_name(path)).is_ok()
    }

    fn load(&self, path: &str) -> Option<Vec<u8>> {
        let (file, _) = self.root.stat(&Self::file_name(path)).ok()?;
        match fs::read(&file) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!(path = %path, error = %e, "D7: stored document unreadable");
                None
            }
        }
    }
}
