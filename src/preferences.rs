//! # Account Preferences
//!
//! Reading preferences that change how a resource is rendered for its owner: timezone for
//! timestamps, full or summarized posts, and timeline order. They are loaded once per request
//! for the captured nickname and handed to the handler inside its
//! [`HandlerRequest`](crate::dispatcher::HandlerRequest).

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::router::is_nickname;
use crate::static_files::StaticFiles;

/// File name of the per-account preferences document.
pub const PREFERENCES_FILE: &str = "preferences.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingStyle {
    #[default]
    Full,
    Summary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Everything a handler may need to know about how the account wants to read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountPreferences {
    /// IANA zone name, `None` for UTC
    pub timezone: Option<String>,
    pub reading_style: ReadingStyle,
    pub timeline_order: TimelineOrder,
}

/// Source of [`AccountPreferences`].
pub trait PreferencesStore: Send + Sync {
    /// Preferences for `nickname`; `None` when the account has none stored.
    fn load(&self, nickname: &str) -> Option<AccountPreferences>;
}

/// Reads `<root>/<nickname>/preferences.json`.
#[derive(Debug, Clone)]
pub struct FsPreferencesStore {
    root: StaticFiles,
}

impl FsPreferencesStore {
    pub fn new(root: StaticFiles) -> Self {
        Self { root }
    }
}

impl PreferencesStore for FsPreferencesStore {
    fn load(&self, nickname: &str) -> Option<AccountPreferences> {
        if !is_nickname(nickname) {
            return None;
        }
        let file = self.root.load(&format!("{nickname}/{PREFERENCES_FILE}")).ok()?;
        match serde_json::from_slice(&file.bytes) {
            Ok(prefs) => Some(prefs),
            Err(e) => {
                warn!(nickname = %nickname, error = %e, "P1: unreadable preferences, using defaults");
                None
            }
        }
    }
}

/// Process-local store, filled by the embedding application.
#[derive(Debug, Default)]
pub struct MemoryPreferencesStore {
    entries: DashMap<String, AccountPreferences>,
}

impl MemoryPreferencesStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, nickname: &str, prefs: AccountPreferences) {
        self.entries.insert(nickname.to_string(), prefs);
    }
}

impl PreferencesStore for MemoryPreferencesStore {
    fn load(&self, nickname: &str) -> Option<AccountPreferences> {
        self.entries.get(nickname).map(|e| e.value().clone())
    }
}
