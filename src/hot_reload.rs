//! # Hot Reload Module
//!
//! Live reloading of the deny lists without restarting the server.
//!
//! ## Overview
//!
//! The blocklist (blocked domains, crawler markers, blocked hashtags) is the one part of the
//! configuration that operators change while the instance is running. The dispatcher reads it
//! through an [`ArcSwap`], so a reload is a single pointer swap: requests already in flight
//! keep the list they started with, later requests see the new one.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fedrouter::hot_reload::watch_config;
//!
//! let watcher = watch_config("fedrouter.yaml", dispatcher.blocklist_handle(), |cfg| {
//!     tracing::info!(domains = cfg.blocklist.domains.len(), "blocklist refreshed");
//! })?;
//! // keep `watcher` alive for as long as reloads should happen
//! ```
//!
//! ## Error Handling
//!
//! If the edited file fails to parse or validate, the error is logged and the previous
//! blocklist stays active. Nothing else in the running configuration is touched; listen
//! address, domains and secrets still need a restart.

use anyhow::Result;
use arc_swap::ArcSwap;
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Blocklist, ServerConfig};

/// Shared, swappable blocklist.
pub type BlocklistHandle = Arc<ArcSwap<Blocklist>>;

/// Re-read `config_path` and swap in its blocklist.
///
/// # Errors
///
/// Fails when the file cannot be read, parsed or validated; `target` is left unchanged.
pub fn reload_blocklist(config_path: &Path, target: &ArcSwap<Blocklist>) -> Result<ServerConfig> {
    let config = ServerConfig::load(config_path)?;
    target.store(Arc::new(config.blocklist.clone()));
    info!(
        domains = config.blocklist.domains.len(),
        crawlers = config.blocklist.crawlers.len(),
        hashtags = config.blocklist.hashtags.len(),
        "hot-reload: blocklist updated"
    );
    Ok(config)
}

/// Watch the configuration file and reload the blocklist when it changes.
///
/// `on_reload` receives each successfully reloaded configuration.
pub fn watch_config<P, F>(
    config_path: P,
    target: BlocklistHandle,
    on_reload: F,
) -> notify::Result<RecommendedWatcher>
where
    P: AsRef<Path>,
    F: Fn(&ServerConfig) + Send + 'static,
{
    let path: PathBuf = config_path.as_ref().to_path_buf();
    let watch_path = path.clone();

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    match reload_blocklist(&watch_path, &target) {
                        Ok(config) => on_reload(&config),
                        Err(e) => warn!(
                            path = %watch_path.display(),
                            error = %e,
                            "hot-reload: keeping previous blocklist"
                        ),
                    }
                }
            }
            Err(e) => warn!(error = %e, "config watch error"),
        },
        Config::default(),
    )?;

    watcher.watch(&path, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}
