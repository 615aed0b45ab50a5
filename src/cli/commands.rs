use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use notify::RecommendedWatcher;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::watch_asset_root;
use crate::config::ServerConfig;
use crate::dispatcher::{Dispatcher, FsDocumentStore, RawDocumentStore};
use crate::handlers::{
    register_builtin, BlogFeed, FsAccountDirectory, FsBlogIndex, FsHashtagIndex, HashtagFeed,
    SitePages, WellKnown,
};
use crate::hot_reload::watch_config;
use crate::middleware::{MetricsMiddleware, TracingMiddleware};
use crate::network::{InstanceIdentity, ProxySessionProvider};
use crate::preferences::FsPreferencesStore;
use crate::router::{RouteClassifier, ROUTES};
use crate::security::{
    AllPublic, AuthorizationGate, DocumentVisibility, JwtSessionValidator, UnverifiedSignatures,
    VisibilityOracle,
};
use crate::server::{AppService, HttpServer, ServerHandle};
use crate::static_files::StaticFiles;

/// Document root used when `paths.document_dir` is not configured.
const DEFAULT_DOCUMENT_DIR: &str = "accounts";

/// Command-line interface for fedrouter
#[derive(Parser)]
#[command(name = "fedrouter")]
#[command(about = "Resource dispatcher for federated content servers", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Path to the YAML configuration file
        #[arg(short, long, env = "FEDR_CONFIG")]
        config: PathBuf,

        /// Reload the blocklist when the configuration file changes
        #[arg(long, default_value_t = false)]
        watch: bool,

        /// Listen address, overriding `http.addr`
        #[arg(long)]
        addr: Option<String>,
    },
    /// Print the route table in priority order
    Routes,
    /// Show which route a path resolves to
    Classify {
        /// Request target, e.g. `/users/alice/statuses/1?page=2`
        path: String,
    },
}

/// Execute the parsed command.
///
/// # Errors
///
/// Configuration, bind and shutdown failures for `serve`; malformed paths for `classify`.
pub fn run_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve {
            config,
            watch,
            addr,
        } => serve(&config, watch, addr),
        Commands::Routes => {
            print_routes(&mut io::stdout().lock())?;
            Ok(())
        }
        Commands::Classify { path } => classify(&path, &mut io::stdout().lock()),
    }
}

/// Write the route table: id, pattern, access, admission, fast-path flag.
pub fn print_routes(out: &mut impl Write) -> io::Result<()> {
    for (i, rule) in ROUTES.iter().enumerate() {
        writeln!(
            out,
            "{:>2}  {:<18} {:<52} {:<9} {:<32}{}",
            i + 1,
            rule.id.as_str(),
            rule.pattern,
            format!("{:?}", rule.access),
            format!("{:?}", rule.admission),
            if rule.fast_path { " fast" } else { "" }
        )?;
    }
    Ok(())
}

/// Classify `path` and write the route and its captures.
///
/// # Errors
///
/// Fails when the path is malformed or output cannot be written.
pub fn classify(path: &str, out: &mut impl Write) -> Result<()> {
    match RouteClassifier::new().classify_path(path)? {
        Some(m) => {
            writeln!(out, "route: {}", m.id())?;
            if let Some(suffix) = m.format_suffix {
                writeln!(out, "suffix: {suffix:?}")?;
            }
            for (name, value) in &m.params {
                writeln!(out, "{name}: {value}")?;
            }
        }
        None => writeln!(out, "no route")?,
    }
    Ok(())
}

/// Build a fully wired dispatcher from configuration.
///
/// # Errors
///
/// Fails without a session secret or when an outbound proxy is invalid.
pub fn build_dispatcher(config: &ServerConfig) -> Result<(Dispatcher, Arc<MetricsMiddleware>)> {
    let secret = config
        .security
        .session_secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .context("security.session_secret (or FEDR_SESSION_SECRET) must be set")?;
    let sessions = Arc::new(
        ProxySessionProvider::from_config(&config.proxies).context("Failed to build outbound sessions")?,
    );

    let document_dir = config
        .paths
        .document_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DOCUMENT_DIR));
    let documents = StaticFiles::new(&document_dir);
    let store: Arc<dyn RawDocumentStore> = Arc::new(FsDocumentStore::new(documents.clone()));
    let visibility: Arc<dyn VisibilityOracle> = if config.paths.document_dir.is_some() {
        Arc::new(DocumentVisibility::new(Arc::clone(&store)))
    } else {
        Arc::new(AllPublic)
    };
    let gate = AuthorizationGate::new(
        Arc::new(JwtSessionValidator::new(secret.as_bytes())),
        Arc::new(UnverifiedSignatures),
        visibility,
    );

    let mut dispatcher = Dispatcher::new(config, gate, sessions);
    dispatcher.set_document_store(store);
    dispatcher.set_preferences_store(Arc::new(FsPreferencesStore::new(StaticFiles::new(
        document_dir.join("users"),
    ))));

    let well_known = WellKnown::new(
        InstanceIdentity::from_config(&config.instance),
        Arc::new(FsAccountDirectory::new(documents.clone())),
        config.security.contact.clone(),
    );
    let blog = BlogFeed::new(Arc::new(FsBlogIndex::new(documents.clone())));
    let hashtags = HashtagFeed::new(
        Arc::new(FsHashtagIndex::new(documents)),
        dispatcher.blocklist_handle(),
    );
    let pages = config
        .paths
        .template_dir
        .as_ref()
        .map(|dir| SitePages::new(StaticFiles::new(dir), config.instance.clearnet_domain.as_str()));
    register_builtin(&mut dispatcher, well_known, hashtags, blog, pages);

    let metrics = Arc::new(MetricsMiddleware::new());
    dispatcher.add_middleware(Arc::new(TracingMiddleware));
    let metrics_mw: Arc<MetricsMiddleware> = Arc::clone(&metrics);
    dispatcher.add_middleware(metrics_mw);
    Ok((dispatcher, metrics))
}

/// Start watchers: blocklist reload on config change, cache eviction on asset/media change.
fn start_watchers(
    config_path: &Path,
    config: &ServerConfig,
    dispatcher: &Dispatcher,
    watch: bool,
) -> Vec<RecommendedWatcher> {
    let mut watchers = Vec::new();
    if watch {
        match watch_config(config_path, dispatcher.blocklist_handle(), |cfg| {
            info!(
                domains = cfg.blocklist.domains.len(),
                crawlers = cfg.blocklist.crawlers.len(),
                hashtags = cfg.blocklist.hashtags.len(),
                "blocklist reloaded"
            );
        }) {
            Ok(w) => watchers.push(w),
            Err(e) => warn!(path = %config_path.display(), error = %e, "config watch unavailable"),
        }
    }
    let roots = [&config.paths.asset_dir, &config.paths.media_dir];
    for root in roots.into_iter().flatten() {
        match watch_asset_root(root, Arc::clone(dispatcher.state().cache.store())) {
            Ok(w) => watchers.push(w),
            Err(e) => warn!(path = %root.display(), error = %e, "asset watch unavailable"),
        }
    }
    watchers
}

fn serve(config_path: &Path, watch: bool, addr: Option<String>) -> Result<()> {
    let mut config = ServerConfig::load(config_path)?;
    if let Some(addr) = addr {
        config.http.addr = addr;
    }
    let (dispatcher, metrics) = build_dispatcher(&config)?;
    let _watchers = start_watchers(config_path, &config, &dispatcher, watch);

    let mut service = AppService::new(Arc::new(dispatcher));
    service.set_metrics_middleware(metrics);
    let handle = HttpServer(service)
        .start(config.http.addr.as_str())
        .with_context(|| format!("Failed to bind {}", config.http.addr))?;
    wait_for_shutdown(handle)
}

/// Block until SIGTERM or SIGINT, then stop the accept loop.
#[cfg(unix)]
fn wait_for_shutdown(handle: ServerHandle) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGTERM, SIGINT]).context("Failed to register signal handlers")?;
    if let Some(signal) = signals.forever().next() {
        info!(signal, addr = %handle.addr(), "shutdown requested");
    }
    handle.stop();
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_shutdown(handle: ServerHandle) -> Result<()> {
    handle
        .join()
        .map_err(|e| anyhow::anyhow!("server coroutine panicked: {e:?}"))
}
