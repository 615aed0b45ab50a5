//! # Server Configuration
//!
//! Configuration is loaded from a YAML file and then overridden from environment variables.
//!
//! ## File Format
//!
//! ```yaml
//! instance:
//!   clearnet_domain: social.example
//!   onion_domain: abcdefghijklmnop.onion
//!   i2p_domain: social.i2p
//!   http_prefix: https
//! http:
//!   addr: 0.0.0.0:8080
//!   session_cookie: session
//!   secure_mode: true
//! limits:
//!   heavy_interval_ms: 500
//!   guard_cooldowns_ms:
//!     nodeinfo: 0
//! paths:
//!   asset_dir: static
//!   media_dir: media
//!   document_dir: accounts
//!   template_dir: templates
//! blocklist:
//!   domains: [spam.example]
//!   crawlers: [GPTBot]
//!   hashtags: [nsfw]
//! proxies:
//!   tor: socks5h://127.0.0.1:9050
//!   i2p: http://127.0.0.1:4444
//! security:
//!   session_secret: change-me
//!   contact: mailto:admin@social.example
//! ```
//!
//! ## Environment Variables
//!
//! | Variable                 | Overrides                        |
//! |--------------------------|----------------------------------|
//! | `FEDR_DOMAIN`            | `instance.clearnet_domain`       |
//! | `FEDR_ONION_DOMAIN`      | `instance.onion_domain`          |
//! | `FEDR_I2P_DOMAIN`        | `instance.i2p_domain`            |
//! | `FEDR_ADDR`              | `http.addr`                      |
//! | `FEDR_SECURE_MODE`       | `http.secure_mode`               |
//! | `FEDR_HEAVY_INTERVAL_MS` | `limits.heavy_interval_ms`       |
//! | `FEDR_SESSION_SECRET`    | `security.session_secret`        |
//! | `FEDR_TOR_PROXY`         | `proxies.tor`                    |
//! | `FEDR_I2P_PROXY`         | `proxies.i2p`                    |

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default minimum spacing between two served heavy requests.
pub const DEFAULT_HEAVY_INTERVAL_MS: u64 = 500;

/// Default number of media entries kept in the LRU byte cache.
pub const DEFAULT_MEDIA_CACHE_ENTRIES: usize = 256;

/// Public identity of this instance on each network it is reachable through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    pub clearnet_domain: String,
    pub onion_domain: Option<String>,
    pub i2p_domain: Option<String>,
    /// Scheme used for clearnet URLs (`https` in production)
    pub http_prefix: String,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            clearnet_domain: "localhost".to_string(),
            onion_domain: None,
            i2p_domain: None,
            http_prefix: "https".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub addr: String,
    pub session_cookie: String,
    /// Authorized fetch: federation JSON for non-public routes requires a signature
    pub secure_mode: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            session_cookie: "session".to_string(),
            secure_mode: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    pub heavy_interval_ms: u64,
    /// Optional cooldown after release, per singleton guard name
    pub guard_cooldowns_ms: HashMap<String, u64>,
    pub media_cache_entries: usize,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            heavy_interval_ms: DEFAULT_HEAVY_INTERVAL_MS,
            guard_cooldowns_ms: HashMap::new(),
            media_cache_entries: DEFAULT_MEDIA_CACHE_ENTRIES,
        }
    }
}

impl LimitConfig {
    #[must_use]
    pub fn heavy_interval(&self) -> Duration {
        Duration::from_millis(self.heavy_interval_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Icons, fonts, favicon, emoji, robots.txt, theme archives
    pub asset_dir: Option<PathBuf>,
    /// Avatars and media attachments
    pub media_dir: Option<PathBuf>,
    /// Root for the raw JSON document fallback, account documents and hashtag indexes
    pub document_dir: Option<PathBuf>,
    /// Site page templates (`index.html`, `about.html`)
    pub template_dir: Option<PathBuf>,
}

/// Hot-reloadable deny lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Blocklist {
    pub domains: Vec<String>,
    /// Case-insensitive substrings of `User-Agent`
    pub crawlers: Vec<String>,
    pub hashtags: Vec<String>,
}

impl Blocklist {
    /// A domain is blocked if it equals a listed domain or is a subdomain of one.
    #[must_use]
    pub fn is_blocked_domain(&self, domain: &str) -> bool {
        let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();
        let host = domain.split(':').next().unwrap_or_default();
        self.domains.iter().any(|blocked| {
            let blocked = blocked.trim().to_ascii_lowercase();
            !blocked.is_empty()
                && (host == blocked
                    || host
                        .strip_suffix(blocked.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.')))
        })
    }

    #[must_use]
    pub fn is_blocked_crawler(&self, user_agent: &str) -> bool {
        let ua = user_agent.to_ascii_lowercase();
        self.crawlers
            .iter()
            .map(|c| c.trim().to_ascii_lowercase())
            .any(|c| !c.is_empty() && ua.contains(&c))
    }

    #[must_use]
    pub fn is_blocked_hashtag(&self, tag: &str) -> bool {
        let tag = tag.trim_start_matches('#');
        self.hashtags
            .iter()
            .any(|h| h.trim_start_matches('#').eq_ignore_ascii_case(tag))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub tor: Option<String>,
    pub i2p: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            tor: Some("socks5h://127.0.0.1:9050".to_string()),
            i2p: Some("http://127.0.0.1:4444".to_string()),
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub session_secret: Option<String>,
    /// `Contact:` line for security.txt
    pub contact: Option<String>,
}

/// Complete server configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub instance: InstanceConfig,
    pub http: HttpConfig,
    pub limits: LimitConfig,
    pub paths: PathConfig,
    pub blocklist: Blocklist,
    pub proxies: ProxyConfig,
    pub security: SecurityConfig,
}

impl ServerConfig {
    /// Load from a YAML file, apply `FEDR_*` overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_yaml(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: ServerConfig = serde_yaml::from_str(text)?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("FEDR_DOMAIN") {
            self.instance.clearnet_domain = v;
        }
        if let Some(v) = lookup("FEDR_ONION_DOMAIN") {
            self.instance.onion_domain = Some(v).filter(|s| !s.is_empty());
        }
        if let Some(v) = lookup("FEDR_I2P_DOMAIN") {
            self.instance.i2p_domain = Some(v).filter(|s| !s.is_empty());
        }
        if let Some(v) = lookup("FEDR_ADDR") {
            self.http.addr = v;
        }
        if let Some(v) = lookup("FEDR_SECURE_MODE").and_then(|s| s.parse().ok()) {
            self.http.secure_mode = v;
        }
        if let Some(v) = lookup("FEDR_HEAVY_INTERVAL_MS").and_then(|s| s.parse().ok()) {
            self.limits.heavy_interval_ms = v;
        }
        if let Some(v) = lookup("FEDR_SESSION_SECRET") {
            self.security.session_secret = Some(v);
        }
        if let Some(v) = lookup("FEDR_TOR_PROXY") {
            self.proxies.tor = Some(v).filter(|s| !s.is_empty());
        }
        if let Some(v) = lookup("FEDR_I2P_PROXY") {
            self.proxies.i2p = Some(v).filter(|s| !s.is_empty());
        }
    }

    pub fn validate(&self) -> Result<()> {
        let clearnet = self.instance.clearnet_domain.trim();
        if clearnet.is_empty() {
            bail!("instance.clearnet_domain must not be empty");
        }
        if clearnet.contains('/') {
            bail!("instance.clearnet_domain must be a bare domain, got '{clearnet}'");
        }
        if let Some(onion) = &self.instance.onion_domain {
            if !onion.to_ascii_lowercase().ends_with(".onion") {
                bail!("instance.onion_domain must end with .onion, got '{onion}'");
            }
        }
        if let Some(i2p) = &self.instance.i2p_domain {
            if !i2p.to_ascii_lowercase().ends_with(".i2p") {
                bail!("instance.i2p_domain must end with .i2p, got '{i2p}'");
            }
        }
        if !matches!(self.instance.http_prefix.as_str(), "http" | "https") {
            bail!(
                "instance.http_prefix must be http or https, got '{}'",
                self.instance.http_prefix
            );
        }
        Ok(())
    }
}
