//! # Network Identity Module
//!
//! One instance is reachable as several network identities: a clearnet domain, an onion
//! service and an i2p eepsite. This module works out which identity a caller used, which
//! network the caller's own server lives on, and keeps response bodies consistent with the
//! caller's view of the instance.
//!
//! ## Components
//!
//! - [`NetworkIdentityResolver`] - maps `Host` to the active [`NetworkKind`] and derives the
//!   referer identity from `Referer`, the signature `keyId`, or a URL in `User-Agent`.
//! - [`DomainRewriter`] - pure same-origin URL rewriting (see [`rewrite`]).
//! - [`SessionProvider`] - long-lived outbound HTTP sessions per network, built at startup.

pub mod rewrite;
mod session;

pub use rewrite::{BoundaryRewriter, DomainRewriter, IdentityMap};
pub use session::{select_network, OutboundSession, ProxySessionProvider, SessionProvider};

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use tracing::debug;
use url::Url;

use crate::config::InstanceConfig;
use crate::error::{DispatchError, DispatchResult, MalformedCode};
use crate::security::key_id_domain;

#[allow(clippy::expect_used)]
static UA_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+?(https?://[^\s);,]+)").expect("valid user agent url pattern"));

/// The network a domain belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkKind {
    Clearnet,
    Onion,
    I2p,
}

impl NetworkKind {
    /// Classify a bare domain by its top-level label.
    #[must_use]
    pub fn of_domain(domain: &str) -> Self {
        let domain = domain.trim_end_matches('.').to_ascii_lowercase();
        if domain.ends_with(".onion") {
            NetworkKind::Onion
        } else if domain.ends_with(".i2p") {
            NetworkKind::I2p
        } else {
            NetworkKind::Clearnet
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            NetworkKind::Clearnet => "clearnet",
            NetworkKind::Onion => "onion",
            NetworkKind::I2p => "i2p",
        }
    }
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The domains this instance answers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceIdentity {
    pub clearnet: String,
    pub onion: Option<String>,
    pub i2p: Option<String>,
    /// Scheme for clearnet URLs
    pub http_prefix: String,
}

impl InstanceIdentity {
    #[must_use]
    pub fn from_config(cfg: &InstanceConfig) -> Self {
        Self {
            clearnet: cfg.clearnet_domain.to_ascii_lowercase(),
            onion: cfg.onion_domain.as_ref().map(|d| d.to_ascii_lowercase()),
            i2p: cfg.i2p_domain.as_ref().map(|d| d.to_ascii_lowercase()),
            http_prefix: cfg.http_prefix.clone(),
        }
    }

    /// Domain for a network, if the instance is reachable there.
    #[must_use]
    pub fn domain(&self, network: NetworkKind) -> Option<&str> {
        match network {
            NetworkKind::Clearnet => Some(self.clearnet.as_str()),
            NetworkKind::Onion => self.onion.as_deref(),
            NetworkKind::I2p => self.i2p.as_deref(),
        }
    }

    /// Origin (`scheme://domain`) for a network. Overlay networks are always plain http.
    #[must_use]
    pub fn origin(&self, network: NetworkKind) -> Option<String> {
        let domain = self.domain(network)?;
        Some(match network {
            NetworkKind::Clearnet => format!("{}://{domain}", self.http_prefix),
            NetworkKind::Onion | NetworkKind::I2p => format!("http://{domain}"),
        })
    }
}

/// Who the caller is, network-wise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkIdentity {
    /// Network of the `Host` the caller used
    pub active: NetworkKind,
    /// Domain of the caller's own server, when it can be told
    pub referer_domain: Option<String>,
    pub referer_network: Option<NetworkKind>,
}

/// Resolves [`NetworkIdentity`] from request headers.
#[derive(Debug, Clone)]
pub struct NetworkIdentityResolver {
    instance: InstanceIdentity,
}

impl NetworkIdentityResolver {
    #[must_use]
    pub fn new(instance: InstanceIdentity) -> Self {
        Self { instance }
    }

    #[must_use]
    pub fn instance(&self) -> &InstanceIdentity {
        &self.instance
    }

    /// Map a `Host` header to the network it names.
    ///
    /// # Errors
    ///
    /// `MalformedPath` (host mismatch) when the host is absent or not one of ours.
    pub fn resolve_host(&self, host: Option<&str>) -> DispatchResult<NetworkKind> {
        let host = host
            .map(|h| strip_port(h.trim()).trim_end_matches('.').to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .ok_or(DispatchError::malformed(MalformedCode::HostMismatch))?;
        [NetworkKind::Clearnet, NetworkKind::Onion, NetworkKind::I2p]
            .into_iter()
            .find(|n| self.instance.domain(*n) == Some(host.as_str()))
            .ok_or_else(|| {
                debug!(host = %host, "N1: host matches no configured identity");
                DispatchError::malformed(MalformedCode::HostMismatch)
            })
    }

    /// Domain of the caller's server: `Referer`, then signature `keyId`, then `User-Agent`.
    #[must_use]
    pub fn referer_domain(
        &self,
        referer: Option<&str>,
        signature: Option<&str>,
        user_agent: Option<&str>,
    ) -> Option<String> {
        referer
            .and_then(url_host)
            .or_else(|| signature.and_then(key_id_domain))
            .or_else(|| {
                user_agent
                    .and_then(|ua| UA_URL.captures(ua))
                    .and_then(|c| c.get(1))
                    .and_then(|m| url_host(m.as_str()))
            })
    }

    /// Full resolution.
    ///
    /// # Errors
    ///
    /// See [`NetworkIdentityResolver::resolve_host`].
    pub fn resolve(
        &self,
        host: Option<&str>,
        referer: Option<&str>,
        signature: Option<&str>,
        user_agent: Option<&str>,
    ) -> DispatchResult<NetworkIdentity> {
        let active = self.resolve_host(host)?;
        let referer_domain = self.referer_domain(referer, signature, user_agent);
        let referer_network = referer_domain.as_deref().map(NetworkKind::of_domain);
        Ok(NetworkIdentity {
            active,
            referer_domain,
            referer_network,
        })
    }

    /// Rewrite map for the caller's network, `None` for clearnet callers.
    #[must_use]
    pub fn identity_map(&self, active: NetworkKind) -> Option<IdentityMap> {
        if active == NetworkKind::Clearnet {
            return None;
        }
        Some(IdentityMap::new(
            &self.instance.clearnet,
            &self.instance.origin(active)?,
        ))
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host;
    }
    host.rsplit_once(':')
        .filter(|(_, port)| port.bytes().all(|b| b.is_ascii_digit()))
        .map_or(host, |(h, _)| h)
}

fn url_host(s: &str) -> Option<String> {
    Url::parse(s.trim())
        .ok()?
        .host_str()
        .map(str::to_ascii_lowercase)
}
