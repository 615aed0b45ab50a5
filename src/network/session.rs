use anyhow::{Context, Result};
use reqwest::blocking::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::{NetworkIdentity, NetworkKind};
use crate::config::ProxyConfig;

const USER_AGENT: &str = concat!("fedrouter/", env!("CARGO_PKG_VERSION"));

/// A long-lived outbound HTTP client bound to one network.
#[derive(Debug, Clone)]
pub struct OutboundSession {
    network: NetworkKind,
    proxy: Option<String>,
    client: Client,
}

impl OutboundSession {
    /// Build a session, routing through `proxy` when given.
    ///
    /// # Errors
    ///
    /// Fails when the proxy URL is invalid or the client cannot be constructed.
    pub fn build(network: NetworkKind, proxy: Option<&str>, timeout: Duration) -> Result<Self> {
        let mut builder = Client::builder().user_agent(USER_AGENT).timeout(timeout);
        if let Some(url) = proxy {
            builder = builder.proxy(
                reqwest::Proxy::all(url).with_context(|| format!("Invalid {network} proxy '{url}'"))?,
            );
        }
        let client = builder
            .build()
            .with_context(|| format!("Failed to build {network} session"))?;
        Ok(Self {
            network,
            proxy: proxy.map(str::to_string),
            client,
        })
    }

    /// Session without a proxy and with default client settings.
    #[must_use]
    pub fn direct(network: NetworkKind) -> Self {
        Self {
            network,
            proxy: None,
            client: Client::new(),
        }
    }

    #[must_use]
    pub fn network(&self) -> NetworkKind {
        self.network
    }

    #[must_use]
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Hands out the outbound session for a network.
pub trait SessionProvider: Send + Sync {
    fn session(&self, network: NetworkKind) -> Arc<OutboundSession>;
}

/// Sessions built once at startup: direct for clearnet, Tor via `socks5h`, i2p via its HTTP
/// proxy. A network without a configured proxy falls back to the clearnet session.
#[derive(Debug)]
pub struct ProxySessionProvider {
    clearnet: Arc<OutboundSession>,
    onion: Arc<OutboundSession>,
    i2p: Arc<OutboundSession>,
}

impl ProxySessionProvider {
    /// # Errors
    ///
    /// Fails when any configured proxy is invalid.
    pub fn from_config(cfg: &ProxyConfig) -> Result<Self> {
        let timeout = Duration::from_secs(cfg.timeout_secs);
        let clearnet = Arc::new(OutboundSession::build(NetworkKind::Clearnet, None, timeout)?);
        let onion = match cfg.tor.as_deref() {
            Some(url) => Arc::new(OutboundSession::build(NetworkKind::Onion, Some(url), timeout)?),
            None => Arc::clone(&clearnet),
        };
        let i2p = match cfg.i2p.as_deref() {
            Some(url) => Arc::new(OutboundSession::build(NetworkKind::I2p, Some(url), timeout)?),
            None => Arc::clone(&clearnet),
        };
        info!(
            tor = ?onion.proxy(),
            i2p = ?i2p.proxy(),
            timeout_secs = cfg.timeout_secs,
            "Outbound sessions ready"
        );
        Ok(Self { clearnet, onion, i2p })
    }
}

impl SessionProvider for ProxySessionProvider {
    fn session(&self, network: NetworkKind) -> Arc<OutboundSession> {
        match network {
            NetworkKind::Clearnet => Arc::clone(&self.clearnet),
            NetworkKind::Onion => Arc::clone(&self.onion),
            NetworkKind::I2p => Arc::clone(&self.i2p),
        }
    }
}

/// Outbound network for a request: overlay callers stay on their overlay, otherwise follow
/// the referer's network, otherwise clearnet.
#[must_use]
pub fn select_network(identity: &NetworkIdentity) -> NetworkKind {
    match identity.active {
        NetworkKind::Onion => NetworkKind::Onion,
        NetworkKind::I2p => NetworkKind::I2p,
        NetworkKind::Clearnet => identity.referer_network.unwrap_or(NetworkKind::Clearnet),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(active: NetworkKind, referer: Option<NetworkKind>) -> NetworkIdentity {
        NetworkIdentity {
            active,
            referer_domain: None,
            referer_network: referer,
        }
    }

    #[test]
    fn test_selection() {
        assert_eq!(select_network(&identity(NetworkKind::Onion, None)), NetworkKind::Onion);
        assert_eq!(
            select_network(&identity(NetworkKind::I2p, Some(NetworkKind::Onion))),
            NetworkKind::I2p
        );
        assert_eq!(
            select_network(&identity(NetworkKind::Clearnet, Some(NetworkKind::I2p))),
            NetworkKind::I2p
        );
        assert_eq!(
            select_network(&identity(NetworkKind::Clearnet, None)),
            NetworkKind::Clearnet
        );
    }

    #[test]
    fn test_provider_is_long_lived() {
        let provider = ProxySessionProvider::from_config(&ProxyConfig::default()).unwrap();
        let a = provider.session(NetworkKind::Onion);
        let b = provider.session(NetworkKind::Onion);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.proxy(), Some("socks5h://127.0.0.1:9050"));
        assert_eq!(provider.session(NetworkKind::Clearnet).proxy(), None);
    }

    #[test]
    fn test_missing_proxy_falls_back_to_clearnet() {
        let cfg = ProxyConfig {
            tor: None,
            i2p: None,
            timeout_secs: 5,
        };
        let provider = ProxySessionProvider::from_config(&cfg).unwrap();
        assert!(Arc::ptr_eq(
            &provider.session(NetworkKind::I2p),
            &provider.session(NetworkKind::Clearnet)
        ));
    }
}
