//! Discovery documents: WebFinger, host-meta, NodeInfo and security.txt.
//!
//! Every document is built with clearnet self-links; the dispatcher rewrites them for onion
//! and i2p callers afterwards.

use serde_json::json;
use std::fs;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::dispatcher::{HandlerOutput, HandlerRequest, ResourceHandler};
use crate::network::{InstanceIdentity, NetworkKind};
use crate::router::{is_nickname, RouteId};
use crate::static_files::StaticFiles;

const JRD: &str = "application/jrd+json";
const XRD: &str = "application/xrd+xml";
const JSON: &str = "application/json";
const NODEINFO_20: &str = "application/json; profile=\"http://nodeinfo.diaspora.software/ns/schema/2.0#\"";
const NODEINFO_21: &str = "application/json; profile=\"http://nodeinfo.diaspora.software/ns/schema/2.1#\"";
const PLAIN: &str = "text/plain; charset=utf-8";

/// Counts published in NodeInfo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstanceStats {
    pub users: u64,
    pub local_posts: u64,
}

/// Local accounts, as far as discovery documents need to know.
pub trait AccountDirectory: Send + Sync {
    fn has_account(&self, nickname: &str) -> bool;
    fn stats(&self) -> InstanceStats;
}

/// Accounts stored under the document root as `users/<nick>.json`, with posts in
/// `users/<nick>/statuses/`.
#[derive(Debug, Clone)]
pub struct FsAccountDirectory {
    root: StaticFiles,
}

impl FsAccountDirectory {
    pub fn new(root: StaticFiles) -> Self {
        Self { root }
    }
}

impl AccountDirectory for FsAccountDirectory {
    fn has_account(&self, nickname: &str) -> bool {
        is_nickname(nickname) && self.root.stat(&format!("users/{nickname}.json")).is_ok()
    }

    fn stats(&self) -> InstanceStats {
        let Ok(entries) = fs::read_dir(self.root.base_dir().join("users")) else {
            return InstanceStats::default();
        };
        let mut stats = InstanceStats::default();
        for entry in entries.flatten() {
            let path = entry.path();
            let is_account = path.extension().is_some_and(|e| e == "json")
                && path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(is_nickname);
            if !is_account {
                continue;
            }
            stats.users += 1;
            let statuses = path.with_extension("").join("statuses");
            if let Ok(posts) = fs::read_dir(statuses) {
                stats.local_posts += posts.flatten().count() as u64;
            }
        }
        stats
    }
}

/// Serves the well-known routes from one handler, keyed on the route id.
pub struct WellKnown {
    instance: InstanceIdentity,
    directory: Arc<dyn AccountDirectory>,
    contact: Option<String>,
}

impl WellKnown {
    pub fn new(
        instance: InstanceIdentity,
        directory: Arc<dyn AccountDirectory>,
        contact: Option<String>,
    ) -> Self {
        Self {
            instance,
            directory,
            contact,
        }
    }

    /// Routes this handler answers.
    pub const ROUTES: &'static [RouteId] = &[
        RouteId::WebFinger,
        RouteId::HostMeta,
        RouteId::NodeInfoLinks,
        RouteId::NodeInfo,
        RouteId::SecurityTxt,
    ];

    fn is_own_domain(&self, domain: &str) -> bool {
        [NetworkKind::Clearnet, NetworkKind::Onion, NetworkKind::I2p]
            .into_iter()
            .any(|n| self.instance.domain(n).is_some_and(|d| d.eq_ignore_ascii_case(domain)))
    }

    /// Nickname named by a WebFinger `resource`: `acct:nick@domain`, `nick@domain`, or a
    /// profile URL (`/users/nick`, `/@nick`) on one of our domains.
    #[must_use]
    pub fn resource_nickname(&self, resource: &str) -> Option<String> {
        let resource = resource.trim();
        if resource.starts_with("http://") || resource.starts_with("https://") {
            let url = Url::parse(resource).ok()?;
            if !self.is_own_domain(url.host_str()?) {
                return None;
            }
            let mut segs = url.path_segments()?.filter(|s| !s.is_empty());
            let nick = match (segs.next(), segs.next(), segs.next()) {
                (Some("users"), Some(nick), None) => nick,
                (Some(alias), None, None) => alias.strip_prefix('@')?,
                _ => return None,
            };
            return Some(nick.to_string());
        }
        let acct = resource.strip_prefix("acct:").unwrap_or(resource);
        let (nick, domain) = acct.trim_start_matches('@').split_once('@')?;
        self.is_own_domain(domain).then(|| nick.to_string())
    }

    fn webfinger(&self, req: &HandlerRequest) -> Option<HandlerOutput> {
        let resource = req.get_param("resource")?;
        let nick = self.resource_nickname(resource)?;
        if !self.directory.has_account(&nick) {
            debug!(request_id = %req.request_id, nickname = %nick, "W1: webfinger for unknown account");
            return None;
        }
        let actor = format!("{}/users/{nick}", req.origin);
        let profile = format!("{}/@{nick}", req.origin);
        let doc = json!({
            "subject": format!("acct:{nick}@{}", self.instance.clearnet),
            "aliases": [profile, actor],
            "links": [
                {"rel": "self", "type": "application/activity+json", "href": actor},
                {"rel": "http://webfinger.net/rel/profile-page", "type": "text/html", "href": profile},
            ],
        });
        Some(HandlerOutput::new(doc.to_string()).with_content_type(JRD))
    }

    fn host_meta(req: &HandlerRequest) -> HandlerOutput {
        let xrd = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <XRD xmlns=\"http://docs.oasis-open.org/ns/xri/xrd-1.0\">\n\
             <Link rel=\"lrdd\" type=\"application/xrd+xml\" template=\"{}/.well-known/webfinger?resource={{uri}}\"/>\n\
             </XRD>\n",
            req.origin
        );
        HandlerOutput::new(xrd).with_content_type(XRD)
    }

    fn nodeinfo_links(req: &HandlerRequest) -> HandlerOutput {
        let doc = json!({
            "links": [
                {
                    "rel": "http://nodeinfo.diaspora.software/ns/schema/2.0",
                    "href": format!("{}/nodeinfo/2.0", req.origin),
                },
                {
                    "rel": "http://nodeinfo.diaspora.software/ns/schema/2.1",
                    "href": format!("{}/nodeinfo/2.1", req.origin),
                },
            ]
        });
        HandlerOutput::new(doc.to_string()).with_content_type(JSON)
    }

    fn nodeinfo(&self, req: &HandlerRequest) -> Option<HandlerOutput> {
        let (version, content_type) = match req.get_param("version")? {
            "2.0" => ("2.0", NODEINFO_20),
            "2.1" => ("2.1", NODEINFO_21),
            _ => return None,
        };
        let stats = self.directory.stats();
        let doc = json!({
            "version": version,
            "software": {"name": env!("CARGO_PKG_NAME"), "version": env!("CARGO_PKG_VERSION")},
            "protocols": ["activitypub"],
            "services": {"inbound": [], "outbound": ["rss2.0"]},
            "openRegistrations": false,
            "usage": {
                "users": {"total": stats.users, "activeMonth": stats.users, "activeHalfyear": stats.users},
                "localPosts": stats.local_posts,
            },
            "metadata": {},
        });
        Some(HandlerOutput::new(doc.to_string()).with_content_type(content_type))
    }

    fn security_txt(&self) -> Option<HandlerOutput> {
        let contact = self.contact.as_deref()?;
        Some(
            HandlerOutput::new(format!("Contact: {contact}\nPreferred-Languages: en\n"))
                .with_content_type(PLAIN),
        )
    }
}

impl ResourceHandler for WellKnown {
    fn handle(&self, req: &HandlerRequest) -> Option<HandlerOutput> {
        match req.route {
            RouteId::WebFinger => self.webfinger(req),
            RouteId::HostMeta => Some(Self::host_meta(req)),
            RouteId::NodeInfoLinks => Some(Self::nodeinfo_links(req)),
            RouteId::NodeInfo => self.nodeinfo(req),
            RouteId::SecurityTxt => self.security_txt(),
            _ => None,
        }
    }
}
