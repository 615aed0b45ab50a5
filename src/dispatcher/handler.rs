use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use crate::ids::RequestId;
use crate::negotiate::{Negotiated, RepresentationKind};
use crate::network::{NetworkIdentity, OutboundSession};
use crate::preferences::AccountPreferences;
use crate::router::{ParamVec, RouteId};
use crate::security::AuthContext;

/// Maximum inline headers/cookies before heap allocation.
/// Most requests have 16 headers or fewer.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header/cookie storage for the hot path.
///
/// Names are `Arc<str>`; values are per-request data.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Everything a [`ResourceHandler`] gets to see.
///
/// By the time a handler runs the route has been admitted, the caller authorized and the
/// representation chosen; the handler only produces content.
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    pub request_id: RequestId,
    pub route: RouteId,
    /// Decoded request path
    pub path: String,
    /// Parameters captured by the route
    pub params: ParamVec,
    pub query: ParamVec,
    pub headers: HeaderVec,
    pub cookies: HeaderVec,
    pub auth: AuthContext,
    pub representation: Negotiated,
    pub network: NetworkIdentity,
    /// Clearnet origin (`https://social.example`) for building self-links
    pub origin: String,
    /// Preferences of the captured account, defaults when none are stored
    pub preferences: AccountPreferences,
    /// Outbound session for the caller's network
    pub session: Arc<OutboundSession>,
}

impl HandlerRequest {
    /// Get a route parameter by name (last write wins).
    #[inline]
    #[must_use]
    pub fn get_param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by name (last write wins).
    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    #[must_use]
    pub fn nickname(&self) -> Option<&str> {
        self.get_param("nickname")
    }

    /// Page number captured by the route, 1 when the route is not paged.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.get_param("page").and_then(|p| p.parse().ok()).unwrap_or(1)
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> RepresentationKind {
        self.representation.kind
    }

    /// Convert params to a HashMap.
    /// Note: This allocates - use `get_param()` in hot paths
    #[must_use]
    pub fn params_map(&self) -> HashMap<String, String> {
        self.params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

/// What a handler produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerOutput {
    pub body: Vec<u8>,
    /// Overrides the negotiated MIME type
    pub content_type: Option<&'static str>,
    /// Extra response headers, typically `Set-Cookie`
    pub headers: HeaderVec,
    pub last_modified: Option<SystemTime>,
}

impl HandlerOutput {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: &'static str) -> Self {
        self.content_type = Some(content_type);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((Arc::from(name), value.into()));
        self
    }

    #[must_use]
    pub fn with_last_modified(mut self, at: SystemTime) -> Self {
        self.last_modified = Some(at);
        self
    }
}

/// Produces the content of one route.
///
/// Returning `None` declines the request; the dispatcher then tries the raw-document
/// fallback before answering 404.
pub trait ResourceHandler: Send + Sync {
    fn handle(&self, req: &HandlerRequest) -> Option<HandlerOutput>;
}

impl<F> ResourceHandler for F
where
    F: Fn(&HandlerRequest) -> Option<HandlerOutput> + Send + Sync,
{
    fn handle(&self, req: &HandlerRequest) -> Option<HandlerOutput> {
        self(req)
    }
}
