//! # Security Module
//!
//! The security module decides *who* is calling and *whether* they may see the matched route.
//!
//! ## Overview
//!
//! Two credentials are recognized:
//!
//! - **Local session** - a cookie (or `Authorization: Bearer`) token checked by a
//!   [`SessionValidator`]. The default is [`JwtSessionValidator`] (HS256, `sub` = nickname).
//! - **Federation signature** - an HTTP `Signature` header checked by a [`SignatureOracle`].
//!   The cryptography lives behind the oracle; this module only decides *when* to ask.
//!
//! ## Flow
//!
//! 1. [`AuthorizationGate::is_public`] decides whether the resource is visible to anyone,
//!    consulting the [`VisibilityOracle`] for object routes.
//! 2. [`AuthorizationGate::authenticate`] builds the immutable [`AuthContext`]. The signature
//!    oracle is called only when a signature is present, the caller does not want HTML, and
//!    the resource is not already public.
//! 3. [`AuthorizationGate::authorize`] maps the route's [`Access`] level to a decision.
//!
//! ## Decisions
//!
//! | Access     | No credential  | Local session              | Signature only |
//! |------------|----------------|----------------------------|----------------|
//! | `Public`   | allowed        | allowed                    | allowed        |
//! | `Object`   | 404 unless public | allowed                 | allowed        |
//! | `Signed`   | 401 in secure mode (JSON) | allowed         | allowed        |
//! | `Owner`    | 401            | 403 unless nickname matches | 405           |
//! | `PostOnly` | 405            | 405                        | 405            |

mod session_jwt;
mod signature;
mod visibility;

pub use session_jwt::{JwtSessionValidator, SessionClaims};
pub use signature::{key_id, key_id_domain, signature_params, UnverifiedSignatures};
pub use visibility::{DocumentVisibility, PUBLIC_COLLECTION};

use std::sync::Arc;
use tracing::{debug, warn};

use crate::dispatcher::HeaderVec;
use crate::error::{DispatchError, DispatchResult, NotFoundCode};
use crate::network::OutboundSession;
use crate::router::{Access, RouteMatch};

/// How much of an account's content the caller may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityScope {
    PublicOnly,
    Full,
}

/// Who the caller is, computed once per request.
///
/// There are no mutators; a new context means a new request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    is_locally_authenticated: bool,
    authorized_nickname: String,
    is_federation_signed: bool,
    visibility_scope: VisibilityScope,
}

impl AuthContext {
    fn new(nickname: Option<String>, signed: bool) -> Self {
        let local = nickname.is_some();
        Self {
            is_locally_authenticated: local,
            authorized_nickname: nickname.unwrap_or_default(),
            is_federation_signed: signed,
            visibility_scope: if local || signed {
                VisibilityScope::Full
            } else {
                VisibilityScope::PublicOnly
            },
        }
    }

    /// No credentials.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(None, false)
    }

    /// A logged-in local account.
    #[must_use]
    pub fn local(nickname: &str) -> Self {
        Self::new(Some(nickname.to_string()), false)
    }

    /// A verified federation peer.
    #[must_use]
    pub fn signed() -> Self {
        Self::new(None, true)
    }

    #[must_use]
    pub fn is_locally_authenticated(&self) -> bool {
        self.is_locally_authenticated
    }

    /// Nickname of the local session, empty when there is none.
    #[must_use]
    pub fn authorized_nickname(&self) -> &str {
        &self.authorized_nickname
    }

    #[must_use]
    pub fn is_federation_signed(&self) -> bool {
        self.is_federation_signed
    }

    #[must_use]
    pub fn visibility_scope(&self) -> VisibilityScope {
        self.visibility_scope
    }

    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.is_locally_authenticated || self.is_federation_signed
    }
}

/// Validates a local session token and returns the session's nickname.
pub trait SessionValidator: Send + Sync {
    fn validate(&self, token: &str) -> Option<String>;
}

/// Verifies an HTTP signature. Implementations may fetch the signer's key through `session`.
pub trait SignatureOracle: Send + Sync {
    fn verify(&self, session: &OutboundSession, headers: &HeaderVec, path: &str) -> bool;
}

/// Answers whether a stored object is addressed to the public.
pub trait VisibilityOracle: Send + Sync {
    fn is_public(&self, nickname: &str, object_id: &str) -> bool;
}

/// Everything is public. Useful for single-user instances and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllPublic;

impl VisibilityOracle for AllPublic {
    fn is_public(&self, _nickname: &str, _object_id: &str) -> bool {
        true
    }
}

/// Request data the gate inspects.
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    pub headers: &'a HeaderVec,
    pub cookies: &'a HeaderVec,
    /// Request target as sent, used for signature verification
    pub path: &'a str,
}

impl<'a> GateRequest<'a> {
    /// Get a header by name (case-insensitive)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&'a str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get a cookie by name
    #[inline]
    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<&'a str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// True when the request carries an HTTP signature.
    #[must_use]
    pub fn has_signature(&self) -> bool {
        self.get_header("signature").is_some()
            || self
                .get_header("authorization")
                .is_some_and(|v| v.starts_with("Signature "))
    }
}

/// Builds the [`AuthContext`] and authorizes matched routes.
pub struct AuthorizationGate {
    sessions: Arc<dyn SessionValidator>,
    signatures: Arc<dyn SignatureOracle>,
    visibility: Arc<dyn VisibilityOracle>,
    cookie_name: String,
    secure_mode: bool,
}

impl AuthorizationGate {
    /// Gate with the default session cookie (`session`) in secure mode.
    pub fn new(
        sessions: Arc<dyn SessionValidator>,
        signatures: Arc<dyn SignatureOracle>,
        visibility: Arc<dyn VisibilityOracle>,
    ) -> Self {
        Self {
            sessions,
            signatures,
            visibility,
            cookie_name: "session".to_string(),
            secure_mode: true,
        }
    }

    /// Configure the cookie name used to read the session token.
    #[must_use]
    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn secure_mode(mut self, enabled: bool) -> Self {
        self.secure_mode = enabled;
        self
    }

    #[must_use]
    pub fn is_secure_mode(&self) -> bool {
        self.secure_mode
    }

    fn session_nickname(&self, req: &GateRequest<'_>) -> Option<String> {
        let token = req.get_cookie(&self.cookie_name).or_else(|| {
            req.get_header("authorization")
                .and_then(|h| h.strip_prefix("Bearer "))
        })?;
        let nickname = self.sessions.validate(token.trim());
        if nickname.is_none() {
            debug!(cookie = %self.cookie_name, "A1: session token rejected");
        }
        nickname
    }

    /// Whether the resource is visible without any credential.
    #[must_use]
    pub fn is_public(&self, route: &RouteMatch, wants_html: bool) -> bool {
        match route.access() {
            Access::Public => true,
            Access::Object => match (route.nickname(), route.param("id")) {
                (Some(nick), Some(id)) => self.visibility.is_public(nick, id),
                _ => false,
            },
            Access::Signed => wants_html || !self.secure_mode,
            Access::Owner | Access::PostOnly => false,
        }
    }

    /// Build the caller's [`AuthContext`].
    ///
    /// The signature oracle is consulted only when a signature is present, the caller does not
    /// want HTML and the resource is not public.
    pub fn authenticate(
        &self,
        req: &GateRequest<'_>,
        public: bool,
        wants_html: bool,
        session: &OutboundSession,
    ) -> AuthContext {
        let nickname = self.session_nickname(req);
        let signed = if req.has_signature() && !wants_html && !public {
            let verified = self.signatures.verify(session, req.headers, req.path);
            if !verified {
                warn!(
                    key_id = req.get_header("signature").and_then(key_id).unwrap_or(""),
                    "A2: signature verification failed"
                );
            }
            verified
        } else {
            false
        };
        let ctx = AuthContext::new(nickname, signed);
        debug!(
            local = ctx.is_locally_authenticated,
            nickname = %ctx.authorized_nickname,
            signed = ctx.is_federation_signed,
            scope = ?ctx.visibility_scope,
            "A3: auth context built"
        );
        ctx
    }

    /// Decide whether `ctx` may see `route`.
    ///
    /// # Errors
    ///
    /// 401, 403, 404 (undisclosed) or 405 per the table in the module docs.
    pub fn authorize(&self, ctx: &AuthContext, route: &RouteMatch, public: bool) -> DispatchResult<()> {
        match route.access() {
            Access::PostOnly => Err(DispatchError::MethodNotAllowed),
            Access::Public => Ok(()),
            Access::Object => {
                if public || ctx.has_credentials() {
                    Ok(())
                } else {
                    Err(DispatchError::not_found(NotFoundCode::Undisclosed))
                }
            }
            Access::Signed => {
                if public || ctx.has_credentials() {
                    Ok(())
                } else {
                    Err(DispatchError::Unauthorized)
                }
            }
            Access::Owner => {
                let owner = route.nickname().unwrap_or_default();
                if ctx.is_locally_authenticated {
                    if ctx.authorized_nickname == owner {
                        Ok(())
                    } else {
                        Err(DispatchError::Forbidden)
                    }
                } else if ctx.is_federation_signed {
                    Err(DispatchError::MethodNotAllowed)
                } else {
                    Err(DispatchError::Unauthorized)
                }
            }
        }
    }

    /// Authenticate and authorize in one step.
    ///
    /// # Errors
    ///
    /// See [`AuthorizationGate::authorize`].
    pub fn check(
        &self,
        req: &GateRequest<'_>,
        route: &RouteMatch,
        wants_html: bool,
        session: &OutboundSession,
    ) -> DispatchResult<AuthContext> {
        let public = self.is_public(route, wants_html);
        let ctx = self.authenticate(req, public, wants_html, session);
        self.authorize(&ctx, route, public)?;
        Ok(ctx)
    }

    /// Context for the raw-document fallback, which has no route and is never public.
    pub fn authenticate_document(
        &self,
        req: &GateRequest<'_>,
        wants_html: bool,
        session: &OutboundSession,
    ) -> AuthContext {
        self.authenticate(req, false, wants_html, session)
    }
}
