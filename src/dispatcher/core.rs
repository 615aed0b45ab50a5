//! Dispatcher core module - hot path for request dispatch.
//!
//! Allocation-heavy lints are denied here; the few allocations that remain are the response
//! body and header values.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use arc_swap::ArcSwap;
use http::Method;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{debug, error, info, warn};

use super::documents::{FsDocumentStore, RawDocumentStore};
use super::handler::{HandlerOutput, HandlerRequest, HeaderVec, ResourceHandler};
use super::state::DispatchState;
use crate::cache::{etag_for, http_date, CacheClass, CacheOutcome, Conditional};
use crate::config::ServerConfig;
use crate::error::{DispatchError, DispatchResult, MalformedCode, NotFoundCode};
use crate::guard::GuardHandle;
use crate::hot_reload::BlocklistHandle;
use crate::middleware::Middleware;
use crate::negotiate::{self, Negotiated, RepresentationKind};
use crate::network::{
    select_network, BoundaryRewriter, DomainRewriter, InstanceIdentity, NetworkIdentity,
    NetworkIdentityResolver, NetworkKind, OutboundSession, SessionProvider,
};
use crate::preferences::PreferencesStore;
use crate::router::{Admission, PathView, RouteClassifier, RouteId, RouteMatch, Target};
use crate::security::{key_id_domain, AuthContext, AuthorizationGate, GateRequest};
use crate::server::Request;
use crate::static_files::StaticFiles;

/// A finished response, ready to be written to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderVec,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderVec::new(),
            body: Vec::new(),
        }
    }

    /// Plain-text error response. The body never carries the diagnostic code.
    #[must_use]
    pub fn from_error(err: &DispatchError) -> Self {
        let mut resp = Self::new(err.status());
        resp.set_header("Content-Type", "text/plain; charset=utf-8");
        resp.body = err.public_message().as_bytes().to_vec();
        resp
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set a header, replacing any earlier value of the same name.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some((_, v)) => *v = value,
            None => self.headers.push((Arc::from(name), value)),
        }
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.get_header("content-type")
    }
}

/// Representations whose bodies are text and get same-origin URL rewriting.
fn is_textual(mime: &str) -> bool {
    mime.starts_with("text/") || mime.contains("json") || mime.contains("xml")
}

/// `Connection: Upgrade` or an `Upgrade` header: a protocol switch, not a resource fetch.
fn is_upgrade_request(req: &Request) -> bool {
    req.get_header("upgrade").is_some()
        || req
            .get_header("connection")
            .is_some_and(|c| c.split(',').any(|t| t.trim().eq_ignore_ascii_case("upgrade")))
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Runs one request through the fixed stage order and produces its response.
///
/// Stages, each of which may end the request:
///
/// 1. method (405)
/// 2. path normalization (400)
/// 3. classification, or a stored raw document (404)
/// 4. `Host` against the configured identities (400)
/// 5. blocked referer or signer domain (403), blocked crawler (402), blocked hashtag (404)
/// 6. `Accept` precheck (400, or a bare 200 for upgrade requests)
/// 7. fast path: asset and media routes are answered from the response cache
/// 8. admission: singleton guard (503) or heavy-route limiter (429)
/// 9. authorization (401/403/404/405)
/// 10. content negotiation (404)
/// 11. preferences and handler invocation (503 on panic)
/// 12. raw-document fallback when the handler declines
/// 13. same-origin URL rewriting for onion and i2p callers
/// 14. ETag and conditional GET (304)
pub struct Dispatcher {
    classifier: RouteClassifier,
    resolver: NetworkIdentityResolver,
    gate: AuthorizationGate,
    sessions: Arc<dyn SessionProvider>,
    rewriter: Arc<dyn DomainRewriter>,
    handlers: HashMap<RouteId, Arc<dyn ResourceHandler>>,
    documents: Option<Arc<dyn RawDocumentStore>>,
    preferences: Option<Arc<dyn PreferencesStore>>,
    blocklist: BlocklistHandle,
    middlewares: Vec<Arc<dyn Middleware>>,
    state: DispatchState,
    /// Clearnet origin handed to handlers for self-links
    origin: String,
}

impl Dispatcher {
    /// Dispatcher for `config`. The gate's cookie name and secure mode are taken from the
    /// configuration; handlers, middleware and stores are added afterwards.
    pub fn new(
        config: &ServerConfig,
        gate: AuthorizationGate,
        sessions: Arc<dyn SessionProvider>,
    ) -> Self {
        let instance = InstanceIdentity::from_config(&config.instance);
        let origin = instance.origin(NetworkKind::Clearnet).unwrap_or_default();
        let documents = config.paths.document_dir.clone().map(|dir| {
            Arc::new(FsDocumentStore::new(StaticFiles::new(dir))) as Arc<dyn RawDocumentStore>
        });
        info!(
            domain = %instance.clearnet,
            onion = ?instance.onion,
            i2p = ?instance.i2p,
            secure_mode = config.http.secure_mode,
            "Dispatcher configured"
        );
        Self {
            classifier: RouteClassifier::new(),
            resolver: NetworkIdentityResolver::new(instance),
            gate: gate
                .cookie_name(config.http.session_cookie.as_str())
                .secure_mode(config.http.secure_mode),
            sessions,
            rewriter: Arc::new(BoundaryRewriter),
            handlers: HashMap::new(),
            documents,
            preferences: None,
            blocklist: Arc::new(ArcSwap::from_pointee(config.blocklist.clone())),
            middlewares: Vec::new(),
            state: DispatchState::from_config(&config.limits, &config.paths),
            origin,
        }
    }

    /// Register the handler for a route, replacing any earlier one.
    pub fn register_handler(&mut self, route: RouteId, handler: Arc<dyn ResourceHandler>) {
        debug!(route = %route, "handler registered");
        self.handlers.insert(route, handler);
    }

    pub fn register<H: ResourceHandler + 'static>(&mut self, route: RouteId, handler: H) {
        self.register_handler(route, Arc::new(handler));
    }

    #[must_use]
    pub fn has_handler(&self, route: RouteId) -> bool {
        self.handlers.contains_key(&route)
    }

    pub fn add_middleware(&mut self, mw: Arc<dyn Middleware>) {
        self.middlewares.push(mw);
    }

    pub fn set_document_store(&mut self, store: Arc<dyn RawDocumentStore>) {
        self.documents = Some(store);
    }

    pub fn set_preferences_store(&mut self, store: Arc<dyn PreferencesStore>) {
        self.preferences = Some(store);
    }

    pub fn set_rewriter(&mut self, rewriter: Arc<dyn DomainRewriter>) {
        self.rewriter = rewriter;
    }

    pub fn set_state(&mut self, state: DispatchState) {
        self.state = state;
    }

    #[must_use]
    pub fn state(&self) -> &DispatchState {
        &self.state
    }

    #[must_use]
    pub fn classifier(&self) -> &RouteClassifier {
        &self.classifier
    }

    #[must_use]
    pub fn resolver(&self) -> &NetworkIdentityResolver {
        &self.resolver
    }

    /// Shared blocklist, for the config watcher and for handlers that honor it.
    #[must_use]
    pub fn blocklist_handle(&self) -> BlocklistHandle {
        Arc::clone(&self.blocklist)
    }

    /// Dispatch one request. Never fails: every error becomes its status response.
    pub fn dispatch(&self, req: &Request) -> HttpResponse {
        let start = Instant::now();

        let early = self.middlewares.iter().find_map(|mw| mw.before(req));
        let mut resp = match early {
            Some(resp) => resp,
            None => self.run(req).unwrap_or_else(|e| Self::reject(req, &e)),
        };

        resp.set_header("X-Request-Id", req.request_id.to_string());
        if req.is_head() {
            resp.body.clear();
        }

        let latency = start.elapsed();
        for mw in &self.middlewares {
            mw.after(req, &mut resp, latency);
        }
        resp
    }

    fn reject(req: &Request, err: &DispatchError) -> HttpResponse {
        let status = err.status();
        match err {
            DispatchError::HandlerFailed => {
                error!(request_id = %req.request_id, path = %req.path(), status, error = %err, "D9: request failed");
            }
            e if e.is_busy() => {
                info!(request_id = %req.request_id, path = %req.path(), status, error = %err, "D9: request refused");
            }
            _ => {
                debug!(request_id = %req.request_id, path = %req.path(), status, error = %err, "D9: request rejected");
            }
        }
        HttpResponse::from_error(err)
    }

    fn run(&self, req: &Request) -> DispatchResult<HttpResponse> {
        // 1. method
        if req.method != Method::GET && req.method != Method::HEAD {
            return Err(DispatchError::MethodNotAllowed);
        }

        // 2. path
        let view = PathView::parse(&req.target)?;

        // 3. classification
        let route = self.classifier.classify(&view);
        if route.is_none() && !self.document_exists(&view.path) {
            return Err(DispatchError::not_found(NotFoundCode::NoRoute));
        }

        // 4. network identity
        let identity = self.resolver.resolve(
            req.get_header("host"),
            req.get_header("referer"),
            req.get_header("signature"),
            req.get_header("user-agent"),
        )?;

        // 5. blocklist
        self.check_blocklist(req, &identity, route.as_ref())?;

        // 6. Accept precheck
        let accept = match req.get_header("accept").map(str::trim).filter(|a| !a.is_empty()) {
            Some(accept) => accept,
            None if is_upgrade_request(req) => {
                debug!(request_id = %req.request_id, "D3: upgrade request answered");
                return Ok(HttpResponse::new(200));
            }
            None => return Err(DispatchError::malformed(MalformedCode::MissingAccept)),
        };

        let cond = Conditional {
            if_none_match: req.get_header("if-none-match"),
            if_modified_since: req.get_header("if-modified-since"),
        };

        let Some(route) = route else {
            return self.serve_stored_document(req, &view, &identity, accept, &cond);
        };

        // 7. fast path for files
        match route.target() {
            Target::Asset => return self.serve_file(CacheClass::Static, &route, &cond),
            Target::Media => return self.serve_file(CacheClass::Media, &route, &cond),
            Target::Handler => {}
        }

        // 8. admission; the guard is held until this function returns
        let _guard = self.admit(&route, accept)?;

        // 9. authorization
        let wants_html = negotiate::wants_html(route.format_suffix, accept);
        let session = self.sessions.session(select_network(&identity));
        let gate_req = GateRequest {
            headers: &req.headers,
            cookies: &req.cookies,
            path: &req.target,
        };
        let auth = self.gate.check(&gate_req, &route, wants_html, &session)?;
        let signed = auth.is_federation_signed();

        // 10. negotiation
        let negotiated = negotiate::negotiate(route.format_suffix, accept, &auth, route.representations())?;
        debug!(
            request_id = %req.request_id,
            route = %route.id(),
            representation = %negotiated.kind,
            "D4: representation chosen"
        );

        // 11. preferences and handler
        let active = identity.active;
        let hreq = self.handler_request(req, &view, &route, auth, negotiated, identity, session);
        let output = self.invoke(&route, &hreq)?;

        // 12. fallback
        let (body, content_type, extra, last_modified) = match output {
            Some(out) => (
                out.body,
                out.content_type.unwrap_or(negotiated.mime),
                out.headers,
                out.last_modified,
            ),
            None => {
                if !self.document_allowed(wants_html, signed) {
                    return Err(DispatchError::not_found(NotFoundCode::HandlerDeclined));
                }
                let body = self.load_document(&view.path)?;
                (body, RepresentationKind::ActivityJson.mime(), HeaderVec::new(), None)
            }
        };

        // 13 and 14
        Ok(self.finish(active, body, content_type, extra, last_modified, &cond))
    }

    fn check_blocklist(
        &self,
        req: &Request,
        identity: &NetworkIdentity,
        route: Option<&RouteMatch>,
    ) -> DispatchResult<()> {
        let blocklist = self.blocklist.load();
        let signer = req.get_header("signature").and_then(key_id_domain);
        for domain in identity.referer_domain.iter().chain(signer.iter()) {
            if blocklist.is_blocked_domain(domain) {
                warn!(request_id = %req.request_id, domain = %domain, "D2: blocked domain");
                return Err(DispatchError::Forbidden);
            }
        }
        if let Some(ua) = req.get_header("user-agent") {
            if blocklist.is_blocked_crawler(ua) {
                info!(request_id = %req.request_id, user_agent = %ua, "D2: blocked crawler");
                return Err(DispatchError::PaymentRequired);
            }
        }
        if let Some(tag) = route.and_then(|r| r.param("tag")) {
            if blocklist.is_blocked_hashtag(tag) {
                debug!(request_id = %req.request_id, tag = %tag, "D2: blocked hashtag");
                return Err(DispatchError::not_found(NotFoundCode::BlockedHashtag));
            }
        }
        Ok(())
    }

    fn acquire(&self, name: &'static str) -> DispatchResult<GuardHandle> {
        self.state
            .guards
            .try_acquire(name)
            .ok_or(DispatchError::GuardBusy { guard: name })
    }

    fn admit(&self, route: &RouteMatch, accept: &str) -> DispatchResult<Option<GuardHandle>> {
        match route.admission() {
            Admission::None => Ok(None),
            Admission::Guard(name) => self.acquire(name).map(Some),
            Admission::GuardFor(kind, name) => {
                if negotiate::requests(kind, route.format_suffix, accept) {
                    self.acquire(name).map(Some)
                } else {
                    Ok(None)
                }
            }
            Admission::RateLimited => {
                if route.is_fast_path() || self.state.limiter.try_admit() {
                    Ok(None)
                } else {
                    Err(DispatchError::RateLimited)
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn handler_request(
        &self,
        req: &Request,
        view: &PathView,
        route: &RouteMatch,
        auth: AuthContext,
        representation: Negotiated,
        network: NetworkIdentity,
        session: Arc<OutboundSession>,
    ) -> HandlerRequest {
        let preferences = route
            .nickname()
            .and_then(|nick| self.preferences.as_ref().and_then(|store| store.load(nick)))
            .unwrap_or_default();
        HandlerRequest {
            request_id: req.request_id,
            route: route.id(),
            path: view.path.clone(),
            params: route.params.clone(),
            query: view.query.clone(),
            headers: req.headers.clone(),
            cookies: req.cookies.clone(),
            auth,
            representation,
            network,
            origin: self.origin.clone(),
            preferences,
            session,
        }
    }

    fn invoke(&self, route: &RouteMatch, hreq: &HandlerRequest) -> DispatchResult<Option<HandlerOutput>> {
        let Some(handler) = self.handlers.get(&route.id()) else {
            debug!(route = %route.id(), "H1: no handler registered");
            return Ok(None);
        };
        let start = Instant::now();
        match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(hreq))) {
            Ok(output) => {
                debug!(
                    request_id = %hreq.request_id,
                    route = %route.id(),
                    declined = output.is_none(),
                    elapsed_us = start.elapsed().as_micros() as u64,
                    "H2: handler returned"
                );
                Ok(output)
            }
            Err(panic) => {
                error!(
                    request_id = %hreq.request_id,
                    route = %route.id(),
                    panic_message = %panic_message(panic.as_ref()),
                    "H3: handler panicked"
                );
                Err(DispatchError::HandlerFailed)
            }
        }
    }

    fn document_exists(&self, path: &str) -> bool {
        self.documents.as_ref().is_some_and(|d| d.exists(path))
    }

    /// Raw documents go to callers that do not want HTML, and only to signed callers when
    /// secure mode is on.
    fn document_allowed(&self, wants_html: bool, signed: bool) -> bool {
        !wants_html && (!self.gate.is_secure_mode() || signed)
    }

    fn load_document(&self, path: &str) -> DispatchResult<Vec<u8>> {
        let bytes = self
            .documents
            .as_ref()
            .and_then(|d| d.load(path))
            .ok_or(DispatchError::not_found(NotFoundCode::NoDocument))?;
        if let Err(e) = serde_json::from_slice::<serde::de::IgnoredAny>(&bytes) {
            warn!(path = %path, error = %e, "D7: stored document is not valid JSON");
            return Err(DispatchError::malformed(MalformedCode::StoredDocument));
        }
        Ok(bytes)
    }

    fn serve_stored_document(
        &self,
        req: &Request,
        view: &PathView,
        identity: &NetworkIdentity,
        accept: &str,
        cond: &Conditional<'_>,
    ) -> DispatchResult<HttpResponse> {
        let wants_html = negotiate::wants_html(view.format_suffix, accept);
        let session = self.sessions.session(select_network(identity));
        let gate_req = GateRequest {
            headers: &req.headers,
            cookies: &req.cookies,
            path: &req.target,
        };
        let auth = self.gate.authenticate_document(&gate_req, wants_html, &session);
        if !self.document_allowed(wants_html, auth.is_federation_signed()) {
            return Err(DispatchError::not_found(NotFoundCode::NoRoute));
        }
        let body = self.load_document(&view.path)?;
        debug!(request_id = %req.request_id, path = %view.path, "D7: stored document served");
        Ok(self.finish(
            identity.active,
            body,
            RepresentationKind::ActivityJson.mime(),
            HeaderVec::new(),
            None,
            cond,
        ))
    }

    fn serve_file(
        &self,
        class: CacheClass,
        route: &RouteMatch,
        cond: &Conditional<'_>,
    ) -> DispatchResult<HttpResponse> {
        let rel = route
            .param("file")
            .ok_or(DispatchError::not_found(NotFoundCode::NoDocument))?;
        let outcome = self.state.cache.serve(class, rel, cond)?;
        let mut resp = HttpResponse::new(outcome.status());
        let entry = outcome.entry();
        resp.set_header("ETag", entry.etag.as_str());
        resp.set_header("Last-Modified", http_date(entry.last_modified));
        if let CacheOutcome::Fresh(entry) = &outcome {
            resp.set_header("Content-Type", entry.mime);
            resp.body = entry.bytes.to_vec();
        }
        Ok(resp)
    }

    fn rewrite(&self, active: NetworkKind, content_type: &str, body: Vec<u8>) -> Vec<u8> {
        if !is_textual(content_type) {
            return body;
        }
        let Some(map) = self.resolver.identity_map(active) else {
            return body;
        };
        match String::from_utf8(body) {
            Ok(text) => {
                debug!(network = %active, "N2: body rewritten for caller network");
                self.rewriter.rewrite(&text, &map).into_bytes()
            }
            Err(e) => e.into_bytes(),
        }
    }

    fn finish(
        &self,
        active: NetworkKind,
        body: Vec<u8>,
        content_type: &'static str,
        extra: HeaderVec,
        last_modified: Option<SystemTime>,
        cond: &Conditional<'_>,
    ) -> HttpResponse {
        // 13. rewrite
        let body = self.rewrite(active, content_type, body);

        // 14. conditional GET
        let etag = etag_for(&body);
        let not_modified = cond.is_not_modified(&etag, last_modified);
        let mut resp = HttpResponse::new(if not_modified { 304 } else { 200 });
        resp.set_header("ETag", etag);
        if let Some(at) = last_modified {
            resp.set_header("Last-Modified", http_date(at));
        }
        resp.headers.extend(extra);
        if !not_modified {
            resp.set_header("Content-Type", content_type);
            resp.body = body;
        }
        resp
    }
}
