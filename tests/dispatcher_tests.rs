//! Integration tests for the dispatch pipeline
//!
//! # Test Coverage
//!
//! Every stage of `Dispatcher::dispatch`, driven through transport-free `Request`s:
//! - method, path and classification rejections
//! - host resolution and blocklist decisions, including their ordering
//! - asset and media serving with conditional GET
//! - singleton guards, the heavy-route limiter and handler panics
//! - authorization per access level and content negotiation
//! - the raw-document fallback and onion/i2p body rewriting
//!
//! # Test Strategy
//!
//! Each test builds a fresh fixture (see `common`) so guard and limiter state never leaks
//! between tests.

use http::Method;
use fedrouter::server::Request;
use fedrouter::{HandlerOutput, HandlerRequest, RouteId};

mod common;
use common::{body_text, fixture, fixture_with, get, CLEARNET, I2P, ONION, SIGNATURE};

const HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const AP: &str = "application/activity+json";

#[test]
fn test_non_get_is_405() {
    let f = fixture();
    let req = Request::new(Method::POST, "/inbox")
        .with_header("Host", CLEARNET)
        .with_header("Accept", AP);
    assert_eq!(f.dispatch(&req).status, 405);
}

#[test]
fn test_traversal_is_400() {
    let f = fixture();
    let resp = f.dispatch(&get("/users/../etc/passwd", HTML));
    assert_eq!(resp.status, 400);
    assert_eq!(body_text(&resp), "Bad Request");
}

#[test]
fn test_unknown_path_is_404() {
    let f = fixture();
    let resp = f.dispatch(&get("/nothing/here", HTML));
    assert_eq!(resp.status, 404);
    assert_eq!(body_text(&resp), "Not Found");
}

#[test]
fn test_unknown_host_is_400() {
    let f = fixture();
    let req = Request::get("/users/alice")
        .with_header("Host", "elsewhere.example")
        .with_header("Accept", HTML);
    assert_eq!(f.dispatch(&req).status, 400);
    let no_host = Request::get("/users/alice").with_header("Accept", HTML);
    assert_eq!(f.dispatch(&no_host).status, 400);
}

#[test]
fn test_blocked_referer_and_signer_are_403() {
    let f = fixture();
    let req = get("/users/alice", HTML).with_header("Referer", "https://spam.example/@x");
    assert_eq!(f.dispatch(&req).status, 403);

    let req = get("/users/alice", AP).with_header(
        "Signature",
        r#"keyId="https://cdn.spam.example/actor#main-key",signature="eA==""#,
    );
    assert_eq!(f.dispatch(&req).status, 403);
}

#[test]
fn test_crawler_is_402_only_for_known_routes() {
    let f = fixture();
    let ua = "Mozilla/5.0 (compatible; GPTBot/1.0)";
    assert_eq!(f.dispatch(&get("/users/alice", HTML).with_header("User-Agent", ua)).status, 402);
    assert_eq!(f.dispatch(&get("/nothing/here", HTML).with_header("User-Agent", ua)).status, 404);
}

#[test]
fn test_blocked_hashtag_is_404() {
    let f = fixture();
    assert_eq!(f.dispatch(&get("/tags/nsfw", HTML)).status, 404);
    assert_eq!(f.dispatch(&get("/tags/rss2/NSFW", "application/rss+xml")).status, 404);
}

#[test]
fn test_missing_accept() {
    let f = fixture();
    let bare = Request::get("/users/alice").with_header("Host", CLEARNET);
    assert_eq!(f.dispatch(&bare).status, 400);

    let upgrade = Request::get("/users/alice")
        .with_header("Host", CLEARNET)
        .with_header("Connection", "Upgrade")
        .with_header("Upgrade", "websocket");
    let resp = f.dispatch(&upgrade);
    assert_eq!(resp.status, 200);
    assert!(resp.body.is_empty());
}

#[test]
fn test_asset_served_with_validators() {
    let f = fixture();
    let resp = f.dispatch(&get("/robots.txt", "*/*"));
    assert_eq!(resp.status, 200);
    assert_eq!(body_text(&resp), "User-agent: *\nDisallow: /\n");
    let etag = resp.get_header("etag").unwrap().to_string();

    let again = f.dispatch(&get("/robots.txt", "*/*").with_header("If-None-Match", &etag));
    assert_eq!(again.status, 304);
    assert!(again.body.is_empty());
    assert_eq!(again.get_header("etag"), Some(etag.as_str()));

    let icon = f.dispatch(&get("/icons/like.png", "image/*"));
    assert_eq!(icon.status, 200);
    assert_eq!(icon.body.len(), 7);
    assert_eq!(f.dispatch(&get("/icons/missing.png", "image/*")).status, 404);
}

#[test]
fn test_media_served_with_last_modified() {
    let f = fixture();
    let resp = f.dispatch(&get("/media/a1b2/photo.jpg", "image/*"));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, b"jpeg-bytes");
    assert!(resp.get_header("last-modified").is_some());
}

#[test]
fn test_busy_guard_is_503() {
    let f = fixture();
    let held = f.dispatcher.state().guards.try_acquire("followers_sync").unwrap();
    let req = get("/users/alice/followers_synchronization", AP).with_header("Signature", SIGNATURE);
    let resp = f.dispatch(&req);
    assert_eq!(resp.status, 503);
    assert_eq!(body_text(&resp), "Service Unavailable");

    drop(held);
    assert_eq!(f.dispatch(&req).status, 200);
    assert!(!f.dispatcher.state().guards.is_held("followers_sync"));
}

#[test]
fn test_busy_guard_wins_over_missing_credentials() {
    let f = fixture();
    let _held = f.dispatcher.state().guards.try_acquire("followers_sync").unwrap();
    let resp = f.dispatch(&get("/users/alice/followers_synchronization", AP));
    assert_eq!(resp.status, 503);
}

#[test]
fn test_vcard_guard_only_for_vcard() {
    let f = fixture();
    let _held = f.dispatcher.state().guards.try_acquire("vcard").unwrap();
    assert_eq!(f.dispatch(&get("/users/alice", "text/vcard")).status, 503);
    assert_eq!(f.dispatch(&get("/users/alice.vcf", HTML)).status, 503);
    assert_eq!(f.dispatch(&get("/users/alice", HTML)).status, 200);
}

#[test]
fn test_heavy_routes_are_rate_limited() {
    let f = fixture();
    let req = get("/users/alice/tlbookmarks?page=3", HTML).with_header("Cookie", "session=token-alice");
    let first = f.dispatch(&req);
    assert_eq!(first.status, 200);
    assert_eq!(body_text(&first), "tlbookmarks page 3");

    let second = f.dispatch(&req);
    assert_eq!(second.status, 429);
    assert_eq!(body_text(&second), "Too Many Requests");
}

#[test]
fn test_handler_panic_is_503_and_releases_guard() {
    let f = fixture();
    let resp = f.dispatch(&get("/api/v1/instance", "application/json"));
    assert_eq!(resp.status, 503);
    assert_eq!(body_text(&resp), "Service Unavailable");
    assert!(!f.dispatcher.state().guards.is_held("masto_api"));
    assert!(f.dispatcher.state().guards.try_acquire("masto_api").is_some());
}

#[test]
fn test_owner_route_decisions() {
    let f = fixture();
    assert_eq!(f.dispatch(&get("/users/alice/calendar", HTML)).status, 401);

    let bob = get("/users/alice/calendar", HTML).with_header("Cookie", "session=token-bob");
    assert_eq!(f.dispatch(&bob).status, 403);

    let peer = get("/users/alice/calendar", AP).with_header("Signature", SIGNATURE);
    assert_eq!(f.dispatch(&peer).status, 405);

    let alice = get("/users/alice/calendar", HTML).with_header("Cookie", "session=token-alice");
    let resp = f.dispatch(&alice);
    assert_eq!(resp.status, 200);
    assert_eq!(body_text(&resp), "calendar tz=Europe/Berlin");
    assert_eq!(resp.content_type(), Some("text/html; charset=utf-8"));
}

#[test]
fn test_inbox_for_owner_and_strangers() {
    let f = fixture();
    let alice = get("/users/alice/inbox", HTML).with_header("Cookie", "session=token-alice");
    let resp = f.dispatch(&alice);
    assert_eq!(resp.status, 200);
    assert_eq!(body_text(&resp), "inbox of alice as html");
    assert_eq!(resp.content_type(), Some("text/html; charset=utf-8"));

    let alice_json = get("/users/alice/inbox", AP).with_header("Cookie", "session=token-alice");
    assert_eq!(body_text(&f.dispatch(&alice_json)), "inbox of alice as activity_json");

    assert_eq!(f.dispatch(&get("/users/alice/inbox", AP)).status, 401);
    assert_eq!(f.dispatch(&get("/users/alice/inbox", HTML)).status, 401);

    let bob = get("/users/alice/inbox", HTML).with_header("Cookie", "session=token-bob");
    assert_eq!(f.dispatch(&bob).status, 403);
}

#[test]
fn test_json_only_route_refuses_html() {
    let f = fixture();
    let resp = f.dispatch(&get("/users/alice/collections/tags", HTML));
    assert_eq!(resp.status, 404);

    let resp = f.dispatch(&get("/users/alice/collections/tags", "text/html"));
    assert_eq!(resp.status, 404);

    let resp = f.dispatch(&get("/users/alice/collections/tags", AP));
    assert_eq!(resp.status, 200);
    assert!(body_text(&resp).contains("Collection"));
}

#[test]
fn test_html_only_route_refuses_json() {
    // fresh fixtures: the hashtag page is rate limited
    let f = fixture();
    assert_eq!(f.dispatch(&get("/tags/rust", AP)).status, 404);

    let f = fixture();
    let resp = f.dispatch(&get("/tags/rust", HTML));
    assert_eq!(resp.status, 200);
    assert_eq!(body_text(&resp), "#rust");
}

#[test]
fn test_guarded_route_busy_while_handler_runs() {
    use std::sync::{Arc, Barrier};

    let mut f = fixture();
    let entered = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let (handler_entered, handler_release) = (Arc::clone(&entered), Arc::clone(&release));
    f.dispatcher.register(
        RouteId::MastoPeers,
        move |_req: &HandlerRequest| {
            handler_entered.wait();
            handler_release.wait();
            Some(HandlerOutput::new("[]"))
        },
    );

    let dispatcher = &f.dispatcher;
    let (held, busy, first) = std::thread::scope(|s| {
        let first = s.spawn(|| dispatcher.dispatch(&get("/api/v1/instance/peers", "application/json")));
        entered.wait();
        let held = dispatcher.state().guards.is_held("masto_api");
        let busy = dispatcher.dispatch(&get("/api/v1/instance/peers", "application/json"));
        release.wait();
        (held, busy, first.join().unwrap())
    });

    assert!(held);
    assert_eq!(busy.status, 503);
    assert_eq!(body_text(&busy), "Service Unavailable");
    assert_eq!(first.status, 200);
    assert_eq!(body_text(&first), "[]");
    assert!(!dispatcher.state().guards.is_held("masto_api"));
}

#[test]
fn test_bearer_token_is_a_session() {
    let f = fixture();
    let req = get("/users/alice/calendar.ics", "*/*").with_header("Authorization", "Bearer token-alice");
    let resp = f.dispatch(&req);
    assert_eq!(resp.status, 200);
    assert_eq!(resp.content_type(), Some("text/calendar"));
}

#[test]
fn test_undisclosed_object_is_404() {
    let f = fixture();
    let public = f.dispatch(&get("/users/alice/statuses/1", AP));
    assert_eq!(public.status, 200);
    assert_eq!(body_text(&public), "post 1 as activity_json");

    let hidden = f.dispatch(&get("/users/alice/statuses/2", AP));
    assert_eq!(hidden.status, 404);
    assert_eq!(body_text(&hidden), "Not Found");

    let signed = f.dispatch(&get("/users/alice/statuses/2", AP).with_header("Signature", SIGNATURE));
    assert_eq!(signed.status, 200);
    assert_eq!(f.signatures.calls(), 1);
}

#[test]
fn test_signed_collection_in_secure_mode() {
    let f = fixture();
    let path = "/users/alice/followers_synchronization";
    assert_eq!(f.dispatch(&get(path, AP)).status, 401);

    let resp = f.dispatch(&get(path, AP).with_header("Signature", SIGNATURE));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.content_type(), Some(AP));
    assert_eq!(f.signatures.calls(), 1);
}

#[test]
fn test_html_requests_never_verify_signatures() {
    let f = fixture();
    let resp = f.dispatch(&get("/users/alice/followers", HTML).with_header("Signature", SIGNATURE));
    assert_eq!(resp.status, 200);
    assert_eq!(f.signatures.calls(), 0);
}

#[test]
fn test_open_mode_serves_collections_unsigned() {
    let f = fixture_with(|c| c.http.secure_mode = false);
    assert_eq!(f.dispatch(&get("/users/alice/followers_synchronization", AP)).status, 200);
    assert_eq!(f.signatures.calls(), 0);
}

#[test]
fn test_negotiation() {
    let f = fixture();
    let html = f.dispatch(&get("/users/alice", HTML));
    assert_eq!(html.content_type(), Some("text/html; charset=utf-8"));
    assert!(body_text(&html).starts_with("<a href"));

    let json = f.dispatch(&get("/@alice", AP));
    assert_eq!(json.content_type(), Some(AP));

    let suffixed = f.dispatch(&get("/users/alice.json", HTML));
    assert_eq!(suffixed.content_type(), Some(AP));

    let vcard = f.dispatch(&get("/users/alice", "application/vcard+xml"));
    assert_eq!(vcard.content_type(), Some("application/vcard+xml"));

    assert_eq!(f.dispatch(&get("/users/alice/statuses/1.csv", "*/*")).status, 404);
    assert_eq!(f.dispatch(&get("/users/alice", "text/calendar")).status, 404);
}

#[test]
fn test_handler_headers_are_passed_through() {
    let f = fixture();
    let resp = f.dispatch(&get("/users/alice", HTML));
    assert_eq!(resp.get_header("set-cookie"), Some("seen=1"));
}

#[test]
fn test_declined_handler_without_document_is_404() {
    let f = fixture();
    assert_eq!(f.dispatch(&get("/users/bob", HTML)).status, 404);
}

#[test]
fn test_document_fallback_follows_secure_mode() {
    let secure = fixture();
    assert_eq!(secure.dispatch(&get("/users/alice/collections/featured", AP)).status, 404);

    let open = fixture_with(|c| c.http.secure_mode = false);
    let resp = open.dispatch(&get("/users/alice/collections/featured", AP));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.content_type(), Some(AP));
    assert!(body_text(&resp).contains("OrderedCollection"));

    // browsers never get raw documents
    assert_eq!(open.dispatch(&get("/users/alice/collections/featured", HTML)).status, 404);
}

#[test]
fn test_unrouted_documents_need_a_signature() {
    let f = fixture();
    assert_eq!(f.dispatch(&get("/system/relay", AP)).status, 404);

    let resp = f.dispatch(&get("/system/relay", AP).with_header("Signature", SIGNATURE));
    assert_eq!(resp.status, 200);
    assert!(body_text(&resp).contains("\"Service\""));

    let broken = f.dispatch(&get("/system/broken", AP).with_header("Signature", SIGNATURE));
    assert_eq!(broken.status, 400);

    let missing = f.dispatch(&get("/system/absent", AP).with_header("Signature", SIGNATURE));
    assert_eq!(missing.status, 404);
}

#[test]
fn test_onion_callers_get_onion_links() {
    let f = fixture();
    let req = Request::get("/users/alice")
        .with_header("Host", ONION)
        .with_header("Accept", HTML);
    let body = body_text(&f.dispatch(&req));
    assert!(body.contains("href=\"http://abcdefghijklmnop.onion/users/alice\""));
    assert!(body.contains("https://other.example/x"));
    assert!(!body.contains("https://social.example"));
}

#[test]
fn test_i2p_callers_get_i2p_links_in_json() {
    let f = fixture();
    let req = Request::get("/users/alice")
        .with_header("Host", I2P)
        .with_header("Accept", AP);
    let body = body_text(&f.dispatch(&req));
    assert!(body.contains(r#""id":"http://social.i2p/users/alice""#));
    assert!(body.contains("https://other.example/x"));
}

#[test]
fn test_clearnet_bodies_are_untouched() {
    let f = fixture();
    let body = body_text(&f.dispatch(&get("/users/alice", AP)));
    assert!(body.contains(r#""id":"https://social.example/users/alice""#));
}

#[test]
fn test_conditional_get_on_dynamic_response() {
    let f = fixture();
    let first = f.dispatch(&get("/users/alice/statuses/1", AP));
    let etag = first.get_header("etag").unwrap().to_string();

    let second = f.dispatch(&get("/users/alice/statuses/1", AP).with_header("If-None-Match", &etag));
    assert_eq!(second.status, 304);
    assert!(second.body.is_empty());
    assert!(second.content_type().is_none());

    let changed = f.dispatch(&get("/users/alice/statuses/1", AP).with_header("If-None-Match", "\"other\""));
    assert_eq!(changed.status, 200);
}

#[test]
fn test_head_has_headers_but_no_body() {
    let f = fixture();
    let req = Request::new(Method::HEAD, "/users/alice")
        .with_header("Host", CLEARNET)
        .with_header("Accept", HTML);
    let resp = f.dispatch(&req);
    assert_eq!(resp.status, 200);
    assert!(resp.body.is_empty());
    assert_eq!(resp.content_type(), Some("text/html; charset=utf-8"));
}

#[test]
fn test_every_response_carries_request_id() {
    let f = fixture();
    let ok = get("/users/alice", HTML);
    let resp = f.dispatch(&ok);
    assert_eq!(resp.get_header("x-request-id"), Some(ok.request_id.to_string().as_str()));

    let missing = get("/nothing", HTML);
    let resp = f.dispatch(&missing);
    assert_eq!(resp.get_header("x-request-id"), Some(missing.request_id.to_string().as_str()));
}
