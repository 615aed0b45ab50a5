//! The built-in handlers behind a dispatcher wired exactly as `fedrouter serve` wires it.

use fedrouter::cli::build_dispatcher;
use fedrouter::config::ServerConfig;
use fedrouter::server::Request;
use fedrouter::Dispatcher;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

mod common;
use common::{body_text, get, CLEARNET, ONION};

const TAG_INDEX: &str = r#"[
  {"title": "Ferris turns ten", "link": "https://social.example/users/alice/statuses/1",
   "published": "2025-05-15T10:00:00Z"},
  {"title": "Borrowing, explained", "link": "https://social.example/users/alice/statuses/3",
   "description": "a thread", "published": "2025-05-01T08:30:00Z"}
]"#;

const BLOG_INDEX: &str = r#"[
  {"title": "Why I moved my instance", "link": "https://social.example/blog/alice/7",
   "description": "Notes from the migration.", "published": "2025-06-02T12:00:00Z"}
]"#;

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn wired() -> (TempDir, Dispatcher) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "accounts/users/alice.json", r#"{"type":"Person"}"#);
    write(root, "accounts/users/alice/statuses/1.json", r#"{"to":["as:Public"]}"#);
    write(root, "accounts/users/alice/statuses/3.json", r#"{"to":["as:Public"]}"#);
    write(root, "accounts/tags/rust.json", TAG_INDEX);
    write(root, "accounts/blog/alice.json", BLOG_INDEX);
    write(root, "templates/about.html", "<h1>About {{ domain }}</h1>");

    let mut config = ServerConfig::default();
    config.instance.clearnet_domain = CLEARNET.to_string();
    config.instance.onion_domain = Some(ONION.to_string());
    config.paths.document_dir = Some(root.join("accounts"));
    config.paths.template_dir = Some(root.join("templates"));
    config.proxies.tor = None;
    config.proxies.i2p = None;
    config.security.session_secret = Some("test-secret".to_string());
    config.security.contact = Some("mailto:admin@social.example".to_string());

    let (dispatcher, _metrics) = build_dispatcher(&config).unwrap();
    (dir, dispatcher)
}

fn json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

#[test]
fn test_webfinger_for_local_account() {
    let (_dir, d) = wired();
    let resp = d.dispatch(&get("/.well-known/webfinger?resource=acct:alice@social.example", "*/*"));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.content_type(), Some("application/jrd+json"));
    let doc = json(&resp.body);
    assert_eq!(doc["subject"], "acct:alice@social.example");
    assert_eq!(doc["links"][0]["href"], "https://social.example/users/alice");

    let unknown = d.dispatch(&get("/.well-known/webfinger?resource=acct:bob@social.example", "*/*"));
    assert_eq!(unknown.status, 404);
    let foreign = d.dispatch(&get("/.well-known/webfinger?resource=acct:alice@elsewhere.example", "*/*"));
    assert_eq!(foreign.status, 404);
}

#[test]
fn test_webfinger_links_follow_onion_host() {
    let (_dir, d) = wired();
    let req = Request::get("/.well-known/webfinger?resource=acct:alice@abcdefghijklmnop.onion")
        .with_header("Host", ONION)
        .with_header("Accept", "application/jrd+json");
    let doc = json(&d.dispatch(&req).body);
    assert_eq!(doc["links"][0]["href"], "http://abcdefghijklmnop.onion/users/alice");
}

#[test]
fn test_nodeinfo_documents() {
    let (_dir, d) = wired();
    let links = json(&d.dispatch(&get("/.well-known/nodeinfo", "application/json")).body);
    assert_eq!(links["links"][1]["href"], "https://social.example/nodeinfo/2.1");

    let resp = d.dispatch(&get("/nodeinfo/2.0", "application/json"));
    assert!(resp.content_type().unwrap().contains("schema/2.0#"));
    let doc = json(&resp.body);
    assert_eq!(doc["software"]["name"], "fedrouter");
    assert_eq!(doc["usage"]["users"]["total"], 1);
    assert_eq!(doc["usage"]["localPosts"], 2);

    assert_eq!(d.dispatch(&get("/nodeinfo/3.0", "application/json")).status, 404);
}

#[test]
fn test_host_meta_and_security_txt() {
    let (_dir, d) = wired();
    let xrd = d.dispatch(&get("/.well-known/host-meta", "application/xrd+xml"));
    assert_eq!(xrd.content_type(), Some("application/xrd+xml"));
    assert!(body_text(&xrd).contains("https://social.example/.well-known/webfinger?resource={uri}"));

    let txt = d.dispatch(&get("/security.txt", "text/plain"));
    assert_eq!(txt.status, 200);
    assert!(body_text(&txt).starts_with("Contact: mailto:admin@social.example\n"));
}

#[test]
fn test_hashtag_feed() {
    let (_dir, d) = wired();
    let resp = d.dispatch(&get("/tags/rss2/Rust", "application/rss+xml"));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.content_type(), Some("text/xml; charset=UTF-8"));
    assert!(resp.get_header("last-modified").is_some());
    let body = body_text(&resp);
    assert!(body.contains("<title>#Rust</title>"));
    assert!(body.contains("Ferris turns ten"));
    assert!(body.contains("Borrowing, explained"));
}

#[test]
fn test_hashtag_without_posts_is_empty_feed() {
    let (_dir, d) = wired();
    let resp = d.dispatch(&get("/tags/rss2/python", "text/xml"));
    assert_eq!(resp.status, 200);
    let body = body_text(&resp);
    assert!(body.contains("<title>#python</title>"));
    assert_eq!(body.matches("<item>").count(), 0);
}

#[test]
fn test_blog_rss3_feed() {
    let (_dir, d) = wired();
    let resp = d.dispatch(&get("/blog/alice/rss.txt", "*/*"));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.content_type(), Some("text/plain; charset=utf-8"));
    assert!(resp.get_header("last-modified").is_some());
    let body = body_text(&resp);
    assert!(body.starts_with("title: alice's blog\n"));
    assert!(body.contains("title: Why I moved my instance\nlink: https://social.example/blog/alice/7\n"));

    assert_eq!(d.dispatch(&get("/blog/bob/rss.txt", "*/*")).status, 404);
}

#[test]
fn test_about_page_from_template() {
    let (_dir, d) = wired();
    let resp = d.dispatch(&get("/about", "text/html"));
    assert_eq!(resp.status, 200);
    assert_eq!(body_text(&resp), "<h1>About social.example</h1>");
    // no index.html template
    assert_eq!(d.dispatch(&get("/", "text/html")).status, 404);
}

#[test]
fn test_public_post_document_fallback_needs_signature() {
    let (_dir, d) = wired();
    // no post handler is registered; secure mode keeps raw documents from anonymous callers
    let resp = d.dispatch(&get("/users/alice/statuses/1", "application/activity+json"));
    assert_eq!(resp.status, 404);
}
