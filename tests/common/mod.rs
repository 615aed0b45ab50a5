#![allow(dead_code)]

//! Shared fixtures: an instance with three network identities, a populated asset, media and
//! document tree, fake credentials, and a handful of registered handlers.

use fedrouter::config::ServerConfig;
use fedrouter::dispatcher::{Dispatcher, FsDocumentStore, HandlerOutput, HandlerRequest, HeaderVec};
use fedrouter::negotiate::RepresentationKind;
use fedrouter::network::{NetworkKind, OutboundSession, SessionProvider};
use fedrouter::preferences::{AccountPreferences, MemoryPreferencesStore};
use fedrouter::router::RouteId;
use fedrouter::security::{AuthorizationGate, DocumentVisibility, SessionValidator, SignatureOracle};
use fedrouter::server::Request;
use fedrouter::static_files::StaticFiles;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub const CLEARNET: &str = "social.example";
pub const ONION: &str = "abcdefghijklmnop.onion";
pub const I2P: &str = "social.i2p";
pub const SIGNATURE: &str =
    r#"keyId="https://peer.example/users/bob#main-key",algorithm="hs2019",headers="(request-target) host date",signature="c2lnbmVk""#;

/// Accepts `token-<nickname>`.
pub struct TokenSessions;

impl SessionValidator for TokenSessions {
    fn validate(&self, token: &str) -> Option<String> {
        token.strip_prefix("token-").map(str::to_string)
    }
}

/// Accepts every signature and counts calls.
#[derive(Default)]
pub struct CountingSignatures {
    pub calls: AtomicUsize,
}

impl CountingSignatures {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SignatureOracle for CountingSignatures {
    fn verify(&self, _session: &OutboundSession, _headers: &HeaderVec, _path: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        true
    }
}

/// Direct sessions on every network, no proxies.
pub struct DirectSessions {
    clearnet: Arc<OutboundSession>,
    onion: Arc<OutboundSession>,
    i2p: Arc<OutboundSession>,
}

impl DirectSessions {
    pub fn new() -> Self {
        Self {
            clearnet: Arc::new(OutboundSession::direct(NetworkKind::Clearnet)),
            onion: Arc::new(OutboundSession::direct(NetworkKind::Onion)),
            i2p: Arc::new(OutboundSession::direct(NetworkKind::I2p)),
        }
    }
}

impl SessionProvider for DirectSessions {
    fn session(&self, network: NetworkKind) -> Arc<OutboundSession> {
        match network {
            NetworkKind::Clearnet => Arc::clone(&self.clearnet),
            NetworkKind::Onion => Arc::clone(&self.onion),
            NetworkKind::I2p => Arc::clone(&self.i2p),
        }
    }
}

pub struct Fixture {
    pub dir: TempDir,
    pub dispatcher: Dispatcher,
    pub signatures: Arc<CountingSignatures>,
}

impl Fixture {
    pub fn dispatch(&self, req: &Request) -> fedrouter::HttpResponse {
        self.dispatcher.dispatch(req)
    }
}

pub fn config(root: &Path) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.instance.clearnet_domain = CLEARNET.to_string();
    config.instance.onion_domain = Some(ONION.to_string());
    config.instance.i2p_domain = Some(I2P.to_string());
    config.http.secure_mode = true;
    config.limits.heavy_interval_ms = 60_000;
    config.paths.asset_dir = Some(root.join("static"));
    config.paths.media_dir = Some(root.join("media"));
    config.paths.document_dir = Some(root.join("accounts"));
    config.blocklist.domains = vec!["spam.example".to_string()];
    config.blocklist.crawlers = vec!["GPTBot".to_string()];
    config.blocklist.hashtags = vec!["nsfw".to_string()];
    config
}

fn write(root: &Path, rel: &str, contents: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

pub fn populate(root: &Path) {
    write(root, "static/robots.txt", b"User-agent: *\nDisallow: /\n");
    write(root, "static/icons/like.png", &[0x89, b'P', b'N', b'G', 1, 2, 3]);
    write(root, "media/a1b2/photo.jpg", b"jpeg-bytes");
    write(root, "accounts/users/alice.json", br#"{"type":"Person","id":"https://social.example/users/alice"}"#);
    write(
        root,
        "accounts/users/alice/statuses/1.json",
        br#"{"type":"Note","to":["https://www.w3.org/ns/activitystreams#Public"]}"#,
    );
    write(
        root,
        "accounts/users/alice/statuses/2.json",
        br#"{"type":"Note","to":["https://social.example/users/alice/followers"]}"#,
    );
    write(
        root,
        "accounts/users/alice/collections/featured.json",
        br#"{"type":"OrderedCollection","id":"https://social.example/users/alice/collections/featured"}"#,
    );
    write(root, "accounts/system/relay.json", br#"{"type":"Service","id":"https://social.example/system/relay"}"#);
    write(root, "accounts/system/broken.json", b"{not json");
}

fn profile(req: &HandlerRequest) -> Option<HandlerOutput> {
    if req.nickname() != Some("alice") {
        return None;
    }
    let body = match req.kind() {
        RepresentationKind::Html => {
            "<a href=\"https://social.example/users/alice\">alice</a> <a href=\"https://other.example/x\">x</a>".to_string()
        }
        RepresentationKind::Vcard => "BEGIN:VCARD\nFN:alice\nEND:VCARD\n".to_string(),
        _ => r#"{"id":"https://social.example/users/alice","url":"https://other.example/x"}"#.to_string(),
    };
    Some(HandlerOutput::new(body).with_header("Set-Cookie", "seen=1"))
}

fn post(req: &HandlerRequest) -> Option<HandlerOutput> {
    let id = req.get_param("id")?;
    Some(HandlerOutput::new(format!("post {id} as {}", req.kind())))
}

fn timeline(req: &HandlerRequest) -> Option<HandlerOutput> {
    Some(HandlerOutput::new(format!(
        "{} page {}",
        req.get_param("timeline").unwrap_or_default(),
        req.page()
    )))
}

fn calendar(req: &HandlerRequest) -> Option<HandlerOutput> {
    let tz = req.preferences.timezone.as_deref().unwrap_or("UTC");
    Some(HandlerOutput::new(format!("calendar tz={tz}")))
}

fn followers(req: &HandlerRequest) -> Option<HandlerOutput> {
    Some(HandlerOutput::new(format!(
        r#"{{"type":"OrderedCollection","id":"https://social.example/users/{}/followers"}}"#,
        req.nickname().unwrap_or_default()
    )))
}

fn inbox(req: &HandlerRequest) -> Option<HandlerOutput> {
    Some(HandlerOutput::new(format!(
        "inbox of {} as {}",
        req.auth.authorized_nickname(),
        req.kind()
    )))
}

fn featured_tags(_req: &HandlerRequest) -> Option<HandlerOutput> {
    Some(HandlerOutput::new(r#"{"type":"Collection","items":[]}"#))
}

fn hashtag_page(req: &HandlerRequest) -> Option<HandlerOutput> {
    Some(HandlerOutput::new(format!("#{}", req.get_param("tag").unwrap_or_default())))
}

fn exploding(_req: &HandlerRequest) -> Option<HandlerOutput> {
    panic!("handler exploded");
}

/// Fixture built from [`config`], after `tweak` has adjusted it.
pub fn fixture_with(tweak: impl FnOnce(&mut ServerConfig)) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path());
    let mut config = config(dir.path());
    tweak(&mut config);

    let signatures = Arc::new(CountingSignatures::default());
    let store = Arc::new(FsDocumentStore::new(StaticFiles::new(dir.path().join("accounts"))));
    let signature_oracle: Arc<CountingSignatures> = Arc::clone(&signatures);
    let gate = AuthorizationGate::new(
        Arc::new(TokenSessions),
        signature_oracle,
        Arc::new(DocumentVisibility::new(store)),
    );
    let mut dispatcher = Dispatcher::new(&config, gate, Arc::new(DirectSessions::new()));

    let preferences = MemoryPreferencesStore::new();
    preferences.insert(
        "alice",
        AccountPreferences {
            timezone: Some("Europe/Berlin".to_string()),
            ..AccountPreferences::default()
        },
    );
    dispatcher.set_preferences_store(Arc::new(preferences));

    dispatcher.register(RouteId::Profile, profile);
    dispatcher.register(RouteId::Post, post);
    dispatcher.register(RouteId::Timeline, timeline);
    dispatcher.register(RouteId::Calendar, calendar);
    dispatcher.register(RouteId::Followers, followers);
    dispatcher.register(RouteId::FollowersSync, followers);
    dispatcher.register(RouteId::Inbox, inbox);
    dispatcher.register(RouteId::FeaturedTags, featured_tags);
    dispatcher.register(RouteId::HashtagPage, hashtag_page);
    dispatcher.register(RouteId::MastoInstance, exploding);

    Fixture {
        dir,
        dispatcher,
        signatures,
    }
}

pub fn fixture() -> Fixture {
    fixture_with(|_| {})
}

/// GET on the clearnet host with an `Accept` header.
pub fn get(target: &str, accept: &str) -> Request {
    Request::get(target)
        .with_header("Host", CLEARNET)
        .with_header("Accept", accept)
}

pub fn body_text(resp: &fedrouter::HttpResponse) -> String {
    String::from_utf8_lossy(&resp.body).into_owned()
}

pub mod test_server {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpListener, TcpStream};
    use std::sync::Once;
    use std::time::Duration;

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }

    /// A loopback address with a port nobody is listening on.
    pub fn free_addr() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    /// Write a raw request and read until the server goes quiet.
    pub fn send_request(addr: &SocketAddr, req: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(req.as_bytes()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(300)))
            .unwrap();
        let mut buf = Vec::new();
        loop {
            let mut tmp = [0u8; 1024];
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break
                }
                Err(e) => panic!("read error: {e:?}"),
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Status code and body of a raw HTTP/1.1 response.
    pub fn parse_response(resp: &str) -> (u16, String) {
        let (head, body) = resp.split_once("\r\n\r\n").unwrap_or((resp, ""));
        let status = head
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        (status, body.to_string())
    }

    /// Value of the first header named `name` (case-insensitive).
    pub fn header<'a>(resp: &'a str, name: &str) -> Option<&'a str> {
        let head = resp.split("\r\n\r\n").next()?;
        head.lines().skip(1).find_map(|line| {
            let (k, v) = line.split_once(':')?;
            k.trim().eq_ignore_ascii_case(name).then(|| v.trim())
        })
    }
}
