//! The route table.
//!
//! Routes are an ordered, first-match-wins list of pure predicates. Each predicate inspects a
//! [`PathView`] and either declines (`None`) or returns the captured parameters.
//!
//! ## Priority
//!
//! Overlapping shapes are resolved by position, in this order:
//!
//! 1. fast-path well-known documents (webfinger, host-meta, nodeinfo, security.txt)
//! 2. static assets and media
//! 3. feeds (`rss.xml`, `rss.txt`, `/tags/rss2/`, `/newswire.xml`)
//! 4. blog entries and blog indexes
//! 5. post-shaped routes (`/users/<n>/statuses/<id>...`)
//! 6. collection-shaped routes (followers, following, outbox, inbox, featured...)
//! 7. timeline-shaped routes (owner-only timelines, calendar)
//! 8. profile-shaped routes (`/users/<n>`, `/@<n>`)
//! 9. site pages (root, about, hashtag pages, Mastodon API)
//!
//! So `/users/alice/rss.xml` is a feed, never a timeline named `rss.xml`, and
//! `/users/alice/statuses/1/replies` is post replies, never a collection.

use once_cell::sync::Lazy;
use regex::Regex;
use smallvec::smallvec;
use std::fmt;
use std::sync::Arc;

use super::core::ParamVec;
use super::path::PathView;
use crate::negotiate::RepresentationKind::{self, *};

/// Largest accepted page number; anything outside `1..=MAX_PAGE` clamps to 1.
pub const MAX_PAGE: u32 = 99_999;

const MAX_PAGE_DIGITS: usize = 5;
const MAX_STATUS_ID_DIGITS: usize = 20;

#[allow(clippy::expect_used)]
static NICKNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,32}$").expect("valid nickname pattern"));

#[allow(clippy::expect_used)]
static HASHTAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{L}\p{N}_]{1,64}$").expect("valid hashtag pattern"));

/// Owner-only timelines reachable under `/users/<n>/`.
pub const OWNER_TIMELINES: &[&str] = &["tlbookmarks", "tlreplies", "tlmedia", "dm"];

/// Identifier of a route in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteId {
    WebFinger,
    HostMeta,
    NodeInfoLinks,
    NodeInfo,
    SecurityTxt,
    Robots,
    Favicon,
    Icon,
    Font,
    Emoji,
    ThemeExport,
    MediaAttachment,
    Avatar,
    UserRss2,
    BlogRss2,
    BlogRss3,
    HashtagRss2,
    Newswire,
    BlogEntry,
    BlogIndex,
    PostReplies,
    Post,
    SharedInbox,
    Inbox,
    Outbox,
    Followers,
    Following,
    FollowersSync,
    Featured,
    FeaturedTags,
    Calendar,
    Timeline,
    Profile,
    MastoInstance,
    MastoPeers,
    MastoDirectory,
    HashtagPage,
    About,
    Root,
}

impl RouteId {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RouteId::WebFinger => "webfinger",
            RouteId::HostMeta => "host_meta",
            RouteId::NodeInfoLinks => "nodeinfo_links",
            RouteId::NodeInfo => "nodeinfo",
            RouteId::SecurityTxt => "security_txt",
            RouteId::Robots => "robots",
            RouteId::Favicon => "favicon",
            RouteId::Icon => "icon",
            RouteId::Font => "font",
            RouteId::Emoji => "emoji",
            RouteId::ThemeExport => "theme_export",
            RouteId::MediaAttachment => "media_attachment",
            RouteId::Avatar => "avatar",
            RouteId::UserRss2 => "user_rss2",
            RouteId::BlogRss2 => "blog_rss2",
            RouteId::BlogRss3 => "blog_rss3",
            RouteId::HashtagRss2 => "hashtag_rss2",
            RouteId::Newswire => "newswire",
            RouteId::BlogEntry => "blog_entry",
            RouteId::BlogIndex => "blog_index",
            RouteId::PostReplies => "post_replies",
            RouteId::Post => "post",
            RouteId::SharedInbox => "shared_inbox",
            RouteId::Inbox => "inbox",
            RouteId::Outbox => "outbox",
            RouteId::Followers => "followers",
            RouteId::Following => "following",
            RouteId::FollowersSync => "followers_sync",
            RouteId::Featured => "featured",
            RouteId::FeaturedTags => "featured_tags",
            RouteId::Calendar => "calendar",
            RouteId::Timeline => "timeline",
            RouteId::Profile => "profile",
            RouteId::MastoInstance => "masto_instance",
            RouteId::MastoPeers => "masto_peers",
            RouteId::MastoDirectory => "masto_directory",
            RouteId::HashtagPage => "hashtag_page",
            RouteId::About => "about",
            RouteId::Root => "root",
        }
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authorization level a route declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Anyone
    Public,
    /// Public unless the captured object is not; non-public objects need a credential
    Object,
    /// Session nickname must equal the captured nickname
    Owner,
    /// Federation JSON needs a signature or session in secure mode; HTML is public
    Signed,
    /// Delivery endpoints; GET is never permitted
    PostOnly,
}

/// Admission control applied before the handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    None,
    /// Named singleton guard
    Guard(&'static str),
    /// Named singleton guard, only when the caller asks for this representation
    GuardFor(RepresentationKind, &'static str),
    /// Shared cooldown over the heavy route class
    RateLimited,
}

/// What serves the route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// A registered resource handler
    Handler,
    /// A file under the asset root, cached for the process lifetime
    Asset,
    /// A file under the media root, revalidated by mtime
    Media,
}

/// Pure route predicate.
pub type Predicate = fn(&PathView) -> Option<ParamVec>;

/// One entry of the route table.
pub struct RouteRule {
    pub id: RouteId,
    /// Human readable pattern, for `fedrouter routes` and logs
    pub pattern: &'static str,
    pub predicate: Predicate,
    pub representations: &'static [RepresentationKind],
    pub access: Access,
    pub admission: Admission,
    pub target: Target,
    pub fast_path: bool,
}

impl fmt::Debug for RouteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteRule")
            .field("id", &self.id)
            .field("pattern", &self.pattern)
            .field("access", &self.access)
            .field("admission", &self.admission)
            .field("target", &self.target)
            .field("fast_path", &self.fast_path)
            .finish()
    }
}

const fn handler(
    id: RouteId,
    pattern: &'static str,
    predicate: Predicate,
    representations: &'static [RepresentationKind],
    access: Access,
    admission: Admission,
) -> RouteRule {
    RouteRule {
        id,
        pattern,
        predicate,
        representations,
        access,
        admission,
        target: Target::Handler,
        fast_path: false,
    }
}

const fn well_known(
    id: RouteId,
    pattern: &'static str,
    predicate: Predicate,
    representations: &'static [RepresentationKind],
    guard: &'static str,
) -> RouteRule {
    RouteRule {
        id,
        pattern,
        predicate,
        representations,
        access: Access::Public,
        admission: Admission::Guard(guard),
        target: Target::Handler,
        fast_path: true,
    }
}

const fn file(id: RouteId, pattern: &'static str, predicate: Predicate, target: Target) -> RouteRule {
    RouteRule {
        id,
        pattern,
        predicate,
        representations: &[],
        access: Access::Public,
        admission: Admission::None,
        target,
        fast_path: true,
    }
}

/// The ordered route table. See the module docs for the priority rules.
pub static ROUTES: &[RouteRule] = &[
    // 1. fast-path well-known documents
    well_known(RouteId::WebFinger, "/.well-known/webfinger", p_webfinger, &[ActivityJson], "webfinger"),
    well_known(RouteId::HostMeta, "/.well-known/host-meta", p_host_meta, &[ActivityJson], "webfinger"),
    well_known(RouteId::NodeInfoLinks, "/.well-known/nodeinfo", p_nodeinfo_links, &[ActivityJson], "nodeinfo"),
    well_known(RouteId::NodeInfo, "/nodeinfo/2.0|2.1", p_nodeinfo, &[ActivityJson], "nodeinfo"),
    well_known(RouteId::SecurityTxt, "/.well-known/security.txt", p_security_txt, &[Rss3], "security_txt"),
    // 2. static assets and media
    file(RouteId::Robots, "/robots.txt", p_robots, Target::Asset),
    file(RouteId::Favicon, "/favicon.ico", p_favicon, Target::Asset),
    file(RouteId::Icon, "/icons/<file>", p_icon, Target::Asset),
    file(RouteId::Font, "/fonts/<file>", p_font, Target::Asset),
    file(RouteId::Emoji, "/emoji/<file>", p_emoji, Target::Asset),
    file(RouteId::ThemeExport, "/exports/<file>", p_theme_export, Target::Asset),
    file(RouteId::MediaAttachment, "/media/<dir>/<file>", p_media, Target::Media),
    file(RouteId::Avatar, "/avatars/<nick>/<file>", p_avatar, Target::Media),
    // 3. feeds
    handler(RouteId::UserRss2, "/users/<nick>/rss.xml", p_user_rss2, &[Rss2], Access::Public, Admission::RateLimited),
    handler(RouteId::BlogRss2, "/blog/<nick>/rss.xml", p_blog_rss2, &[Rss2], Access::Public, Admission::RateLimited),
    handler(RouteId::BlogRss3, "/blog/<nick>/rss.txt", p_blog_rss3, &[Rss3], Access::Public, Admission::RateLimited),
    handler(RouteId::HashtagRss2, "/tags/rss2/<tag>", p_hashtag_rss2, &[Rss2], Access::Public, Admission::RateLimited),
    handler(RouteId::Newswire, "/newswire.xml", p_newswire, &[Rss2], Access::Public, Admission::RateLimited),
    // 4. blog
    handler(RouteId::BlogEntry, "/blog/<nick>/<id>", p_blog_entry, &[Html], Access::Object, Admission::None),
    handler(RouteId::BlogIndex, "/blog/<nick>", p_blog_index, &[Html], Access::Public, Admission::RateLimited),
    // 5. post-shaped
    handler(RouteId::PostReplies, "/users/<nick>/statuses/<id>/replies", p_post_replies, &[ActivityJson, Html], Access::Object, Admission::None),
    handler(RouteId::Post, "/users/<nick>/statuses/<id>", p_post, &[Html, ActivityJson, Ssml], Access::Object, Admission::None),
    // 6. collection-shaped
    handler(RouteId::SharedInbox, "/inbox", p_shared_inbox, &[ActivityJson], Access::PostOnly, Admission::None),
    handler(RouteId::Inbox, "/users/<nick>/inbox", p_inbox, &[Html, ActivityJson], Access::Owner, Admission::None),
    handler(RouteId::Outbox, "/users/<nick>/outbox", p_outbox, &[ActivityJson, Html], Access::Signed, Admission::RateLimited),
    handler(RouteId::Followers, "/users/<nick>/followers", p_followers, &[ActivityJson, Html], Access::Signed, Admission::RateLimited),
    handler(RouteId::Following, "/users/<nick>/following", p_following, &[ActivityJson, Html], Access::Signed, Admission::RateLimited),
    handler(RouteId::FollowersSync, "/users/<nick>/followers_synchronization", p_followers_sync, &[ActivityJson], Access::Signed, Admission::Guard("followers_sync")),
    handler(RouteId::Featured, "/users/<nick>/collections/featured", p_featured, &[ActivityJson], Access::Public, Admission::None),
    handler(RouteId::FeaturedTags, "/users/<nick>/collections/tags", p_featured_tags, &[ActivityJson], Access::Public, Admission::None),
    // 7. timeline-shaped
    handler(RouteId::Calendar, "/users/<nick>/calendar", p_calendar, &[Html, Ical], Access::Owner, Admission::None),
    handler(RouteId::Timeline, "/users/<nick>/<tlbookmarks|tlreplies|tlmedia|dm>", p_timeline, &[Html, Csv], Access::Owner, Admission::RateLimited),
    // 8. profile-shaped
    handler(RouteId::Profile, "/users/<nick> | /@<nick>", p_profile, &[Html, ActivityJson, Vcard], Access::Public, Admission::GuardFor(Vcard, "vcard")),
    // 9. site pages
    handler(RouteId::MastoInstance, "/api/v1/instance", p_masto_instance, &[ActivityJson], Access::Public, Admission::Guard("masto_api")),
    handler(RouteId::MastoPeers, "/api/v1/instance/peers", p_masto_peers, &[ActivityJson], Access::Public, Admission::Guard("masto_api")),
    handler(RouteId::MastoDirectory, "/api/v1/directory", p_masto_directory, &[ActivityJson], Access::Public, Admission::Guard("masto_api")),
    handler(RouteId::HashtagPage, "/tags/<tag>", p_hashtag_page, &[Html], Access::Public, Admission::RateLimited),
    handler(RouteId::About, "/about", p_about, &[Html], Access::Public, Admission::None),
    handler(RouteId::Root, "/", p_root, &[Html], Access::Public, Admission::None),
];

// ---------------------------------------------------------------------------
// capture helpers
// ---------------------------------------------------------------------------

fn param(name: &'static str, value: &str) -> (Arc<str>, String) {
    (Arc::from(name), value.to_string())
}

/// Nickname rule: `[A-Za-z0-9_-]{1,32}`.
#[must_use]
pub fn is_nickname(s: &str) -> bool {
    NICKNAME.is_match(s)
}

#[must_use]
pub fn is_hashtag(s: &str) -> bool {
    HASHTAG.is_match(s)
}

/// Status ids are 1 to 20 ASCII digits.
#[must_use]
pub fn is_status_id(s: &str) -> bool {
    !s.is_empty() && s.len() <= MAX_STATUS_ID_DIGITS && s.bytes().all(|b| b.is_ascii_digit())
}

/// Page numbers: at most 5 digits within `1..=MAX_PAGE`, otherwise page 1.
#[must_use]
pub fn clamp_page(raw: Option<&str>) -> u32 {
    raw.filter(|s| s.len() <= MAX_PAGE_DIGITS && s.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|n| (1..=MAX_PAGE).contains(n))
        .unwrap_or(1)
}

fn page_param(view: &PathView) -> (Arc<str>, String) {
    (Arc::from("page"), clamp_page(view.query_param("page")).to_string())
}

/// A file name as it appears in an asset route: non-empty, no hidden files.
fn is_file_name(s: &str) -> bool {
    !s.is_empty() && !s.starts_with('.')
}

fn exact(view: &PathView, expected: &[&str]) -> Option<ParamVec> {
    (view.format_suffix.is_none() && view.segs().as_slice() == expected).then(ParamVec::new)
}

/// `/users/<nick>/<leaf>` where the leaf is fixed.
fn user_leaf(view: &PathView, leaf: &str) -> Option<ParamVec> {
    match view.segs().as_slice() {
        ["users", nick, l] if *l == leaf && is_nickname(nick) => Some(smallvec![param("nickname", nick)]),
        _ => None,
    }
}

fn user_leaf_paged(view: &PathView, leaf: &str) -> Option<ParamVec> {
    let mut params = user_leaf(view, leaf)?;
    params.push(page_param(view));
    Some(params)
}

fn asset_under(view: &PathView, dir: &str) -> Option<ParamVec> {
    match view.raw_segs().as_slice() {
        [d, name] if *d == dir && is_file_name(name) => Some(smallvec![param("file", &format!("{dir}/{name}"))]),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// predicates
// ---------------------------------------------------------------------------

fn p_webfinger(view: &PathView) -> Option<ParamVec> {
    let mut params = exact(view, &[".well-known", "webfinger"])?;
    if let Some(resource) = view.query_param("resource") {
        params.push(param("resource", resource));
    }
    Some(params)
}

fn p_host_meta(view: &PathView) -> Option<ParamVec> {
    exact(view, &[".well-known", "host-meta"])
}

fn p_nodeinfo_links(view: &PathView) -> Option<ParamVec> {
    exact(view, &[".well-known", "nodeinfo"])
}

fn p_nodeinfo(view: &PathView) -> Option<ParamVec> {
    match view.segs().as_slice() {
        ["nodeinfo", v @ ("2.0" | "2.1")] => Some(smallvec![param("version", v)]),
        _ => None,
    }
}

fn p_security_txt(view: &PathView) -> Option<ParamVec> {
    match view.raw_segs().as_slice() {
        [".well-known", "security.txt"] | ["security.txt"] => Some(ParamVec::new()),
        _ => None,
    }
}

fn p_robots(view: &PathView) -> Option<ParamVec> {
    (view.raw_segs().as_slice() == ["robots.txt"]).then(|| smallvec![param("file", "robots.txt")])
}

fn p_favicon(view: &PathView) -> Option<ParamVec> {
    (view.raw_segs().as_slice() == ["favicon.ico"]).then(|| smallvec![param("file", "favicon.ico")])
}

fn p_icon(view: &PathView) -> Option<ParamVec> {
    asset_under(view, "icons")
}

fn p_font(view: &PathView) -> Option<ParamVec> {
    asset_under(view, "fonts")
}

fn p_emoji(view: &PathView) -> Option<ParamVec> {
    asset_under(view, "emoji")
}

fn p_theme_export(view: &PathView) -> Option<ParamVec> {
    asset_under(view, "exports")
}

fn p_media(view: &PathView) -> Option<ParamVec> {
    match view.raw_segs().as_slice() {
        ["media", dir, name] if is_file_name(dir) && is_file_name(name) => {
            Some(smallvec![param("file", &format!("{dir}/{name}"))])
        }
        _ => None,
    }
}

fn p_avatar(view: &PathView) -> Option<ParamVec> {
    match view.raw_segs().as_slice() {
        ["avatars", nick, name] if is_nickname(nick) && is_file_name(name) => Some(smallvec![
            param("nickname", nick),
            param("file", &format!("avatars/{nick}/{name}"))
        ]),
        _ => None,
    }
}

fn p_user_rss2(view: &PathView) -> Option<ParamVec> {
    match view.raw_segs().as_slice() {
        ["users", nick, "rss.xml"] if is_nickname(nick) => Some(smallvec![param("nickname", nick)]),
        _ => None,
    }
}

fn p_blog_rss2(view: &PathView) -> Option<ParamVec> {
    match view.raw_segs().as_slice() {
        ["blog", nick, "rss.xml"] if is_nickname(nick) => Some(smallvec![param("nickname", nick)]),
        _ => None,
    }
}

fn p_blog_rss3(view: &PathView) -> Option<ParamVec> {
    match view.raw_segs().as_slice() {
        ["blog", nick, "rss.txt"] if is_nickname(nick) => Some(smallvec![param("nickname", nick)]),
        _ => None,
    }
}

fn p_hashtag_rss2(view: &PathView) -> Option<ParamVec> {
    match view.raw_segs().as_slice() {
        ["tags", "rss2", tag] if is_hashtag(tag) => Some(smallvec![param("tag", tag)]),
        _ => None,
    }
}

fn p_newswire(view: &PathView) -> Option<ParamVec> {
    (view.raw_segs().as_slice() == ["newswire.xml"]).then(ParamVec::new)
}

fn p_blog_entry(view: &PathView) -> Option<ParamVec> {
    match view.segs().as_slice() {
        ["blog", nick, id] if is_nickname(nick) && is_status_id(id) => {
            Some(smallvec![param("nickname", nick), param("id", id)])
        }
        _ => None,
    }
}

fn p_blog_index(view: &PathView) -> Option<ParamVec> {
    match view.segs().as_slice() {
        ["blog", nick] if is_nickname(nick) => Some(smallvec![param("nickname", nick), page_param(view)]),
        _ => None,
    }
}

fn p_post_replies(view: &PathView) -> Option<ParamVec> {
    match view.segs().as_slice() {
        ["users", nick, "statuses", id, "replies"] if is_nickname(nick) && is_status_id(id) => Some(
            smallvec![param("nickname", nick), param("id", id), page_param(view)],
        ),
        _ => None,
    }
}

fn p_post(view: &PathView) -> Option<ParamVec> {
    match view.segs().as_slice() {
        ["users", nick, "statuses", id] if is_nickname(nick) && is_status_id(id) => {
            Some(smallvec![param("nickname", nick), param("id", id)])
        }
        _ => None,
    }
}

fn p_shared_inbox(view: &PathView) -> Option<ParamVec> {
    exact(view, &["inbox"])
}

fn p_inbox(view: &PathView) -> Option<ParamVec> {
    user_leaf(view, "inbox")
}

fn p_outbox(view: &PathView) -> Option<ParamVec> {
    user_leaf_paged(view, "outbox")
}

fn p_followers(view: &PathView) -> Option<ParamVec> {
    user_leaf_paged(view, "followers")
}

fn p_following(view: &PathView) -> Option<ParamVec> {
    user_leaf_paged(view, "following")
}

fn p_followers_sync(view: &PathView) -> Option<ParamVec> {
    user_leaf(view, "followers_synchronization")
}

fn p_featured(view: &PathView) -> Option<ParamVec> {
    match view.segs().as_slice() {
        ["users", nick, "collections", "featured"] if is_nickname(nick) => {
            Some(smallvec![param("nickname", nick)])
        }
        _ => None,
    }
}

fn p_featured_tags(view: &PathView) -> Option<ParamVec> {
    match view.segs().as_slice() {
        ["users", nick, "collections", "tags"] if is_nickname(nick) => Some(smallvec![param("nickname", nick)]),
        _ => None,
    }
}

fn p_calendar(view: &PathView) -> Option<ParamVec> {
    let mut params = user_leaf(view, "calendar")?;
    let year = view
        .query_param("year")
        .filter(|s| s.len() == 4)
        .and_then(|s| s.parse::<i32>().ok())
        .filter(|y| (1970..=9999).contains(y))
        .unwrap_or(view.default_year);
    let month = view
        .query_param("month")
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|m| (1..=12).contains(m))
        .unwrap_or(1);
    params.push(param("year", &year.to_string()));
    params.push(param("month", &month.to_string()));
    Some(params)
}

fn p_timeline(view: &PathView) -> Option<ParamVec> {
    match view.segs().as_slice() {
        ["users", nick, tl] if is_nickname(nick) && OWNER_TIMELINES.contains(tl) => {
            Some(smallvec![param("nickname", nick), param("timeline", tl), page_param(view)])
        }
        _ => None,
    }
}

fn p_profile(view: &PathView) -> Option<ParamVec> {
    let nick = match view.segs().as_slice() {
        ["users", nick] => *nick,
        [alias] => alias.strip_prefix('@')?,
        _ => return None,
    };
    is_nickname(nick).then(|| smallvec![param("nickname", nick), page_param(view)])
}

fn p_masto_instance(view: &PathView) -> Option<ParamVec> {
    exact(view, &["api", "v1", "instance"])
}

fn p_masto_peers(view: &PathView) -> Option<ParamVec> {
    exact(view, &["api", "v1", "instance", "peers"])
}

fn p_masto_directory(view: &PathView) -> Option<ParamVec> {
    exact(view, &["api", "v1", "directory"])
}

fn p_hashtag_page(view: &PathView) -> Option<ParamVec> {
    match view.segs().as_slice() {
        ["tags", tag] if is_hashtag(tag) => Some(smallvec![param("tag", tag), page_param(view)]),
        _ => None,
    }
}

fn p_about(view: &PathView) -> Option<ParamVec> {
    exact(view, &["about"])
}

fn p_root(view: &PathView) -> Option<ParamVec> {
    exact(view, &[])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(raw: &str) -> PathView {
        PathView::parse_with_year(raw, 2026).unwrap()
    }

    #[test]
    fn test_page_clamping() {
        assert_eq!(clamp_page(Some("3")), 3);
        assert_eq!(clamp_page(Some("99999")), 99_999);
        assert_eq!(clamp_page(Some("123456")), 1);
        assert_eq!(clamp_page(Some("0")), 1);
        assert_eq!(clamp_page(Some("-2")), 1);
        assert_eq!(clamp_page(Some("abc")), 1);
        assert_eq!(clamp_page(None), 1);
    }

    #[test]
    fn test_status_id_rule() {
        assert!(is_status_id("1"));
        assert!(is_status_id("12345678901234567890"));
        assert!(!is_status_id("123456789012345678901"));
        assert!(!is_status_id("12a"));
        assert!(!is_status_id(""));
    }

    #[test]
    fn test_nickname_rule() {
        assert!(is_nickname("alice_01-x"));
        assert!(!is_nickname("@alice"));
        assert!(!is_nickname("al ice"));
        assert!(!is_nickname(&"a".repeat(33)));
    }

    #[test]
    fn test_profile_predicate_accepts_alias() {
        assert!(p_profile(&view("/@alice")).is_some());
        assert!(p_profile(&view("/users/alice")).is_some());
        assert!(p_profile(&view("/users/@alice")).is_none());
        assert!(p_profile(&view("/a@lice")).is_none());
    }

    #[test]
    fn test_calendar_defaults() {
        let params = p_calendar(&view("/users/alice/calendar?year=abcd&month=13")).unwrap();
        assert!(params.iter().any(|(k, v)| k.as_ref() == "year" && v == "2026"));
        assert!(params.iter().any(|(k, v)| k.as_ref() == "month" && v == "1"));
        let params = p_calendar(&view("/users/alice/calendar?year=2024&month=7")).unwrap();
        assert!(params.iter().any(|(k, v)| k.as_ref() == "year" && v == "2024"));
        assert!(params.iter().any(|(k, v)| k.as_ref() == "month" && v == "7"));
    }

    #[test]
    fn test_asset_predicates_see_raw_names() {
        let params = p_icon(&view("/icons/logo.json")).unwrap();
        assert_eq!(params[0].1, "icons/logo.json");
        assert!(p_icon(&view("/icons/.hidden")).is_none());
    }

    #[test]
    fn test_route_ids_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for rule in ROUTES {
            assert!(seen.insert(rule.id), "duplicate route {}", rule.id);
        }
    }
}
