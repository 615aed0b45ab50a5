use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};

use crate::dispatcher::{HandlerOutput, HandlerRequest, ResourceHandler};
use crate::formats::{rss2, Channel, FeedItem};
use crate::hot_reload::BlocklistHandle;
use crate::router::is_hashtag;
use crate::static_files::StaticFiles;

/// Most recent posts included in one hashtag feed.
pub const MAX_FEED_ITEMS: usize = 10;

/// Source of posts carrying a hashtag, newest first.
pub trait HashtagIndex: Send + Sync {
    /// Up to `limit` posts tagged `tag` (without the leading `#`).
    fn recent(&self, tag: &str, limit: usize) -> Vec<FeedItem>;
}

#[derive(Debug, Deserialize)]
struct IndexedPost {
    title: String,
    link: String,
    #[serde(default)]
    description: String,
    /// RFC 3339
    published: String,
}

/// Hashtag index stored as `tags/<tag>.json` under the document root: a JSON array of
/// `{title, link, description, published}` objects, newest first.
#[derive(Debug, Clone)]
pub struct FsHashtagIndex {
    root: StaticFiles,
}

impl FsHashtagIndex {
    pub fn new(root: StaticFiles) -> Self {
        Self { root }
    }
}

impl HashtagIndex for FsHashtagIndex {
    fn recent(&self, tag: &str, limit: usize) -> Vec<FeedItem> {
        if !is_hashtag(tag) {
            return Vec::new();
        }
        load_index(&self.root, &format!("tags/{}.json", tag.to_lowercase()), limit).unwrap_or_default()
    }
}

/// Read a post index (`[{title, link, description, published}]`) from `rel` under `root`.
///
/// `None` when the file is missing or unreadable. Entries with a bad date are skipped.
pub(super) fn load_index(root: &StaticFiles, rel: &str, limit: usize) -> Option<Vec<FeedItem>> {
    let file = root.load(rel).ok()?;
    let posts: Vec<IndexedPost> = match serde_json::from_slice(&file.bytes) {
        Ok(p) => p,
        Err(e) => {
            warn!(index = %rel, error = %e, "F1: unreadable post index");
            return None;
        }
    };
    Some(
        posts
            .into_iter()
            .filter_map(|p| {
                let published = DateTime::parse_from_rfc3339(&p.published).ok()?.with_timezone(&Utc);
                Some(FeedItem {
                    title: p.title,
                    link: p.link,
                    description: p.description,
                    published,
                })
            })
            .take(limit)
            .collect(),
    )
}

/// RSS 2.0 feed of the latest posts carrying a hashtag (`/tags/rss2/<tag>`).
///
/// Declines blocked tags (404). A tag nobody has used yet gets an empty channel.
pub struct HashtagFeed {
    index: Arc<dyn HashtagIndex>,
    blocklist: BlocklistHandle,
}

impl HashtagFeed {
    pub fn new(index: Arc<dyn HashtagIndex>, blocklist: BlocklistHandle) -> Self {
        Self { index, blocklist }
    }
}

impl ResourceHandler for HashtagFeed {
    fn handle(&self, req: &HandlerRequest) -> Option<HandlerOutput> {
        let tag = req.get_param("tag")?;
        if self.blocklist.load().is_blocked_hashtag(tag) {
            debug!(request_id = %req.request_id, tag = %tag, "F1: blocked hashtag");
            return None;
        }
        let mut items = self.index.recent(tag, MAX_FEED_ITEMS);
        items.truncate(MAX_FEED_ITEMS);
        let channel = Channel {
            title: format!("#{tag}"),
            link: format!("{}/tags/{tag}", req.origin),
            description: format!("Public posts tagged #{tag}"),
        };
        let last_modified = items.iter().map(|i| i.published).max().map(SystemTime::from);
        let mut out = HandlerOutput::new(rss2(&channel, &items));
        if let Some(at) = last_modified {
            out = out.with_last_modified(at);
        }
        Some(out)
    }
}
