use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

use super::hashtag_feed::load_index;
use crate::dispatcher::{HandlerOutput, HandlerRequest, ResourceHandler};
use crate::formats::{rss3, Channel, FeedItem};
use crate::router::is_nickname;
use crate::static_files::StaticFiles;

/// Most recent entries included in one blog feed.
pub const MAX_BLOG_ITEMS: usize = 10;

/// Source of an account's blog entries, newest first.
pub trait BlogIndex: Send + Sync {
    /// Up to `limit` entries, `None` when `nickname` keeps no blog.
    fn recent(&self, nickname: &str, limit: usize) -> Option<Vec<FeedItem>>;
}

/// Blog index stored as `blog/<nickname>.json` under the document root, in the same
/// format as the hashtag index.
#[derive(Debug, Clone)]
pub struct FsBlogIndex {
    root: StaticFiles,
}

impl FsBlogIndex {
    pub fn new(root: StaticFiles) -> Self {
        Self { root }
    }
}

impl BlogIndex for FsBlogIndex {
    fn recent(&self, nickname: &str, limit: usize) -> Option<Vec<FeedItem>> {
        if !is_nickname(nickname) {
            return None;
        }
        load_index(&self.root, &format!("blog/{nickname}.json"), limit)
    }
}

/// RSS 3 text feed of an account's blog (`/blog/<nickname>/rss.txt`).
pub struct BlogFeed {
    index: Arc<dyn BlogIndex>,
}

impl BlogFeed {
    pub fn new(index: Arc<dyn BlogIndex>) -> Self {
        Self { index }
    }
}

impl ResourceHandler for BlogFeed {
    fn handle(&self, req: &HandlerRequest) -> Option<HandlerOutput> {
        let nickname = req.nickname()?;
        let Some(mut items) = self.index.recent(nickname, MAX_BLOG_ITEMS) else {
            debug!(request_id = %req.request_id, nickname = %nickname, "no blog index");
            return None;
        };
        items.truncate(MAX_BLOG_ITEMS);
        let channel = Channel {
            title: format!("{nickname}'s blog"),
            link: format!("{}/blog/{nickname}", req.origin),
            description: format!("Blog entries by {nickname}"),
        };
        let last_modified = items.iter().map(|i| i.published).max().map(SystemTime::from);
        let mut out = HandlerOutput::new(rss3(&channel, &items));
        if let Some(at) = last_modified {
            out = out.with_last_modified(at);
        }
        Some(out)
    }
}
