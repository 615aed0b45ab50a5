//! # Built-in Handlers
//!
//! The few resources fedrouter can produce on its own. Everything else (profiles, posts,
//! timelines) comes from [`ResourceHandler`]s registered by the embedding application, or
//! from the raw-document fallback.
//!
//! - [`WellKnown`] - WebFinger, host-meta, NodeInfo, security.txt
//! - [`HashtagFeed`] - RSS 2.0 feed for `/tags/rss2/<tag>`
//! - [`BlogFeed`] - RSS 3 text feed for `/blog/<nickname>/rss.txt`
//! - [`SitePages`] - templated `/` and `/about`

mod blog_feed;
mod hashtag_feed;
mod pages;
mod wellknown;

pub use blog_feed::{BlogFeed, BlogIndex, FsBlogIndex, MAX_BLOG_ITEMS};
pub use hashtag_feed::{FsHashtagIndex, HashtagFeed, HashtagIndex, MAX_FEED_ITEMS};
pub use pages::SitePages;
pub use wellknown::{AccountDirectory, FsAccountDirectory, InstanceStats, WellKnown};

use std::sync::Arc;

use crate::dispatcher::{Dispatcher, ResourceHandler};
use crate::router::RouteId;

/// Register the built-in handlers on `dispatcher`.
///
/// `pages` is optional because an instance without templates serves no site pages.
pub fn register_builtin(
    dispatcher: &mut Dispatcher,
    well_known: WellKnown,
    hashtags: HashtagFeed,
    blog: BlogFeed,
    pages: Option<SitePages>,
) {
    let well_known: Arc<dyn ResourceHandler> = Arc::new(well_known);
    for route in WellKnown::ROUTES {
        dispatcher.register_handler(*route, Arc::clone(&well_known));
    }
    dispatcher.register_handler(RouteId::HashtagRss2, Arc::new(hashtags));
    dispatcher.register_handler(RouteId::BlogRss3, Arc::new(blog));
    if let Some(pages) = pages {
        let pages: Arc<dyn ResourceHandler> = Arc::new(pages);
        for route in SitePages::ROUTES {
            dispatcher.register_handler(*route, Arc::clone(&pages));
        }
    }
}
