//! # Representation Formats
//!
//! Serializers for the text representations whose wire shape is fixed by convention rather
//! than by a handler's content: RSS 2.0 and the line-based RSS 3.0 plain-text feed.

mod rss;

pub use rss::{escape_xml, rfc822, rss2, rss3, Channel, FeedItem};
