use chrono::{DateTime, Utc};

/// Feed-level metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub title: String,
    pub link: String,
    pub description: String,
}

/// One feed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub published: DateTime<Utc>,
}

/// RFC-822 date as used in `<pubDate>`.
#[must_use]
pub fn rfc822(at: &DateTime<Utc>) -> String {
    at.to_rfc2822()
}

/// Escape the five XML special characters.
#[must_use]
pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn push_element(out: &mut String, name: &str, text: &str) {
    out.push('<');
    out.push_str(name);
    out.push('>');
    out.push_str(&escape_xml(text));
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// RSS 2.0 document.
#[must_use]
pub fn rss2(channel: &Channel, items: &[FeedItem]) -> String {
    let mut out = String::with_capacity(512 + items.len() * 256);
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" ?>\n<rss version=\"2.0\"><channel>");
    push_element(&mut out, "title", &channel.title);
    push_element(&mut out, "link", &channel.link);
    push_element(&mut out, "description", &channel.description);
    for item in items {
        out.push_str("<item>");
        push_element(&mut out, "title", &item.title);
        push_element(&mut out, "link", &item.link);
        push_element(&mut out, "description", &item.description);
        push_element(&mut out, "pubDate", &rfc822(&item.published));
        out.push_str("</item>");
    }
    out.push_str("</channel></rss>");
    out
}

/// Keep a value on one line.
fn one_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// RSS 3.0 plain text: `key: value` lines, one blank-line-terminated block per item after
/// the channel block.
#[must_use]
pub fn rss3(channel: &Channel, items: &[FeedItem]) -> String {
    let mut blocks = Vec::with_capacity(items.len() + 1);
    blocks.push(format!(
        "title: {}\nlink: {}\ndescription: {}\n\n",
        one_line(&channel.title),
        one_line(&channel.link),
        one_line(&channel.description)
    ));
    for item in items {
        blocks.push(format!(
            "title: {}\nlink: {}\ncreated: {}\ndescription: {}\n\n",
            one_line(&item.title),
            one_line(&item.link),
            rfc822(&item.published),
            one_line(&item.description)
        ));
    }
    blocks.concat()
}
