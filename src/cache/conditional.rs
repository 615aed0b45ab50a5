//! Conditional GET helpers: ETags, HTTP dates, and the `If-None-Match` / `If-Modified-Since`
//! checks.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Number of digest bytes kept in an ETag.
const ETAG_DIGEST_BYTES: usize = 16;

const HEX: &[u8; 16] = b"0123456789abcdef";

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Strong ETag over `bytes`: a quoted, truncated SHA-256 in hex.
#[must_use]
pub fn etag_for(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut tag = String::with_capacity(ETAG_DIGEST_BYTES * 2 + 2);
    tag.push('"');
    for b in digest.iter().take(ETAG_DIGEST_BYTES) {
        tag.push(char::from(HEX[usize::from(b >> 4)]));
        tag.push(char::from(HEX[usize::from(b & 0x0f)]));
    }
    tag.push('"');
    tag
}

/// Weak ETag derived from file metadata, used where hashing is skipped.
#[must_use]
pub fn weak_etag(len: u64, modified: SystemTime) -> String {
    format!("W/\"{len:x}-{:x}\"", unix_secs(modified))
}

fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs())
}

/// Format a timestamp as an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`).
#[must_use]
pub fn http_date(t: SystemTime) -> String {
    DateTime::<Utc>::from(t).format(HTTP_DATE).to_string()
}

/// Parse an HTTP date header. Unparsable values yield `None`.
#[must_use]
pub fn parse_http_date(value: &str) -> Option<SystemTime> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| SystemTime::from(dt.with_timezone(&Utc)))
}

/// True when an `If-None-Match` value names `etag` (or is `*`).
///
/// Comparison is weak: a `W/` prefix on either side is ignored.
#[must_use]
pub fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    let strip = |t: &str| t.trim().trim_start_matches("W/").to_string();
    let wanted = strip(etag);
    if_none_match
        .split(',')
        .map(str::trim)
        .any(|candidate| candidate == "*" || strip(candidate) == wanted)
}

/// True when the resource has not changed since the `If-Modified-Since` date.
///
/// HTTP dates have one-second resolution, so the mtime is truncated before comparing.
#[must_use]
pub fn not_modified_since(if_modified_since: &str, modified: SystemTime) -> bool {
    parse_http_date(if_modified_since).is_some_and(|since| unix_secs(since) >= unix_secs(modified))
}

/// The conditional headers of a request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Conditional<'a> {
    pub if_none_match: Option<&'a str>,
    pub if_modified_since: Option<&'a str>,
}

impl Conditional<'_> {
    /// Decide whether a response with these validators can be answered with 304.
    ///
    /// `If-None-Match` takes precedence; `If-Modified-Since` is only consulted without it.
    #[must_use]
    pub fn is_not_modified(&self, etag: &str, last_modified: Option<SystemTime>) -> bool {
        if let Some(inm) = self.if_none_match {
            return etag_matches(inm, etag);
        }
        match (self.if_modified_since, last_modified) {
            (Some(ims), Some(modified)) => not_modified_since(ims, modified),
            _ => false,
        }
    }
}
