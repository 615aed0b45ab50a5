//! Writing [`HttpResponse`]s to `may_minihttp`.
//!
//! `may_minihttp::Response::header` only takes `&'static str` lines, so every line written is
//! interned for the life of the process. Interning is split per header class, each table with
//! a hard cap; a line that misses a full table is dropped instead of allocated. The request id
//! is unique per response and never reaches the transport (it is on every `tracing` event).

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use may_minihttp::Response;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use crate::dispatcher::HttpResponse;
use crate::ids::REQUEST_ID_HEADER;

/// Cap on interned `Content-Type` lines.
pub const MAX_CONTENT_TYPE_LINES: usize = 256;
/// Cap on interned `ETag` / `Last-Modified` lines.
pub const MAX_VALIDATOR_LINES: usize = 4096;
/// Cap on every other interned line (`Set-Cookie`, handler extras).
pub const MAX_OTHER_LINES: usize = 1024;

/// Bounded set of `'static` header lines.
#[derive(Debug)]
pub struct LineTable {
    lines: DashMap<String, &'static str>,
    cap: usize,
}

impl LineTable {
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            lines: DashMap::new(),
            cap,
        }
    }

    /// The shared copy of `line`, interning it while the table has room.
    #[must_use]
    pub fn intern(&self, line: String) -> Option<&'static str> {
        if let Some(existing) = self.lines.get(&line) {
            return Some(*existing);
        }
        if self.lines.len() >= self.cap {
            return None;
        }
        match self.lines.entry(line) {
            Entry::Occupied(e) => Some(*e.get()),
            Entry::Vacant(v) => {
                let leaked: &'static str = Box::leak(v.key().clone().into_boxed_str());
                v.insert(leaked);
                Some(leaked)
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

static CONTENT_TYPES: Lazy<LineTable> = Lazy::new(|| LineTable::new(MAX_CONTENT_TYPE_LINES));
static VALIDATORS: Lazy<LineTable> = Lazy::new(|| LineTable::new(MAX_VALIDATOR_LINES));
static OTHER: Lazy<LineTable> = Lazy::new(|| LineTable::new(MAX_OTHER_LINES));
static DROPPED: AtomicUsize = AtomicUsize::new(0);

/// Header lines skipped because their table was full.
#[must_use]
pub fn dropped_header_lines() -> usize {
    DROPPED.load(Ordering::Relaxed)
}

fn table_for(name: &str) -> &'static LineTable {
    if name.eq_ignore_ascii_case("content-type") {
        &CONTENT_TYPES
    } else if name.eq_ignore_ascii_case("etag") || name.eq_ignore_ascii_case("last-modified") {
        &VALIDATORS
    } else {
        &OTHER
    }
}

/// A `'static` line for `name: value`, or `None` when it cannot be interned.
#[must_use]
pub fn static_header_line(name: &str, value: &str) -> Option<&'static str> {
    let line = table_for(name).intern(format!("{name}: {value}"));
    if line.is_none() {
        DROPPED.fetch_add(1, Ordering::Relaxed);
        debug!(header = %name, "S1: header line table full, line dropped");
    }
    line
}

/// Reason phrase for the statuses fedrouter emits.
#[must_use]
pub fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        429 => "Too Many Requests",
        503 => "Service Unavailable",
        _ => "Internal Server Error",
    }
}

/// Headers the transport computes itself or never writes.
fn is_skipped_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("content-length")
        || name.eq_ignore_ascii_case("date")
        || name.eq_ignore_ascii_case(REQUEST_ID_HEADER)
}

pub fn write_response(res: &mut Response, resp: HttpResponse) {
    res.status_code(usize::from(resp.status), status_reason(resp.status));
    for (name, value) in &resp.headers {
        if is_skipped_header(name) {
            continue;
        }
        if let Some(line) = static_header_line(name, value) {
            res.header(line);
        }
    }
    res.body_vec(resp.body);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(304), "Not Modified");
        assert_eq!(status_reason(402), "Payment Required");
        assert_eq!(status_reason(429), "Too Many Requests");
    }

    #[test]
    fn test_interned_lines_are_shared() {
        let a = static_header_line("Content-Type", "text/css").unwrap();
        let b = static_header_line("Content-Type", "text/css").unwrap();
        assert_eq!(a, "Content-Type: text/css");
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn test_full_table_stops_allocating() {
        let table = LineTable::new(2);
        let first = table.intern("ETag: \"a\"".to_string()).unwrap();
        assert!(table.intern("ETag: \"b\"".to_string()).is_some());
        for i in 0..1000 {
            assert!(table.intern(format!("ETag: \"{i}\"")).is_none());
        }
        assert_eq!(table.len(), 2);
        // lines already in a full table are still served from it
        let again = table.intern("ETag: \"a\"".to_string()).unwrap();
        assert!(std::ptr::eq(first, again));
    }

    #[test]
    fn test_request_id_is_never_interned() {
        assert!(is_skipped_header("X-Request-Id"));
        assert!(is_skipped_header("content-length"));
        assert!(!is_skipped_header("Set-Cookie"));
    }

    #[test]
    fn test_classes_have_separate_tables() {
        assert!(std::ptr::eq(table_for("content-type"), table_for("Content-Type")));
        assert!(std::ptr::eq(table_for("ETag"), table_for("last-modified")));
        assert!(!std::ptr::eq(table_for("Set-Cookie"), table_for("ETag")));
    }
}
