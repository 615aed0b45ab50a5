use http::Method;
use std::sync::Arc;
use tracing::debug;

use crate::dispatcher::HeaderVec;
use crate::ids::{RequestId, REQUEST_ID_HEADER};

/// An inbound request, detached from the transport.
///
/// Header names are lowercase. The dispatcher only ever sees this type, so tests can build
/// requests without a socket.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Request target as sent: raw path plus query string
    pub target: String,
    pub headers: HeaderVec,
    pub cookies: HeaderVec,
    pub request_id: RequestId,
}

impl Request {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: HeaderVec::new(),
            cookies: HeaderVec::new(),
            request_id: RequestId::new(),
        }
    }

    /// Shorthand for a GET request.
    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    /// Add a header. A `cookie` header is also parsed into [`Request::cookies`].
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if name == "cookie" {
            self.cookies.extend(parse_cookies(value));
        }
        self.headers.push((Arc::from(name), value.to_string()));
        self
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Path part of the target, without the query string.
    #[must_use]
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or("/")
    }

    #[must_use]
    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }
}

/// Split a `Cookie` header into name/value pairs.
#[must_use]
pub fn parse_cookies(header: &str) -> HeaderVec {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=').unwrap_or((pair.trim(), ""));
            let name = name.trim();
            (!name.is_empty()).then(|| (Arc::from(name), value.trim().to_string()))
        })
        .collect()
}

/// Extract a [`Request`] from a `may_minihttp::Request`.
///
/// Methods `http` cannot represent become an extension method the dispatcher rejects with 405.
pub fn parse_request(req: &may_minihttp::Request) -> Request {
    let method = Method::from_bytes(req.method().as_bytes()).unwrap_or(Method::CONNECT);
    let target = req.path().to_string();

    let headers: HeaderVec = req
        .headers()
        .iter()
        .map(|h| {
            (
                Arc::from(h.name.to_ascii_lowercase()),
                String::from_utf8_lossy(h.value).into_owned(),
            )
        })
        .collect();

    let cookies = headers
        .iter()
        .filter(|(k, _)| k.as_ref() == "cookie")
        .flat_map(|(_, v)| parse_cookies(v))
        .collect();

    let request_id = RequestId::from_header_or_new(
        headers
            .iter()
            .find(|(k, _)| k.as_ref() == REQUEST_ID_HEADER)
            .map(|(_, v)| v.as_str()),
    );

    // R1: request parsed
    debug!(
        request_id = %request_id,
        method = %method,
        target = %target,
        header_count = headers.len(),
        "R1: HTTP request parsed"
    );

    Request {
        method,
        target,
        headers,
        cookies,
        request_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cookies() {
        let cookies = parse_cookies("a=b; session=tok=en ;flag");
        assert_eq!(cookies.len(), 3);
        assert_eq!(cookies[0].1, "b");
        assert_eq!(cookies[1].1, "tok=en");
        assert_eq!(cookies[2].0.as_ref(), "flag");
        assert!(parse_cookies(" ; ").is_empty());
    }

    #[test]
    fn test_builder_lowercases_and_parses_cookies() {
        let req = Request::get("/users/alice?page=2")
            .with_header("Accept", "text/html")
            .with_header("Cookie", "session=abc");
        assert_eq!(req.get_header("accept"), Some("text/html"));
        assert_eq!(req.headers[0].0.as_ref(), "accept");
        assert_eq!(req.get_cookie("session"), Some("abc"));
        assert_eq!(req.path(), "/users/alice");
        assert!(!req.is_head());
    }
}
