//! Same-origin URL rewriting.
//!
//! A caller reaching the instance through its onion or i2p identity must receive bodies whose
//! self-links point back into that network. Rewriting is a pure text transform: every absolute
//! URL whose authority is exactly the clearnet domain is replaced by the caller's origin, and
//! every other byte is left untouched.
//!
//! Recognized forms: `https://d`, `http://d`, and the JSON-escaped `https:\/\/d` and
//! `http:\/\/d`. The authority must be followed by a boundary (`/`, `"`, `'`, `<`, `?`, `#`,
//! `)`, `\`, whitespace or end of input), so `social.example.org` is not mistaken for
//! `social.example`.

/// Source and target of a rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityMap {
    from_domain: String,
    to_origin: String,
    /// (needle, replacement) pairs, tried in order
    patterns: [(String, String); 4],
}

impl IdentityMap {
    /// Map `https://from_domain` (and friends) onto `to_origin` (`http://x.onion`).
    #[must_use]
    pub fn new(from_domain: &str, to_origin: &str) -> Self {
        let from = from_domain.to_ascii_lowercase();
        let to = to_origin.trim_end_matches('/').to_string();
        let escaped_to = to.replace('/', "\\/");
        let patterns = [
            (format!("https://{from}"), to.clone()),
            (format!("http://{from}"), to.clone()),
            (format!("https:\\/\\/{from}"), escaped_to.clone()),
            (format!("http:\\/\\/{from}"), escaped_to),
        ];
        Self {
            from_domain: from,
            to_origin: to,
            patterns,
        }
    }

    #[must_use]
    pub fn from_domain(&self) -> &str {
        &self.from_domain
    }

    #[must_use]
    pub fn to_origin(&self) -> &str {
        &self.to_origin
    }
}

/// Rewrites same-origin URLs in a response body.
pub trait DomainRewriter: Send + Sync {
    fn rewrite(&self, body: &str, map: &IdentityMap) -> String;
}

/// The default rewriter: exact authority match with a boundary check.
#[derive(Debug, Default, Clone, Copy)]
pub struct BoundaryRewriter;

fn is_boundary(next: Option<char>) -> bool {
    match next {
        None => true,
        Some(c) => {
            c.is_whitespace()
                || matches!(c, '/' | '"' | '\'' | '<' | '>' | '?' | '#' | ')' | ']' | ',' | ';' | '\\')
        }
    }
}

impl DomainRewriter for BoundaryRewriter {
    fn rewrite(&self, body: &str, map: &IdentityMap) -> String {
        let mut out = String::with_capacity(body.len());
        let mut rest = body;
        while let Some(pos) = rest.find("http") {
            out.push_str(&rest[..pos]);
            let candidate = &rest[pos..];
            let hit = map.patterns.iter().find(|(needle, _)| {
                candidate.len() >= needle.len()
                    && candidate.as_bytes()[..needle.len()].eq_ignore_ascii_case(needle.as_bytes())
                    && is_boundary(candidate[needle.len()..].chars().next())
            });
            match hit {
                Some((needle, replacement)) => {
                    out.push_str(replacement);
                    rest = &candidate[needle.len()..];
                }
                None => {
                    out.push_str("http");
                    rest = &candidate[4..];
                }
            }
        }
        out.push_str(rest);
        out
    }
}
