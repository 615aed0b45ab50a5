//! # Content Negotiation
//!
//! Selects exactly one [`RepresentationKind`] for a matched route. Negotiation is a pure
//! function of the format suffix, the `Accept` header, the caller's [`AuthContext`] and the
//! representations the route declares; it never touches I/O.
//!
//! ## Rules (first applicable wins)
//!
//! 1. A route declaring a single representation always gets it, unless the request asks for
//!    HTML and the route only offers federation JSON, or the other way round (404).
//! 2. A format suffix (`.json`, `.csv`, `.ics`, `.vcf`) selects its representation; a suffix
//!    the route does not declare is a 404.
//! 3. `Accept` markers are tested in [`ACCEPT_MARKERS`] order; the first marker whose
//!    representation the route declares wins.
//! 4. Wildcard or unrecognized `Accept`: signed peers get federation JSON, logged-in users get
//!    HTML, everyone else gets the route's first declared representation.
//!
//! An `Accept` asking for `text/html` is never answered with federation JSON, and an `Accept`
//! asking for federation JSON is never answered with HTML.

use crate::error::{DispatchError, DispatchResult, NotFoundCode};
use crate::router::FormatSuffix;
use crate::security::AuthContext;
use std::fmt;

/// One of the wire representations a resource can be served in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepresentationKind {
    Html,
    ActivityJson,
    Rss2,
    Rss3,
    Csv,
    Ical,
    Ssml,
    Vcard,
}

impl RepresentationKind {
    /// Default `Content-Type` for the representation.
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            RepresentationKind::Html => "text/html; charset=utf-8",
            RepresentationKind::ActivityJson => "application/activity+json",
            RepresentationKind::Rss2 => "text/xml; charset=UTF-8",
            RepresentationKind::Rss3 => "text/plain; charset=utf-8",
            RepresentationKind::Csv => "text/csv",
            RepresentationKind::Ical => "text/calendar",
            RepresentationKind::Ssml => "application/ssml+xml",
            RepresentationKind::Vcard => "text/vcard",
        }
    }

    #[must_use]
    pub const fn from_suffix(suffix: FormatSuffix) -> Self {
        match suffix {
            FormatSuffix::Json => RepresentationKind::ActivityJson,
            FormatSuffix::Csv => RepresentationKind::Csv,
            FormatSuffix::Ics => RepresentationKind::Ical,
            FormatSuffix::Vcf => RepresentationKind::Vcard,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RepresentationKind::Html => "html",
            RepresentationKind::ActivityJson => "activity_json",
            RepresentationKind::Rss2 => "rss2",
            RepresentationKind::Rss3 => "rss3",
            RepresentationKind::Csv => "csv",
            RepresentationKind::Ical => "ical",
            RepresentationKind::Ssml => "ssml",
            RepresentationKind::Vcard => "vcard",
        }
    }
}

impl fmt::Display for RepresentationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Accept` markers in priority order.
pub const ACCEPT_MARKERS: &[(&str, RepresentationKind)] = &[
    ("text/html", RepresentationKind::Html),
    ("text/calendar", RepresentationKind::Ical),
    ("application/ssml+xml", RepresentationKind::Ssml),
    ("text/csv", RepresentationKind::Csv),
    ("text/vcard", RepresentationKind::Vcard),
    ("application/vcard+xml", RepresentationKind::Vcard),
    ("application/activity+json", RepresentationKind::ActivityJson),
    ("application/ld+json", RepresentationKind::ActivityJson),
    ("application/json", RepresentationKind::ActivityJson),
    ("application/rss+xml", RepresentationKind::Rss2),
    ("text/xml", RepresentationKind::Rss2),
    ("application/xml", RepresentationKind::Rss2),
    ("text/plain", RepresentationKind::Rss3),
];

const VCARD_XML: &str = "application/vcard+xml";

/// Outcome of negotiation: the representation and the concrete MIME type to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    pub kind: RepresentationKind,
    pub mime: &'static str,
}

impl Negotiated {
    fn new(kind: RepresentationKind, accept: &str) -> Self {
        let mime = if kind == RepresentationKind::Vcard && contains_marker(accept, VCARD_XML) {
            VCARD_XML
        } else {
            kind.mime()
        };
        Self { kind, mime }
    }
}

fn contains_marker(accept: &str, marker: &str) -> bool {
    accept
        .split(',')
        .map(|part| part.split(';').next().unwrap_or_default().trim())
        .any(|media| media.eq_ignore_ascii_case(marker))
}

/// True when the caller is a browser asking for HTML.
///
/// A format suffix always names a non-HTML representation, so it overrides `Accept`. This
/// predicate is what the authorization gate consults before any signature is verified.
#[must_use]
pub fn wants_html(suffix: Option<FormatSuffix>, accept: &str) -> bool {
    suffix.is_none() && contains_marker(accept, "text/html")
}

/// True when the request explicitly asks for `kind`, by suffix or by `Accept` marker.
#[must_use]
pub fn requests(kind: RepresentationKind, suffix: Option<FormatSuffix>, accept: &str) -> bool {
    match suffix {
        Some(s) => RepresentationKind::from_suffix(s) == kind,
        None => ACCEPT_MARKERS
            .iter()
            .any(|(marker, k)| *k == kind && contains_marker(accept, marker)),
    }
}

/// The request names the HTML/federation-JSON counterpart of `only` and not `only` itself.
fn contradicts(only: RepresentationKind, suffix: Option<FormatSuffix>, accept: &str) -> bool {
    let opposite = match only {
        RepresentationKind::Html => RepresentationKind::ActivityJson,
        RepresentationKind::ActivityJson => RepresentationKind::Html,
        _ => return false,
    };
    requests(opposite, suffix, accept) && !requests(only, suffix, accept)
}

/// Choose the representation for a matched route.
///
/// # Errors
///
/// `NotFound` when the suffix is not declared by the route, or when `Accept` names only
/// representations the route does not offer and carries no wildcard.
pub fn negotiate(
    suffix: Option<FormatSuffix>,
    accept: &str,
    auth: &AuthContext,
    declared: &[RepresentationKind],
) -> DispatchResult<Negotiated> {
    let Some(&first) = declared.first() else {
        return Err(DispatchError::not_found(NotFoundCode::NoRepresentation));
    };

    // 1. representation-restricted route
    if declared.len() == 1 {
        if contradicts(first, suffix, accept) {
            return Err(DispatchError::not_found(NotFoundCode::NoRepresentation));
        }
        return Ok(Negotiated::new(first, accept));
    }

    // 2. explicit suffix
    if let Some(s) = suffix {
        let kind = RepresentationKind::from_suffix(s);
        return if declared.contains(&kind) {
            Ok(Negotiated::new(kind, accept))
        } else {
            Err(DispatchError::not_found(NotFoundCode::UnsupportedSuffix))
        };
    }

    // 3. Accept markers in priority order
    let mut recognized = false;
    for (marker, kind) in ACCEPT_MARKERS {
        if contains_marker(accept, marker) {
            recognized = true;
            if declared.contains(kind) {
                return Ok(Negotiated::new(*kind, accept));
            }
        }
    }
    if recognized && !accept.contains("*/*") {
        return Err(DispatchError::not_found(NotFoundCode::NoRepresentation));
    }

    // 4. wildcard / unrecognized: authentication decides
    let html_requested = contains_marker(accept, "text/html");
    let preferred = if auth.is_federation_signed()
        && !html_requested
        && declared.contains(&RepresentationKind::ActivityJson)
    {
        RepresentationKind::ActivityJson
    } else if auth.is_locally_authenticated() && declared.contains(&RepresentationKind::Html) {
        RepresentationKind::Html
    } else if html_requested {
        declared
            .iter()
            .copied()
            .find(|k| *k != RepresentationKind::ActivityJson)
            .ok_or(DispatchError::not_found(NotFoundCode::NoRepresentation))?
    } else {
        first
    };
    Ok(Negotiated::new(preferred, accept))
}
