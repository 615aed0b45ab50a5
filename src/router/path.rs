//! Request path normalization.
//!
//! Every inbound path is decoded and validated exactly once, producing a [`PathView`] that the
//! route predicates inspect. Predicates never see a raw path.

use chrono::Datelike;
use smallvec::SmallVec;
use std::sync::Arc;

use super::core::ParamVec;
use crate::error::{DispatchError, DispatchResult, MalformedCode};

/// Characters that may never appear in a decoded request path.
const DISALLOWED_CHARS: [char; 4] = ['\n', '\r', '\0', '\t'];

/// Maximum inline path segments before heap allocation.
pub const MAX_INLINE_SEGMENTS: usize = 8;

/// Representation-selecting suffix split off the last path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatSuffix {
    Json,
    Csv,
    Ics,
    Vcf,
}

impl FormatSuffix {
    /// Recognize a suffix (without the leading dot), case-sensitively.
    #[must_use]
    pub fn parse(ext: &str) -> Option<Self> {
        match ext {
            "json" => Some(FormatSuffix::Json),
            "csv" => Some(FormatSuffix::Csv),
            "ics" => Some(FormatSuffix::Ics),
            "vcf" => Some(FormatSuffix::Vcf),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            FormatSuffix::Json => "json",
            FormatSuffix::Csv => "csv",
            FormatSuffix::Ics => "ics",
            FormatSuffix::Vcf => "vcf",
        }
    }
}

/// Decoded, validated view of a request target.
///
/// `segments` are the path segments with any [`FormatSuffix`] removed from the last one;
/// `raw_segments` keep the last segment intact for asset and media routes, which name files.
#[derive(Debug, Clone)]
pub struct PathView {
    /// Decoded path without query string or trailing slash
    pub path: String,
    pub segments: SmallVec<[String; MAX_INLINE_SEGMENTS]>,
    pub raw_segments: SmallVec<[String; MAX_INLINE_SEGMENTS]>,
    pub format_suffix: Option<FormatSuffix>,
    pub query: ParamVec,
    /// Year used when a calendar query carries no valid year
    pub default_year: i32,
}

impl PathView {
    /// Normalize a raw request target (`/path?query`).
    ///
    /// # Errors
    ///
    /// `MalformedPath` when the path does not decode to UTF-8, contains control characters,
    /// contains a `..` segment, or is not absolute.
    pub fn parse(raw: &str) -> DispatchResult<Self> {
        Self::parse_with_year(raw, chrono::Utc::now().year())
    }

    /// [`PathView::parse`] with an explicit calendar default year.
    pub fn parse_with_year(raw: &str, default_year: i32) -> DispatchResult<Self> {
        let (raw_path, raw_query) = match raw.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (raw, None),
        };

        let decoded = urlencoding::decode(raw_path)
            .map_err(|_| DispatchError::malformed(MalformedCode::BadEncoding))?;
        if !decoded.starts_with('/') || decoded.contains(DISALLOWED_CHARS) {
            return Err(DispatchError::malformed(MalformedCode::DisallowedCharacters));
        }

        let mut path = decoded.into_owned();
        while path.len() > 1 && path.ends_with('/') {
            path.pop();
        }

        let raw_segments: SmallVec<[String; MAX_INLINE_SEGMENTS]> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if raw_segments.iter().any(|s| s == "..") {
            return Err(DispatchError::malformed(MalformedCode::DisallowedCharacters));
        }

        let mut segments = raw_segments.clone();
        let mut format_suffix = None;
        if let Some(last) = segments.last_mut() {
            if let Some((stem, ext)) = last.rsplit_once('.') {
                if let Some(suffix) = FormatSuffix::parse(ext).filter(|_| !stem.is_empty()) {
                    format_suffix = Some(suffix);
                    let stem_len = stem.len();
                    last.truncate(stem_len);
                }
            }
        }

        Ok(Self {
            path,
            segments,
            raw_segments,
            format_suffix,
            query: raw_query.map(parse_query).unwrap_or_default(),
            default_year,
        })
    }

    /// Segments with the format suffix removed.
    #[inline]
    #[must_use]
    pub fn segs(&self) -> SmallVec<[&str; MAX_INLINE_SEGMENTS]> {
        self.segments.iter().map(String::as_str).collect()
    }

    /// Segments exactly as requested.
    #[inline]
    #[must_use]
    pub fn raw_segs(&self) -> SmallVec<[&str; MAX_INLINE_SEGMENTS]> {
        self.raw_segments.iter().map(String::as_str).collect()
    }

    /// Last-write-wins query lookup.
    #[inline]
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Parse a query string into decoded pairs. Pairs that fail to decode are skipped.
#[must_use]
pub fn parse_query(query: &str) -> ParamVec {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            let k = urlencoding::decode(&k.replace('+', " ")).ok()?.into_owned();
            let v = urlencoding::decode(&v.replace('+', " ")).ok()?.into_owned();
            Some((Arc::<str>::from(k), v))
        })
        .collect()
}
