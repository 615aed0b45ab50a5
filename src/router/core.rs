//! Router core module - hot path for request classification.
//!
//! Classification walks the ordered route table once and stops at the first predicate that
//! accepts the [`PathView`]. Parameter storage is stack-allocated for the common case.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::path::{FormatSuffix, PathView};
use super::table::{Access, Admission, RouteId, RouteRule, Target, ROUTES};
use crate::error::DispatchResult;
use crate::negotiate::RepresentationKind;

/// Maximum number of captured parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
///
/// Names are `Arc<str>` because they come from the static route table; values are per-request.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Result of successfully classifying a request path.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The matched table entry
    pub rule: &'static RouteRule,
    /// Captured parameters (`nickname`, `id`, `page`, `tag`, `file`, ...)
    pub params: ParamVec,
    pub format_suffix: Option<FormatSuffix>,
}

impl RouteMatch {
    #[inline]
    #[must_use]
    pub fn id(&self) -> RouteId {
        self.rule.id
    }

    /// Get a captured parameter by name (last write wins).
    #[inline]
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// The captured nickname, if the route has one.
    #[inline]
    #[must_use]
    pub fn nickname(&self) -> Option<&str> {
        self.param("nickname")
    }

    /// The captured page number (routes without paging report page 1).
    #[must_use]
    pub fn page(&self) -> u32 {
        self.param("page").and_then(|p| p.parse().ok()).unwrap_or(1)
    }

    #[inline]
    #[must_use]
    pub fn representations(&self) -> &'static [RepresentationKind] {
        self.rule.representations
    }

    #[inline]
    #[must_use]
    pub fn access(&self) -> Access {
        self.rule.access
    }

    #[inline]
    #[must_use]
    pub fn admission(&self) -> Admission {
        self.rule.admission
    }

    #[inline]
    #[must_use]
    pub fn target(&self) -> Target {
        self.rule.target
    }

    #[inline]
    #[must_use]
    pub fn is_fast_path(&self) -> bool {
        self.rule.fast_path
    }

    /// Convert params to a HashMap.
    /// Note: This allocates - use `param()` in hot paths instead
    #[must_use]
    pub fn params_map(&self) -> HashMap<String, String> {
        self.params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

/// Classifies normalized paths against an ordered route table.
#[derive(Debug, Clone, Copy)]
pub struct RouteClassifier {
    rules: &'static [RouteRule],
}

impl Default for RouteClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteClassifier {
    /// Classifier over the built-in route table.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rules(ROUTES)
    }

    /// Classifier over an arbitrary static table.
    #[must_use]
    pub fn with_rules(rules: &'static [RouteRule]) -> Self {
        info!(routes_count = rules.len(), "Route table loaded");
        Self { rules }
    }

    #[must_use]
    pub fn rules(&self) -> &'static [RouteRule] {
        self.rules
    }

    /// Find the first rule accepting `view`.
    #[must_use]
    pub fn classify(&self, view: &PathView) -> Option<RouteMatch> {
        for rule in self.rules {
            if let Some(params) = (rule.predicate)(view) {
                // R2: route matched
                debug!(
                    route = %rule.id,
                    path = %view.path,
                    params = params.len(),
                    suffix = ?view.format_suffix,
                    "R2: route matched"
                );
                return Some(RouteMatch {
                    rule,
                    params,
                    format_suffix: view.format_suffix,
                });
            }
        }
        debug!(path = %view.path, "R2: no route matched");
        None
    }

    /// Normalize and classify a raw request target in one step.
    ///
    /// # Errors
    ///
    /// `MalformedPath` when the target fails normalization.
    pub fn classify_path(&self, raw: &str) -> DispatchResult<Option<RouteMatch>> {
        let view = PathView::parse(raw)?;
        Ok(self.classify(&view))
    }
}
