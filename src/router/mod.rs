//! # Router Module
//!
//! The router turns an inbound request target into zero or one [`RouteMatch`].
//!
//! ## Overview
//!
//! Classification happens in two phases:
//!
//! 1. **Normalization**: the raw target is percent-decoded, validated and split into a
//!    [`PathView`] (segments, format suffix, query pairs). Disallowed characters and `..`
//!    segments are rejected here with a 400.
//!
//! 2. **Matching**: the view is tested against the ordered route table in [`ROUTES`]. The
//!    first predicate that accepts it wins and returns the captured parameters together with
//!    the route's declared representations, access level and admission policy.
//!
//! ## Example
//!
//! ```rust
//! use fedrouter::router::{RouteClassifier, RouteId};
//!
//! let classifier = RouteClassifier::new();
//! let matched = classifier
//!     .classify_path("/users/alice/statuses/123")
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(matched.id(), RouteId::Post);
//! assert_eq!(matched.nickname(), Some("alice"));
//! ```
//!
//! ## Performance
//!
//! Predicates are plain functions over borrowed segments; matching is a linear scan of a
//! static table with no allocation besides the captured values.

mod core;
mod path;
mod table;

pub use core::{ParamVec, RouteClassifier, RouteMatch, MAX_INLINE_PARAMS};
pub use path::{parse_query, FormatSuffix, PathView};
pub use table::{
    clamp_page, is_hashtag, is_nickname, is_status_id, Access, Admission, Predicate, RouteId,
    RouteRule, Target, MAX_PAGE, OWNER_TIMELINES, ROUTES,
};
