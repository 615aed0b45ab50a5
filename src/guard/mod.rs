//! # Admission Guards
//!
//! Two kinds of admission control protect the expensive parts of the dispatcher:
//!
//! - [`GuardRegistry`] hands out named singleton guards (`webfinger`, `nodeinfo`, `vcard`, ...).
//!   At most one request holds a given guard; a second caller is refused with 503 instead of
//!   waiting. The [`GuardHandle`] releases on `Drop`, so a panicking handler cannot leak it.
//! - [`RateLimiter`] is a single cooldown shared by every "heavy" route (feeds, timelines,
//!   collections). Requests inside the interval get 429.
//!
//! Neither ever blocks: both are a handful of atomic operations.

mod rate_limit;
mod singleton;

pub use rate_limit::RateLimiter;
pub use singleton::{GuardHandle, GuardRegistry, GuardState};

/// Guard names used by the route table.
pub const GUARD_NAMES: &[&str] = &[
    "webfinger",
    "nodeinfo",
    "security_txt",
    "followers_sync",
    "vcard",
    "masto_api",
];
