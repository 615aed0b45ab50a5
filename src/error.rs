//! # Dispatch Errors
//!
//! Every stage of the dispatch pipeline returns `Result<_, DispatchError>`. The error carries the
//! caller-visible HTTP status and, for the statuses that are deliberately ambiguous (400 and
//! 404), an internal diagnostic code that is logged but never written to the response body.
//!
//! | Variant              | Status | Meaning                                                  |
//! |----------------------|--------|----------------------------------------------------------|
//! | `MalformedPath`      | 400    | Disallowed characters, host mismatch, bad stored JSON    |
//! | `Unauthorized`       | 401    | No valid credential                                      |
//! | `PaymentRequired`    | 402    | Blocked crawler                                          |
//! | `Forbidden`          | 403    | Valid credential, disallowed action (or blocked host)    |
//! | `NotFound`           | 404    | Absent *or* undisclosed resource                         |
//! | `MethodNotAllowed`   | 405    | Resource requires a different authorization path         |
//! | `RateLimited`        | 429    | RateLimiter cooldown not yet elapsed                     |
//! | `GuardBusy`          | 503    | Named singleton guard already held                       |
//! | `HandlerFailed`      | 503    | Handler panicked; guard was still released               |

use std::fmt;

/// Internal reason behind a 400 response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedCode {
    /// Control characters or `..` segments in the path
    DisallowedCharacters,
    /// Percent-decoding produced invalid UTF-8
    BadEncoding,
    /// `Host` matched none of the configured network identities
    HostMismatch,
    /// Missing `Accept` without an upgrade request
    MissingAccept,
    /// Stored JSON document could not be parsed
    StoredDocument,
}

/// Internal reason behind a 404 response.
///
/// Callers only ever see "Not Found"; the code exists so that logs can tell a genuinely absent
/// resource from one hidden from an unauthorized caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundCode {
    NoRoute,
    Undisclosed,
    HandlerDeclined,
    NoDocument,
    UnsupportedSuffix,
    /// `Accept` named only representations the route does not offer
    NoRepresentation,
    BlockedHashtag,
}

/// Typed failure of a dispatch stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    MalformedPath { code: MalformedCode },
    Unauthorized,
    PaymentRequired,
    Forbidden,
    NotFound { code: NotFoundCode },
    MethodNotAllowed,
    RateLimited,
    GuardBusy { guard: &'static str },
    HandlerFailed,
}

impl DispatchError {
    /// Shorthand for a 404 with the given diagnostic code.
    #[must_use]
    pub const fn not_found(code: NotFoundCode) -> Self {
        DispatchError::NotFound { code }
    }

    /// Shorthand for a 400 with the given diagnostic code.
    #[must_use]
    pub const fn malformed(code: MalformedCode) -> Self {
        DispatchError::MalformedPath { code }
    }

    /// The HTTP status written to the caller.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            DispatchError::MalformedPath { .. } => 400,
            DispatchError::Unauthorized => 401,
            DispatchError::PaymentRequired => 402,
            DispatchError::Forbidden => 403,
            DispatchError::NotFound { .. } => 404,
            DispatchError::MethodNotAllowed => 405,
            DispatchError::RateLimited => 429,
            DispatchError::GuardBusy { .. } | DispatchError::HandlerFailed => 503,
        }
    }

    /// Caller-visible message. Identical for every diagnostic code of a status.
    #[must_use]
    pub const fn public_message(&self) -> &'static str {
        match self {
            DispatchError::MalformedPath { .. } => "Bad Request",
            DispatchError::Unauthorized => "Unauthorized",
            DispatchError::PaymentRequired => "Payment Required",
            DispatchError::Forbidden => "Forbidden",
            DispatchError::NotFound { .. } => "Not Found",
            DispatchError::MethodNotAllowed => "Method Not Allowed",
            DispatchError::RateLimited => "Too Many Requests",
            DispatchError::GuardBusy { .. } | DispatchError::HandlerFailed => {
                "Service Unavailable"
            }
        }
    }

    /// True for the back-off statuses (429/503) that tell the caller to retry later.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(
            self,
            DispatchError::RateLimited
                | DispatchError::GuardBusy { .. }
                | DispatchError::HandlerFailed
        )
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::MalformedPath { code } => {
                write!(f, "malformed request ({code:?})")
            }
            DispatchError::Unauthorized => write!(f, "no valid credential presented"),
            DispatchError::PaymentRequired => write!(f, "caller is a blocked crawler"),
            DispatchError::Forbidden => {
                write!(f, "credential recognized but the action is not permitted")
            }
            DispatchError::NotFound { code } => write!(f, "not found ({code:?})"),
            DispatchError::MethodNotAllowed => {
                write!(f, "resource requires a different authorization path")
            }
            DispatchError::RateLimited => write!(f, "heavy request cooldown has not elapsed"),
            DispatchError::GuardBusy { guard } => {
                write!(f, "singleton guard '{guard}' is already held")
            }
            DispatchError::HandlerFailed => write!(f, "handler panicked"),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Result alias used across the dispatch pipeline.
pub type DispatchResult<T> = Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statuses_cover_outbound_set() {
        let all = [
            DispatchError::malformed(MalformedCode::HostMismatch),
            DispatchError::Unauthorized,
            DispatchError::PaymentRequired,
            DispatchError::Forbidden,
            DispatchError::not_found(NotFoundCode::NoRoute),
            DispatchError::MethodNotAllowed,
            DispatchError::RateLimited,
            DispatchError::GuardBusy { guard: "nodeinfo" },
            DispatchError::HandlerFailed,
        ];
        let statuses: Vec<u16> = all.iter().map(DispatchError::status).collect();
        assert_eq!(statuses, vec![400, 401, 402, 403, 404, 405, 429, 503, 503]);
    }

    #[test]
    fn test_not_found_codes_share_public_message() {
        let absent = DispatchError::not_found(NotFoundCode::NoRoute);
        let hidden = DispatchError::not_found(NotFoundCode::Undisclosed);
        assert_eq!(absent.status(), hidden.status());
        assert_eq!(absent.public_message(), hidden.public_message());
        assert_ne!(absent, hidden);
    }

    #[test]
    fn test_busy_classification() {
        assert!(DispatchError::RateLimited.is_busy());
        assert!(DispatchError::GuardBusy { guard: "vcard" }.is_busy());
        assert!(!DispatchError::Forbidden.is_busy());
    }
}
