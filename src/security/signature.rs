//! HTTP signature header parsing.
//!
//! Only the parameters needed for routing decisions are parsed here. Verification belongs to
//! a [`SignatureOracle`] implementation.

use smallvec::SmallVec;
use tracing::debug;
use url::Url;

use super::SignatureOracle;
use crate::dispatcher::HeaderVec;
use crate::network::OutboundSession;

/// Split a `Signature` header (or the part after `Authorization: Signature `) into its
/// `name="value"` parameters.
#[must_use]
pub fn signature_params(header: &str) -> SmallVec<[(&str, &str); 6]> {
    let header = header.strip_prefix("Signature ").unwrap_or(header);
    header
        .split(',')
        .filter_map(|part| {
            let (name, value) = part.trim().split_once('=')?;
            Some((name.trim(), value.trim().trim_matches('"')))
        })
        .collect()
}

/// The `keyId` parameter of a signature header.
#[must_use]
pub fn key_id(header: &str) -> Option<&str> {
    signature_params(header)
        .into_iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("keyId"))
        .map(|(_, value)| value)
        .filter(|v| !v.is_empty())
}

/// Lowercased host of the signer's `keyId` URL.
#[must_use]
pub fn key_id_domain(header: &str) -> Option<String> {
    let url = Url::parse(key_id(header)?).ok()?;
    url.host_str().map(str::to_ascii_lowercase)
}

/// Oracle that rejects every signature.
///
/// The default until a verifying oracle is wired in; signed peers are then treated as
/// anonymous, which secure mode answers with 401 on non-public federation routes.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnverifiedSignatures;

impl SignatureOracle for UnverifiedSignatures {
    fn verify(&self, session: &OutboundSession, _headers: &HeaderVec, path: &str) -> bool {
        debug!(network = %session.network(), path = %path, "signature verification unavailable");
        false
    }
}
