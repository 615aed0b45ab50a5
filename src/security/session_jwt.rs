use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::SessionValidator;

/// Claims carried by a local session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Account nickname
    pub sub: String,
    /// Expiry, seconds since the epoch
    pub exp: u64,
}

/// HS256 session tokens signed with a server secret.
///
/// `exp` is required and enforced; `sub` must be a valid nickname.
pub struct JwtSessionValidator {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
}

impl JwtSessionValidator {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.leeway = 0;
        Self {
            decoding: DecodingKey::from_secret(secret),
            encoding: EncodingKey::from_secret(secret),
            validation,
        }
    }

    /// Sign a session token for `nickname` expiring at `exp` (epoch seconds).
    ///
    /// # Errors
    ///
    /// Propagates encoding failures from `jsonwebtoken`.
    pub fn issue(&self, nickname: &str, exp: u64) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = SessionClaims {
            sub: nickname.to_string(),
            exp,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }
}

impl SessionValidator for JwtSessionValidator {
    fn validate(&self, token: &str) -> Option<String> {
        match decode::<SessionClaims>(token, &self.decoding, &self.validation) {
            Ok(data) if crate::router::is_nickname(&data.claims.sub) => Some(data.claims.sub),
            Ok(data) => {
                debug!(sub = %data.claims.sub, "session token subject is not a nickname");
                None
            }
            Err(e) => {
                debug!(error = %e, "session token rejected");
                None
            }
        }
    }
}
