//! Signed session tokens.
//!
//! A session token is an HS256 JWT naming the account identifier. Nothing is
//! stored server-side; a token is valid until its `exp` passes.

use std::fmt;
use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::clock::Clock;
use crate::config::SessionConfig;

/// Why a session token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionRejection {
    /// Signed with a different key, or altered after signing.
    #[error("bad signature")]
    BadSignature,
    /// Past its expiry time.
    #[error("session expired")]
    Expired,
    /// Not a well-formed session token.
    #[error("malformed session token")]
    Malformed,
}

/// JWT claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (account identifier).
    pub sub: String,
    /// Issued at, Unix seconds.
    pub iat: i64,
    /// Expiration, Unix seconds.
    pub exp: i64,
    /// Token ID.
    pub jti: String,
}

/// An issued bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// The encoded token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mints and checks session tokens with the server-held secret.
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl SessionIssuer {
    /// Create an issuer from the session configuration.
    pub fn new(config: &SessionConfig, clock: Arc<dyn Clock>) -> crate::Result<Self> {
        Ok(Self::with_secret(
            config.secret.as_bytes(),
            config.lifetime()?,
            clock,
        ))
    }

    /// Create an issuer from a raw secret and lifetime.
    pub fn with_secret(secret: &[u8], lifetime: chrono::Duration, clock: Arc<dyn Clock>) -> Self {
        // Expiry is checked against our own clock in `verify`
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["sub", "exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            lifetime,
            clock,
        }
    }

    /// Issue a token for `identifier`, expiring one lifetime from now.
    pub fn issue(&self, identifier: &str) -> Result<SessionToken, jsonwebtoken::errors::Error> {
        let now = self.clock.unix_now();
        let claims = SessionClaims {
            sub: identifier.to_string(),
            iat: now,
            exp: now + self.lifetime.num_seconds(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map(SessionToken)
    }

    /// Check a token and return the identifier it was issued to.
    ///
    /// The signature is checked before expiry, so an altered token reports
    /// `BadSignature` whatever its claims say.
    pub fn verify(&self, token: &str) -> Result<String, SessionRejection> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| {
                debug!(error = %e, "Session token rejected");
                match e.kind() {
                    ErrorKind::InvalidSignature => SessionRejection::BadSignature,
                    _ => SessionRejection::Malformed,
                }
            },
        )?;

        if self.clock.unix_now() >= data.claims.exp {
            return Err(SessionRejection::Expired);
        }

        Ok(data.claims.sub)
    }
}
