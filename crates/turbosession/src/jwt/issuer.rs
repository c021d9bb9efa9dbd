//! Token issuance and verification over a shared HMAC secret
//!
//! Verification checks, in order:
//! - the header algorithm equals the configured one (downgrade / confusion guard)
//! - the signature against the configured secret
//! - the issuer
//! - `nbf <= now` and `exp > now`, with the configured leeway
//!
//! Verification is offline: nothing here touches a session store.

use std::fmt;
use std::time::Duration;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
    get_current_timestamp,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Claims, TokenKind, TokenPair};
use crate::error::{Result, SessionError, TokenError};

/// Default issuer stamped into every token
pub const DEFAULT_ISSUER: &str = "turbosession";

/// Signs claim sets into tokens and verifies them
///
/// # Example
///
/// ```rust
/// use std::collections::HashMap;
/// use std::time::Duration;
/// use turbosession::jwt::{Claims, TokenIssuer};
///
/// let issuer = TokenIssuer::new(
///     "change-me",
///     Duration::from_secs(15 * 60),
///     Duration::from_secs(7 * 24 * 3600),
/// )?;
///
/// let pair = issuer.issue_pair(&Claims::new("u1", "session-1", HashMap::new()))?;
/// let claims = issuer.verify_access(&pair.access_token)?;
/// assert_eq!(claims.subject, "u1");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    leeway: Duration,
}

// Keys stay out of Debug output
impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("leeway", &self.leeway)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Create an HS256 issuer
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if the secret is empty or either TTL is zero.
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Result<Self> {
        if secret.is_empty() {
            return Err(SessionError::Config("signing secret is empty".to_string()));
        }
        if access_ttl.is_zero() || refresh_ttl.is_zero() {
            return Err(SessionError::Config(
                "token TTLs must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            algorithm: Algorithm::HS256,
            issuer: DEFAULT_ISSUER.to_string(),
            access_ttl,
            refresh_ttl,
            leeway: Duration::ZERO,
        })
    }

    /// Create an issuer from a secret held in a [`SecretString`]
    ///
    /// # Errors
    ///
    /// Same as [`TokenIssuer::new`].
    pub fn from_secret(
        secret: &SecretString,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<Self> {
        Self::new(secret.expose_secret(), access_ttl, refresh_ttl)
    }

    /// Set the issuer stamped into (and required from) every token
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Set the clock-skew tolerance applied to `exp` and `nbf`
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Select the HMAC algorithm (HS256, HS384 or HS512)
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] for non-HMAC algorithms; the issuer only holds a
    /// shared secret.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Result<Self> {
        match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                self.algorithm = algorithm;
                Ok(self)
            }
            other => Err(SessionError::Config(format!(
                "algorithm {other:?} is not an HMAC algorithm"
            ))),
        }
    }

    /// Configured access-token lifetime
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Configured refresh-token lifetime
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Configured issuer
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Sign `claims` as a token of `kind` living for `ttl`
    ///
    /// Stamps `iss`, `kind`, `iat = nbf = now`, `exp = now + ttl` and a fresh `jti`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Encoding`] if the claims cannot be serialized or signed.
    pub fn issue(
        &self,
        claims: &Claims,
        kind: TokenKind,
        ttl: Duration,
    ) -> std::result::Result<String, TokenError> {
        self.issue_at(claims, kind, ttl, get_current_timestamp())
    }

    /// Sign a single access token with the configured access TTL
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Encoding`] if signing fails.
    pub fn issue_access(&self, claims: &Claims) -> std::result::Result<String, TokenError> {
        self.issue(claims, TokenKind::Access, self.access_ttl)
    }

    /// Sign an access + refresh pair for the same claims
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Encoding`] if signing either token fails.
    pub fn issue_pair(&self, claims: &Claims) -> std::result::Result<TokenPair, TokenError> {
        let now = get_current_timestamp();
        let access_token = self.issue_at(claims, TokenKind::Access, self.access_ttl, now)?;
        let refresh_token = self.issue_at(claims, TokenKind::Refresh, self.refresh_ttl, now)?;

        debug!(
            subject = %claims.subject,
            session_id = %claims.session_id,
            "Issued token pair"
        );

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    pub(crate) fn issue_at(
        &self,
        claims: &Claims,
        kind: TokenKind,
        ttl: Duration,
        now: u64,
    ) -> std::result::Result<String, TokenError> {
        let mut stamped = claims.clone();
        stamped.kind = kind;
        stamped.iss = self.issuer.clone();
        stamped.iat = now;
        stamped.nbf = now;
        stamped.exp = now.saturating_add(ttl.as_secs());
        stamped.jti = Uuid::new_v4().to_string();

        encode(&Header::new(self.algorithm), &stamped, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify a token of either kind
    ///
    /// # Errors
    ///
    /// - [`TokenError::Malformed`] for unparsable input or a foreign issuer
    /// - [`TokenError::AlgorithmMismatch`] if the header declares another algorithm
    /// - [`TokenError::InvalidSignature`] if the signature does not match the secret
    /// - [`TokenError::Expired`] / [`TokenError::NotYetValid`] for temporal violations
    pub fn verify(&self, token: &str) -> std::result::Result<Claims, TokenError> {
        self.verify_at(token, get_current_timestamp())
    }

    /// Verify a token and require it to be an access token
    ///
    /// # Errors
    ///
    /// Everything [`TokenIssuer::verify`] returns, plus [`TokenError::WrongKind`].
    pub fn verify_access(&self, token: &str) -> std::result::Result<Claims, TokenError> {
        self.verify_kind(token, TokenKind::Access)
    }

    /// Verify a token and require it to be a refresh token
    ///
    /// # Errors
    ///
    /// Everything [`TokenIssuer::verify`] returns, plus [`TokenError::WrongKind`].
    pub fn verify_refresh(&self, token: &str) -> std::result::Result<Claims, TokenError> {
        self.verify_kind(token, TokenKind::Refresh)
    }

    fn verify_kind(
        &self,
        token: &str,
        expected: TokenKind,
    ) -> std::result::Result<Claims, TokenError> {
        let claims = self.verify(token)?;
        if claims.kind != expected {
            warn!(
                session_id = %claims.session_id,
                expected = %expected,
                found = %claims.kind,
                "Token presented on the wrong channel"
            );
            return Err(TokenError::WrongKind {
                expected: expected.to_string(),
                found: claims.kind.to_string(),
            });
        }
        Ok(claims)
    }

    pub(crate) fn verify_at(
        &self,
        token: &str,
        now: u64,
    ) -> std::result::Result<Claims, TokenError> {
        let header = decode_header(token).map_err(|e| {
            debug!(error = %e, "Failed to decode token header");
            TokenError::Malformed(e.to_string())
        })?;

        if header.alg != self.algorithm {
            warn!(
                expected = ?self.algorithm,
                found = ?header.alg,
                "Token algorithm mismatch"
            );
            return Err(TokenError::AlgorithmMismatch {
                expected: format!("{:?}", self.algorithm),
                found: format!("{:?}", header.alg),
            });
        }

        // Temporal checks run below against `now` so they honour an injected clock
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss"]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                debug!(error = %e, "Token verification failed");
                TokenError::from(e)
            })?
            .claims;

        let leeway = self.leeway.as_secs();
        if claims.nbf > now.saturating_add(leeway) {
            return Err(TokenError::NotYetValid);
        }
        if claims.exp.saturating_add(leeway) <= now {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}
