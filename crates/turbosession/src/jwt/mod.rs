//! Claim codec - the signed payload carried by access and refresh tokens
//!
//! Both token kinds carry the same [`Claims`] shape. They differ in expiry horizon and in
//! the `kind` claim, which lets the issuer refuse a refresh token presented where an
//! access token is expected (and vice versa).
//!
//! - [`issuer`] - [`TokenIssuer`] signs and verifies tokens with a shared HMAC secret

pub mod issuer;

pub use issuer::TokenIssuer;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Kind of token a claim set was issued as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived credential authorizing ordinary requests
    #[default]
    Access,
    /// Long-lived credential used only to obtain a new token pair
    Refresh,
}

impl TokenKind {
    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claim set identifying a principal and a session
///
/// The temporal fields (`iat`, `nbf`, `exp`, `jti`) and `iss`/`kind` are stamped by the
/// issuer; callers only provide the subject, session id and attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Opaque subject (user) identifier
    #[serde(rename = "sub")]
    pub subject: String,

    /// Session identifier, unique per login
    #[serde(rename = "sid")]
    pub session_id: String,

    /// Small attributes that stay fixed for the life of the session (e.g. role)
    #[serde(default)]
    pub data: HashMap<String, String>,

    /// Token kind
    #[serde(default)]
    pub kind: TokenKind,

    /// Issuer
    #[serde(default)]
    pub iss: String,

    /// Issued at (Unix seconds)
    #[serde(default)]
    pub iat: u64,

    /// Not before (Unix seconds)
    #[serde(default)]
    pub nbf: u64,

    /// Expires at (Unix seconds)
    pub exp: u64,

    /// Unique token id
    #[serde(default)]
    pub jti: String,
}

impl Claims {
    /// Create an unstamped claim set
    pub fn new(
        subject: impl Into<String>,
        session_id: impl Into<String>,
        data: HashMap<String, String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            session_id: session_id.into(),
            data,
            kind: TokenKind::Access,
            iss: String::new(),
            iat: 0,
            nbf: 0,
            exp: 0,
            jti: String::new(),
        }
    }

    /// Look up a session attribute
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    /// Whether two claim sets describe the same principal and session,
    /// ignoring everything the issuer stamps
    pub fn same_identity(&self, other: &Claims) -> bool {
        self.subject == other.subject
            && self.session_id == other.session_id
            && self.data == other.data
    }
}

/// Access + refresh token pair produced at login and on every renewal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived access token
    pub access_token: String,
    /// Long-lived refresh token
    pub refresh_token: String,
}
