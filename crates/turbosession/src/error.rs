//! Error types for token and session operations
//!
//! Two layers of errors:
//! - [`TokenError`] - produced by the claim codec while signing or verifying a token
//! - [`SessionError`] - returned by providers, sessions, carriers and configuration
//!
//! Every [`SessionError`] belongs to one [`ErrorCategory`], which is what the routing
//! layer should branch on: categories 1-4 are authentication failures (401), while
//! backend failures are transient faults the caller may retry.

use thiserror::Error;

/// Errors produced while issuing or verifying a token
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Token is not a structurally valid signed token
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// Signature does not match the configured secret
    #[error("Token signature mismatch")]
    InvalidSignature,

    /// Token header declares an algorithm other than the configured one
    #[error("Token algorithm mismatch: expected {expected}, found {found}")]
    AlgorithmMismatch {
        /// Algorithm configured on the issuer
        expected: String,
        /// Algorithm declared in the token header
        found: String,
    },

    /// Token is past its `exp` claim
    #[error("Token expired")]
    Expired,

    /// Token is not valid yet (`nbf` in the future)
    #[error("Token not yet valid")]
    NotYetValid,

    /// Token kind does not match what the caller expected
    #[error("Wrong token kind: expected {expected}, found {found}")]
    WrongKind {
        /// Kind the caller asked for
        expected: String,
        /// Kind carried by the token
        found: String,
    },

    /// Claims could not be encoded or signed
    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

impl TokenError {
    /// Whether this error means the token was well-formed and correctly signed but expired
    pub fn is_expired(&self) -> bool {
        matches!(self, TokenError::Expired)
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::ImmatureSignature => TokenError::NotYetValid,
            _ => TokenError::Malformed(err.to_string()),
        }
    }
}

/// Coarse classification of a [`SessionError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// No token at the expected transport location
    MissingCredential,
    /// Token failed signature or structural checks
    InvalidCredential,
    /// Token is correctly signed but past its expiry
    ExpiredCredential,
    /// Token verified but the backing session record is gone
    SessionNotFound,
    /// Transient network or storage fault; retrying may succeed
    Backend,
    /// Programming or deployment error (serialization, configuration, carrier setup)
    Internal,
}

/// Errors returned by session providers, sessions and carriers
#[derive(Error, Debug)]
pub enum SessionError {
    /// No access token was found by the carrier
    #[error("No access token provided")]
    MissingToken,

    /// No refresh token was found on the refresh channel
    #[error("No refresh token provided")]
    MissingRefreshToken,

    /// Access token failed verification
    #[error("Invalid access token: {0}")]
    InvalidToken(#[source] TokenError),

    /// Refresh token failed verification
    #[error("Invalid refresh token: {0}")]
    InvalidRefreshToken(#[source] TokenError),

    /// Token pair could not be issued
    #[error("Token issuance failed: {0}")]
    Issuance(#[source] TokenError),

    /// Session record does not exist (destroyed or expired in the backend)
    #[error("Session not found or expired")]
    SessionNotFound,

    /// Session record exists but is logically expired
    #[error("Session expired")]
    SessionExpired,

    /// Key is not present in the session record
    #[error("Key not found in session: {0}")]
    KeyNotFound(String),

    /// Session value could not be serialized
    #[error("Session value serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend store operation failed
    #[error("Session backend error during {operation}: {reason}")]
    Backend {
        /// Store operation that failed
        operation: &'static str,
        /// Error reported by the store
        reason: String,
    },

    /// Carrier could not write the token into the response
    #[error("Token carrier error: {0}")]
    Carrier(String),

    /// Invalid configuration
    #[error("Invalid session configuration: {0}")]
    Config(String),
}

impl SessionError {
    /// Build a backend error for the given store operation
    pub fn backend(operation: &'static str, reason: impl std::fmt::Display) -> Self {
        SessionError::Backend {
            operation,
            reason: reason.to_string(),
        }
    }

    /// Classify this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            SessionError::MissingToken | SessionError::MissingRefreshToken => {
                ErrorCategory::MissingCredential
            }
            SessionError::InvalidToken(e) | SessionError::InvalidRefreshToken(e) => {
                if e.is_expired() {
                    ErrorCategory::ExpiredCredential
                } else {
                    ErrorCategory::InvalidCredential
                }
            }
            SessionError::SessionNotFound | SessionError::SessionExpired => {
                ErrorCategory::SessionNotFound
            }
            SessionError::Backend { .. } => ErrorCategory::Backend,
            SessionError::KeyNotFound(_)
            | SessionError::Issuance(_)
            | SessionError::Serialization(_)
            | SessionError::Carrier(_)
            | SessionError::Config(_) => ErrorCategory::Internal,
        }
    }

    /// Whether the caller should answer with an unauthorized response
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::MissingCredential
                | ErrorCategory::InvalidCredential
                | ErrorCategory::ExpiredCredential
                | ErrorCategory::SessionNotFound
        )
    }

    /// Whether retrying the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Backend
    }

    /// Convert to an HTTP status code
    pub fn to_http_status(&self) -> u16 {
        match self.category() {
            ErrorCategory::MissingCredential
            | ErrorCategory::InvalidCredential
            | ErrorCategory::ExpiredCredential
            | ErrorCategory::SessionNotFound => 401, // Unauthorized
            ErrorCategory::Backend => 503, // Service Unavailable
            ErrorCategory::Internal => match self {
                SessionError::KeyNotFound(_) => 404, // Not Found
                _ => 500,                            // Internal Server Error
            },
        }
    }
}

impl From<redis::RedisError> for SessionError {
    fn from(err: redis::RedisError) -> Self {
        SessionError::backend("redis", err)
    }
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
