//! Token carriers - how a token travels between client and server
//!
//! The access token rides on a pluggable [`TokenCarrier`]:
//! - [`HeaderCarrier`] - a named header (default `Authorization`)
//! - [`CookieCarrier`] - a cookie with domain/path/max-age/secure/http-only attributes
//!
//! The refresh token always travels on the fixed [`RefreshChannel`] header, independent
//! of the access-token carrier. Carriers hold static configuration only and never touch
//! the session store.

pub mod cookie;
pub mod header;

pub use cookie::{CookieCarrier, SameSite};
pub use header::HeaderCarrier;

use std::fmt;

use http::HeaderName;

use crate::context::{RequestContext, header_value};
use crate::error::{Result, SessionError};

/// Default header carrying the refresh token
pub const DEFAULT_REFRESH_HEADER: &str = "X-Refresh-Token";

/// Moves an access token into a response and back out of a request
pub trait TokenCarrier: Send + Sync + fmt::Debug {
    /// Short name used in logs ("header", "cookie")
    fn name(&self) -> &'static str;

    /// Write `token` into the outbound response
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Carrier`] if the token cannot be encoded for the transport.
    fn inject(&self, ctx: &mut RequestContext, token: &str) -> Result<()>;

    /// Read the candidate token from the inbound request
    fn extract(&self, ctx: &RequestContext) -> Option<String>;

    /// Instruct the client to drop its token
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Carrier`] if the clearing directive cannot be encoded.
    fn clear(&self, ctx: &mut RequestContext) -> Result<()>;

    /// Header the carrier reads from, when it is header based
    ///
    /// Used to check that the access and refresh channels never share a header.
    fn header_name(&self) -> Option<&HeaderName> {
        None
    }
}

/// Fixed header channel for refresh tokens
#[derive(Debug, Clone)]
pub struct RefreshChannel {
    header: HeaderName,
}

impl Default for RefreshChannel {
    fn default() -> Self {
        Self {
            header: HeaderName::from_static("x-refresh-token"),
        }
    }
}

impl RefreshChannel {
    /// Create a channel on a custom header
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if `name` is not a valid header name.
    pub fn new(name: &str) -> Result<Self> {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| SessionError::Config(format!("invalid refresh header '{name}': {e}")))?;
        Ok(Self { header })
    }

    /// Header name
    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    /// Write the refresh token into the response
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Carrier`] if the token is not a valid header value.
    pub fn inject(&self, ctx: &mut RequestContext, token: &str) -> Result<()> {
        let value = header_value(token)?;
        ctx.response_headers_mut().insert(self.header.clone(), value);
        Ok(())
    }

    /// Read the refresh token from the request
    pub fn extract(&self, ctx: &RequestContext) -> Option<String> {
        ctx.request_header(&self.header).map(str::to_string)
    }

    /// Ensure `carrier` does not read from the refresh header
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] when both channels share a header.
    pub fn ensure_distinct_from(&self, carrier: &dyn TokenCarrier) -> Result<()> {
        match carrier.header_name() {
            Some(name) if *name == self.header => Err(SessionError::Config(format!(
                "access-token carrier and refresh channel both use header '{}'",
                self.header
            ))),
            _ => Ok(()),
        }
    }
}
