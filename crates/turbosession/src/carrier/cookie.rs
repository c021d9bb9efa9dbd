//! Cookie-based token carrier

use std::fmt;
use std::time::Duration;

use http::header::{COOKIE, SET_COOKIE};
use serde::{Deserialize, Serialize};

use super::TokenCarrier;
use crate::context::{RequestContext, header_value};
use crate::error::{Result, SessionError};

/// Default cookie name
pub const DEFAULT_COOKIE_NAME: &str = "turbosession_token";

/// `SameSite` cookie attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    /// Only sent on same-site requests
    Strict,
    /// Sent on same-site requests and top-level navigations
    Lax,
    /// Always sent (requires `Secure` in modern browsers)
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        })
    }
}

/// Carries the access token in a cookie
///
/// Defaults: path `/`, max-age 24 hours, `HttpOnly`, not `Secure`, no domain.
/// Clearing reissues the cookie empty with `Max-Age=0` and an `Expires` in the past.
#[derive(Debug, Clone)]
pub struct CookieCarrier {
    name: String,
    domain: Option<String>,
    path: String,
    max_age: Duration,
    secure: bool,
    http_only: bool,
    same_site: Option<SameSite>,
}

impl Default for CookieCarrier {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            domain: None,
            path: "/".to_string(),
            max_age: Duration::from_secs(24 * 60 * 60),
            secure: false,
            http_only: true,
            same_site: None,
        }
    }
}

impl CookieCarrier {
    /// Carrier using cookie `name`; an empty name falls back to [`DEFAULT_COOKIE_NAME`]
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if the name contains characters not allowed in a
    /// cookie name.
    pub fn new(name: &str) -> Result<Self> {
        let name = if name.is_empty() {
            DEFAULT_COOKIE_NAME
        } else {
            name
        };
        let valid = name.bytes().all(|b| {
            b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b)
        });
        if !valid {
            return Err(SessionError::Config(format!("invalid cookie name '{name}'")));
        }

        Ok(Self {
            name: name.to_string(),
            ..Self::default()
        })
    }

    /// Set the `Domain` attribute
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Set the `Path` attribute
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the `Max-Age` attribute
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Set the `Secure` attribute
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set the `HttpOnly` attribute
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Set the `SameSite` attribute
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Cookie name
    pub fn cookie_name(&self) -> &str {
        &self.name
    }

    fn set_cookie_line(&self, value: &str, expire_now: bool) -> String {
        let mut line = format!("{}={}; Path={}", self.name, value, self.path);
        if let Some(domain) = &self.domain {
            line.push_str("; Domain=");
            line.push_str(domain);
        }
        if expire_now {
            line.push_str("; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT");
        } else {
            line.push_str(&format!("; Max-Age={}", self.max_age.as_secs()));
        }
        if self.secure {
            line.push_str("; Secure");
        }
        if self.http_only {
            line.push_str("; HttpOnly");
        }
        if let Some(same_site) = self.same_site {
            line.push_str(&format!("; SameSite={same_site}"));
        }
        line
    }
}

impl TokenCarrier for CookieCarrier {
    fn name(&self) -> &'static str {
        "cookie"
    }

    fn inject(&self, ctx: &mut RequestContext, token: &str) -> Result<()> {
        let value = header_value(&self.set_cookie_line(token, false))?;
        ctx.response_headers_mut().append(SET_COOKIE, value);
        Ok(())
    }

    fn extract(&self, ctx: &RequestContext) -> Option<String> {
        ctx.request_headers()
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|line| line.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| name.trim() == self.name)
            .map(|(_, value)| value.trim().trim_matches('"').to_string())
            .filter(|value| !value.is_empty())
    }

    fn clear(&self, ctx: &mut RequestContext) -> Result<()> {
        let value = header_value(&self.set_cookie_line("", true))?;
        ctx.response_headers_mut().append(SET_COOKIE, value);
        Ok(())
    }
}
