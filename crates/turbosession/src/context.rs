//! Per-request context shared by providers and carriers
//!
//! A [`RequestContext`] holds the inbound request headers, the outbound response headers
//! a carrier writes tokens into, and a per-request cache of the resolved session. It lives
//! exactly as long as one request; nothing here is shared across requests.

use http::{HeaderMap, HeaderValue, header::AsHeaderName};

use crate::session::SessionHandle;

/// Request-scoped state for session resolution
#[derive(Debug, Default)]
pub struct RequestContext {
    request_headers: HeaderMap,
    response_headers: HeaderMap,
    session: Option<SessionHandle>,
}

impl RequestContext {
    /// Create a context for a request carrying `headers`
    pub fn new(request_headers: HeaderMap) -> Self {
        Self {
            request_headers,
            response_headers: HeaderMap::new(),
            session: None,
        }
    }

    /// Create a context from the head of an [`http::Request`]
    pub fn from_parts(parts: &http::request::Parts) -> Self {
        Self::new(parts.headers.clone())
    }

    /// Inbound request headers
    pub fn request_headers(&self) -> &HeaderMap {
        &self.request_headers
    }

    /// Mutable inbound headers (tests and adapters that build a request incrementally)
    pub fn request_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.request_headers
    }

    /// Read an inbound header as a trimmed, non-empty string
    pub fn request_header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.request_headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Outbound response headers written so far
    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    /// Mutable outbound response headers
    pub fn response_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.response_headers
    }

    /// Take the outbound headers, leaving an empty map behind
    pub fn take_response_headers(&mut self) -> HeaderMap {
        std::mem::take(&mut self.response_headers)
    }

    /// Copy every outbound header onto a response
    ///
    /// Multi-valued headers (e.g. several `Set-Cookie` lines) are appended, not replaced.
    pub fn apply_to<B>(&mut self, response: &mut http::Response<B>) {
        let headers = response.headers_mut();
        let mut current = None;
        for (name, value) in self.take_response_headers() {
            if let Some(name) = name {
                headers.remove(&name);
                current = Some(name);
            }
            if let Some(name) = &current {
                headers.append(name.clone(), value);
            }
        }
    }

    /// Session already resolved during this request, if any
    pub fn cached_session(&self) -> Option<SessionHandle> {
        self.session.clone()
    }

    /// Remember the session resolved for this request
    pub fn cache_session(&mut self, session: SessionHandle) {
        self.session = Some(session);
    }

    /// Forget the cached session (after it was destroyed)
    pub fn clear_cached_session(&mut self) {
        self.session = None;
    }
}

/// Build a [`HeaderValue`] for a token, rejecting bytes not allowed in headers
pub(crate) fn header_value(value: &str) -> crate::Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| crate::SessionError::Carrier(format!("invalid header value: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{AUTHORIZATION, SET_COOKIE};

    #[test]
    fn test_request_header_trims_and_skips_empty() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("  abc  "));
        headers.insert("x-empty", HeaderValue::from_static(""));
        let ctx = RequestContext::new(headers);

        assert_eq!(ctx.request_header(AUTHORIZATION), Some("abc"));
        assert_eq!(ctx.request_header("x-empty"), None);
        assert_eq!(ctx.request_header("x-missing"), None);
    }

    #[test]
    fn test_apply_to_keeps_multi_valued_headers() {
        let mut ctx = RequestContext::default();
        ctx.response_headers_mut()
            .append(SET_COOKIE, HeaderValue::from_static("a=1"));
        ctx.response_headers_mut()
            .append(SET_COOKIE, HeaderValue::from_static("b=2"));
        ctx.response_headers_mut()
            .insert("x-refresh-token", HeaderValue::from_static("r"));

        let mut response = http::Response::new(());
        response
            .headers_mut()
            .insert("x-refresh-token", HeaderValue::from_static("stale"));
        ctx.apply_to(&mut response);

        let cookies: Vec<_> = response.headers().get_all(SET_COOKIE).iter().collect();
        assert_eq!(cookies.len(), 2);
        assert_eq!(response.headers()["x-refresh-token"], "r");
        assert!(ctx.response_headers().is_empty());
    }
}
