//! Header-based token carrier

use http::{HeaderName, HeaderValue, header::AUTHORIZATION};

use super::TokenCarrier;
use crate::context::{RequestContext, header_value};
use crate::error::{Result, SessionError};

/// Carries the access token in a named header
///
/// `inject` writes the bare token; `extract` accepts either a bare token or the
/// `Bearer <token>` form clients usually send in `Authorization`.
#[derive(Debug, Clone)]
pub struct HeaderCarrier {
    header: HeaderName,
}

impl Default for HeaderCarrier {
    fn default() -> Self {
        Self {
            header: AUTHORIZATION,
        }
    }
}

impl HeaderCarrier {
    /// Carrier on a custom header
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if `name` is not a valid header name.
    pub fn new(name: &str) -> Result<Self> {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| SessionError::Config(format!("invalid header name '{name}': {e}")))?;
        Ok(Self { header })
    }
}

impl TokenCarrier for HeaderCarrier {
    fn name(&self) -> &'static str {
        "header"
    }

    fn inject(&self, ctx: &mut RequestContext, token: &str) -> Result<()> {
        let value = header_value(token)?;
        ctx.response_headers_mut().insert(self.header.clone(), value);
        Ok(())
    }

    fn extract(&self, ctx: &RequestContext) -> Option<String> {
        let raw = ctx.request_header(&self.header)?;
        let token = match raw.get(..6) {
            Some(scheme)
                if scheme.eq_ignore_ascii_case("bearer")
                    && (raw.len() == 6 || raw[6..].starts_with(' ')) =>
            {
                raw[6..].trim()
            }
            _ => raw,
        };
        (!token.is_empty()).then(|| token.to_string())
    }

    fn clear(&self, ctx: &mut RequestContext) -> Result<()> {
        ctx.response_headers_mut()
            .insert(self.header.clone(), HeaderValue::from_static(""));
        Ok(())
    }

    fn header_name(&self) -> Option<&HeaderName> {
        Some(&self.header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;

    fn request_with(name: &str, value: &'static str) -> RequestContext {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_static(value),
        );
        RequestContext::new(headers)
    }

    #[test]
    fn test_extract_bare_and_bearer() {
        let carrier = HeaderCarrier::default();
        assert_eq!(
            carrier.extract(&request_with("authorization", "abc.def.ghi")),
            Some("abc.def.ghi".to_string())
        );
        assert_eq!(
            carrier.extract(&request_with("authorization", "Bearer abc.def.ghi")),
            Some("abc.def.ghi".to_string())
        );
        assert_eq!(
            carrier.extract(&request_with("authorization", "bearer   xyz")),
            Some("xyz".to_string())
        );
        assert_eq!(carrier.extract(&request_with("authorization", "Bearer ")), None);
        assert_eq!(carrier.extract(&RequestContext::default()), None);
    }

    #[test]
    fn test_custom_header() {
        let carrier = HeaderCarrier::new("X-Access-Token").unwrap();
        assert_eq!(
            carrier.extract(&request_with("x-access-token", "tok")),
            Some("tok".to_string())
        );
        assert_eq!(carrier.extract(&request_with("authorization", "tok")), None);
        assert!(HeaderCarrier::new("not valid").is_err());
    }

    #[test]
    fn test_inject_and_clear() {
        let carrier = HeaderCarrier::default();
        let mut ctx = RequestContext::default();

        carrier.inject(&mut ctx, "a.b.c").unwrap();
        assert_eq!(ctx.response_headers()[AUTHORIZATION], "a.b.c");

        carrier.clear(&mut ctx).unwrap();
        assert_eq!(ctx.response_headers()[AUTHORIZATION], "");

        assert!(carrier.inject(&mut ctx, "bad\ntoken").is_err());
    }
}
