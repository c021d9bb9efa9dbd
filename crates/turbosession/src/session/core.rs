//! Token plumbing shared by both providers

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::carrier::{RefreshChannel, TokenCarrier};
use crate::context::RequestContext;
use crate::error::{Result, SessionError};
use crate::jwt::{Claims, TokenIssuer};

/// Issuer, carrier and refresh channel bound together
#[derive(Debug, Clone)]
pub(crate) struct ProviderCore {
    issuer: TokenIssuer,
    carrier: Arc<dyn TokenCarrier>,
    refresh: RefreshChannel,
}

impl ProviderCore {
    pub(crate) fn new(
        issuer: TokenIssuer,
        carrier: Arc<dyn TokenCarrier>,
        refresh: RefreshChannel,
    ) -> Result<Self> {
        refresh.ensure_distinct_from(carrier.as_ref())?;
        Ok(Self {
            issuer,
            carrier,
            refresh,
        })
    }

    pub(crate) fn carrier(&self) -> &dyn TokenCarrier {
        self.carrier.as_ref()
    }

    /// Lifetime of a session record; a session lives as long as it can be renewed
    pub(crate) fn session_ttl(&self) -> Duration {
        self.issuer.refresh_ttl()
    }

    /// Claims for a brand-new session
    pub(crate) fn new_claims(&self, subject: &str, attrs: HashMap<String, String>) -> Claims {
        Claims::new(subject, Uuid::new_v4().to_string(), attrs)
    }

    /// Issue a token pair for `claims` and write it into the response
    pub(crate) fn issue_and_send(&self, ctx: &mut RequestContext, claims: &Claims) -> Result<()> {
        let pair = self
            .issuer
            .issue_pair(claims)
            .map_err(SessionError::Issuance)?;
        self.carrier.inject(ctx, &pair.access_token)?;
        self.refresh.inject(ctx, &pair.refresh_token)?;
        Ok(())
    }

    /// Extract and verify the access token
    pub(crate) fn access_claims(&self, ctx: &RequestContext) -> Result<Claims> {
        let token = self
            .carrier
            .extract(ctx)
            .ok_or(SessionError::MissingToken)?;
        self.issuer.verify_access(&token).map_err(|e| {
            debug!(carrier = self.carrier.name(), error = %e, "Access token rejected");
            SessionError::InvalidToken(e)
        })
    }

    /// Extract and verify the refresh token
    pub(crate) fn refresh_claims(&self, ctx: &RequestContext) -> Result<Claims> {
        let token = self
            .refresh
            .extract(ctx)
            .ok_or(SessionError::MissingRefreshToken)?;
        self.issuer.verify_refresh(&token).map_err(|e| {
            warn!(error = %e, "Refresh token rejected");
            SessionError::InvalidRefreshToken(e)
        })
    }
}
