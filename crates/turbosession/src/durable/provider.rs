//! Session provider over a durable [`SessionStore`]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::{DEFAULT_KEY_PREFIX, DurableSession, SessionStore};
use crate::carrier::{RefreshChannel, TokenCarrier};
use crate::context::RequestContext;
use crate::error::{Result, SessionError};
use crate::jwt::{Claims, TokenIssuer};
use crate::session::{ProviderCore, Session, SessionHandle, SessionProvider, initial_record};

/// Provider whose records live in a shared store and survive restarts
///
/// Record lookups never cache across requests; the store is the only source of truth,
/// so a record destroyed by any instance is gone for every instance.
#[derive(Debug, Clone)]
pub struct DurableProvider {
    core: ProviderCore,
    store: Arc<dyn SessionStore>,
    key_prefix: String,
}

impl DurableProvider {
    /// Create a provider using the default refresh header and key prefix
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if the carrier reads the refresh header.
    pub fn new(
        issuer: TokenIssuer,
        carrier: Arc<dyn TokenCarrier>,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self> {
        Self::with_channels(issuer, carrier, RefreshChannel::default(), store)
    }

    /// Create a provider with a custom refresh channel
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if the carrier reads the `refresh` header.
    pub fn with_channels(
        issuer: TokenIssuer,
        carrier: Arc<dyn TokenCarrier>,
        refresh: RefreshChannel,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self> {
        Ok(Self {
            core: ProviderCore::new(issuer, carrier, refresh)?,
            store,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        })
    }

    /// Namespace prepended to every session id to form the store key
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Store key for `session_id`
    pub fn record_key(&self, session_id: &str) -> String {
        format!("{}{}", self.key_prefix, session_id)
    }

    fn session_for(&self, claims: Claims) -> DurableSession {
        DurableSession::new(
            self.record_key(&claims.session_id),
            claims,
            self.core.session_ttl(),
            Arc::clone(&self.store),
        )
    }
}

#[async_trait]
impl SessionProvider for DurableProvider {
    async fn create_session(
        &self,
        ctx: &mut RequestContext,
        subject: &str,
        claim_attrs: HashMap<String, String>,
        initial_data: HashMap<String, Value>,
    ) -> Result<SessionHandle> {
        let claims = self.core.new_claims(subject, claim_attrs);
        let session = self.session_for(claims.clone());
        session.init(initial_record(subject, initial_data)).await?;
        if let Err(err) = self.core.issue_and_send(ctx, &claims) {
            // No client holds a token for this record
            if let Err(cleanup) = session.destroy().await {
                warn!(
                    session_id = %claims.session_id,
                    error = %cleanup,
                    "Failed to remove orphaned session record"
                );
            }
            return Err(err);
        }

        debug!(session_id = %claims.session_id, subject, "Created durable session");
        let handle: SessionHandle = Arc::new(session);
        ctx.cache_session(Arc::clone(&handle));
        Ok(handle)
    }

    async fn get_session(&self, ctx: &mut RequestContext) -> Result<SessionHandle> {
        if let Some(session) = ctx.cached_session() {
            return Ok(session);
        }

        let claims = self.core.access_claims(ctx)?;
        let session = self.session_for(claims);

        // EXPIRE doubles as the existence check and the renewal-on-use
        if !self
            .store
            .expire(session.key(), self.core.session_ttl())
            .await?
        {
            debug!(session_id = %session.claims().session_id, "Durable session not found");
            return Err(SessionError::SessionNotFound);
        }

        let handle: SessionHandle = Arc::new(session);
        ctx.cache_session(Arc::clone(&handle));
        Ok(handle)
    }

    async fn destroy_session(&self, ctx: &mut RequestContext) -> Result<()> {
        let session = self.get_session(ctx).await?;
        self.core.carrier().clear(ctx)?;
        session.destroy().await?;
        ctx.clear_cached_session();
        Ok(())
    }

    async fn renew_tokens(&self, ctx: &mut RequestContext) -> Result<()> {
        let claims = self.core.refresh_claims(ctx)?;
        let key = self.record_key(&claims.session_id);

        // Extend first; tokens are only sent for a record that still exists
        if !self.store.expire(&key, self.core.session_ttl()).await? {
            return Err(SessionError::SessionNotFound);
        }

        self.core.issue_and_send(ctx, &claims)?;

        debug!(session_id = %claims.session_id, subject = %claims.subject, "Renewed token pair");
        Ok(())
    }
}
