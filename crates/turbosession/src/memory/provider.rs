//! Session provider over the in-process store

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use super::sweeper::{DEFAULT_SWEEP_INTERVAL, Sweeper};
use super::{MemorySession, MemoryStore};
use crate::carrier::{RefreshChannel, TokenCarrier};
use crate::context::RequestContext;
use crate::error::{Result, SessionError};
use crate::jwt::TokenIssuer;
use crate::session::{ProviderCore, SessionHandle, SessionProvider, initial_record};

/// Provider keeping sessions in process memory
///
/// Sessions are lost on restart and invisible to other instances. A sweeper task owned by
/// the provider reaps dead records on a fixed interval; it stops on [`shutdown`] or when
/// the provider is dropped.
///
/// [`shutdown`]: MemoryProvider::shutdown
#[derive(Debug)]
pub struct MemoryProvider {
    core: ProviderCore,
    store: Arc<MemoryStore>,
    sweeper: Sweeper,
}

impl MemoryProvider {
    /// Create a provider sweeping every five minutes
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if the carrier reads the refresh header or no
    /// tokio runtime is running.
    pub fn new(issuer: TokenIssuer, carrier: Arc<dyn TokenCarrier>) -> Result<Self> {
        Self::with_sweep_interval(issuer, carrier, DEFAULT_SWEEP_INTERVAL)
    }

    /// Create a provider with a custom sweep interval
    ///
    /// # Errors
    ///
    /// Same as [`MemoryProvider::new`], plus a zero interval.
    pub fn with_sweep_interval(
        issuer: TokenIssuer,
        carrier: Arc<dyn TokenCarrier>,
        sweep_interval: Duration,
    ) -> Result<Self> {
        Self::with_channels(issuer, carrier, RefreshChannel::default(), sweep_interval)
    }

    /// Create a provider with a custom refresh channel and sweep interval
    ///
    /// The carrier is checked against `refresh`, not against the default refresh header.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if the carrier reads the `refresh` header, the
    /// interval is zero or no tokio runtime is running.
    pub fn with_channels(
        issuer: TokenIssuer,
        carrier: Arc<dyn TokenCarrier>,
        refresh: RefreshChannel,
        sweep_interval: Duration,
    ) -> Result<Self> {
        let core = ProviderCore::new(issuer, carrier, refresh)?;
        let store = Arc::new(MemoryStore::new());
        let sweeper = Sweeper::spawn(Arc::clone(&store), sweep_interval)?;
        Ok(Self {
            core,
            store,
            sweeper,
        })
    }

    /// Records currently held, including dead ones not yet reaped
    pub fn session_count(&self) -> usize {
        self.store.len()
    }

    /// Run one sweep pass now; returns how many records were reaped
    pub fn sweep_now(&self) -> usize {
        self.store.sweep()
    }

    /// Interval between background sweeps
    pub fn sweep_interval(&self) -> Duration {
        self.sweeper.interval()
    }

    /// Whether the background sweeper is still running
    pub fn is_sweeping(&self) -> bool {
        self.sweeper.is_running()
    }

    /// Stop the background sweeper and wait for it to exit
    pub async fn shutdown(&self) {
        self.sweeper.stop().await;
    }

    fn lookup(&self, session_id: &str) -> Result<Arc<MemorySession>> {
        self.store
            .get(session_id)
            .ok_or(SessionError::SessionNotFound)
    }

    fn reap(&self, session_id: &str) {
        if self.store.remove_if_expired(session_id, Instant::now()) {
            debug!(session_id, "Removed expired memory session");
        }
    }
}

#[async_trait]
impl SessionProvider for MemoryProvider {
    async fn create_session(
        &self,
        ctx: &mut RequestContext,
        subject: &str,
        claim_attrs: HashMap<String, String>,
        initial_data: HashMap<String, Value>,
    ) -> Result<SessionHandle> {
        let claims = self.core.new_claims(subject, claim_attrs);
        self.core.issue_and_send(ctx, &claims)?;

        let session_id = claims.session_id.clone();
        let session = Arc::new(MemorySession::new(
            claims,
            initial_record(subject, initial_data),
            self.core.session_ttl(),
        ));
        self.store.insert(session_id.clone(), Arc::clone(&session));

        debug!(session_id = %session_id, subject, "Created memory session");
        let handle: SessionHandle = session;
        ctx.cache_session(Arc::clone(&handle));
        Ok(handle)
    }

    async fn get_session(&self, ctx: &mut RequestContext) -> Result<SessionHandle> {
        if let Some(session) = ctx.cached_session() {
            return Ok(session);
        }

        let claims = self.core.access_claims(ctx)?;
        let session = self.lookup(&claims.session_id)?;

        // Record lock only; the container lock is not held here
        if let Err(err) = session.touch() {
            self.reap(&claims.session_id);
            return Err(err);
        }

        let handle: SessionHandle = session;
        ctx.cache_session(Arc::clone(&handle));
        Ok(handle)
    }

    async fn destroy_session(&self, ctx: &mut RequestContext) -> Result<()> {
        let session = self.get_session(ctx).await?;
        self.core.carrier().clear(ctx)?;
        session.destroy().await?;
        self.store.remove(session.id());
        ctx.clear_cached_session();
        debug!(session_id = %session.id(), "Destroyed memory session");
        Ok(())
    }

    async fn renew_tokens(&self, ctx: &mut RequestContext) -> Result<()> {
        let claims = self.core.refresh_claims(ctx)?;
        let session = self.lookup(&claims.session_id)?;

        // Extend first; tokens are only sent for a live record
        if let Err(err) = session.touch() {
            self.reap(&claims.session_id);
            return Err(err);
        }

        self.core.issue_and_send(ctx, &claims)?;

        debug!(session_id = %claims.session_id, subject = %claims.subject, "Renewed token pair");
        Ok(())
    }
}
