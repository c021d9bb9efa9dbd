//! In-process session record with explicit expiry

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{Result, SessionError};
use crate::jwt::Claims;
use crate::session::Session;

#[derive(Debug)]
struct RecordState {
    data: HashMap<String, Value>,
    expires_at: Instant,
}

impl RecordState {
    fn is_live_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_live_at(Instant::now()) {
            Ok(())
        } else {
            Err(SessionError::SessionExpired)
        }
    }
}

/// Process-local session record
///
/// Content and expiry sit behind a per-record lock, so unrelated sessions never contend.
/// Every operation checks liveness first; a record is dead once `now >= expires_at` and
/// stays dead, since nothing moves the expiry of a dead record.
#[derive(Debug)]
pub struct MemorySession {
    claims: Claims,
    ttl: Duration,
    state: RwLock<RecordState>,
}

impl MemorySession {
    pub(crate) fn new(claims: Claims, data: HashMap<String, Value>, ttl: Duration) -> Self {
        Self {
            claims,
            ttl,
            state: RwLock::new(RecordState {
                data,
                expires_at: Instant::now() + ttl,
            }),
        }
    }

    /// Instant at which the record dies
    pub fn expires_at(&self) -> Instant {
        self.state.read().expires_at
    }

    /// Whether the record is dead
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub(crate) fn is_expired_at(&self, now: Instant) -> bool {
        !self.state.read().is_live_at(now)
    }

    /// Push expiry to at least `now + ttl`; never shortens it
    pub(crate) fn touch(&self) -> Result<()> {
        let now = Instant::now();
        let mut state = self.state.write();
        if !state.is_live_at(now) {
            return Err(SessionError::SessionExpired);
        }
        state.expires_at = state.expires_at.max(now + self.ttl);
        Ok(())
    }

    /// Mark the record dead without removing it
    pub(crate) fn expire_now(&self) {
        let now = Instant::now();
        let mut state = self.state.write();
        state.expires_at = state.expires_at.min(now);
    }
}

#[async_trait]
impl Session for MemorySession {
    fn id(&self) -> &str {
        &self.claims.session_id
    }

    fn claims(&self) -> &Claims {
        &self.claims
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut state = self.state.write();
        state.ensure_live()?;
        state.data.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Value> {
        let state = self.state.read();
        state.ensure_live()?;
        state
            .data
            .get(key)
            .cloned()
            .ok_or_else(|| SessionError::KeyNotFound(key.to_string()))
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut state = self.state.write();
        state.ensure_live()?;
        state.data.remove(key);
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        self.expire_now();
        debug!(session_id = %self.id(), "Expired memory session");
        Ok(())
    }

    async fn refresh(&self) -> Result<()> {
        self.touch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session(ttl_secs: u64) -> MemorySession {
        let mut data = HashMap::new();
        data.insert("login_ip".to_string(), json!("127.0.0.1"));
        MemorySession::new(
            Claims::new("u1", "s1", HashMap::new()),
            data,
            Duration::from_secs(ttl_secs),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_crud_while_live() {
        let session = session(60);
        assert_eq!(session.get("login_ip").await.unwrap(), json!("127.0.0.1"));

        session.set("cart", json!([1, 2])).await.unwrap();
        assert_eq!(session.get("cart").await.unwrap(), json!([1, 2]));

        session.del("cart").await.unwrap();
        assert!(matches!(
            session.get("cart").await,
            Err(SessionError::KeyNotFound(k)) if k == "cart"
        ));
        assert_eq!(session.id(), "s1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_operation_fails_once_expired() {
        let session = session(60);
        tokio::time::advance(Duration::from_secs(60)).await;

        assert!(session.is_expired());
        assert!(matches!(session.get("login_ip").await, Err(SessionError::SessionExpired)));
        assert!(matches!(session.set("k", json!(1)).await, Err(SessionError::SessionExpired)));
        assert!(matches!(session.del("k").await, Err(SessionError::SessionExpired)));
        assert!(matches!(session.refresh().await, Err(SessionError::SessionExpired)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_never_shortens() {
        let session = session(60);
        let first = session.expires_at();

        session.refresh().await.unwrap();
        assert_eq!(session.expires_at(), first);

        tokio::time::advance(Duration::from_secs(30)).await;
        session.refresh().await.unwrap();
        assert_eq!(session.expires_at(), first + Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_is_logical_and_final() {
        let session = session(60);
        session.destroy().await.unwrap();

        assert!(session.is_expired());
        assert!(matches!(session.get("login_ip").await, Err(SessionError::SessionExpired)));
        assert!(session.refresh().await.is_err());
    }
}
