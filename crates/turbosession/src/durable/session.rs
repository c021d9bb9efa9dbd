//! Session record stored as a hash in a [`SessionStore`]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::SessionStore;
use crate::error::{Result, SessionError};
use crate::jwt::Claims;
use crate::session::Session;

/// Durable session record
///
/// Holds no data locally; every read and write goes to the store. Values are stored as
/// JSON text, one hash field per key.
#[derive(Debug, Clone)]
pub struct DurableSession {
    key: String,
    claims: Claims,
    ttl: Duration,
    store: Arc<dyn SessionStore>,
}

impl DurableSession {
    pub(crate) fn new(
        key: String,
        claims: Claims,
        ttl: Duration,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            key,
            claims,
            ttl,
            store,
        }
    }

    /// Store key of the record
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Bulk-write the initial fields and the TTL in one batch
    pub(crate) async fn init(&self, data: HashMap<String, Value>) -> Result<()> {
        let fields = data
            .into_iter()
            .map(|(field, value)| serde_json::to_string(&value).map(|encoded| (field, encoded)))
            .collect::<serde_json::Result<Vec<_>>>()?;
        self.store.init(&self.key, &fields, self.ttl).await
    }
}

/// Decode a stored field, falling back to the raw text when it is not JSON
///
/// Fields written by other clients may hold plain strings.
fn decode_value(raw: String) -> Value {
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(_) => Value::String(raw),
    }
}

#[async_trait]
impl Session for DurableSession {
    fn id(&self) -> &str {
        &self.claims.session_id
    }

    fn claims(&self) -> &Claims {
        &self.claims
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let encoded = serde_json::to_string(&value)?;
        if self
            .store
            .set_field(&self.key, key, &encoded, self.ttl)
            .await?
        {
            Ok(())
        } else {
            debug!(session_id = %self.id(), "Write to destroyed durable session refused");
            Err(SessionError::SessionNotFound)
        }
    }

    async fn get(&self, key: &str) -> Result<Value> {
        if let Some(raw) = self.store.get_field(&self.key, key).await? {
            return Ok(decode_value(raw));
        }
        // A miss on a vanished record means the session is gone, not the key
        if self.store.exists(&self.key).await? {
            Err(SessionError::KeyNotFound(key.to_string()))
        } else {
            Err(SessionError::SessionNotFound)
        }
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.store.delete_field(&self.key, key).await
    }

    async fn destroy(&self) -> Result<()> {
        self.store.delete(&self.key).await?;
        debug!(session_id = %self.id(), "Destroyed durable session");
        Ok(())
    }

    async fn refresh(&self) -> Result<()> {
        if self.store.expire(&self.key, self.ttl).await? {
            Ok(())
        } else {
            Err(SessionError::SessionNotFound)
        }
    }
}
