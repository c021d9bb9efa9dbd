//! Session record and provider abstractions
//!
//! A [`Session`] is the server-side record behind a session id: a mutable key/value map,
//! the claim set it was issued with, and an expiry. A [`SessionProvider`] is the only
//! component callers talk to; it creates, resolves, destroys and renews sessions.
//!
//! Two implementations exist for each trait, selected at startup:
//! - [`crate::durable`] - Redis hash per session, TTL pushed to the store
//! - [`crate::memory`] - process-local map with explicit expiry and a periodic sweep

mod core;

pub(crate) use self::core::ProviderCore;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::context::RequestContext;
use crate::error::Result;
use crate::jwt::Claims;

/// Record field holding the subject id, written by providers at creation
pub const FIELD_USER_ID: &str = "user_id";

/// Record field holding the creation time (Unix seconds), written by providers at creation
pub const FIELD_CREATED_AT: &str = "created_at";

/// Shared handle to a resolved session
pub type SessionHandle = Arc<dyn Session>;

/// Server-side session record
#[async_trait]
pub trait Session: Send + Sync + fmt::Debug {
    /// Session identifier (equals the `sid` claim)
    fn id(&self) -> &str;

    /// Claim set the session was issued with
    fn claims(&self) -> &Claims;

    /// Store `value` under `key`
    ///
    /// The durable backend also re-applies the record's TTL in the same round trip. Writing
    /// to a destroyed record fails and never recreates it.
    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Read the value stored under `key`
    async fn get(&self, key: &str) -> Result<Value>;

    /// Remove `key` from the record
    async fn del(&self, key: &str) -> Result<()>;

    /// Destroy the whole record
    async fn destroy(&self) -> Result<()>;

    /// Re-apply the record's configured lifetime without touching its content
    async fn refresh(&self) -> Result<()>;
}

/// Typed helpers over [`Session`]
#[async_trait]
pub trait SessionExt: Session {
    /// Serialize `value` and store it under `key`
    ///
    /// # Errors
    ///
    /// Returns [`crate::SessionError::Serialization`] if `value` cannot be serialized, or
    /// whatever [`Session::set`] returns.
    async fn set_value<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.set(key, value).await
    }

    /// Read `key` and deserialize it into `T`
    ///
    /// # Errors
    ///
    /// Returns [`crate::SessionError::Serialization`] if the stored value does not match
    /// `T`, or whatever [`Session::get`] returns.
    async fn get_value<T: DeserializeOwned + Send>(&self, key: &str) -> Result<T> {
        let value = self.get(key).await?;
        Ok(serde_json::from_value(value)?)
    }
}

impl<S: Session + ?Sized> SessionExt for S {}

/// Creates, resolves, destroys and renews sessions for requests
#[async_trait]
pub trait SessionProvider: Send + Sync + fmt::Debug {
    /// Start a session for `subject`
    ///
    /// Issues a token pair, injects the access token through the carrier and the refresh
    /// token on the refresh channel, and creates the backing record holding
    /// `initial_data` plus [`FIELD_USER_ID`] and [`FIELD_CREATED_AT`].
    async fn create_session(
        &self,
        ctx: &mut RequestContext,
        subject: &str,
        claim_attrs: HashMap<String, String>,
        initial_data: HashMap<String, Value>,
    ) -> Result<SessionHandle>;

    /// Resolve the session for this request from its access token
    ///
    /// Memoized on the context; a successful lookup pushes the record's expiry forward.
    async fn get_session(&self, ctx: &mut RequestContext) -> Result<SessionHandle>;

    /// Resolve the session, clear the carrier token and destroy the record
    async fn destroy_session(&self, ctx: &mut RequestContext) -> Result<()>;

    /// Exchange the refresh token for a new token pair and extend the record
    async fn renew_tokens(&self, ctx: &mut RequestContext) -> Result<()>;
}

/// Merge caller data with the bookkeeping fields every record carries
pub(crate) fn initial_record(
    subject: &str,
    mut initial_data: HashMap<String, Value>,
) -> HashMap<String, Value> {
    initial_data.insert(FIELD_USER_ID.to_string(), Value::String(subject.to_string()));
    initial_data.insert(
        FIELD_CREATED_AT.to_string(),
        Value::from(chrono::Utc::now().timestamp()),
    );
    initial_data
}
