//! Common test utilities for integration tests
//!
//! This module provides an in-memory [`SessionStore`] with Redis-like hash and TTL
//! semantics, provider fixtures for both backends, and helpers that turn one response's
//! headers into the next request's headers the way a client would.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::time::Instant;
use turbosession::{
    DurableProvider, HeaderCarrier, MemoryProvider, RequestContext, Result, SessionError,
    SessionStore, TokenCarrier, TokenIssuer,
};

pub const SECRET: &str = "integration-test-secret";
pub const ACCESS_TTL: Duration = Duration::from_secs(60);
pub const REFRESH_TTL: Duration = Duration::from_secs(3600);
pub const REFRESH_HEADER: &str = "x-refresh-token";

#[derive(Debug)]
struct Entry {
    fields: HashMap<String, String>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Hash-with-TTL store living in test memory; time follows the tokio clock
#[derive(Debug, Default)]
pub struct FakeStore {
    entries: Mutex<HashMap<String, Entry>>,
    failing: AtomicBool,
    failing_operation: Mutex<Option<&'static str>>,
    calls: AtomicUsize,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every subsequent call fail with a backend error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make only `operation` fail from now on
    pub fn fail_operation(&self, operation: &'static str) {
        *self.failing_operation.lock() = Some(operation);
    }

    /// Number of store operations issued so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Live keys currently held
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        self.entries
            .lock()
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Raw field content, bypassing the session API
    pub fn raw_field(&self, key: &str, field: &str) -> Option<String> {
        let now = Instant::now();
        self.entries
            .lock()
            .get(key)
            .filter(|entry| entry.is_live(now))
            .and_then(|entry| entry.fields.get(field).cloned())
    }

    /// Write a field directly, as another client sharing the store would
    pub fn write_raw(&self, key: &str, field: &str, value: &str) {
        if let Some(entry) = self.entries.lock().get_mut(key) {
            entry.fields.insert(field.to_string(), value.to_string());
        }
    }

    fn begin(&self, operation: &'static str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst)
            || *self.failing_operation.lock() == Some(operation)
        {
            return Err(SessionError::backend(operation, "connection refused"));
        }
        // Reap lazily, the way the real store hides expired keys
        let now = Instant::now();
        self.entries.lock().retain(|_, entry| entry.is_live(now));
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FakeStore {
    async fn init(&self, key: &str, fields: &[(String, String)], ttl: Duration) -> Result<()> {
        self.begin("init")?;
        let mut entries = self.entries.lock();
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            fields: HashMap::new(),
            expires_at: None,
        });
        entry.fields.extend(fields.iter().cloned());
        entry.expires_at = Some(Instant::now() + ttl);
        Ok(())
    }

    async fn set_field(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool> {
        self.begin("hset")?;
        Ok(match self.entries.lock().get_mut(key) {
            Some(entry) => {
                entry.fields.insert(field.to_string(), value.to_string());
                entry.expires_at = Some(Instant::now() + ttl);
                true
            }
            None => false,
        })
    }

    async fn get_field(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.begin("hget")?;
        Ok(self
            .entries
            .lock()
            .get(key)
            .and_then(|entry| entry.fields.get(field).cloned()))
    }

    async fn delete_field(&self, key: &str, field: &str) -> Result<()> {
        self.begin("hdel")?;
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(key) {
            entry.fields.remove(field);
            if entry.fields.is_empty() {
                entries.remove(key);
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.begin("del")?;
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.begin("expire")?;
        Ok(match self.entries.lock().get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                true
            }
            None => false,
        })
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.begin("exists")?;
        Ok(self.entries.lock().contains_key(key))
    }

    async fn remaining_ttl(&self, key: &str) -> Result<Option<Duration>> {
        self.begin("pttl")?;
        let now = Instant::now();
        Ok(self
            .entries
            .lock()
            .get(key)
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }
}

/// Carrier whose writes always fail, as with an unencodable token
#[derive(Debug, Default)]
pub struct RejectingCarrier;

impl TokenCarrier for RejectingCarrier {
    fn name(&self) -> &'static str {
        "rejecting"
    }

    fn inject(&self, _ctx: &mut RequestContext, _token: &str) -> Result<()> {
        Err(SessionError::Carrier("token cannot be encoded".to_string()))
    }

    fn extract(&self, _ctx: &RequestContext) -> Option<String> {
        None
    }

    fn clear(&self, _ctx: &mut RequestContext) -> Result<()> {
        Ok(())
    }
}

pub fn issuer() -> TokenIssuer {
    TokenIssuer::new(SECRET, ACCESS_TTL, REFRESH_TTL).unwrap()
}

pub fn header_carrier() -> Arc<dyn TokenCarrier> {
    Arc::new(HeaderCarrier::default())
}

pub fn memory_provider(carrier: Arc<dyn TokenCarrier>) -> MemoryProvider {
    MemoryProvider::new(issuer(), carrier).unwrap()
}

pub fn durable_provider(carrier: Arc<dyn TokenCarrier>) -> (DurableProvider, Arc<FakeStore>) {
    let store = FakeStore::new();
    let provider = DurableProvider::new(issuer(), carrier, store.clone()).unwrap();
    (provider, store)
}

/// Initial data used by the login scenario
pub fn login_data() -> HashMap<String, Value> {
    let mut data = HashMap::new();
    data.insert("login_ip".to_string(), json!("127.0.0.1"));
    data
}

/// Build the next request from a response, echoing tokens back like a client
///
/// `Set-Cookie` lines become `Cookie` pairs; every other header is sent back as is.
pub fn follow_up(response: &RequestContext) -> RequestContext {
    let mut headers = HeaderMap::new();
    for (name, value) in response.response_headers() {
        if name == SET_COOKIE {
            let pair = value
                .to_str()
                .unwrap()
                .split(';')
                .next()
                .unwrap()
                .to_string();
            headers.append(COOKIE, HeaderValue::from_str(&pair).unwrap());
        } else {
            headers.insert(name.clone(), value.clone());
        }
    }
    RequestContext::new(headers)
}

/// A request carrying only the access token, as `Authorization: Bearer <token>`
pub fn bearer_request(token: &str) -> RequestContext {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    );
    RequestContext::new(headers)
}

/// A request carrying only the refresh token
pub fn refresh_request(token: &str) -> RequestContext {
    let mut headers = HeaderMap::new();
    headers.insert(REFRESH_HEADER, HeaderValue::from_str(token).unwrap());
    RequestContext::new(headers)
}

/// Access token written by a header carrier into a response
pub fn access_token(response: &RequestContext) -> String {
    response.response_headers()[AUTHORIZATION]
        .to_str()
        .unwrap()
        .to_string()
}

/// Refresh token written into a response
pub fn refresh_token(response: &RequestContext) -> String {
    response.response_headers()[REFRESH_HEADER]
        .to_str()
        .unwrap()
        .to_string()
}
