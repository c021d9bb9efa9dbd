//! Hash-with-TTL store abstraction and its Redis implementation

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tracing::{debug, trace};

use crate::error::{Result, SessionError};

/// Field-map store with whole-key expiry
///
/// Every session record is one key holding a field map; the expiry applies to the key.
/// Implementations must make `init` and `set_field` atomic with their expiry update.
#[async_trait]
pub trait SessionStore: Send + Sync + fmt::Debug {
    /// Write all `fields` and apply `ttl` in one batch
    async fn init(&self, key: &str, fields: &[(String, String)], ttl: Duration) -> Result<()>;

    /// Write one field and re-apply `ttl` atomically, only if the key still exists
    ///
    /// Returns `false` without writing when the key is absent, so a destroyed record is
    /// never brought back by a late write.
    async fn set_field(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool>;

    /// Read one field
    async fn get_field(&self, key: &str, field: &str) -> Result<Option<String>>;

    /// Remove one field
    async fn delete_field(&self, key: &str, field: &str) -> Result<()>;

    /// Remove the whole key
    async fn delete(&self, key: &str) -> Result<()>;

    /// Re-apply `ttl`; returns `false` when the key does not exist
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Whether the key exists
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Time left before the key expires, `None` when absent or persistent
    async fn remaining_ttl(&self, key: &str) -> Result<Option<Duration>>;
}

/// [`SessionStore`] over a Redis multiplexed connection
///
/// Uses `HSET`/`HGET`/`HDEL` on the record hash and `EXPIRE` for the key TTL. The initial
/// write goes through a `MULTI`/`EXEC` pipeline; later field writes run as a Lua script so
/// they cannot recreate a deleted record.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Wrap an existing connection
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    /// Open a client for `url`, connect and check the server answers `PING`
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Backend`] if the URL is invalid or the server is unreachable.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| SessionError::backend("open", e))?;
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| SessionError::backend("connect", e))?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| SessionError::backend("ping", e))?;

        debug!("Redis session store connected");
        Ok(Self::new(conn))
    }

    fn conn(&self) -> MultiplexedConnection {
        self.conn.clone()
    }
}

/// `HSET` + `EXPIRE` guarded by `EXISTS`; returns 1 when written, 0 when the key is gone
const SET_IF_EXISTS: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return 0
end
redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
redis.call('EXPIRE', KEYS[1], ARGV[3])
return 1
";

fn ttl_secs(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_secs().max(1)).unwrap_or(i64::MAX)
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn init(&self, key: &str, fields: &[(String, String)], ttl: Duration) -> Result<()> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        if !fields.is_empty() {
            pipe.hset_multiple(key, fields).ignore();
        }
        pipe.expire(key, ttl_secs(ttl)).ignore();

        let _: () = pipe
            .query_async(&mut self.conn())
            .await
            .map_err(|e| SessionError::backend("init", e))?;
        trace!(key, fields = fields.len(), "Initialized session hash");
        Ok(())
    }

    async fn set_field(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool> {
        let written: i64 = redis::Script::new(SET_IF_EXISTS)
            .key(key)
            .arg(field)
            .arg(value)
            .arg(ttl_secs(ttl))
            .invoke_async(&mut self.conn())
            .await
            .map_err(|e| SessionError::backend("hset", e))?;
        trace!(key, field, written, "Wrote session field");
        Ok(written == 1)
    }

    async fn get_field(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.conn()
            .hget(key, field)
            .await
            .map_err(|e| SessionError::backend("hget", e))
    }

    async fn delete_field(&self, key: &str, field: &str) -> Result<()> {
        let _: () = self
            .conn()
            .hdel(key, field)
            .await
            .map_err(|e| SessionError::backend("hdel", e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let _: () = self
            .conn()
            .del(key)
            .await
            .map_err(|e| SessionError::backend("del", e))?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.conn()
            .expire(key, ttl_secs(ttl))
            .await
            .map_err(|e| SessionError::backend("expire", e))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.conn()
            .exists(key)
            .await
            .map_err(|e| SessionError::backend("exists", e))
    }

    async fn remaining_ttl(&self, key: &str) -> Result<Option<Duration>> {
        let millis: i64 = self
            .conn()
            .pttl(key)
            .await
            .map_err(|e| SessionError::backend("pttl", e))?;
        // -2: no such key, -1: no expiry
        Ok((millis >= 0).then(|| Duration::from_millis(millis as u64)))
    }
}
